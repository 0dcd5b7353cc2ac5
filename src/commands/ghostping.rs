// commands/ghostping.rs
use crate::database::GhostPingSettings;
use crate::error::Error;
use crate::utils::{require_guild, truncate, EMBED_FIELD_LIMIT};
use crate::Data;
use chrono::{DateTime, Utc};
use poise::serenity_prelude::{
    Channel, ChannelId, Context as SerenityContext, CreateAllowedMentions, CreateEmbed, CreateMessage, GuildId,
    Message, MessageId,
};

type Context<'a> = poise::Context<'a, Data, Error>;

/// What we still know about a message after it was deleted.
#[derive(Debug, Clone)]
pub struct DeletedMessage {
    pub author_id: u64,
    pub author_bot: bool,
    pub sent_at: DateTime<Utc>,
    pub mentioned_users: Vec<u64>,
    pub mentioned_roles: Vec<u64>,
    pub mentioned_everyone: bool,
    pub content: String,
}

impl From<&Message> for DeletedMessage {
    fn from(message: &Message) -> Self {
        Self {
            author_id: message.author.id.get(),
            author_bot: message.author.bot,
            sent_at: *message.timestamp,
            mentioned_users: message.mentions.iter().map(|u| u.id.get()).collect(),
            mentioned_roles: message.mention_roles.iter().map(|r| r.get()).collect(),
            mentioned_everyone: message.mention_everyone,
            content: message.content.clone(),
        }
    }
}

/// Mentions that make this deletion a ghost ping, or `None` if it isn't one.
pub fn ghost_ping_targets(message: &DeletedMessage, now: DateTime<Utc>, window_secs: i64) -> Option<Vec<String>> {
    if message.author_bot {
        return None;
    }
    let age = now.signed_duration_since(message.sent_at).num_seconds();
    if age > window_secs {
        return None;
    }

    let mut targets: Vec<String> = message
        .mentioned_users
        .iter()
        .filter(|id| **id != message.author_id)
        .map(|id| format!("<@{}>", id))
        .collect();
    targets.extend(message.mentioned_roles.iter().map(|id| format!("<@&{}>", id)));
    if message.mentioned_everyone {
        targets.push("@everyone".to_string());
    }

    (!targets.is_empty()).then_some(targets)
}

pub async fn handle_delete(
    ctx: &SerenityContext,
    data: &Data,
    channel_id: ChannelId,
    message_id: MessageId,
    guild_id: Option<GuildId>,
) -> Result<(), Error> {
    let Some(guild_id) = guild_id else {
        return Ok(());
    };

    let settings = data.database.fetch_ghostping_settings(guild_id.get() as i64).await?;
    if !settings.enabled {
        return Ok(());
    }

    let Some(deleted) = ctx
        .cache
        .message(channel_id, message_id)
        .map(|message| DeletedMessage::from(&*message))
    else {
        tracing::debug!("Deleted message {} was not cached", message_id);
        return Ok(());
    };

    let Some(targets) = ghost_ping_targets(&deleted, Utc::now(), data.config.ghostping.window_secs) else {
        return Ok(());
    };

    tracing::info!(
        "Ghost ping by {} in channel {} of guild {}",
        deleted.author_id,
        channel_id,
        guild_id
    );

    let embed = CreateEmbed::new()
        .title("👻 Ghost ping detected")
        .field("Author", format!("<@{}>", deleted.author_id), true)
        .field("Channel", format!("<#{}>", channel_id), true)
        .field("Pinged", truncate(&targets.join(", "), EMBED_FIELD_LIMIT), false)
        .field(
            "Message",
            if deleted.content.is_empty() { "*no text*".to_string() } else { truncate(&deleted.content, EMBED_FIELD_LIMIT) },
            false,
        )
        .timestamp(deleted.sent_at)
        .color(0x95A5A6);

    let target_channel = settings
        .log_channel_id
        .map(|id| ChannelId::new(id as u64))
        .unwrap_or(channel_id);
    target_channel
        .send_message(
            &ctx.http,
            CreateMessage::new()
                .embed(embed)
                .allowed_mentions(CreateAllowedMentions::new()),
        )
        .await?;

    Ok(())
}

/// Report mentions that were deleted shortly after being sent
#[poise::command(
    slash_command,
    subcommands("toggle", "status"),
    default_member_permissions = "MANAGE_MESSAGES",
    guild_only,
    category = "Moderation"
)]
pub async fn ghostping(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Turn ghost-ping reports on or off
#[poise::command(slash_command)]
pub async fn toggle(
    ctx: Context<'_>,
    #[description = "Enable or disable"] enable: bool,
    #[description = "Where to post reports (default: the channel it happened in)"] channel: Option<Channel>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let settings = GhostPingSettings {
        enabled: enable,
        log_channel_id: channel.as_ref().map(|c| c.id().get() as i64),
    };
    ctx.data().database.store_ghostping_settings(guild_id, settings).await?;

    let reply = match (enable, channel) {
        (true, Some(channel)) => format!("✅ Ghost pings will be reported in <#{}>.", channel.id()),
        (true, None) => "✅ Ghost pings will be reported where they happen.".to_string(),
        (false, _) => "Ghost-ping reports are disabled.".to_string(),
    };
    ctx.say(reply).await?;

    Ok(())
}

/// Show ghost-ping settings
#[poise::command(slash_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let settings = ctx.data().database.fetch_ghostping_settings(guild_id).await?;

    let reply = match settings {
        GhostPingSettings { enabled: false, .. } => "Ghost-ping reports are disabled.".to_string(),
        GhostPingSettings { log_channel_id: Some(id), .. } => format!(
            "Ghost-ping reports are enabled and posted in <#{}> (window {}s).",
            id, ctx.data().config.ghostping.window_secs
        ),
        GhostPingSettings { log_channel_id: None, .. } => format!(
            "Ghost-ping reports are enabled and posted where they happen (window {}s).",
            ctx.data().config.ghostping.window_secs
        ),
    };
    ctx.say(reply).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn deleted(sent_at: DateTime<Utc>) -> DeletedMessage {
        DeletedMessage {
            author_id: 1,
            author_bot: false,
            sent_at,
            mentioned_users: vec![1, 2],
            mentioned_roles: vec![30],
            mentioned_everyone: false,
            content: "hey <@2>".to_string(),
        }
    }

    #[test]
    fn recent_mentions_are_ghost_pings() {
        let now = Utc::now();
        let targets = ghost_ping_targets(&deleted(now - Duration::seconds(10)), now, 60).unwrap();
        // The author mentioning themselves doesn't count.
        assert_eq!(targets, vec!["<@2>", "<@&30>"]);
    }

    #[test]
    fn old_messages_and_bots_are_ignored() {
        let now = Utc::now();
        assert!(ghost_ping_targets(&deleted(now - Duration::seconds(61)), now, 60).is_none());

        let mut bot = deleted(now);
        bot.author_bot = true;
        assert!(ghost_ping_targets(&bot, now, 60).is_none());
    }

    #[test]
    fn self_mention_only_is_not_a_ghost_ping() {
        let now = Utc::now();
        let mut message = deleted(now);
        message.mentioned_users = vec![1];
        message.mentioned_roles.clear();
        assert!(ghost_ping_targets(&message, now, 60).is_none());

        message.mentioned_everyone = true;
        assert_eq!(ghost_ping_targets(&message, now, 60).unwrap(), vec!["@everyone"]);
    }
}
