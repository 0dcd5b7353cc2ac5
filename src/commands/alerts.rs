// commands/alerts.rs
use crate::error::Error;
use crate::utils::require_guild;
use crate::Data;
use poise::serenity_prelude::{Channel, CreateEmbed, Role};

type Context<'a> = poise::Context<'a, Data, Error>;

const MAX_COOLDOWN_MINUTES: i32 = 24 * 60;

/// Configure emergency squawk alerts for this server
#[poise::command(
    slash_command,
    subcommands("channel", "role", "cooldown", "status", "disable"),
    default_member_permissions = "MANAGE_GUILD",
    guild_only,
    category = "SkySearch"
)]
pub async fn skyalerts(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Set the channel that receives emergency squawk alerts
#[poise::command(slash_command)]
pub async fn channel(
    ctx: Context<'_>,
    #[description = "Channel for emergency alerts"] channel: Channel,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;

    ctx.data().database.store_alert_channel(guild_id, channel.id().get() as i64).await?;
    tracing::info!("Emergency alerts for guild {} set to channel {}", guild_id, channel.id());

    ctx.say(format!(
        "✅ Emergency squawk alerts will be posted in <#{}>.",
        channel.id()
    )).await?;

    Ok(())
}

/// Set or clear the role mentioned with each alert
#[poise::command(slash_command)]
pub async fn role(
    ctx: Context<'_>,
    #[description = "Role to mention (leave empty to clear)"] role: Option<Role>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let role_id = role.as_ref().map(|r| r.id.get() as i64);

    if !ctx.data().database.store_alert_role(guild_id, role_id).await? {
        ctx.say("Set an alert channel first with `/skyalerts channel`.").await?;
        return Ok(());
    }

    match role {
        Some(role) => ctx.say(format!("✅ Alerts will mention <@&{}>.", role.id)).await?,
        None => ctx.say("✅ Alerts will no longer mention a role.").await?,
    };

    Ok(())
}

/// Set how long to wait before alerting again for the same aircraft
#[poise::command(slash_command)]
pub async fn cooldown(
    ctx: Context<'_>,
    #[description = "Minutes between repeat alerts for one aircraft"]
    #[min = 1]
    #[max = 1440]
    minutes: i32,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let minutes = validate_cooldown(minutes)?;

    if !ctx.data().database.store_alert_cooldown(guild_id, minutes).await? {
        ctx.say("Set an alert channel first with `/skyalerts channel`.").await?;
        return Ok(());
    }

    ctx.say(format!("✅ Repeat alerts for the same aircraft are now spaced {} minute(s) apart.", minutes)).await?;

    Ok(())
}

/// Show the current alert configuration
#[poise::command(slash_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let subscription = ctx.data().database.fetch_alert_subscription(guild_id).await?;

    let embed = match subscription {
        Some(sub) => CreateEmbed::new()
            .title("Emergency squawk alerts")
            .field("Channel", format!("<#{}>", sub.channel_id), true)
            .field(
                "Role",
                sub.role_id.map(|r| format!("<@&{}>", r)).unwrap_or_else(|| "None".to_string()),
                true,
            )
            .field("Cooldown", format!("{} min", sub.cooldown_minutes), true)
            .field(
                "Poll interval",
                format!("{} s", ctx.data().config.skysearch.poll_interval().as_secs()),
                true,
            )
            .color(0x00FF00),
        None => CreateEmbed::new()
            .title("Emergency squawk alerts")
            .description("Alerts are disabled. Use `/skyalerts channel` to enable them.")
            .color(0x808080),
    };

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

/// Stop posting emergency alerts in this server
#[poise::command(slash_command)]
pub async fn disable(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;

    if ctx.data().database.remove_alert_subscription(guild_id).await? {
        tracing::info!("Emergency alerts disabled for guild {}", guild_id);
        ctx.say("✅ Emergency squawk alerts disabled.").await?;
    } else {
        ctx.say("Emergency squawk alerts were not enabled.").await?;
    }

    Ok(())
}

fn validate_cooldown(minutes: i32) -> Result<i32, Error> {
    if (1..=MAX_COOLDOWN_MINUTES).contains(&minutes) {
        Ok(minutes)
    } else {
        Err(Error::InvalidInput(format!(
            "Cooldown must be between 1 and {} minutes.",
            MAX_COOLDOWN_MINUTES
        )))
    }
}
