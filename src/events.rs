// events.rs
use crate::commands::{ghostping, typowatch};
use crate::error::Error;
use crate::Data;
use poise::serenity_prelude::{Context, FullEvent, Guild, GuildId};
use poise::FrameworkContext;

pub async fn handle_event(
    ctx: &Context,
    event: &FullEvent,
    _framework: FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot } => {
            tracing::info!("Logged in as {}", data_about_bot.user.name);
        }
        FullEvent::Message { new_message } => {
            typowatch::handle_message(ctx, data, new_message).await?;
        }
        FullEvent::MessageDelete {
            channel_id,
            deleted_message_id,
            guild_id,
        } => {
            ghostping::handle_delete(ctx, data, *channel_id, *deleted_message_id, *guild_id).await?;
        }
        FullEvent::GuildCreate { guild, .. } => {
            handle_guild_create(guild);
        }
        FullEvent::GuildDelete { incomplete, .. } if !incomplete.unavailable => {
            handle_guild_delete(incomplete.id, data).await?;
        }
        _ => {}
    }
    Ok(())
}

fn handle_guild_create(guild: &Guild) {
    tracing::info!("Guild Create event received for: {} (ID: {})", guild.name, guild.id);
}

async fn handle_guild_delete(guild_id: GuildId, data: &Data) -> Result<(), Error> {
    tracing::info!("Bot has left the guild with ID: {}", guild_id);

    // A guild we were removed from can't receive alerts any more.
    if data.database.remove_alert_subscription(guild_id.get() as i64).await? {
        tracing::info!("Removed emergency alert subscription for guild {}", guild_id);
    }

    Ok(())
}
