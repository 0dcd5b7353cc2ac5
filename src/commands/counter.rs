// commands/counter.rs
use crate::error::Error;
use crate::utils::{require_guild, truncate, EMBED_DESCRIPTION_LIMIT};
use crate::Data;
use poise::serenity_prelude::CreateEmbed;

type Context<'a> = poise::Context<'a, Data, Error>;

const MAX_NAME_LEN: usize = 32;

pub fn normalize_name(name: &str) -> Result<String, Error> {
    let name = name.trim().to_lowercase();
    let valid = !name.is_empty()
        && name.chars().count() <= MAX_NAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(Error::InvalidInput(format!(
            "Counter names are 1-{} characters of letters, digits, `-` or `_`.",
            MAX_NAME_LEN
        )));
    }
    Ok(name)
}

/// Server-wide named counters
#[poise::command(
    slash_command,
    subcommands("increment", "decrement", "show", "reset", "list"),
    guild_only,
    category = "Fun"
)]
pub async fn counter(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Add to a counter
#[poise::command(slash_command)]
pub async fn increment(
    ctx: Context<'_>,
    #[description = "Counter name"] name: String,
    #[description = "Amount to add (default 1)"]
    #[min = 1]
    amount: Option<i64>,
) -> Result<(), Error> {
    adjust(ctx, &name, amount.unwrap_or(1)).await
}

/// Subtract from a counter
#[poise::command(slash_command)]
pub async fn decrement(
    ctx: Context<'_>,
    #[description = "Counter name"] name: String,
    #[description = "Amount to subtract (default 1)"]
    #[min = 1]
    amount: Option<i64>,
) -> Result<(), Error> {
    adjust(ctx, &name, -amount.unwrap_or(1)).await
}

async fn adjust(ctx: Context<'_>, name: &str, delta: i64) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let name = normalize_name(name)?;
    if delta == 0 {
        return Err(Error::InvalidInput("Amount must not be zero.".to_string()));
    }

    let value = ctx.data().database.adjust_counter(guild_id, &name, delta).await?;
    ctx.say(format!("**{}** is now **{}**.", name, value)).await?;

    Ok(())
}

/// Show a counter's value
#[poise::command(slash_command)]
pub async fn show(
    ctx: Context<'_>,
    #[description = "Counter name"] name: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let name = normalize_name(&name)?;

    match ctx.data().database.fetch_counter(guild_id, &name).await? {
        Some(value) => ctx.say(format!("**{}** is at **{}**.", name, value)).await?,
        None => ctx.say(format!("There is no counter called **{}** yet.", name)).await?,
    };

    Ok(())
}

/// Delete a counter
#[poise::command(slash_command, required_permissions = "MANAGE_MESSAGES")]
pub async fn reset(
    ctx: Context<'_>,
    #[description = "Counter name"] name: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let name = normalize_name(&name)?;

    if ctx.data().database.reset_counter(guild_id, &name).await? {
        ctx.say(format!("✅ Counter **{}** has been reset.", name)).await?;
    } else {
        ctx.say(format!("There is no counter called **{}**.", name)).await?;
    }

    Ok(())
}

/// List every counter in this server
#[poise::command(slash_command)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let counters = ctx.data().database.list_counters(guild_id).await?;

    if counters.is_empty() {
        ctx.say("No counters in this server yet.").await?;
        return Ok(());
    }

    let embed = CreateEmbed::default()
        .title("Counters")
        .description(truncate(&format_counters(&counters), EMBED_DESCRIPTION_LIMIT))
        .color(0x00FF00);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

fn format_counters(counters: &[(String, i64)]) -> String {
    counters
        .iter()
        .map(|(name, value)| format!("**{}**: {}", name, value))
        .collect::<Vec<_>>()
        .join("\n")
}
