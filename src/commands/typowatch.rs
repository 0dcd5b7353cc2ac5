// commands/typowatch.rs
use crate::error::Error;
use crate::utils::{require_guild, truncate, EMBED_DESCRIPTION_LIMIT};
use crate::Data;
use poise::serenity_prelude::{Context as SerenityContext, CreateAllowedMentions, CreateEmbed, CreateMessage, Message};

type Context<'a> = poise::Context<'a, Data, Error>;

const MAX_WORD_LEN: usize = 64;
const MAX_CORRECTIONS_PER_MESSAGE: usize = 5;

fn normalize_word(word: &str) -> Result<String, Error> {
    let word = word.trim().to_lowercase();
    if word.is_empty() || word.chars().count() > MAX_WORD_LEN || word.contains(char::is_whitespace) {
        return Err(Error::InvalidInput(format!(
            "Watched words are single words of at most {} characters.",
            MAX_WORD_LEN
        )));
    }
    Ok(word)
}

/// Returns the corrections for every watched typo in `content`, in order of appearance.
pub fn find_typos<'a>(content: &str, watched: &'a [(String, String)]) -> Vec<&'a str> {
    let mut found: Vec<&str> = Vec::new();
    for word in content
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
    {
        let word = word.to_lowercase();
        if let Some((_, correction)) = watched.iter().find(|(typo, _)| *typo == word) {
            if !found.contains(&correction.as_str()) {
                found.push(correction);
            }
        }
        if found.len() == MAX_CORRECTIONS_PER_MESSAGE {
            break;
        }
    }
    found
}

/// Replies with corrections when a guild has typo-watch enabled.
pub async fn handle_message(ctx: &SerenityContext, data: &Data, message: &Message) -> Result<(), Error> {
    if message.author.bot {
        return Ok(());
    }
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };
    let guild_id = guild_id.get() as i64;

    if !data.database.fetch_typowatch_enabled(guild_id).await? {
        return Ok(());
    }

    let watched = data.database.fetch_typos(guild_id).await?;
    let corrections = find_typos(&message.content, &watched);
    if corrections.is_empty() {
        return Ok(());
    }

    let reply = corrections
        .iter()
        .map(|c| format!("*{}", c))
        .collect::<Vec<_>>()
        .join("\n");
    message
        .channel_id
        .send_message(
            &ctx.http,
            CreateMessage::new()
                .content(reply)
                .reference_message(message)
                .allowed_mentions(CreateAllowedMentions::new()),
        )
        .await?;

    Ok(())
}

/// Automatically correct common typos in this server
#[poise::command(
    slash_command,
    subcommands("toggle", "add", "remove", "list"),
    default_member_permissions = "MANAGE_MESSAGES",
    guild_only,
    category = "Moderation"
)]
pub async fn typowatch(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Turn typo-watch on or off
#[poise::command(slash_command)]
pub async fn toggle(
    ctx: Context<'_>,
    #[description = "Enable or disable (omit to show the current state)"] enable: Option<bool>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let current = ctx.data().database.fetch_typowatch_enabled(guild_id).await?;

    match enable {
        Some(new_state) if new_state != current => {
            ctx.data().database.store_typowatch_enabled(guild_id, new_state).await?;
            let status = if new_state { "enabled" } else { "disabled" };
            ctx.say(format!("Typo-watch has been {} for this server.", status)).await?;
        }
        Some(new_state) => {
            let status = if new_state { "enabled" } else { "disabled" };
            ctx.say(format!("Typo-watch was already {} for this server.", status)).await?;
        }
        None => {
            let status = if current { "enabled" } else { "disabled" };
            ctx.say(format!("Typo-watch is currently {} for this server.", status)).await?;
        }
    }

    Ok(())
}

/// Watch for a typo and suggest a correction
#[poise::command(slash_command)]
pub async fn add(
    ctx: Context<'_>,
    #[description = "The misspelling to watch for"] typo: String,
    #[description = "What it should be"] correction: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let typo = normalize_word(&typo)?;
    let correction = correction.trim();
    if correction.is_empty() {
        return Err(Error::InvalidInput("The correction can't be empty.".to_string()));
    }

    ctx.data().database.store_typo(guild_id, &typo, correction).await?;
    ctx.say(format!("✅ Watching for **{}** → *{}*.", typo, correction)).await?;

    Ok(())
}

/// Stop watching for a typo
#[poise::command(slash_command)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "The misspelling to stop watching"] typo: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let typo = normalize_word(&typo)?;

    if ctx.data().database.remove_typo(guild_id, &typo).await? {
        ctx.say(format!("✅ No longer watching for **{}**.", typo)).await?;
    } else {
        ctx.say(format!("**{}** wasn't being watched.", typo)).await?;
    }

    Ok(())
}

/// List watched typos
#[poise::command(slash_command)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let watched = ctx.data().database.fetch_typos(guild_id).await?;

    if watched.is_empty() {
        ctx.say("No typos are being watched. Add one with `/typowatch add`.").await?;
        return Ok(());
    }

    let lines = watched
        .iter()
        .map(|(typo, correction)| format!("**{}** → {}", typo, correction))
        .collect::<Vec<_>>()
        .join("\n");
    let embed = CreateEmbed::new()
        .title("Watched typos")
        .description(truncate(&lines, EMBED_DESCRIPTION_LIMIT))
        .color(0x9B59B6);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watched() -> Vec<(String, String)> {
        vec![
            ("teh".to_string(), "the".to_string()),
            ("recieve".to_string(), "receive".to_string()),
            ("definately".to_string(), "definitely".to_string()),
        ]
    }

    #[test]
    fn finds_whole_words_case_insensitively() {
        let watched = watched();
        assert_eq!(find_typos("I will RECIEVE teh parcel", &watched), vec!["receive", "the"]);
        assert!(find_typos("tehran is lovely", &watched).is_empty());
        assert_eq!(find_typos("teh, teh... TEH!", &watched), vec!["the"]);
    }

    #[test]
    fn corrections_are_capped() {
        let watched: Vec<(String, String)> = (0..10).map(|i| (format!("w{}", i), format!("c{}", i))).collect();
        let content = (0..10).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        assert_eq!(find_typos(&content, &watched).len(), MAX_CORRECTIONS_PER_MESSAGE);
    }

    #[test]
    fn words_are_validated() {
        assert_eq!(normalize_word(" Teh ").unwrap(), "teh");
        assert!(normalize_word("two words").is_err());
        assert!(normalize_word("").is_err());
    }
}
