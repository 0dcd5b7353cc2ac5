use crate::error::Error;
use poise::serenity_prelude::GuildId;

/// Discord limits, in characters.
pub const EMBED_DESCRIPTION_LIMIT: usize = 4096;
pub const EMBED_FIELD_LIMIT: usize = 1024;

pub fn require_guild(guild_id: Option<GuildId>) -> Result<i64, Error> {
    guild_id
        .map(|id| id.get() as i64)
        .ok_or_else(|| Error::InvalidInput("This command can only be used in a server".to_string()))
}

/// Cuts `text` to at most `max` characters, ending with an ellipsis when shortened.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Formats an optional value, falling back to "N/A".
pub fn or_na<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}
