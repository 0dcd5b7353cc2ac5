// commands/bible.rs
use crate::error::Error;
use crate::utils::{truncate, EMBED_DESCRIPTION_LIMIT};
use crate::Data;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};
use reqwest::{StatusCode, Url};
use serde::Deserialize;

type Context<'a> = poise::Context<'a, Data, Error>;

#[derive(Debug, Deserialize)]
pub struct Passage {
    pub reference: String,
    pub text: String,
    pub translation_name: Option<String>,
    #[serde(default)]
    pub verses: Vec<Verse>,
}

#[derive(Debug, Deserialize)]
pub struct Verse {
    pub book_name: String,
    pub chapter: u32,
    pub verse: u32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum Translation {
    #[name = "King James Version"]
    Kjv,
    #[name = "World English Bible"]
    Web,
    #[name = "American Standard Version"]
    Asv,
    #[name = "Bible in Basic English"]
    Bbe,
    #[name = "Young's Literal Translation"]
    Ylt,
}

impl Translation {
    pub fn id(self) -> &'static str {
        match self {
            Translation::Kjv => "kjv",
            Translation::Web => "web",
            Translation::Asv => "asv",
            Translation::Bbe => "bbe",
            Translation::Ylt => "ylt",
        }
    }
}

pub async fn fetch_passage(
    client: &reqwest::Client,
    base_url: &str,
    reference: &str,
    translation: Translation,
) -> Result<Passage, Error> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(Error::InvalidInput("Give a reference such as `John 3:16`.".to_string()));
    }

    let mut url = Url::parse(base_url).map_err(|e| Error::Unknown(format!("Bad Bible API URL: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| Error::Unknown("Bible API URL cannot take a path".to_string()))?
        .pop_if_empty()
        .push(reference);
    url.query_pairs_mut().append_pair("translation", translation.id());

    let response = client.get(url).send().await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(format!("Couldn't find `{}`.", reference)));
    }
    if !response.status().is_success() {
        return Err(Error::Api(format!("Bible lookup returned {}", response.status())));
    }

    Ok(response.json().await?)
}

/// Joins verses with their numbers; falls back to the plain text.
pub fn format_passage(passage: &Passage) -> String {
    let body = if passage.verses.len() > 1 {
        passage
            .verses
            .iter()
            .map(|v| format!("**{}** {}", v.verse, v.text.trim()))
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        passage.text.trim().to_string()
    };
    truncate(&body, EMBED_DESCRIPTION_LIMIT)
}

pub fn passage_embed(passage: &Passage) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(&passage.reference)
        .description(format_passage(passage))
        .color(0x8B4513);
    if let Some(name) = passage.translation_name.as_deref().filter(|n| !n.is_empty()) {
        embed = embed.footer(CreateEmbedFooter::new(name));
    }
    embed
}

/// Look up a Bible passage
#[poise::command(slash_command, category = "Lookups")]
pub async fn bible(
    ctx: Context<'_>,
    #[description = "Reference, e.g. John 3:16 or Psalm 23:1-3"] reference: String,
    #[description = "Translation (default King James Version)"] translation: Option<Translation>,
) -> Result<(), Error> {
    ctx.defer().await?;

    let data = ctx.data();
    let passage = fetch_passage(
        &data.http,
        &data.config.apis.bible_url,
        &reference,
        translation.unwrap_or(Translation::Kjv),
    )
    .await?;

    ctx.send(poise::CreateReply::default().embed(passage_embed(&passage))).await?;

    Ok(())
}
