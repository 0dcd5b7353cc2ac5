// commands/xkcd.rs
use crate::error::Error;
use crate::Data;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};
use rand::Rng;
use reqwest::StatusCode;
use serde::Deserialize;

type Context<'a> = poise::Context<'a, Data, Error>;

#[derive(Debug, Deserialize)]
pub struct Comic {
    pub num: u32,
    pub safe_title: String,
    pub img: String,
    pub alt: String,
    pub year: String,
    pub month: String,
    pub day: String,
}

/// `None` fetches the latest comic.
pub async fn fetch_comic(client: &reqwest::Client, base_url: &str, number: Option<u32>) -> Result<Comic, Error> {
    let base_url = base_url.trim_end_matches('/');
    let url = match number {
        Some(n) => format!("{}/{}/info.0.json", base_url, n),
        None => format!("{}/info.0.json", base_url),
    };

    let response = client.get(&url).send().await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(match number {
            Some(n) => format!("There is no XKCD #{}.", n),
            None => "Couldn't find the latest XKCD.".to_string(),
        }));
    }
    if !response.status().is_success() {
        return Err(Error::Api(format!("XKCD returned {}", response.status())));
    }

    Ok(response.json().await?)
}

/// Picks a comic between 1 and `latest`, skipping #404 (a joke; it does not exist).
pub fn random_comic_number<R: Rng + ?Sized>(latest: u32, rng: &mut R) -> u32 {
    let latest = latest.max(1);
    loop {
        let n = rng.gen_range(1..=latest);
        if n != 404 || latest == 404 {
            return n;
        }
    }
}

/// Show an XKCD comic
#[poise::command(slash_command, category = "Lookups")]
pub async fn xkcd(
    ctx: Context<'_>,
    #[description = "Comic number (latest if empty)"]
    #[min = 1]
    number: Option<u32>,
    #[description = "Pick a random comic instead"] random: Option<bool>,
) -> Result<(), Error> {
    ctx.defer().await?;
    let data = ctx.data();
    let base_url = &data.config.apis.xkcd_url;

    let comic = if random.unwrap_or(false) {
        let latest = fetch_comic(&data.http, base_url, None).await?;
        let pick = random_comic_number(latest.num, &mut rand::thread_rng());
        fetch_comic(&data.http, base_url, Some(pick)).await?
    } else {
        fetch_comic(&data.http, base_url, number).await?
    };

    let embed = CreateEmbed::new()
        .title(format!("#{}: {}", comic.num, comic.safe_title))
        .url(format!("https://xkcd.com/{}/", comic.num))
        .image(&comic.img)
        .description(&comic.alt)
        .footer(CreateEmbedFooter::new(format!("{}-{:0>2}-{:0>2}", comic.year, comic.month, comic.day)))
        .color(0x96A8C8);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}
