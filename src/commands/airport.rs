// commands/airport.rs
use crate::error::Error;
use crate::utils::{or_na, title_case, truncate, EMBED_FIELD_LIMIT};
use crate::Data;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

type Context<'a> = poise::Context<'a, Data, Error>;

#[derive(Debug, Deserialize)]
pub struct AirportInfo {
    pub icao: Option<String>,
    pub iata: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub link: Option<String>,
    pub status: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct MetarReport {
    #[serde(rename = "icaoId")]
    pub icao_id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "rawOb")]
    pub raw: Option<String>,
    #[serde(rename = "reportTime")]
    pub report_time: Option<String>,
    pub temp: Option<f64>,
    pub dewp: Option<f64>,
    /// Degrees, or `"VRB"`.
    pub wdir: Option<Value>,
    pub wspd: Option<f64>,
    pub wgst: Option<f64>,
    /// Statute miles, or strings like `"10+"`.
    pub visib: Option<Value>,
    pub altim: Option<f64>,
    #[serde(rename = "fltCat")]
    pub flight_category: Option<String>,
}

/// Which code family the user typed.
#[derive(Debug, PartialEq)]
pub enum AirportCode {
    Iata(String),
    Icao(String),
}

impl AirportCode {
    pub fn parse(code: &str) -> Result<Self, Error> {
        let code = code.trim().to_uppercase();
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidInput("Airport codes contain only letters and digits.".to_string()));
        }
        match code.len() {
            3 => Ok(AirportCode::Iata(code)),
            4 => Ok(AirportCode::Icao(code)),
            _ => Err(Error::InvalidInput(
                "Use a 3-letter IATA code (e.g. LAX) or a 4-letter ICAO code (e.g. KLAX).".to_string(),
            )),
        }
    }

    fn query(&self) -> (&'static str, &str) {
        match self {
            AirportCode::Iata(code) => ("iata", code),
            AirportCode::Icao(code) => ("icao", code),
        }
    }
}

pub async fn fetch_airport(client: &reqwest::Client, base_url: &str, code: &AirportCode) -> Result<AirportInfo, Error> {
    let (key, value) = code.query();
    let response = client.get(base_url).query(&[(key, value)]).send().await?;
    if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
        return Err(Error::Api(format!("Airport lookup returned {}", response.status())));
    }

    let info: AirportInfo = response.json().await?;
    let found = info.status.map_or(true, |s| s == 200) && info.name.as_deref().is_some_and(|n| !n.is_empty());
    if !found {
        return Err(Error::NotFound(format!("No airport found for `{}`.", value)));
    }
    Ok(info)
}

pub async fn fetch_metar(client: &reqwest::Client, base_url: &str, icao: &str) -> Result<MetarReport, Error> {
    let response = client
        .get(base_url)
        .query(&[("ids", icao), ("format", "json")])
        .send()
        .await?;

    // No data is reported as an empty 204.
    if response.status() == StatusCode::NO_CONTENT {
        return Err(Error::NotFound(format!("No METAR available for `{}`.", icao)));
    }
    if !response.status().is_success() {
        return Err(Error::Api(format!("METAR lookup returned {}", response.status())));
    }

    let reports: Vec<MetarReport> = response.json().await?;
    reports
        .into_iter()
        .next()
        .ok_or_else(|| Error::NotFound(format!("No METAR available for `{}`.", icao)))
}

pub fn flight_category_colour(category: Option<&str>) -> u32 {
    match category {
        Some("VFR") => 0x2ECC71,
        Some("MVFR") => 0x3498DB,
        Some("IFR") => 0xE74C3C,
        Some("LIFR") => 0xE91E63,
        _ => 0x95A5A6,
    }
}

fn value_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

pub fn wind_text(report: &MetarReport) -> String {
    let direction = value_text(report.wdir.as_ref());
    match (direction, report.wspd) {
        (_, Some(speed)) if speed == 0.0 => "Calm".to_string(),
        (Some(dir), Some(speed)) => {
            let dir = if dir.chars().all(|c| c.is_ascii_digit()) { format!("{}°", dir) } else { dir };
            match report.wgst {
                Some(gust) => format!("{} at {:.0} kt, gusting {:.0} kt", dir, speed, gust),
                None => format!("{} at {:.0} kt", dir, speed),
            }
        }
        _ => "N/A".to_string(),
    }
}

/// Airport information and weather
#[poise::command(slash_command, subcommands("info", "metar"), category = "SkySearch")]
pub async fn airport(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Look up an airport by IATA or ICAO code
#[poise::command(slash_command)]
pub async fn info(
    ctx: Context<'_>,
    #[description = "IATA (LAX) or ICAO (KLAX) code"] code: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    let code = AirportCode::parse(&code)?;
    let data = ctx.data();
    let airport = fetch_airport(&data.http, &data.config.apis.airport_url, &code).await?;

    let mut embed = CreateEmbed::new()
        .title(title_case(airport.name.as_deref().unwrap_or_default()))
        .field("ICAO", or_na(airport.icao.as_deref()), true)
        .field("IATA", or_na(airport.iata.as_deref()), true)
        .field("Location", or_na(airport.location.as_deref()), true)
        .field("Country", or_na(airport.country.as_deref()), true)
        .color(0x0099FF);

    if let (Some(lat), Some(lon)) = (&airport.latitude, &airport.longitude) {
        embed = embed.field(
            "Coordinates",
            format!("[{}, {}](https://www.google.com/maps/search/?api=1&query={},{})", lat, lon, lat, lon),
            false,
        );
    }
    if let Some(link) = &airport.link {
        embed = embed.url(link);
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

/// Show the latest METAR for an airport
#[poise::command(slash_command)]
pub async fn metar(
    ctx: Context<'_>,
    #[description = "ICAO code, e.g. KLAX"] icao: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    let icao = match AirportCode::parse(&icao)? {
        AirportCode::Icao(code) => code,
        AirportCode::Iata(_) => {
            return Err(Error::InvalidInput("METARs are looked up by 4-letter ICAO code.".to_string()))
        }
    };
    let data = ctx.data();
    let report = fetch_metar(&data.http, &data.config.apis.metar_url, &icao).await?;

    let embed = CreateEmbed::new()
        .title(format!("METAR {}", report.icao_id.as_deref().unwrap_or(&icao)))
        .description(format!("```{}```", truncate(report.raw.as_deref().unwrap_or("N/A"), EMBED_FIELD_LIMIT)))
        .field("Flight category", or_na(report.flight_category.as_deref()), true)
        .field("Wind", wind_text(&report), true)
        .field("Visibility", or_na(value_text(report.visib.as_ref()).map(|v| format!("{} SM", v))), true)
        .field("Temperature", or_na(report.temp.map(|t| format!("{:.1}°C", t))), true)
        .field("Dew point", or_na(report.dewp.map(|d| format!("{:.1}°C", d))), true)
        .field("Altimeter", or_na(report.altim.map(|a| format!("{:.1} hPa", a))), true)
        .footer(CreateEmbedFooter::new(format!(
            "{} · {}",
            report.name.as_deref().unwrap_or(&icao),
            report.report_time.as_deref().unwrap_or("time unknown")
        )))
        .color(flight_category_colour(report.flight_category.as_deref()));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}
