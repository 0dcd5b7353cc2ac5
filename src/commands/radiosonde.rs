// commands/radiosonde.rs
use crate::error::Error;
use crate::utils::or_na;
use crate::Data;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

type Context<'a> = poise::Context<'a, Data, Error>;

#[derive(Debug, Clone, Deserialize)]
pub struct SondeFrame {
    pub serial: Option<String>,
    #[serde(rename = "type")]
    pub sonde_type: Option<String>,
    pub subtype: Option<String>,
    pub datetime: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<f64>,
    pub vel_v: Option<f64>,
    pub vel_h: Option<f64>,
    pub heading: Option<f64>,
    pub temp: Option<f64>,
    pub humidity: Option<f64>,
    pub frequency: Option<f64>,
    pub uploader_callsign: Option<String>,
}

impl SondeFrame {
    pub fn status(&self) -> &'static str {
        match self.vel_v {
            Some(v) if v > 1.0 => "Ascending",
            Some(v) if v < -1.0 => "Descending",
            Some(_) => "Landed or floating",
            None => "Unknown",
        }
    }
}

pub fn validate_serial(serial: &str) -> Result<String, Error> {
    let serial = serial.trim().to_uppercase();
    let valid = (3..=20).contains(&serial.len())
        && serial.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(Error::InvalidInput("That doesn't look like a radiosonde serial.".to_string()));
    }
    Ok(serial)
}

/// Newest telemetry frame for `serial` over the last three hours.
pub async fn fetch_latest_frame(client: &reqwest::Client, base_url: &str, serial: &str) -> Result<SondeFrame, Error> {
    let url = format!("{}/sondes/telemetry", base_url.trim_end_matches('/'));
    let response = client
        .get(&url)
        .query(&[("serial", serial), ("duration", "3h")])
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(Error::Api(format!("SondeHub returned {}", response.status())));
    }

    // serial -> timestamp -> frame. ISO-8601 timestamps sort chronologically.
    let mut body: HashMap<String, BTreeMap<String, SondeFrame>> = response.json().await?;
    body.remove(serial)
        .and_then(|frames| frames.into_values().next_back())
        .ok_or_else(|| Error::NotFound(format!("No recent telemetry for sonde `{}`.", serial)))
}

/// Track a weather balloon radiosonde on SondeHub
#[poise::command(slash_command, category = "Lookups")]
pub async fn sonde(
    ctx: Context<'_>,
    #[description = "Sonde serial, e.g. S1234567"] serial: String,
) -> Result<(), Error> {
    let serial = validate_serial(&serial)?;
    ctx.defer().await?;

    let data = ctx.data();
    let frame = fetch_latest_frame(&data.http, &data.config.apis.radiosonde_url, &serial).await?;

    let sonde_type = match (&frame.sonde_type, &frame.subtype) {
        (Some(t), Some(sub)) => format!("{} ({})", t, sub),
        (Some(t), None) => t.clone(),
        _ => "N/A".to_string(),
    };

    let mut embed = CreateEmbed::new()
        .title(format!("Radiosonde {}", frame.serial.as_deref().unwrap_or(&serial)))
        .url(format!("https://sondehub.org/{}", serial))
        .field("Status", frame.status(), true)
        .field("Type", sonde_type, true)
        .field("Frequency", or_na(frame.frequency.map(|f| format!("{:.3} MHz", f))), true)
        .field("Altitude", or_na(frame.alt.map(|a| format!("{:.0} m", a))), true)
        .field("Vertical speed", or_na(frame.vel_v.map(|v| format!("{:.1} m/s", v))), true)
        .field("Ground speed", or_na(frame.vel_h.map(|v| format!("{:.1} m/s", v))), true)
        .field("Temperature", or_na(frame.temp.map(|t| format!("{:.1}°C", t))), true)
        .field("Humidity", or_na(frame.humidity.map(|h| format!("{:.0}%", h))), true)
        .color(0x1ABC9C);

    if let (Some(lat), Some(lon)) = (frame.lat, frame.lon) {
        embed = embed.field("Position", format!("{:.5}, {:.5}", lat, lon), false);
    }
    embed = embed.footer(CreateEmbedFooter::new(format!(
        "Last frame {} via {}",
        frame.datetime.as_deref().unwrap_or("unknown"),
        frame.uploader_callsign.as_deref().unwrap_or("unknown")
    )));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn serial_validation() {
        assert_eq!(validate_serial(" s1234567 ").unwrap(), "S1234567");
        assert!(validate_serial("ab").is_err());
        assert!(validate_serial("S123/../x").is_err());
    }

    #[tokio::test]
    async fn picks_newest_frame() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/sondes/telemetry").query_param("serial", "S1234567");
                then.status(200).json_body(serde_json::json!({
                    "S1234567": {
                        "2024-05-01T10:00:00.000000Z": {"serial": "S1234567", "alt": 1000.0, "vel_v": 5.0},
                        "2024-05-01T11:30:00.000000Z": {"serial": "S1234567", "alt": 30000.0, "vel_v": -12.0},
                        "2024-05-01T11:00:00.000000Z": {"serial": "S1234567", "alt": 25000.0, "vel_v": 5.0}
                    }
                }));
            })
            .await;

        let frame = fetch_latest_frame(&reqwest::Client::new(), &server.base_url(), "S1234567").await.unwrap();
        assert_eq!(frame.alt, Some(30000.0));
        assert_eq!(frame.status(), "Descending");
    }

    #[tokio::test]
    async fn no_frames_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/sondes/telemetry");
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;

        let result = fetch_latest_frame(&reqwest::Client::new(), &server.base_url(), "T0000000").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
