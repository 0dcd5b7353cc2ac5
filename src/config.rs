// config.rs
use serde::Deserialize;
use std::time::Duration;
use tokio::io::AsyncReadExt;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub bot_token: String,
    pub database_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub skysearch: SkySearchConfig,
    #[serde(default)]
    pub apis: ApiConfig,
    #[serde(default)]
    pub ghostping: GhostPingConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SkySearchConfig {
    pub primary_api_url: String,
    pub fallback_api_url: Option<String>,
    /// Sent as the `api-auth` header to the primary endpoint only.
    pub api_key: Option<String>,
    pub photo_api_url: String,
    pub photo_cache_ttl_secs: u64,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub landed_altitude_ft: f64,
    pub ignored_hexes: Vec<String>,
}

impl Default for SkySearchConfig {
    fn default() -> Self {
        Self {
            primary_api_url: "https://api.airplanes.live/v2".to_string(),
            fallback_api_url: Some("https://api.adsb.lol/v2".to_string()),
            api_key: None,
            photo_api_url: "https://api.planespotters.net/pub/photos".to_string(),
            photo_cache_ttl_secs: 6 * 60 * 60,
            poll_interval_secs: 300,
            request_timeout_secs: 10,
            landed_altitude_ft: 25.0,
            ignored_hexes: vec!["000000".to_string()],
        }
    }
}

impl SkySearchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(30))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bible_url: String,
    pub enumber_url: String,
    pub enumber_cache_ttl_secs: u64,
    pub radiosonde_url: String,
    pub airport_url: String,
    pub metar_url: String,
    pub xkcd_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bible_url: "https://bible-api.com".to_string(),
            enumber_url: "https://world.openfoodfacts.org/api/v2/taxonomy".to_string(),
            enumber_cache_ttl_secs: 24 * 60 * 60,
            radiosonde_url: "https://api.v2.sondehub.org".to_string(),
            airport_url: "https://www.airport-data.com/api/ap_info.json".to_string(),
            metar_url: "https://aviationweather.gov/api/data/metar".to_string(),
            xkcd_url: "https://xkcd.com".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GhostPingConfig {
    pub window_secs: i64,
}

impl Default for GhostPingConfig {
    fn default() -> Self {
        Self { window_secs: 60 }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub max_seconds: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self { max_seconds: 60 }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub async fn load() -> Result<Self, crate::error::Error> {
        let mut file = tokio::fs::File::open("config.toml").await?;
        let mut contents = String::new();
        AsyncReadExt::read_to_string(&mut file, &mut contents).await?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, crate::error::Error> {
        toml::from_str(contents).map_err(Into::into)
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::parse(
            r#"
            bot_token = "token"
            database_url = "postgres://localhost/bot"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.skysearch.poll_interval_secs, 300);
        assert_eq!(config.skysearch.ignored_hexes, vec!["000000".to_string()]);
        assert_eq!(config.ghostping.window_secs, 60);
        assert_eq!(config.recording.max_seconds, 60);
        assert_eq!(config.apis.xkcd_url, "https://xkcd.com");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            bot_token = "token"
            database_url = "postgres://localhost/bot"
            log_level = "debug"

            [skysearch]
            api_key = "secret"
            poll_interval_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.tracing_level(), tracing::Level::DEBUG);
        assert_eq!(config.skysearch.api_key.as_deref(), Some("secret"));
        assert_eq!(config.skysearch.primary_api_url, "https://api.airplanes.live/v2");
        // Very short intervals are raised to the floor.
        assert_eq!(config.skysearch.poll_interval(), Duration::from_secs(30));
    }

    #[test]
    fn missing_token_is_an_error() {
        assert!(matches!(
            Config::parse("database_url = \"x\""),
            Err(crate::error::Error::Config(_))
        ));
    }

    #[test]
    fn example_config_parses() {
        let config = Config::parse(include_str!("../config.example.toml")).unwrap();
        assert_eq!(config.skysearch.fallback_api_url.as_deref(), Some("https://api.adsb.lol/v2"));
        assert_eq!(config.ghostping.window_secs, 60);
        assert_eq!(config.recording.max_seconds, 60);
        assert_eq!(config.tracing_level(), tracing::Level::INFO);
    }
}
