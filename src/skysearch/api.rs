// skysearch/api.rs
use crate::config::SkySearchConfig;
use crate::error::Error;
use crate::skysearch::aircraft::AircraftResponse;
use tracing::{debug, error, warn};

pub const MAX_RADIUS_NM: u32 = 250;

#[derive(Debug, Clone, PartialEq)]
pub enum AircraftQuery {
    Hex(String),
    Callsign(String),
    Registration(String),
    Type(String),
    Squawk(String),
    Military,
    Ladd,
    Pia,
    Radius { lat: f64, lon: f64, radius_nm: u32 },
}

impl AircraftQuery {
    pub fn path(&self) -> String {
        match self {
            AircraftQuery::Hex(hex) => format!("/hex/{}", segment(hex.trim_start_matches('~')).to_lowercase()),
            AircraftQuery::Callsign(callsign) => format!("/callsign/{}", segment(callsign).to_uppercase()),
            AircraftQuery::Registration(reg) => format!("/reg/{}", segment(reg).to_uppercase()),
            AircraftQuery::Type(type_code) => format!("/type/{}", segment(type_code).to_uppercase()),
            AircraftQuery::Squawk(code) => format!("/squawk/{}", segment(code)),
            AircraftQuery::Military => "/mil".to_string(),
            AircraftQuery::Ladd => "/ladd".to_string(),
            AircraftQuery::Pia => "/pia".to_string(),
            AircraftQuery::Radius { lat, lon, radius_nm } => format!(
                "/point/{:.4}/{:.4}/{}",
                lat,
                lon,
                (*radius_nm).clamp(1, MAX_RADIUS_NM)
            ),
        }
    }
}

/// Keeps only characters that are safe in a path segment.
fn segment(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

/// Client for the ADS-B `/v2` REST API with a primary and an optional fallback endpoint.
#[derive(Clone)]
pub struct SkySearchApi {
    client: reqwest::Client,
    primary: String,
    fallback: Option<String>,
    api_key: Option<String>,
}

impl SkySearchApi {
    pub fn new(client: reqwest::Client, config: &SkySearchConfig) -> Self {
        Self {
            client,
            primary: config.primary_api_url.trim_end_matches('/').to_string(),
            fallback: config
                .fallback_api_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
        }
    }

    /// Tries the primary endpoint, then the fallback once. No other retries.
    pub async fn fetch(&self, query: &AircraftQuery) -> Result<AircraftResponse, Error> {
        let path = query.path();
        let primary_error = match self.fetch_from(&self.primary, &path, self.api_key.as_deref()).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(primary_error);
        };

        warn!("Primary flight API failed for {}: {}; trying fallback", path, primary_error);
        self.fetch_from(fallback, &path, None).await.map_err(|fallback_error| {
            error!(
                "Both flight APIs failed for {}: primary: {}, fallback: {}",
                path, primary_error, fallback_error
            );
            fallback_error
        })
    }

    async fn fetch_from(&self, base: &str, path: &str, api_key: Option<&str>) -> Result<AircraftResponse, Error> {
        let url = format!("{}{}", base, path);
        debug!("GET {}", url);

        let mut request = self.client.get(&url);
        if let Some(key) = api_key {
            request = request.header("api-auth", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api(format!("{} returned {}", url, status)));
        }

        Ok(response.json::<AircraftResponse>().await?)
    }
}
