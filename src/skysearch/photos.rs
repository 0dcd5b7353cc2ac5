// skysearch/photos.rs
use crate::cache::TtlCache;
use crate::error::Error;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AircraftPhoto {
    pub image_url: String,
    pub link: Option<String>,
    pub photographer: Option<String>,
}

#[derive(Deserialize)]
struct PhotosResponse {
    #[serde(default)]
    photos: Vec<PhotoEntry>,
}

#[derive(Deserialize)]
struct PhotoEntry {
    thumbnail_large: Option<Thumbnail>,
    thumbnail: Option<Thumbnail>,
    link: Option<String>,
    photographer: Option<String>,
}

#[derive(Deserialize)]
struct Thumbnail {
    src: String,
}

/// Looks up aircraft photos by hex, remembering hits and misses.
#[derive(Clone)]
pub struct PhotoLookup {
    client: reqwest::Client,
    base_url: String,
    cache: Arc<TtlCache<String, Option<AircraftPhoto>>>,
}

impl PhotoLookup {
    pub fn new(client: reqwest::Client, base_url: &str, ttl: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Arc::new(TtlCache::new(ttl)),
        }
    }

    /// Never fails: lookup errors are logged and reported as "no photo".
    pub async fn photo_for(&self, hex: &str) -> Option<AircraftPhoto> {
        let hex = hex.to_lowercase();
        if let Some(cached) = self.cache.get(&hex) {
            return cached;
        }

        match self.fetch(&hex).await {
            Ok(photo) => {
                self.cache.insert(hex.clone(), photo.clone());
                debug!("Cached photo lookup for {} ({} entries)", hex, self.cache.len());
                photo
            }
            Err(e) => {
                warn!("Photo lookup for {} failed: {}", hex, e);
                None
            }
        }
    }

    async fn fetch(&self, hex: &str) -> Result<Option<AircraftPhoto>, Error> {
        let url = format!("{}/hex/{}", self.base_url, hex);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Api(format!("{} returned {}", url, response.status())));
        }

        let body: PhotosResponse = response.json().await?;
        Ok(body.photos.into_iter().find_map(|entry| {
            let image_url = entry.thumbnail_large.or(entry.thumbnail)?.src;
            Some(AircraftPhoto {
                image_url,
                link: entry.link,
                photographer: entry.photographer,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn photo_results_are_cached() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/hex/a1b2c3");
                then.status(200).json_body(serde_json::json!({
                    "photos": [{
                        "thumbnail": {"src": "https://img/small.jpg"},
                        "thumbnail_large": {"src": "https://img/large.jpg"},
                        "link": "https://planespotters/photo/1",
                        "photographer": "Jane"
                    }]
                }));
            })
            .await;

        let lookup = PhotoLookup::new(reqwest::Client::new(), &server.base_url(), Duration::from_secs(60));
        let first = lookup.photo_for("A1B2C3").await.unwrap();
        let second = lookup.photo_for("a1b2c3").await.unwrap();

        mock.assert_hits_async(1).await;
        assert_eq!(first, second);
        assert_eq!(first.image_url, "https://img/large.jpg");
        assert_eq!(first.photographer.as_deref(), Some("Jane"));
    }

    #[tokio::test]
    async fn empty_result_is_cached_as_miss() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.path("/hex/000001");
                then.status(200).json_body(serde_json::json!({"photos": []}));
            })
            .await;

        let lookup = PhotoLookup::new(reqwest::Client::new(), &server.base_url(), Duration::from_secs(60));
        assert!(lookup.photo_for("000001").await.is_none());
        assert!(lookup.photo_for("000001").await.is_none());
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.path("/hex/ffffff");
                then.status(500);
            })
            .await;

        let lookup = PhotoLookup::new(reqwest::Client::new(), &server.base_url(), Duration::from_secs(60));
        assert!(lookup.photo_for("ffffff").await.is_none());
        assert!(lookup.photo_for("ffffff").await.is_none());
        mock.assert_hits_async(2).await;
    }
}
