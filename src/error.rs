use poise::serenity_prelude;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Serenity error: {0}")]
    Serenity(#[from] serenity_prelude::Error),

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Voice error: {0}")]
    Voice(#[from] songbird::error::JoinError),

    #[error("API error: {0}")]
    Api(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Errors caused by the user rather than by the bot or an upstream service.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::InvalidInput(_))
    }
}
