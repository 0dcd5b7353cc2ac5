// main.rs
mod cache;
mod commands;
mod config;
mod database;
mod error;
mod events;
mod skysearch;
mod utils;

use crate::cache::TtlCache;
use crate::commands::enumber::AdditiveCache;
use crate::commands::{Adventure, RecordingBuffer};
use crate::config::Config;
use crate::database::Database;
use crate::error::Error;
use crate::skysearch::{EmergencyPoller, PhotoLookup, SkySearchApi};
use poise::serenity_prelude as serenity;
use serenity::GatewayIntents;
use songbird::driver::DecodeMode;
use songbird::SerenityInit;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct Data {
    pub config: Arc<Config>,
    pub database: Database,
    pub http: reqwest::Client,
    pub skysearch: SkySearchApi,
    pub photos: PhotoLookup,
    pub enumbers: Arc<AdditiveCache>,
    adventures: Arc<Mutex<HashMap<u64, Adventure>>>,
    recordings: Arc<Mutex<HashMap<u64, Arc<Mutex<RecordingBuffer>>>>>,
}

impl Data {
    fn new(config: Config, database: Database) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.skysearch.request_timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let skysearch = SkySearchApi::new(http.clone(), &config.skysearch);
        let photos = PhotoLookup::new(
            http.clone(),
            &config.skysearch.photo_api_url,
            Duration::from_secs(config.skysearch.photo_cache_ttl_secs),
        );
        let enumbers = Arc::new(TtlCache::new(Duration::from_secs(config.apis.enumber_cache_ttl_secs)));

        Ok(Self {
            config: Arc::new(config),
            database,
            http,
            skysearch,
            photos,
            enumbers,
            adventures: Arc::new(Mutex::new(HashMap::new())),
            recordings: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Adventure sessions keyed by user id.
    pub fn adventures_lock(&self) -> MutexGuard<'_, HashMap<u64, Adventure>> {
        self.adventures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Active voice recordings keyed by guild id.
    pub fn recordings_lock(&self) -> MutexGuard<'_, HashMap<u64, Arc<Mutex<RecordingBuffer>>>> {
        self.recordings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            if error.is_user_facing() {
                info!("Command `{}` rejected: {}", ctx.command().qualified_name, error);
            } else {
                error!("Error in command `{}`: {:?}", ctx.command().qualified_name, error);
            }

            let reply = poise::CreateReply::default()
                .content(format!("⚠️ {}", error))
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                warn!("Failed to report command error: {}", e);
            }
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            error!("Error handling {} event: {}", event.snake_case_name(), error);
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load().await?;

    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .init();

    let database = Database::connect(&config.database_url).await?;
    database.migrate().await?;

    let token = config.bot_token.clone();
    let data = Data::new(config, database)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::get_commands(),
            on_error: |error| Box::pin(on_error(error)),
            pre_command: |ctx| {
                Box::pin(async move {
                    info!("{} invoked /{}", ctx.author().name, ctx.command().qualified_name);
                })
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::handle_event(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Registered {} commands as {}", framework.options().commands.len(), ready.user.name);

                EmergencyPoller::new(
                    data.skysearch.clone(),
                    data.database.clone(),
                    ctx.http.clone(),
                    data.config.skysearch.clone(),
                )
                .spawn(shutdown_rx);

                Ok(data)
            })
        })
        .build();

    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;
    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .register_songbird_from_config(songbird::Config::default().decode_mode(DecodeMode::Decode))
        .await?;

    // Deleted messages are looked up in the cache for ghost-ping reports.
    client.cache.set_max_messages(1000);

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        info!("Shutting down");
        let _ = shutdown_tx.send(true);
        shard_manager.shutdown_all().await;
    });

    client.start_autosharded().await.map_err(Error::from)
}
