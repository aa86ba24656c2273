use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::utils::time::{Clock, SystemClock};

use api_client::{HttpSessionApi, SessionApi};
use session_service::{SessionController, SessionSettings};
use start_time_store::{FileStartTimeStore, RedisStartTimeStore, StartTimeStore};

/// Shared collaborators for every session opened by this process.
pub struct SessionRuntime {
    pub config: Config,
    pub api: Arc<dyn SessionApi>,
    pub store: Arc<dyn StartTimeStore>,
    pub clock: Arc<dyn Clock>,
}

impl SessionRuntime {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let api = HttpSessionApi::new(
            &config.api_base_url,
            Duration::from_millis(config.api_timeout_ms),
        )
        .context("Failed to build interview API client")?;

        let store: Arc<dyn StartTimeStore> = match &config.redis_uri {
            Some(uri) => Arc::new(RedisStartTimeStore::connect(uri).await?),
            None => {
                tracing::info!("Start times kept in {}", config.storage_path);
                Arc::new(FileStartTimeStore::new(&config.storage_path))
            }
        };

        Ok(Self {
            config,
            api: Arc::new(api),
            store,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn controller(&self, token: &str) -> SessionController {
        SessionController::new(
            token,
            Arc::clone(&self.api),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            SessionSettings::from(&self.config),
        )
    }
}

pub mod answer_store;
pub mod anticheat_service;
pub mod api_client;
pub mod catalog;
pub mod consent;
pub mod session_service;
pub mod start_time_store;
pub mod timer_service;
