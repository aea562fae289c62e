//! Application state management

use crate::auth::{AuthService, JwtConfig, PgUserRepository, UserRepository};
use crate::media::{HostedStorage, MediaProxy, MediaRepository, ObjectStorage, PgMediaRepository};
use anyhow::Context;
use sitevault_core::AppConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Credential store
    pub users: Arc<dyn UserRepository>,
    /// Login, token and account operations
    pub auth: AuthService,
    /// Media range proxy
    pub media: MediaProxy,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
}

impl AppState {
    /// Assemble state from already-built collaborators
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserRepository>,
        media: Arc<dyn MediaRepository>,
        storage: Arc<dyn ObjectStorage>,
    ) -> anyhow::Result<Self> {
        let auth = AuthService::new(users.clone(), JwtConfig::from(&config.auth));
        let media = MediaProxy::new(media, storage, config.media.clone())
            .context("failed to build media HTTP client")?;

        Ok(Self {
            config,
            users,
            auth,
            media,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
        })
    }

    /// Connect to Postgres and the object store described by `config`
    pub async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let users = PgUserRepository::connect(&config.database.url, config.database.pool_size)
            .await
            .context("failed to connect to the credential store")?;
        let media = PgMediaRepository::from_pool(users.pool().clone());
        let storage = HostedStorage::new(
            &config.storage,
            Duration::from_secs(config.media.upstream_timeout_secs),
        )
        .context("failed to build storage client")?;

        Self::new(config, Arc::new(users), Arc::new(media), Arc::new(storage))
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
