//! Application state.
//!
//! [`AppState`] owns everything a running client needs: the configuration,
//! the shared store, the API client, the sync driver and the optional health
//! monitor. It is created once with [`AppState::init`] and torn down with
//! [`AppState::teardown`]; consumers borrow it or clone the handles they need.

use std::sync::Arc;

use tracing::info;

use crate::api::{HttpSessionApi, SessionApi};
use crate::cache::CachedSessionApi;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::health::{HealthMonitor, HealthReport};
use crate::mock::InMemorySessionApi;
use crate::sync::{shared_store, SessionSync, SharedStore};

pub struct AppState {
    config: ClientConfig,
    store: SharedStore,
    sync: SessionSync<dyn SessionApi>,
    health: Option<HealthMonitor>,
}

impl AppState {
    /// Wire a fresh store to `api`.
    pub fn init(config: ClientConfig, api: Arc<dyn SessionApi>) -> Self {
        let store = shared_store();
        let sync = SessionSync::new(api, Arc::clone(&store), &config);
        Self {
            config,
            store,
            sync,
            health: None,
        }
    }

    /// State backed by the HTTP API at `config.api_base_url`, with caching.
    pub fn connect(config: ClientConfig) -> ClientResult<Self> {
        let http = HttpSessionApi::new(&config)?;
        info!(url = %http.base_url(), auth = config.auth_enabled, "Connecting to AgentHive backend");
        let api: Arc<dyn SessionApi> = Arc::new(CachedSessionApi::new(http).with_ttl(config.cache_ttl));
        Ok(Self::init(config, api))
    }

    /// State backed by an in-process backend, for offline use.
    pub fn offline(config: ClientConfig) -> Self {
        info!("Using in-memory backend");
        Self::init(config, Arc::new(InMemorySessionApi::new()))
    }

    /// Start polling backend health. Must be called inside a tokio runtime.
    pub fn with_health_monitor(mut self) -> Self {
        if self.health.is_none() {
            self.health = Some(HealthMonitor::spawn(
                Arc::clone(self.sync.api()),
                &self.config,
            ));
        }
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn api(&self) -> &Arc<dyn SessionApi> {
        self.sync.api()
    }

    pub fn sync(&self) -> &SessionSync<dyn SessionApi> {
        &self.sync
    }

    pub fn health(&self) -> Option<&HealthMonitor> {
        self.health.as_ref()
    }

    pub fn health_report(&self) -> Option<HealthReport> {
        self.health.as_ref().map(HealthMonitor::latest)
    }

    /// Stop background work. The store stays readable through any cloned
    /// handle after this returns.
    pub async fn teardown(self) {
        if let Some(monitor) = self.health {
            monitor.shutdown().await;
        }
        info!(
            sessions = self.store.read().await.session_count(),
            "Client state torn down"
        );
    }
}
