//! # hive_client - Backend access for the AgentHive client
//!
//! This crate connects the [`hive_core`] store to an AgentHive backend:
//!
//! - **Config**: defaults, `.agenthive/settings.json` and environment overrides
//! - **API**: the [`SessionApi`] trait with HTTP, cached and in-memory backends
//! - **Sync**: reconciles backend responses into the shared store, waiting for
//!   freshly created sessions with bounded backoff
//! - **Health**: periodic health probes, latency classification and reconnect
//! - **Preferences**: persisted drawer layout
//! - **State**: [`AppState`] ties the pieces together with an explicit lifecycle
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │   AppState   │────▶│ SessionSync  │────▶│ CachedSessionApi │
//! └──────┬───────┘     └──────┬───────┘     └────────┬─────────┘
//!        │                    ▼                      ▼
//!        │            ┌──────────────┐      ┌────────────────┐
//!        │            │  HiveStore   │      │ HttpSessionApi │
//!        │            └──────────────┘      └────────────────┘
//!        ▼
//! ┌──────────────┐
//! │HealthMonitor │──▶ watch::Receiver<HealthReport>
//! └──────────────┘
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod mock;
pub mod preferences;
pub mod reconnect;
pub mod state;
pub mod sync;

pub use api::{AgentQuery, HttpSessionApi, SessionApi};
pub use cache::CachedSessionApi;
pub use config::{ClientConfig, SettingsFile, DEFAULT_API_BASE_URL};
pub use error::{ClientError, ClientResult};
pub use health::{classify_latency, probe, ConnectionQuality, HealthMonitor, HealthReport};
pub use mock::InMemorySessionApi;
pub use preferences::{LayoutPreferences, PreferencesStore};
pub use reconnect::{Backoff, ReconnectPolicy};
pub use state::AppState;
pub use sync::{shared_store, SessionSync, SharedStore};
