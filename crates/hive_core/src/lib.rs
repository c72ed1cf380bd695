//! # hive_core - Client data model for AgentHive
//!
//! This crate holds everything the AgentHive client knows about its
//! conversations, independent of how it talks to the backend:
//!
//! - **Types**: messages, sessions, folders, collaborative workflows, agents
//! - **Normalizer**: turns heterogeneous backend messages into a clean,
//!   de-duplicated, chronologically sorted list
//! - **Entity collections**: id-keyed storage with comparator-ordered ids
//! - **Store**: the single source of truth, with session views derived from
//!   the normalized collections
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   raw messages   ┌──────────────┐
//! │  Backend API │ ───────────────▶ │  Normalizer  │
//! └──────────────┘                  └──────┬───────┘
//!                                          ▼
//!                   ┌──────────────────────────────────────────┐
//!                   │                HiveStore                 │
//!                   │ users · agents · sessions · messages     │
//!                   │ folders · workflows (EntityCollection)   │
//!                   └──────────────────┬───────────────────────┘
//!                                      ▼
//!                            ChatSession views
//! ```

pub mod entity;
pub mod error;
pub mod normalizer;
pub mod store;
pub mod types;

pub use entity::{Entity, EntityCollection};
pub use error::{HiveError, HiveResult};
pub use normalizer::{
    char_match_ratio, dedupe_messages, is_fuzzy_duplicate, jaccard_similarity,
    normalize_messages, normalize_text, RawMessage,
};
pub use store::{
    derive_title, AddOutcome, HiveStore, MessageRecord, SessionEnsured, SessionRecord,
    AUTO_SESSION_FOLDER_NAME, DEFAULT_FOLDER_NAME, DUPLICATE_WINDOW_MS, TITLE_WORDS,
    UNTITLED_SESSION,
};
pub use types::*;
