//! Session synchronisation.
//!
//! [`SessionSync`] issues backend calls and reconciles the responses into the
//! shared [`HiveStore`]. The store lock is only taken around the reconcile
//! step, never across a network await. Every failure is recorded in the
//! store's error slot and also returned to the caller.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use hive_core::{
    derive_title, AddOutcome, ChatMessage, ChatSession, HiveStore, RemoteSession, SessionId,
    SessionPatch,
};

use crate::api::{AgentQuery, SessionApi};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::reconnect::ReconnectPolicy;

/// The store handle shared between sync, CLI and any other consumer.
pub type SharedStore = Arc<RwLock<HiveStore>>;

pub fn shared_store() -> SharedStore {
    Arc::new(RwLock::new(HiveStore::new()))
}

/// Drives a [`SessionApi`] and feeds its results into a [`SharedStore`]
pub struct SessionSync<A: ?Sized> {
    api: Arc<A>,
    store: SharedStore,
    readiness: ReconnectPolicy,
    list_limit: usize,
}

impl<A: ?Sized> Clone for SessionSync<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            store: Arc::clone(&self.store),
            readiness: self.readiness,
            list_limit: self.list_limit,
        }
    }
}

impl<A: SessionApi + ?Sized> SessionSync<A> {
    pub fn new(api: Arc<A>, store: SharedStore, config: &ClientConfig) -> Self {
        Self {
            api,
            store,
            readiness: config.readiness,
            list_limit: config.session_list_limit,
        }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Load the session list and merge it into the store.
    pub async fn refresh_sessions(&self) -> ClientResult<usize> {
        self.store.write().await.begin_request();
        match self.api.list_sessions(self.list_limit).await {
            Ok(summaries) => {
                self.store.write().await.apply_session_list(&summaries);
                debug!(count = summaries.len(), "Refreshed sessions");
                Ok(summaries.len())
            }
            Err(e) => Err(self.record_failure("load sessions", e).await),
        }
    }

    /// Fetch one session with its messages and make it active.
    pub async fn open_session(&self, id: &str) -> ClientResult<ChatSession> {
        self.store.write().await.begin_request();
        let remote = match self.api.get_session(id).await {
            Ok(remote) => remote,
            Err(e) => return Err(self.record_failure("load session", e).await),
        };

        let mut store = self.store.write().await;
        store.apply_session_fetched(&remote);
        store.set_active_session(Some(id))?;
        store
            .session_view(id)
            .ok_or_else(|| ClientError::SessionNotFound(id.to_string()))
    }

    /// Fetch every known session concurrently. Individual failures are
    /// logged and skipped; returns how many sessions were hydrated.
    pub async fn hydrate_sessions(&self) -> usize {
        let ids: Vec<SessionId> = {
            let store = self.store.read().await;
            store.sessions().map(|s| s.id.clone()).collect()
        };

        let results = join_all(ids.iter().map(|id| self.api.get_session(id))).await;

        let mut store = self.store.write().await;
        let mut hydrated = 0;
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(remote) => {
                    store.apply_session_fetched(&remote);
                    hydrated += 1;
                }
                Err(e) => warn!(session = %id, error = %e, "Failed to hydrate session"),
            }
        }
        info!(hydrated, total = ids.len(), "Hydrated sessions");
        hydrated
    }

    /// Create a session on the backend, wait until it can be read back,
    /// then add it to the store as the active session.
    pub async fn create_session(&self, title: Option<String>) -> ClientResult<SessionId> {
        self.store.write().await.begin_request();
        let created = match self.api.create_session(title).await {
            Ok(created) => created,
            Err(e) => return Err(self.record_failure("create session", e).await),
        };
        let id = created.session_id.clone();

        let remote = match self.wait_until_ready(&id).await {
            Ok(remote) => remote,
            Err(e) => return Err(self.record_failure("create session", e).await),
        };

        let mut store = self.store.write().await;
        store.apply_session_created(&created);
        store.apply_session_fetched(&remote);
        info!(session = %id, "Created session");
        Ok(id)
    }

    /// Poll `get_session` with backoff until the backend serves `id`.
    ///
    /// Only "not found" is retried; any other error is returned at once.
    pub async fn wait_until_ready(&self, id: &str) -> ClientResult<RemoteSession> {
        let mut backoff = self.readiness.backoff();
        loop {
            match self.api.get_session(id).await {
                Ok(remote) => return Ok(remote),
                Err(e) if e.is_not_found() => match backoff.next_delay() {
                    Some(delay) => {
                        debug!(session = %id, ?delay, "Session not readable yet");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        return Err(ClientError::NotReady {
                            session_id: id.to_string(),
                            attempts: backoff.attempts() + 1,
                        })
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn rename_session(&self, id: &str, title: impl Into<String>) -> ClientResult<()> {
        self.update(id, SessionPatch::title(title), "rename session")
            .await
    }

    pub async fn set_pinned(&self, id: &str, pinned: bool) -> ClientResult<()> {
        self.update(id, SessionPatch::pinned(pinned), "update session")
            .await
    }

    async fn update(&self, id: &str, patch: SessionPatch, operation: &str) -> ClientResult<()> {
        self.store.write().await.begin_request();
        if let Err(e) = self.api.update_session(id, patch.clone()).await {
            return Err(self.record_failure(operation, e).await);
        }
        let mut store = self.store.write().await;
        if store.session(id).is_none() {
            // Not listed locally yet; pick it up with the next refresh.
            debug!(session = %id, "Updated session unknown locally");
            store.finish_request();
            return Ok(());
        }
        store.apply_session_updated(id, &patch)?;
        Ok(())
    }

    pub async fn delete_session(&self, id: &str) -> ClientResult<()> {
        self.store.write().await.begin_request();
        if let Err(e) = self.api.delete_session(id).await {
            return Err(self.record_failure("delete session", e).await);
        }
        self.store.write().await.apply_session_deleted(id);
        info!(session = %id, "Deleted session");
        Ok(())
    }

    /// Send a user message to the active session and query the agent.
    ///
    /// When no session is active a backend session is created first, titled
    /// after the message. The message goes through the store's duplicate
    /// guard; a dropped duplicate is not sent to the backend again. When the
    /// query fails the message is taken back out of the store.
    pub async fn send_message(
        &self,
        text: &str,
        agent: Option<String>,
    ) -> ClientResult<AddOutcome> {
        let has_session = {
            let store = self.store.read().await;
            store
                .active_session_id()
                .map_or(false, |id| store.session(id).is_some())
        };
        if !has_session {
            self.create_session(Some(derive_title(text))).await?;
        }

        let mut message = ChatMessage::user(text);
        if let Some(agent) = &agent {
            message = message.with_agent(agent.clone());
        }
        let outcome = self.store.write().await.add_message(message)?;
        if outcome.is_duplicate() {
            return Ok(outcome);
        }

        let query = AgentQuery {
            session_id: outcome.session_id().to_string(),
            query: text.to_string(),
            explicit_agent: agent,
        };
        if let Err(e) = self.api.query_agent(query).await {
            let mut store = self.store.write().await;
            if let AddOutcome::Added { message_id, .. } = &outcome {
                // Unsent, so a retry must not be caught by the duplicate guard.
                let _ = store.remove_message(message_id);
            }
            store.fail_request("send message", &e);
            return Err(e);
        }
        debug!(session = %outcome.session_id(), "Agent query sent");
        Ok(outcome)
    }

    async fn record_failure(&self, operation: &str, error: ClientError) -> ClientError {
        self.store.write().await.fail_request(operation, &error);
        error
    }
}
