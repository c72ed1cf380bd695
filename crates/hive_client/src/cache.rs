//! Response cache with tag-style invalidation.
//!
//! Wraps any [`SessionApi`]. List responses are cached per limit and full
//! sessions per id. Mutations invalidate whatever they can have changed:
//! `create` drops every cached list, `update` and `delete` drop lists and the
//! touched session, and an agent query drops the session it was sent to.
//!
//! Agent replies and other clients change sessions without going through
//! this wrapper, so every entry also expires after a TTL. A zero TTL turns
//! caching off.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use hive_core::{RemoteSession, SessionPatch, SessionSummary};

use crate::api::{AgentQuery, SessionApi};
use crate::error::ClientResult;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

struct Entry<T> {
    value: T,
    stored_at: Instant,
}

impl<T: Clone> Entry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
        }
    }

    fn fresh(&self, ttl: Duration) -> Option<T> {
        (self.stored_at.elapsed() < ttl).then(|| self.value.clone())
    }
}

pub struct CachedSessionApi<A> {
    inner: A,
    ttl: Duration,
    lists: Mutex<HashMap<usize, Entry<Vec<SessionSummary>>>>,
    sessions: Mutex<HashMap<String, Entry<RemoteSession>>>,
}

impl<A: SessionApi> CachedSessionApi<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            ttl: DEFAULT_CACHE_TTL,
            lists: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn invalidate_lists(&self) {
        self.lists.lock().clear();
    }

    pub fn invalidate_session(&self, id: &str) {
        self.sessions.lock().remove(id);
    }

    pub fn invalidate_all(&self) {
        self.invalidate_lists();
        self.sessions.lock().clear();
    }

    /// True while a fresh list response for `limit` is held.
    pub fn is_list_cached(&self, limit: usize) -> bool {
        self.cached_list(limit).is_some()
    }

    pub fn is_session_cached(&self, id: &str) -> bool {
        self.cached_session(id).is_some()
    }

    fn cached_list(&self, limit: usize) -> Option<Vec<SessionSummary>> {
        let mut lists = self.lists.lock();
        let fresh = lists.get(&limit)?.fresh(self.ttl);
        if fresh.is_none() {
            lists.remove(&limit);
        }
        fresh
    }

    fn cached_session(&self, id: &str) -> Option<RemoteSession> {
        let mut sessions = self.sessions.lock();
        let fresh = sessions.get(id)?.fresh(self.ttl);
        if fresh.is_none() {
            sessions.remove(id);
        }
        fresh
    }
}

#[async_trait]
impl<A: SessionApi> SessionApi for CachedSessionApi<A> {
    async fn list_sessions(&self, limit: usize) -> ClientResult<Vec<SessionSummary>> {
        if let Some(cached) = self.cached_list(limit) {
            trace!(limit, "Session list served from cache");
            return Ok(cached);
        }
        let fresh = self.inner.list_sessions(limit).await?;
        if !self.ttl.is_zero() {
            self.lists.lock().insert(limit, Entry::new(fresh.clone()));
        }
        Ok(fresh)
    }

    async fn create_session(&self, title: Option<String>) -> ClientResult<SessionSummary> {
        let created = self.inner.create_session(title).await?;
        self.invalidate_lists();
        Ok(created)
    }

    async fn get_session(&self, id: &str) -> ClientResult<RemoteSession> {
        if let Some(cached) = self.cached_session(id) {
            trace!(session = %id, "Session served from cache");
            return Ok(cached);
        }
        let fresh = self.inner.get_session(id).await?;
        if !self.ttl.is_zero() {
            self.sessions
                .lock()
                .insert(id.to_string(), Entry::new(fresh.clone()));
        }
        Ok(fresh)
    }

    async fn update_session(&self, id: &str, patch: SessionPatch) -> ClientResult<()> {
        self.inner.update_session(id, patch).await?;
        self.invalidate_lists();
        self.invalidate_session(id);
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> ClientResult<()> {
        self.inner.delete_session(id).await?;
        self.invalidate_lists();
        self.invalidate_session(id);
        Ok(())
    }

    async fn query_agent(&self, query: AgentQuery) -> ClientResult<()> {
        let session_id = query.session_id.clone();
        self.inner.query_agent(query).await?;
        self.invalidate_session(&session_id);
        self.invalidate_lists();
        Ok(())
    }

    async fn health(&self) -> ClientResult<()> {
        self.inner.health().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::InMemorySessionApi;

    #[tokio::test]
    async fn test_list_is_cached_until_create() {
        let api = CachedSessionApi::new(InMemorySessionApi::new());
        api.list_sessions(10).await.unwrap();
        api.list_sessions(10).await.unwrap();
        assert_eq!(api.inner().call_count("list_sessions"), 1);

        api.create_session(Some("New".to_string())).await.unwrap();
        assert!(!api.is_list_cached(10));
        let listed = api.list_sessions(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(api.inner().call_count("list_sessions"), 2);
    }

    #[tokio::test]
    async fn test_update_invalidates_session_and_lists() {
        let api = CachedSessionApi::new(InMemorySessionApi::new());
        let created = api.create_session(None).await.unwrap();
        let id = created.session_id;

        api.get_session(&id).await.unwrap();
        api.list_sessions(5).await.unwrap();
        assert!(api.is_session_cached(&id));

        api.update_session(&id, SessionPatch::title("Renamed"))
            .await
            .unwrap();
        assert!(!api.is_session_cached(&id));
        assert!(!api.is_list_cached(5));

        let fetched = api.get_session(&id).await.unwrap();
        assert_eq!(fetched.summary.title.as_deref(), Some("Renamed"));
        assert_eq!(api.inner().call_count("get_session"), 2);
    }

    #[tokio::test]
    async fn test_delete_invalidates() {
        let api = CachedSessionApi::new(InMemorySessionApi::new());
        let id = api.create_session(None).await.unwrap().session_id;
        api.get_session(&id).await.unwrap();

        api.delete_session(&id).await.unwrap();
        assert!(!api.is_session_cached(&id));
        assert!(api.get_session(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_out_of_band_reply_seen_after_ttl() {
        let api = CachedSessionApi::new(InMemorySessionApi::new().with_echo_replies())
            .with_ttl(Duration::from_millis(20));
        let id = api.create_session(None).await.unwrap().session_id;
        assert!(api.get_session(&id).await.unwrap().messages.is_empty());

        // Sent around the wrapper, so nothing is invalidated.
        api.inner()
            .query_agent(AgentQuery {
                session_id: id.clone(),
                query: "status?".to_string(),
                explicit_agent: None,
            })
            .await
            .unwrap();
        assert!(api.get_session(&id).await.unwrap().messages.is_empty());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!api.is_session_cached(&id));
        let fetched = api.get_session(&id).await.unwrap();
        assert_eq!(fetched.messages.len(), 2);
        assert_eq!(api.inner().call_count("get_session"), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_caching() {
        let api = CachedSessionApi::new(InMemorySessionApi::new()).with_ttl(Duration::ZERO);
        api.list_sessions(10).await.unwrap();
        api.list_sessions(10).await.unwrap();
        assert!(!api.is_list_cached(10));
        assert_eq!(api.inner().call_count("list_sessions"), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let api = CachedSessionApi::new(InMemorySessionApi::new());
        api.inner().fail_with("down");
        assert!(api.list_sessions(10).await.is_err());
        api.inner().recover();
        assert!(api.list_sessions(10).await.is_ok());
        assert!(api.is_list_cached(10));
    }
}
