//! In-memory session backend.
//!
//! Provides a configurable implementation of [`SessionApi`] for tests and
//! offline CLI runs without a live AgentHive backend. It can simulate
//! eventual consistency (a created session is invisible for the first few
//! reads), outages, and slow health checks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use hive_core::{RawMessage, RemoteSession, SessionPatch, SessionSummary};

use crate::api::{AgentQuery, SessionApi};
use crate::error::{ClientError, ClientResult};

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedCall {
    pub method: String,
    pub session_id: Option<String>,
}

/// In-memory [`SessionApi`]
#[derive(Default)]
pub struct InMemorySessionApi {
    sessions: RwLock<Vec<RemoteSession>>,
    calls: RwLock<Vec<CapturedCall>>,
    queries: RwLock<Vec<AgentQuery>>,
    /// Remaining reads for which each new session is still invisible
    pending_reads: RwLock<HashMap<String, u32>>,
    invisible_reads: AtomicU32,
    failure: RwLock<Option<String>>,
    unhealthy: AtomicBool,
    health_delay: RwLock<Duration>,
    echo_replies: AtomicBool,
}

impl InMemorySessionApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the backend with existing sessions.
    pub fn with_sessions(self, sessions: Vec<RemoteSession>) -> Self {
        *self.sessions.write() = sessions;
        self
    }

    /// New sessions return "not found" for the first `reads` fetches.
    pub fn with_invisible_reads(self, reads: u32) -> Self {
        self.invisible_reads.store(reads, Ordering::SeqCst);
        self
    }

    /// Answer every agent query with an assistant echo.
    pub fn with_echo_replies(self) -> Self {
        self.echo_replies.store(true, Ordering::SeqCst);
        self
    }

    /// Make every subsequent call fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.write() = Some(message.into());
    }

    pub fn recover(&self) {
        *self.failure.write() = None;
        self.unhealthy.store(false, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    pub fn set_health_delay(&self, delay: Duration) {
        *self.health_delay.write() = delay;
    }

    pub fn calls(&self) -> Vec<CapturedCall> {
        self.calls.read().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls.read().iter().filter(|c| c.method == method).count()
    }

    pub fn queries(&self) -> Vec<AgentQuery> {
        self.queries.read().clone()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions
            .read()
            .iter()
            .map(|s| s.summary.session_id.clone())
            .collect()
    }

    fn record(&self, method: &str, session_id: Option<&str>) -> ClientResult<()> {
        self.calls.write().push(CapturedCall {
            method: method.to_string(),
            session_id: session_id.map(str::to_string),
        });
        match self.failure.read().as_ref() {
            Some(message) => Err(ClientError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SessionApi for InMemorySessionApi {
    async fn list_sessions(&self, limit: usize) -> ClientResult<Vec<SessionSummary>> {
        self.record("list_sessions", None)?;
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .read()
            .iter()
            .map(|s| s.summary.clone())
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit);
        Ok(summaries)
    }

    async fn create_session(&self, title: Option<String>) -> ClientResult<SessionSummary> {
        self.record("create_session", None)?;
        let mut summary = SessionSummary::new(uuid::Uuid::new_v4().to_string());
        summary.title = title;

        let reads = self.invisible_reads.load(Ordering::SeqCst);
        if reads > 0 {
            self.pending_reads
                .write()
                .insert(summary.session_id.clone(), reads);
        }
        self.sessions.write().push(RemoteSession {
            summary: summary.clone(),
            messages: Vec::new(),
        });
        Ok(summary)
    }

    async fn get_session(&self, id: &str) -> ClientResult<RemoteSession> {
        self.record("get_session", Some(id))?;
        {
            let mut pending = self.pending_reads.write();
            if let Some(remaining) = pending.get_mut(id) {
                *remaining -= 1;
                if *remaining == 0 {
                    pending.remove(id);
                }
                return Err(ClientError::SessionNotFound(id.to_string()));
            }
        }
        self.sessions
            .read()
            .iter()
            .find(|s| s.summary.session_id == id)
            .cloned()
            .ok_or_else(|| ClientError::SessionNotFound(id.to_string()))
    }

    async fn update_session(&self, id: &str, patch: SessionPatch) -> ClientResult<()> {
        self.record("update_session", Some(id))?;
        let mut sessions = self.sessions.write();
        let session = sessions
            .iter_mut()
            .find(|s| s.summary.session_id == id)
            .ok_or_else(|| ClientError::SessionNotFound(id.to_string()))?;
        if let Some(title) = patch.title {
            session.summary.title = Some(title);
        }
        if let Some(pinned) = patch.pinned {
            session.summary.pinned = Some(pinned);
        }
        session.summary.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> ClientResult<()> {
        self.record("delete_session", Some(id))?;
        self.sessions.write().retain(|s| s.summary.session_id != id);
        Ok(())
    }

    async fn query_agent(&self, query: AgentQuery) -> ClientResult<()> {
        self.record("query_agent", Some(&query.session_id))?;
        {
            let mut sessions = self.sessions.write();
            let session = sessions
                .iter_mut()
                .find(|s| s.summary.session_id == query.session_id)
                .ok_or_else(|| ClientError::SessionNotFound(query.session_id.clone()))?;
            let now = Utc::now();
            session
                .messages
                .push(RawMessage::new("user", query.query.clone()).with_created_at(now));
            if self.echo_replies.load(Ordering::SeqCst) {
                let agent = query.explicit_agent.as_deref().unwrap_or("router");
                let mut reply = RawMessage::new("assistant", format!("[{}] {}", agent, query.query))
                    .with_created_at(now + chrono::Duration::milliseconds(1));
                reply.agent = Some(agent.to_string());
                session.messages.push(reply);
            }
            session.summary.preview = Some(query.query.clone());
            session.summary.updated_at = now;
        }
        self.queries.write().push(query);
        Ok(())
    }

    async fn health(&self) -> ClientResult<()> {
        self.record("health", None)?;
        let delay = *self.health_delay.read();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable("health check failed".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_get_delete() {
        let api = InMemorySessionApi::new();
        let created = api.create_session(Some("Plan".to_string())).await.unwrap();

        let fetched = api.get_session(&created.session_id).await.unwrap();
        assert_eq!(fetched.summary.title.as_deref(), Some("Plan"));

        api.delete_session(&created.session_id).await.unwrap();
        assert!(api.get_session(&created.session_id).await.unwrap_err().is_not_found());
        // Deleting again is fine.
        api.delete_session(&created.session_id).await.unwrap();
        assert_eq!(api.call_count("delete_session"), 2);
    }

    #[tokio::test]
    async fn test_invisible_reads() {
        let api = InMemorySessionApi::new().with_invisible_reads(2);
        let created = api.create_session(None).await.unwrap();

        assert!(api.get_session(&created.session_id).await.is_err());
        assert!(api.get_session(&created.session_id).await.is_err());
        assert!(api.get_session(&created.session_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let api = InMemorySessionApi::new();
        api.fail_with("maintenance");
        let err = api.list_sessions(10).await.unwrap_err();
        assert!(err.is_connection());

        api.recover();
        assert!(api.list_sessions(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_echo_reply() {
        let api = InMemorySessionApi::new().with_echo_replies();
        let created = api.create_session(None).await.unwrap();
        api.query_agent(AgentQuery {
            session_id: created.session_id.clone(),
            query: "status".to_string(),
            explicit_agent: Some("ops".to_string()),
        })
        .await
        .unwrap();

        let session = api.get_session(&created.session_id).await.unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.summary.preview.as_deref(), Some("status"));
        assert_eq!(api.queries().len(), 1);
    }
}
