//! Reconciling backend session responses into the store.
//!
//! These are the only entry points the network layer uses to write into the
//! store. Existing sessions are patched in place, unknown ones appended,
//! fetched sessions have their messages replaced by the normalized backend
//! copy, and failures are recorded as a display string without retrying.

use std::fmt::Display;

use tracing::{debug, warn};

use super::{HiveStore, MessageRecord, SessionRecord};
use crate::error::{HiveError, HiveResult};
use crate::normalizer::normalize_messages;
use crate::types::{RemoteSession, SessionPatch, SessionSummary};

impl HiveStore {
    /// Mark a request as in flight.
    pub fn begin_request(&mut self) {
        self.loading = true;
    }

    /// Record a failed request; the UI decides whether to retry.
    pub fn fail_request(&mut self, operation: &str, error: impl Display) {
        let message = format!("Failed to {}: {}", operation, error);
        warn!(%operation, error = %message, "Session request failed");
        self.loading = false;
        self.error = Some(message);
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Mark the in-flight request as done without applying anything.
    pub fn finish_request(&mut self) {
        self.loading = false;
        self.error = None;
    }

    /// Patch or append every summary from a list response.
    pub fn apply_session_list(&mut self, summaries: &[SessionSummary]) {
        for summary in summaries {
            self.upsert_summary(summary);
        }
        debug!(count = summaries.len(), "Applied session list");
        self.finish_request();
    }

    /// Apply a full session fetch, replacing its messages with the
    /// normalized backend copy. Local placeholders are kept at the end.
    pub fn apply_session_fetched(&mut self, remote: &RemoteSession) {
        let session_id = remote.summary.session_id.clone();
        self.upsert_summary(&remote.summary);

        let previous = self
            .sessions
            .get(&session_id)
            .map(|s| s.message_ids.clone())
            .unwrap_or_default();
        let mut placeholders = Vec::new();
        for id in &previous {
            if let Some(record) = self.messages.remove_one(id) {
                if record.message.temp {
                    placeholders.push(record);
                }
            }
        }

        let normalized = normalize_messages(&remote.messages);
        let mut ids: Vec<String> = normalized.iter().map(|m| m.id.clone()).collect();
        ids.extend(placeholders.iter().map(|r| r.message.id.clone()));

        self.messages.upsert_many(
            normalized
                .into_iter()
                .map(|message| MessageRecord {
                    message,
                    session_id: session_id.clone(),
                })
                .chain(placeholders),
        );
        self.sessions
            .update_one(&session_id, |s| s.message_ids = ids);
        self.finish_request();
    }

    /// Append a freshly created session and make it active.
    pub fn apply_session_created(&mut self, summary: &SessionSummary) {
        self.upsert_summary(summary);
        self.active_session_id = Some(summary.session_id.clone());
        self.finish_request();
    }

    pub fn apply_session_updated(&mut self, id: &str, patch: &SessionPatch) -> HiveResult<()> {
        self.sessions
            .update_one(id, |s| {
                if let Some(title) = &patch.title {
                    s.title = Some(title.clone());
                }
                if let Some(pinned) = patch.pinned {
                    s.pinned = pinned;
                }
                s.updated_at = chrono::Utc::now();
            })
            .ok_or_else(|| HiveError::SessionNotFound(id.to_string()))?;
        self.finish_request();
        Ok(())
    }

    /// Remove a session the backend deleted. Unknown ids are ignored.
    pub fn apply_session_deleted(&mut self, id: &str) {
        if self.sessions.contains(id) {
            // Existence was just checked, so removal cannot fail.
            let _ = self.delete_session(id);
        }
        self.finish_request();
    }

    fn upsert_summary(&mut self, summary: &SessionSummary) {
        let patched = self.sessions.update_one(&summary.session_id, |s| {
            if summary.title.is_some() {
                s.title = summary.title.clone();
            }
            if let Some(pinned) = summary.pinned {
                s.pinned = pinned;
            }
            s.updated_at = summary.updated_at;
            if summary.preview.is_some() {
                s.preview = summary.preview.clone();
            }
        });
        if patched.is_none() {
            let mut record = SessionRecord::new(summary.session_id.clone());
            record.title = summary.title.clone();
            record.pinned = summary.pinned.unwrap_or(false);
            record.updated_at = summary.updated_at;
            record.preview = summary.preview.clone();
            self.insert_session(record);
        }
    }
}
