//! Application store.
//!
//! `HiveStore` is the single source of truth for everything the client knows:
//! users, agents, sessions, messages, folders and workflows are held in
//! normalized [`EntityCollection`]s, and denormalised [`ChatSession`] views
//! are derived on demand. All mutation goes through `&mut self` methods, so a
//! store behind one lock has exactly one writer at a time.
//!
//! The operations are split by concern:
//! - `messages`: duplicate guard, session auto-creation, streaming updates
//! - `folders`: folder lifecycle and default-folder merging
//! - `workflows`: collaborative workflow progression
//! - `sync`: reconciling backend responses into local state

mod folders;
mod messages;
mod sync;
mod workflows;

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::entity::{Entity, EntityCollection};
use crate::error::{HiveError, HiveResult};
use crate::types::{
    Agent, AgentId, AgentStatus, ChatMessage, ChatSession, CollaborativeWorkflow, Folder,
    FolderId, MessageId, SessionId, User, WorkflowId,
};

pub use messages::{derive_title, AddOutcome, SessionEnsured, DUPLICATE_WINDOW_MS, TITLE_WORDS};

/// Name of the folder used when a session has nowhere else to go
pub const DEFAULT_FOLDER_NAME: &str = "Default";
/// Name of the folder that receives sessions created implicitly by a message
pub const AUTO_SESSION_FOLDER_NAME: &str = "Default Session";
/// Placeholder title shown for sessions that have not been named yet
pub const UNTITLED_SESSION: &str = "New Chat";

/// Normalized session: messages are referenced by id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub title: Option<String>,
    #[serde(rename = "messageIds")]
    pub message_ids: Vec<MessageId>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "folderId")]
    pub folder_id: Option<FolderId>,
    pub pinned: bool,
    #[serde(rename = "activeAgent")]
    pub active_agent: Option<AgentId>,
    #[serde(rename = "workflowId")]
    pub workflow_id: Option<WorkflowId>,
    pub preview: Option<String>,
}

impl SessionRecord {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: None,
            message_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            folder_id: None,
            pinned: false,
            active_agent: None,
            workflow_id: None,
            preview: None,
        }
    }

    /// A session counts as untitled if it has no title or still carries the placeholder.
    pub fn is_untitled(&self) -> bool {
        match self.title.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(title) => title == UNTITLED_SESSION,
        }
    }

    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => UNTITLED_SESSION,
        }
    }
}

/// Normalized message: points back at its session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageRecord {
    #[serde(flatten)]
    pub message: ChatMessage,
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
}

impl Entity for SessionRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn compare(a: &Self, b: &Self) -> Ordering {
        b.updated_at.cmp(&a.updated_at)
    }
}

impl Entity for MessageRecord {
    fn id(&self) -> &str {
        &self.message.id
    }

    fn compare(a: &Self, b: &Self) -> Ordering {
        a.message.timestamp.cmp(&b.message.timestamp)
    }
}

impl Entity for Folder {
    fn id(&self) -> &str {
        &self.id
    }

    fn compare(a: &Self, b: &Self) -> Ordering {
        a.created_at.cmp(&b.created_at)
    }
}

impl Entity for CollaborativeWorkflow {
    fn id(&self) -> &str {
        &self.id
    }

    fn compare(a: &Self, b: &Self) -> Ordering {
        b.updated_at.cmp(&a.updated_at)
    }
}

impl Entity for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn compare(a: &Self, b: &Self) -> Ordering {
        a.name.cmp(&b.name)
    }
}

impl Entity for Agent {
    fn id(&self) -> &str {
        &self.id
    }

    fn compare(a: &Self, b: &Self) -> Ordering {
        a.name.cmp(&b.name)
    }
}

/// The client's complete in-memory state
#[derive(Debug, Clone, Default)]
pub struct HiveStore {
    users: EntityCollection<User>,
    agents: EntityCollection<Agent>,
    sessions: EntityCollection<SessionRecord>,
    messages: EntityCollection<MessageRecord>,
    folders: EntityCollection<Folder>,
    workflows: EntityCollection<CollaborativeWorkflow>,
    active_session_id: Option<SessionId>,
    last_used_agent: Option<AgentId>,
    current_user_id: Option<String>,
    error: Option<String>,
    loading: bool,
}

impl HiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // Selectors
    // ---------------------------------------------------------------------

    pub fn active_session_id(&self) -> Option<&str> {
        self.active_session_id.as_deref()
    }

    pub fn last_used_agent(&self) -> Option<&str> {
        self.last_used_agent.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn session(&self, id: &str) -> Option<&SessionRecord> {
        self.sessions.get(id)
    }

    /// Sessions, most recently updated first
    pub fn sessions(&self) -> impl Iterator<Item = &SessionRecord> + '_ {
        self.sessions.iter()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn message(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.get(id).map(|r| &r.message)
    }

    /// Messages of a session in insertion order
    pub fn messages_for(&self, session_id: &str) -> Vec<&ChatMessage> {
        self.sessions
            .get(session_id)
            .map(|s| {
                s.message_ids
                    .iter()
                    .filter_map(|id| self.messages.get(id))
                    .map(|r| &r.message)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Folders, oldest first
    pub fn folders(&self) -> impl Iterator<Item = &Folder> + '_ {
        self.folders.iter()
    }

    pub fn folder(&self, id: &str) -> Option<&Folder> {
        self.folders.get(id)
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    pub fn workflow(&self, id: &str) -> Option<&CollaborativeWorkflow> {
        self.workflows.get(id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> + '_ {
        self.agents.iter()
    }

    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> + '_ {
        self.users.iter()
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user_id
            .as_deref()
            .and_then(|id| self.users.get(id))
    }

    /// Denormalised view of one session
    pub fn session_view(&self, id: &str) -> Option<ChatSession> {
        let record = self.sessions.get(id)?;
        Some(ChatSession {
            id: record.id.clone(),
            title: record.title.clone(),
            messages: self.messages_for(id).into_iter().cloned().collect(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            folder_id: record.folder_id.clone(),
            pinned: record.pinned,
            active_agent: record.active_agent.clone(),
            workflow: record
                .workflow_id
                .as_deref()
                .and_then(|wid| self.workflows.get(wid))
                .cloned(),
        })
    }

    /// Denormalised views of every session, most recent first
    pub fn session_views(&self) -> Vec<ChatSession> {
        self.sessions
            .ids()
            .iter()
            .filter_map(|id| self.session_view(id))
            .collect()
    }

    pub fn active_session(&self) -> Option<ChatSession> {
        self.active_session_id
            .as_deref()
            .and_then(|id| self.session_view(id))
    }

    // ---------------------------------------------------------------------
    // Sessions
    // ---------------------------------------------------------------------

    /// Create an empty local session and file it into a folder.
    pub fn create_local_session(&mut self, title: Option<String>) -> SessionId {
        let id = uuid::Uuid::new_v4().to_string();
        let mut record = SessionRecord::new(id.clone());
        record.title = title;
        self.insert_session(record);
        id
    }

    /// Insert a session record, guaranteeing it lands in an existing folder.
    pub(crate) fn insert_session(&mut self, mut record: SessionRecord) {
        let folder_ok = record
            .folder_id
            .as_deref()
            .map(|f| self.folders.contains(f))
            .unwrap_or(false);
        if !folder_ok {
            record.folder_id = Some(self.fallback_folder_id());
        }
        debug!(session = %record.id, "Inserting session");
        self.sessions.upsert_one(record);
    }

    pub fn set_active_session(&mut self, id: Option<&str>) -> HiveResult<()> {
        match id {
            Some(id) if !self.sessions.contains(id) => {
                Err(HiveError::SessionNotFound(id.to_string()))
            }
            _ => {
                self.active_session_id = id.map(str::to_string);
                Ok(())
            }
        }
    }

    pub fn rename_session(&mut self, id: &str, title: impl Into<String>) -> HiveResult<()> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(HiveError::InvalidName(title));
        }
        self.sessions
            .update_one(id, |s| {
                s.title = Some(title);
                s.updated_at = Utc::now();
            })
            .ok_or_else(|| HiveError::SessionNotFound(id.to_string()))
    }

    pub fn set_pinned(&mut self, id: &str, pinned: bool) -> HiveResult<()> {
        self.sessions
            .update_one(id, |s| {
                s.pinned = pinned;
                s.updated_at = Utc::now();
            })
            .ok_or_else(|| HiveError::SessionNotFound(id.to_string()))
    }

    pub fn set_active_agent(&mut self, session_id: &str, agent: Option<String>) -> HiveResult<()> {
        self.sessions
            .update_one(session_id, |s| s.active_agent = agent)
            .ok_or_else(|| HiveError::SessionNotFound(session_id.to_string()))
    }

    /// Remove a session with its messages and workflow.
    ///
    /// If it was active, activation falls to the most recent remaining
    /// session, or to none.
    pub fn delete_session(&mut self, id: &str) -> HiveResult<SessionRecord> {
        let record = self
            .sessions
            .remove_one(id)
            .ok_or_else(|| HiveError::SessionNotFound(id.to_string()))?;

        for message_id in &record.message_ids {
            self.messages.remove_one(message_id);
        }
        if let Some(workflow_id) = record.workflow_id.as_deref() {
            self.workflows.remove_one(workflow_id);
        }

        if self.active_session_id.as_deref() == Some(id) {
            self.active_session_id = self.sessions.ids().first().cloned();
            info!(
                deleted = %id,
                next = ?self.active_session_id,
                "Active session deleted, reassigning"
            );
        }
        Ok(record)
    }

    // ---------------------------------------------------------------------
    // Users and agents
    // ---------------------------------------------------------------------

    pub fn upsert_user(&mut self, user: User) {
        self.users.upsert_one(user);
    }

    pub fn set_current_user(&mut self, id: &str) -> HiveResult<()> {
        if !self.users.contains(id) {
            return Err(HiveError::UserNotFound(id.to_string()));
        }
        self.current_user_id = Some(id.to_string());
        Ok(())
    }

    pub fn upsert_agents(&mut self, agents: impl IntoIterator<Item = Agent>) {
        self.agents.upsert_many(agents);
    }

    pub fn set_agent_status(&mut self, id: &str, status: AgentStatus) -> HiveResult<()> {
        self.agents
            .update_one(id, |a| a.status = status)
            .ok_or_else(|| HiveError::AgentNotFound(id.to_string()))
    }

    pub fn remove_agent(&mut self, id: &str) -> HiveResult<Agent> {
        let agent = self
            .agents
            .remove_one(id)
            .ok_or_else(|| HiveError::AgentNotFound(id.to_string()))?;
        if self.last_used_agent.as_deref() == Some(id) {
            self.last_used_agent = None;
        }
        Ok(agent)
    }
}
