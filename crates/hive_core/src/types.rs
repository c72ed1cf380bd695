//! Core types for the AgentHive client data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalizer::RawMessage;

/// Unique identifier for a chat session
pub type SessionId = String;
/// Unique identifier for a message
pub type MessageId = String;
/// Unique identifier for a folder
pub type FolderId = String;
/// Unique identifier for a collaborative workflow
pub type WorkflowId = String;
/// Unique identifier for an agent
pub type AgentId = String;

/// Who authored a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    System,
}

impl Sender {
    /// Map a backend role string onto a sender.
    ///
    /// `assistant` and `agent` both mean the assistant; anything that is not
    /// recognised is treated as a system message.
    pub fn from_role(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "user" => Self::User,
            "assistant" | "agent" => Self::Assistant,
            _ => Self::System,
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Unique message ID
    pub id: MessageId,
    /// Message body
    pub text: String,
    /// Author of the message
    pub sender: Sender,
    /// When the message was created
    pub timestamp: DateTime<Utc>,
    /// Agent that produced (or was explicitly addressed by) the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentId>,
    /// Client-only placeholder that has not been confirmed by the backend
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub temp: bool,
}

impl ChatMessage {
    /// Create a new message stamped with the current time
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
            agent: None,
            temp: false,
        }
    }

    /// Create a new user message
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    /// Create a new assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text)
    }

    /// Create a new system message
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Sender::System, text)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Mark the message as a client-side placeholder.
    pub fn placeholder(mut self) -> Self {
        self.temp = true;
        self
    }
}

/// A user-defined grouping of sessions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Folder {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Status of a single workflow step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

/// Aggregate status of a workflow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

impl WorkflowStatus {
    /// Derive the aggregate status from step statuses.
    ///
    /// An errored step wins over everything else; a workflow is completed
    /// only when every step is.
    pub fn from_steps(steps: &[WorkflowStep]) -> Self {
        if steps.iter().any(|s| s.status == StepStatus::Error) {
            Self::Error
        } else if !steps.is_empty() && steps.iter().all(|s| s.status == StepStatus::Completed) {
            Self::Completed
        } else if steps.iter().any(|s| s.status == StepStatus::Processing) {
            Self::Processing
        } else {
            Self::Pending
        }
    }
}

/// One agent's share of a collaborative workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowStep {
    #[serde(rename = "agentId")]
    pub agent_id: AgentId,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl WorkflowStep {
    pub fn pending(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            status: StepStatus::Pending,
            input: None,
            output: None,
        }
    }
}

/// A multi-agent task sequence tracked alongside a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollaborativeWorkflow {
    pub id: WorkflowId,
    pub name: String,
    pub steps: Vec<WorkflowStep>,
    pub status: WorkflowStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl CollaborativeWorkflow {
    /// Create a workflow with one pending step per agent
    pub fn new<I, S>(name: impl Into<String>, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            steps: agents.into_iter().map(WorkflowStep::pending).collect(),
            status: WorkflowStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Agent of the step following `index`, if any
    pub fn agent_after(&self, index: usize) -> Option<&str> {
        self.steps.get(index + 1).map(|s| s.agent_id.as_str())
    }

    pub fn first_agent(&self) -> Option<&str> {
        self.steps.first().map(|s| s.agent_id.as_str())
    }

    pub fn recompute_status(&mut self) {
        self.status = WorkflowStatus::from_steps(&self.steps);
    }
}

/// Derived, denormalised view of a session and its messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    pub id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "folderId", default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<FolderId>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(rename = "activeAgent", default, skip_serializing_if = "Option::is_none")]
    pub active_agent: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<CollaborativeWorkflow>,
}

/// Signed-in user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Availability of an agent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Online,
    Busy,
    Offline,
}

/// An agent that can be selected for a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            status: AgentStatus::Online,
            capabilities: Vec::new(),
        }
    }
}

/// Session summary as returned by the backend session list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl SessionSummary {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            title: None,
            pinned: None,
            updated_at: Utc::now(),
            preview: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Full session as returned by `GET /sessions/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteSession {
    #[serde(flatten)]
    pub summary: SessionSummary,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

/// Partial update accepted by `PATCH /sessions/{id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
}

impl SessionPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            pinned: None,
        }
    }

    pub fn pinned(pinned: bool) -> Self {
        Self {
            title: None,
            pinned: Some(pinned),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.pinned.is_none()
    }
}
