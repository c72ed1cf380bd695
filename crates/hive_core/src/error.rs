//! Error types for the core store.

use thiserror::Error;

/// Result type alias for store operations.
pub type HiveResult<T> = Result<T, HiveError>;

/// Errors that can occur while mutating the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HiveError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Message id already stored: {0}")]
    DuplicateMessageId(String),

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Cannot delete the last folder: {0}")]
    LastFolder(String),

    #[error("Workflow step {index} out of range for workflow {workflow} ({len} steps)")]
    StepOutOfRange {
        workflow: String,
        index: usize,
        len: usize,
    },

    #[error("Workflow needs at least one agent")]
    EmptyWorkflow,

    #[error("Invalid name: {0}")]
    InvalidName(String),
}
