//! Message insertion, duplicate guard and streaming updates.

use chrono::Utc;
use tracing::{debug, info};

use super::{HiveStore, MessageRecord, SessionRecord, AUTO_SESSION_FOLDER_NAME, UNTITLED_SESSION};
use crate::error::{HiveError, HiveResult};
use crate::types::{ChatMessage, MessageId, Sender, SessionId};

/// Two identical consecutive messages closer than this are one message.
pub const DUPLICATE_WINDOW_MS: i64 = 2_000;
/// Number of words kept when a title is derived from message text.
pub const TITLE_WORDS: usize = 6;

/// How the target session of a message was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnsured {
    /// The active session already existed
    Existing(SessionId),
    /// The active id pointed at a session not known locally; a shell was created
    Materialized(SessionId),
    /// There was no active session; a new one was created and activated
    Created(SessionId),
}

impl SessionEnsured {
    pub fn session_id(&self) -> &str {
        match self {
            Self::Existing(id) | Self::Materialized(id) | Self::Created(id) => id,
        }
    }

    pub fn is_new(&self) -> bool {
        !matches!(self, Self::Existing(_))
    }
}

/// Result of [`HiveStore::add_message`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added {
        session: SessionEnsured,
        message_id: MessageId,
    },
    /// Dropped by the duplicate guard
    Duplicate {
        session_id: SessionId,
        existing_id: MessageId,
    },
}

impl AddOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::Added { session, .. } => session.session_id(),
            Self::Duplicate { session_id, .. } => session_id,
        }
    }
}

/// Title from the first six words, with `...` when the text is longer.
pub fn derive_title(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return UNTITLED_SESSION.to_string();
    }
    let mut title = words[..words.len().min(TITLE_WORDS)].join(" ");
    if words.len() > TITLE_WORDS {
        title.push_str("...");
    }
    title
}

impl HiveStore {
    /// Make sure there is a session to put `first_text` into.
    pub fn ensure_session(&mut self, first_text: &str) -> SessionEnsured {
        match self.active_session_id.clone() {
            Some(id) if self.sessions.contains(&id) => SessionEnsured::Existing(id),
            Some(id) => {
                debug!(session = %id, "Materializing shell for unknown active session");
                self.insert_session(SessionRecord::new(id.clone()));
                SessionEnsured::Materialized(id)
            }
            None => {
                let folder_id = self.ensure_folder_named(AUTO_SESSION_FOLDER_NAME);
                let id = uuid::Uuid::new_v4().to_string();
                let mut record = SessionRecord::new(id.clone());
                record.title = Some(derive_title(first_text));
                record.folder_id = Some(folder_id);
                self.insert_session(record);
                self.active_session_id = Some(id.clone());
                info!(session = %id, "Created session for first message");
                SessionEnsured::Created(id)
            }
        }
    }

    /// Add a message to the active session.
    ///
    /// The message is dropped when it repeats an id already stored, or when it
    /// has the same sender and trimmed text as the session's last message and
    /// arrived within [`DUPLICATE_WINDOW_MS`] of it.
    pub fn add_message(&mut self, message: ChatMessage) -> HiveResult<AddOutcome> {
        if let Some(duplicate) = self.stored_id_duplicate(&message) {
            return Ok(duplicate);
        }
        if let Some(session_id) = self.active_session_id.clone() {
            if let Some(existing_id) = self.find_duplicate(&session_id, &message) {
                debug!(session = %session_id, message = %message.id, "Dropping duplicate message");
                return Ok(AddOutcome::Duplicate {
                    session_id,
                    existing_id,
                });
            }
        }

        let session = self.ensure_session(&message.text);
        let message_id = self.insert_message(session.session_id(), message)?;
        Ok(AddOutcome::Added {
            session,
            message_id,
        })
    }

    /// Add a message to a specific session, e.g. a reply arriving for a
    /// session that is not the active one. Unknown sessions are materialized.
    pub fn add_message_to(
        &mut self,
        session_id: &str,
        message: ChatMessage,
    ) -> HiveResult<AddOutcome> {
        if let Some(duplicate) = self.stored_id_duplicate(&message) {
            return Ok(duplicate);
        }
        if let Some(existing_id) = self.find_duplicate(session_id, &message) {
            return Ok(AddOutcome::Duplicate {
                session_id: session_id.to_string(),
                existing_id,
            });
        }

        let session = if self.sessions.contains(session_id) {
            SessionEnsured::Existing(session_id.to_string())
        } else {
            self.insert_session(SessionRecord::new(session_id));
            SessionEnsured::Materialized(session_id.to_string())
        };
        let message_id = self.insert_message(session.session_id(), message)?;
        Ok(AddOutcome::Added {
            session,
            message_id,
        })
    }

    /// A message whose id is already stored, in any session, is a duplicate
    /// of that stored message.
    fn stored_id_duplicate(&self, message: &ChatMessage) -> Option<AddOutcome> {
        self.messages.get(&message.id).map(|existing| AddOutcome::Duplicate {
            session_id: existing.session_id.clone(),
            existing_id: message.id.clone(),
        })
    }

    fn find_duplicate(&self, session_id: &str, message: &ChatMessage) -> Option<MessageId> {
        let last_id = self.sessions.get(session_id)?.message_ids.last()?;
        let last = &self.messages.get(last_id)?.message;
        let gap = (message.timestamp - last.timestamp).num_milliseconds().abs();

        (last.sender == message.sender
            && last.text.trim() == message.text.trim()
            && gap < DUPLICATE_WINDOW_MS)
            .then(|| last.id.clone())
    }

    fn insert_message(&mut self, session_id: &str, message: ChatMessage) -> HiveResult<MessageId> {
        let message_id = message.id.clone();
        if self.messages.contains(&message_id) {
            return Err(HiveError::DuplicateMessageId(message_id));
        }
        if !self.sessions.contains(session_id) {
            return Err(HiveError::SessionNotFound(session_id.to_string()));
        }
        let agent = match message.sender {
            Sender::User => message.agent.clone(),
            _ => None,
        };
        let title = (message.sender == Sender::User).then(|| derive_title(&message.text));

        self.sessions
            .update_one(session_id, |s| {
                if s.message_ids.is_empty() && s.is_untitled() {
                    if let Some(title) = title {
                        s.title = Some(title);
                    }
                }
                if agent.is_some() {
                    s.active_agent = agent.clone();
                }
                s.message_ids.push(message_id.clone());
                s.updated_at = Utc::now();
            })
            .ok_or_else(|| HiveError::SessionNotFound(session_id.to_string()))?;

        if agent.is_some() {
            self.last_used_agent = agent;
        }

        self.messages.add_one(MessageRecord {
            message,
            session_id: session_id.to_string(),
        });
        Ok(message_id)
    }

    /// Replace the text of a message (streaming update).
    pub fn update_message_text(&mut self, id: &str, text: impl Into<String>) -> HiveResult<()> {
        let text = text.into();
        self.messages
            .update_one(id, |r| r.message.text = text)
            .ok_or_else(|| HiveError::MessageNotFound(id.to_string()))
    }

    /// Append a streamed chunk to a message.
    pub fn append_message_text(&mut self, id: &str, delta: &str) -> HiveResult<()> {
        self.messages
            .update_one(id, |r| r.message.text.push_str(delta))
            .ok_or_else(|| HiveError::MessageNotFound(id.to_string()))
    }

    /// Swap a placeholder for the confirmed message, keeping its position.
    pub fn replace_message(&mut self, temp_id: &str, message: ChatMessage) -> HiveResult<()> {
        if message.id != temp_id && self.messages.contains(&message.id) {
            return Err(HiveError::DuplicateMessageId(message.id));
        }
        let record = self
            .messages
            .remove_one(temp_id)
            .ok_or_else(|| HiveError::MessageNotFound(temp_id.to_string()))?;
        let new_id = message.id.clone();

        self.sessions.update_one(&record.session_id, |s| {
            for id in s.message_ids.iter_mut() {
                if id == temp_id {
                    *id = new_id.clone();
                }
            }
            s.updated_at = Utc::now();
        });
        self.messages.upsert_one(MessageRecord {
            message,
            session_id: record.session_id,
        });
        Ok(())
    }

    pub fn remove_message(&mut self, id: &str) -> HiveResult<ChatMessage> {
        let record = self
            .messages
            .remove_one(id)
            .ok_or_else(|| HiveError::MessageNotFound(id.to_string()))?;
        self.sessions
            .update_one(&record.session_id, |s| s.message_ids.retain(|m| m != id));
        Ok(record.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_derive_title() {
        assert_eq!(derive_title("Plan the offsite"), "Plan the offsite");
        assert_eq!(
            derive_title("Draft a summary of the quarterly sales figures"),
            "Draft a summary of the quarterly..."
        );
        assert_eq!(derive_title("one two three four five six"), "one two three four five six");
        assert_eq!(derive_title("   "), UNTITLED_SESSION);
    }

    #[test]
    fn test_first_message_creates_session() {
        let mut store = HiveStore::new();
        let outcome = store
            .add_message(ChatMessage::user("Compare vendor contracts for the new office lease"))
            .unwrap();

        let AddOutcome::Added { session, .. } = outcome else {
            panic!("expected message to be added");
        };
        assert!(matches!(session, SessionEnsured::Created(_)));
        assert_eq!(store.active_session_id(), Some(session.session_id()));

        let record = store.session(session.session_id()).unwrap();
        assert_eq!(record.title.as_deref(), Some("Compare vendor contracts for the new..."));
        let folder = store.folder(record.folder_id.as_deref().unwrap()).unwrap();
        assert_eq!(folder.name, AUTO_SESSION_FOLDER_NAME);
    }

    #[test]
    fn test_duplicate_within_window_is_dropped() {
        let mut store = HiveStore::new();
        let now = Utc::now();
        store
            .add_message(ChatMessage::user("hello").with_timestamp(now))
            .unwrap();
        let second = store
            .add_message(ChatMessage::user("  hello ").with_timestamp(now + Duration::milliseconds(800)))
            .unwrap();

        assert!(second.is_duplicate());
        let session = store.active_session_id().unwrap().to_string();
        assert_eq!(store.messages_for(&session).len(), 1);
    }

    #[test]
    fn test_repeat_after_window_is_kept() {
        let mut store = HiveStore::new();
        let now = Utc::now();
        store
            .add_message(ChatMessage::user("yes").with_timestamp(now))
            .unwrap();
        let later = store
            .add_message(ChatMessage::user("yes").with_timestamp(now + Duration::seconds(3)))
            .unwrap();
        assert!(!later.is_duplicate());

        let other_sender = store
            .add_message(ChatMessage::assistant("yes").with_timestamp(now + Duration::seconds(3)))
            .unwrap();
        assert!(!other_sender.is_duplicate());
    }

    #[test]
    fn test_same_id_is_dropped() {
        let mut store = HiveStore::new();
        store.add_message(ChatMessage::user("a").with_id("m1")).unwrap();
        let again = store
            .add_message(ChatMessage::assistant("b").with_id("m1"))
            .unwrap();
        assert!(again.is_duplicate());
    }

    #[test]
    fn test_reused_id_without_active_session_is_dropped() {
        let mut store = HiveStore::new();
        store
            .add_message(ChatMessage::user("first topic").with_id("m1"))
            .unwrap();
        let first = store.active_session_id().unwrap().to_string();
        store.set_active_session(None).unwrap();

        let again = store
            .add_message(ChatMessage::user("second topic entirely").with_id("m1"))
            .unwrap();
        let AddOutcome::Duplicate { session_id, existing_id } = again else {
            panic!("expected reused id to be rejected");
        };
        assert_eq!(session_id, first);
        assert_eq!(existing_id, "m1");
        assert_eq!(store.session_count(), 1);
        assert_eq!(store.message("m1").unwrap().text, "first topic");

        let late = store
            .add_message_to("other", ChatMessage::assistant("late").with_id("m1"))
            .unwrap();
        assert!(late.is_duplicate());
        assert!(store.messages_for("other").is_empty());
        assert_eq!(store.messages_for(&first).len(), 1);
    }

    #[test]
    fn test_replace_with_taken_id_fails_untouched() {
        let mut store = HiveStore::new();
        store.add_message(ChatMessage::user("one").with_id("m1")).unwrap();
        store
            .add_message(ChatMessage::assistant("pending").with_id("tmp"))
            .unwrap();

        let err = store
            .replace_message("tmp", ChatMessage::assistant("final").with_id("m1"))
            .unwrap_err();
        assert_eq!(err, HiveError::DuplicateMessageId("m1".to_string()));
        assert_eq!(store.message("tmp").unwrap().text, "pending");
        assert_eq!(store.message("m1").unwrap().text, "one");
    }

    #[test]
    fn test_unknown_active_session_is_materialized() {
        let mut store = HiveStore::new();
        store.active_session_id = Some("remote-1".to_string());

        let outcome = store.add_message(ChatMessage::user("status?")).unwrap();
        let AddOutcome::Added { session, .. } = outcome else {
            panic!("expected message to be added");
        };
        assert_eq!(session, SessionEnsured::Materialized("remote-1".to_string()));
        assert!(store.session("remote-1").unwrap().folder_id.is_some());
    }

    #[test]
    fn test_user_agent_updates_active_and_last_used() {
        let mut store = HiveStore::new();
        store
            .add_message(ChatMessage::user("route this to finance").with_agent("finance"))
            .unwrap();
        let session = store.active_session().unwrap();
        assert_eq!(session.active_agent.as_deref(), Some("finance"));
        assert_eq!(store.last_used_agent(), Some("finance"));

        store
            .add_message(ChatMessage::assistant("done").with_agent("hr"))
            .unwrap();
        assert_eq!(store.last_used_agent(), Some("finance"));
    }

    #[test]
    fn test_title_derived_for_untitled_existing_session() {
        let mut store = HiveStore::new();
        let id = store.create_local_session(None);
        store.set_active_session(Some(&id)).unwrap();

        store
            .add_message(ChatMessage::user("What changed in the travel policy this year"))
            .unwrap();
        assert_eq!(
            store.session(&id).unwrap().title.as_deref(),
            Some("What changed in the travel policy...")
        );

        store.add_message(ChatMessage::user("And for contractors?")).unwrap();
        assert_eq!(
            store.session(&id).unwrap().title.as_deref(),
            Some("What changed in the travel policy...")
        );
    }

    #[test]
    fn test_streaming_updates() {
        let mut store = HiveStore::new();
        store.add_message(ChatMessage::user("summarize")).unwrap();
        let placeholder = ChatMessage::assistant("").with_id("tmp").placeholder();
        store.add_message(placeholder).unwrap();

        store.append_message_text("tmp", "The report ").unwrap();
        store.append_message_text("tmp", "is ready.").unwrap();
        assert_eq!(store.message("tmp").unwrap().text, "The report is ready.");

        store
            .replace_message("tmp", ChatMessage::assistant("The report is ready.").with_id("final"))
            .unwrap();
        let session = store.active_session().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].id, "final");
        assert!(!session.messages[1].temp);

        store.remove_message("final").unwrap();
        assert_eq!(store.active_session().unwrap().messages.len(), 1);
        assert!(store.update_message_text("final", "x").is_err());
    }

    #[test]
    fn test_add_message_to_other_session() {
        let mut store = HiveStore::new();
        store.add_message(ChatMessage::user("first")).unwrap();
        let active = store.active_session_id().unwrap().to_string();

        store
            .add_message_to("background", ChatMessage::assistant("report finished"))
            .unwrap();
        assert_eq!(store.active_session_id(), Some(active.as_str()));
        assert_eq!(store.messages_for("background").len(), 1);
    }
}
