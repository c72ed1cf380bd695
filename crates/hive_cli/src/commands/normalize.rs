//! Normalize command - Clean up a dump of backend messages.
//!
//! Accepts either a bare array of messages or a session object with a
//! `messages` field, and prints the normalized list as JSON.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use serde::Deserialize;

use hive_core::{normalize_messages, ChatMessage, RawMessage};

use super::Context;

#[derive(Args)]
pub struct NormalizeArgs {
    /// JSON file with backend messages
    file: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageDump {
    List(Vec<RawMessage>),
    Session { messages: Vec<RawMessage> },
}

impl MessageDump {
    fn into_messages(self) -> Vec<RawMessage> {
        match self {
            Self::List(messages) | Self::Session { messages } => messages,
        }
    }
}

pub async fn execute(args: NormalizeArgs, ctx: &Context) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let (input, normalized) = normalize_dump(&content)
        .with_context(|| format!("Failed to parse {}", args.file.display()))?;

    println!("{}", serde_json::to_string_pretty(&normalized)?);
    if !ctx.quiet {
        eprintln!(
            "📋 {} messages in, {} out",
            input,
            normalized.len()
        );
    }
    Ok(())
}

fn normalize_dump(content: &str) -> Result<(usize, Vec<ChatMessage>)> {
    let raw = serde_json::from_str::<MessageDump>(content)?.into_messages();
    Ok((raw.len(), normalize_messages(&raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_bare_list() {
        let content = r#"[
            {"id": "a", "role": "user", "content": "hello", "created_at": "2024-01-01T00:00:02Z"},
            {"id": "a", "role": "user", "content": "hello", "created_at": "2024-01-01T00:00:02Z"},
            {"id": "b", "role": "assistant", "content": "hi", "created_at": "2024-01-01T00:00:01Z"}
        ]"#;
        let (input, messages) = normalize_dump(content).unwrap();
        assert_eq!(input, 3);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "b");
    }

    #[test]
    fn test_normalize_session_object() {
        let content = r#"{"session_id": "s1", "messages": [
            {"message_id": "m1", "sender": "user", "text": "ping"}
        ]}"#;
        let (_, messages) = normalize_dump(content).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "ping");
    }

    #[test]
    fn test_rejects_other_json() {
        assert!(normalize_dump(r#"{"foo": 1}"#).is_err());
    }
}
