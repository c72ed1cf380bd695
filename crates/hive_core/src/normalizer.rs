//! Message normalizer.
//!
//! The backend re-sends messages and streams partial assistant replies, so a
//! session fetched from the API routinely contains the same message more than
//! once, sometimes as a truncated prefix of the final text. This module turns
//! those heterogeneous payloads into a clean `ChatMessage` list:
//!
//! 1. map field aliases (`role|sender`, `content|text`, `created_at|timestamp`,
//!    `message_id|id`) onto the canonical shape,
//! 2. drop exact-id repeats (first occurrence wins),
//! 3. collapse fuzzy duplicates from the same sender, keeping the longer text,
//! 4. sort ascending by timestamp.
//!
//! Fuzzy matching is a heuristic. Two short, distinct messages from the same
//! sender can be merged if they normalise to similar strings.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{ChatMessage, Sender};

/// Token-set Jaccard similarity above which two texts are duplicates.
pub const JACCARD_THRESHOLD: f64 = 0.75;
/// Positional character match ratio above which two texts are duplicates.
pub const CHAR_MATCH_THRESHOLD: f64 = 0.8;

/// A message exactly as the backend sent it.
///
/// Every alias is kept as its own optional field so payloads that carry both
/// spellings still deserialize.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl RawMessage {
    /// Convenience constructor used by tests and the in-memory backend.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(serde_json::Value::String(at.to_rfc3339()));
        self
    }

    fn resolved_id(&self) -> Option<&str> {
        self.message_id
            .as_deref()
            .or(self.id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }

    fn resolved_sender(&self) -> Sender {
        Sender::from_role(self.role.as_deref().or(self.sender.as_deref()).unwrap_or(""))
    }

    fn resolved_text(&self) -> &str {
        self.content
            .as_deref()
            .or(self.text.as_deref())
            .unwrap_or("")
    }

    fn resolved_timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at
            .as_ref()
            .and_then(parse_timestamp)
            .or_else(|| self.timestamp.as_ref().and_then(parse_timestamp))
    }

    /// Convert into a canonical message, generating missing id/timestamp.
    pub fn into_message(self) -> ChatMessage {
        let id = self
            .resolved_id()
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let timestamp = self.resolved_timestamp().unwrap_or_else(Utc::now);
        ChatMessage {
            id,
            text: self.resolved_text().to_string(),
            sender: self.resolved_sender(),
            timestamp,
            agent: self.agent.clone(),
            temp: false,
        }
    }
}

/// Accepts RFC 3339 strings, naive `YYYY-MM-DDTHH:MM:SS[.f]` strings (read as
/// UTC) and epoch milliseconds.
fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

fn strip_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("static pattern is valid"))
}

/// Lowercase, drop punctuation and split into word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    strip_pattern()
        .replace_all(&lowered, "")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Lowercased text with every non-alphanumeric character removed.
pub fn normalize_text(text: &str) -> String {
    tokenize(text).concat()
}

/// Jaccard similarity of the two texts' token sets.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let left: HashSet<String> = tokenize(a).into_iter().collect();
    let right: HashSet<String> = tokenize(b).into_iter().collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// Share of positions (over the shorter normalized text) holding the same
/// character in both texts.
pub fn char_match_ratio(a: &str, b: &str) -> f64 {
    let left: Vec<char> = normalize_text(a).chars().collect();
    let right: Vec<char> = normalize_text(b).chars().collect();
    let shorter = left.len().min(right.len());
    if shorter == 0 {
        return 0.0;
    }
    let matches = left
        .iter()
        .zip(right.iter())
        .filter(|(l, r)| l == r)
        .count();
    matches as f64 / shorter as f64
}

/// Whether two texts should be treated as the same message.
pub fn is_fuzzy_duplicate(a: &str, b: &str) -> bool {
    let left = normalize_text(a);
    let right = normalize_text(b);

    if left.is_empty() || right.is_empty() {
        return left.is_empty() && right.is_empty();
    }
    if left == right || left.starts_with(&right) || right.starts_with(&left) {
        return true;
    }

    jaccard_similarity(a, b) > JACCARD_THRESHOLD || char_match_ratio(a, b) > CHAR_MATCH_THRESHOLD
}

/// Normalize backend messages into a deduplicated, chronologically sorted list.
pub fn normalize_messages(raw: &[RawMessage]) -> Vec<ChatMessage> {
    let converted: Vec<ChatMessage> = raw.iter().cloned().map(RawMessage::into_message).collect();
    dedupe_messages(converted)
}

/// Run both dedup passes and the timestamp sort over canonical messages.
pub fn dedupe_messages(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let input_len = messages.len();

    let mut seen = HashSet::new();
    let unique: Vec<ChatMessage> = messages
        .into_iter()
        .filter(|m| seen.insert(m.id.clone()))
        .collect();

    let mut kept: Vec<ChatMessage> = Vec::with_capacity(unique.len());
    for message in unique {
        let existing = kept
            .iter_mut()
            .find(|k| k.sender == message.sender && is_fuzzy_duplicate(&k.text, &message.text));
        match existing {
            Some(k) => {
                if message.text.chars().count() > k.text.chars().count() {
                    *k = message;
                }
            }
            None => kept.push(message),
        }
    }

    kept.sort_by_key(|m| m.timestamp);

    if kept.len() != input_len {
        debug!(input = input_len, output = kept.len(), "Collapsed duplicate messages");
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_field_aliases() {
        let json = r#"[
            {"message_id": "a", "role": "user", "content": "hello", "created_at": "2024-01-01T00:00:00Z"},
            {"id": "b", "sender": "agent", "text": "hi there", "timestamp": 1704067201000}
        ]"#;
        let raw: Vec<RawMessage> = serde_json::from_str(json).unwrap();
        let messages = normalize_messages(&raw);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "a");
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[0].text, "hello");
        assert_eq!(messages[1].id, "b");
        assert_eq!(messages[1].sender, Sender::Assistant);
        assert_eq!(messages[1].text, "hi there");
        assert!(messages[0].timestamp < messages[1].timestamp);
    }

    #[test]
    fn test_unknown_role_is_system_and_ids_are_generated() {
        let raw = vec![RawMessage::new("tool", "ran search")];
        let messages = normalize_messages(&raw);
        assert_eq!(messages[0].sender, Sender::System);
        assert!(!messages[0].id.is_empty());
    }

    #[test]
    fn test_exact_id_dedup_keeps_first() {
        let raw = vec![
            RawMessage::new("user", "first").with_id("x").with_created_at(at(0)),
            RawMessage::new("user", "completely different words").with_id("x").with_created_at(at(1)),
        ];
        let messages = normalize_messages(&raw);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "first");
    }

    #[test]
    fn test_partial_stream_collapses_to_longer_text() {
        let raw = vec![
            RawMessage::new("assistant", "The quarterly numbers look")
                .with_id("p1")
                .with_created_at(at(0)),
            RawMessage::new("assistant", "The quarterly numbers look strong, revenue is up 12%.")
                .with_id("p2")
                .with_created_at(at(1)),
        ];
        let messages = normalize_messages(&raw);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "The quarterly numbers look strong, revenue is up 12%.");
    }

    #[test]
    fn test_char_match_similarity_collapses() {
        // Same length, one character differs: 9/10 positions match.
        assert!(char_match_ratio("abcdefghij", "abcdefghiX") > CHAR_MATCH_THRESHOLD);
        let raw = vec![
            RawMessage::new("assistant", "abcdefghij").with_created_at(at(0)),
            RawMessage::new("assistant", "abcdefghiXY").with_created_at(at(1)),
        ];
        let messages = normalize_messages(&raw);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "abcdefghiXY");
    }

    #[test]
    fn test_jaccard_similarity() {
        let a = "please schedule the design review for monday";
        let b = "Please schedule the design review for Monday!";
        assert!((jaccard_similarity(a, b) - 1.0).abs() < f64::EPSILON);
        assert!(jaccard_similarity("red green", "blue yellow") < 0.01);
    }

    #[test]
    fn test_different_senders_are_not_merged() {
        let raw = vec![
            RawMessage::new("user", "show me the report").with_created_at(at(0)),
            RawMessage::new("assistant", "show me the report").with_created_at(at(1)),
        ];
        assert_eq!(normalize_messages(&raw).len(), 2);
    }

    #[test]
    fn test_distinct_messages_survive_and_sort() {
        let raw = vec![
            RawMessage::new("assistant", "Here is the summary you asked for").with_created_at(at(5)),
            RawMessage::new("user", "Summarize the incident").with_created_at(at(0)),
            RawMessage::new("user", "Now draft an email to the team").with_created_at(at(10)),
        ];
        let messages = normalize_messages(&raw);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].text, "Summarize the incident");
        assert_eq!(messages[2].text, "Now draft an email to the team");
    }

    #[test]
    fn test_output_is_sorted_and_unique() {
        let base = at(0);
        let raw: Vec<RawMessage> = (0..20)
            .map(|i| {
                let role = if i % 2 == 0 { "user" } else { "assistant" };
                RawMessage::new(role, format!("message number {} about topic {}", i, i % 3))
                    .with_id(format!("id-{}", i % 7))
                    .with_created_at(base - Duration::seconds(i))
            })
            .collect();

        let messages = normalize_messages(&raw);
        assert!(messages.len() <= raw.len());
        assert!(messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        let ids: HashSet<_> = messages.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids.len(), messages.len());
    }

    #[test]
    fn test_empty_texts_only_match_each_other() {
        assert!(is_fuzzy_duplicate("", "!!"));
        assert!(!is_fuzzy_duplicate("", "hello"));
    }
}
