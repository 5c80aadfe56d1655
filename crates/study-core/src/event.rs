use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Participant id used when none can be determined.
pub const ANONYMOUS_PARTICIPANT: &str = "anon";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionStart,
    ChatUser,
    ChatAssistant,
    ChatError,
    UrlVisit,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SessionStart => "session_start",
            EventKind::ChatUser => "chat_user",
            EventKind::ChatAssistant => "chat_assistant",
            EventKind::ChatError => "chat_error",
            EventKind::UrlVisit => "url_visit",
        }
    }

    pub fn stream(&self) -> LogStream {
        match self {
            EventKind::UrlVisit => LogStream::Visits,
            _ => LogStream::Conversation,
        }
    }
}

/// Which per-participant log family an event lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogStream {
    /// Browser-extension navigation log: `timestamp_iso,url,question_id,source`
    Visits,
    /// Chat log: `timestamp_iso,kind,question_id,payload`
    Conversation,
}

impl LogStream {
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            LogStream::Visits => &["timestamp_iso", "url", "question_id", "source"],
            LogStream::Conversation => &["timestamp_iso", "kind", "question_id", "payload"],
        }
    }
}

/// One observable participant action. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub timestamp: String,
    pub participant_id: String,
    pub kind: EventKind,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Event {
    /// Event stamped with the current UTC time.
    pub fn now(participant_id: impl Into<String>, kind: EventKind, payload: Map<String, Value>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            participant_id: participant_id.into(),
            kind,
            payload,
        }
    }

    /// Navigation event reported by the browser extension. The timestamp is
    /// the client's, kept verbatim.
    pub fn url_visit(
        participant_id: impl Into<String>,
        timestamp: impl Into<String>,
        url: impl Into<String>,
        question_id: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let mut payload = Map::new();
        payload.insert("url".to_string(), Value::String(url.into()));
        payload.insert("questionId".to_string(), Value::String(question_id.into()));
        payload.insert("source".to_string(), Value::String(source.into()));
        Self {
            timestamp: timestamp.into(),
            participant_id: participant_id.into(),
            kind: EventKind::UrlVisit,
            payload,
        }
    }

    /// Payload value rendered as a CSV cell: strings verbatim, null/missing empty,
    /// anything else as JSON.
    pub fn payload_text(&self, key: &str) -> String {
        match self.payload.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Question the event belongs to; chat events carry it as `q`.
    pub fn question_id(&self) -> String {
        if self.payload.contains_key("questionId") {
            self.payload_text("questionId")
        } else {
            self.payload_text("q")
        }
    }

    /// Column values matching [`LogStream::header`] for this event's stream.
    pub fn row(&self) -> Vec<String> {
        match self.kind.stream() {
            LogStream::Visits => vec![
                self.timestamp.clone(),
                self.payload_text("url"),
                self.question_id(),
                self.payload_text("source"),
            ],
            LogStream::Conversation => vec![
                self.timestamp.clone(),
                self.kind.as_str().to_string(),
                self.question_id(),
                Value::Object(self.payload.clone()).to_string(),
            ],
        }
    }
}

/// Make a participant id safe to use as a file name.
///
/// Characters outside `[A-Za-z0-9._-]` become `_`, leading dots are dropped,
/// and an empty result becomes [`ANONYMOUS_PARTICIPANT`].
pub fn sanitize_participant_id(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        ANONYMOUS_PARTICIPANT.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_visit_row_follows_visit_header() {
        let event = Event::url_visit("P1", "t1", "http://x", "Q1", "ext");
        assert_eq!(event.row(), vec!["t1", "http://x", "Q1", "ext"]);
        assert_eq!(event.kind.stream().header().len(), event.row().len());
    }

    #[test]
    fn chat_row_carries_kind_question_and_payload() {
        let payload = json!({"text": "hi", "q": "Q2"});
        let event = Event::now("P1", EventKind::ChatUser, payload.as_object().unwrap().clone());

        let row = event.row();

        assert_eq!(row[1], "chat_user");
        assert_eq!(row[2], "Q2");
        let decoded: Value = serde_json::from_str(&row[3]).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn payload_text_renders_non_strings() {
        let payload = json!({"n": 3, "b": true, "z": null});
        let event = Event::now("P1", EventKind::SessionStart, payload.as_object().unwrap().clone());

        assert_eq!(event.payload_text("n"), "3");
        assert_eq!(event.payload_text("b"), "true");
        assert_eq!(event.payload_text("z"), "");
        assert_eq!(event.payload_text("missing"), "");
    }

    #[test]
    fn timestamp_is_rfc3339_utc() {
        let event = Event::now("P1", EventKind::SessionStart, Map::new());
        assert!(chrono::DateTime::parse_from_rfc3339(&event.timestamp).is_ok());
        assert!(event.timestamp.ends_with('Z'));
    }

    #[test]
    fn sanitize_keeps_plain_ids() {
        assert_eq!(sanitize_participant_id("R_1a2B-3.c"), "R_1a2B-3.c");
    }

    #[test]
    fn sanitize_blocks_path_traversal() {
        assert_eq!(sanitize_participant_id("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_participant_id("..."), ANONYMOUS_PARTICIPANT);
        assert_eq!(sanitize_participant_id("  "), ANONYMOUS_PARTICIPANT);
    }
}
