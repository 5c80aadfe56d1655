use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged message of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered transcript of one session.
///
/// Always starts with the system turn. Turns are only ever appended, never
/// edited or removed; bounded request payloads are built from a copy.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
        }
    }

    /// Append a user or assistant turn.
    pub fn push(&mut self, turn: Turn) {
        debug_assert!(turn.role != Role::System, "only one system turn per history");
        self.turns.push(turn);
    }

    pub fn system(&self) -> &Turn {
        &self.turns[0]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// A history is never empty; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Copy of the transcript with extra turns appended, leaving `self` untouched.
    pub fn extended_with(&self, extra: &[Turn]) -> Vec<Turn> {
        let mut turns = Vec::with_capacity(self.turns.len() + extra.len());
        turns.extend_from_slice(&self.turns);
        turns.extend_from_slice(extra);
        turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Turn::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn history_starts_with_system_turn() {
        let history = History::new("be brief");
        assert_eq!(history.len(), 1);
        assert_eq!(history.system(), &Turn::system("be brief"));
    }

    #[test]
    fn extended_with_does_not_modify_history() {
        let mut history = History::new("sys");
        history.push(Turn::user("q"));

        let extended = history.extended_with(&[Turn::assistant("a")]);

        assert_eq!(extended.len(), 3);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn history_serializes_as_plain_array() {
        let history = History::new("sys");
        let json = serde_json::to_value(&history).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["role"], "system");
    }
}
