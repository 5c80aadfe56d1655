//! Scripted study content: system prompts, questions and canned answers.
//!
//! The catalog is configuration data, loaded once at startup and shared
//! read-only between sessions. Answers are keyed by question id and the
//! experiment [`Condition`].

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::turn::{History, Turn};

/// Question id of the practice exchange shown before the real questions.
pub const WARMUP_QUESTION_ID: &str = "Q0";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unknown question: {0}")]
    UnknownQuestion(String),
}

/// Experiment condition a participant was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Condition {
    /// Warm, emoji-rich assistant persona instead of the neutral one
    pub anthropomorphic: bool,
    /// Whether the scripted first answer is the correct one
    pub correct: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionContent {
    pub text: String,
    pub correct: String,
    pub incorrect: String,
    pub correct_anthropomorphic: String,
    pub incorrect_anthropomorphic: String,
}

impl QuestionContent {
    pub fn answer(&self, condition: Condition) -> &str {
        match (condition.anthropomorphic, condition.correct) {
            (false, true) => &self.correct,
            (false, false) => &self.incorrect,
            (true, true) => &self.correct_anthropomorphic,
            (true, false) => &self.incorrect_anthropomorphic,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WarmupContent {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SystemPrompts {
    plain: String,
    anthropomorphic: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentCatalog {
    system_prompts: SystemPrompts,
    warmup: WarmupContent,
    #[serde(default)]
    questions: HashMap<String, QuestionContent>,
}

impl ContentCatalog {
    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_toml_str(&content)?;
        log::info!(
            "Loaded content catalog from {:?} ({} questions)",
            path,
            catalog.questions.len()
        );
        Ok(catalog)
    }

    pub fn system_prompt(&self, anthropomorphic: bool) -> &str {
        if anthropomorphic {
            &self.system_prompts.anthropomorphic
        } else {
            &self.system_prompts.plain
        }
    }

    pub fn question(&self, question_id: &str) -> Option<&QuestionContent> {
        self.questions.get(question_id)
    }

    pub fn question_ids(&self) -> impl Iterator<Item = &str> {
        self.questions.keys().map(String::as_str)
    }

    /// Transcript a participant sees when the chat opens.
    ///
    /// - empty question id: system prompt only
    /// - [`WARMUP_QUESTION_ID`]: the practice exchange, same for every condition
    /// - otherwise: the question followed by the scripted answer for `condition`
    pub fn initial_history(
        &self,
        question_id: &str,
        condition: Condition,
    ) -> Result<History, CatalogError> {
        let mut history = History::new(self.system_prompt(condition.anthropomorphic));

        if question_id.is_empty() {
            return Ok(history);
        }

        if question_id == WARMUP_QUESTION_ID {
            history.push(Turn::user(self.warmup.question.clone()));
            history.push(Turn::assistant(self.warmup.answer.clone()));
            return Ok(history);
        }

        let question = self
            .question(question_id)
            .ok_or_else(|| CatalogError::UnknownQuestion(question_id.to_string()))?;
        history.push(Turn::user(question.text.clone()));
        history.push(Turn::assistant(question.answer(condition).to_string()));
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::Role;

    const CATALOG: &str = r#"
[system_prompts]
plain = "You are a search assistant."
anthropomorphic = "You are a friendly search buddy!"

[warmup]
question = "How many r's are there in strawberry?"
answer = "There are three."

[questions.Q1]
text = "Which company first reached a $5 trillion market cap?"
correct = "None yet."
incorrect = "Nvidia."
correct_anthropomorphic = "None yet! 🚀"
incorrect_anthropomorphic = "Nvidia! 🚀"
"#;

    fn catalog() -> ContentCatalog {
        ContentCatalog::from_toml_str(CATALOG).unwrap()
    }

    #[test]
    fn answer_selected_by_condition() {
        let catalog = catalog();
        let q1 = catalog.question("Q1").unwrap();

        let pick = |anthropomorphic, correct| q1.answer(Condition { anthropomorphic, correct });

        assert_eq!(pick(false, true), "None yet.");
        assert_eq!(pick(false, false), "Nvidia.");
        assert_eq!(pick(true, true), "None yet! 🚀");
        assert_eq!(pick(true, false), "Nvidia! 🚀");
    }

    #[test]
    fn initial_history_for_question() {
        let condition = Condition {
            anthropomorphic: true,
            correct: false,
        };
        let history = catalog().initial_history("Q1", condition).unwrap();
        let turns = history.turns();

        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0], Turn::system("You are a friendly search buddy!"));
        assert_eq!(turns[1].role, Role::User);
        assert_eq!(turns[2], Turn::assistant("Nvidia! 🚀"));
    }

    #[test]
    fn warmup_ignores_correctness() {
        let catalog = catalog();
        let a = catalog
            .initial_history("Q0", Condition { anthropomorphic: false, correct: true })
            .unwrap();
        let b = catalog
            .initial_history("Q0", Condition { anthropomorphic: false, correct: false })
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(a.turns()[2].content, "There are three.");
    }

    #[test]
    fn empty_question_yields_system_only() {
        let history = catalog().initial_history("", Condition::default()).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.system().content, "You are a search assistant.");
    }

    #[test]
    fn unknown_question_is_an_error() {
        let err = catalog()
            .initial_history("Q9", Condition::default())
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownQuestion(id) if id == "Q9"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, CATALOG).unwrap();

        let catalog = ContentCatalog::load(&path).unwrap();
        assert_eq!(catalog.question_ids().count(), 1);
    }

    #[test]
    fn shipped_catalog_covers_every_question_and_condition() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/catalog.toml");
        let catalog = ContentCatalog::load(&path).unwrap();

        let mut ids: Vec<&str> = catalog.question_ids().collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["Q1", "Q2", "Q3", "Q4", "Q5", "Q6"]);

        for id in ["Q0", "Q1", "Q2", "Q3", "Q4", "Q5", "Q6"] {
            for anthropomorphic in [false, true] {
                for correct in [false, true] {
                    let condition = Condition { anthropomorphic, correct };
                    let history = catalog.initial_history(id, condition).unwrap();
                    assert_eq!(history.len(), 3, "{} {:?}", id, condition);
                    assert!(!history.turns()[2].content.trim().is_empty());
                }
            }
        }
    }

    #[test]
    fn load_missing_file_reports_path() {
        let err = ContentCatalog::load("/nonexistent/catalog.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/catalog.toml"));
    }
}
