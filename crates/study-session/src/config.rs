use std::sync::Arc;

use serde::Serialize;
use study_core::{Condition, TokenBudgetTruncator, TokenizerRegistry};
use study_llm::{ModelProvider, RequestOptions};
use study_log::EventBus;

/// Token ceiling for one request payload.
pub const DEFAULT_MAX_CONTEXT_TOKENS: u32 = 16_000;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub request: RequestOptions,
    pub max_context_tokens: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request: RequestOptions::default(),
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
        }
    }
}

/// Who is chatting and under which experiment condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantContext {
    pub participant_id: String,
    pub question_id: String,
    pub anthropomorphic: bool,
    pub correct: bool,
}

impl ParticipantContext {
    pub fn condition(&self) -> Condition {
        Condition {
            anthropomorphic: self.anthropomorphic,
            correct: self.correct,
        }
    }
}

/// Process-wide collaborators handed to every session.
#[derive(Clone)]
pub struct SessionServices {
    pub provider: Arc<dyn ModelProvider>,
    pub events: EventBus,
    pub tokenizers: TokenizerRegistry,
}

impl SessionServices {
    pub fn truncator(&self, config: &SessionConfig) -> TokenBudgetTruncator {
        TokenBudgetTruncator::for_model(
            &config.request.model,
            config.max_context_tokens,
            &self.tokenizers,
        )
    }
}
