//! Token counting for budget management.
//!
//! Only turn content is counted; role tags are not part of the budget.

use crate::turn::Turn;
use std::sync::Arc;

/// Trait for token counting implementations.
pub trait TokenCounter: Send + Sync {
    /// Count tokens in a plain text string.
    fn count_text(&self, text: &str) -> u32;

    /// Count tokens in a single turn.
    fn count_turn(&self, turn: &Turn) -> u32 {
        self.count_text(&turn.content)
    }

    /// Count tokens in multiple turns.
    fn count_turns(&self, turns: &[Turn]) -> u32 {
        turns
            .iter()
            .map(|t| self.count_turn(t))
            .fold(0u32, |acc, x| acc.saturating_add(x))
    }
}

/// Heuristic token counter using character-based estimation.
///
/// tokens ≈ ceil(characters / chars_per_token * safety_margin)
#[derive(Debug, Clone)]
pub struct HeuristicTokenCounter {
    chars_per_token: f64,
    safety_margin: f64,
}

impl HeuristicTokenCounter {
    pub fn new(chars_per_token: f64, safety_margin: f64) -> Self {
        Self {
            chars_per_token,
            safety_margin,
        }
    }

    /// chars/4 with a 10% margin.
    pub fn with_defaults() -> Self {
        Self {
            chars_per_token: 4.0,
            safety_margin: 1.1,
        }
    }
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TokenCounter for HeuristicTokenCounter {
    fn count_text(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }

        let char_count = text.chars().count() as f64;
        let base_tokens = char_count / self.chars_per_token;
        let adjusted_tokens = base_tokens * self.safety_margin;

        adjusted_tokens.ceil() as u32
    }
}

/// Arc-wrapped token counter for easy sharing.
pub type SharedTokenCounter = Arc<dyn TokenCounter>;
