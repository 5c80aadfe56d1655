//! FIFO eviction of the oldest non-system turns.

use crate::turn::Turn;

use super::counter::{SharedTokenCounter, TokenCounter};
use super::tokenizer::TokenizerRegistry;

/// Smallest history the truncation will shrink to: system turn + newest turn.
const MIN_RETAINED_TURNS: usize = 2;

/// Evict turns at index 1 until the whole list fits `max_tokens` or only two
/// turns remain.
///
/// The count is taken on the current list before every eviction. Index 0 is
/// never removed, and the list may stay over budget once the floor is hit.
pub fn truncate_history(
    mut turns: Vec<Turn>,
    max_tokens: u32,
    counter: &dyn TokenCounter,
) -> Vec<Turn> {
    while turns.len() > MIN_RETAINED_TURNS && counter.count_turns(&turns) > max_tokens {
        turns.remove(1);
    }
    turns
}

/// What a truncation pass did, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationReport {
    pub turns_removed: usize,
    pub total_tokens: u32,
    pub budget: u32,
    pub over_budget: bool,
}

/// A token budget bound to one model's counter.
#[derive(Clone)]
pub struct TokenBudgetTruncator {
    max_tokens: u32,
    counter: SharedTokenCounter,
}

impl TokenBudgetTruncator {
    pub fn new(max_tokens: u32, counter: SharedTokenCounter) -> Self {
        Self {
            max_tokens,
            counter,
        }
    }

    pub fn for_model(model: &str, max_tokens: u32, registry: &TokenizerRegistry) -> Self {
        Self::new(max_tokens, registry.counter_for(model))
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn count(&self, turns: &[Turn]) -> u32 {
        self.counter.count_turns(turns)
    }

    pub fn truncate(&self, turns: Vec<Turn>) -> Vec<Turn> {
        truncate_history(turns, self.max_tokens, self.counter.as_ref())
    }

    pub fn truncate_with_report(&self, turns: Vec<Turn>) -> (Vec<Turn>, TruncationReport) {
        let before = turns.len();
        let kept = self.truncate(turns);
        let total_tokens = self.count(&kept);
        let report = TruncationReport {
            turns_removed: before - kept.len(),
            total_tokens,
            budget: self.max_tokens,
            over_budget: total_tokens > self.max_tokens,
        };
        (kept, report)
    }
}

impl std::fmt::Debug for TokenBudgetTruncator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBudgetTruncator")
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::HeuristicTokenCounter;
    use std::sync::Arc;

    /// One token per character keeps the arithmetic readable.
    fn char_counter() -> HeuristicTokenCounter {
        HeuristicTokenCounter::new(1.0, 1.0)
    }

    fn conversation() -> Vec<Turn> {
        vec![
            Turn::system("system"),
            Turn::user("u1"),
            Turn::assistant("a1"),
            Turn::user("u2"),
            Turn::assistant("a2"),
            Turn::user("u3"),
        ]
    }

    #[test]
    fn fits_budget_untouched() {
        let counter = char_counter();
        let turns = conversation();
        let total = counter.count_turns(&turns);

        assert_eq!(truncate_history(turns.clone(), total, &counter), turns);
    }

    #[test]
    fn evicts_oldest_exchange_first() {
        let counter = char_counter();
        let expected = vec![
            Turn::system("system"),
            Turn::user("u2"),
            Turn::assistant("a2"),
            Turn::user("u3"),
        ];
        let budget = counter.count_turns(&expected);

        assert_eq!(truncate_history(conversation(), budget, &counter), expected);
    }

    #[test]
    fn never_goes_below_system_plus_last_turn() {
        let counter = char_counter();

        let kept = truncate_history(conversation(), 0, &counter);

        assert_eq!(kept, vec![Turn::system("system"), Turn::user("u3")]);
    }

    #[test]
    fn system_only_history_is_left_alone() {
        let counter = char_counter();
        let turns = vec![Turn::system("a very long system prompt")];

        assert_eq!(truncate_history(turns.clone(), 1, &counter), turns);
    }

    #[test]
    fn result_fits_or_has_two_turns() {
        let counter = char_counter();
        for budget in 0..40 {
            let kept = truncate_history(conversation(), budget, &counter);
            assert!(
                counter.count_turns(&kept) <= budget || kept.len() == 2,
                "budget {} left {} turns",
                budget,
                kept.len()
            );
            assert_eq!(kept[0], Turn::system("system"));
        }
    }

    #[test]
    fn truncation_is_idempotent() {
        let counter = char_counter();
        for budget in [0, 5, 12, 14, 18, 100] {
            let once = truncate_history(conversation(), budget, &counter);
            let twice = truncate_history(once.clone(), budget, &counter);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn report_flags_oversized_single_turn() {
        let truncator = TokenBudgetTruncator::new(10, Arc::new(char_counter()));
        let turns = vec![
            Turn::system("sys"),
            Turn::user("old"),
            Turn::user("this message alone is larger than the budget"),
        ];

        let (kept, report) = truncator.truncate_with_report(turns);

        assert_eq!(kept.len(), 2);
        assert_eq!(report.turns_removed, 1);
        assert!(report.over_budget);
    }

    #[test]
    fn for_model_uses_registry_fallback() {
        let truncator = TokenBudgetTruncator::for_model("unknown", 16_000, &TokenizerRegistry::new());
        assert_eq!(truncator.max_tokens(), 16_000);
        assert_eq!(truncator.count(&[Turn::user("abcd")]), 1);
    }
}
