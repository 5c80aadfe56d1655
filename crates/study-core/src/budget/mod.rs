//! Token budget management for chat requests.
//!
//! Keeps a growing conversation under a model's token ceiling by evicting the
//! oldest non-system turns first, while never dropping the system prompt or the
//! newest turn.
//!
//! # Key Components
//!
//! - [`counter`]: Token counting via character-ratio estimation
//! - [`tokenizer`]: Model id → counter resolution with a default fallback
//! - [`truncate`]: FIFO eviction against a budget

pub mod counter;
pub mod tokenizer;
pub mod truncate;

pub use counter::{HeuristicTokenCounter, SharedTokenCounter, TokenCounter};
pub use tokenizer::{TokenizerProfile, TokenizerRegistry, DEFAULT_PROFILE};
pub use truncate::{truncate_history, TokenBudgetTruncator, TruncationReport};
