pub mod budget;
pub mod catalog;
pub mod event;
pub mod turn;

pub use budget::{
    truncate_history, HeuristicTokenCounter, SharedTokenCounter, TokenBudgetTruncator,
    TokenCounter, TokenizerRegistry, TruncationReport,
};
pub use catalog::{CatalogError, Condition, ContentCatalog, QuestionContent};
pub use event::{sanitize_participant_id, Event, EventKind, LogStream, ANONYMOUS_PARTICIPANT};
pub use turn::{History, Role, Turn};
