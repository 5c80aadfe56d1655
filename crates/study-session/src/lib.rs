pub mod config;
pub mod session;
pub mod stream;

#[cfg(test)]
mod test_support;

pub use config::{ParticipantContext, SessionConfig, SessionServices};
pub use session::{ConversationSession, FailedTurn, SessionError, SessionState, TurnOutcome};
pub use stream::{consume_model_stream, StreamAggregator, StreamError, StreamOutput};
