pub mod aggregator;
pub mod handler;

pub use aggregator::StreamAggregator;
pub use handler::{consume_model_stream, StreamError, StreamOutput};
