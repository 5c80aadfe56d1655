pub mod openai;
pub mod responses;
pub mod sse;

pub use openai::OpenAIResponsesProvider;
