pub mod provider;
pub mod providers;
pub mod types;

pub use provider::{LLMError, ModelProvider, ModelStream, Result};
pub use providers::OpenAIResponsesProvider;
pub use types::{ModelRequest, RequestOptions, StreamFragment, ToolSpec};
