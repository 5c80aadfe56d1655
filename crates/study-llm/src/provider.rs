use crate::types::{ModelRequest, StreamFragment};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("API error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, LLMError>;

/// Fragments of one model invocation, ending with [`StreamFragment::Completed`]
/// when the upstream finishes cleanly.
pub type ModelStream = Pin<Box<dyn Stream<Item = Result<StreamFragment>> + Send>>;

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Start a streamed response for a flat role/content input.
    ///
    /// Errors returned here mean the call never started; errors inside the
    /// stream mean it failed midway.
    async fn stream_response(&self, request: &ModelRequest) -> Result<ModelStream>;
}
