use async_trait::async_trait;
use reqwest::Client;

use crate::provider::{LLMError, ModelProvider, ModelStream, Result};
use crate::types::ModelRequest;

use super::responses::build_responses_body;
use super::sse::fragments_from_sse;

pub struct OpenAIResponsesProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIResponsesProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ModelProvider for OpenAIResponsesProvider {
    async fn stream_response(&self, request: &ModelRequest) -> Result<ModelStream> {
        let body = build_responses_body(request);

        log::debug!(
            "Requesting {} with {} input turns",
            request.options.model,
            request.input.len()
        );

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(LLMError::Api(format!("HTTP {}: {}", status, text)));
        }

        Ok(fragments_from_sse(response))
    }
}
