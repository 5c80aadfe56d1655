use serde::{Deserialize, Serialize};
use study_core::Turn;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamFragment {
    /// Incremental text
    Delta(String),
    /// End of stream, with the complete response text when the upstream
    /// reports one
    Completed { output_text: Option<String> },
}

/// Hosted tools the model may call on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolSpec {
    WebSearch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub model: String,
    pub temperature: f32,
    pub tools: Vec<ToolSpec>,
    pub parallel_tool_calls: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            temperature: 0.0,
            tools: vec![ToolSpec::WebSearch],
            parallel_tool_calls: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub input: Vec<Turn>,
    pub options: RequestOptions,
}
