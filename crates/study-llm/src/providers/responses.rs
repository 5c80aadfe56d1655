//! OpenAI Responses API request building and stream event parsing.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::provider::{LLMError, Result};
use crate::types::{ModelRequest, StreamFragment};

/// Build a streaming `POST /responses` body.
pub fn build_responses_body(request: &ModelRequest) -> Value {
    let input: Vec<Value> = request
        .input
        .iter()
        .map(|turn| {
            json!({
                "role": turn.role.as_str(),
                "content": turn.content,
            })
        })
        .collect();

    let options = &request.options;
    let mut body = json!({
        "model": options.model,
        "input": input,
        "temperature": options.temperature,
        "stream": true,
    });

    if !options.tools.is_empty() {
        body["tools"] = json!(options.tools);
        body["tool_choice"] = json!("auto");
        body["parallel_tool_calls"] = json!(options.parallel_tool_calls);
    }

    body
}

#[derive(Debug, Deserialize)]
struct ResponsesEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<ResponseBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseBody {
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    error: Option<ResponseError>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    part_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseError {
    #[serde(default)]
    message: Option<String>,
}

impl ResponseBody {
    /// Concatenation of every `output_text` part, the same value the SDKs
    /// expose as `output_text`.
    fn output_text(&self) -> String {
        self.output
            .iter()
            .flat_map(|item| item.content.iter())
            .filter(|part| part.part_type == "output_text")
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

/// Parse one SSE `data:` payload.
///
/// - `response.output_text.delta` -> `Delta`
/// - `response.completed` / `response.incomplete` -> `Completed`
/// - `response.failed` / `error` -> error
/// - anything else (tool progress, item bookkeeping) -> skipped
pub fn parse_responses_event(data: &str) -> Result<Option<StreamFragment>> {
    let event: ResponsesEvent = serde_json::from_str(data)?;

    match event.event_type.as_str() {
        "response.output_text.delta" => Ok(event
            .delta
            .filter(|delta| !delta.is_empty())
            .map(StreamFragment::Delta)),
        "response.completed" | "response.incomplete" => {
            let output_text = event
                .response
                .map(|response| response.output_text())
                .filter(|text| !text.is_empty());
            Ok(Some(StreamFragment::Completed { output_text }))
        }
        "response.failed" => {
            let message = event
                .response
                .and_then(|response| response.error)
                .and_then(|error| error.message)
                .unwrap_or_else(|| "response failed".to_string());
            Err(LLMError::Api(message))
        }
        "error" => Err(LLMError::Api(
            event.message.unwrap_or_else(|| "unknown upstream error".to_string()),
        )),
        _ => Ok(None),
    }
}
