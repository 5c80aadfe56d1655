//! Streamed Responses API reply -> [`ModelStream`].

use eventsource_stream::Eventsource;
use futures_util::{stream, StreamExt};
use reqwest::Response;

use crate::provider::{LLMError, ModelStream};
use crate::types::StreamFragment;

use super::responses::parse_responses_event;

/// Decode the server-sent events of a Responses API call into fragments.
///
/// Keep-alive events with an empty data line are skipped. The stream ends
/// after the first [`StreamFragment::Completed`] or the first error, even if
/// the connection is still open. Errors are reported as [`LLMError::Stream`].
pub fn fragments_from_sse(response: Response) -> ModelStream {
    let events = Box::pin(response.bytes_stream().eventsource());

    let fragments = stream::unfold(Some(events), |state| async move {
        let mut events = state?;
        loop {
            let event = match events.next().await? {
                Ok(event) => event,
                Err(e) => return Some((Err(LLMError::Stream(e.to_string())), None)),
            };
            if event.data.trim().is_empty() {
                continue;
            }

            match parse_responses_event(&event.data) {
                Ok(Some(fragment)) => {
                    let finished = matches!(fragment, StreamFragment::Completed { .. });
                    let next = if finished { None } else { Some(events) };
                    return Some((Ok(fragment), next));
                }
                Ok(None) => {}
                Err(LLMError::Stream(msg)) => return Some((Err(LLMError::Stream(msg)), None)),
                Err(other) => return Some((Err(LLMError::Stream(other.to_string())), None)),
            }
        }
    });

    Box::pin(fragments)
}
