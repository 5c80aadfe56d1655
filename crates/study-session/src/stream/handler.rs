use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use study_llm::{LLMError, ModelStream, StreamFragment};

use super::aggregator::StreamAggregator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutput {
    /// The reply as it should be committed: the final text when a correction
    /// was emitted, the concatenated deltas otherwise.
    pub text: String,
    /// Number of updates sent to the consumer.
    pub emissions: usize,
    pub corrected: bool,
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("stream failed after {} chars: {source}", partial.len())]
    Transport {
        partial: String,
        #[source]
        source: LLMError,
    },

    #[error("stream cancelled")]
    Cancelled { partial: String },
}

impl StreamError {
    pub fn partial(&self) -> &str {
        match self {
            StreamError::Transport { partial, .. } | StreamError::Cancelled { partial } => partial,
        }
    }
}

/// Drive one model stream to completion, sending the accumulated text after
/// every delta and at most one corrective update at the end.
///
/// A closed update channel means nobody is listening anymore and is treated
/// the same as cancellation. A stream that ends without a completion fragment
/// lost its tail and is reported as a transport failure.
pub async fn consume_model_stream<T, F>(
    mut stream: ModelStream,
    updates: &mpsc::Sender<T>,
    to_update: F,
    cancel_token: &CancellationToken,
) -> Result<StreamOutput, StreamError>
where
    F: Fn(&str) -> T,
{
    let mut aggregator = StreamAggregator::new();
    let mut final_text: Option<String> = None;
    let mut emissions = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => None,
            item = stream.next() => Some(item),
        };

        let Some(item) = next else {
            return Err(StreamError::Cancelled {
                partial: aggregator.into_text(),
            });
        };

        match item {
            Some(Ok(StreamFragment::Delta(delta))) => {
                if let Some(text) = aggregator.push_delta(&delta) {
                    if updates.send(to_update(text)).await.is_err() {
                        return Err(StreamError::Cancelled {
                            partial: aggregator.into_text(),
                        });
                    }
                    emissions += 1;
                }
            }
            Some(Ok(StreamFragment::Completed { output_text })) => {
                log::debug!(
                    "Model stream completed after {} deltas",
                    aggregator.delta_count()
                );
                final_text = output_text;
                break;
            }
            Some(Err(error)) => {
                return Err(StreamError::Transport {
                    partial: aggregator.into_text(),
                    source: error,
                });
            }
            None => {
                return Err(StreamError::Transport {
                    partial: aggregator.into_text(),
                    source: LLMError::Stream("stream ended before completion".to_string()),
                });
            }
        }
    }

    match aggregator.reconcile(final_text.as_deref()) {
        Some(corrected) => {
            if updates.send(to_update(&corrected)).await.is_err() {
                return Err(StreamError::Cancelled {
                    partial: aggregator.into_text(),
                });
            }
            Ok(StreamOutput {
                text: corrected,
                emissions: emissions + 1,
                corrected: true,
            })
        }
        None => Ok(StreamOutput {
            text: aggregator.into_text(),
            emissions,
            corrected: false,
        }),
    }
}
