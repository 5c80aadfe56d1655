use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use study_llm::{LLMError, ModelProvider, ModelRequest, ModelStream, StreamFragment};

/// One step of a scripted model reply.
#[derive(Debug, Clone)]
pub enum Step {
    Delta(&'static str),
    Done(Option<&'static str>),
    Fail(&'static str),
}

/// What the provider does on one call.
#[derive(Debug, Clone)]
pub enum Script {
    Reply(Vec<Step>),
    /// The call is rejected before any stream is returned.
    Refuse(&'static str),
    /// The stream never yields.
    Hang,
}

/// Replays queued scripts in order and records every request.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn stream_response(&self, request: &ModelRequest) -> study_llm::Result<ModelStream> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Reply(vec![Step::Done(None)]));

        match script {
            Script::Refuse(message) => Err(LLMError::Api(message.to_string())),
            Script::Hang => Ok(Box::pin(stream::pending())),
            Script::Reply(steps) => {
                let items: Vec<study_llm::Result<StreamFragment>> = steps
                    .into_iter()
                    .map(|step| match step {
                        Step::Delta(text) => Ok(StreamFragment::Delta(text.to_string())),
                        Step::Done(text) => Ok(StreamFragment::Completed {
                            output_text: text.map(str::to_string),
                        }),
                        Step::Fail(message) => Err(LLMError::Stream(message.to_string())),
                    })
                    .collect();
                Ok(Box::pin(stream::iter(items)))
            }
        }
    }
}
