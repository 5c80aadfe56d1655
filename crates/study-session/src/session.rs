use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use study_core::{
    CatalogError, ContentCatalog, Event, EventKind, History, TokenBudgetTruncator,
    TruncationReport, Turn,
};
use study_llm::{ModelProvider, ModelRequest};
use study_log::EventBus;

use crate::config::{ParticipantContext, SessionConfig, SessionServices};
use crate::stream::{consume_model_stream, StreamError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingModel,
    Streaming,
    Error,
}

/// A user message whose model call failed. Kept so the turn can be retried
/// without the participant retyping it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTurn {
    pub message: String,
    pub partial: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    /// Committed history after the turn.
    pub transcript: Vec<Turn>,
    pub corrected: bool,
    pub truncation: TruncationReport,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("model call failed: {}", .0.reason)]
    TurnFailed(FailedTurn),

    #[error("turn cancelled")]
    Cancelled,

    #[error("no failed turn to retry")]
    NothingToRetry,
}

/// One participant's chat on one question.
///
/// Turns are strictly sequential: `&mut self` on the send methods keeps a
/// second message out while one is in flight. History only grows by whole
/// user/assistant pairs, committed after the model finishes.
pub struct ConversationSession {
    id: String,
    context: ParticipantContext,
    history: History,
    state: SessionState,
    failed_turn: Option<FailedTurn>,
    last_activity: Instant,
    config: SessionConfig,
    truncator: TokenBudgetTruncator,
    provider: Arc<dyn ModelProvider>,
    events: EventBus,
}

impl ConversationSession {
    pub fn new(
        id: impl Into<String>,
        context: ParticipantContext,
        history: History,
        services: &SessionServices,
        config: SessionConfig,
    ) -> Self {
        Self {
            id: id.into(),
            context,
            history,
            state: SessionState::Idle,
            failed_turn: None,
            last_activity: Instant::now(),
            truncator: services.truncator(&config),
            config,
            provider: Arc::clone(&services.provider),
            events: services.events.clone(),
        }
    }

    /// Build the initial transcript for the participant's question and
    /// condition, and record the `session_start` event.
    pub fn open(
        id: impl Into<String>,
        context: ParticipantContext,
        catalog: &ContentCatalog,
        services: &SessionServices,
        config: SessionConfig,
    ) -> Result<Self, CatalogError> {
        let history = catalog.initial_history(&context.question_id, context.condition())?;
        let session = Self::new(id, context, history, services, config);

        log::info!(
            "[{}] Session opened for participant {} on question {:?}",
            session.id,
            session.context.participant_id,
            session.context.question_id
        );
        session.emit(EventKind::SessionStart, session.condition_payload());
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &ParticipantContext {
        &self.context
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn failed_turn(&self) -> Option<&FailedTurn> {
        self.failed_turn.as_ref()
    }

    /// Time since the session was opened or last finished a turn.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Send one user message and stream the reply.
    ///
    /// While the model streams, `updates` receives the full displayed
    /// transcript (committed history, the pending user turn and the partial
    /// assistant turn) after every delta. On success the pair is committed.
    /// On failure history is left unchanged and the message is kept as the
    /// failed turn.
    pub async fn send_message(
        &mut self,
        message: impl Into<String>,
        updates: &mpsc::Sender<Vec<Turn>>,
        cancel_token: &CancellationToken,
    ) -> Result<TurnOutcome, SessionError> {
        let result = self
            .run_turn(message.into(), false, updates, cancel_token)
            .await;
        self.last_activity = Instant::now();
        result
    }

    /// Resend the message of the last failed turn.
    ///
    /// The failed turn stays recorded until a turn succeeds or fails again,
    /// so a cancelled retry can be retried.
    pub async fn retry_failed(
        &mut self,
        updates: &mpsc::Sender<Vec<Turn>>,
        cancel_token: &CancellationToken,
    ) -> Result<TurnOutcome, SessionError> {
        let message = self
            .failed_turn
            .as_ref()
            .map(|failed| failed.message.clone())
            .ok_or(SessionError::NothingToRetry)?;
        let result = self.run_turn(message, true, updates, cancel_token).await;
        self.last_activity = Instant::now();
        result
    }

    async fn run_turn(
        &mut self,
        message: String,
        retry: bool,
        updates: &mpsc::Sender<Vec<Turn>>,
        cancel_token: &CancellationToken,
    ) -> Result<TurnOutcome, SessionError> {
        if self.state != SessionState::Idle {
            // only reachable when a previous turn's future was dropped mid-flight
            log::warn!(
                "[{}] Recovering from abandoned turn in state {:?}",
                self.id,
                self.state
            );
            self.state = SessionState::Idle;
        }

        let mut payload = self.condition_payload();
        payload.insert("text".to_string(), Value::String(message.clone()));
        if retry {
            payload.insert("retry".to_string(), Value::Bool(true));
        }
        self.emit(EventKind::ChatUser, payload);

        let user_turn = Turn::user(message.clone());
        let pending = self.history.extended_with(std::slice::from_ref(&user_turn));
        let (input, truncation) = self.truncator.truncate_with_report(pending.clone());
        if truncation.turns_removed > 0 {
            log::info!(
                "[{}] Dropped {} oldest turns to fit {} tokens",
                self.id,
                truncation.turns_removed,
                truncation.budget
            );
        }
        if truncation.over_budget {
            log::warn!(
                "[{}] Request is {} tokens, over the {} budget after truncation",
                self.id,
                truncation.total_tokens,
                truncation.budget
            );
        }

        let request = ModelRequest {
            input,
            options: self.config.request.clone(),
        };

        self.state = SessionState::AwaitingModel;
        let provider = Arc::clone(&self.provider);
        let started = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => None,
            result = provider.stream_response(&request) => Some(result),
        };

        let stream = match started {
            None => return Err(self.cancel_turn()),
            Some(Err(error)) => {
                return Err(self.fail_turn(message, String::new(), error.to_string()));
            }
            Some(Ok(stream)) => stream,
        };

        self.state = SessionState::Streaming;
        let streamed = consume_model_stream(
            stream,
            updates,
            |text| {
                let mut transcript = pending.clone();
                transcript.push(Turn::assistant(text));
                transcript
            },
            cancel_token,
        )
        .await;

        match streamed {
            Ok(output) => {
                self.history.push(user_turn);
                self.history.push(Turn::assistant(output.text.clone()));
                self.failed_turn = None;
                self.state = SessionState::Idle;

                let mut payload = self.condition_payload();
                payload.insert("text".to_string(), Value::String(output.text.clone()));
                self.emit(EventKind::ChatAssistant, payload);

                log::info!(
                    "[{}] Turn complete ({} chars, {} updates{})",
                    self.id,
                    output.text.len(),
                    output.emissions,
                    if output.corrected { ", corrected" } else { "" }
                );

                Ok(TurnOutcome {
                    reply: output.text,
                    transcript: self.history.turns().to_vec(),
                    corrected: output.corrected,
                    truncation,
                })
            }
            Err(StreamError::Transport { partial, source }) => {
                Err(self.fail_turn(message, partial, source.to_string()))
            }
            Err(StreamError::Cancelled { .. }) => Err(self.cancel_turn()),
        }
    }

    fn fail_turn(&mut self, message: String, partial: String, reason: String) -> SessionError {
        self.state = SessionState::Error;
        log::warn!("[{}] Model call failed: {}", self.id, reason);

        let failed = FailedTurn {
            message,
            partial,
            reason,
        };

        let mut payload = self.condition_payload();
        payload.insert("text".to_string(), Value::String(failed.message.clone()));
        payload.insert("partial".to_string(), Value::String(failed.partial.clone()));
        payload.insert("error".to_string(), Value::String(failed.reason.clone()));
        self.emit(EventKind::ChatError, payload);

        self.failed_turn = Some(failed.clone());
        self.state = SessionState::Idle;
        SessionError::TurnFailed(failed)
    }

    fn cancel_turn(&mut self) -> SessionError {
        log::info!("[{}] Turn cancelled", self.id);
        self.state = SessionState::Idle;
        SessionError::Cancelled
    }

    fn condition_payload(&self) -> Map<String, Value> {
        let value = json!({
            "q": self.context.question_id,
            "ant": self.context.anthropomorphic,
            "correct": self.context.correct,
        });
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn emit(&self, kind: EventKind, payload: Map<String, Value>) {
        self.events
            .emit(Event::now(self.context.participant_id.clone(), kind, payload));
    }
}
