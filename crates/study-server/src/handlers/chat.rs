use actix_web::{http::header, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, oneshot, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use study_core::Turn;
use study_session::{ConversationSession, SessionError, TurnOutcome};

use crate::state::{sse_frame, AppState};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

enum TurnKind {
    Message(String),
    Retry,
}

/// Send a participant message and stream the transcript back as SSE.
pub async fn send_message(
    state: web::Data<AppState>,
    path: web::Path<String>,
    request: web::Json<SendMessageRequest>,
) -> impl Responder {
    let session_id = path.into_inner();
    let message = request.into_inner().message;

    if message.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({ "error": "Message must not be empty" }));
    }

    let session = match lock_session(&state, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };

    log::info!("[{}] Message received ({} chars)", session_id, message.len());
    stream_turn(session, TurnKind::Message(message))
}

/// Resend the last failed message of a session.
pub async fn retry(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();

    let session = match lock_session(&state, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };

    if session.failed_turn().is_none() {
        return HttpResponse::Conflict().json(json!({ "error": "No failed turn to retry" }));
    }

    log::info!("[{}] Retrying failed turn", session_id);
    stream_turn(session, TurnKind::Retry)
}

fn lock_session(
    state: &AppState,
    session_id: &str,
) -> Result<OwnedMutexGuard<ConversationSession>, HttpResponse> {
    let Some(session) = state.session(session_id) else {
        return Err(HttpResponse::NotFound().json(json!({ "error": "Session not found" })));
    };

    session.try_lock_owned().map_err(|_| {
        log::warn!("[{}] Rejected message while a turn is running", session_id);
        HttpResponse::Conflict().json(json!({ "error": "A turn is already in progress" }))
    })
}

/// Run the turn on its own task and stream its updates. Dropping the response
/// body (client disconnect) cancels the turn.
fn stream_turn(mut session: OwnedMutexGuard<ConversationSession>, kind: TurnKind) -> HttpResponse {
    let cancel_token = CancellationToken::new();
    let (update_tx, mut update_rx) = mpsc::channel::<Vec<Turn>>(32);
    let (outcome_tx, outcome_rx) = oneshot::channel::<Result<TurnOutcome, SessionError>>();

    let turn_token = cancel_token.clone();
    tokio::spawn(async move {
        let result = match kind {
            TurnKind::Message(message) => {
                session.send_message(message, &update_tx, &turn_token).await
            }
            TurnKind::Retry => session.retry_failed(&update_tx, &turn_token).await,
        };
        drop(update_tx);
        let _ = outcome_tx.send(result);
    });

    let cancel_on_drop = cancel_token.drop_guard();

    HttpResponse::Ok()
        .append_header((header::CONTENT_TYPE, "text/event-stream"))
        .append_header((header::CACHE_CONTROL, "no-cache"))
        .append_header((header::CONNECTION, "keep-alive"))
        .streaming(async_stream::stream! {
            let _cancel_on_drop = cancel_on_drop;

            while let Some(history) = update_rx.recv().await {
                yield Ok::<_, actix_web::Error>(sse_frame(&json!({
                    "type": "transcript",
                    "history": history,
                })));
            }

            let last = match outcome_rx.await {
                Ok(Ok(outcome)) => json!({
                    "type": "complete",
                    "reply": outcome.reply,
                    "history": outcome.transcript,
                }),
                Ok(Err(SessionError::TurnFailed(failed))) => json!({
                    "type": "error",
                    "message": failed.reason,
                    "partial": failed.partial,
                    "retryable": true,
                }),
                Ok(Err(e)) => json!({
                    "type": "error",
                    "message": e.to_string(),
                    "partial": "",
                    "retryable": false,
                }),
                Err(_) => json!({
                    "type": "error",
                    "message": "Turn aborted",
                    "partial": "",
                    "retryable": false,
                }),
            };
            yield Ok::<_, actix_web::Error>(sse_frame(&last));
        })
}
