use std::collections::HashMap;

use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use uuid::Uuid;

use study_core::CatalogError;
use study_session::ConversationSession;

use crate::params::participant_from_query;
use crate::state::AppState;

/// Open a chat for the participant and condition named in the query string.
pub async fn create(
    state: web::Data<AppState>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let context = participant_from_query(&query);
    let session_id = Uuid::new_v4().to_string();

    let session = match ConversationSession::open(
        session_id.clone(),
        context,
        &state.catalog,
        &state.services,
        state.session_config.clone(),
    ) {
        Ok(session) => session,
        Err(CatalogError::UnknownQuestion(question_id)) => {
            log::warn!("[{}] Unknown question {:?}", session_id, question_id);
            return HttpResponse::NotFound().json(json!({
                "error": format!("unknown question: {}", question_id)
            }));
        }
        Err(e) => {
            log::error!("[{}] Failed to open session: {}", session_id, e);
            return HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }));
        }
    };

    let body = json!({
        "session_id": session.id(),
        "participant_id": session.context().participant_id,
        "history": session.history(),
    });
    state.insert_session(session);

    HttpResponse::Created().json(body)
}

pub async fn get(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();

    let Some(session) = state.session(&session_id) else {
        return HttpResponse::NotFound().json(json!({ "error": "Session not found" }));
    };

    let Ok(session) = session.try_lock() else {
        return HttpResponse::Conflict().json(json!({ "error": "A turn is in progress" }));
    };

    HttpResponse::Ok().json(json!({
        "session_id": session.id(),
        "state": session.state(),
        "history": session.history(),
        "failed_turn": session.failed_turn(),
    }))
}
