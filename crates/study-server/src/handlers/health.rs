use actix_web::{http::header, web, HttpResponse, Responder};
use serde_json::json;

use crate::state::AppState;

pub const LIVENESS_MESSAGE: &str = "URL Tracker collector is running. POST JSON to /ingest";

/// Plain-text liveness check on `/`.
pub async fn liveness() -> impl Responder {
    HttpResponse::Ok()
        .append_header((header::CONTENT_TYPE, "text/plain; charset=utf-8"))
        .body(LIVENESS_MESSAGE)
}

pub async fn handler(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "active_sessions": state.sessions.len(),
        "dropped_events": state.dropped_events(),
        "failed_writes": state.failed_writes(),
    }))
}
