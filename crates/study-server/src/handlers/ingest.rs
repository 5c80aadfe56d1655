use actix_web::{http::header, web, HttpRequest, HttpResponse, Responder};
use serde_json::{json, Value};

use study_core::{Event, ANONYMOUS_PARTICIPANT};

use crate::state::AppState;

/// Accept a batch of navigation events from the browser extension.
///
/// The body is parsed leniently: anything that is not a JSON object with an
/// `events` array is an empty batch. The response carries the number of rows
/// actually written.
pub async fn handler(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let events = parse_batch(&body);
    let report = state.logger.append_batch(&events).await;

    log::info!(
        "Ingested {} of {} events ({} failed)",
        report.saved,
        events.len(),
        report.failed
    );

    HttpResponse::Ok().json(json!({ "ok": true, "saved": report.saved }))
}

/// CORS preflight for the browser extension. Always an empty 204.
pub async fn preflight(req: HttpRequest) -> impl Responder {
    let requested_headers = req
        .headers()
        .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("Content-Type")
        .to_string();

    HttpResponse::NoContent()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, requested_headers))
        .insert_header((header::ACCESS_CONTROL_MAX_AGE, "86400"))
        .finish()
}

fn parse_batch(body: &[u8]) -> Vec<Event> {
    let payload: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            if !body.is_empty() {
                log::warn!("Malformed ingest payload ({} bytes): {}", body.len(), e);
            }
            return Vec::new();
        }
    };

    let Some(items) = payload.get("events").and_then(Value::as_array) else {
        log::warn!("Ingest payload has no events array");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            if !item.is_object() {
                log::warn!("Skipping non-object ingest event: {}", item);
                return None;
            }
            let participant = match field_text(item, "prolificId") {
                id if id.is_empty() => ANONYMOUS_PARTICIPANT.to_string(),
                id => id,
            };
            Some(Event::url_visit(
                participant,
                field_text(item, "ts"),
                field_text(item, "url"),
                field_text(item, "questionId"),
                field_text(item, "source"),
            ))
        })
        .collect()
}

fn field_text(item: &Value, key: &str) -> String {
    match item.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
