use std::time::Duration;

use actix_cors::Cors;
use actix_web::{http::Method, web, App, HttpServer};

use crate::config::ServerConfig;
use crate::handlers;
use crate::state::AppState;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Routes and CORS policy, shared by the binary and the integration tests.
pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::health::liveness))
        .service(
            web::resource(["/ingest", "/ingest/"])
                // OPTIONS is answered by the preflight handler with 204
                .wrap(Cors::permissive().disable_preflight())
                .route(web::post().to(handlers::ingest::handler))
                .route(web::method(Method::OPTIONS).to(handlers::ingest::preflight)),
        )
        .service(
            web::scope("/api/v1")
                .wrap(Cors::permissive())
                .route("/health", web::get().to(handlers::health::handler))
                .route("/sessions", web::post().to(handlers::session::create))
                .route("/sessions/{session_id}", web::get().to(handlers::session::get))
                .route(
                    "/sessions/{session_id}/messages",
                    web::post().to(handlers::chat::send_message),
                )
                .route(
                    "/sessions/{session_id}/retry",
                    web::post().to(handlers::chat::retry),
                ),
        );
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    log::info!(
        "Initializing server with model {} at {}",
        config.model,
        config.llm_base_url
    );
    let (state, worker) = AppState::from_config(&config).await?;
    let sweeper = state.spawn_session_sweeper(SESSION_SWEEP_INTERVAL, config.session_idle_timeout);
    let data = web::Data::new(state);

    let server_data = data.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(server_data.clone())
            .configure(app_config)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    // the worker drains the bus once the last state handle is gone
    sweeper.abort();
    drop(data);
    let stats = worker.await?;
    log::info!(
        "Server stopped ({} events written, {} failed)",
        stats.written,
        stats.failed
    );
    Ok(())
}
