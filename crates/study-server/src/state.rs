use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actix_web::web::Bytes;
use anyhow::Context;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use study_core::{ContentCatalog, TokenizerRegistry};
use study_llm::{ModelProvider, OpenAIResponsesProvider};
use study_log::{EventBus, EventLogger, LogWorker, WorkerStats};
use study_session::{ConversationSession, SessionConfig, SessionServices};

use crate::config::ServerConfig;

pub type SharedSession = Arc<Mutex<ConversationSession>>;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<ContentCatalog>,
    pub logger: Arc<EventLogger>,
    pub services: SessionServices,
    pub session_config: SessionConfig,
    pub sessions: Arc<DashMap<String, SharedSession>>,
    pub failed_writes: Arc<AtomicU64>,
}

impl AppState {
    /// Wire up the state and spawn the log worker. The worker stops once every
    /// clone of the state is dropped.
    pub fn new(
        catalog: ContentCatalog,
        logger: Arc<EventLogger>,
        provider: Arc<dyn ModelProvider>,
        session_config: SessionConfig,
        event_buffer: usize,
    ) -> (Self, JoinHandle<WorkerStats>) {
        let (events, receiver) = EventBus::new(event_buffer);
        let worker = LogWorker::new(Arc::clone(&logger));
        let failed_writes = worker.failure_counter();
        let handle = worker.spawn(receiver);

        let state = Self {
            catalog: Arc::new(catalog),
            logger,
            services: SessionServices {
                provider,
                events,
                tokenizers: TokenizerRegistry::new(),
            },
            session_config,
            sessions: Arc::new(DashMap::new()),
            failed_writes,
        };
        (state, handle)
    }

    pub async fn from_config(config: &ServerConfig) -> anyhow::Result<(Self, JoinHandle<WorkerStats>)> {
        let logger = Arc::new(EventLogger::new(&config.log_dir, &config.chat_log_dir));
        logger
            .init()
            .await
            .context("failed to create log directories")?;
        log::info!(
            "Logging visits to {:?} and conversations to {:?}",
            config.log_dir,
            config.chat_log_dir
        );

        let catalog = ContentCatalog::load(&config.catalog_path)
            .with_context(|| format!("failed to load catalog {:?}", config.catalog_path))?;

        if config.api_key.is_empty() {
            log::warn!("No API key configured; model calls will be rejected upstream");
        }
        let provider: Arc<dyn ModelProvider> = Arc::new(
            OpenAIResponsesProvider::new(config.api_key.clone())
                .with_base_url(config.llm_base_url.clone()),
        );

        Ok(Self::new(
            catalog,
            logger,
            provider,
            config.session_config(),
            config.event_buffer,
        ))
    }

    pub fn session(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn insert_session(&self, session: ConversationSession) -> SharedSession {
        let id = session.id().to_string();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.insert(id, Arc::clone(&shared));
        shared
    }

    /// Forget sessions idle for longer than `max_idle`. Sessions with a turn
    /// in flight are kept. Returns how many were removed.
    pub fn expire_idle_sessions(&self, max_idle: Duration) -> usize {
        expire_idle(&self.sessions, max_idle)
    }

    /// Sweep idle sessions every `every`. The task holds only the session map,
    /// so it must be aborted before waiting on the log worker.
    pub fn spawn_session_sweeper(&self, every: Duration, max_idle: Duration) -> JoinHandle<()> {
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let removed = expire_idle(&sessions, max_idle);
                if removed > 0 {
                    log::info!(
                        "Expired {} idle sessions, {} remain",
                        removed,
                        sessions.len()
                    );
                }
            }
        })
    }

    pub fn dropped_events(&self) -> u64 {
        self.services.events.dropped_count()
    }

    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }
}

fn expire_idle(sessions: &DashMap<String, SharedSession>, max_idle: Duration) -> usize {
    let mut removed = 0;
    sessions.retain(|_, session| {
        let keep = match session.try_lock() {
            Ok(session) => session.idle_for() <= max_idle,
            Err(_) => true,
        };
        if !keep {
            removed += 1;
        }
        keep
    });
    removed
}

/// Frame one JSON value as a server-sent event.
pub fn sse_frame(value: &serde_json::Value) -> Bytes {
    Bytes::from(format!("data: {}\n\n", value))
}
