use std::path::PathBuf;
use std::time::Duration;

use study_llm::RequestOptions;
use study_session::SessionConfig;

/// Everything the server needs at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory for the per-participant navigation logs.
    pub log_dir: PathBuf,
    /// Directory for the per-participant conversation logs.
    pub chat_log_dir: PathBuf,
    pub api_key: String,
    pub llm_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_context_tokens: u32,
    pub catalog_path: PathBuf,
    pub event_buffer: usize,
    /// Sessions without a finished turn for this long are dropped.
    pub session_idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_dir: PathBuf::from("logs"),
            chat_log_dir: PathBuf::from("logs/chat"),
            api_key: String::new(),
            llm_base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1".to_string(),
            temperature: 0.0,
            max_context_tokens: 16_000,
            catalog_path: PathBuf::from("config/catalog.toml"),
            event_buffer: 1024,
            session_idle_timeout: Duration::from_secs(2 * 60 * 60),
        }
    }
}

impl ServerConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            request: RequestOptions {
                model: self.model.clone(),
                temperature: self.temperature,
                ..RequestOptions::default()
            },
            max_context_tokens: self.max_context_tokens,
        }
    }
}
