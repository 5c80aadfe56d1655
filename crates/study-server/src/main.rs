use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use study_server::logging::init_logging;
use study_server::{run_server, ServerConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "study-server")]
#[command(about = "Study chat proxy and navigation log collector")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Bind address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Server port
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Directory for per-participant navigation logs
    #[arg(long, env = "LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Directory for per-participant conversation logs
    #[arg(long, env = "CHAT_LOG_DIR", default_value = "logs/chat")]
    chat_log_dir: PathBuf,

    /// Model API key
    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Model API base URL
    #[arg(long, env = "LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    llm_base_url: String,

    /// Model name
    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4.1")]
    model: String,

    /// Sampling temperature
    #[arg(long, env = "LLM_TEMPERATURE", default_value = "0")]
    temperature: f32,

    /// Token ceiling for one request
    #[arg(long, env = "MAX_CONTEXT_TOKENS", default_value = "16000")]
    max_context_tokens: u32,

    /// Question content file
    #[arg(long = "catalog", env = "CATALOG_PATH", default_value = "config/catalog.toml")]
    catalog_path: PathBuf,

    /// Capacity of the event queue feeding the log writer
    #[arg(long, env = "EVENT_BUFFER", default_value = "1024")]
    event_buffer: usize,

    /// Seconds of inactivity before a chat session is forgotten
    #[arg(long, env = "SESSION_IDLE_SECS", default_value = "7200")]
    session_idle_secs: u64,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            log_dir: cli.log_dir,
            chat_log_dir: cli.chat_log_dir,
            api_key: cli.api_key,
            llm_base_url: cli.llm_base_url,
            model: cli.model,
            temperature: cli.temperature,
            max_context_tokens: cli.max_context_tokens,
            catalog_path: cli.catalog_path,
            event_buffer: cli.event_buffer,
            session_idle_timeout: Duration::from_secs(cli.session_idle_secs),
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.debug);

    log::info!("Starting study server on {}:{}", cli.host, cli.port);
    log::info!("Model configuration:");
    log::info!("  Base URL: {}", cli.llm_base_url);
    log::info!("  Model: {}", cli.model);
    log::info!("  Temperature: {}", cli.temperature);
    log::info!("  Context budget: {} tokens", cli.max_context_tokens);

    if cli.debug {
        log::debug!("Debug mode enabled");
        log::debug!("  Log dir: {:?}", cli.log_dir);
        log::debug!("  Chat log dir: {:?}", cli.chat_log_dir);
        log::debug!("  Catalog: {:?}", cli.catalog_path);
        log::debug!("  Event buffer: {}", cli.event_buffer);
        log::debug!("  Session idle timeout: {}s", cli.session_idle_secs);
    }

    run_server(cli.into()).await
}
