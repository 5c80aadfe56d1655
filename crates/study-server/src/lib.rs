pub mod config;
pub mod handlers;
pub mod logging;
pub mod params;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use server::{app_config, run_server};
pub use state::AppState;
