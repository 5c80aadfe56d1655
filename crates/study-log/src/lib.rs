pub mod bus;
pub mod csv;
pub mod store;
pub mod worker;

pub use bus::EventBus;
pub use store::{BatchReport, EventLogger, LogError, LogResult};
pub use worker::{LogWorker, WorkerStats};
