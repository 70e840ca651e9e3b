pub mod capture;
pub mod config;
pub mod device;
pub mod inference;
mod logging;
pub mod monitor;
pub mod orchestrator;
pub mod overlay;
pub mod shell;
mod telemetry;

pub use logging::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic,
};
pub use telemetry::init_tracing;
