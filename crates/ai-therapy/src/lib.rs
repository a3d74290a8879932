//! Memory-augmented therapy dialogue between a local Ollama model and Claude.
//!
//! This crate wires the chat clients, the conversation loop and the memory
//! bank together, and provides a small initialization helper for logging.

pub mod clients;
pub mod conversation;
pub mod setup;

/// Re-export for convenience.
pub use ai_therapy_config as config;
/// Re-export for convenience.
pub use ai_therapy_memory as memory;

/// Initialize `env_logger` at `info`, overridable through `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();
}
