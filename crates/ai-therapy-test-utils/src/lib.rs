//! Test helpers shared across ai-therapy crates.

pub mod chat;
pub mod memory;

pub use chat::ScriptedChatClient;
pub use memory::{FailingEmbedder, ScriptedEmbedder, record_at};
