//! Read-side MCP server over the conversation memory store.
//!
//! Exposes statistics, sender-filtered search, topic lookups and breakthrough
//! recall as MCP tools so another assistant can consult stored turns.

pub mod analysis;
pub mod error;
pub mod reader;
pub mod server;
pub mod tools;

pub use analysis::TherapeuticCategory;
pub use error::ServeError;
pub use reader::{MemoryReader, ReaderStats, ScoredMemory, SearchFilter, SearchMode};
pub use server::{MemoryToolServer, tool_definitions};
