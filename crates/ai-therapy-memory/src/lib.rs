//! Conversation memory: retrying remote calls, embeddings, file-backed
//! records, and similarity recall for prompt injection.

pub mod bank;
pub mod embedding;
pub mod error;
pub mod model;
pub mod retry;
pub mod store;
pub mod topics;

/// Memory bank and its embedding state.
pub use bank::{EmbeddingState, MemoryBank, RecallMode, SIMILARITY_THRESHOLD};
/// Embedding front-end, provider interface, and similarity.
pub use embedding::{Embedder, EmbeddingProvider, OpenAiEmbeddingProvider, cosine_similarity};
/// Error types.
pub use error::{MemoryError, RemoteError};
/// Record model.
pub use model::{MemoryRecord, MemorySearchResult, MemoryStats, Sender};
/// Retry executor.
pub use retry::{RetryConfig, retry_with_backoff};
/// Store interface and default file implementation.
pub use store::{FileMemoryStore, MemoryStore};
