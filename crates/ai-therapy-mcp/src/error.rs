use thiserror::Error;

/// Failures running the MCP transport.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("MCP handshake failed: {0}")]
    Initialize(String),
    #[error("MCP server task ended abnormally: {0}")]
    Terminated(String),
}
