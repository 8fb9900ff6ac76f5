//! Error types for the Huly MCP server.

use thiserror::Error;

/// Errors that can occur in the Huly MCP server.
#[derive(Debug, Error)]
pub enum Error {
    /// An error from the tracker layer (lookup, validation, backend, ...).
    #[error(transparent)]
    Tracker(#[from] huly_tracker::Error),

    /// A response could not be encoded for the protocol.
    #[error("MCP error: {0}")]
    Mcp(String),
}

/// Result type for Huly MCP operations.
pub type Result<T> = std::result::Result<T, Error>;
