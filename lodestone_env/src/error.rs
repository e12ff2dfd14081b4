//! Error types for the Lodestone environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Network send failed (buffer full, connection closed, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),
    
    /// Target node is unreachable (simulated partition)
    #[error("Node unreachable: {0}")]
    NodeUnreachable(String),
    
    /// Envelope payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    SerializationError(String),
    
    /// The other end of a channel has been dropped
    #[error("Channel closed")]
    ChannelClosed,
}

impl EnvError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }
    
    /// Creates an unreachable error.
    pub fn unreachable(node: impl std::fmt::Display) -> Self {
        Self::NodeUnreachable(node.to_string())
    }
    
    /// Creates a serialization error.
    pub fn serialization(msg: impl std::fmt::Display) -> Self {
        Self::SerializationError(msg.to_string())
    }
}
