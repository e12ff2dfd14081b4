//! Error types for the magnet engine.

use lodestone_env::EnvError;
use thiserror::Error;

/// Errors surfaced by configuration loading and replication.
///
/// Nothing inside a simulation tick returns these: per-tick faults are
/// absorbed with a safe default (zero force, `Polarity::None`) and logged.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Physical constants violate their invariants
    #[error("Invalid physical constants: {0}")]
    InvalidConstants(String),
    
    /// A gaussmeter threshold is negative or not finite
    #[error("Invalid gaussmeter threshold: {0}")]
    InvalidThreshold(f64),
    
    /// Config file could not be read or written
    #[error("Config I/O error at {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    
    /// Config file is not valid JSON for the expected shape
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
    
    /// Replication payload could not be decoded
    #[error("Codec error: {0}")]
    Codec(String),
    
    /// The replication transport rejected a send
    #[error("Transport error: {0}")]
    Transport(#[from] EnvError),
}
