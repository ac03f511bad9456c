//! Error types shared across the STRIDER workspace.

use thiserror::Error;

/// Configuration loading or validation error.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read.
    #[error("config I/O error: {0}")]
    Io(String),

    /// TOML syntax or type error.
    #[error("config parse error: {0}")]
    Parse(String),

    /// A parameter is out of its permitted range.
    #[error("config validation: {0}")]
    Validation(String),
}

/// Telemetry snapshot codec error.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The payload carries a different protocol version than this
    /// build understands. Receivers must not interpret the fields.
    #[error("telemetry protocol version mismatch: expected {expected}, got {found}")]
    VersionMismatch {
        /// Version this build speaks.
        expected: u32,
        /// Version found in the payload.
        found: u32,
    },

    /// Serialization failed.
    #[error("telemetry encode error: {0}")]
    Encode(String),

    /// Deserialization failed (malformed payload).
    #[error("telemetry decode error: {0}")]
    Decode(String),
}
