//! Error types for zoneinfo-engine operations.

use thiserror::Error;

/// Errors that can occur while locating, decoding, or interpreting zone data.
#[derive(Error, Debug)]
pub enum ZoneInfoError {
    /// The stream did not start with the `TZif` magic marker.
    #[error("Invalid TZif file: magic not found")]
    InvalidMagic,

    /// The stream ended before a complete structure could be read.
    #[error("Invalid TZif file: unexpected end of input")]
    UnexpectedEof,

    /// Structurally invalid TZif data (bad version byte, out-of-range index, ...).
    #[error("Invalid TZif file: {0}")]
    Format(String),

    /// The POSIX TZ rule string in the file footer could not be parsed.
    #[error("Invalid TZ string {rule:?}: {reason}")]
    InvalidRule { rule: String, reason: String },

    /// No source could resolve the zone key.
    #[error("No time zone found with key {0}")]
    NotFound(String),

    /// The zone key is not a safe relative path.
    #[error("Invalid zone key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other I/O failure while reading zone data.
    #[error("I/O error: {0}")]
    Io(std::io::Error),
}

impl ZoneInfoError {
    /// True for every error that means "the bytes are not a usable zone file",
    /// as opposed to "the key could not be resolved".
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ZoneInfoError::InvalidMagic
                | ZoneInfoError::UnexpectedEof
                | ZoneInfoError::Format(_)
                | ZoneInfoError::InvalidRule { .. }
        )
    }

    pub(crate) fn rule(rule: &str, reason: impl Into<String>) -> Self {
        ZoneInfoError::InvalidRule {
            rule: rule.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for ZoneInfoError {
    fn from(err: std::io::Error) -> Self {
        // A short read is a truncated file, not an environmental failure.
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            ZoneInfoError::UnexpectedEof
        } else {
            ZoneInfoError::Io(err)
        }
    }
}

/// Convenience alias used throughout zoneinfo-engine.
pub type Result<T> = std::result::Result<T, ZoneInfoError>;
