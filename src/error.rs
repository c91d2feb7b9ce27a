//! Failure kinds surfaced by the session and identifier subsystems.
//!
//! Callers map these onto protocol-level faults, so the distinction between
//! "no such session", "expired session" and "malformed token" must be
//! preserved exactly — never collapse them into a single variant.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown user id, or the supplied credential did not match.
    /// Deliberately the same kind for both cases.
    #[error("unknown user or invalid credential")]
    UnknownUser,

    /// The token was empty, whitespace-only, or not present in the table.
    #[error("a valid session token is required")]
    TokenRequired,

    /// The token was found but its inactivity window has elapsed.
    #[error("session token has expired")]
    TokenExpired,

    /// A required startup setting was absent or unresolvable.
    #[error("missing configuration: {0}")]
    ConfigurationMissing(String),

    /// The underlying identifier-generation strategy failed.
    #[error("identifier generation failed: {0}")]
    GenerationFailure(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
