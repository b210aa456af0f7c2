//! Error types for the application.

use thiserror::Error;

/// Top-level application error.
#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Bridge call error: {0}")]
    Call(#[from] CallError),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Errors surfaced by the identity directories and resolution.
///
/// Clonable: a single-flight factory failure is delivered to every
/// waiter, not just the caller that ran the factory.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    /// Missing identity, alias, or thread. Triggers provisioning on the
    /// resolution path; only an error when provisioning is impossible.
    #[error("Not found: {id}")]
    NotFound { id: String },

    /// Transient remote-network failure. The caller may retry with
    /// backoff; the core never retries on its own.
    #[error("Remote network unavailable: {message}")]
    RemoteUnavailable { message: String },

    /// Transient local-network failure. Same retry policy as above.
    #[error("Local network unavailable: {message}")]
    LocalUnavailable { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Alias already taken by a room the bridge did not provision.
    /// Fatal for that identity; requires operator intervention.
    #[error("Alias '{alias}' conflicts with an existing room: {message}")]
    Conflict { alias: String, message: String },

    /// Remote metadata describes a thread type the bridge does not
    /// model. Fatal for that identity only; never cached.
    #[error("Unsupported thread kind: {kind}")]
    UnsupportedKind { kind: String },

    /// Irreconcilable naming/ownership mismatch between the two
    /// networks. Fatal for that identity; no auto-repair.
    #[error("Identity conflict: {message}")]
    IdentityConflict { message: String },

    /// A response that arrived but could not be interpreted.
    #[error("Malformed response: {message}")]
    Malformed { message: String },
}

/// Cross-runtime bridge call lifecycle errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("Bridge call timed out")]
    Timeout,

    #[error("Bridge is shutting down")]
    ShuttingDown,
}

/// Result type alias using AppError.
#[allow(dead_code)]
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for directory and resolution operations.
pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Result type alias for bridge calls.
pub type CallResult<T> = std::result::Result<T, CallError>;
