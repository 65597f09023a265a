//! Error types for Broadsheet client operations.

use thiserror::Error;

/// Result type alias for Broadsheet client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Broadsheet client operations.
///
/// The first five variants form the classification surfaced to views:
/// `Unauthenticated` asks the host to trigger a re-login, `Forbidden` is a
/// permission failure, `NotFound`/`Conflict` mean the target or transition
/// went stale, and `SyncFailed` means every endpoint candidate was exhausted.
#[derive(Error, Debug)]
pub enum Error {
    /// No credential present, or the server rejected the credential.
    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated but not permitted (blocked user, non-admin transition,
    /// admin self-revocation).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Target no longer exists.
    #[error("Not found: {0}")]
    NotFound(String),

    /// State transition no longer valid.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// All endpoint candidates exhausted due to network or server error.
    #[error("Sync failed after {attempts} attempt(s): {last_error}")]
    SyncFailed { attempts: u32, last_error: String },

    /// Response payload could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input or arguments.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Creates a new unauthenticated error.
    pub fn unauthenticated<T: ToString>(msg: T) -> Self {
        Self::Unauthenticated(msg.to_string())
    }

    /// Creates a new forbidden error.
    pub fn forbidden<T: ToString>(msg: T) -> Self {
        Self::Forbidden(msg.to_string())
    }

    /// Creates a new not-found error.
    pub fn not_found<T: ToString>(msg: T) -> Self {
        Self::NotFound(msg.to_string())
    }

    /// Creates a new conflict error.
    pub fn conflict<T: ToString>(msg: T) -> Self {
        Self::Conflict(msg.to_string())
    }

    /// Creates a new serialization error.
    pub fn serialization<T: ToString>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Creates a new invalid input error.
    pub fn invalid_input<T: ToString>(msg: T) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    /// Returns true if the host should trigger a re-login.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated(_))
    }
}
