//! Error types for the PromptScaffold domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

use crate::format::FormatValidation;

/// The top-level error type for all PromptScaffold operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Enrichment errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Storage errors ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Custom format errors ---
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the external enrichment API.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unusable response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// The coarse category of a storage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    NoCredential,
    Unauthorized,
    Forbidden,
    NotFound,
    Other,
}

/// Failures of local or remote persistence.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("No access token available")]
    NoCredential,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl StorageError {
    pub fn kind(&self) -> StorageErrorKind {
        match self {
            Self::NoCredential => StorageErrorKind::NoCredential,
            Self::Unauthorized(_) => StorageErrorKind::Unauthorized,
            Self::Forbidden(_) => StorageErrorKind::Forbidden,
            Self::NotFound(_) => StorageErrorKind::NotFound,
            Self::Other(_) => StorageErrorKind::Other,
        }
    }

    /// Credential and permission failures are surfaced, never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            StorageErrorKind::NotFound | StorageErrorKind::Other
        )
    }
}

/// Failures of custom format operations.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Format name must not be empty")]
    EmptyName,

    #[error("Invalid template: {}", .0.errors.join("; "))]
    InvalidTemplate(FormatValidation),

    #[error("Import payload is not a JSON array: {0}")]
    Parse(String),

    /// One import entry has the wrong shape.
    #[error("{0}")]
    InvalidEntry(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
