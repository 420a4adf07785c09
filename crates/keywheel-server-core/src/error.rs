//! Error types for the server transport layer.

use keywheel_creds::CredsError;
use thiserror::Error;

/// Errors that can occur in the server transport.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Credential engine failure (construction or forced reload).
    #[error(transparent)]
    Creds(#[from] CredsError),

    /// Building a TLS configuration from the current snapshot failed.
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// The TLS handshake itself failed.
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),
}

/// Result type alias using [`ServerError`].
pub type Result<T> = std::result::Result<T, ServerError>;
