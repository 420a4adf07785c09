//! Error types for the client transport layer.

use keywheel_creds::CredsError;
use thiserror::Error;

/// Errors that can occur in the client transports.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Credential engine failure (construction or forced reload).
    #[error(transparent)]
    Creds(#[from] CredsError),

    /// Building a TLS configuration from the current snapshot failed.
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// The authority string could not be turned into a TLS server name.
    #[error("invalid authority for TLS handshake: {0}")]
    InvalidAuthority(String),

    /// The TLS handshake itself failed.
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    /// The HTTP round trip failed (connect, handshake, or protocol error).
    #[error("HTTP request failed: {0}")]
    Http(#[source] hyper_util::client::legacy::Error),
}

/// Result type alias using [`ClientError`].
pub type Result<T> = std::result::Result<T, ClientError>;
