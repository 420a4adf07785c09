//! Error types for the credential engine.
//!
//! Construction errors propagate to the caller and are fatal to loader
//! creation. Runtime-reload errors are caught at tick scope by the reload
//! loop, logged, and never propagated; the prior valid snapshot remains in
//! place.

use std::path::PathBuf;

use thiserror::Error;
use time::OffsetDateTime;

use crate::validate::Role;

/// Errors produced while loading, parsing, or validating credentials.
#[derive(Debug, Error)]
pub enum CredsError {
    /// A configured path does not name an existing regular file.
    #[error("credential file does not exist or is not a regular file: {path}")]
    FileMissing {
        /// The offending path.
        path: PathBuf,
    },

    /// A credential file could not be read.
    #[error("failed to read credential file {path}: {source}")]
    FileUnreadable {
        /// The offending path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The CA bundle yielded no acceptable certificates.
    #[error("CA bundle contains no usable certificates")]
    CaBundleUnparsable,

    /// The certificate/key pair could not be assembled: bad PEM, mismatched
    /// key, or an unsupported algorithm.
    #[error("failed to load certificate and key: {0}")]
    LeafOrKeyUnparsable(String),

    /// The leaf certificate's validity window has not started yet.
    #[error("certificate is not valid until {not_before}")]
    NotYetValid {
        /// Start of the leaf's validity window.
        not_before: OffsetDateTime,
    },

    /// The leaf certificate expires within the minimum-validity floor.
    #[error("certificate expires at {not_after}, inside the minimum validity window")]
    AboutToExpire {
        /// End of the leaf's validity window.
        not_after: OffsetDateTime,
    },

    /// The leaf's extended key usages do not cover the loader's role.
    #[error("certificate is not valid for {role} usage")]
    WrongUsage {
        /// The role the validator demanded.
        role: Role,
    },

    /// The leaf does not chain to the trust pool carried in its own bundle.
    #[error("certificate chain verification failed: {0}")]
    ChainVerificationFailed(String),
}

/// Result type alias using [`CredsError`].
pub type Result<T> = std::result::Result<T, CredsError>;
