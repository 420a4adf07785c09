//! Server-side transport core for hot-reloaded mTLS credentials.
//!
//! Wraps the `keywheel-creds` engine for the accepting side of a
//! connection:
//!
//! - [`ServerLoader`] — the role-specialised facade (server-auth
//!   validation, eager first load, reload loop)
//! - [`DynamicTlsAcceptor`] — completes each inbound handshake under a
//!   fresh TLS config pinned to the snapshot current at ClientHello time,
//!   with client certificates required and verified against the snapshot's
//!   trust pool
//!
//! Sessions established before a rotation keep the config they handshook
//! with; only new handshakes see the new identity.

pub mod acceptor;
pub mod error;
pub mod loader;

pub use acceptor::DynamicTlsAcceptor;
pub use error::ServerError;
pub use loader::ServerLoader;
