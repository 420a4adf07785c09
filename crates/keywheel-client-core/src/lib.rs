//! Client-side transport core for hot-reloaded mTLS credentials.
//!
//! Wraps the `keywheel-creds` engine for the dialing side of a connection:
//!
//! - [`ClientLoader`] — the role-specialised facade (client-auth validation,
//!   eager first load, reload loop)
//! - [`DynamicHttpsClient`] — an HTTPS round-trip surface over a pooled
//!   hyper client that is rebuilt only when the credential snapshot changes
//! - [`TlsCredentials`] — RPC-style transport credentials that secure raw
//!   connections handed in by an RPC stack
//!
//! Established connections are never migrated on rotation; they drain
//! naturally, which is what keeps rotation non-disruptive.

pub mod credentials;
pub mod error;
pub mod http;
pub mod loader;

pub use credentials::{ProtocolInfo, TlsCredentials};
pub use error::ClientError;
pub use http::DynamicHttpsClient;
pub use loader::ClientLoader;
