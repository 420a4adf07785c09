//! Hot-reloading mutual-TLS credential engine.
//!
//! Shared by `keywheel-client-core` and `keywheel-server-core`:
//!
//! - Raw PEM material with content-digest equality
//! - Parsing into a leaf chain + private key + trust pool
//! - Role-aware validation (validity floor, extended key usage, chain
//!   verification against the bundled trust pool)
//! - Atomic snapshot publication
//! - The periodic file reload loop
//!
//! The engine is a passive consumer of three PEM files on a local
//! filesystem. It never fetches material over the network, never persists
//! anything, and never rotates keys on its own.

pub mod error;
pub mod keypair;
pub mod loader;
pub mod material;
pub mod store;
pub mod validate;

pub use error::CredsError;
pub use keypair::{crypto_provider, KeyPair};
pub use loader::{CredentialLoader, LoaderOptions, DEFAULT_RELOAD_INTERVAL};
pub use material::RawMaterial;
pub use store::SnapshotCell;
pub use validate::{validate_key_pair, validator_for, Role, ValidateFn, MINIMUM_VALIDITY};
