//! Role-aware validation of parsed key pairs.
//!
//! A key pair is validated against the trust pool carried *inside* it: the
//! identity must be rooted in the same CA set it is presenting. That
//! catches mis-packaged bundles (CA rotated but leaf not re-issued) at
//! reload time instead of at the first handshake.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rustls_pki_types::{TrustAnchor, UnixTime};
use time::OffsetDateTime;
use webpki::{anchor_from_trusted_cert, EndEntityCert, KeyUsage};
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::{CredsError, Result};
use crate::keypair::{crypto_provider, KeyPair};

/// Which side of the handshake a credential set authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Server-auth identity: presented to connecting clients.
    Server,
    /// Client-auth identity: presented to servers during mutual TLS.
    Client,
}

impl Role {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Role::Server => "server",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reloaded credentials must keep at least this much remaining validity.
///
/// The floor is the hysteresis that stops a loader from publishing a
/// certificate that would vanish mid-connection.
pub const MINIMUM_VALIDITY: Duration = Duration::from_secs(10 * 60);

/// Pluggable validator applied between parse and publish.
pub type ValidateFn = Arc<dyn Fn(&KeyPair) -> Result<()> + Send + Sync>;

/// The default validator for a role.
pub fn validator_for(role: Role) -> ValidateFn {
    Arc::new(move |key_pair| validate_key_pair(key_pair, role))
}

/// Validate a parsed key pair for use in the given role.
///
/// Checks, in order: leaf present, trust pool non-empty, validity window
/// started, remaining validity above [`MINIMUM_VALIDITY`], role extended
/// key usage present, and the leaf chains to the key pair's own trust pool
/// under the role's usage constraint. Hostname verification is not
/// performed here; peers do that during the handshake.
pub fn validate_key_pair(key_pair: &KeyPair, role: Role) -> Result<()> {
    if key_pair.chain().is_empty() {
        return Err(CredsError::LeafOrKeyUnparsable(
            "certificate chain is empty".into(),
        ));
    }
    if key_pair.ca_certs().is_empty() {
        return Err(CredsError::CaBundleUnparsable);
    }

    let (_, leaf) = X509Certificate::from_der(key_pair.leaf().as_ref())
        .map_err(|e| CredsError::LeafOrKeyUnparsable(format!("parse leaf certificate: {e}")))?;

    let now = OffsetDateTime::now_utc();
    let not_before = leaf.validity().not_before.to_datetime();
    let not_after = leaf.validity().not_after.to_datetime();
    if not_before > now {
        return Err(CredsError::NotYetValid { not_before });
    }
    if not_after < now + MINIMUM_VALIDITY {
        return Err(CredsError::AboutToExpire { not_after });
    }

    let usages = leaf
        .extended_key_usage()
        .map_err(|e| CredsError::LeafOrKeyUnparsable(format!("parse extended key usage: {e}")))?;
    let role_usage_present = usages.is_some_and(|ext| match role {
        Role::Server => ext.value.server_auth,
        Role::Client => ext.value.client_auth,
    });
    if !role_usage_present {
        return Err(CredsError::WrongUsage { role });
    }

    verify_chain(key_pair, role)
}

/// Verify that the leaf chains to the key pair's own trust pool with the
/// role's key-usage constraint, via the library path-building code.
fn verify_chain(key_pair: &KeyPair, role: Role) -> Result<()> {
    let anchors: Vec<TrustAnchor<'_>> = key_pair
        .ca_certs()
        .iter()
        .map(anchor_from_trusted_cert)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| CredsError::ChainVerificationFailed(format!("trust anchor: {e}")))?;

    let end_entity = EndEntityCert::try_from(key_pair.leaf())
        .map_err(|e| CredsError::ChainVerificationFailed(format!("end entity: {e}")))?;

    let usage = match role {
        Role::Server => KeyUsage::server_auth(),
        Role::Client => KeyUsage::client_auth(),
    };

    end_entity
        .verify_for_usage(
            crypto_provider().signature_verification_algorithms.all,
            &anchors,
            &key_pair.chain()[1..],
            UnixTime::now(),
            usage,
            None,
            None,
        )
        .map(|_| ())
        .map_err(|e| CredsError::ChainVerificationFailed(e.to_string()))
}
