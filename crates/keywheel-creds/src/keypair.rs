//! Parsing raw PEM material into a usable key pair.
//!
//! A "key pair" here is the full credential aggregate — leaf certificate
//! chain, private key, and the trust pool it is expected to chain to — not
//! just certificate + key. Parsing performs no semantic validation; that is
//! the job of [`crate::validate`].

use std::fmt;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::sign::CertifiedKey;
use rustls::RootCertStore;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::{CredsError, Result};
use crate::material::RawMaterial;

/// The crypto provider backing every TLS configuration in this workspace
/// (ring).
pub fn crypto_provider() -> Arc<CryptoProvider> {
    use std::sync::LazyLock;
    static PROVIDER: LazyLock<Arc<CryptoProvider>> =
        LazyLock::new(|| Arc::new(rustls::crypto::ring::default_provider()));
    Arc::clone(&PROVIDER)
}

/// A parsed, immutable credential set.
///
/// Keeps a back-reference to the [`RawMaterial`] it was parsed from; that
/// back-reference is the sole basis of equality, which turns "has anything
/// changed since the last handshake?" into a digest compare instead of a
/// chain compare.
pub struct KeyPair {
    material: RawMaterial,
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    certified: Arc<CertifiedKey>,
    roots: Arc<RootCertStore>,
    ca_certs: Vec<CertificateDer<'static>>,
}

impl KeyPair {
    /// Parse raw PEM material into a key pair.
    ///
    /// The trust pool is built from every well-formed CERTIFICATE block in
    /// the CA bundle; zero accepted blocks is [`CredsError::CaBundleUnparsable`].
    /// The certificate file must start with the leaf and may carry
    /// intermediates after it. The private key must match the leaf's public
    /// key; any failure assembling the pair is
    /// [`CredsError::LeafOrKeyUnparsable`].
    pub fn parse(material: RawMaterial) -> Result<Self> {
        let ca_certs = parse_ca_bundle(material.ca_bundle())?;
        let mut roots = RootCertStore::empty();
        roots.add_parsable_certificates(ca_certs.iter().cloned());

        let chain = parse_cert_chain(material.cert())?;
        let key = parse_private_key(material.key())?;

        let signing_key = crypto_provider()
            .key_provider
            .load_private_key(key.clone_key())
            .map_err(|e| CredsError::LeafOrKeyUnparsable(format!("load private key: {e}")))?;
        let certified = CertifiedKey::new(chain.clone(), signing_key);
        certified
            .keys_match()
            .map_err(|e| CredsError::LeafOrKeyUnparsable(format!("certificate/key mismatch: {e}")))?;

        Ok(Self {
            material,
            chain,
            key,
            certified: Arc::new(certified),
            roots: Arc::new(roots),
            ca_certs,
        })
    }

    /// The raw material this key pair was parsed from.
    pub fn material(&self) -> &RawMaterial {
        &self.material
    }

    /// The leaf certificate (first entry of the chain).
    pub fn leaf(&self) -> &CertificateDer<'static> {
        &self.chain[0]
    }

    /// The full certificate chain, leaf first.
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    /// A fresh copy of the private key, for building TLS configurations.
    pub fn key(&self) -> PrivateKeyDer<'static> {
        self.key.clone_key()
    }

    /// The leaf + signing key, pre-loaded through the crypto provider.
    pub fn certified(&self) -> Arc<CertifiedKey> {
        Arc::clone(&self.certified)
    }

    /// The trust pool as a rustls root store.
    pub fn roots(&self) -> Arc<RootCertStore> {
        Arc::clone(&self.roots)
    }

    /// The individual trust-pool certificates, as accepted from the bundle.
    pub fn ca_certs(&self) -> &[CertificateDer<'static>] {
        &self.ca_certs
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.material == other.material
    }
}

impl Eq for KeyPair {}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("digest", &self.material.digest_hex())
            .field("chain_len", &self.chain.len())
            .field("ca_certs", &self.ca_certs.len())
            .finish()
    }
}

/// Collect every CA-bundle certificate that both decodes and can serve as a
/// trust anchor. Malformed blocks are skipped, matching the permissive
/// append semantics rotation windows rely on.
fn parse_ca_bundle(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = pem;
    let accepted: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .filter_map(|block| block.ok())
        .filter(|der| webpki::anchor_from_trusted_cert(der).is_ok())
        .collect();
    if accepted.is_empty() {
        return Err(CredsError::CaBundleUnparsable);
    }
    Ok(accepted)
}

fn parse_cert_chain(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = pem;
    let chain = rustls_pemfile::certs(&mut reader)
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| CredsError::LeafOrKeyUnparsable(format!("decode certificate PEM: {e}")))?;
    if chain.is_empty() {
        return Err(CredsError::LeafOrKeyUnparsable(
            "certificate file contains no CERTIFICATE block".into(),
        ));
    }
    Ok(chain)
}

fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    let mut reader = pem;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| CredsError::LeafOrKeyUnparsable(format!("decode key PEM: {e}")))?
        .ok_or_else(|| {
            CredsError::LeafOrKeyUnparsable("key file contains no private-key block".into())
        })
}
