//! Raw credential material: the unparsed byte-level source of a key pair.

use std::fmt;

use sha2::{Digest, Sha256};

/// The three PEM blobs a credential set is loaded from, exactly as read
/// from disk: CA bundle, leaf certificate, private key.
///
/// Equality is pairwise content equality of the three blobs, answered
/// through a precomputed SHA-256 digest so the per-handshake "has anything
/// changed?" check is a 32-byte compare. Each blob is hashed behind an
/// 8-byte length prefix, so two distinct triples cannot share a digest by
/// shifting bytes across blob boundaries.
#[derive(Clone)]
pub struct RawMaterial {
    ca_bundle: Vec<u8>,
    cert: Vec<u8>,
    key: Vec<u8>,
    digest: [u8; 32],
}

impl RawMaterial {
    /// Wrap three raw byte blobs, computing their content digest.
    pub fn new(ca_bundle: Vec<u8>, cert: Vec<u8>, key: Vec<u8>) -> Self {
        let mut hasher = Sha256::new();
        for blob in [&ca_bundle, &cert, &key] {
            hasher.update((blob.len() as u64).to_le_bytes());
            hasher.update(blob);
        }
        let digest = hasher.finalize().into();
        Self {
            ca_bundle,
            cert,
            key,
            digest,
        }
    }

    /// The raw CA bundle bytes.
    pub fn ca_bundle(&self) -> &[u8] {
        &self.ca_bundle
    }

    /// The raw leaf-certificate bytes.
    pub fn cert(&self) -> &[u8] {
        &self.cert
    }

    /// The raw private-key bytes.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The SHA-256 content digest over all three blobs.
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// First eight digest bytes as lowercase hex, for log fields.
    pub fn digest_hex(&self) -> String {
        self.digest[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl PartialEq for RawMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
    }
}

impl Eq for RawMaterial {}

impl fmt::Debug for RawMaterial {
    // Key bytes stay out of debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMaterial")
            .field("digest", &self.digest_hex())
            .field("ca_bundle_len", &self.ca_bundle.len())
            .field("cert_len", &self.cert.len())
            .field("key_len", &self.key.len())
            .finish()
    }
}
