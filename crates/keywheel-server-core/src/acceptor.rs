//! Dynamic server-side TLS acceptance.
//!
//! The server does not cache a TLS config across handshakes. Each accepted
//! connection parks on the ClientHello, then binds the credential snapshot
//! current at that moment and completes the handshake under a config
//! synthesised from it. A reload that lands mid-handshake cannot rewrite a
//! handshake's view, and established sessions are untouched.

use std::sync::Arc;

use keywheel_creds::{crypto_provider, CredentialLoader, KeyPair};
use rustls::server::{Acceptor, WebPkiClientVerifier};
use rustls::ServerConfig;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::{server, LazyConfigAcceptor};
use tracing::debug;

use crate::error::{Result, ServerError};

/// Accepts inbound TLS connections under per-handshake configs pinned to
/// the freshest validated credentials.
///
/// Cheap to clone; clones share the loader.
#[derive(Clone)]
pub struct DynamicTlsAcceptor {
    loader: Arc<CredentialLoader>,
}

impl DynamicTlsAcceptor {
    pub(crate) fn new(loader: Arc<CredentialLoader>) -> Self {
        Self { loader }
    }

    /// Accept one TLS connection on `io`.
    ///
    /// Waits for the ClientHello, loads the current snapshot exactly once,
    /// and finishes the handshake under a config requiring a client
    /// certificate rooted in that snapshot's trust pool and presenting that
    /// snapshot's leaf.
    pub async fn accept<IO>(&self, io: IO) -> Result<server::TlsStream<IO>>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let start = LazyConfigAcceptor::new(Acceptor::default(), io)
            .await
            .map_err(ServerError::Handshake)?;

        let key_pair = self.loader.key_pair();
        debug!(
            digest = %key_pair.material().digest_hex(),
            "accepting TLS connection with current credential snapshot"
        );
        let config = server_config_for(&key_pair)?;

        start
            .into_stream(Arc::new(config))
            .await
            .map_err(ServerError::Handshake)
    }
}

/// Build a mutual-TLS server config pinned to one key pair: mandatory
/// client certificates verified against the pair's trust pool, the pair's
/// leaf + key as the server identity.
pub(crate) fn server_config_for(key_pair: &KeyPair) -> Result<ServerConfig> {
    let verifier = WebPkiClientVerifier::builder_with_provider(key_pair.roots(), crypto_provider())
        .build()
        .map_err(|e| ServerError::TlsConfig(e.to_string()))?;

    ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| ServerError::TlsConfig(e.to_string()))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(key_pair.chain().to_vec(), key_pair.key())
        .map_err(|e| ServerError::TlsConfig(e.to_string()))
}
