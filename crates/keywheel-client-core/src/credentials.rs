//! RPC-style transport credentials.
//!
//! The analogue of the HTTP surface for RPC stacks that hand their
//! transport a raw connection to secure: a shared credentials object that
//! performs client or server handshakes over any async byte stream, always
//! under a TLS configuration built from the loader's current snapshot.
//! Connector and acceptor are cached per key pair with the same
//! fast-path / singleflight discipline as the HTTP surface.

use std::sync::{Arc, Mutex, RwLock};

use arc_swap::ArcSwapOption;
use keywheel_creds::{crypto_provider, CredentialLoader, KeyPair};
use rustls_pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::{client, server, TlsAcceptor, TlsConnector};
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::http::client_tls_config;

/// Connection metadata reported by [`TlsCredentials::info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolInfo {
    /// Always `"tls"`.
    pub security_protocol: &'static str,
    /// The authority currently overriding per-handshake SNI, if any.
    pub authority_override: Option<String>,
}

struct CachedHandshakers {
    connector: TlsConnector,
    acceptor: TlsAcceptor,
    key_pair: Arc<KeyPair>,
}

/// Transport credentials backed by the loader's current snapshot.
///
/// Clones share one object (cache and authority override included), so the
/// credentials are safe to hand to an RPC stack by reference.
#[derive(Clone)]
pub struct TlsCredentials {
    shared: Arc<Shared>,
}

struct Shared {
    loader: Arc<CredentialLoader>,
    cached: ArcSwapOption<CachedHandshakers>,
    rebuild: Mutex<()>,
    authority_override: RwLock<Option<String>>,
}

impl TlsCredentials {
    pub(crate) fn new(loader: Arc<CredentialLoader>) -> Self {
        Self {
            shared: Arc::new(Shared {
                loader,
                cached: ArcSwapOption::empty(),
                rebuild: Mutex::new(()),
                authority_override: RwLock::new(None),
            }),
        }
    }

    /// Perform the TLS client handshake over `io`.
    ///
    /// `authority` (host or host:port) supplies the SNI name and is checked
    /// against the server's certificate, unless an override is installed
    /// via [`TlsCredentials::override_authority`].
    pub async fn client_handshake<IO>(&self, io: IO, authority: &str) -> Result<client::TlsStream<IO>>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let handshakers = self.shared.current()?;
        let name = self.effective_server_name(authority)?;
        handshakers
            .connector
            .connect(name, io)
            .await
            .map_err(ClientError::Handshake)
    }

    /// Perform the TLS server handshake over `io`, presenting the
    /// snapshot's leaf.
    ///
    /// Mirrors the credentials object of RPC stacks, which is usable on
    /// either end of a connection; client certificates are not demanded
    /// here — that policy belongs to the server-side acceptor.
    pub async fn server_handshake<IO>(&self, io: IO) -> Result<server::TlsStream<IO>>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let handshakers = self.shared.current()?;
        handshakers
            .acceptor
            .accept(io)
            .await
            .map_err(ClientError::Handshake)
    }

    /// Protocol metadata for the RPC stack.
    pub fn info(&self) -> ProtocolInfo {
        ProtocolInfo {
            security_protocol: "tls",
            authority_override: self
                .shared
                .authority_override
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }

    /// Replace the SNI name used by subsequent client handshakes.
    pub fn override_authority(&self, authority: impl Into<String>) {
        *self
            .shared
            .authority_override
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(authority.into());
    }

    fn effective_server_name(&self, authority: &str) -> Result<ServerName<'static>> {
        let overridden = self
            .shared
            .authority_override
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let authority = overridden.as_deref().unwrap_or(authority);
        let host = strip_port(authority);
        ServerName::try_from(host.to_string())
            .map_err(|_| ClientError::InvalidAuthority(authority.to_string()))
    }
}

impl Shared {
    fn current(&self) -> Result<Arc<CachedHandshakers>> {
        let key_pair = self.loader.key_pair();
        if let Some(cached) = &*self.cached.load() {
            if cached.key_pair.material() == key_pair.material() {
                return Ok(Arc::clone(cached));
            }
        }

        let _guard = self.rebuild.lock().unwrap_or_else(|e| e.into_inner());

        let key_pair = self.loader.key_pair();
        if let Some(cached) = &*self.cached.load() {
            if cached.key_pair.material() == key_pair.material() {
                return Ok(Arc::clone(cached));
            }
        }

        debug!(
            digest = %key_pair.material().digest_hex(),
            "rebuilding TLS credentials for new credential snapshot"
        );
        let handshakers = Arc::new(build_handshakers(&key_pair)?);
        self.cached.store(Some(Arc::clone(&handshakers)));
        Ok(handshakers)
    }
}

fn build_handshakers(key_pair: &Arc<KeyPair>) -> Result<CachedHandshakers> {
    let client_config = client_tls_config(key_pair)?;

    let server_config = rustls::ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| ClientError::TlsConfig(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(key_pair.chain().to_vec(), key_pair.key())
        .map_err(|e| ClientError::TlsConfig(e.to_string()))?;

    Ok(CachedHandshakers {
        connector: TlsConnector::from(Arc::new(client_config)),
        acceptor: TlsAcceptor::from(Arc::new(server_config)),
        key_pair: Arc::clone(key_pair),
    })
}

/// Drop a trailing `:port` (and IPv6 brackets) from an authority string.
fn strip_port(authority: &str) -> &str {
    let host = match authority.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => authority,
    };
    host.trim_start_matches('[').trim_end_matches(']')
}
