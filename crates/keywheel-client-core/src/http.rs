//! Dynamic HTTPS round-trip surface.
//!
//! Wraps a pooled hyper client whose TLS settings come from the loader's
//! current snapshot: the snapshot's trust pool as roots, the snapshot's
//! leaf + key as the single client credential. The inner client is rebuilt
//! only when the snapshot's raw material changes; per-request overhead is
//! one snapshot load plus one digest compare. Pooled connections opened
//! under a displaced identity are retired with their client and drain on
//! their own.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use keywheel_creds::{crypto_provider, CredentialLoader, KeyPair};
use tracing::debug;

use crate::error::{ClientError, Result};

type PooledClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

struct CachedTransport {
    client: PooledClient,
    key_pair: Arc<KeyPair>,
}

/// An HTTPS client that always handshakes with the freshest validated
/// credentials while leaving established pooled connections untouched.
///
/// Cheap to clone; clones share the cached inner client.
#[derive(Clone)]
pub struct DynamicHttpsClient {
    shared: Arc<Shared>,
}

struct Shared {
    loader: Arc<CredentialLoader>,
    cached: ArcSwapOption<CachedTransport>,
    rebuild: Mutex<()>,
}

impl DynamicHttpsClient {
    pub(crate) fn new(loader: Arc<CredentialLoader>) -> Self {
        Self {
            shared: Arc::new(Shared {
                loader,
                cached: ArcSwapOption::empty(),
                rebuild: Mutex::new(()),
            }),
        }
    }

    /// Send one request through a client configured from the current
    /// snapshot.
    ///
    /// Handshake-time TLS failures (for example the peer rejecting our
    /// certificate) surface unchanged inside the HTTP error.
    pub async fn execute(&self, request: Request<Full<Bytes>>) -> Result<Response<Incoming>> {
        let client = self.shared.current_client()?;
        client.request(request).await.map_err(ClientError::Http)
    }
}

impl Shared {
    /// Lock-free fast path on material equality; mutex-guarded rebuild with
    /// a re-check, so N concurrent first calls after a rotation build one
    /// transport, not N.
    fn current_client(&self) -> Result<PooledClient> {
        let key_pair = self.loader.key_pair();
        if let Some(cached) = &*self.cached.load() {
            if cached.key_pair.material() == key_pair.material() {
                return Ok(cached.client.clone());
            }
        }

        let _guard = self.rebuild.lock().unwrap_or_else(|e| e.into_inner());

        // Re-read the snapshot under the lock; another caller may have
        // rebuilt for it already.
        let key_pair = self.loader.key_pair();
        if let Some(cached) = &*self.cached.load() {
            if cached.key_pair.material() == key_pair.material() {
                return Ok(cached.client.clone());
            }
        }

        debug!(
            digest = %key_pair.material().digest_hex(),
            "rebuilding HTTPS transport for new credential snapshot"
        );
        let client = build_client(&key_pair)?;
        self.cached.store(Some(Arc::new(CachedTransport {
            client: client.clone(),
            key_pair,
        })));
        Ok(client)
    }
}

fn build_client(key_pair: &KeyPair) -> Result<PooledClient> {
    let https = HttpsConnectorBuilder::new()
        .with_tls_config(client_tls_config(key_pair)?)
        .https_only()
        .enable_http1()
        .enable_http2()
        .build();
    Ok(Client::builder(TokioExecutor::new()).build(https))
}

/// Build a client TLS config pinned to one key pair: snapshot roots, leaf +
/// key as the client-auth credential.
pub(crate) fn client_tls_config(key_pair: &KeyPair) -> Result<rustls::ClientConfig> {
    rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| ClientError::TlsConfig(e.to_string()))?
        .with_root_certificates(key_pair.roots())
        .with_client_auth_cert(key_pair.chain().to_vec(), key_pair.key())
        .map_err(|e| ClientError::TlsConfig(e.to_string()))
}
