//! Server-side facade over the credential engine.

use std::sync::Arc;

use keywheel_creds::{CredentialLoader, KeyPair, LoaderOptions, Role};
use rustls::ServerConfig;
use tokio_util::sync::CancellationToken;

use crate::acceptor::{server_config_for, DynamicTlsAcceptor};
use crate::error::Result;

/// Role-specialised loader for a server identity.
///
/// Construction runs one eager load and fails fast on bad material; unless
/// a custom validator is supplied, credentials are validated under the
/// server-auth policy. Cheap to clone; clones share the engine.
#[derive(Clone)]
pub struct ServerLoader {
    inner: Arc<CredentialLoader>,
}

impl ServerLoader {
    /// Create a server loader from file-backed options.
    pub fn new(options: LoaderOptions) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(CredentialLoader::new(options, Role::Server)?),
        })
    }

    /// Run the reload loop until `shutdown` is cancelled (clean exit).
    pub async fn run(&self, shutdown: CancellationToken) {
        self.inner.run(shutdown).await;
    }

    /// Force a single reload tick outside the periodic schedule.
    pub async fn reload_now(&self) -> Result<()> {
        self.inner.reload_now().await?;
        Ok(())
    }

    /// The current credential snapshot.
    pub fn key_pair(&self) -> Arc<KeyPair> {
        self.inner.key_pair()
    }

    /// An acceptor that pins each inbound handshake to the snapshot current
    /// at its ClientHello.
    pub fn tls_acceptor(&self) -> DynamicTlsAcceptor {
        DynamicTlsAcceptor::new(Arc::clone(&self.inner))
    }

    /// A point-in-time mutual-TLS config pinned to the current snapshot,
    /// for callers that drive their own accept loop. Unlike
    /// [`ServerLoader::tls_acceptor`], the returned config does not follow
    /// later reloads.
    pub fn server_config(&self) -> Result<ServerConfig> {
        server_config_for(&self.inner.key_pair())
    }
}
