//! Client-side facade over the credential engine.

use std::sync::Arc;

use keywheel_creds::{CredentialLoader, KeyPair, LoaderOptions, Role};
use tokio_util::sync::CancellationToken;

use crate::credentials::TlsCredentials;
use crate::error::Result;
use crate::http::DynamicHttpsClient;

/// Role-specialised loader for a client identity.
///
/// Construction runs one eager load and fails fast on bad material; unless
/// a custom validator is supplied, credentials are validated under the
/// client-auth policy. Cheap to clone; clones share the engine.
#[derive(Clone)]
pub struct ClientLoader {
    inner: Arc<CredentialLoader>,
}

impl std::fmt::Debug for ClientLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientLoader").finish_non_exhaustive()
    }
}

impl ClientLoader {
    /// Create a client loader from file-backed options.
    pub fn new(options: LoaderOptions) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(CredentialLoader::new(options, Role::Client)?),
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

    /// An HTTPS round-trip surface bound to this loader's snapshots.
    pub fn https_client(&self) -> DynamicHttpsClient {
        DynamicHttpsClient::new(Arc::clone(&self.inner))
    }

    /// RPC-style transport credentials bound to this loader's snapshots.
    pub fn tls_credentials(&self) -> TlsCredentials {
        TlsCredentials::new(Arc::clone(&self.inner))
    }
}
