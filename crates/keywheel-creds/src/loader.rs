//! Loading credentials from local files and keeping them fresh.
//!
//! The loader reads the three PEM files eagerly at construction (so bad
//! initial material fails fast), then polls them on a fixed period. A tick
//! whose bytes are unchanged does no work; a tick that fails anywhere keeps
//! the previously published snapshot. Periodic polling is used instead of
//! filesystem notifications: it tolerates rename-over editors, partial
//! writes simply fail parse and are retried next tick, and error-visibility
//! latency stays bounded by the interval.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CredsError, Result};
use crate::keypair::KeyPair;
use crate::material::RawMaterial;
use crate::store::SnapshotCell;
use crate::validate::{validator_for, Role, ValidateFn};

/// Default polling period of the reload loop.
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(10);

/// Options for a file-backed credential loader.
pub struct LoaderOptions {
    /// Path to the PEM CA bundle: the trust anchors, plus both outgoing and
    /// incoming roots during a CA rotation window.
    pub ca_bundle: PathBuf,
    /// Path to the PEM leaf certificate; intermediates may follow the leaf.
    pub certificate: PathBuf,
    /// Path to the PEM private key matching the leaf.
    pub key: PathBuf,
    /// Polling period; zero selects [`DEFAULT_RELOAD_INTERVAL`].
    pub reload_interval: Duration,
    /// Custom validator; `None` selects the loader role's default.
    pub validate: Option<ValidateFn>,
}

impl LoaderOptions {
    /// Options with the default interval and the role-default validator.
    pub fn new(
        ca_bundle: impl Into<PathBuf>,
        certificate: impl Into<PathBuf>,
        key: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ca_bundle: ca_bundle.into(),
            certificate: certificate.into(),
            key: key.into(),
            reload_interval: DEFAULT_RELOAD_INTERVAL,
            validate: None,
        }
    }

    fn check_paths(&self) -> Result<()> {
        for path in [&self.ca_bundle, &self.certificate, &self.key] {
            require_regular_file(path)?;
        }
        Ok(())
    }
}

fn require_regular_file(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(CredsError::FileMissing {
            path: path.to_path_buf(),
        }),
    }
}

/// File-backed credential engine.
///
/// Construction performs one eager read → parse → validate pass and
/// publishes the result; afterwards [`CredentialLoader::run`] keeps the
/// snapshot fresh until cancelled. Handshake paths read the snapshot via
/// [`CredentialLoader::key_pair`] and never touch the filesystem.
pub struct CredentialLoader {
    ca_bundle: PathBuf,
    certificate: PathBuf,
    key: PathBuf,
    reload_interval: Duration,
    validate: ValidateFn,
    role: Role,
    cell: SnapshotCell,
}

impl std::fmt::Debug for CredentialLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialLoader")
            .field("ca_bundle", &self.ca_bundle)
            .field("certificate", &self.certificate)
            .field("key", &self.key)
            .field("reload_interval", &self.reload_interval)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl CredentialLoader {
    /// Create a loader for the given role.
    ///
    /// Fails fast on a missing file, an unreadable file, unparsable
    /// material, or material the validator rejects.
    pub fn new(options: LoaderOptions, role: Role) -> Result<Self> {
        options.check_paths()?;
        let reload_interval = if options.reload_interval.is_zero() {
            DEFAULT_RELOAD_INTERVAL
        } else {
            options.reload_interval
        };
        let validate = options.validate.unwrap_or_else(|| validator_for(role));

        let material = RawMaterial::new(
            read_file_sync(&options.ca_bundle)?,
            read_file_sync(&options.certificate)?,
            read_file_sync(&options.key)?,
        );
        let key_pair = KeyPair::parse(material)?;
        validate(&key_pair)?;

        info!(
            role = role.as_str(),
            digest = %key_pair.material().digest_hex(),
            "loaded initial credential snapshot"
        );

        Ok(Self {
            ca_bundle: options.ca_bundle,
            certificate: options.certificate,
            key: options.key,
            reload_interval,
            validate,
            role,
            cell: SnapshotCell::new(Arc::new(key_pair)),
        })
    }

    /// The current snapshot. One atomic load; safe on any thread.
    pub fn key_pair(&self) -> Arc<KeyPair> {
        self.cell.load()
    }

    /// The effective polling period.
    pub fn reload_interval(&self) -> Duration {
        self.reload_interval
    }

    /// The role this loader validates for.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Run the reload loop until `shutdown` is cancelled.
    ///
    /// Every per-tick failure is logged and recovered by keeping the
    /// previous snapshot; only cancellation ends the loop, and it ends
    /// cleanly. Operators detect stuck rotation by the absence of the
    /// "installed new credential snapshot" log entry.
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(role = self.role.as_str(), "credential reload loop stopped");
                    return;
                }
                _ = tokio::time::sleep(self.reload_interval) => {
                    if let Err(err) = self.reload_now().await {
                        warn!(
                            role = self.role.as_str(),
                            phase = reload_phase(&err),
                            error = %err,
                            "credential reload failed; keeping previous snapshot"
                        );
                    }
                }
            }
        }
    }

    /// Run a single reload tick.
    ///
    /// Re-reads the three files; if their bytes equal the current
    /// snapshot's material the tick is a no-op (the snapshot pointer is
    /// untouched). Otherwise the material is parsed, validated, and
    /// published. On any failure the previous snapshot stays in place and
    /// the error is returned.
    pub async fn reload_now(&self) -> Result<()> {
        let material = RawMaterial::new(
            read_file(&self.ca_bundle).await?,
            read_file(&self.certificate).await?,
            read_file(&self.key).await?,
        );

        let current = self.cell.load();
        if *current.material() == material {
            debug!(role = self.role.as_str(), "credential files unchanged");
            return Ok(());
        }

        let key_pair = KeyPair::parse(material)?;
        (self.validate)(&key_pair)?;

        let digest = key_pair.material().digest_hex();
        self.cell.store(Arc::new(key_pair));
        info!(
            role = self.role.as_str(),
            digest = %digest,
            "installed new credential snapshot"
        );
        Ok(())
    }
}

/// Which reload phase an error belongs to, for log context.
fn reload_phase(err: &CredsError) -> &'static str {
    match err {
        CredsError::FileMissing { .. } | CredsError::FileUnreadable { .. } => "read",
        CredsError::CaBundleUnparsable | CredsError::LeafOrKeyUnparsable(_) => "parse",
        CredsError::NotYetValid { .. }
        | CredsError::AboutToExpire { .. }
        | CredsError::WrongUsage { .. }
        | CredsError::ChainVerificationFailed(_) => "validate",
    }
}

fn read_file_sync(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| CredsError::FileUnreadable {
        path: path.to_path_buf(),
        source,
    })
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|source| CredsError::FileUnreadable {
            path: path.to_path_buf(),
            source,
        })
}
