//! Atomic publication of the current key pair snapshot.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::keypair::KeyPair;

/// Single-writer / many-reader cell holding the most recently published
/// key pair.
///
/// Readers take one atomic load and get an `Arc` to a self-consistent
/// snapshot; the reload loop replaces the value with one atomic store.
/// A reader that loaded the previous snapshot keeps using it untouched —
/// there is no torn composite to observe. The cell is constructed already
/// populated (by the loader's eager first load), so readers never see an
/// empty state.
pub struct SnapshotCell {
    inner: ArcSwap<KeyPair>,
}

impl SnapshotCell {
    pub(crate) fn new(initial: Arc<KeyPair>) -> Self {
        Self {
            inner: ArcSwap::from(initial),
        }
    }

    /// The current snapshot.
    pub fn load(&self) -> Arc<KeyPair> {
        self.inner.load_full()
    }

    pub(crate) fn store(&self, next: Arc<KeyPair>) {
        self.inner.store(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::RawMaterial;
    use keywheel_testpki::TestCa;

    fn key_pair(ca: &TestCa, cn: &str) -> Arc<KeyPair> {
        let leaf = ca.issue_server(cn);
        Arc::new(
            KeyPair::parse(RawMaterial::new(
                ca.ca_pem().as_bytes().to_vec(),
                leaf.cert_pem().as_bytes().to_vec(),
                leaf.key_pem().as_bytes().to_vec(),
            ))
            .expect("parse should succeed"),
        )
    }

    #[test]
    fn load_returns_initial_value() {
        let ca = TestCa::new("cell-ca");
        let initial = key_pair(&ca, "cell-initial");
        let cell = SnapshotCell::new(Arc::clone(&initial));
        assert!(Arc::ptr_eq(&cell.load(), &initial));
    }

    #[test]
    fn store_replaces_snapshot_without_touching_old_readers() {
        let ca = TestCa::new("cell-ca");
        let first = key_pair(&ca, "cell-first");
        let second = key_pair(&ca, "cell-second");

        let cell = SnapshotCell::new(Arc::clone(&first));
        let held_by_handshake = cell.load();

        cell.store(Arc::clone(&second));

        assert!(Arc::ptr_eq(&cell.load(), &second));
        // The reader that bound the previous snapshot still holds it intact.
        assert!(Arc::ptr_eq(&held_by_handshake, &first));
    }
}
