//! Thread-safe handle over a [`Cedar`].

use parking_lot::{RwLock, RwLockReadGuard};

use crate::error::Result;
use crate::iter::{Prediction, PrefixMatch, ScanMatch};
use crate::{Cedar, LookupHit, Probe};

/// A [`Cedar`] behind a reader-writer lock.
///
/// Queries take the read lock and may run concurrently; `update` and `erase`
/// take the write lock. Traversal results are collected before the lock is
/// released.
pub struct SharedCedar {
    inner: RwLock<Cedar>,
}

impl SharedCedar {
    pub fn new(cedar: Cedar) -> Self {
        Self {
            inner: RwLock::new(cedar),
        }
    }

    pub fn update(&self, key: impl AsRef<[u8]>, value: i32) -> Result<i32> {
        self.inner.write().update(key, value)
    }

    pub fn erase(&self, key: impl AsRef<[u8]>) -> Option<i32> {
        self.inner.write().erase(key)
    }

    pub fn find(&self, key: impl AsRef<[u8]>) -> Probe {
        self.inner.read().find(key)
    }

    pub fn lookup(&self, key: impl AsRef<[u8]>) -> Option<LookupHit> {
        self.inner.read().lookup(key)
    }

    pub fn prefixes(&self, key: impl AsRef<[u8]>) -> Vec<PrefixMatch> {
        self.inner.read().prefixes(key.as_ref()).collect()
    }

    pub fn predict(&self, key: impl AsRef<[u8]>) -> Vec<Prediction> {
        self.inner.read().predict(key.as_ref()).collect()
    }

    pub fn scan(&self, text: impl AsRef<[u8]>) -> Vec<ScanMatch> {
        self.inner.read().scan(text.as_ref()).collect()
    }

    /// Independent copy taken through the snapshot format.
    pub fn snapshot(&self) -> Result<Cedar> {
        let image = self.inner.read().serialize();
        Cedar::deserialize(&image)
    }

    /// Holds the read lock for longer traversals.
    pub fn read(&self) -> RwLockReadGuard<'_, Cedar> {
        self.inner.read()
    }

    pub fn into_inner(self) -> Cedar {
        self.inner.into_inner()
    }
}

impl Default for SharedCedar {
    fn default() -> Self {
        Self::new(Cedar::new())
    }
}

impl From<Cedar> for SharedCedar {
    fn from(cedar: Cedar) -> Self {
        Self::new(cedar)
    }
}
