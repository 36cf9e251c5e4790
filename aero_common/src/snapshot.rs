//! Latest-value hand-off between periodic tasks.
//!
//! A producer publishes immutable snapshots; consumers take an `Arc` to the
//! newest one at the top of their cycle. The mutex guards only the pointer
//! swap, so no lock is ever held while a consumer computes.
//!
//! A version counter lets consumers detect whether anything new arrived
//! since their last read.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct SnapshotCell<T> {
    latest: Mutex<Arc<T>>,
    version: AtomicU64,
}

impl<T> SnapshotCell<T> {
    pub fn new(initial: T) -> Self {
        Self {
            latest: Mutex::new(Arc::new(initial)),
            version: AtomicU64::new(0),
        }
    }

    /// Replace the current snapshot. Returns the new version.
    pub fn publish(&self, value: T) -> u64 {
        let next = Arc::new(value);
        *self.latest.lock() = next;
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Newest snapshot.
    pub fn latest(&self) -> Arc<T> {
        Arc::clone(&self.latest.lock())
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Create a reader that tracks which version it last saw.
    pub fn reader(self: &Arc<Self>) -> SnapshotReader<T> {
        SnapshotReader {
            cell: Arc::clone(self),
            last_seen: self.version(),
        }
    }
}

impl<T: Default> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Per-consumer view of a [`SnapshotCell`].
#[derive(Debug)]
pub struct SnapshotReader<T> {
    cell: Arc<SnapshotCell<T>>,
    last_seen: u64,
}

impl<T> SnapshotReader<T> {
    /// Newer snapshot published since the last `read`.
    #[inline]
    pub fn has_changed(&self) -> bool {
        self.cell.version() != self.last_seen
    }

    /// Take the newest snapshot and mark it seen.
    pub fn read(&mut self) -> Arc<T> {
        self.last_seen = self.cell.version();
        self.cell.latest()
    }
}

impl<T> Clone for SnapshotReader<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            last_seen: self.last_seen,
        }
    }
}
