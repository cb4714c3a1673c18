use crate::{EmbeddingIndex, Error, Result};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, swappable reference to the current index.
///
/// Readers take an `Arc` snapshot and keep it for the whole query; a rebuild
/// publishes a new index with [`IndexHandle::swap`] without disturbing them.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    current: Arc<RwLock<Arc<EmbeddingIndex>>>,
    rebuilding: Arc<AtomicBool>,
}

impl IndexHandle {
    pub fn new(index: EmbeddingIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
            rebuilding: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Snapshot of the published index
    pub fn current(&self) -> Arc<EmbeddingIndex> {
        self.current.read().clone()
    }

    /// Publish `index`, returning the one it replaces
    pub fn swap(&self, index: EmbeddingIndex) -> Arc<EmbeddingIndex> {
        let mut guard = self.current.write();
        std::mem::replace(&mut *guard, Arc::new(index))
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::Acquire)
    }

    /// Claim the single rebuild slot. The slot is released when the guard drops.
    pub fn try_begin_rebuild(&self) -> Result<RebuildGuard> {
        self.rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::RebuildInProgress)?;
        Ok(RebuildGuard {
            flag: self.rebuilding.clone(),
        })
    }
}

#[derive(Debug)]
pub struct RebuildGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RebuildGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BuildReport, ExtractorStamp, IndexWriter, Vector};

    fn index_with(ids: &[&str]) -> EmbeddingIndex {
        let mut writer = IndexWriter::new(ExtractorStamp::new("test/v1", 2, "pre"));
        for id in ids {
            writer.insert(*id, Vector::new(vec![1.0, 0.0])).unwrap();
        }
        writer.finish(BuildReport::default())
    }

    #[test]
    fn test_swap_keeps_old_snapshot_alive() {
        let handle = IndexHandle::new(index_with(&["a"]));
        let before = handle.current();

        let old = handle.swap(index_with(&["a", "b"]));
        assert_eq!(old.len(), 1);
        assert_eq!(before.len(), 1);
        assert_eq!(handle.current().len(), 2);
    }

    #[test]
    fn test_clones_share_the_index() {
        let handle = IndexHandle::new(index_with(&[]));
        let other = handle.clone();
        handle.swap(index_with(&["x"]));
        assert!(other.current().contains("x"));
    }

    #[test]
    fn test_single_rebuild_slot() {
        let handle = IndexHandle::new(index_with(&[]));
        let guard = handle.try_begin_rebuild().unwrap();
        assert!(handle.is_rebuilding());
        assert!(matches!(handle.try_begin_rebuild(), Err(Error::RebuildInProgress)));
        drop(guard);
        assert!(!handle.is_rebuilding());
        assert!(handle.try_begin_rebuild().is_ok());
    }
}
