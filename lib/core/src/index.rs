//! Immutable embedding index.
//!
//! An [`EmbeddingIndex`] maps collection-item identifiers (relative paths) to
//! embedding vectors. It is assembled once through an [`IndexWriter`] and never
//! mutated afterwards; a rebuild produces a new index which is published through
//! [`crate::IndexHandle`].

use crate::{Error, Result, Vector};
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Identity of the pipeline that produced an index's embeddings.
///
/// Two stamps must be equal for embeddings to be comparable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractorStamp {
    /// Extractor name and version, e.g. `color-layout/v1`
    pub extractor: String,
    /// Output vector length
    pub dim: usize,
    /// Preprocessing fingerprint (version, size, filter, channel order, normalization)
    pub preprocess: String,
}

impl ExtractorStamp {
    pub fn new(extractor: impl Into<String>, dim: usize, preprocess: impl Into<String>) -> Self {
        Self {
            extractor: extractor.into(),
            dim,
            preprocess: preprocess.into(),
        }
    }

    /// Check that embeddings produced under `other` can be compared with ours.
    pub fn ensure_compatible(&self, other: &ExtractorStamp) -> Result<()> {
        if self.dim != other.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: other.dim,
            });
        }
        if self != other {
            return Err(Error::IncompatibleIndex {
                index: self.to_string(),
                pipeline: other.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ExtractorStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dim={} [{}]", self.extractor, self.dim, self.preprocess)
    }
}

/// Why a file did not make it into the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Not decodable as an image
    NotAnImage,
    /// Anything else: IO, extraction, dimension mismatch
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedItem {
    pub path: String,
    pub reason: SkipReason,
}

/// Diagnostics of one index build
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub files_seen: usize,
    pub indexed: usize,
    pub skipped: Vec<SkippedItem>,
    pub duration_ms: u64,
    pub built_at: DateTime<Utc>,
}

impl BuildReport {
    pub fn new(files_seen: usize, skipped: Vec<SkippedItem>, duration: Duration) -> Self {
        Self {
            files_seen,
            indexed: 0,
            skipped,
            duration_ms: duration.as_millis() as u64,
            built_at: Utc::now(),
        }
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

impl Default for BuildReport {
    fn default() -> Self {
        Self::new(0, Vec::new(), Duration::ZERO)
    }
}

/// Read-only mapping from item id to embedding, in build order.
#[derive(Debug)]
pub struct EmbeddingIndex {
    stamp: ExtractorStamp,
    ids: Vec<String>,
    vectors: Vec<Vector>,
    positions: AHashMap<String, usize>,
    report: BuildReport,
}

impl EmbeddingIndex {
    /// An index with nothing to compare against
    pub fn empty(stamp: ExtractorStamp) -> Self {
        IndexWriter::new(stamp).finish(BuildReport::default())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Vector length every entry shares
    #[inline]
    pub fn dim(&self) -> usize {
        self.stamp.dim
    }

    pub fn stamp(&self) -> &ExtractorStamp {
        &self.stamp
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    pub fn get(&self, id: &str) -> Option<&Vector> {
        self.positions.get(id).map(|&pos| &self.vectors[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Entries in build order
    pub fn items(&self) -> impl ExactSizeIterator<Item = (&str, &Vector)> + '_ {
        self.ids
            .iter()
            .map(String::as_str)
            .zip(self.vectors.iter())
    }
}

/// Accumulates entries for a new [`EmbeddingIndex`].
#[derive(Debug)]
pub struct IndexWriter {
    stamp: ExtractorStamp,
    ids: Vec<String>,
    vectors: Vec<Vector>,
    positions: AHashMap<String, usize>,
}

impl IndexWriter {
    pub fn new(stamp: ExtractorStamp) -> Self {
        Self {
            stamp,
            ids: Vec::new(),
            vectors: Vec::new(),
            positions: AHashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Add an entry. The vector must match the stamped dimension and the id must be new.
    pub fn insert(&mut self, id: impl Into<String>, vector: Vector) -> Result<()> {
        if vector.dim() != self.stamp.dim {
            return Err(Error::DimensionMismatch {
                expected: self.stamp.dim,
                actual: vector.dim(),
            });
        }

        let id = id.into();
        if self.positions.contains_key(&id) {
            return Err(Error::DuplicateItem(id));
        }

        self.positions.insert(id.clone(), self.ids.len());
        self.ids.push(id);
        self.vectors.push(vector);
        Ok(())
    }

    pub fn finish(self, mut report: BuildReport) -> EmbeddingIndex {
        report.indexed = self.ids.len();
        EmbeddingIndex {
            stamp: self.stamp,
            ids: self.ids,
            vectors: self.vectors,
            positions: self.positions,
            report,
        }
    }
}
