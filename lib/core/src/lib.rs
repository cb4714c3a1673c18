//! # imgsim Core
//!
//! Core library for the imgsim image retrieval service.
//!
//! - [`Vector`] - Embedding vector with cosine similarity
//! - [`EmbeddingIndex`] - Immutable id → embedding mapping, stamped with the
//!   extractor configuration that produced it
//! - [`Ranker`] / [`ExhaustiveRanker`] - Top-k cosine ranking
//! - [`IndexHandle`] - Swappable shared reference to the current index
//!
//! ## Example
//!
//! ```rust
//! use imgsim_core::{BuildReport, ExhaustiveRanker, ExtractorStamp, IndexWriter, Ranker, Vector};
//!
//! let stamp = ExtractorStamp::new("example/v1", 3, "none");
//! let mut writer = IndexWriter::new(stamp);
//! writer.insert("fruit/apple.jpg", Vector::new(vec![1.0, 0.0, 0.0])).unwrap();
//! writer.insert("veg/carrot.jpg", Vector::new(vec![0.0, 1.0, 0.0])).unwrap();
//! let index = writer.finish(BuildReport::default());
//!
//! let query = Vector::new(vec![0.9, 0.1, 0.0]);
//! let results = ExhaustiveRanker.rank(&query, &index, 1).unwrap();
//! assert_eq!(results[0].path, "fruit/apple.jpg");
//! ```

pub mod error;
pub mod handle;
pub mod index;
pub mod ranker;
pub mod vector;

/// Dot product, norm and cosine kernels
pub mod simd;

pub use error::{Error, Result};
pub use handle::{IndexHandle, RebuildGuard};
pub use index::{BuildReport, EmbeddingIndex, ExtractorStamp, IndexWriter, SkipReason, SkippedItem};
pub use ranker::{ExhaustiveRanker, RankedMatch, Ranker};
pub use vector::Vector;
