//! # imgsim
//!
//! Content-based image retrieval: index a directory of reference images once,
//! then rank it by visual similarity to any uploaded image.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! imgsim --dataset-dir ./dataset --http-port 8000
//! curl -F file=@query.jpg http://localhost:8000/compare-image/
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use imgsim::prelude::*;
//! use std::path::Path;
//!
//! let pipeline = Pipeline::with_defaults().unwrap();
//! let index = IndexBuilder::new(pipeline.clone()).build(Path::new("./dataset")).unwrap();
//!
//! let query = pipeline.embed_path(Path::new("query.jpg")).unwrap();
//! for hit in ExhaustiveRanker.rank(&query, &index, 5).unwrap() {
//!     println!("{} {:.3}", hit.path, hit.score);
//! }
//! ```
//!
//! ## Crate Structure
//!
//! - `imgsim-core` - Vector, cosine kernels, EmbeddingIndex, Ranker, IndexHandle
//! - `imgsim-vision` - Preprocessor, FeatureExtractor, Pipeline, IndexBuilder
//! - `imgsim-api` - QueryService and the actix-web REST API

// Re-export core types
pub use imgsim_core::{
    BuildReport, EmbeddingIndex, Error, ExhaustiveRanker, ExtractorStamp, IndexHandle,
    IndexWriter, RankedMatch, Ranker, Result, Vector,
};

// Re-export vision
pub use imgsim_vision::{
    ColorLayoutExtractor, FeatureExtractor, ImageTensor, IndexBuilder, NormalizationParams,
    Pipeline, PreprocessConfig, Preprocessor,
};

// Re-export API
pub use imgsim_api::{QueryService, RestApi, ServerConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        EmbeddingIndex, Error, ExhaustiveRanker, FeatureExtractor, IndexBuilder, Pipeline,
        QueryService, Ranker, Result, ServerConfig, Vector,
    };
}
