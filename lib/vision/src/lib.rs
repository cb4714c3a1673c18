//! # imgsim Vision
//!
//! Turns images into embeddings and collections into indexes.
//!
//! ```text
//! bytes ──decode──> DynamicImage ──Preprocessor──> ImageTensor ──FeatureExtractor──> Vector
//!                                 \_______________ Pipeline _______________/
//! ```
//!
//! The same [`Pipeline`] value is used by [`IndexBuilder`] and by the query
//! path, and its [`imgsim_core::ExtractorStamp`] is attached to every index so
//! a query against an index built under different settings is rejected.

pub mod builder;
pub mod extractor;
pub mod pipeline;
pub mod preprocess;

pub use builder::IndexBuilder;
pub use extractor::{ColorLayoutExtractor, ExtractorDescriptor, FeatureExtractor, DEFAULT_LEVELS};
pub use pipeline::{CancellationFlag, Pipeline};
pub use preprocess::{
    ChannelOrder, ImageTensor, NormalizationParams, PreprocessConfig, Preprocessor,
    DEFAULT_IMAGE_SIZE, PREPROCESS_VERSION,
};
