//! # imgsim API
//!
//! The query boundary of imgsim: a [`QueryService`] that owns the current
//! index and the shared embedding pipeline, and a [`RestApi`] exposing it over
//! HTTP.
//!
//! | Method | Path              | Purpose                                        |
//! |--------|-------------------|------------------------------------------------|
//! | POST   | `/compare-image/` | multipart `file` upload, returns top-k matches |
//! | GET    | `/status`         | index size, extractor stamp, build diagnostics |
//! | POST   | `/reindex`        | rebuild from disk and swap the index in        |
//! | GET    | `/healthz`        | liveness                                       |
//! | GET    | `/dataset/*`      | raw collection files                           |

pub mod config;
pub mod rest;
pub mod service;

pub use config::{ServerConfig, DEFAULT_TOP_K};
pub use rest::{configure, RestApi};
pub use service::{QueryOutcome, QueryService, ServiceStatus};
