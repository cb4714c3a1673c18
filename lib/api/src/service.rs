//! Query service: one uploaded image in, ranked collection items out.

use crate::config::ServerConfig;
use bytes::Bytes;
use imgsim_core::{
    BuildReport, EmbeddingIndex, Error, ExhaustiveRanker, ExtractorStamp, IndexHandle,
    RankedMatch, Ranker, Result,
};
use imgsim_vision::{CancellationFlag, IndexBuilder, Pipeline};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Successful answer to one comparison
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub uploaded_file: String,
    pub most_similar: Vec<RankedMatch>,
}

/// Operational view of the service and its current index
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub dataset_dir: String,
    pub items: usize,
    pub stamp: ExtractorStamp,
    pub build: BuildReport,
    pub rebuilding: bool,
    pub top_k: usize,
    pub query_timeout_ms: u64,
}

pub struct QueryService {
    handle: IndexHandle,
    pipeline: Pipeline,
    ranker: Arc<dyn Ranker>,
    dataset_dir: PathBuf,
    top_k: usize,
    query_timeout: Duration,
}

impl QueryService {
    pub fn new(config: &ServerConfig, pipeline: Pipeline, index: EmbeddingIndex) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            handle: IndexHandle::new(index),
            pipeline,
            ranker: Arc::new(ExhaustiveRanker),
            dataset_dir: config.dataset_dir.clone(),
            top_k: config.top_k,
            query_timeout: config.query_timeout,
        })
    }

    /// Build the index from `config.dataset_dir` synchronously, then serve it.
    pub fn bootstrap(config: &ServerConfig, pipeline: Pipeline) -> Result<Self> {
        config.validate()?;
        info!("Building index from {:?} with {}", config.dataset_dir, pipeline.stamp());
        let index = IndexBuilder::new(pipeline.clone()).build(&config.dataset_dir)?;
        Self::new(config, pipeline, index)
    }

    /// Replace the exhaustive ranker, e.g. with an approximate one
    #[must_use]
    pub fn with_ranker(mut self, ranker: Arc<dyn Ranker>) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn dataset_dir(&self) -> &Path {
        &self.dataset_dir
    }

    pub fn index(&self) -> Arc<EmbeddingIndex> {
        self.handle.current()
    }

    /// Rank the collection against an uploaded image.
    pub async fn compare(&self, uploaded_file: String, bytes: Bytes) -> Result<QueryOutcome> {
        let index = self.handle.current();
        if index.is_empty() {
            return Err(Error::EmptyIndex);
        }
        index.stamp().ensure_compatible(&self.pipeline.stamp())?;

        let query = self.embed_with_timeout(bytes).await?;
        let most_similar = self.ranker.rank(&query, &index, self.top_k)?;

        Ok(QueryOutcome {
            uploaded_file,
            most_similar,
        })
    }

    async fn embed_with_timeout(&self, bytes: Bytes) -> Result<imgsim_core::Vector> {
        let cancel = CancellationFlag::new();
        let pipeline = self.pipeline.clone();
        let flag = cancel.clone();
        let task =
            tokio::task::spawn_blocking(move || pipeline.embed_bytes_cancellable(&bytes, &flag));

        match tokio::time::timeout(self.query_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(Error::Extraction(format!("extraction task failed: {}", join))),
            Err(_) => {
                cancel.cancel();
                Err(Error::Timeout(self.query_timeout.as_millis() as u64))
            }
        }
    }

    /// Re-walk the collection and publish the new index.
    ///
    /// Queries in flight keep ranking against the snapshot they started with.
    pub async fn rebuild(&self) -> Result<ServiceStatus> {
        let guard = self.handle.try_begin_rebuild()?;

        let builder = IndexBuilder::new(self.pipeline.clone());
        let root = self.dataset_dir.clone();
        let index = tokio::task::spawn_blocking(move || builder.build(&root))
            .await
            .map_err(|e| Error::Extraction(format!("rebuild task failed: {}", e)))??;

        let previous = self.handle.swap(index);
        let current = self.handle.current();
        drop(guard);
        if current.len() < previous.len() {
            warn!("Rebuilt index shrank from {} to {} items", previous.len(), current.len());
        }
        info!("Index swapped: {} -> {} items", previous.len(), current.len());

        Ok(self.status_of(&current))
    }

    pub fn status(&self) -> ServiceStatus {
        self.status_of(&self.handle.current())
    }

    fn status_of(&self, index: &EmbeddingIndex) -> ServiceStatus {
        ServiceStatus {
            dataset_dir: self.dataset_dir.display().to_string(),
            items: index.len(),
            stamp: index.stamp().clone(),
            build: index.report().clone(),
            rebuilding: self.handle.is_rebuilding(),
            top_k: self.top_k,
            query_timeout_ms: self.query_timeout.as_millis() as u64,
        }
    }
}
