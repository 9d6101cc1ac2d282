// src/ingest/types.rs
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unified record every adapter produces, whatever the origin format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedItem {
    pub source_id: String,   // native id at the origin, e.g. "42" or "a1b2c3"
    pub source_name: String, // adapter tag, e.g. "dev.to", "medium"
    pub title: String,
    pub summary: String,
    pub category: String,
    pub url: String,
    #[serde(rename = "publishedAtEpochSeconds")]
    pub published_at: i64, // unix seconds
    pub icon_url: String,
}

/// Adapter-level failure. Recovered by the pipeline and surfaced only in the report.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("malformed payload from {url}: {reason}")]
    Malformed { url: String, reason: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("all {0} feeds failed")]
    AllFeedsFailed(usize),
}

/// One malformed item inside an otherwise valid batch. Skipped, never fatal.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{source_name}: skipped item #{index}: {reason}")]
pub struct PartialParseError {
    pub source_name: String,
    pub index: usize,
    pub reason: String,
}

#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch and normalize the latest items, most recent first.
    async fn fetch(&self) -> Result<Vec<NormalizedItem>, FetchError>;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

/// Outcome of one ingestion pass over a set of adapters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub inserted: usize,
    pub updated: usize,
    pub failed: Vec<SourceFailure>,
    /// Items a source returned that could not be written to the store.
    #[serde(default)]
    pub write_errors: usize,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.write_errors == 0
    }
}
