// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use webarc_feed::ingest::identity::TimeDigestResolver;
use webarc_feed::ingest::types::{FetchError, NormalizedItem, SourceAdapter};
use webarc_feed::ingest::{IngestOptions, Pipeline};
use webarc_feed::store::{FeedStore, MemoryFeedStore};

pub fn item(source: &str, sid: &str, epoch: i64, title: &str, category: &str) -> NormalizedItem {
    NormalizedItem {
        source_id: sid.to_string(),
        source_name: source.to_string(),
        title: title.to_string(),
        summary: title.to_string(),
        category: category.to_string(),
        url: format!("https://example.test/{source}/{sid}"),
        published_at: epoch,
        icon_url: "https://www.google.com/s2/favicons?domain=example.test&sz=64".to_string(),
    }
}

/// Returns whatever payload is currently set; the payload can be swapped between runs.
pub struct MockAdapter {
    name: String,
    payload: Mutex<Vec<NormalizedItem>>,
}

impl MockAdapter {
    pub fn new(name: &str, items: Vec<NormalizedItem>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            payload: Mutex::new(items),
        })
    }

    pub fn set_payload(&self, items: Vec<NormalizedItem>) {
        *self.payload.lock().unwrap() = items;
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    async fn fetch(&self) -> Result<Vec<NormalizedItem>, FetchError> {
        Ok(self.payload.lock().unwrap().clone())
    }
    fn name(&self) -> &str {
        &self.name
    }
}

pub struct FailingAdapter(pub &'static str);

#[async_trait]
impl SourceAdapter for FailingAdapter {
    async fn fetch(&self) -> Result<Vec<NormalizedItem>, FetchError> {
        Err(FetchError::Status {
            url: format!("http://mock/{}", self.0),
            status: 503,
        })
    }
    fn name(&self) -> &str {
        self.0
    }
}

/// Never answers within any reasonable deadline.
pub struct HangingAdapter(pub &'static str);

#[async_trait]
impl SourceAdapter for HangingAdapter {
    async fn fetch(&self) -> Result<Vec<NormalizedItem>, FetchError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec![])
    }
    fn name(&self) -> &str {
        self.0
    }
}

pub struct PanickingAdapter(pub &'static str);

#[async_trait]
impl SourceAdapter for PanickingAdapter {
    async fn fetch(&self) -> Result<Vec<NormalizedItem>, FetchError> {
        panic!("adapter blew up");
    }
    fn name(&self) -> &str {
        self.0
    }
}

pub fn pipeline_with(store: Arc<MemoryFeedStore>, fetch_timeout: Duration) -> Pipeline {
    Pipeline::new(
        store as Arc<dyn FeedStore>,
        Arc::new(TimeDigestResolver),
        IngestOptions {
            fetch_timeout,
            upsert_concurrency: 4,
        },
    )
}

pub fn pipeline(store: Arc<MemoryFeedStore>) -> Pipeline {
    pipeline_with(store, Duration::from_secs(5))
}
