// src/ingest/providers/devto.rs
use async_trait::async_trait;
use serde::Deserialize;

use super::{log_skips, Parsed};
use crate::ingest::http::HttpFetcher;
use crate::ingest::types::{FetchError, NormalizedItem, PartialParseError, SourceAdapter};
use crate::ingest::{cap_recent, epoch_or_now, icon_url_for, normalize_title};

#[derive(Debug, Deserialize)]
struct DevToPost {
    id: u64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    tag_list: Vec<String>,
    url: String,
    #[serde(default)]
    published_at: Option<String>,
}

fn parse_rfc3339_to_unix(ts: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.timestamp())
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a dev.to articles array. Items that do not fit the shape are skipped.
pub fn parse_articles(source: &str, url: &str, body: &str, icon: &str) -> Result<Parsed, FetchError> {
    let raw: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let mut items = Vec::with_capacity(raw.len());
    let mut skips = Vec::new();
    for (index, v) in raw.into_iter().enumerate() {
        let post: DevToPost = match serde_json::from_value(v) {
            Ok(p) => p,
            Err(e) => {
                skips.push(PartialParseError {
                    source_name: source.to_string(),
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let title = normalize_title(&post.title);
        if title.is_empty() {
            skips.push(PartialParseError {
                source_name: source.to_string(),
                index,
                reason: "empty title".into(),
            });
            continue;
        }
        let summary = non_empty(post.description.as_deref())
            .or_else(|| non_empty(post.summary.as_deref()))
            .map(str::to_string)
            .unwrap_or_else(|| title.clone());
        let category = post
            .tag_list
            .first()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "webdev".to_string());

        items.push(NormalizedItem {
            source_id: post.id.to_string(),
            source_name: source.to_string(),
            title,
            summary,
            category,
            url: post.url,
            published_at: epoch_or_now(post.published_at.as_deref().and_then(parse_rfc3339_to_unix)),
            icon_url: icon.to_string(),
        });
    }
    Ok((items, skips))
}

/// dev.to latest-articles REST adapter.
pub struct DevtoAdapter {
    name: String,
    url: String,
    cap: usize,
    icon: String,
    http: HttpFetcher,
}

impl DevtoAdapter {
    pub fn new(name: &str, url: &str, cap: usize, http: HttpFetcher) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            cap,
            icon: icon_url_for(url),
            http,
        }
    }
}

#[async_trait]
impl SourceAdapter for DevtoAdapter {
    async fn fetch(&self) -> Result<Vec<NormalizedItem>, FetchError> {
        let body = self.http.get_text(&self.url).await?;
        let (items, skips) = parse_articles(&self.name, &self.url, &body, &self.icon)?;
        log_skips(&skips);
        Ok(cap_recent(items, self.cap))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
