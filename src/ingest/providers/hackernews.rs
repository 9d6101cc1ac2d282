// src/ingest/providers/hackernews.rs
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;

use super::log_skips;
use crate::ingest::http::HttpFetcher;
use crate::ingest::types::{FetchError, NormalizedItem, PartialParseError, SourceAdapter};
use crate::ingest::{cap_recent, epoch_or_now, icon_url_for, normalize_title};

/// Item lookups in flight at once.
const ITEM_FETCH_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct Story {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub by: Option<String>,
    #[serde(default)]
    pub descendants: Option<i64>,
}

/// Keep link stories whose title mentions one of `keywords` (case-insensitive).
pub fn story_to_item(
    story: Story,
    keywords: &[String],
    source: &str,
    category: &str,
    icon: &str,
) -> Option<NormalizedItem> {
    let url = story.url.filter(|u| !u.trim().is_empty())?;
    let title = normalize_title(story.title.as_deref().unwrap_or_default());
    if title.is_empty() {
        return None;
    }
    let lower = title.to_lowercase();
    if !keywords.iter().any(|k| lower.contains(&k.to_lowercase())) {
        return None;
    }
    Some(NormalizedItem {
        source_id: story.id.to_string(),
        source_name: source.to_string(),
        summary: format!(
            "{} points by {} | {} comments",
            story.score.unwrap_or(0),
            story.by.as_deref().unwrap_or("unknown"),
            story.descendants.unwrap_or(0)
        ),
        title,
        category: category.to_string(),
        url,
        published_at: epoch_or_now(story.time),
        icon_url: icon.to_string(),
    })
}

/// Top stories, filtered to web-development topics.
pub struct HackerNewsAdapter {
    name: String,
    base_url: String,
    top_n: usize,
    keywords: Vec<String>,
    category: String,
    cap: usize,
    icon: String,
    http: HttpFetcher,
}

impl HackerNewsAdapter {
    pub fn new(
        name: &str,
        base_url: &str,
        top_n: usize,
        keywords: Vec<String>,
        category: &str,
        cap: usize,
        http: HttpFetcher,
    ) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            top_n,
            keywords,
            category: category.to_string(),
            cap,
            icon: icon_url_for("https://news.ycombinator.com"),
            http,
        }
    }
}

#[async_trait]
impl SourceAdapter for HackerNewsAdapter {
    async fn fetch(&self) -> Result<Vec<NormalizedItem>, FetchError> {
        let top_url = format!("{}/topstories.json", self.base_url);
        let ids: Vec<u64> = self.http.get_json(&top_url).await?;

        // A story that fails to load is a skipped item, not a failed source.
        let results: Vec<(usize, Result<Story, FetchError>)> =
            stream::iter(ids.into_iter().take(self.top_n).enumerate())
                .map(|(index, id)| {
                    let url = format!("{}/item/{id}.json", self.base_url);
                    async move { (index, self.http.get_json::<Story>(&url).await) }
                })
                .buffered(ITEM_FETCH_CONCURRENCY)
                .collect()
                .await;

        let mut items = Vec::new();
        let mut skips = Vec::new();
        for (index, res) in results {
            match res {
                Ok(story) => {
                    if let Some(it) =
                        story_to_item(story, &self.keywords, &self.name, &self.category, &self.icon)
                    {
                        items.push(it);
                    }
                }
                Err(e) => skips.push(PartialParseError {
                    source_name: self.name.clone(),
                    index,
                    reason: e.to_string(),
                }),
            }
        }
        log_skips(&skips);
        Ok(cap_recent(items, self.cap))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
