// src/ingest/providers/reddit.rs
use async_trait::async_trait;
use serde::Deserialize;

use super::{log_skips, Parsed};
use crate::ingest::http::HttpFetcher;
use crate::ingest::types::{FetchError, NormalizedItem, PartialParseError, SourceAdapter};
use crate::ingest::{cap_recent, epoch_or_now, icon_url_for, normalize_title, truncate_chars, SUMMARY_MAX_CHARS};

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: RedditPost,
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    id: String,
    title: String,
    #[serde(default)]
    selftext: Option<String>,
    permalink: String,
    #[serde(default)]
    created_utc: Option<f64>,
}

/// Parse a subreddit listing (`data.children[].data`).
pub fn parse_listing(
    source: &str,
    category: &str,
    url: &str,
    body: &str,
    icon: &str,
) -> Result<Parsed, FetchError> {
    let listing: Listing = serde_json::from_str(body).map_err(|e| FetchError::Malformed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let mut items = Vec::with_capacity(listing.data.children.len());
    let mut skips = Vec::new();
    for (index, v) in listing.data.children.into_iter().enumerate() {
        let post = match serde_json::from_value::<Child>(v) {
            Ok(c) => c.data,
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
        if title.is_empty() || post.id.trim().is_empty() {
            skips.push(PartialParseError {
                source_name: source.to_string(),
                index,
                reason: "missing id or title".into(),
            });
            continue;
        }
        let summary = match post.selftext.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => truncate_chars(s, SUMMARY_MAX_CHARS),
            _ => title.clone(),
        };
        items.push(NormalizedItem {
            source_id: post.id,
            source_name: source.to_string(),
            title,
            summary,
            category: category.to_string(),
            url: format!("https://reddit.com{}", post.permalink),
            published_at: epoch_or_now(post.created_utc.map(|t| t as i64)),
            icon_url: icon.to_string(),
        });
    }
    Ok((items, skips))
}

/// Subreddit `new.json` listing adapter; one instance per subreddit.
pub struct RedditAdapter {
    name: String,
    url: String,
    category: String,
    cap: usize,
    icon: String,
    http: HttpFetcher,
}

impl RedditAdapter {
    pub fn new(name: &str, url: &str, category: &str, cap: usize, http: HttpFetcher) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            category: category.to_string(),
            cap,
            icon: icon_url_for(url),
            http,
        }
    }
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    async fn fetch(&self) -> Result<Vec<NormalizedItem>, FetchError> {
        let body = self.http.get_text(&self.url).await?;
        let (items, skips) = parse_listing(&self.name, &self.category, &self.url, &body, &self.icon)?;
        log_skips(&skips);
        Ok(cap_recent(items, self.cap))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_children_are_mapped() {
        let long = "x".repeat(300);
        let body = format!(
            r#"{{"kind":"Listing","data":{{"children":[
                {{"kind":"t3","data":{{"id":"abc","title":"Ask &amp; answer","selftext":"{long}",
                  "permalink":"/r/webdev/comments/abc/ask/","created_utc":1700000000.0}}}},
                {{"kind":"t3","data":{{"title":"no id"}}}},
                {{"kind":"t3","data":{{"id":"def","title":"Link post","selftext":"",
                  "permalink":"/r/webdev/comments/def/link/","created_utc":1700000100.0}}}}
            ]}}}}"#
        );
        let (items, skips) = parse_listing("reddit", "webdev", "u", &body, "i").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(skips.len(), 1);

        assert_eq!(items[0].source_id, "abc");
        assert_eq!(items[0].title, "Ask & answer");
        assert_eq!(items[0].summary.len(), SUMMARY_MAX_CHARS);
        assert_eq!(items[0].url, "https://reddit.com/r/webdev/comments/abc/ask/");
        assert_eq!(items[0].published_at, 1_700_000_000);
        assert_eq!(items[0].category, "webdev");

        assert_eq!(items[1].summary, "Link post");
    }

    #[test]
    fn missing_envelope_is_malformed() {
        assert!(matches!(
            parse_listing("reddit", "webdev", "u", "[]", "i"),
            Err(FetchError::Malformed { .. })
        ));
    }
}
