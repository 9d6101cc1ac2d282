// src/ingest/providers/mod.rs
pub mod devto;
pub mod hackernews;
pub mod medium_rss;
pub mod reddit;

use std::sync::Arc;

use metrics::counter;

use crate::ingest::config::{FeedConfig, SourceSpec};
use crate::ingest::http::HttpFetcher;
use crate::ingest::types::{PartialParseError, SourceAdapter};

/// Items that parsed plus the ones that were skipped.
pub type Parsed = (Vec<crate::ingest::types::NormalizedItem>, Vec<PartialParseError>);

pub(crate) fn log_skips(skips: &[PartialParseError]) {
    if skips.is_empty() {
        return;
    }
    counter!("ingest_items_skipped_total").increment(skips.len() as u64);
    for s in skips {
        tracing::debug!(target: "ingest", source = %s.source_name, index = s.index, reason = %s.reason, "item skipped");
    }
}

/// Build one adapter per configured source.
pub fn build_adapters(cfg: &FeedConfig, http: &HttpFetcher) -> Vec<Arc<dyn SourceAdapter>> {
    cfg.sources
        .iter()
        .map(|spec| -> Arc<dyn SourceAdapter> {
            match spec {
                SourceSpec::Devto { name, url, cap } => Arc::new(devto::DevtoAdapter::new(
                    name.trim(),
                    url,
                    *cap,
                    http.clone(),
                )),
                SourceSpec::Reddit {
                    name,
                    url,
                    category,
                    cap,
                } => Arc::new(reddit::RedditAdapter::new(
                    name.trim(),
                    url,
                    category,
                    *cap,
                    http.clone(),
                )),
                SourceSpec::HackerNews {
                    name,
                    base_url,
                    top_n,
                    keywords,
                    category,
                    cap,
                } => Arc::new(hackernews::HackerNewsAdapter::new(
                    name.trim(),
                    base_url,
                    *top_n,
                    keywords.clone(),
                    category,
                    *cap,
                    http.clone(),
                )),
                SourceSpec::MediumRss { name, feeds, cap } => {
                    Arc::new(medium_rss::MediumRssAdapter::new(
                        name.trim(),
                        feeds.iter().map(|(t, u)| (t.clone(), u.clone())).collect(),
                        *cap,
                        // Per-feed deadline below the adapter's so a slow topic
                        // costs that topic only.
                        cfg.fetch_timeout() * 4 / 5,
                        http.clone(),
                    ))
                }
            }
        })
        .collect()
}
