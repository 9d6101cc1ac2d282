// src/ingest/mod.rs
pub mod config;
pub mod http;
pub mod identity;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use metrics::{counter, gauge, histogram};
use once_cell::sync::OnceCell;
use tokio::task::JoinSet;

use crate::ingest::identity::IdentityResolver;
use crate::ingest::types::{FetchError, IngestReport, NormalizedItem, SourceAdapter, SourceFailure};
use crate::store::{FeedStore, UpsertOutcome};

/// Summaries derived from long-form content are capped at this many chars.
pub const SUMMARY_MAX_CHARS: usize = 180;

/// Display text: decode entities, strip tags, collapse whitespace.
pub fn normalize_title(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    let out = re_tags.replace_all(&decoded, "");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Keep at most `max` chars (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Plain-text summary from the first `<p>` of an HTML body, or the title.
///
/// Tags are stripped and only a fixed set of entities is decoded:
/// `&nbsp; &amp; &lt; &gt; &quot; &#39;`.
pub fn extract_summary(html: Option<&str>, title: &str) -> String {
    static RE_P: OnceCell<regex::Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_p = RE_P.get_or_init(|| regex::Regex::new(r"<p>(.*?)</p>").unwrap());
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"<[^>]*>").unwrap());

    let Some(first) = html
        .and_then(|h| re_p.captures(h))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
    else {
        return title.to_string();
    };

    let text = re_tags
        .replace_all(first, "")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    truncate_chars(&text, SUMMARY_MAX_CHARS)
}

/// Origin publish time, or ingestion time when the source omits it.
pub fn epoch_or_now(ts: Option<i64>) -> i64 {
    ts.unwrap_or_else(|| chrono::Utc::now().timestamp())
}

/// Newest first, at most `cap` items.
pub fn cap_recent(mut items: Vec<NormalizedItem>, cap: usize) -> Vec<NormalizedItem> {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items.truncate(cap);
    items
}

/// Favicon service URL for the host of `endpoint`.
pub fn icon_url_for(endpoint: &str) -> String {
    let host = reqwest::Url::parse(endpoint)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_default();
    format!("https://www.google.com/s2/favicons?domain={host}&sz=64")
}

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Per-adapter deadline; a hang turns into a reported failure.
    pub fetch_timeout: Duration,
    /// Upserts in flight at once.
    pub upsert_concurrency: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(15),
            upsert_concurrency: 16,
        }
    }
}

/// Aggregation pipeline: fetch from adapters concurrently, upsert everything.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn FeedStore>,
    resolver: Arc<dyn IdentityResolver>,
    opts: IngestOptions,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn FeedStore>,
        resolver: Arc<dyn IdentityResolver>,
        opts: IngestOptions,
    ) -> Self {
        Self {
            store,
            resolver,
            opts,
        }
    }

    pub fn store(&self) -> &Arc<dyn FeedStore> {
        &self.store
    }

    /// Run one ingestion pass. Never fails as a whole: per-source problems
    /// end up in `IngestReport::failed`.
    pub async fn ingest(&self, adapters: &[Arc<dyn SourceAdapter>]) -> IngestReport {
        crate::metrics::describe_ingest_series();
        let started = Instant::now();
        let mut report = IngestReport::default();

        let batches = self.fetch_all(adapters, &mut report).await;

        for (source, items) in batches {
            let n = items.len();
            counter!("ingest_items_fetched_total").increment(n as u64);
            let (ins, upd, errs) = self.upsert_batch(items).await;
            report.inserted += ins;
            report.updated += upd;
            report.write_errors += errs;
            tracing::debug!(target: "ingest", %source, fetched = n, inserted = ins, updated = upd, "source ingested");
        }

        if let Err(e) = self.store.flush().await {
            tracing::warn!(target: "ingest", error = %e, "store flush after ingest failed");
        }

        counter!("ingest_inserted_total").increment(report.inserted as u64);
        counter!("ingest_updated_total").increment(report.updated as u64);
        counter!("ingest_write_errors_total").increment(report.write_errors as u64);
        gauge!("ingest_pipeline_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

        tracing::info!(
            target: "ingest",
            inserted = report.inserted,
            updated = report.updated,
            failed = report.failed.len(),
            write_errors = report.write_errors,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ingest pass finished"
        );
        report
    }

    /// Each adapter runs as its own task under its own deadline; a failure,
    /// timeout or panic in one never touches the others.
    async fn fetch_all(
        &self,
        adapters: &[Arc<dyn SourceAdapter>],
        report: &mut IngestReport,
    ) -> Vec<(String, Vec<NormalizedItem>)> {
        let timeout = self.opts.fetch_timeout;
        let mut set = JoinSet::new();
        let mut names = HashMap::new();

        for adapter in adapters {
            let adapter = Arc::clone(adapter);
            let name = adapter.name().to_string();
            let handle = set.spawn(async move {
                let t0 = Instant::now();
                let res = match tokio::time::timeout(timeout, adapter.fetch()).await {
                    Ok(r) => r,
                    Err(_) => Err(FetchError::Timeout(timeout)),
                };
                histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                res
            });
            names.insert(handle.id(), name);
        }

        let mut out = Vec::with_capacity(adapters.len());
        while let Some(joined) = set.join_next_with_id().await {
            let (task_id, res) = match joined {
                Ok((id, res)) => (id, res.map_err(|e| e.to_string())),
                Err(join_err) => (join_err.id(), Err(format!("adapter task aborted: {join_err}"))),
            };
            let source = names.remove(&task_id).unwrap_or_default();
            match res {
                Ok(items) => out.push((source, items)),
                Err(error) => {
                    tracing::warn!(target: "ingest", %source, %error, "source failed");
                    counter!("ingest_source_errors_total").increment(1);
                    report.failed.push(SourceFailure { source, error });
                }
            }
        }
        // Stable report order regardless of completion order.
        report.failed.sort_by(|a, b| a.source.cmp(&b.source));
        out
    }

    async fn upsert_batch(&self, items: Vec<NormalizedItem>) -> (usize, usize, usize) {
        let outcomes: Vec<_> = stream::iter(items)
            .map(|item| {
                let id =
                    self.resolver
                        .resolve(&item.source_name, &item.source_id, item.published_at);
                self.store.upsert_by_key(id, item)
            })
            .buffer_unordered(self.opts.upsert_concurrency.max(1))
            .collect()
            .await;

        let (mut ins, mut upd, mut errs) = (0, 0, 0);
        for o in outcomes {
            match o {
                Ok(UpsertOutcome::Inserted(_)) => ins += 1,
                Ok(UpsertOutcome::Updated(_)) => upd += 1,
                Err(e) => {
                    tracing::warn!(target: "ingest", error = %e, "upsert failed");
                    errs += 1;
                }
            }
        }
        (ins, upd, errs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn it(sid: &str, ts: i64) -> NormalizedItem {
        NormalizedItem {
            source_id: sid.into(),
            source_name: "t".into(),
            title: sid.into(),
            summary: String::new(),
            category: "c".into(),
            url: String::new(),
            published_at: ts,
            icon_url: String::new(),
        }
    }

    #[test]
    fn normalize_title_decodes_and_collapses() {
        assert_eq!(
            normalize_title("  Rust &amp; <b>WASM</b>\n\n in   2025 "),
            "Rust & WASM in 2025"
        );
    }

    #[test]
    fn summary_takes_first_paragraph_and_decodes_fixed_entities() {
        let html = r#"<figure>x</figure><p>Hello&nbsp;<a href="/x">there</a> &quot;you&quot; &#39;ok&#39; &lt;3</p><p>second</p>"#;
        assert_eq!(
            extract_summary(Some(html), "T"),
            r#"Hello there "you" 'ok' <3"#
        );
    }

    #[test]
    fn summary_falls_back_to_title() {
        assert_eq!(extract_summary(None, "Title"), "Title");
        assert_eq!(extract_summary(Some("<div>no paragraphs</div>"), "Title"), "Title");
    }

    #[test]
    fn summary_is_capped_in_chars() {
        let body = format!("<p>{}</p>", "é".repeat(400));
        let s = extract_summary(Some(&body), "T");
        assert_eq!(s.chars().count(), SUMMARY_MAX_CHARS);
    }

    #[test]
    fn cap_recent_sorts_desc_and_truncates() {
        let out = cap_recent(vec![it("a", 1), it("b", 3), it("c", 2)], 2);
        let ids: Vec<_> = out.iter().map(|i| i.source_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn icon_url_uses_endpoint_host() {
        assert_eq!(
            icon_url_for("https://www.reddit.com/r/webdev/new.json?limit=10"),
            "https://www.google.com/s2/favicons?domain=reddit.com&sz=64"
        );
        assert_eq!(
            icon_url_for("https://dev.to/api/articles/latest"),
            "https://www.google.com/s2/favicons?domain=dev.to&sz=64"
        );
    }

    #[test]
    fn epoch_or_now_prefers_origin_time() {
        assert_eq!(epoch_or_now(Some(42)), 42);
        assert!(epoch_or_now(None) > 1_600_000_000);
    }
}
