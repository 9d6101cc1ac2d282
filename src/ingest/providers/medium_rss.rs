// src/ingest/providers/medium_rss.rs
use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use serde::Deserialize;

use super::{log_skips, Parsed};
use crate::ingest::http::HttpFetcher;
use crate::ingest::types::{FetchError, NormalizedItem, PartialParseError, SourceAdapter};
use crate::ingest::{cap_recent, epoch_or_now, extract_summary, icon_url_for, normalize_title};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    /// `<content:encoded>`; serde sees the local name only.
    #[serde(rename = "encoded")]
    content: Option<String>,
    guid: Option<Guid>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text")]
    value: Option<String>,
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc2822(ts.trim())
        .ok()
        .map(|dt| dt.timestamp())
}

/// Last non-empty path segment of a guid URL, or the guid itself.
fn id_from_guid(guid: &str) -> String {
    let g = guid.trim();
    g.rsplit('/')
        .find(|seg| !seg.is_empty())
        .unwrap_or(g)
        .to_string()
}

/// Rewrite HTML named entities that XML does not know. The five XML
/// entities are left for the parser; unknown names are dropped.
fn scrub_html_entities_for_xml(s: &str) -> String {
    static RE_ENTITY: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE_ENTITY.get_or_init(|| regex::Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").unwrap());

    let s = s
        .replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'");
    re.replace_all(&s, |caps: &regex::Captures<'_>| {
        let whole = &caps[0];
        match &caps[1] {
            "amp" | "lt" | "gt" | "quot" | "apos" => whole.to_string(),
            _ => {
                let decoded = html_escape::decode_html_entities(whole);
                if decoded == whole {
                    String::new()
                } else {
                    // Re-escape so a decoded '<' or '&' cannot break the XML.
                    html_escape::encode_text(&decoded).into_owned()
                }
            }
        }
    })
    .into_owned()
}

/// Parse one topic feed. A feed with no usable items counts as failed.
pub fn parse_feed(
    source: &str,
    topic: &str,
    url: &str,
    xml: &str,
    icon: &str,
) -> Result<Parsed, FetchError> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).map_err(|e| FetchError::Malformed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let mut items = Vec::with_capacity(rss.channel.item.len());
    let mut skips = Vec::new();
    for (index, it) in rss.channel.item.into_iter().enumerate() {
        let title = normalize_title(it.title.as_deref().unwrap_or_default());
        let link = it.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
        let guid = it
            .guid
            .and_then(|g| g.value)
            .filter(|g| !g.trim().is_empty());
        let (Some(link), Some(guid)) = (link, guid) else {
            skips.push(PartialParseError {
                source_name: source.to_string(),
                index,
                reason: "missing link or guid".into(),
            });
            continue;
        };
        if title.is_empty() {
            skips.push(PartialParseError {
                source_name: source.to_string(),
                index,
                reason: "empty title".into(),
            });
            continue;
        }
        items.push(NormalizedItem {
            source_id: id_from_guid(&guid),
            source_name: source.to_string(),
            summary: extract_summary(it.content.as_deref(), &title),
            title,
            category: topic.to_string(),
            url: link,
            published_at: epoch_or_now(it.pub_date.as_deref().and_then(parse_rfc2822_to_unix)),
            icon_url: icon.to_string(),
        });
    }

    if items.is_empty() {
        return Err(FetchError::Malformed {
            url: url.to_string(),
            reason: "feed has no parseable items".into(),
        });
    }
    Ok((items, skips))
}

/// Medium tag feeds, one per topic, fetched concurrently.
pub struct MediumRssAdapter {
    name: String,
    feeds: Vec<(String, String)>, // (topic, url)
    cap: usize,
    feed_timeout: Duration,
    icon: String,
    http: HttpFetcher,
}

impl MediumRssAdapter {
    pub fn new(
        name: &str,
        feeds: Vec<(String, String)>,
        cap: usize,
        feed_timeout: Duration,
        http: HttpFetcher,
    ) -> Self {
        let icon = feeds
            .first()
            .map(|(_, u)| icon_url_for(u))
            .unwrap_or_else(|| icon_url_for("https://medium.com"));
        Self {
            name: name.to_string(),
            feeds,
            cap,
            feed_timeout,
            icon,
            http,
        }
    }

    async fn fetch_topic(&self, topic: &str, url: &str) -> Result<Parsed, FetchError> {
        let body = tokio::time::timeout(self.feed_timeout, self.http.get_text(url))
            .await
            .map_err(|_| FetchError::Timeout(self.feed_timeout))??;
        parse_feed(&self.name, topic, url, &body, &self.icon)
    }
}

#[async_trait]
impl SourceAdapter for MediumRssAdapter {
    async fn fetch(&self) -> Result<Vec<NormalizedItem>, FetchError> {
        let results = futures::future::join_all(
            self.feeds
                .iter()
                .map(|(topic, url)| async move { (topic, self.fetch_topic(topic, url).await) }),
        )
        .await;

        let mut all = Vec::new();
        let mut failed = 0usize;
        for (topic, res) in results {
            match res {
                Ok((items, skips)) => {
                    log_skips(&skips);
                    all.extend(items);
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(target: "ingest", source = %self.name, %topic, error = %e, "feed skipped");
                }
            }
        }
        if failed == self.feeds.len() {
            return Err(FetchError::AllFeedsFailed(failed));
        }

        // The same story can sit in several topic feeds; keep its newest copy once.
        let mut all = cap_recent(all, usize::MAX);
        let mut seen = HashSet::new();
        all.retain(|it| seen.insert(it.source_id.clone()));
        all.truncate(self.cap);
        Ok(all)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
