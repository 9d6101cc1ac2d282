// src/ingest/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::http::DEFAULT_USER_AGENT;
use crate::ingest::IngestOptions;
use crate::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

pub const ENV_PATH: &str = "FEED_CONFIG_PATH";

const DEVTO_URL: &str = "https://dev.to/api/articles/latest?per_page=10&tag=webdev";
const HN_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";

const HN_KEYWORDS: &[&str] = &[
    "javascript", "typescript", "react", "vue", "angular", "node", "next", "web", "frontend",
    "backend", "fullstack", "developer", "programming", "code", "software", "framework",
    "library", "api", "database", "cloud", "aws", "azure", "gcp", "devops", "docker",
    "kubernetes", "security", "performance", "testing", "design", "ui", "ux",
];

const MEDIUM_TOPICS: &[(&str, &str)] = &[
    ("webdev", "web-development"),
    ("frontend", "front-end-development"),
    ("backend", "backend-development"),
    ("devops", "devops"),
    ("security", "web-security"),
    ("performance", "web-performance"),
    ("accessibility", "web-accessibility"),
    ("design", "web-design"),
    ("testing", "web-testing"),
    ("architecture", "web-architecture"),
];

fn default_cap() -> usize {
    30
}
fn default_rest_cap() -> usize {
    10
}
fn default_hn_base() -> String {
    HN_BASE_URL.to_string()
}
fn default_top_n() -> usize {
    30
}
fn default_hn_keywords() -> Vec<String> {
    HN_KEYWORDS.iter().map(|s| s.to_string()).collect()
}
fn default_webdev() -> String {
    "webdev".to_string()
}

/// One configured content source. `kind` picks the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    Devto {
        name: String,
        url: String,
        #[serde(default = "default_rest_cap")]
        cap: usize,
    },
    Reddit {
        name: String,
        url: String,
        category: String,
        #[serde(default = "default_rest_cap")]
        cap: usize,
    },
    HackerNews {
        name: String,
        #[serde(default = "default_hn_base")]
        base_url: String,
        #[serde(default = "default_top_n")]
        top_n: usize,
        #[serde(default = "default_hn_keywords")]
        keywords: Vec<String>,
        #[serde(default = "default_webdev")]
        category: String,
        #[serde(default = "default_cap")]
        cap: usize,
    },
    MediumRss {
        name: String,
        /// topic (= category) → feed URL
        feeds: BTreeMap<String, String>,
        #[serde(default = "default_cap")]
        cap: usize,
    },
}

impl SourceSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Devto { name, .. }
            | Self::Reddit { name, .. }
            | Self::HackerNews { name, .. }
            | Self::MediumRss { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub user_agent: String,
    pub fetch_timeout_secs: u64,
    /// 0 disables the periodic scheduler.
    pub ingest_interval_secs: u64,
    pub upsert_concurrency: usize,
    pub page_size_default: usize,
    pub page_size_max: usize,
    pub snapshot_path: Option<PathBuf>,
    pub sources: Vec<SourceSpec>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout_secs: 15,
            ingest_interval_secs: 0,
            upsert_concurrency: 16,
            page_size_default: DEFAULT_PAGE_SIZE,
            page_size_max: MAX_PAGE_SIZE,
            snapshot_path: None,
            sources: default_sources(),
        }
    }
}

impl FeedConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            fetch_timeout: self.fetch_timeout(),
            upsert_concurrency: self.upsert_concurrency.max(1),
        }
    }

    fn validate(mut self) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for s in &self.sources {
            let n = s.name().trim();
            if n.is_empty() {
                bail!("source with empty name");
            }
            if !seen.insert(n.to_ascii_lowercase()) {
                bail!("duplicate source name: {n}");
            }
        }
        if seen.contains("all") {
            bail!("source name 'all' is reserved");
        }
        self.page_size_max = self.page_size_max.max(1);
        self.page_size_default = self.page_size_default.clamp(1, self.page_size_max);
        Ok(self)
    }
}

/// Sources used when no config file is present.
pub fn default_sources() -> Vec<SourceSpec> {
    let medium_feeds = MEDIUM_TOPICS
        .iter()
        .map(|(topic, tag)| (topic.to_string(), format!("https://medium.com/feed/tag/{tag}")))
        .collect();
    vec![
        SourceSpec::Devto {
            name: "dev.to".into(),
            url: DEVTO_URL.into(),
            cap: default_rest_cap(),
        },
        SourceSpec::Reddit {
            name: "reddit".into(),
            url: "https://www.reddit.com/r/webdev/new.json?limit=10".into(),
            category: "webdev".into(),
            cap: default_rest_cap(),
        },
        SourceSpec::Reddit {
            name: "reddit-programming".into(),
            url: "https://www.reddit.com/r/programming/new.json?limit=10".into(),
            category: "programming".into(),
            cap: default_rest_cap(),
        },
        SourceSpec::HackerNews {
            name: "hackernews".into(),
            base_url: default_hn_base(),
            top_n: default_top_n(),
            keywords: default_hn_keywords(),
            category: default_webdev(),
            cap: default_cap(),
        },
        SourceSpec::MediumRss {
            name: "medium".into(),
            feeds: medium_feeds,
            cap: default_cap(),
        },
    ]
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<FeedConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feed config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing feed config {}", path.display()))
}

/// Load config using env var + fallbacks:
/// 1) $FEED_CONFIG_PATH
/// 2) config/feed.toml
/// 3) config/feed.json
/// 4) built-in defaults
pub fn load_default() -> Result<FeedConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        } else {
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/feed.toml");
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from("config/feed.json");
    if json_p.exists() {
        return load_from(&json_p);
    }
    Ok(FeedConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<FeedConfig> {
    let cfg = match hint_ext {
        "toml" => toml::from_str::<FeedConfig>(s)?,
        "json" => serde_json::from_str::<FeedConfig>(s)?,
        // No usable extension: JSON documents start with '{'.
        _ if s.trim_start().starts_with('{') => serde_json::from_str::<FeedConfig>(s)?,
        _ => toml::from_str::<FeedConfig>(s)?,
    };
    cfg.validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_adapter_kind() {
        let cfg = FeedConfig::default().validate().unwrap();
        let names: Vec<_> = cfg.sources.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["dev.to", "reddit", "reddit-programming", "hackernews", "medium"]
        );
        match &cfg.sources[4] {
            SourceSpec::MediumRss { feeds, cap, .. } => {
                assert_eq!(feeds.len(), 10);
                assert_eq!(*cap, 30);
                assert_eq!(
                    feeds.get("frontend").map(String::as_str),
                    Some("https://medium.com/feed/tag/front-end-development")
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn toml_with_tagged_sources() {
        let src = r#"
user_agent = "test bot"
page_size_default = 5

[[sources]]
kind = "reddit"
name = "r-rust"
url = "http://localhost/r.json"
category = "rust"

[[sources]]
kind = "medium_rss"
name = "medium"
[sources.feeds]
devops = "http://localhost/devops.xml"
"#;
        let cfg = parse_config(src, "toml").unwrap();
        assert_eq!(cfg.user_agent, "test bot");
        assert_eq!(cfg.page_size_default, 5);
        assert_eq!(cfg.fetch_timeout_secs, 15);
        assert_eq!(cfg.sources.len(), 2);
        assert!(matches!(&cfg.sources[0], SourceSpec::Reddit { cap: 10, .. }));
    }

    #[test]
    fn json_without_extension_is_sniffed() {
        let src = r#"{"sources":[{"kind":"devto","name":"d","url":"http://x"}]}"#;
        let cfg = parse_config(src, "").unwrap();
        assert_eq!(cfg.sources.len(), 1);
    }

    #[test]
    fn duplicate_and_reserved_names_rejected() {
        let dup = r#"{"sources":[
            {"kind":"devto","name":"d","url":"http://x"},
            {"kind":"devto","name":" D ","url":"http://y"}]}"#;
        assert!(parse_config(dup, "json").is_err());

        let reserved = r#"{"sources":[{"kind":"devto","name":"all","url":"http://x"}]}"#;
        assert!(parse_config(reserved, "json").is_err());
    }

    #[test]
    fn page_sizes_are_sanitized() {
        let cfg = parse_config("page_size_default = 500\npage_size_max = 0", "toml").unwrap();
        assert_eq!(cfg.page_size_max, 1);
        assert_eq!(cfg.page_size_default, 1);
    }
}
