// tests/ingest_config.rs
use std::time::Duration;
use std::{env, fs};

use webarc_feed::ingest::config::{load_default, load_from, FeedConfig, SourceSpec, ENV_PATH};

#[test]
fn parse_toml_and_json_paths() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("feed.toml");
    fs::write(
        &p_toml,
        r#"
fetch_timeout_secs = 7
page_size_default = 80

[[sources]]
kind = "devto"
name = " dev.to "
url = "http://localhost/devto"

[[sources]]
kind = "medium_rss"
name = "medium"
feeds = { webdev = "http://localhost/medium/webdev" }
"#,
    )
    .unwrap();
    let cfg = load_from(&p_toml).unwrap();
    assert_eq!(cfg.fetch_timeout(), Duration::from_secs(7));
    // Default page size never exceeds the max.
    assert_eq!(cfg.page_size_default, cfg.page_size_max);
    assert_eq!(cfg.sources.len(), 2);
    assert!(matches!(&cfg.sources[0], SourceSpec::Devto { cap: 10, .. }));
    match &cfg.sources[1] {
        SourceSpec::MediumRss { feeds, cap, .. } => {
            assert_eq!(*cap, 30);
            assert_eq!(feeds.get("webdev").map(String::as_str), Some("http://localhost/medium/webdev"));
        }
        other => panic!("unexpected source {other:?}"),
    }

    let p_json = dir.path().join("feed.json");
    fs::write(
        &p_json,
        r#"{"sources":[{"kind":"reddit","name":"r","url":"http://x","category":"webdev"}]}"#,
    )
    .unwrap();
    let cj = load_from(&p_json).unwrap();
    assert_eq!(cj.sources.len(), 1);
    assert_eq!(cj.sources[0].name(), "r");
    assert_eq!(cj.fetch_timeout_secs, FeedConfig::default().fetch_timeout_secs);
}

#[test]
fn duplicate_and_reserved_names_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let dup = dir.path().join("dup.toml");
    fs::write(
        &dup,
        r#"
[[sources]]
kind = "devto"
name = "Dev.to"
url = "http://a"

[[sources]]
kind = "devto"
name = "dev.to"
url = "http://b"
"#,
    )
    .unwrap();
    assert!(load_from(&dup).is_err());

    let reserved = dir.path().join("reserved.json");
    fs::write(
        &reserved,
        r#"{"sources":[{"kind":"devto","name":"ALL","url":"http://a"}]}"#,
    )
    .unwrap();
    assert!(load_from(&reserved).is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Keep the repo's own config/ out of the way.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    env::remove_var(ENV_PATH);

    // 1) Nothing on disk: built-in defaults.
    let d = load_default().unwrap();
    assert_eq!(d, FeedConfig::default());
    assert_eq!(d.sources.len(), 5);

    // 2) config/feed.toml fallback.
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("feed.toml"), "ingest_interval_secs = 600\nsources = []\n").unwrap();
    let t = load_default().unwrap();
    assert_eq!(t.ingest_interval_secs, 600);
    assert!(t.sources.is_empty());

    // 3) The env var wins.
    let p_env = tmp.path().join("custom.json");
    fs::write(&p_env, r#"{"ingest_interval_secs": 5}"#).unwrap();
    env::set_var(ENV_PATH, p_env.display().to_string());
    assert_eq!(load_default().unwrap().ingest_interval_secs, 5);

    // 4) A dangling env path is an error, not a silent fallback.
    env::set_var(ENV_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(load_default().is_err());
    env::remove_var(ENV_PATH);

    env::set_current_dir(&old).unwrap();
}

#[test]
fn shipped_config_parses() {
    let p = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/feed.toml");
    let cfg = load_from(&p).unwrap();
    let names: Vec<_> = cfg.sources.iter().map(|s| s.name()).collect();
    assert_eq!(
        names,
        vec!["dev.to", "reddit", "reddit-programming", "hackernews", "medium"]
    );
    assert_eq!(cfg.ingest_interval_secs, 1800);
}
