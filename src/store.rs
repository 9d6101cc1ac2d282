// src/store.rs
//! Feed store: the durable collection of normalized items.
//!
//! Items are unique per `(source_name, source_id)`. The `StableId` only decides
//! storage order; it is never used to decide whether two items are the same.
//! Each write happens under one short critical section, so readers never see
//! a half-applied upsert or a delete+insert gap.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ingest::identity::StableId;
use crate::ingest::types::NormalizedItem;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredItem {
    pub id: StableId,
    #[serde(flatten)]
    pub item: NormalizedItem,
    /// Draft gate. Set only at creation by ingestion; curation may flip it.
    pub visible: bool,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(StableId),
    Updated(StableId),
}

impl UpsertOutcome {
    pub fn id(&self) -> StableId {
        match self {
            Self::Inserted(id) | Self::Updated(id) => *id,
        }
    }
}

/// Filter applied to range scans.
#[derive(Debug, Clone, Default)]
pub struct FeedFilter {
    pub visible_only: bool,
    /// `None` or an empty set means "any category".
    pub categories: Option<BTreeSet<String>>,
}

impl FeedFilter {
    pub fn published() -> Self {
        Self {
            visible_only: true,
            categories: None,
        }
    }

    pub fn with_categories<I, S>(mut self, cats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = cats.into_iter().map(Into::into).collect();
        self.categories = if set.is_empty() { None } else { Some(set) };
        self
    }

    fn matches(&self, it: &StoredItem) -> bool {
        if self.visible_only && !it.visible {
            return false;
        }
        match &self.categories {
            Some(set) if !set.is_empty() => set.contains(&it.item.category),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RangePage {
    /// Ordered by id, descending.
    pub items: Vec<StoredItem>,
    /// At least one more match exists strictly before the last returned item.
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeedStats {
    pub total: usize,
    pub published: usize,
    pub drafts: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("item {0} not found")]
    NotFound(StableId),
    #[error("snapshot write failed: {0}")]
    Snapshot(String),
}

#[async_trait::async_trait]
pub trait FeedStore: Send + Sync {
    /// Insert-or-update keyed by `(item.source_name, item.source_id)`.
    ///
    /// `proposed_id` is only used when the key is new. On update every field
    /// except `id`, `visible` and `inserted_at` is overwritten.
    async fn upsert_by_key(
        &self,
        proposed_id: StableId,
        item: NormalizedItem,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Up to `limit` matching items with id strictly below `cursor`, newest first.
    async fn range_before(
        &self,
        cursor: Option<StableId>,
        limit: usize,
        filter: &FeedFilter,
    ) -> Result<RangePage, StoreError>;

    async fn get(&self, id: StableId) -> Result<Option<StoredItem>, StoreError>;

    /// Curation action; never called by ingestion.
    async fn set_visible(&self, id: StableId, visible: bool) -> Result<StoredItem, StoreError>;

    /// Distinct categories among visible items, sorted.
    async fn categories(&self) -> Result<Vec<String>, StoreError>;

    async fn stats(&self) -> Result<FeedStats, StoreError>;

    /// Persist pending state. No-op for purely in-memory stores.
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Inner {
    by_id: BTreeMap<StableId, StoredItem>,
    by_key: HashMap<(String, String), StableId>,
}

impl Inner {
    fn insert_loaded(&mut self, it: StoredItem) {
        let key = (it.item.source_name.clone(), it.item.source_id.clone());
        self.by_key.insert(key, it.id);
        self.by_id.insert(it.id, it);
    }

    /// First id at or after `proposed` (within the same second) that nobody owns.
    fn free_id(&self, proposed: StableId) -> StableId {
        let mut id = proposed;
        while self.by_id.contains_key(&id) {
            id = id.next_in_second();
        }
        id
    }
}

/// In-memory store with an optional JSON snapshot on disk.
#[derive(Debug, Default)]
pub struct MemoryFeedStore {
    inner: RwLock<Inner>,
    snapshot: Option<PathBuf>,
    flush_guard: tokio::sync::Mutex<()>,
}

impl MemoryFeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a snapshot file. A missing file starts empty.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut inner = Inner::default();
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading feed snapshot {}", path.display()))?;
            let items: Vec<StoredItem> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing feed snapshot {}", path.display()))?;
            for it in items {
                inner.insert_loaded(it);
            }
            info!(target: "store", path = %path.display(), items = inner.by_id.len(), "snapshot loaded");
        }
        Ok(Self {
            inner: RwLock::new(inner),
            snapshot: Some(path),
            flush_guard: tokio::sync::Mutex::new(()),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|g| g.by_id.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }
}

#[async_trait::async_trait]
impl FeedStore for MemoryFeedStore {
    async fn upsert_by_key(
        &self,
        proposed_id: StableId,
        item: NormalizedItem,
    ) -> Result<UpsertOutcome, StoreError> {
        let now = Utc::now();
        let key = (item.source_name.clone(), item.source_id.clone());
        let mut g = self.write()?;

        if let Some(id) = g.by_key.get(&key).copied() {
            if let Some(existing) = g.by_id.get_mut(&id) {
                existing.updated_at = now.max(existing.updated_at);
                existing.item = item;
                return Ok(UpsertOutcome::Updated(id));
            }
        }

        let id = g.free_id(proposed_id);
        if id != proposed_id {
            debug!(target: "store", proposed = %proposed_id, assigned = %id, "stable id taken, stepped forward");
        }
        g.by_key.insert(key, id);
        g.by_id.insert(
            id,
            StoredItem {
                id,
                item,
                visible: false,
                inserted_at: now,
                updated_at: now,
            },
        );
        Ok(UpsertOutcome::Inserted(id))
    }

    async fn range_before(
        &self,
        cursor: Option<StableId>,
        limit: usize,
        filter: &FeedFilter,
    ) -> Result<RangePage, StoreError> {
        let g = self.read()?;
        let iter: Box<dyn DoubleEndedIterator<Item = &StoredItem> + '_> = match cursor {
            Some(c) => Box::new(g.by_id.range(..c).map(|(_, v)| v)),
            None => Box::new(g.by_id.values()),
        };
        // One scan of limit + 1; the extra row only tells us whether more exist.
        let mut items: Vec<StoredItem> = iter
            .rev()
            .filter(|it| filter.matches(it))
            .take(limit.saturating_add(1))
            .cloned()
            .collect();
        let has_more = items.len() > limit;
        items.truncate(limit);
        Ok(RangePage { items, has_more })
    }

    async fn get(&self, id: StableId) -> Result<Option<StoredItem>, StoreError> {
        Ok(self.read()?.by_id.get(&id).cloned())
    }

    async fn set_visible(&self, id: StableId, visible: bool) -> Result<StoredItem, StoreError> {
        let mut g = self.write()?;
        let it = g.by_id.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        it.visible = visible;
        it.updated_at = Utc::now().max(it.updated_at);
        Ok(it.clone())
    }

    async fn categories(&self) -> Result<Vec<String>, StoreError> {
        let g = self.read()?;
        let set: BTreeSet<&str> = g
            .by_id
            .values()
            .filter(|it| it.visible)
            .map(|it| it.item.category.as_str())
            .collect();
        Ok(set.into_iter().map(str::to_string).collect())
    }

    async fn stats(&self) -> Result<FeedStats, StoreError> {
        let g = self.read()?;
        let mut st = FeedStats::default();
        for it in g.by_id.values() {
            st.total += 1;
            if it.visible {
                st.published += 1;
            } else {
                st.drafts += 1;
            }
            *st.by_category.entry(it.item.category.clone()).or_default() += 1;
            *st.by_source.entry(it.item.source_name.clone()).or_default() += 1;
        }
        Ok(st)
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let _guard = self.flush_guard.lock().await;
        let body = {
            let g = self.read()?;
            let items: Vec<&StoredItem> = g.by_id.values().collect();
            serde_json::to_vec_pretty(&items).map_err(|e| StoreError::Snapshot(e.to_string()))?
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::Snapshot(e.to_string()))?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;
        debug!(target: "store", path = %path.display(), bytes = body.len(), "snapshot flushed");
        Ok(())
    }
}
