// src/pagination.rs
//! Cursor pagination over the feed store.
//!
//! Cursors are opaque to clients: `v1.` followed by the hex form of the last
//! seen `StableId`. Passing a cursor back returns the next strictly older page.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use crate::ingest::identity::{StableId, StableIdParseError};
use crate::store::{FeedFilter, FeedStore, StoreError, StoredItem};

const CURSOR_PREFIX: &str = "v1.";

pub const DEFAULT_PAGE_SIZE: usize = 12;
pub const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CursorDecodeError {
    #[error("cursor is empty")]
    Empty,
    #[error("unsupported cursor version")]
    UnsupportedVersion,
    #[error("malformed cursor: {0}")]
    Malformed(#[from] StableIdParseError),
}

pub fn encode_cursor(id: StableId) -> String {
    format!("{CURSOR_PREFIX}{}", id.to_hex())
}

pub fn decode_cursor(raw: &str) -> Result<StableId, CursorDecodeError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CursorDecodeError::Empty);
    }
    let body = raw
        .strip_prefix(CURSOR_PREFIX)
        .ok_or(CursorDecodeError::UnsupportedVersion)?;
    Ok(body.parse::<StableId>()?)
}

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error(transparent)]
    Cursor(#[from] CursorDecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<StoredItem>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Read-only, stateless per request.
#[derive(Clone)]
pub struct PaginationService {
    store: Arc<dyn FeedStore>,
    default_limit: usize,
    max_limit: usize,
}

impl PaginationService {
    pub fn new(store: Arc<dyn FeedStore>) -> Self {
        Self {
            store,
            default_limit: DEFAULT_PAGE_SIZE,
            max_limit: MAX_PAGE_SIZE,
        }
    }

    pub fn with_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.max_limit = max_limit.max(1);
        self.default_limit = default_limit.clamp(1, self.max_limit);
        self
    }

    fn effective_limit(&self, limit: Option<usize>) -> usize {
        limit.unwrap_or(self.default_limit).clamp(1, self.max_limit)
    }

    /// One page of visible items, newest first.
    ///
    /// `next_cursor` is the last returned id whenever the page is non-empty.
    /// An empty page echoes the request cursor, so following `next_cursor`
    /// after `has_more == false` always yields nothing.
    pub async fn page(
        &self,
        cursor: Option<&str>,
        limit: Option<usize>,
        categories: Option<&BTreeSet<String>>,
    ) -> Result<Page, PageError> {
        let after = cursor.map(decode_cursor).transpose()?;
        let limit = self.effective_limit(limit);

        let mut filter = FeedFilter::published();
        if let Some(cats) = categories {
            filter = filter.with_categories(cats.iter().cloned());
        }

        let range = self.store.range_before(after, limit, &filter).await?;
        let next_cursor = match range.items.last() {
            Some(last) => Some(encode_cursor(last.id)),
            None => after.map(encode_cursor),
        };

        Ok(Page {
            items: range.items,
            next_cursor,
            has_more: range.has_more,
        })
    }
}

/// Parse `a, b,,c` into a set; blanks dropped. Empty input means "no filter".
pub fn parse_categories(raw: Option<&str>) -> Option<BTreeSet<String>> {
    let set: BTreeSet<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if set.is_empty() {
        None
    } else {
        Some(set)
    }
}
