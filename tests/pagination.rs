// tests/pagination.rs
mod common;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use common::item;
use webarc_feed::ingest::identity::{IdentityResolver, StableId, TimeDigestResolver};
use webarc_feed::pagination::{encode_cursor, PageError, PaginationService};
use webarc_feed::store::{FeedStore, MemoryFeedStore};

/// Store with `n` published items spread over the given categories, plus one draft.
async fn seeded(n: usize, cats: &[&str]) -> Arc<MemoryFeedStore> {
    let store = Arc::new(MemoryFeedStore::new());
    for i in 0..n {
        let cat = cats[i % cats.len()];
        // Several items share a second to exercise same-second ordering.
        let it = item("dev.to", &format!("s{i}"), 1_000 + (i / 3) as i64, "t", cat);
        let id = TimeDigestResolver.resolve(&it.source_name, &it.source_id, it.published_at);
        let out = store.upsert_by_key(id, it).await.unwrap();
        store.set_visible(out.id(), true).await.unwrap();
    }
    let draft = item("dev.to", "draft", 5_000, "hidden", cats[0]);
    let id = TimeDigestResolver.resolve("dev.to", "draft", 5_000);
    store.upsert_by_key(id, draft).await.unwrap();
    store
}

async fn walk(svc: &PaginationService, limit: usize, cats: Option<&BTreeSet<String>>) -> Vec<StableId> {
    let mut out = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = svc.page(cursor.as_deref(), Some(limit), cats).await.unwrap();
        assert!(page.items.len() <= limit);
        out.extend(page.items.iter().map(|it| it.id));
        if !page.has_more {
            // Following the cursor after the last page yields nothing.
            let after = svc.page(page.next_cursor.as_deref(), Some(limit), cats).await.unwrap();
            assert!(after.items.is_empty());
            assert!(!after.has_more);
            break;
        }
        let next = page.next_cursor.expect("has_more implies a cursor");
        cursor = Some(next);
    }
    out
}

#[tokio::test]
async fn walking_all_pages_sees_every_published_item_once_in_order() {
    let store = seeded(23, &["webdev"]).await;
    let svc = PaginationService::new(store);

    for limit in [1, 4, 5, 23, 50] {
        let ids = walk(&svc, limit, None).await;
        assert_eq!(ids.len(), 23, "limit {limit}");
        let uniq: HashSet<_> = ids.iter().collect();
        assert_eq!(uniq.len(), ids.len(), "no duplicates at limit {limit}");
        assert!(ids.windows(2).all(|w| w[0] > w[1]), "strictly descending at limit {limit}");
    }
}

#[tokio::test]
async fn drafts_never_appear() {
    let store = seeded(3, &["webdev"]).await;
    let svc = PaginationService::new(store);
    let page = svc.page(None, Some(50), None).await.unwrap();
    assert_eq!(page.items.len(), 3);
    assert!(page.items.iter().all(|it| it.visible));
    assert!(page.items.iter().all(|it| it.item.source_id != "draft"));
}

#[tokio::test]
async fn category_pages_compose_to_the_unfiltered_feed() {
    let store = seeded(20, &["a", "b", "c"]).await;
    let svc = PaginationService::new(store);

    let only = |c: &str| BTreeSet::from([c.to_string()]);
    let a = walk(&svc, 3, Some(&only("a"))).await;
    let b = walk(&svc, 3, Some(&only("b"))).await;
    let ab = walk(&svc, 3, Some(&BTreeSet::from(["a".to_string(), "b".to_string()]))).await;

    let mut union: Vec<_> = a.iter().chain(b.iter()).copied().collect();
    union.sort_by(|x, y| y.cmp(x));
    assert_eq!(union, ab);

    let all = walk(&svc, 7, None).await;
    let c = walk(&svc, 7, Some(&only("c"))).await;
    let mut abc: Vec<_> = ab.into_iter().chain(c).collect();
    abc.sort_by(|x, y| y.cmp(x));
    assert_eq!(abc, all);
}

#[tokio::test]
async fn has_more_matches_whether_the_next_page_is_empty() {
    let store = seeded(10, &["webdev"]).await;
    let svc = PaginationService::new(store);

    let mut cursor: Option<String> = None;
    for _ in 0..20 {
        let page = svc.page(cursor.as_deref(), Some(3), None).await.unwrap();
        let next = svc.page(page.next_cursor.as_deref(), Some(3), None).await.unwrap();
        assert_eq!(page.has_more, !next.items.is_empty());
        if !page.has_more {
            return;
        }
        cursor = page.next_cursor;
    }
    panic!("pagination did not terminate");
}

#[tokio::test]
async fn exact_multiple_of_page_size_ends_cleanly() {
    let store = seeded(6, &["webdev"]).await;
    let svc = PaginationService::new(store);
    let first = svc.page(None, Some(3), None).await.unwrap();
    assert!(first.has_more);
    let second = svc.page(first.next_cursor.as_deref(), Some(3), None).await.unwrap();
    assert_eq!(second.items.len(), 3);
    assert!(!second.has_more);
}

#[tokio::test]
async fn empty_store_and_empty_category() {
    let svc = PaginationService::new(Arc::new(MemoryFeedStore::new()));
    let page = svc.page(None, None, None).await.unwrap();
    assert!(page.items.is_empty());
    assert!(!page.has_more);
    assert_eq!(page.next_cursor, None);

    let store = seeded(4, &["webdev"]).await;
    let svc = PaginationService::new(store);
    let nothing = BTreeSet::from(["nope".to_string()]);
    let page = svc.page(None, None, Some(&nothing)).await.unwrap();
    assert!(page.items.is_empty());
    assert!(!page.has_more);
}

#[tokio::test]
async fn limit_is_clamped() {
    let store = seeded(60, &["webdev"]).await;
    let svc = PaginationService::new(store.clone());
    assert_eq!(svc.page(None, Some(0), None).await.unwrap().items.len(), 1);
    assert_eq!(svc.page(None, Some(1_000), None).await.unwrap().items.len(), 50);
    assert_eq!(svc.page(None, None, None).await.unwrap().items.len(), 12);

    let narrow = PaginationService::new(store).with_limits(5, 8);
    assert_eq!(narrow.page(None, None, None).await.unwrap().items.len(), 5);
    assert_eq!(narrow.page(None, Some(100), None).await.unwrap().items.len(), 8);
}

#[tokio::test]
async fn cursor_for_an_unknown_id_still_pages_older_items() {
    let store = seeded(5, &["webdev"]).await;
    let svc = PaginationService::new(store);
    // An id from far in the future sits above everything.
    let future = StableId::from_parts(u32::MAX, 0);
    let page = svc.page(Some(&encode_cursor(future)), Some(50), None).await.unwrap();
    assert_eq!(page.items.len(), 5);
}

#[tokio::test]
async fn garbage_cursor_is_rejected() {
    let svc = PaginationService::new(Arc::new(MemoryFeedStore::new()));
    for bad in ["garbage", "v1.zz", "v2.000000000000000000000000", "v1.0123"] {
        let err = svc.page(Some(bad), None, None).await.unwrap_err();
        assert!(matches!(err, PageError::Cursor(_)), "{bad} should be a cursor error");
    }
}
