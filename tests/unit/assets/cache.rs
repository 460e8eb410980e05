use super::*;
use crate::assets::asset::{AssetInfo, AssetKind};

fn key(id: &str) -> AssetKey {
    AssetKey::new(id, AssetKind::TestClip)
}

#[test]
fn same_key_same_instance() {
    let mut cache = AssetCache::new();
    let (a, created_a) = cache.get_or_insert(key("t"));
    let (b, created_b) = cache.get_or_insert(key("t"));
    assert!(created_a);
    assert!(!created_b);
    assert!(a.same_instance(&b));
    assert_eq!(cache.len(), 1);

    let (c, _) = cache.get_or_insert(AssetKey::new("t", AssetKind::UriClip));
    assert!(!a.same_instance(&c));
    assert_eq!(cache.len(), 2);
}

#[test]
fn last_release_evicts() {
    let mut cache = AssetCache::new();
    let (asset, _) = cache.get_or_insert(key("t"));
    asset.begin_resolution("t").unwrap();
    asset.finish_loaded(AssetInfo::TestClip);

    cache.retain(&key("t"));
    cache.retain(&key("t"));
    assert_eq!(cache.holders(&key("t")), 2);
    assert!(!cache.release(&key("t")));
    assert!(cache.get(&key("t")).is_some());
    assert!(cache.release(&key("t")));
    assert!(cache.get(&key("t")).is_none());
}

#[test]
fn in_flight_entries_survive_purge() {
    let mut cache = AssetCache::new();
    let (busy, _) = cache.get_or_insert(key("busy"));
    busy.begin_resolution("busy").unwrap();
    let (done, _) = cache.get_or_insert(key("done"));
    done.begin_resolution("done").unwrap();
    done.finish_loaded(AssetInfo::TestClip);

    assert_eq!(cache.purge_unheld(), 1);
    assert!(cache.get(&key("busy")).is_some());
    assert!(cache.get(&key("done")).is_none());
}

#[test]
fn waiters_are_deduplicated_and_taken_once() {
    let mut cache = AssetCache::new();
    cache.get_or_insert(key("t"));
    cache.add_waiter(&key("t"), "project-0");
    cache.add_waiter(&key("t"), "project-0");
    cache.add_waiter(&key("t"), "project-1");
    assert_eq!(cache.waiters(&key("t")), vec!["project-0", "project-1"]);
    assert_eq!(cache.take_waiters(&key("t")).len(), 2);
    assert!(cache.take_waiters(&key("t")).is_empty());
}
