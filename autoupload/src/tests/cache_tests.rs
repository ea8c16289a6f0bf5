use super::{local_time, FakeClock};
use crate::cache::{CacheKey, RowCache, DEFAULT_CACHE_TTL};
use std::sync::Arc;

fn rows(tag: &str) -> Vec<Vec<String>> {
    vec![vec!["CODE".to_string()], vec![tag.to_string()]]
}

#[test]
fn test_entry_is_served_within_ttl() {
    let clock = FakeClock::at(local_time(2026, 10, 19, 9, 0));
    let cache = RowCache::new(clock.clone(), DEFAULT_CACHE_TTL);
    let key = CacheKey::new("INPUT", "rows");

    let stored = cache.put(key.clone(), rows("V001"));
    clock.advance(chrono::Duration::seconds(119));

    let hit = cache.get(&key).expect("fresh entry");
    assert!(Arc::ptr_eq(&stored, &hit));
}

#[test]
fn test_entry_expires_at_ttl() {
    let clock = FakeClock::at(local_time(2026, 10, 19, 9, 0));
    let cache = RowCache::new(clock.clone(), DEFAULT_CACHE_TTL);
    let key = CacheKey::new("INPUT", "rows");

    cache.put(key.clone(), rows("V001"));
    clock.advance(chrono::Duration::seconds(120));

    assert!(cache.get(&key).is_none());
}

#[test]
fn test_purposes_are_separate_slots() {
    let clock = FakeClock::at(local_time(2026, 10, 19, 9, 0));
    let cache = RowCache::new(clock, DEFAULT_CACHE_TTL);

    cache.put(CacheKey::new("INPUT", "rows"), rows("A"));
    assert!(cache.get(&CacheKey::new("INPUT", "cleanup")).is_none());
    assert!(cache.get(&CacheKey::new("NGUON", "rows")).is_none());
}

#[test]
fn test_invalidate_sheet_drops_every_purpose() {
    let clock = FakeClock::at(local_time(2026, 10, 19, 9, 0));
    let cache = RowCache::new(clock, DEFAULT_CACHE_TTL);

    cache.put(CacheKey::new("NGUON", "source"), rows("A"));
    cache.put(CacheKey::new("NGUON", "rows"), rows("B"));
    cache.put(CacheKey::new("INPUT", "rows"), rows("C"));

    cache.invalidate_sheet("NGUON");

    assert!(cache.get(&CacheKey::new("NGUON", "source")).is_none());
    assert!(cache.get(&CacheKey::new("NGUON", "rows")).is_none());
    assert!(cache.get(&CacheKey::new("INPUT", "rows")).is_some());
}

#[test]
fn test_clock_moving_backwards_keeps_entry_fresh() {
    let clock = FakeClock::at(local_time(2026, 10, 19, 9, 0));
    let cache = RowCache::new(clock.clone(), DEFAULT_CACHE_TTL);
    let key = CacheKey::new("INPUT", "rows");

    cache.put(key.clone(), rows("A"));
    clock.advance(chrono::Duration::minutes(-30));

    assert!(cache.get(&key).is_some());
}

#[test]
fn test_key_display() {
    assert_eq!(CacheKey::new("INPUT", "rows").to_string(), "rows_INPUT");
}
