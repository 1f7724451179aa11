// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Time-to-live storage for transformed parameter values.
//!
//! Freshness is checked on read against the caller's `max_age`; there is no
//! background eviction. An entry for a key that is never read again stays
//! until the owning provider is cleared or dropped.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tick::Clock;

use crate::{BackendOptions, Transform, provider::MultipleValues, value::ParameterValue};

/// Distinguishes single lookups from path listings so the two never collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Lookup {
    Single,
    Multiple { strict: bool },
}

/// Identity of one cached request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    provider: &'static str,
    lookup: Lookup,
    name: String,
    transform: Transform,
    options: String,
}

impl CacheKey {
    pub(crate) fn single(provider: &'static str, name: &str, transform: Transform, options: &BackendOptions) -> Self {
        Self {
            provider,
            lookup: Lookup::Single,
            name: name.to_owned(),
            transform,
            options: options.fingerprint(),
        }
    }

    pub(crate) fn multiple(provider: &'static str, path: &str, transform: Transform, strict: bool, options: &BackendOptions) -> Self {
        Self {
            provider,
            lookup: Lookup::Multiple { strict },
            name: path.to_owned(),
            transform,
            options: options.fingerprint(),
        }
    }
}

/// A cached value of either lookup shape.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Cached {
    Value(ParameterValue),
    Values(Arc<MultipleValues>),
}

/// A stored value and the instant it was stored. Replaced, never mutated.
#[derive(Clone, Debug)]
struct CacheEntry {
    value: Cached,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant, max_age: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) < max_age
    }
}

/// Per-provider cache guarded by a single mutex.
///
/// Every operation holds the lock only for the map access itself, never
/// across a backend call.
#[derive(Debug)]
pub(crate) struct ParameterCache {
    clock: Clock,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl ParameterCache {
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Returns the cached value if it was stored less than `max_age` ago.
    pub(crate) fn get(&self, key: &CacheKey, max_age: Duration) -> Option<Cached> {
        let now = self.clock.instant();
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(now, max_age))
            .map(|entry| entry.value.clone())
    }

    /// Stores `value` under `key` with the current instant, replacing any previous entry.
    pub(crate) fn insert(&self, key: CacheKey, value: Cached) {
        let entry = CacheEntry {
            value,
            stored_at: self.clock.instant(),
        };
        self.entries.lock().insert(key, entry);
    }

    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tick::ClockControl;

    fn text(value: &str) -> Cached {
        Cached::Value(ParameterValue::Text(value.to_string()))
    }

    fn key(name: &str) -> CacheKey {
        CacheKey::single("test", name, Transform::None, &BackendOptions::new())
    }

    #[test]
    fn fresh_entry_is_returned() {
        let control = ClockControl::new();
        let cache = ParameterCache::new(control.to_clock());

        cache.insert(key("a"), text("1"));
        control.advance(Duration::from_secs(4));

        assert_eq!(cache.get(&key("a"), Duration::from_secs(5)), Some(text("1")));
    }

    #[test]
    fn entry_expires_at_max_age() {
        let control = ClockControl::new();
        let cache = ParameterCache::new(control.to_clock());

        cache.insert(key("a"), text("1"));
        control.advance(Duration::from_secs(5));

        assert_eq!(cache.get(&key("a"), Duration::from_secs(5)), None);
        // The caller's window decides freshness, not the window at insert time.
        assert_eq!(cache.get(&key("a"), Duration::from_secs(10)), Some(text("1")));
    }

    #[test]
    fn zero_max_age_never_hits() {
        let cache = ParameterCache::new(Clock::new_frozen());
        cache.insert(key("a"), text("1"));
        assert_eq!(cache.get(&key("a"), Duration::ZERO), None);
    }

    #[test]
    fn insert_replaces_and_restamps() {
        let control = ClockControl::new();
        let cache = ParameterCache::new(control.to_clock());

        cache.insert(key("a"), text("old"));
        control.advance(Duration::from_secs(4));
        cache.insert(key("a"), text("new"));
        control.advance(Duration::from_secs(4));

        assert_eq!(cache.get(&key("a"), Duration::from_secs(5)), Some(text("new")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let cache = ParameterCache::new(Clock::new_frozen());
        cache.insert(key("a"), text("1"));
        cache.insert(key("b"), text("2"));

        cache.clear();

        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get(&key("a"), Duration::from_secs(5)), None);
    }

    #[test]
    fn distinct_requests_do_not_collide() {
        let options = BackendOptions::new();
        let decrypted = BackendOptions::new().with("decrypt", true);
        let split = BackendOptions::new().with("a", 1).with("b", 2);
        let joined = BackendOptions::new().with("a=1;b", 2);
        let keys = [
            CacheKey::single("p", "/a", Transform::None, &split),
            CacheKey::single("p", "/a", Transform::None, &joined),
            CacheKey::single("p", "/a", Transform::None, &options),
            CacheKey::single("p", "/a", Transform::Json, &options),
            CacheKey::single("p", "/a", Transform::None, &decrypted),
            CacheKey::single("q", "/a", Transform::None, &options),
            CacheKey::multiple("p", "/a", Transform::None, false, &options),
            CacheKey::multiple("p", "/a", Transform::None, true, &options),
        ];

        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
