//! In-memory TTL cache for provider responses.
//!
//! Expired entries are kept so that a failed refresh can still serve the last
//! good response, marked stale.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// How current a value handed out by [`TtlCache::get_or_fetch`] is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Freshness {
    /// Fetched during this call
    Live,
    /// Served from cache within its TTL
    Fresh { age_secs: u64 },
    /// Served from an expired entry because the refresh failed
    Stale { age_secs: u64, reason: String },
}

impl Freshness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::Stale { .. })
    }

    /// Freshness of a value built from two cached inputs: the least current
    /// input decides.
    pub fn combine(self, other: Freshness) -> Freshness {
        use Freshness::{Fresh, Live, Stale};
        match (self, other) {
            (Stale { age_secs, reason }, Stale { age_secs: other_age, .. })
                if age_secs >= other_age =>
            {
                Stale { age_secs, reason }
            }
            (Stale { .. }, stale @ Stale { .. }) => stale,
            (stale @ Stale { .. }, _) | (_, stale @ Stale { .. }) => stale,
            (Fresh { age_secs: a }, Fresh { age_secs: b }) => Fresh {
                age_secs: a.max(b),
            },
            (fresh @ Fresh { .. }, Live) | (Live, fresh @ Fresh { .. }) => fresh,
            (Live, Live) => Live,
        }
    }
}

/// A value together with its freshness.
#[derive(Debug, Clone, Serialize)]
pub struct Cached<V> {
    pub value: V,
    pub freshness: Freshness,
}

impl<V> Cached<V> {
    pub fn live(value: V) -> Self {
        Self {
            value,
            freshness: Freshness::Live,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(V) -> U) -> Cached<U> {
        Cached {
            value: f(self.value),
            freshness: self.freshness,
        }
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    name: &'static str,
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    /// `name` only shows up in logs.
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// TTL given in minutes, as the config files state it. Saturates rather
    /// than overflowing for absurdly large values.
    pub fn with_ttl_minutes(name: &'static str, minutes: u64) -> Self {
        Self::new(name, Duration::from_secs(minutes.saturating_mul(60)))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Value for `key` if it is younger than the TTL.
    pub fn get_fresh(&self, key: &K) -> Option<(V, Duration)> {
        self.get_fresh_at(key, Instant::now())
    }

    pub fn get_fresh_at(&self, key: &K, now: Instant) -> Option<(V, Duration)> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        let age = now.saturating_duration_since(entry.stored_at);
        (age < self.ttl).then(|| (entry.value.clone(), age))
    }

    /// Value for `key` regardless of age.
    pub fn get_any(&self, key: &K) -> Option<(V, Duration)> {
        self.get_any_at(key, Instant::now())
    }

    pub fn get_any_at(&self, key: &K, now: Instant) -> Option<(V, Duration)> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .map(|e| (e.value.clone(), now.saturating_duration_since(e.stored_at)))
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn insert_at(&self, key: K, value: V, stored_at: Instant) {
        self.entries.lock().insert(key, Entry { value, stored_at });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Serve `key` from cache, or run `fetch` and cache its result.
    ///
    /// When `fetch` fails and an expired entry exists, that entry is returned
    /// as [`Freshness::Stale`] instead of the error.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<Cached<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Display,
    {
        if let Some((value, age)) = self.get_fresh(&key) {
            tracing::debug!("{} cache hit for {:?} (age {:?})", self.name, key, age);
            return Ok(Cached {
                value,
                freshness: Freshness::Fresh {
                    age_secs: age.as_secs(),
                },
            });
        }

        match fetch().await {
            Ok(value) => {
                self.insert(key, value.clone());
                Ok(Cached::live(value))
            }
            Err(e) => match self.get_any(&key) {
                Some((value, age)) => {
                    tracing::warn!(
                        "{} refresh for {:?} failed, serving data {}s old: {}",
                        self.name,
                        key,
                        age.as_secs(),
                        e
                    );
                    Ok(Cached {
                        value,
                        freshness: Freshness::Stale {
                            age_secs: age.as_secs(),
                            reason: e.to_string(),
                        },
                    })
                }
                None => Err(e),
            },
        }
    }
}
