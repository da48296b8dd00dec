use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::DEFAULT_CACHE_TTL_SECS;

pub const TTL_SEASON_METRICS: Duration = Duration::from_secs(60 * 30);
pub const TTL_PAIRWISE: Duration = Duration::from_secs(60 * 20);

/// Entry count above which an insert first drops every stale entry.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    stored_at: u64,
    ttl_secs: u64,
}

impl CacheEntry {
    fn is_fresh(&self, now: u64) -> bool {
        now.saturating_sub(self.stored_at) < self.ttl_secs
    }
}

/// In-process JSON response cache with a TTL per entry. Expiry is checked on
/// read; stale entries are dropped when they are next looked up.
#[derive(Debug)]
pub struct ResponseCache {
    default_ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CACHE_TTL_SECS))
    }
}

impl ResponseCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = now_secs();
        let Ok(mut guard) = self.entries.lock() else {
            warn!("response cache lock poisoned");
            return None;
        };
        let entry = guard.get(key)?;
        if !entry.is_fresh(now) {
            guard.remove(key);
            debug!(key, "cache expired");
            return None;
        }
        match serde_json::from_str::<T>(&entry.body) {
            Ok(value) => {
                debug!(key, "cache hit");
                Some(value)
            }
            Err(_) => None,
        }
    }

    pub fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let Ok(body) = serde_json::to_string(value) else {
            return;
        };
        let now = now_secs();
        let entry = CacheEntry {
            body,
            stored_at: now,
            ttl_secs: ttl.unwrap_or(self.default_ttl).as_secs(),
        };
        let Ok(mut guard) = self.entries.lock() else {
            warn!("response cache lock poisoned");
            return;
        };
        if guard.len() >= SWEEP_THRESHOLD {
            let before = guard.len();
            guard.retain(|_, e| e.is_fresh(now));
            debug!(dropped = before - guard.len(), "cache swept");
        }
        guard.insert(key.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|g| g.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Join the present parts with `:`.
pub fn cache_key<S: AsRef<str>>(parts: &[Option<S>]) -> String {
    parts
        .iter()
        .filter_map(|p| p.as_ref().map(|s| s.as_ref()))
        .collect::<Vec<_>>()
        .join(":")
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        season: String,
        score: f64,
    }

    #[test]
    fn key_skips_absent_parts() {
        assert_eq!(
            cache_key(&[Some("players"), None, Some("comps"), Some("NBA_2025")]),
            "players:comps:NBA_2025"
        );
        assert_eq!(cache_key::<&str>(&[None, None]), "");
        assert_eq!(cache_key(&[Some(""), Some("x")]), ":x");
    }

    #[test]
    fn round_trips_within_ttl() {
        let cache = ResponseCache::default();
        let value = Payload {
            season: "NBA_2025".to_string(),
            score: 0.9871,
        };
        cache.put_json("k", &value, Some(TTL_SEASON_METRICS));
        assert_eq!(cache.get_json::<Payload>("k"), Some(value));
        assert!(cache.get_json::<Payload>("other").is_none());
    }

    #[test]
    fn zero_ttl_entry_is_already_stale() {
        let cache = ResponseCache::default();
        cache.put_json("k", &1u32, Some(Duration::ZERO));
        assert_eq!(cache.len(), 1);
        assert!(cache.get_json::<u32>("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn stale_keys_never_read_again_are_swept_on_insert() {
        let cache = ResponseCache::default();
        for i in 0..SWEEP_THRESHOLD * 3 {
            cache.put_json(&format!("stale:{i}"), &i, Some(Duration::ZERO));
        }
        assert!(cache.len() <= SWEEP_THRESHOLD, "len {}", cache.len());

        cache.put_json("fresh", &7u32, Some(TTL_SEASON_METRICS));
        for i in 0..SWEEP_THRESHOLD {
            cache.put_json(&format!("again:{i}"), &i, Some(Duration::ZERO));
        }
        assert_eq!(cache.get_json::<u32>("fresh"), Some(7));
    }

    #[test]
    fn undecodable_entry_is_a_miss() {
        let cache = ResponseCache::default();
        cache.put_json("k", &"text", None);
        assert!(cache.get_json::<Payload>("k").is_none());
    }
}
