//! TTL-bounded token -> order-intent cache (spec.md §4.C3).
//!
//! Backed by `dashmap` rather than a single mutex around a `HashMap`: insert,
//! lookup and sweep are independent per-shard operations and none of them
//! ever holds a lock across an `.await` point.

use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::model::TokenEntry;

/// Default token lifetime (spec.md §3: "Tokens live until accepted or until
/// the TTL (24 h) elapses").
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenLookupError {
    #[error("token not found or expired")]
    NotFound,
}

/// Token -> order-intent mapping with a sweep-on-tick eviction policy.
pub struct TokenCache {
    entries: DashMap<String, TokenEntry>,
    ttl: Duration,
}

impl TokenCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Mints a fresh opaque token for `entry` and stores it.
    #[must_use]
    pub fn insert(&self, entry: TokenEntry) -> String {
        let token = Uuid::new_v4().to_string();
        self.entries.insert(token.clone(), entry);
        token
    }

    /// Looks a token up without consuming it.
    pub fn lookup(&self, token: &str) -> Result<TokenEntry, TokenLookupError> {
        self.entries
            .get(token)
            .map(|r| r.value().clone())
            .ok_or(TokenLookupError::NotFound)
    }

    /// Evicts entries older than the configured TTL. Called once per
    /// scheduler tick, at the tick boundary.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            match (now - entry.timestamp).to_std() {
                Ok(age) => age <= ttl,
                Err(_) => true, // timestamp is in the future; keep it
            }
        });
        before - self.entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn entry_at(ts: chrono::DateTime<Utc>) -> TokenEntry {
        TokenEntry {
            plan_code: "24ska01".into(),
            datacenter: "gra".into(),
            options: vec!["mem-32g".into()],
            config_display: None,
            timestamp: ts,
        }
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let cache = TokenCache::default();
        let token = cache.insert(entry_at(Utc::now()));
        let entry = cache.lookup(&token).unwrap();
        assert_eq!(entry.plan_code, "24ska01");
        assert_eq!(entry.datacenter, "gra");
    }

    #[test]
    fn unknown_token_is_not_found() {
        let cache = TokenCache::default();
        assert_eq!(cache.lookup("nonexistent"), Err(TokenLookupError::NotFound));
    }

    #[test]
    fn sweep_evicts_entries_past_ttl() {
        let cache = TokenCache::new(Duration::from_secs(10));
        let stale = entry_at(Utc::now() - ChronoDuration::seconds(20));
        let fresh = entry_at(Utc::now());
        let stale_token = cache.insert(stale);
        let fresh_token = cache.insert(fresh);

        let evicted = cache.sweep();

        assert_eq!(evicted, 1);
        assert_eq!(cache.lookup(&stale_token), Err(TokenLookupError::NotFound));
        assert!(cache.lookup(&fresh_token).is_ok());
    }

    #[test]
    fn token_resolvable_until_exactly_ttl_then_not() {
        let cache = TokenCache::new(Duration::from_secs(100));
        let just_inside = entry_at(Utc::now() - ChronoDuration::seconds(99));
        let just_outside = entry_at(Utc::now() - ChronoDuration::seconds(101));
        let t_in = cache.insert(just_inside);
        let t_out = cache.insert(just_outside);

        cache.sweep();

        assert!(cache.lookup(&t_in).is_ok());
        assert_eq!(cache.lookup(&t_out), Err(TokenLookupError::NotFound));
    }
}
