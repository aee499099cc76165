//! Engine configuration, mirroring `ServerConfig`/`NetworkConfig`'s
//! `Default`-impl style in the teacher crate.

use std::time::Duration;

/// Tunables for one running engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Seconds between scheduler ticks. Read fresh at the top of each sleep
    /// so it can be live-reloaded (spec.md §4.C9).
    pub check_interval_secs: u64,
    /// Maximum number of subscriptions evaluated concurrently.
    pub max_subscription_workers: usize,
    /// Maximum number of price-verifier calls in flight per subscription.
    pub max_verifier_workers: usize,
    /// Deadline for one price-verifier call (spec.md §4.C4).
    pub price_deadline: Duration,
    /// Deadline for one order-dispatch call (spec.md §6).
    pub order_deadline: Duration,
    /// Token lifetime before the sweeper evicts it (spec.md §4.C3).
    pub token_ttl: Duration,
    /// Base URL of the internal API gateway (spec.md §6).
    pub api_base_url: String,
    /// `X-API-Key` header value for order dispatch.
    pub api_key: String,
    /// Resolves the Open Question of spec.md §9: whether the legacy
    /// simple shape should also run a second-stage price check when
    /// listed as available.
    pub verify_legacy_available: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 5,
            max_subscription_workers: 4,
            max_verifier_workers: 10,
            price_deadline: Duration::from_secs(30),
            order_deadline: Duration::from_secs(30),
            token_ttl: Duration::from_secs(24 * 3600),
            api_base_url: "http://127.0.0.1:8080".to_string(),
            api_key: String::new(),
            verify_legacy_available: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.check_interval_secs, 5);
        assert_eq!(cfg.max_subscription_workers, 4);
        assert_eq!(cfg.max_verifier_workers, 10);
        assert_eq!(cfg.price_deadline, Duration::from_secs(30));
        assert_eq!(cfg.token_ttl, Duration::from_secs(24 * 3600));
        assert!(!cfg.verify_legacy_available);
    }
}
