//! Data model: subscriptions, fetched availability shapes, effective status,
//! transition history, and cached order-intent tokens.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::clock::now_shanghai;

/// Raw listed status for one `(datacenter, configuration)` pair as returned
/// by the catalog fetcher. Anything other than the literal `"unavailable"`
/// string is treated as a candidate for price verification, matching the
/// monitored catalog's own convention (it reports several "has stock"-ish
/// strings, never just one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListedStatus {
    Available,
    Unavailable,
}

impl ListedStatus {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw == "unavailable" {
            ListedStatus::Unavailable
        } else {
            ListedStatus::Available
        }
    }
}

/// Effective status after price verification has spoken. `lastStatus` never
/// stores a raw "listed but unverified" value -- only this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveStatus {
    Available,
    Unavailable,
    PriceCheckFailed,
}

impl EffectiveStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EffectiveStatus::Available => "available",
            EffectiveStatus::Unavailable => "unavailable",
            EffectiveStatus::PriceCheckFailed => "price_check_failed",
        }
    }
}

/// One orderable variant of a plan, as fetched for one tick.
#[derive(Debug, Clone)]
pub struct ConfigRow {
    /// Raw listed status per datacenter code.
    pub datacenters: HashMap<String, String>,
    pub memory: String,
    pub storage: String,
    pub options: Vec<String>,
}

/// Transient per-tick descriptor used for notification text and duration
/// matching. `display` is derived from memory/storage when the catalog
/// fetcher doesn't supply one directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDescriptor {
    pub memory: String,
    pub storage: String,
    pub display: String,
    pub options: Vec<String>,
}

impl ConfigDescriptor {
    #[must_use]
    pub fn from_row(row: &ConfigRow) -> Self {
        Self {
            memory: row.memory.clone(),
            storage: row.storage.clone(),
            display: format!("{} / {}", row.memory, row.storage),
            options: row.options.clone(),
        }
    }
}

/// The fetched availability shape is duck-typed upstream (a plain
/// `dc -> status` map for legacy plans, or a `configKey -> row` map for
/// configured plans); modeled here as a tagged variant at the fetch
/// boundary instead of re-discovering the shape on every access.
#[derive(Debug, Clone)]
pub enum FetchedAvailability {
    Simple(HashMap<String, String>),
    Configured(HashMap<String, ConfigRow>),
}

/// Unique key for the `lastStatus` map: the datacenter code alone for
/// legacy rows, or `"<datacenter>|<configKey>"` for configured rows.
#[must_use]
pub fn status_key(datacenter: &str, config_key: Option<&str>) -> String {
    match config_key {
        Some(key) => format!("{datacenter}|{key}"),
        None => datacenter.to_string(),
    }
}

/// One entry in a subscription's bounded transition history.
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub timestamp: DateTime<Tz>,
    pub datacenter: String,
    pub status: EffectiveStatus,
    pub change_type: EffectiveStatus,
    pub old_status: Option<EffectiveStatus>,
    pub config_display: Option<String>,
}

pub const MAX_HISTORY: usize = 100;

/// Input used to create or update a subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionSpec {
    pub plan_code: String,
    pub datacenters: Vec<String>,
    pub notify_available: bool,
    pub notify_unavailable: bool,
    pub auto_order: bool,
    pub quantity: u32,
    pub server_name: Option<String>,
}

impl SubscriptionSpec {
    #[must_use]
    pub fn new(plan_code: impl Into<String>) -> Self {
        Self {
            plan_code: plan_code.into(),
            datacenters: Vec::new(),
            notify_available: true,
            notify_unavailable: false,
            auto_order: false,
            quantity: 1,
            server_name: None,
        }
    }
}

/// A standing interest in a specific plan, optionally narrowed to
/// datacenters, with notification and auto-order policy.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub plan_code: String,
    pub datacenters: Vec<String>,
    pub notify_available: bool,
    pub notify_unavailable: bool,
    pub auto_order: bool,
    pub quantity: Option<u32>,
    pub server_name: Option<String>,
    pub last_status: HashMap<String, EffectiveStatus>,
    pub history: Vec<TransitionRecord>,
    pub created_at: DateTime<Tz>,
}

impl Subscription {
    #[must_use]
    pub fn new(spec: SubscriptionSpec) -> Self {
        let quantity = if spec.auto_order {
            Some(spec.quantity.max(1))
        } else {
            None
        };
        Self {
            plan_code: spec.plan_code,
            datacenters: spec.datacenters,
            notify_available: spec.notify_available,
            notify_unavailable: spec.notify_unavailable,
            auto_order: spec.auto_order,
            quantity,
            server_name: spec.server_name,
            last_status: HashMap::new(),
            history: Vec::new(),
            created_at: now_shanghai(),
        }
    }

    /// Applies an update spec in place. Never resets `last_status` or
    /// `history` -- that would re-trigger notifications for state the
    /// subscriber has already seen.
    pub fn apply_update(&mut self, spec: SubscriptionSpec) {
        self.datacenters = spec.datacenters;
        self.notify_available = spec.notify_available;
        self.notify_unavailable = spec.notify_unavailable;
        self.auto_order = spec.auto_order;
        self.quantity = if spec.auto_order {
            Some(spec.quantity.max(1))
        } else {
            None
        };
        self.server_name = spec.server_name;
    }

    /// Returns `true` if `datacenter` is within the watch set (an empty
    /// watch set means "watch everything that appears").
    #[must_use]
    pub fn watches(&self, datacenter: &str) -> bool {
        self.datacenters.is_empty() || self.datacenters.iter().any(|d| d == datacenter)
    }

    /// Appends one transition record and trims history to [`MAX_HISTORY`].
    pub fn push_history(&mut self, record: TransitionRecord) {
        self.history.push(record);
        let len = self.history.len();
        if len > MAX_HISTORY {
            self.history.drain(0..len - MAX_HISTORY);
        }
    }
}

/// Stored order intent behind an opaque callback token.
#[derive(Debug, Clone)]
pub struct TokenEntry {
    pub plan_code: String,
    pub datacenter: String,
    pub options: Vec<String>,
    pub config_display: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_status_parses_unavailable_literal() {
        assert_eq!(ListedStatus::parse("unavailable"), ListedStatus::Unavailable);
        assert_eq!(ListedStatus::parse("available"), ListedStatus::Available);
        assert_eq!(ListedStatus::parse("low_stock"), ListedStatus::Available);
    }

    #[test]
    fn status_key_legacy_vs_configured() {
        assert_eq!(status_key("gra", None), "gra");
        assert_eq!(
            status_key("gra", Some("24ska01.ram-32g.ssd-500")),
            "gra|24ska01.ram-32g.ssd-500"
        );
    }

    #[test]
    fn update_preserves_last_status_and_history() {
        let mut sub = Subscription::new(SubscriptionSpec::new("24ska01"));
        sub.last_status.insert("gra".into(), EffectiveStatus::Available);
        sub.push_history(TransitionRecord {
            timestamp: now_shanghai(),
            datacenter: "gra".into(),
            status: EffectiveStatus::Available,
            change_type: EffectiveStatus::Available,
            old_status: None,
            config_display: None,
        });

        let mut update = SubscriptionSpec::new("24ska01");
        update.notify_unavailable = true;
        update.auto_order = true;
        update.quantity = 3;
        sub.apply_update(update);

        assert_eq!(sub.last_status.get("gra"), Some(&EffectiveStatus::Available));
        assert_eq!(sub.history.len(), 1);
        assert_eq!(sub.quantity, Some(3));
        assert!(sub.notify_unavailable);
    }

    #[test]
    fn toggling_auto_order_off_drops_quantity() {
        let mut spec = SubscriptionSpec::new("24ska01");
        spec.auto_order = true;
        spec.quantity = 5;
        let mut sub = Subscription::new(spec);
        assert_eq!(sub.quantity, Some(5));

        let off = SubscriptionSpec::new("24ska01");
        sub.apply_update(off);
        assert_eq!(sub.quantity, None);
    }

    #[test]
    fn history_trims_to_max_size() {
        let mut sub = Subscription::new(SubscriptionSpec::new("p"));
        for _ in 0..(MAX_HISTORY + 20) {
            sub.push_history(TransitionRecord {
                timestamp: now_shanghai(),
                datacenter: "gra".into(),
                status: EffectiveStatus::Available,
                change_type: EffectiveStatus::Available,
                old_status: None,
                config_display: None,
            });
        }
        assert_eq!(sub.history.len(), MAX_HISTORY);
    }

    #[test]
    fn watches_empty_set_matches_everything() {
        let sub = Subscription::new(SubscriptionSpec::new("p"));
        assert!(sub.watches("gra"));
        assert!(sub.watches("bhs"));
    }

    #[test]
    fn watches_nonempty_set_is_exclusive() {
        let mut spec = SubscriptionSpec::new("p");
        spec.datacenters = vec!["gra".into()];
        let sub = Subscription::new(spec);
        assert!(sub.watches("gra"));
        assert!(!sub.watches("bhs"));
    }
}
