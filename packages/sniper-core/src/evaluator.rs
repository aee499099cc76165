//! The transition evaluator (spec.md §4.C6) -- the heart of the system.
//!
//! Factored as a pure function over a subscription, one tick's fetched
//! availability, and the price-verifier results the caller already
//! collected for this tick's candidates. No I/O, no clock reads beyond the
//! `now` parameter, so the whole transition table is property-testable.

use std::collections::HashMap;

use chrono::{DateTime, Duration};
use chrono_tz::Tz;

use crate::model::{
    status_key, ConfigDescriptor, EffectiveStatus, FetchedAvailability, ListedStatus, Subscription,
    TransitionRecord,
};

/// One `(datacenter, configuration)` pair needing a price-verifier call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub status_key: String,
    pub datacenter: String,
    pub config_key: Option<String>,
    pub options: Vec<String>,
}

/// Display-only price snapshot carried alongside a verifier outcome so the
/// notification formatter can show a price line without a second lookup
/// (spec.md §4.C7: "reused across the group").
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHint {
    pub with_tax: f64,
    pub currency: Option<String>,
}

/// Result of one price-verifier call (spec.md §4.C4).
#[derive(Debug, Clone)]
pub struct VerifierOutcome {
    pub orderable: bool,
    pub reason: Option<String>,
    pub price_hint: Option<PriceHint>,
}

/// Collects the `(dc, config)` pairs this subscription needs verified this
/// tick: every watched pair whose listed status is not `unavailable`.
///
/// `verify_legacy_available` resolves the Open Question in spec.md §9 over
/// whether the legacy simple shape should also go through price
/// verification when listed as available; it defaults to `false` (the
/// behavior actually observed in the source: legacy rows notify without a
/// second-stage price check).
#[must_use]
pub fn candidates(
    sub: &Subscription,
    fetched: &FetchedAvailability,
    verify_legacy_available: bool,
) -> Vec<Candidate> {
    let mut out = Vec::new();
    match fetched {
        FetchedAvailability::Simple(map) => {
            if !verify_legacy_available {
                return out;
            }
            for (dc, status) in map {
                if !sub.watches(dc) {
                    continue;
                }
                if ListedStatus::parse(status) == ListedStatus::Unavailable {
                    continue;
                }
                out.push(Candidate {
                    status_key: status_key(dc, None),
                    datacenter: dc.clone(),
                    config_key: None,
                    options: Vec::new(),
                });
            }
        }
        FetchedAvailability::Configured(rows) => {
            for (config_key, row) in rows {
                for (dc, status) in &row.datacenters {
                    if !sub.watches(dc) {
                        continue;
                    }
                    if ListedStatus::parse(status) == ListedStatus::Unavailable {
                        continue;
                    }
                    out.push(Candidate {
                        status_key: status_key(dc, Some(config_key)),
                        datacenter: dc.clone(),
                        config_key: Some(config_key.clone()),
                        options: row.options.clone(),
                    });
                }
            }
        }
    }
    out
}

/// One emitted transition, ready to be grouped and formatted by the
/// notification formatter.
#[derive(Debug, Clone)]
pub struct TransitionEmission {
    pub status_key: String,
    pub datacenter: String,
    pub config_key: Option<String>,
    pub descriptor: Option<ConfigDescriptor>,
    pub old_status: Option<EffectiveStatus>,
    pub new_status: EffectiveStatus,
    pub duration: Option<Duration>,
    pub verifier_reason: Option<String>,
    pub price_hint: Option<PriceHint>,
    pub detected_at: DateTime<Tz>,
}

/// An order intent to be dispatched `quantity` times, once per datacenter.
#[derive(Debug, Clone)]
pub struct OrderIntent {
    pub plan_code: String,
    pub datacenter: String,
    pub config_key: Option<String>,
    pub options: Vec<String>,
    pub quantity: u32,
}

/// Everything one subscription's tick produced.
#[derive(Debug, Clone, Default)]
pub struct EvaluationOutcome {
    pub last_status_updates: HashMap<String, EffectiveStatus>,
    pub history_additions: Vec<TransitionRecord>,
    pub emissions: Vec<TransitionEmission>,
    pub order_intents: Vec<OrderIntent>,
    pub skipped: bool,
}

impl EvaluationOutcome {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

struct Row {
    status_key: String,
    datacenter: String,
    config_key: Option<String>,
    descriptor: Option<ConfigDescriptor>,
    listed: ListedStatus,
}

fn collect_rows(sub: &Subscription, fetched: &FetchedAvailability) -> Vec<Row> {
    let mut out = Vec::new();
    match fetched {
        FetchedAvailability::Simple(map) => {
            for (dc, status) in map {
                if !sub.watches(dc) {
                    continue;
                }
                out.push(Row {
                    status_key: status_key(dc, None),
                    datacenter: dc.clone(),
                    config_key: None,
                    descriptor: None,
                    listed: ListedStatus::parse(status),
                });
            }
        }
        FetchedAvailability::Configured(rows) => {
            for (config_key, row) in rows {
                let descriptor = ConfigDescriptor::from_row(row);
                for (dc, status) in &row.datacenters {
                    if !sub.watches(dc) {
                        continue;
                    }
                    out.push(Row {
                        status_key: status_key(dc, Some(config_key)),
                        datacenter: dc.clone(),
                        config_key: Some(config_key.clone()),
                        descriptor: Some(descriptor.clone()),
                        listed: ListedStatus::parse(status),
                    });
                }
            }
        }
    }
    out
}

/// Pure transition-table lookup (spec.md §4.C6 step 7): whether a
/// `old -> new` effective-status change should be emitted, given this
/// subscription's notification policy.
#[must_use]
pub fn should_emit(
    old: Option<EffectiveStatus>,
    new: EffectiveStatus,
    notify_available: bool,
    notify_unavailable: bool,
) -> bool {
    use EffectiveStatus::{Available, PriceCheckFailed, Unavailable};
    match (old, new) {
        (_, Unavailable) if old != Some(Unavailable) => notify_unavailable,
        (_, Available) if old != Some(Available) => notify_available,
        (_, PriceCheckFailed) if old != Some(PriceCheckFailed) => notify_available,
        _ => false,
    }
}

/// Scans `history` backward (newest last, so iterate in reverse) for the
/// most recent entry matching `datacenter`, the same config display, and
/// one of `looking_for`'s change types (spec.md §4.C6 step 8).
#[must_use]
pub fn scan_duration(
    history: &[TransitionRecord],
    datacenter: &str,
    config_display: Option<&str>,
    looking_for: &[EffectiveStatus],
    now: DateTime<Tz>,
) -> Option<Duration> {
    history
        .iter()
        .rev()
        .find(|r| {
            r.datacenter == datacenter
                && r.config_display.as_deref() == config_display
                && looking_for.contains(&r.change_type)
        })
        .map(|r| now - r.timestamp)
}

/// Runs the full per-tick transition algorithm for one subscription.
///
/// `verifier_results` must contain an entry for every candidate returned by
/// [`candidates`] for this same `(sub, fetched)` pair; a missing entry is
/// treated as "verifier not consulted" (`PriceCheckFailed`, reason
/// `"not executed"`), which should not happen in a correctly wired caller.
#[must_use]
pub fn evaluate(
    sub: &Subscription,
    fetched: &FetchedAvailability,
    verifier_results: &HashMap<String, VerifierOutcome>,
    verify_legacy_available: bool,
    now: DateTime<Tz>,
) -> EvaluationOutcome {
    let rows = collect_rows(sub, fetched);
    if rows.is_empty() {
        return EvaluationOutcome::skipped();
    }

    let mut outcome = EvaluationOutcome::default();

    for row in rows {
        let old_status = sub.last_status.get(&row.status_key).copied();

        let (new_status, verifier_reason, price_hint) = match row.listed {
            ListedStatus::Unavailable => (EffectiveStatus::Unavailable, None, None),
            ListedStatus::Available => {
                let needs_verifier = row.config_key.is_some() || verify_legacy_available;
                if needs_verifier {
                    match verifier_results.get(&row.status_key) {
                        Some(result) if result.orderable => {
                            (EffectiveStatus::Available, None, result.price_hint.clone())
                        }
                        Some(result) => (
                            EffectiveStatus::PriceCheckFailed,
                            result.reason.clone(),
                            result.price_hint.clone(),
                        ),
                        None => (
                            EffectiveStatus::PriceCheckFailed,
                            Some("not executed".to_string()),
                            None,
                        ),
                    }
                } else {
                    (EffectiveStatus::Available, None, None)
                }
            }
        };

        outcome
            .last_status_updates
            .insert(row.status_key.clone(), new_status);

        if !should_emit(old_status, new_status, sub.notify_available, sub.notify_unavailable) {
            continue;
        }

        let config_display = row.descriptor.as_ref().map(|d| d.display.as_str());
        let duration = match new_status {
            EffectiveStatus::Available if old_status == Some(EffectiveStatus::Unavailable) => {
                scan_duration(
                    &sub.history,
                    &row.datacenter,
                    config_display,
                    &[EffectiveStatus::Unavailable, EffectiveStatus::PriceCheckFailed],
                    now,
                )
            }
            EffectiveStatus::Unavailable if old_status == Some(EffectiveStatus::Available) => {
                scan_duration(
                    &sub.history,
                    &row.datacenter,
                    config_display,
                    &[EffectiveStatus::Available],
                    now,
                )
            }
            _ => None,
        };

        outcome.history_additions.push(TransitionRecord {
            timestamp: now,
            datacenter: row.datacenter.clone(),
            status: new_status,
            change_type: new_status,
            old_status,
            config_display: config_display.map(str::to_string),
        });

        outcome.emissions.push(TransitionEmission {
            status_key: row.status_key.clone(),
            datacenter: row.datacenter.clone(),
            config_key: row.config_key.clone(),
            descriptor: row.descriptor.clone(),
            old_status,
            new_status,
            duration,
            verifier_reason,
            price_hint,
            detected_at: now,
        });

        let becomes_orderable = new_status == EffectiveStatus::Available
            && matches!(old_status, None | Some(EffectiveStatus::Unavailable));
        if becomes_orderable && sub.auto_order {
            outcome.order_intents.push(OrderIntent {
                plan_code: sub.plan_code.clone(),
                datacenter: row.datacenter.clone(),
                config_key: row.config_key.clone(),
                options: row
                    .descriptor
                    .as_ref()
                    .map(|d| d.options.clone())
                    .unwrap_or_default(),
                quantity: sub.quantity.unwrap_or(1),
            });
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::now_shanghai;
    use crate::model::{ConfigRow, SubscriptionSpec};
    use std::collections::HashMap as StdHashMap;

    fn sub(notify_available: bool, notify_unavailable: bool, auto_order: bool) -> Subscription {
        let mut spec = SubscriptionSpec::new("24ska01");
        spec.datacenters = vec!["gra".into()];
        spec.notify_available = notify_available;
        spec.notify_unavailable = notify_unavailable;
        spec.auto_order = auto_order;
        spec.quantity = 2;
        Subscription::new(spec)
    }

    fn configured_fetch(status: &str) -> FetchedAvailability {
        let mut dcs = StdHashMap::new();
        dcs.insert("gra".to_string(), status.to_string());
        let mut rows = StdHashMap::new();
        rows.insert(
            "24ska01.ram-32g.ssd-500".to_string(),
            ConfigRow {
                datacenters: dcs,
                memory: "32G".into(),
                storage: "500G SSD".into(),
                options: vec!["mem-32g".into(), "ssd-500".into()],
            },
        );
        FetchedAvailability::Configured(rows)
    }

    // -- Scenario 1: cold start, available + orderable --
    #[test]
    fn scenario_cold_start_available_orderable() {
        let subscription = sub(true, false, false);
        let fetched = configured_fetch("available");
        let mut verifier = StdHashMap::new();
        verifier.insert(
            "gra|24ska01.ram-32g.ssd-500".to_string(),
            VerifierOutcome { orderable: true, reason: None, price_hint: None },
        );

        let outcome = evaluate(&subscription, &fetched, &verifier, false, now_shanghai());

        assert_eq!(outcome.emissions.len(), 1);
        assert_eq!(outcome.emissions[0].new_status, EffectiveStatus::Available);
        assert_eq!(
            outcome.last_status_updates.get("gra|24ska01.ram-32g.ssd-500"),
            Some(&EffectiveStatus::Available)
        );
        assert_eq!(outcome.history_additions.len(), 1);
        assert!(outcome.order_intents.is_empty());
    }

    // -- Scenario 2: cold start, available but not orderable --
    #[test]
    fn scenario_cold_start_price_check_failed() {
        let subscription = sub(true, false, false);
        let fetched = configured_fetch("available");
        let mut verifier = StdHashMap::new();
        verifier.insert(
            "gra|24ska01.ram-32g.ssd-500".to_string(),
            VerifierOutcome { orderable: false, reason: Some("withTax=0".into()), price_hint: None },
        );

        let outcome = evaluate(&subscription, &fetched, &verifier, false, now_shanghai());

        assert_eq!(outcome.emissions.len(), 1);
        assert_eq!(outcome.emissions[0].new_status, EffectiveStatus::PriceCheckFailed);
        assert_eq!(outcome.emissions[0].verifier_reason.as_deref(), Some("withTax=0"));
        assert!(outcome.order_intents.is_empty());
    }

    // -- Scenario 3: auto-order triggers exactly once --
    #[test]
    fn scenario_auto_order_triggers_once_then_stays_quiet() {
        let subscription = sub(true, false, true);
        let fetched = configured_fetch("available");
        let mut verifier = StdHashMap::new();
        verifier.insert(
            "gra|24ska01.ram-32g.ssd-500".to_string(),
            VerifierOutcome { orderable: true, reason: None, price_hint: None },
        );
        let now = now_shanghai();

        let tick1 = evaluate(&subscription, &fetched, &verifier, false, now);
        assert_eq!(tick1.order_intents.len(), 1);
        assert_eq!(tick1.order_intents[0].quantity, 2);

        let mut subscription2 = subscription.clone();
        subscription2
            .last_status
            .extend(tick1.last_status_updates.clone());
        for record in tick1.history_additions.clone() {
            subscription2.push_history(record);
        }

        let tick2 = evaluate(&subscription2, &fetched, &verifier, false, now);
        assert!(tick2.emissions.is_empty());
        assert!(tick2.order_intents.is_empty());
    }

    // -- Scenario 4: recovery from price_check_failed does NOT order --
    #[test]
    fn scenario_recovery_from_price_check_failed_does_not_order() {
        let subscription = sub(true, false, true);
        let fetched = configured_fetch("available");

        let mut verifier_fail = StdHashMap::new();
        verifier_fail.insert(
            "gra|24ska01.ram-32g.ssd-500".to_string(),
            VerifierOutcome { orderable: false, reason: Some("no price".into()), price_hint: None },
        );
        let now = now_shanghai();
        let tick1 = evaluate(&subscription, &fetched, &verifier_fail, false, now);
        assert!(tick1.order_intents.is_empty());

        let mut subscription2 = subscription.clone();
        subscription2.last_status.extend(tick1.last_status_updates);
        for r in tick1.history_additions {
            subscription2.push_history(r);
        }

        let mut verifier_ok = StdHashMap::new();
        verifier_ok.insert(
            "gra|24ska01.ram-32g.ssd-500".to_string(),
            VerifierOutcome { orderable: true, reason: None, price_hint: None },
        );
        let tick2 = evaluate(&subscription2, &fetched, &verifier_ok, false, now);
        assert_eq!(tick2.emissions.len(), 1);
        assert_eq!(tick2.emissions[0].new_status, EffectiveStatus::Available);
        assert!(
            tick2.order_intents.is_empty(),
            "transition out of price_check_failed must never auto-order"
        );
    }

    // -- Scenario 5: unavailability reports uptime duration --
    #[test]
    fn scenario_unavailable_reports_uptime_duration() {
        let subscription = sub(true, true, false);
        let available_fetch = configured_fetch("available");
        let mut verifier = StdHashMap::new();
        verifier.insert(
            "gra|24ska01.ram-32g.ssd-500".to_string(),
            VerifierOutcome { orderable: true, reason: None, price_hint: None },
        );
        let t0 = now_shanghai();
        let tick1 = evaluate(&subscription, &available_fetch, &verifier, false, t0);

        let mut subscription2 = subscription.clone();
        subscription2.last_status.extend(tick1.last_status_updates);
        for r in tick1.history_additions {
            subscription2.push_history(r);
        }

        let unavailable_fetch = configured_fetch("unavailable");
        let t1 = t0 + Duration::minutes(5);
        let tick2 = evaluate(&subscription2, &unavailable_fetch, &StdHashMap::new(), false, t1);

        assert_eq!(tick2.emissions.len(), 1);
        assert_eq!(tick2.emissions[0].new_status, EffectiveStatus::Unavailable);
        assert_eq!(tick2.emissions[0].duration, Some(Duration::minutes(5)));
    }

    // -- No re-notification on stability --
    #[test]
    fn no_renotification_when_state_is_stable_across_ticks() {
        let subscription = sub(true, true, false);
        let fetched = configured_fetch("available");
        let mut verifier = StdHashMap::new();
        verifier.insert(
            "gra|24ska01.ram-32g.ssd-500".to_string(),
            VerifierOutcome { orderable: true, reason: None, price_hint: None },
        );
        let now = now_shanghai();
        let tick1 = evaluate(&subscription, &fetched, &verifier, false, now);

        let mut subscription2 = subscription.clone();
        subscription2.last_status.extend(tick1.last_status_updates);

        let tick2 = evaluate(&subscription2, &fetched, &verifier, false, now);
        assert!(tick2.emissions.is_empty());
    }

    // -- Callback-size adjacent invariant: options round-trip through the intent --
    #[test]
    fn order_intent_carries_the_configs_options() {
        let subscription = sub(true, false, true);
        let fetched = configured_fetch("available");
        let mut verifier = StdHashMap::new();
        verifier.insert(
            "gra|24ska01.ram-32g.ssd-500".to_string(),
            VerifierOutcome { orderable: true, reason: None, price_hint: None },
        );
        let outcome = evaluate(&subscription, &fetched, &verifier, false, now_shanghai());
        assert_eq!(
            outcome.order_intents[0].options,
            vec!["mem-32g".to_string(), "ssd-500".to_string()]
        );
    }

    #[test]
    fn empty_fetch_skips_without_mutation() {
        let subscription = sub(true, false, false);
        let fetched = FetchedAvailability::Configured(StdHashMap::new());
        let outcome = evaluate(&subscription, &fetched, &StdHashMap::new(), false, now_shanghai());
        assert!(outcome.skipped);
        assert!(outcome.last_status_updates.is_empty());
    }

    #[test]
    fn legacy_shape_does_not_consult_verifier_by_default() {
        let mut spec = SubscriptionSpec::new("legacy01");
        spec.notify_available = true;
        let subscription = Subscription::new(spec);
        let mut map = StdHashMap::new();
        map.insert("gra".to_string(), "available".to_string());
        let fetched = FetchedAvailability::Simple(map);

        let outcome = evaluate(&subscription, &fetched, &StdHashMap::new(), false, now_shanghai());
        assert_eq!(outcome.emissions.len(), 1);
        assert_eq!(outcome.emissions[0].new_status, EffectiveStatus::Available);
    }

    // -- Property: duration is always non-negative and matches the scan --
    proptest::proptest! {
        #[test]
        fn duration_is_never_negative(minutes in 0i64..10_000) {
            let history = vec![TransitionRecord {
                timestamp: now_shanghai(),
                datacenter: "gra".into(),
                status: EffectiveStatus::Available,
                change_type: EffectiveStatus::Available,
                old_status: None,
                config_display: None,
            }];
            let now = now_shanghai() + Duration::minutes(minutes);
            let found = scan_duration(&history, "gra", None, &[EffectiveStatus::Available], now);
            if let Some(d) = found {
                prop_assert!(d.num_seconds() >= 0);
            }
        }
    }

    // -- Property: should_emit matches the spec's transition table exactly --
    proptest::proptest! {
        #[test]
        fn should_emit_matches_transition_table(
            old_idx in 0usize..4,
            new_idx in 0usize..3,
            notify_available in proptest::bool::ANY,
            notify_unavailable in proptest::bool::ANY,
        ) {
            use EffectiveStatus::{Available, PriceCheckFailed, Unavailable};
            let old = [None, Some(Unavailable), Some(Available), Some(PriceCheckFailed)][old_idx];
            let new = [Unavailable, Available, PriceCheckFailed][new_idx];

            let expected = match (old, new) {
                (None, Unavailable) => notify_unavailable,
                (None, Available) => notify_available,
                (None, PriceCheckFailed) => notify_available,
                (Some(Unavailable), Unavailable) => false,
                (Some(Unavailable), Available) => notify_available,
                (Some(Unavailable), PriceCheckFailed) => notify_available,
                (Some(Available), Unavailable) => notify_unavailable,
                (Some(Available), Available) => false,
                (Some(Available), PriceCheckFailed) => notify_available,
                (Some(PriceCheckFailed), Unavailable) => notify_unavailable,
                (Some(PriceCheckFailed), Available) => notify_available,
                (Some(PriceCheckFailed), PriceCheckFailed) => false,
            };

            prop_assert_eq!(
                should_emit(old, new, notify_available, notify_unavailable),
                expected
            );
        }
    }
}
