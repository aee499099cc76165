//! The scheduler (spec.md §4.C9): a single long-lived loop with an
//! interruptible sleep and a bounded worker pool for per-subscription
//! fan-out, with a nested bounded pool for the price-verifier calls inside
//! one subscription's evaluation. Grounded on the teacher's `JoinSet`-based
//! fan-out idiom (seen across the pack, e.g.
//! `other_examples/8cdd7e4d_PostHog-posthog__rust-kafka-assigner-src-assigner.rs.rs`)
//! and on `server_monitor.py`'s own tick structure (sweep tokens, snapshot
//! subscriptions, submit to a worker pool, sleep with a 1 s-granularity stop
//! check).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use sniper_core::{
    candidates, evaluate, FetchAvailability, LogLevel, LogSink, SendNotification, Subscription,
    SubscriptionStore, TokenCache, TraceId, VerifierOutcome,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info_span, warn, Instrument};

use crate::config::EngineConfig;
use crate::dispatcher::{dispatch_all, OrderDispatcher};
use crate::notifier::notify_tick;
use crate::verifier::PriceVerifier;

/// Wires the injected dependencies (spec.md §6) to the scheduler loop.
pub struct Scheduler {
    config: EngineConfig,
    store: Arc<SubscriptionStore>,
    tokens: Arc<TokenCache>,
    fetcher: Arc<dyn FetchAvailability>,
    verifier: Arc<dyn PriceVerifier>,
    dispatcher: Arc<dyn OrderDispatcher>,
    sender: Arc<dyn SendNotification>,
    log: Arc<dyn LogSink>,
    running: AtomicBool,
    stop: AtomicBool,
}

impl Scheduler {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        store: Arc<SubscriptionStore>,
        tokens: Arc<TokenCache>,
        fetcher: Arc<dyn FetchAvailability>,
        verifier: Arc<dyn PriceVerifier>,
        dispatcher: Arc<dyn OrderDispatcher>,
        sender: Arc<dyn SendNotification>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            config,
            store,
            tokens,
            fetcher,
            verifier,
            dispatcher,
            sender,
            log,
            running: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SubscriptionStore> {
        &self.store
    }

    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// Starts the loop. Refuses a second start while one is already running
    /// (spec.md §4.C9: "idempotent-safe"). Takes an owned `Arc` so the
    /// spawned loop task can outlive the caller's stack frame; callers keep
    /// their own clone to call [`Scheduler::stop`] later.
    pub fn start(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return None;
        }
        self.stop.store(false, Ordering::SeqCst);
        Some(tokio::spawn(async move { self.run_loop().await }))
    }

    /// Requests the loop to exit. The caller is responsible for awaiting the
    /// join handle, with up to a 3 s grace period per spec.md §4.C9.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run_loop(self: Arc<Self>) {
        while !self.stop.load(Ordering::SeqCst) {
            Arc::clone(&self).tick().await;
            self.interruptible_sleep().await;
        }
        self.running.store(false, Ordering::SeqCst);
    }

    async fn interruptible_sleep(&self) {
        let total = Duration::from_secs(self.config.check_interval_secs);
        let step = Duration::from_secs(1);
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            if self.stop.load(Ordering::SeqCst) {
                return;
            }
            let remaining = total - elapsed;
            tokio::time::sleep(step.min(remaining)).await;
            elapsed += step;
        }
    }

    /// Runs one full tick: sweep, snapshot, bounded fan-out, logging. Takes
    /// an owned `Arc` (like [`Scheduler::start`]) so each spawned
    /// per-subscription worker can hold its own clone; callers invoking this
    /// directly (tests, a manual single-tick mode) pass `Arc::clone(&self)`.
    pub async fn tick(self: Arc<Self>) {
        let swept = self.tokens.sweep();
        if swept > 0 {
            self.log.log(
                LogLevel::Debug,
                &format!("swept {swept} expired token(s)"),
                "scheduler",
                None,
            );
        }

        let subs = self.store.snapshot();
        if subs.is_empty() {
            return;
        }

        let permits = self.config.max_subscription_workers.min(subs.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut tasks = JoinSet::new();

        for sub in subs {
            let plan_code = sub.plan_code.clone();
            if !self.store.contains(&plan_code) {
                continue;
            }
            let permit = Arc::clone(&semaphore);
            let me = Arc::clone(&self);
            tasks.spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore never closed");
                me.evaluate_subscription(sub).await;
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(err) = result {
                warn!(error = %err, "subscription worker panicked");
            }
        }
    }

    async fn evaluate_subscription(&self, sub: Subscription) {
        let sub_trace = TraceId::new();
        let span = info_span!("subscription_tick", plan_code = %sub.plan_code, trace_id = %sub_trace);
        async move {
            let Some(fetched) = self.fetcher.fetch(&sub.plan_code).await else {
                self.log.log(
                    LogLevel::Warning,
                    &format!("fetch failed for {}", sub.plan_code),
                    "scheduler",
                    Some(sub_trace),
                );
                return;
            };

            let candidate_list = candidates(&sub, &fetched, self.config.verify_legacy_available);
            let verifier = self.verifier.as_ref();
            let plan = sub.plan_code.as_str();
            let verifier_results: HashMap<String, VerifierOutcome> = stream::iter(candidate_list)
                .map(|candidate| async move {
                    let outcome = verifier
                        .verify(plan, &candidate.datacenter, &candidate.options)
                        .await;
                    (candidate.status_key, outcome)
                })
                .buffer_unordered(self.config.max_verifier_workers.max(1))
                .collect()
                .await;

            let now = sniper_core::now_shanghai();
            let outcome = evaluate(
                &sub,
                &fetched,
                &verifier_results,
                self.config.verify_legacy_available,
                now,
            );

            if outcome.skipped {
                return;
            }

            self.store.apply_evaluation(
                &sub.plan_code,
                outcome.last_status_updates,
                outcome.history_additions,
            );

            if !outcome.emissions.is_empty() {
                notify_tick(
                    self.sender.as_ref(),
                    self.log.as_ref(),
                    &self.tokens,
                    &sub,
                    &outcome.emissions,
                    sub_trace,
                    now,
                )
                .await;
            }

            if !outcome.order_intents.is_empty() {
                let (succeeded, failed) =
                    dispatch_all(self.dispatcher.as_ref(), &outcome.order_intents).await;
                self.log.log(
                    LogLevel::Info,
                    &format!(
                        "auto-order for {}: {succeeded} succeeded, {failed} failed",
                        sub.plan_code
                    ),
                    "scheduler",
                    Some(sub_trace),
                );
            }
        }
        .instrument(span)
        .await;
    }
}
