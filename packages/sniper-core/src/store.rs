//! In-memory subscription store. Guards its map with a `parking_lot::RwLock`
//! the same way `cluster::failure_detector` guards per-node heartbeat state
//! -- short critical sections, no lock held across an await point.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::model::{Subscription, SubscriptionSpec};

/// Thread-safe set of subscriptions keyed by `planCode`.
///
/// The scheduler must never iterate the live collection: [`snapshot`] hands
/// back an owned copy so fan-out workers can run free of the store's lock,
/// and [`contains`] lets a worker re-check membership before mutating a
/// subscription that might have been removed since the snapshot was taken.
pub struct SubscriptionStore {
    inner: RwLock<HashMap<String, Subscription>>,
}

impl SubscriptionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a new subscription, or updates an existing one's policy
    /// fields in place -- `last_status` and `history` survive updates.
    pub fn add(&self, spec: SubscriptionSpec) {
        let mut guard = self.inner.write();
        match guard.get_mut(&spec.plan_code) {
            Some(existing) => existing.apply_update(spec),
            None => {
                let sub = Subscription::new(spec);
                guard.insert(sub.plan_code.clone(), sub);
            }
        }
    }

    /// Removes a subscription by plan code. Returns whether it existed.
    pub fn remove(&self, plan_code: &str) -> bool {
        self.inner.write().remove(plan_code).is_some()
    }

    /// Removes every subscription, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut guard = self.inner.write();
        let n = guard.len();
        guard.clear();
        n
    }

    /// Returns a consistent, owned copy of every subscription for one
    /// tick's fan-out.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.inner.read().values().cloned().collect()
    }

    #[must_use]
    pub fn contains(&self, plan_code: &str) -> bool {
        self.inner.read().contains_key(plan_code)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Writes back a worker's evaluation results (`last_status` updates and
    /// appended history) for one subscription, if it still exists.
    pub fn apply_evaluation(
        &self,
        plan_code: &str,
        last_status_updates: HashMap<String, crate::model::EffectiveStatus>,
        new_history: Vec<crate::model::TransitionRecord>,
    ) {
        let mut guard = self.inner.write();
        if let Some(sub) = guard.get_mut(plan_code) {
            sub.last_status.extend(last_status_updates);
            for record in new_history {
                sub.push_history(record);
            }
        }
    }
}

impl Default for SubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}
