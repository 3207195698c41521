use crate::{
    Error,
    Result,
    balance::BalanceStore,
    cache::ActivityStatusCache,
    kinds::{
        ActionKind,
        ActivityKind,
    },
    status::StatusPatch,
};
use chrono::{
    DateTime,
    Utc,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};

/// A submitted action waiting for the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub started_at: DateTime<Utc>,
    pub optimistic_delta: i64,
    pub request_id: String,
    pub resolved: bool,
}

impl PendingAction {
    pub fn activity(&self) -> ActivityKind {
        self.kind.activity()
    }
}

#[derive(Clone, Debug)]
enum Slot {
    InFlight(PendingAction),
    /// Resolved successfully, but a deferred reveal still owns the control.
    Presenting,
}

/// The only place allowed to create [`PendingAction`]s.
///
/// Each activity has one slot; a submit while the slot is taken is rejected
/// rather than queued.
#[derive(Clone)]
pub struct MutationEngine {
    slots: Arc<Mutex<HashMap<ActivityKind, Slot>>>,
    balance: BalanceStore,
    cache: ActivityStatusCache,
}

impl MutationEngine {
    pub fn new(balance: BalanceStore, cache: ActivityStatusCache) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            balance,
            cache,
        }
    }

    /// Applies `-cost` and `patch` optimistically and records the action as
    /// in flight.
    pub fn submit(
        &self,
        kind: ActionKind,
        cost: u64,
        patch: StatusPatch,
    ) -> Result<PendingAction> {
        let activity = kind.activity();
        let mut slots = self.lock();
        if slots.contains_key(&activity) {
            return Err(Error::AlreadyPending(activity));
        }

        if kind.requires_eligibility() {
            let status = self.cache.get(activity).ok_or_else(|| Error::NotEligible {
                kind: activity,
                reason: "status not loaded yet".to_string(),
            })?;
            if !status.can_play {
                let available = self.balance.get();
                if available < cost {
                    return Err(Error::InsufficientFunds {
                        needed: cost,
                        available,
                    });
                }
                let reason = status
                    .blocker(available)
                    .unwrap_or_else(|| "not playable".to_string());
                return Err(Error::NotEligible {
                    kind: activity,
                    reason,
                });
            }
        }

        let delta = -i64::try_from(cost).unwrap_or(i64::MAX);
        let pending = PendingAction {
            kind,
            started_at: Utc::now(),
            optimistic_delta: delta,
            request_id: new_request_id(),
            resolved: false,
        };
        slots.insert(activity, Slot::InFlight(pending.clone()));
        self.balance.apply_optimistic_delta(delta);
        if !patch.is_empty() {
            self.cache.apply_optimistic(activity, patch);
        }
        tracing::debug!(%kind, cost, request_id = %pending.request_id, "action submitted");
        Ok(pending)
    }

    pub fn pending(&self, activity: ActivityKind) -> Option<PendingAction> {
        match self.lock().get(&activity) {
            Some(Slot::InFlight(pending)) => Some(pending.clone()),
            _ => None,
        }
    }

    /// True while an action is in flight or its reveal is still running.
    pub fn is_busy(&self, activity: ActivityKind) -> bool {
        self.lock().contains_key(&activity)
    }

    /// Frees the slot held by `pending`. With `hold` the slot stays occupied
    /// until [`Self::release`] is called.
    pub(crate) fn resolve(&self, pending: &PendingAction, hold: bool) -> PendingAction {
        let activity = pending.activity();
        let mut slots = self.lock();
        match slots.get(&activity) {
            Some(Slot::InFlight(current)) if current.request_id == pending.request_id => {
                if hold {
                    slots.insert(activity, Slot::Presenting);
                } else {
                    slots.remove(&activity);
                }
            }
            _ => {
                tracing::warn!(
                    kind = %pending.kind,
                    request_id = %pending.request_id,
                    "resolving an action that no longer owns its slot"
                );
            }
        }
        PendingAction {
            resolved: true,
            ..pending.clone()
        }
    }

    pub(crate) fn release(&self, activity: ActivityKind) {
        let mut slots = self.lock();
        if matches!(slots.get(&activity), Some(Slot::Presenting)) {
            slots.remove(&activity);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ActivityKind, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn new_request_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}
