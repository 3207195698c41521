use crate::{
    Error,
    ErrorClass,
    balance::BalanceStore,
    cache::ActivityStatusCache,
    engine::{
        MutationEngine,
        PendingAction,
    },
    kinds::ActionKind,
    outcome::ActionOutcome,
    status::ActivityStatus,
};

/// What to do with the cached status once an action resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusDecision {
    /// Overwrite with status derived from the server response.
    Replace(ActivityStatus),
    /// Keep the optimistic patch visible but flag it stale until a refresh
    /// lands; the cache was already wrong before the action was attempted.
    KeepStale,
    /// Fall back to the last server truth.
    RestoreConfirmed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPolicy {
    None,
    /// Refresh if the session is configured to, result ignored on failure.
    BestEffort,
    /// Always refresh; the cache is known stale.
    Forced,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub status: StatusDecision,
    pub refresh: RefreshPolicy,
}

/// Decides the next cached status from the last confirmed status and the
/// action's result. Pure, so every branch is testable without a session.
pub fn plan(
    action: ActionKind,
    confirmed: Option<&ActivityStatus>,
    result: Result<&ActionOutcome, ErrorClass>,
) -> ReconcilePlan {
    match result {
        Ok(outcome) => {
            let Some(confirmed) = confirmed else {
                return ReconcilePlan {
                    status: StatusDecision::RestoreConfirmed,
                    refresh: RefreshPolicy::Forced,
                };
            };
            ReconcilePlan {
                status: StatusDecision::Replace(derive_status(action, confirmed, outcome)),
                refresh: RefreshPolicy::BestEffort,
            }
        }
        Err(ErrorClass::Validation) | Err(ErrorClass::Conflict) => ReconcilePlan {
            status: StatusDecision::KeepStale,
            refresh: RefreshPolicy::Forced,
        },
        Err(ErrorClass::Transient) => ReconcilePlan {
            status: StatusDecision::RestoreConfirmed,
            refresh: RefreshPolicy::BestEffort,
        },
        Err(ErrorClass::Local) => ReconcilePlan {
            status: StatusDecision::RestoreConfirmed,
            refresh: RefreshPolicy::None,
        },
    }
}

/// Server-reported fields win; missing ones are predicted from the status the
/// action was submitted against.
pub fn derive_status(
    action: ActionKind,
    confirmed: &ActivityStatus,
    outcome: &ActionOutcome,
) -> ActivityStatus {
    let mut status = confirmed.clone();
    status.today_count = outcome.today_count.unwrap_or_else(|| {
        if action.counts_toward_daily_limit() {
            confirmed.today_count.saturating_add(1)
        } else {
            confirmed.today_count
        }
    });
    status.stock = match (outcome.stock, confirmed.stock) {
        (Some(stock), _) => Some(stock),
        (None, Some(stock)) if action.consumes_stock() => Some(stock.saturating_sub(1)),
        (None, stock) => stock,
    };
    status
}

/// Resolves pending actions against the server outcome.
#[derive(Clone)]
pub struct ReconciliationController {
    balance: BalanceStore,
    cache: ActivityStatusCache,
    engine: MutationEngine,
}

impl ReconciliationController {
    pub fn new(
        balance: BalanceStore,
        cache: ActivityStatusCache,
        engine: MutationEngine,
    ) -> Self {
        Self {
            balance,
            cache,
            engine,
        }
    }

    /// Writes the server outcome and frees the slot (or moves it into the
    /// presenting state with `hold`). Returns the refresh the caller owes.
    pub fn on_success(
        &self,
        pending: &PendingAction,
        outcome: &ActionOutcome,
        hold: bool,
    ) -> RefreshPolicy {
        let activity = pending.activity();
        match outcome.remaining_balance {
            Some(balance) => self.balance.settle(pending.optimistic_delta, balance),
            None => self.balance.commit_optimistic_delta(pending.optimistic_delta),
        }
        let confirmed = self.cache.confirmed(activity);
        let plan = plan(pending.kind, confirmed.as_ref(), Ok(outcome));
        self.apply(pending, &plan);
        self.engine.resolve(pending, hold);
        tracing::info!(
            kind = %pending.kind,
            request_id = %pending.request_id,
            balance = self.balance.get(),
            "action confirmed"
        );
        plan.refresh
    }

    /// Reverts the optimistic debit and frees the slot. Returns the refresh
    /// the caller owes.
    pub fn on_failure(&self, pending: &PendingAction, error: &Error) -> RefreshPolicy {
        self.balance.revert_optimistic_delta(pending.optimistic_delta);
        let class = error.class();
        let confirmed = self.cache.confirmed(pending.activity());
        let plan = plan(pending.kind, confirmed.as_ref(), Err(class));
        self.apply(pending, &plan);
        self.engine.resolve(pending, false);
        tracing::warn!(
            kind = %pending.kind,
            request_id = %pending.request_id,
            ?class,
            %error,
            "action failed; optimistic debit reverted"
        );
        plan.refresh
    }

    fn apply(&self, pending: &PendingAction, plan: &ReconcilePlan) {
        let activity = pending.activity();
        match &plan.status {
            StatusDecision::Replace(status) => self.cache.reconcile(activity, status.clone()),
            StatusDecision::KeepStale => self.cache.mark_stale(activity),
            StatusDecision::RestoreConfirmed => self.cache.discard_optimistic(activity),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        kinds::ActivityKind,
        outcome::Reward,
        status::StatusPatch,
    };

    fn prize() -> Reward {
        Reward::Prize {
            name: "Sticker".into(),
            prize_type: "ITEM".into(),
            value: None,
            is_rare: false,
        }
    }

    struct Harness {
        balance: BalanceStore,
        cache: ActivityStatusCache,
        engine: MutationEngine,
        controller: ReconciliationController,
    }

    fn harness(balance: u64, status: ActivityStatus) -> Harness {
        let store = BalanceStore::new();
        store.set_authoritative(balance);
        let cache = ActivityStatusCache::new(store.clone());
        cache.reconcile(ActivityKind::Lottery, status);
        let engine = MutationEngine::new(store.clone(), cache.clone());
        let controller =
            ReconciliationController::new(store.clone(), cache.clone(), engine.clone());
        Harness {
            balance: store,
            cache,
            engine,
            controller,
        }
    }

    fn submit_draw(h: &Harness) -> PendingAction {
        let status = h.cache.get(ActivityKind::Lottery).unwrap();
        h.engine
            .submit(
                ActionKind::Draw,
                status.cost_points,
                StatusPatch::predict(ActionKind::Draw, &status),
            )
            .unwrap()
    }

    #[test]
    fn plan__success_replaces_with_derived_status() {
        // given
        let confirmed = ActivityStatus::new(30, Some(3)).with_today_count(2);
        let outcome = ActionOutcome::new(prize()).with_balance(70);

        // when
        let plan = plan(ActionKind::Draw, Some(&confirmed), Ok(&outcome));

        // then
        assert_eq!(
            plan,
            ReconcilePlan {
                status: StatusDecision::Replace(confirmed.with_today_count(3)),
                refresh: RefreshPolicy::BestEffort,
            }
        );
    }

    #[test]
    fn plan__conflict_keeps_patch_and_forces_refresh() {
        let confirmed = ActivityStatus::new(50, None).with_stock(1);
        let plan = plan(
            ActionKind::GachaPlay,
            Some(&confirmed),
            Err(ErrorClass::Conflict),
        );
        assert_eq!(plan.status, StatusDecision::KeepStale);
        assert_eq!(plan.refresh, RefreshPolicy::Forced);
    }

    #[test]
    fn plan__transient_failure_restores_last_known_good() {
        let confirmed = ActivityStatus::new(30, None);
        let plan = plan(ActionKind::Draw, Some(&confirmed), Err(ErrorClass::Transient));
        assert_eq!(plan.status, StatusDecision::RestoreConfirmed);
        assert_eq!(plan.refresh, RefreshPolicy::BestEffort);
    }

    #[test]
    fn derive_status__server_count_wins_over_prediction() {
        // given
        let confirmed = ActivityStatus::new(30, Some(5)).with_today_count(2);
        let outcome = ActionOutcome::new(prize()).with_today_count(2);

        // when
        let status = derive_status(ActionKind::Draw, &confirmed, &outcome);

        // then
        assert_eq!(status.today_count, 2);
    }

    #[test]
    fn on_success__matching_response_keeps_optimistic_view() {
        // given
        let h = harness(100, ActivityStatus::new(30, Some(3)).with_today_count(2));
        let pending = submit_draw(&h);
        let optimistic = h.cache.get(ActivityKind::Lottery).unwrap();

        // when
        let refresh = h.controller.on_success(
            &pending,
            &ActionOutcome::new(prize())
                .with_balance(70)
                .with_today_count(3),
            false,
        );

        // then
        assert_eq!(refresh, RefreshPolicy::BestEffort);
        assert_eq!(h.balance.get(), 70);
        assert_eq!(h.cache.get(ActivityKind::Lottery).unwrap(), optimistic);
        assert!(!h.engine.is_busy(ActivityKind::Lottery));
    }

    #[test]
    fn on_success__server_balance_overrides_guess() {
        // given
        let h = harness(100, ActivityStatus::new(30, None));
        let pending = submit_draw(&h);

        // when
        h.controller.on_success(
            &pending,
            &ActionOutcome::new(prize()).with_balance(55),
            false,
        );

        // then
        assert_eq!(h.balance.get(), 55);
    }

    #[test]
    fn on_failure__restores_balance_exactly() {
        // given
        let h = harness(100, ActivityStatus::new(30, Some(3)).with_today_count(2));
        let before = h.balance.get();
        let pending = submit_draw(&h);

        // when
        let refresh = h
            .controller
            .on_failure(&pending, &Error::Network("reset".into()));

        // then
        assert_eq!(refresh, RefreshPolicy::BestEffort);
        assert_eq!(h.balance.get(), before);
        let cached = h.cache.entry(ActivityKind::Lottery).unwrap();
        assert_eq!(cached.status.today_count, 2);
        assert!(!cached.optimistic);
        assert!(h.engine.pending(ActivityKind::Lottery).is_none());
    }

    #[test]
    fn on_failure__validation_marks_cache_stale() {
        // given
        let h = harness(100, ActivityStatus::new(30, Some(3)).with_today_count(2));
        let pending = submit_draw(&h);

        // when
        let refresh = h.controller.on_failure(
            &pending,
            &Error::Validation {
                detail: "insufficient points".into(),
            },
        );

        // then
        assert_eq!(refresh, RefreshPolicy::Forced);
        let cached = h.cache.entry(ActivityKind::Lottery).unwrap();
        assert!(cached.stale);
        assert!(!cached.status.can_play);
        assert_eq!(h.balance.get(), 100);
    }
}
