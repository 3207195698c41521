use crate::{
    Error,
    Result,
    api::RewardApi,
    balance::BalanceStore,
    cache::{
        ActivityStatusCache,
        CachedStatus,
    },
    config::ClientConfig,
    controller::{
        ReconciliationController,
        RefreshPolicy,
    },
    engine::{
        MutationEngine,
        PendingAction,
    },
    kinds::{
        ActionKind,
        ActivityKind,
    },
    outcome::{
        ActionOutcome,
        ActionRequest,
    },
    status::{
        ActivityStatus,
        StatusPatch,
    },
};
use futures::future::join_all;
use std::{
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};
use tokio::task::JoinHandle;


#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub action_timeout: Duration,
    /// Whether best-effort status refreshes run after a resolved action.
    /// Forced refreshes always run.
    pub refresh_after_success: bool,
    pub gacha_reveal_delay: Duration,
    pub scratch_reveal_threshold: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for SessionConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            action_timeout: config.action_timeout(),
            refresh_after_success: config.refresh_after_success,
            gacha_reveal_delay: config.gacha_reveal_delay(),
            scratch_reveal_threshold: config.scratch_reveal_threshold,
        }
    }
}

/// What the presentation layer should do with an activity's control.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlState {
    Enabled,
    Disabled(String),
    /// An action is in flight or its result is still being presented.
    Busy,
}

/// Result of loading everything a freshly mounted activity center needs.
#[derive(Debug)]
pub struct LoadSummary {
    pub balance: Result<u64>,
    pub statuses: Vec<(ActivityKind, Result<ActivityStatus>)>,
}

impl LoadSummary {
    pub fn failures(&self) -> impl Iterator<Item = &Error> {
        self.balance
            .as_ref()
            .err()
            .into_iter()
            .chain(self.statuses.iter().filter_map(|(_, result)| result.as_ref().err()))
    }
}

/// Keeps the activity slot occupied while a result is being presented.
/// Dropping it frees the slot.
#[must_use]
pub struct Presentation {
    engine: MutationEngine,
    activity: ActivityKind,
}

impl Presentation {
    /// Holds the slot for `delay`, then frees it.
    pub async fn finish_after(self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

impl Drop for Presentation {
    fn drop(&mut self) {
        self.engine.release(self.activity);
        tracing::debug!(activity = %self.activity, "presentation finished");
    }
}

/// One user's reward state: the shared balance, the per-activity cache and
/// the machinery that keeps them consistent with the server.
pub struct RewardSession<A> {
    api: Arc<A>,
    config: SessionConfig,
    balance: BalanceStore,
    cache: ActivityStatusCache,
    engine: MutationEngine,
    controller: ReconciliationController,
    refreshes: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl<A> Clone for RewardSession<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            config: self.config.clone(),
            balance: self.balance.clone(),
            cache: self.cache.clone(),
            engine: self.engine.clone(),
            controller: self.controller.clone(),
            refreshes: self.refreshes.clone(),
        }
    }
}

impl<A> RewardSession<A> {
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn balance(&self) -> &BalanceStore {
        &self.balance
    }

    pub fn cache(&self) -> &ActivityStatusCache {
        &self.cache
    }

    pub fn status(&self, kind: ActivityKind) -> Option<ActivityStatus> {
        self.cache.get(kind)
    }

    pub fn entry(&self, kind: ActivityKind) -> Option<CachedStatus> {
        self.cache.entry(kind)
    }

    pub fn pending(&self, kind: ActivityKind) -> Option<PendingAction> {
        self.engine.pending(kind)
    }

    pub fn control_state(&self, kind: ActivityKind) -> ControlState {
        if self.engine.is_busy(kind) {
            return ControlState::Busy;
        }
        match self.cache.get(kind) {
            None => ControlState::Disabled("loading".to_string()),
            Some(status) if status.can_play => ControlState::Enabled,
            Some(status) => ControlState::Disabled(
                status
                    .blocker(self.balance.get())
                    .unwrap_or_else(|| "unavailable".to_string()),
            ),
        }
    }

    fn refreshes(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.refreshes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A: RewardApi> RewardSession<A> {
    pub fn new(api: A, config: SessionConfig) -> Self {
        let balance = BalanceStore::new();
        let cache = ActivityStatusCache::new(balance.clone());
        let engine = MutationEngine::new(balance.clone(), cache.clone());
        let controller =
            ReconciliationController::new(balance.clone(), cache.clone(), engine.clone());
        Self {
            api: Arc::new(api),
            config,
            balance,
            cache,
            engine,
            controller,
            refreshes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn load_balance(&self) -> Result<u64> {
        let balance = self.api.balance().await.inspect_err(|err| {
            tracing::warn!(%err, "balance load failed; keeping cached balance");
        })?;
        self.balance.set_loaded(balance);
        Ok(self.balance.get())
    }

    pub async fn load_status(&self, kind: ActivityKind) -> Result<ActivityStatus> {
        self.cache.load(self.api.as_ref(), kind).await
    }

    /// Loads the balance and every activity status concurrently. One failing
    /// request never blocks the others.
    pub async fn load_all(&self) -> LoadSummary {
        let statuses = join_all(ActivityKind::ALL.iter().map(|&kind| async move {
            (kind, self.load_status(kind).await)
        }));
        let (balance, statuses) = futures::join!(self.load_balance(), statuses);
        let summary = LoadSummary { balance, statuses };
        tracing::info!(
            balance = self.balance.get(),
            failures = summary.failures().count(),
            "activity center loaded"
        );
        summary
    }

    /// Submits `kind` optimistically and resolves it against the server.
    pub async fn execute(
        &self,
        kind: ActionKind,
        card_id: Option<u64>,
    ) -> Result<ActionOutcome> {
        let (outcome, _) = self.execute_with(kind, card_id, false).await?;
        Ok(outcome)
    }

    /// Like [`Self::execute`], but on success the activity stays busy until
    /// the returned [`Presentation`] is dropped.
    pub async fn execute_presented(
        &self,
        kind: ActionKind,
        card_id: Option<u64>,
    ) -> Result<(ActionOutcome, Presentation)> {
        let (outcome, presentation) = self.execute_with(kind, card_id, true).await?;
        let presentation = presentation.unwrap_or_else(|| Presentation {
            engine: self.engine.clone(),
            activity: kind.activity(),
        });
        Ok((outcome, presentation))
    }

    async fn execute_with(
        &self,
        kind: ActionKind,
        card_id: Option<u64>,
        hold: bool,
    ) -> Result<(ActionOutcome, Option<Presentation>)> {
        let activity = kind.activity();
        let status = self.cache.get(activity);
        let cost = match &status {
            Some(status) if kind.debits_cost() => status.cost_points,
            _ => 0,
        };
        let patch = status
            .map(|status| StatusPatch::predict(kind, &status))
            .unwrap_or_default();
        let pending = self.engine.submit(kind, cost, patch)?;

        // The request runs on its own task so a caller that stops waiting
        // cannot leave the action pending forever.
        let session = self.clone();
        let task = tokio::spawn(async move { session.resolve(pending, card_id, hold).await });
        match task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Err(Error::Network(format!("action task cancelled: {err}"))),
        }
    }

    async fn resolve(
        &self,
        pending: PendingAction,
        card_id: Option<u64>,
        hold: bool,
    ) -> Result<(ActionOutcome, Option<Presentation>)> {
        let request = ActionRequest {
            kind: pending.kind,
            request_id: pending.request_id.clone(),
            card_id,
        };
        let timeout = self.config.action_timeout;
        let result = match tokio::time::timeout(timeout, self.api.perform(&request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(timeout)),
        };

        let activity = pending.activity();
        match result {
            Ok(outcome) => {
                let refresh = self.controller.on_success(&pending, &outcome, hold);
                let presentation = hold.then(|| Presentation {
                    engine: self.engine.clone(),
                    activity,
                });
                self.schedule_refresh(activity, refresh);
                Ok((outcome, presentation))
            }
            Err(err) => {
                let refresh = self.controller.on_failure(&pending, &err);
                self.schedule_refresh(activity, refresh);
                Err(err)
            }
        }
    }

    /// Reloads `kind` in the background. Its response replaces the cached
    /// status when it lands, even if other writes happened since dispatch.
    pub fn schedule_refresh(&self, kind: ActivityKind, policy: RefreshPolicy) {
        let run = match policy {
            RefreshPolicy::None => false,
            RefreshPolicy::BestEffort => self.config.refresh_after_success,
            RefreshPolicy::Forced => true,
        };
        if !run {
            return;
        }
        tracing::debug!(%kind, ?policy, "scheduling status refresh");
        let session = self.clone();
        let handle = tokio::spawn(async move {
            // failures are already logged by the cache and leave it untouched
            let _ = session.load_status(kind).await;
        });
        let mut refreshes = self.refreshes();
        refreshes.retain(|handle| !handle.is_finished());
        refreshes.push(handle);
    }

    /// Waits for every background refresh scheduled so far.
    pub async fn settle(&self) {
        loop {
            let handles: Vec<_> = self.refreshes().drain(..).collect();
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(err) = handle.await {
                    tracing::warn!(%err, "status refresh task failed");
                }
            }
        }
    }
}
