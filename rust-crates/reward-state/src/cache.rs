use crate::{
    Result,
    api::RewardApi,
    balance::BalanceStore,
    kinds::ActivityKind,
    status::{
        ActivityStatus,
        StatusPatch,
    },
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
use tokio::sync::watch;

#[derive(Clone, Debug)]
struct Entry {
    /// Last server truth.
    confirmed: ActivityStatus,
    /// Tentative overwrite on top of `confirmed`, dropped on the next
    /// authoritative write.
    patch: Option<StatusPatch>,
    /// Set when a failure proved the entry wrong and a refresh is owed.
    stale: bool,
}

impl Entry {
    fn view(&self, balance: u64) -> ActivityStatus {
        let mut status = self.confirmed.clone();
        if let Some(patch) = &self.patch {
            patch.apply_to(&mut status);
        }
        status.derive(balance)
    }
}

/// A cached status together with how much to trust it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedStatus {
    pub status: ActivityStatus,
    pub optimistic: bool,
    pub stale: bool,
}

/// One [`ActivityStatus`] per activity kind.
///
/// `can_play` is derived on every read from the entry and the shared balance,
/// so it can never lag behind a balance or count change.
#[derive(Clone)]
pub struct ActivityStatusCache {
    entries: Arc<Mutex<HashMap<ActivityKind, Entry>>>,
    balance: BalanceStore,
    changes: Arc<watch::Sender<Option<ActivityKind>>>,
}

impl ActivityStatusCache {
    pub fn new(balance: BalanceStore) -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            balance,
            changes: Arc::new(changes),
        }
    }

    pub fn get(&self, kind: ActivityKind) -> Option<ActivityStatus> {
        self.entry(kind).map(|cached| cached.status)
    }

    pub fn entry(&self, kind: ActivityKind) -> Option<CachedStatus> {
        let entries = self.lock();
        let entry = entries.get(&kind)?;
        Some(CachedStatus {
            status: entry.view(self.balance.get()),
            optimistic: entry.patch.is_some(),
            stale: entry.stale,
        })
    }

    /// Notifies with the kind that changed last.
    pub fn subscribe(&self) -> watch::Receiver<Option<ActivityKind>> {
        self.changes.subscribe()
    }

    /// Fetches the status of `kind` and writes whatever the server returns,
    /// whenever it arrives. On failure the cached entry is left as it was.
    pub async fn load<A: RewardApi>(
        &self,
        api: &A,
        kind: ActivityKind,
    ) -> Result<ActivityStatus> {
        let report = match api.activity_status(kind).await {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!(%kind, %err, "status load failed; keeping cached status");
                return Err(err);
            }
        };
        if let Some(balance) = report.balance {
            self.balance.set_loaded(balance);
        }
        self.reconcile(kind, report.status.clone());
        Ok(self
            .get(kind)
            .unwrap_or_else(|| report.status.derive(self.balance.get())))
    }

    pub fn apply_optimistic(&self, kind: ActivityKind, patch: StatusPatch) {
        {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(&kind) else {
                tracing::debug!(%kind, "no cached status to patch");
                return;
            };
            match entry.patch.as_mut() {
                Some(existing) => existing.merge(&patch),
                None => entry.patch = Some(patch),
            }
        }
        self.publish(kind);
    }

    /// Replaces the entry with server truth, discarding any optimistic patch.
    /// Server responses are applied in arrival order: the last one to land
    /// wins, whenever its request was sent.
    pub fn reconcile(&self, kind: ActivityKind, server_status: ActivityStatus) {
        self.lock().insert(
            kind,
            Entry {
                confirmed: server_status,
                patch: None,
                stale: false,
            },
        );
        self.publish(kind);
    }

    /// Drops the optimistic patch, going back to the last server truth.
    pub fn discard_optimistic(&self, kind: ActivityKind) {
        let changed = self
            .lock()
            .get_mut(&kind)
            .and_then(|entry| entry.patch.take())
            .is_some();
        if changed {
            self.publish(kind);
        }
    }

    /// Keeps whatever is cached but flags it as known to be wrong.
    pub fn mark_stale(&self, kind: ActivityKind) {
        if let Some(entry) = self.lock().get_mut(&kind) {
            entry.stale = true;
        }
        self.publish(kind);
    }

    /// The last server truth, without any optimistic patch.
    pub fn confirmed(&self, kind: ActivityKind) -> Option<ActivityStatus> {
        self.lock().get(&kind).map(|entry| entry.confirmed.clone())
    }

    fn publish(&self, kind: ActivityKind) {
        self.changes.send_replace(Some(kind));
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ActivityKind, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        Error,
        in_memory_api::InMemoryRewardApi,
    };

    fn cache_with_balance(balance: u64) -> ActivityStatusCache {
        let store = BalanceStore::new();
        store.set_authoritative(balance);
        ActivityStatusCache::new(store)
    }

    #[test]
    fn apply_optimistic__recomputes_can_play() {
        // given
        let cache = cache_with_balance(100);
        let status = ActivityStatus::new(30, Some(3)).with_today_count(2);
        cache.reconcile(ActivityKind::Lottery, status);
        assert!(cache.get(ActivityKind::Lottery).unwrap().can_play);

        // when
        cache.apply_optimistic(
            ActivityKind::Lottery,
            StatusPatch {
                today_count: Some(3),
                ..StatusPatch::default()
            },
        );

        // then
        let cached = cache.entry(ActivityKind::Lottery).unwrap();
        assert_eq!(cached.status.today_count, 3);
        assert!(!cached.status.can_play);
        assert!(cached.optimistic);
    }

    #[test]
    fn reconcile__server_truth_overrides_optimistic_patch() {
        // given
        let cache = cache_with_balance(100);
        cache.reconcile(
            ActivityKind::Lottery,
            ActivityStatus::new(30, Some(3)).with_today_count(1),
        );
        cache.apply_optimistic(
            ActivityKind::Lottery,
            StatusPatch {
                today_count: Some(2),
                ..StatusPatch::default()
            },
        );

        // when
        cache.reconcile(
            ActivityKind::Lottery,
            ActivityStatus::new(30, Some(3)).with_today_count(1),
        );

        // then
        let cached = cache.entry(ActivityKind::Lottery).unwrap();
        assert_eq!(cached.status.today_count, 1);
        assert!(!cached.optimistic);
    }

    #[test]
    fn reconcile__is_idempotent() {
        // given
        let cache = cache_with_balance(40);
        let server = ActivityStatus::new(30, Some(2)).with_today_count(1);

        // when
        cache.reconcile(ActivityKind::Scratch, server.clone());
        let once = cache.entry(ActivityKind::Scratch);
        cache.reconcile(ActivityKind::Scratch, server);
        let twice = cache.entry(ActivityKind::Scratch);

        // then
        assert_eq!(once, twice);
    }

    #[test]
    fn get__follows_balance_changes() {
        // given
        let store = BalanceStore::new();
        store.set_authoritative(100);
        let cache = ActivityStatusCache::new(store.clone());
        cache.reconcile(ActivityKind::Slot, ActivityStatus::new(30, None));

        // when
        store.set_authoritative(10);

        // then
        assert!(!cache.get(ActivityKind::Slot).unwrap().can_play);
    }

    #[test]
    fn reconcile__late_server_response_wins_over_newer_local_state() {
        // given
        let cache = cache_with_balance(100);
        cache.reconcile(
            ActivityKind::Gacha,
            ActivityStatus::new(50, None).with_stock(4),
        );
        cache.apply_optimistic(
            ActivityKind::Gacha,
            StatusPatch {
                stock: Some(3),
                ..StatusPatch::default()
            },
        );

        // when
        cache.reconcile(
            ActivityKind::Gacha,
            ActivityStatus::new(50, None).with_stock(0),
        );

        // then
        let cached = cache.entry(ActivityKind::Gacha).unwrap();
        assert_eq!(cached.status.stock, Some(0));
        assert!(!cached.optimistic);
        assert!(!cached.status.can_play);
    }

    #[tokio::test]
    async fn load__failure_keeps_previous_status() {
        // given
        let cache = cache_with_balance(100);
        let previous = ActivityStatus::new(30, Some(3)).with_today_count(1);
        cache.reconcile(ActivityKind::Lottery, previous.clone());
        let api = InMemoryRewardApi::new(100);
        api.fail_next_status(ActivityKind::Lottery, Error::Network("offline".into()));

        // when
        let result = cache.load(&api, ActivityKind::Lottery).await;

        // then
        assert_eq!(result, Err(Error::Network("offline".into())));
        assert_eq!(
            cache.get(ActivityKind::Lottery).unwrap(),
            previous.derive(100)
        );
    }

    #[tokio::test]
    async fn load__writes_status_and_reported_balance() {
        // given
        let cache = cache_with_balance(0);
        let api = InMemoryRewardApi::new(75);
        api.set_status(
            ActivityKind::Lottery,
            ActivityStatus::new(30, Some(3)).with_today_count(1),
        );

        // when
        let status = cache.load(&api, ActivityKind::Lottery).await.unwrap();

        // then
        assert_eq!(cache.balance.get(), 75);
        assert!(status.can_play);
        assert_eq!(status.today_count, 1);
    }
}
