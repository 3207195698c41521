use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};
use tokio::sync::watch;

/// Spendable points shared by every activity of a session.
///
/// The value is kept as an authoritative base plus the sum of the optimistic
/// deltas still in flight. Replacing the base never touches the deltas, so
/// reverting a delta always lands exactly where the balance would have been
/// without it.
///
/// A balance read by a load cannot tell which in-flight debits the server
/// already applied, so while any action is in flight it is held back and only
/// becomes the base once they all resolved without a newer server value.
#[derive(Clone)]
pub struct BalanceStore {
    inner: Arc<Mutex<BalanceInner>>,
    changes: Arc<watch::Sender<u64>>,
}

#[derive(Debug, Default)]
struct BalanceInner {
    authoritative: u64,
    in_flight: i64,
    in_flight_actions: usize,
    deferred: Option<u64>,
}

impl BalanceInner {
    fn visible(&self) -> u64 {
        let total = i128::from(self.authoritative) + i128::from(self.in_flight);
        u64::try_from(total.max(0)).unwrap_or(u64::MAX)
    }

    fn finish_action(&mut self, delta: i64) {
        self.in_flight = self.in_flight.saturating_sub(delta);
        self.in_flight_actions = self.in_flight_actions.saturating_sub(1);
    }
}

impl BalanceStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(BalanceInner::default())),
            changes: Arc::new(changes),
        }
    }

    /// Current balance, including any in-flight optimistic deltas.
    pub fn get(&self) -> u64 {
        self.lock().visible()
    }

    /// The last server-confirmed value, without optimistic deltas.
    pub fn authoritative(&self) -> u64 {
        self.lock().authoritative
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Replaces the confirmed balance unconditionally.
    pub fn set_authoritative(&self, value: u64) {
        let mut inner = self.lock();
        inner.authoritative = value;
        inner.deferred = None;
        self.publish(&inner);
    }

    /// Takes a balance read by a balance or status load. Returns whether it
    /// was applied now; otherwise it waits for the in-flight actions.
    pub fn set_loaded(&self, value: u64) -> bool {
        let mut inner = self.lock();
        if inner.in_flight_actions > 0 {
            tracing::debug!(
                value,
                in_flight = inner.in_flight_actions,
                "holding loaded balance until in-flight actions resolve"
            );
            inner.deferred = Some(value);
            return false;
        }
        inner.authoritative = value;
        self.publish(&inner);
        true
    }

    /// Records one action in flight, with `delta` applied immediately.
    pub fn apply_optimistic_delta(&self, delta: i64) {
        let mut inner = self.lock();
        inner.in_flight = inner.in_flight.saturating_add(delta);
        inner.in_flight_actions += 1;
        self.publish(&inner);
    }

    /// Undoes a failed action's delta. A loaded balance held back for the
    /// in-flight actions is applied once the last of them is gone.
    pub fn revert_optimistic_delta(&self, delta: i64) {
        let mut inner = self.lock();
        inner.finish_action(delta);
        if inner.in_flight_actions == 0
            && let Some(value) = inner.deferred.take()
        {
            inner.authoritative = value;
        }
        self.publish(&inner);
    }

    /// Removes an in-flight delta and folds it into the confirmed base, for
    /// successful actions whose response carried no balance.
    pub fn commit_optimistic_delta(&self, delta: i64) {
        let mut inner = self.lock();
        inner.finish_action(delta);
        let total = i128::from(inner.authoritative) + i128::from(delta);
        inner.authoritative = u64::try_from(total.max(0)).unwrap_or(u64::MAX);
        inner.deferred = None;
        self.publish(&inner);
    }

    /// Drops an in-flight delta and replaces the confirmed base in one step,
    /// so observers never see the debit counted twice.
    pub fn settle(&self, delta: i64, value: u64) {
        let mut inner = self.lock();
        inner.finish_action(delta);
        inner.authoritative = value;
        inner.deferred = None;
        self.publish(&inner);
    }

    fn publish(&self, inner: &BalanceInner) {
        self.changes.send_replace(inner.visible());
    }

    fn lock(&self) -> MutexGuard<'_, BalanceInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BalanceStore {
    fn default() -> Self {
        Self::new()
    }
}
