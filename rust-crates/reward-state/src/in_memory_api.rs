use crate::{
    Error,
    Result,
    api::RewardApi,
    kinds::{
        ActionKind,
        ActivityKind,
    },
    outcome::{
        ActionOutcome,
        ActionRequest,
        Reward,
        StatusReport,
    },
    status::ActivityStatus,
};
use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};
use tokio::sync::watch;

/// A scripted in-process backend. Actions succeed against its own state
/// unless a failure was queued for them.
#[derive(Clone)]
pub struct InMemoryRewardApi {
    state: Arc<Mutex<BackendState>>,
    gate: Arc<watch::Sender<bool>>,
    status_gate: Arc<watch::Sender<bool>>,
}

#[derive(Default)]
struct BackendState {
    balance: u64,
    statuses: HashMap<ActivityKind, ActivityStatus>,
    status_failures: HashMap<ActivityKind, VecDeque<Error>>,
    action_failures: HashMap<ActionKind, VecDeque<Error>>,
    action_delay: Option<Duration>,
    next_card_id: u64,
    performed: Vec<ActionRequest>,
    status_calls: HashMap<ActivityKind, usize>,
}

impl InMemoryRewardApi {
    pub fn new(balance: u64) -> Self {
        let (gate, _) = watch::channel(true);
        let (status_gate, _) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(BackendState {
                balance,
                next_card_id: 1,
                ..BackendState::default()
            })),
            gate: Arc::new(gate),
            status_gate: Arc::new(status_gate),
        }
    }

    pub fn set_balance(&self, balance: u64) {
        self.lock().balance = balance;
    }

    pub fn server_balance(&self) -> u64 {
        self.lock().balance
    }

    pub fn set_status(&self, kind: ActivityKind, status: ActivityStatus) {
        self.lock().statuses.insert(kind, status);
    }

    pub fn server_status(&self, kind: ActivityKind) -> Option<ActivityStatus> {
        self.lock().statuses.get(&kind).cloned()
    }

    pub fn fail_next_status(&self, kind: ActivityKind, error: Error) {
        self.lock()
            .status_failures
            .entry(kind)
            .or_default()
            .push_back(error);
    }

    pub fn fail_next_action(&self, kind: ActionKind, error: Error) {
        self.lock()
            .action_failures
            .entry(kind)
            .or_default()
            .push_back(error);
    }

    pub fn set_action_delay(&self, delay: Duration) {
        self.lock().action_delay = Some(delay);
    }

    /// Parks every subsequent action until [`Self::open_gate`] is called.
    pub fn close_gate(&self) {
        self.gate.send_replace(false);
    }

    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    /// Parks every subsequent status read until [`Self::open_status_gate`]
    /// is called. The status is read after the gate opens.
    pub fn close_status_gate(&self) {
        self.status_gate.send_replace(false);
    }

    pub fn open_status_gate(&self) {
        self.status_gate.send_replace(true);
    }

    pub fn performed(&self) -> Vec<ActionRequest> {
        self.lock().performed.clone()
    }

    pub fn status_calls(&self, kind: ActivityKind) -> usize {
        self.lock().status_calls.get(&kind).copied().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle_action(&self, request: &ActionRequest) -> Result<ActionOutcome> {
        let mut state = self.lock();
        state.performed.push(request.clone());
        if let Some(err) = state
            .action_failures
            .get_mut(&request.kind)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }

        let activity = request.kind.activity();
        let balance = state.balance;
        let status = state
            .statuses
            .get(&activity)
            .cloned()
            .ok_or_else(|| Error::from_status(404, Some(format!("{activity} is not configured"))))?;
        if request.kind.requires_eligibility()
            && let Some(reason) = status.blocker(balance)
        {
            return Err(Error::from_status(400, Some(reason)));
        }

        let cost = if request.kind.debits_cost() {
            status.cost_points
        } else {
            0
        };
        let mut updated = status.clone();
        if request.kind.counts_toward_daily_limit() {
            updated.today_count += 1;
        }
        if request.kind.consumes_stock() {
            updated.stock = updated.stock.map(|stock| stock.saturating_sub(1));
        }

        let reward = match request.kind {
            ActionKind::Signin => Reward::Points {
                amount: 10,
                streak_day: Some(1),
                milestone: None,
            },
            ActionKind::Draw | ActionKind::ScratchReveal => Reward::Prize {
                name: "Coffee".to_string(),
                prize_type: "ITEM".to_string(),
                value: None,
                is_rare: false,
            },
            ActionKind::ScratchBuy => {
                let card_id = state.next_card_id;
                state.next_card_id += 1;
                Reward::Card { card_id }
            }
            ActionKind::GachaPlay => Reward::Capsule {
                code: Some("EGG-0001".to_string()),
                description: "20 points".to_string(),
            },
            ActionKind::SlotSpin => Reward::Spin {
                reels: vec!["cherry".into(), "lemon".into(), "bell".into()],
                payout: 0,
                jackpot: false,
            },
        };
        let earned = match &reward {
            Reward::Points { amount, .. } => *amount,
            Reward::Spin { payout, .. } => *payout,
            _ => 0,
        };

        state.balance = balance - cost + earned;
        let remaining = state.balance;
        let today_count = updated.today_count;
        let stock = updated.stock;
        state.statuses.insert(activity, updated);

        let mut outcome = ActionOutcome::new(reward)
            .with_balance(remaining)
            .with_today_count(today_count);
        outcome.stock = stock;
        Ok(outcome)
    }
}

impl RewardApi for InMemoryRewardApi {
    async fn balance(&self) -> Result<u64> {
        Ok(self.server_balance())
    }

    async fn activity_status(&self, kind: ActivityKind) -> Result<StatusReport> {
        let mut gate = self.status_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        let mut state = self.lock();
        *state.status_calls.entry(kind).or_default() += 1;
        if let Some(err) = state
            .status_failures
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        let status = state
            .statuses
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::from_status(404, Some(format!("{kind} is not configured"))))?;
        Ok(StatusReport {
            status,
            balance: Some(state.balance),
        })
    }

    async fn perform(&self, request: &ActionRequest) -> Result<ActionOutcome> {
        let mut gate = self.gate.subscribe();
        // a dropped sender only happens when the api itself is gone
        let _ = gate.wait_for(|open| *open).await;
        let delay = self.lock().action_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.settle_action(request)
    }
}
