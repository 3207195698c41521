use rand::{
    Rng,
    SeedableRng,
    rngs::StdRng,
};
use serde::{
    Deserialize,
    Serialize,
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
};

/// Every route the server answers, for failure injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Balance,
    SigninStatus,
    Signin,
    LotteryInfo,
    Draw,
    ScratchInfo,
    ScratchBuy,
    ScratchReveal,
    GachaStatus,
    GachaPlay,
    SlotInfo,
    SlotSpin,
}

/// A non-2xx answer, rendered as `{ "detail": ... }`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{status}: {detail}")]
pub struct ApiError {
    pub status: u16,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(400, detail)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub balance: u64,
    pub lottery_cost: u64,
    pub lottery_daily_limit: Option<u32>,
    pub scratch_cost: u64,
    pub scratch_daily_limit: Option<u32>,
    pub slot_cost: u64,
    pub gacha_cost: u64,
    pub gacha_codes: usize,
    /// Fixed seed for reproducible prizes and reels.
    pub seed: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            balance: 100,
            lottery_cost: 20,
            lottery_daily_limit: Some(10),
            scratch_cost: 30,
            scratch_daily_limit: Some(5),
            slot_cost: 30,
            gacha_cost: 50,
            gacha_codes: 5,
            seed: None,
        }
    }
}

struct Prize {
    name: &'static str,
    prize_type: &'static str,
    value: Option<&'static str>,
    is_rare: bool,
    weight: u32,
}

const PRIZES: &[Prize] = &[
    Prize {
        name: "Thanks for playing",
        prize_type: "EMPTY",
        value: None,
        is_rare: false,
        weight: 45,
    },
    Prize {
        name: "Coffee",
        prize_type: "ITEM",
        value: Some("coffee"),
        is_rare: false,
        weight: 25,
    },
    Prize {
        name: "10 points",
        prize_type: "POINTS",
        value: Some("10"),
        is_rare: false,
        weight: 20,
    },
    Prize {
        name: "Energy drink",
        prize_type: "ITEM",
        value: Some("energy"),
        is_rare: false,
        weight: 8,
    },
    Prize {
        name: "Mechanical keyboard",
        prize_type: "PHYSICAL",
        value: None,
        is_rare: true,
        weight: 2,
    },
];

/// Reel symbols with their triple multiplier, most valuable first.
pub const SLOT_SYMBOLS: [(&str, u64); 8] = [
    ("seven", 100),
    ("cherry", 50),
    ("bell", 20),
    ("lemon", 10),
    ("grape", 5),
    ("watermelon", 3),
    ("star", 2),
    ("bar", 1),
];

const SIGNIN_BASE_POINTS: u64 = 10;
const SIGNIN_MILESTONE_DAYS: u32 = 7;
const SIGNIN_MILESTONE_BONUS: u64 = 50;

/// Points paid for a spin landing on `reels` (indices into
/// [`SLOT_SYMBOLS`]), and whether it is the jackpot.
pub fn slot_payout(cost: u64, reels: [usize; 3]) -> (u64, bool) {
    let [a, b, c] = reels;
    if a == b && b == c {
        let (name, multiplier) = SLOT_SYMBOLS[a];
        return (cost * multiplier, name == "seven");
    }
    if a == b || b == c || a == c {
        return (cost * 3 / 2, false);
    }
    (0, false)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceResponse {
    pub balance: u64,
    pub total_earned: u64,
    pub total_spent: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SigninStatusResponse {
    pub signed_today: bool,
    pub streak_days: u32,
    pub balance: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SigninResponse {
    pub success: bool,
    pub signin_date: String,
    pub streak_day: u32,
    pub base_points: u64,
    pub bonus_points: u64,
    pub total_points: u64,
    pub balance: u64,
    pub is_milestone: bool,
    pub milestone_message: Option<String>,
}

/// Lottery, scratch and slot info share this shape.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InfoResponse {
    pub active: bool,
    pub cost_points: u64,
    pub daily_limit: Option<u32>,
    pub today_count: u32,
    pub remaining_today: Option<u32>,
    pub balance: u64,
    pub can_draw: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyedRequest {
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrawResponse {
    pub success: bool,
    pub is_duplicate: bool,
    pub prize_name: String,
    pub prize_type: String,
    pub prize_value: Option<String>,
    pub is_rare: bool,
    pub cost_points: u64,
    pub balance: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScratchBuyResponse {
    pub success: bool,
    pub card_id: u64,
    pub cost_points: u64,
    pub remaining_balance: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScratchRevealResponse {
    pub success: bool,
    pub prize_name: String,
    pub prize_type: String,
    pub prize_value: Option<String>,
    pub is_rare: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GachaStatusResponse {
    pub cost: u64,
    pub available_codes: u32,
    pub user_balance: u64,
    pub can_play: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RewardInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GachaPlayResponse {
    pub success: bool,
    pub code: String,
    pub reward: RewardInfo,
    pub cost: u64,
    pub remaining_balance: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotSpinResponse {
    pub reels: Vec<String>,
    pub payout: u64,
    pub jackpot: bool,
    pub balance: u64,
    pub today_count: u32,
}

#[derive(Clone, Debug)]
struct Counter {
    active: bool,
    cost_points: u64,
    daily_limit: Option<u32>,
    today_count: u32,
}

impl Counter {
    fn new(cost_points: u64, daily_limit: Option<u32>) -> Self {
        Self {
            active: true,
            cost_points,
            daily_limit,
            today_count: 0,
        }
    }

    fn quota_left(&self) -> bool {
        self.daily_limit.is_none_or(|limit| self.today_count < limit)
    }

    fn check(&self, balance: u64) -> ApiResult<()> {
        if !self.active {
            return Err(ApiError::bad_request("activity is closed"));
        }
        if !self.quota_left() {
            return Err(ApiError::bad_request("daily limit reached"));
        }
        if balance < self.cost_points {
            return Err(ApiError::bad_request(format!(
                "need {} points, have {}",
                self.cost_points, balance
            )));
        }
        Ok(())
    }

    fn info(&self, balance: u64) -> InfoResponse {
        InfoResponse {
            active: self.active,
            cost_points: self.cost_points,
            daily_limit: self.daily_limit,
            today_count: self.today_count,
            remaining_today: self
                .daily_limit
                .map(|limit| limit.saturating_sub(self.today_count)),
            balance,
            can_draw: self.check(balance).is_ok(),
        }
    }
}

#[derive(Clone, Debug)]
struct GachaCode {
    code: String,
    reward: RewardInfo,
}

struct State {
    balance: u64,
    total_earned: u64,
    total_spent: u64,
    signed_today: bool,
    streak_days: u32,
    lottery: Counter,
    scratch: Counter,
    slot: Counter,
    cards: HashMap<u64, bool>,
    next_card_id: u64,
    gacha_cost: u64,
    codes: Vec<GachaCode>,
    draws: HashMap<String, DrawResponse>,
    failures: HashMap<Endpoint, VecDeque<ApiError>>,
    rng: StdRng,
}

impl State {
    fn debit(&mut self, amount: u64) {
        self.balance -= amount;
        self.total_spent += amount;
    }

    fn credit(&mut self, amount: u64) {
        self.balance += amount;
        self.total_earned += amount;
    }

    fn pick_prize(&mut self) -> &'static Prize {
        let total: u32 = PRIZES.iter().map(|prize| prize.weight).sum();
        let mut roll = self.rng.random_range(0..total);
        for prize in PRIZES {
            if roll < prize.weight {
                return prize;
            }
            roll -= prize.weight;
        }
        &PRIZES[0]
    }

    /// Credits point prizes straight to the balance.
    fn award(&mut self, prize: &Prize) {
        if prize.prize_type == "POINTS"
            && let Some(points) = prize.value.and_then(|value| value.parse().ok())
        {
            self.credit(points);
        }
    }

    fn spin_reel(&mut self) -> usize {
        let weights: Vec<u32> = (0..SLOT_SYMBOLS.len())
            .map(|i| 10u32.saturating_sub(i as u32).max(1))
            .collect();
        let total: u32 = weights.iter().sum();
        let mut roll = self.rng.random_range(0..total);
        for (index, weight) in weights.iter().enumerate() {
            if roll < *weight {
                return index;
            }
            roll -= weight;
        }
        SLOT_SYMBOLS.len() - 1
    }
}

fn gacha_reward(index: usize) -> RewardInfo {
    let (kind, value) = match index % 4 {
        0 => ("points", serde_json::json!({ "amount": 20 })),
        1 => ("item", serde_json::json!({ "item_type": "coffee", "amount": 2 })),
        2 => ("badge", serde_json::json!({ "badge_name": "Early Bird" })),
        _ => ("api_key", serde_json::Value::Null),
    };
    RewardInfo {
        kind: kind.to_string(),
        value,
    }
}

/// In-memory state of a single user on the rewards backend.
#[derive(Clone)]
pub struct RewardBackend {
    state: Arc<Mutex<State>>,
}

impl Default for RewardBackend {
    fn default() -> Self {
        Self::new(BackendConfig::default())
    }
}

impl RewardBackend {
    pub fn new(config: BackendConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let codes = (0..config.gacha_codes)
            .map(|index| GachaCode {
                code: format!("EGG-{}", hex::encode_upper(rng.random::<[u8; 4]>())),
                reward: gacha_reward(index),
            })
            .collect();
        Self {
            state: Arc::new(Mutex::new(State {
                balance: config.balance,
                total_earned: config.balance,
                total_spent: 0,
                signed_today: false,
                streak_days: 0,
                lottery: Counter::new(config.lottery_cost, config.lottery_daily_limit),
                scratch: Counter::new(config.scratch_cost, config.scratch_daily_limit),
                slot: Counter::new(config.slot_cost, None),
                cards: HashMap::new(),
                next_card_id: 1,
                gacha_cost: config.gacha_cost,
                codes,
                draws: HashMap::new(),
                failures: HashMap::new(),
                rng,
            })),
        }
    }

    /// The next request to `endpoint` fails with `status` and `detail`
    /// without touching any state.
    pub fn fail_next(&self, endpoint: Endpoint, status: u16, detail: impl Into<String>) {
        self.lock()
            .failures
            .entry(endpoint)
            .or_default()
            .push_back(ApiError::new(status, detail));
    }

    pub fn set_balance(&self, balance: u64) {
        self.lock().balance = balance;
    }

    pub fn balance_value(&self) -> u64 {
        self.lock().balance
    }

    pub fn set_lottery_today_count(&self, today_count: u32) {
        self.lock().lottery.today_count = today_count;
    }

    pub fn set_gacha_codes(&self, count: usize) {
        let mut state = self.lock();
        state.codes.truncate(count);
    }

    /// Starts a new day: daily counters and the signin flag reset.
    pub fn new_day(&self) {
        let mut state = self.lock();
        state.signed_today = false;
        state.lottery.today_count = 0;
        state.scratch.today_count = 0;
        state.slot.today_count = 0;
    }

    pub fn balance(&self) -> ApiResult<BalanceResponse> {
        let state = self.guard(Endpoint::Balance)?;
        Ok(BalanceResponse {
            balance: state.balance,
            total_earned: state.total_earned,
            total_spent: state.total_spent,
        })
    }

    pub fn signin_status(&self) -> ApiResult<SigninStatusResponse> {
        let state = self.guard(Endpoint::SigninStatus)?;
        Ok(SigninStatusResponse {
            signed_today: state.signed_today,
            streak_days: state.streak_days,
            balance: state.balance,
        })
    }

    pub fn signin(&self) -> ApiResult<SigninResponse> {
        let mut state = self.guard(Endpoint::Signin)?;
        if state.signed_today {
            return Err(ApiError::bad_request("already signed in today"));
        }
        state.signed_today = true;
        state.streak_days += 1;
        let streak_day = state.streak_days;
        let is_milestone = streak_day % SIGNIN_MILESTONE_DAYS == 0;
        let bonus_points = if is_milestone {
            SIGNIN_MILESTONE_BONUS
        } else {
            0
        };
        let total_points = SIGNIN_BASE_POINTS + bonus_points;
        state.credit(total_points);
        Ok(SigninResponse {
            success: true,
            signin_date: chrono::Utc::now().date_naive().to_string(),
            streak_day,
            base_points: SIGNIN_BASE_POINTS,
            bonus_points,
            total_points,
            balance: state.balance,
            is_milestone,
            milestone_message: is_milestone.then(|| {
                format!("{streak_day} day streak! +{SIGNIN_MILESTONE_BONUS} bonus points")
            }),
        })
    }

    pub fn lottery_info(&self) -> ApiResult<InfoResponse> {
        let state = self.guard(Endpoint::LotteryInfo)?;
        Ok(state.lottery.info(state.balance))
    }

    /// Repeating a `request_id` returns the first result without charging
    /// again.
    pub fn draw(&self, request: KeyedRequest) -> ApiResult<DrawResponse> {
        let mut state = self.guard(Endpoint::Draw)?;
        if let Some(request_id) = &request.request_id
            && let Some(previous) = state.draws.get(request_id)
        {
            return Ok(DrawResponse {
                is_duplicate: true,
                ..previous.clone()
            });
        }
        state.lottery.check(state.balance)?;
        let cost = state.lottery.cost_points;
        state.debit(cost);
        state.lottery.today_count += 1;
        let prize = state.pick_prize();
        state.award(prize);
        let response = DrawResponse {
            success: true,
            is_duplicate: false,
            prize_name: prize.name.to_string(),
            prize_type: prize.prize_type.to_string(),
            prize_value: prize.value.map(str::to_string),
            is_rare: prize.is_rare,
            cost_points: cost,
            balance: state.balance,
        };
        if let Some(request_id) = request.request_id {
            state.draws.insert(request_id, response.clone());
        }
        Ok(response)
    }

    pub fn scratch_info(&self) -> ApiResult<InfoResponse> {
        let state = self.guard(Endpoint::ScratchInfo)?;
        Ok(state.scratch.info(state.balance))
    }

    pub fn scratch_buy(&self) -> ApiResult<ScratchBuyResponse> {
        let mut state = self.guard(Endpoint::ScratchBuy)?;
        state.scratch.check(state.balance)?;
        let cost = state.scratch.cost_points;
        state.debit(cost);
        state.scratch.today_count += 1;
        let card_id = state.next_card_id;
        state.next_card_id += 1;
        state.cards.insert(card_id, false);
        Ok(ScratchBuyResponse {
            success: true,
            card_id,
            cost_points: cost,
            remaining_balance: state.balance,
        })
    }

    pub fn scratch_reveal(&self, card_id: u64) -> ApiResult<ScratchRevealResponse> {
        let mut state = self.guard(Endpoint::ScratchReveal)?;
        match state.cards.get(&card_id) {
            None => return Err(ApiError::new(404, "scratch card not found")),
            Some(true) => return Err(ApiError::bad_request("card already revealed")),
            Some(false) => {}
        }
        state.cards.insert(card_id, true);
        let prize = state.pick_prize();
        state.award(prize);
        Ok(ScratchRevealResponse {
            success: true,
            prize_name: prize.name.to_string(),
            prize_type: prize.prize_type.to_string(),
            prize_value: prize.value.map(str::to_string),
            is_rare: prize.is_rare,
        })
    }

    pub fn gacha_status(&self) -> ApiResult<GachaStatusResponse> {
        let state = self.guard(Endpoint::GachaStatus)?;
        Ok(GachaStatusResponse {
            cost: state.gacha_cost,
            available_codes: u32::try_from(state.codes.len()).unwrap_or(u32::MAX),
            user_balance: state.balance,
            can_play: state.balance >= state.gacha_cost && !state.codes.is_empty(),
        })
    }

    pub fn gacha_play(&self) -> ApiResult<GachaPlayResponse> {
        let mut state = self.guard(Endpoint::GachaPlay)?;
        if state.codes.is_empty() {
            return Err(ApiError::new(409, "all codes have been claimed"));
        }
        let cost = state.gacha_cost;
        if state.balance < cost {
            return Err(ApiError::bad_request(format!(
                "need {} points, have {}",
                cost, state.balance
            )));
        }
        let available = state.codes.len();
        let index = state.rng.random_range(0..available);
        let code = state.codes.swap_remove(index);
        state.debit(cost);
        Ok(GachaPlayResponse {
            success: true,
            code: code.code,
            reward: code.reward,
            cost,
            remaining_balance: state.balance,
        })
    }

    pub fn slot_info(&self) -> ApiResult<InfoResponse> {
        let state = self.guard(Endpoint::SlotInfo)?;
        Ok(state.slot.info(state.balance))
    }

    pub fn slot_spin(&self, _request: KeyedRequest) -> ApiResult<SlotSpinResponse> {
        let mut state = self.guard(Endpoint::SlotSpin)?;
        state.slot.check(state.balance)?;
        let cost = state.slot.cost_points;
        state.debit(cost);
        state.slot.today_count += 1;
        let reels = [state.spin_reel(), state.spin_reel(), state.spin_reel()];
        let (payout, jackpot) = slot_payout(cost, reels);
        state.credit(payout);
        Ok(SlotSpinResponse {
            reels: reels
                .iter()
                .map(|&index| SLOT_SYMBOLS[index].0.to_string())
                .collect(),
            payout,
            jackpot,
            balance: state.balance,
            today_count: state.slot.today_count,
        })
    }

    /// Locks the state, or answers with the failure queued for `endpoint`.
    fn guard(&self, endpoint: Endpoint) -> ApiResult<MutexGuard<'_, State>> {
        let mut state = self.lock();
        if let Some(err) = state
            .failures
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front)
        {
            tracing::debug!(?endpoint, %err, "injected failure");
            return Err(err);
        }
        Ok(state)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
