use crate::{
    kinds::ActionKind,
    status::ActivityStatus,
};
use serde::{
    Deserialize,
    Serialize,
};

/// What the server reports for an activity's status endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    pub status: ActivityStatus,
    /// Balance echoed by the status endpoint, when it carries one.
    pub balance: Option<u64>,
}

/// A single request to perform an action, as sent over the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionRequest {
    pub kind: ActionKind,
    /// Idempotency key; a retried request with the same key is not charged
    /// twice by servers that honor it.
    pub request_id: String,
    pub card_id: Option<u64>,
}

/// The authoritative result of a successful action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionOutcome {
    pub remaining_balance: Option<u64>,
    pub today_count: Option<u32>,
    pub stock: Option<u32>,
    pub reward: Reward,
}

impl ActionOutcome {
    pub fn new(reward: Reward) -> Self {
        Self {
            remaining_balance: None,
            today_count: None,
            stock: None,
            reward,
        }
    }

    pub fn with_balance(mut self, balance: u64) -> Self {
        self.remaining_balance = Some(balance);
        self
    }

    pub fn with_today_count(mut self, today_count: u32) -> Self {
        self.today_count = Some(today_count);
        self
    }

    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = Some(stock);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reward {
    /// Points credited by a daily signin.
    Points {
        amount: u64,
        streak_day: Option<u32>,
        milestone: Option<String>,
    },
    /// A prize from a lottery draw or a revealed scratch card.
    Prize {
        name: String,
        prize_type: String,
        value: Option<String>,
        is_rare: bool,
    },
    /// A purchased, not yet revealed, scratch card.
    Card { card_id: u64 },
    /// A gacha capsule holding a redeemable code.
    Capsule {
        code: Option<String>,
        description: String,
    },
    Spin {
        reels: Vec<String>,
        payout: u64,
        jackpot: bool,
    },
}

impl Reward {
    pub fn is_empty_prize(&self) -> bool {
        match self {
            Reward::Prize { prize_type, .. } => prize_type.eq_ignore_ascii_case("EMPTY"),
            Reward::Spin { payout, .. } => *payout == 0,
            _ => false,
        }
    }
}
