use crate::kinds::ActionKind;
use serde::{
    Deserialize,
    Serialize,
};

/// Server-reported eligibility for one activity.
///
/// `can_play` is always derived from the other fields and the current
/// balance; a value reported by the server is never stored as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityStatus {
    pub active: bool,
    pub cost_points: u64,
    pub daily_limit: Option<u32>,
    pub today_count: u32,
    /// Remaining shared inventory, for activities that have one.
    pub stock: Option<u32>,
    pub can_play: bool,
}

impl ActivityStatus {
    pub fn new(cost_points: u64, daily_limit: Option<u32>) -> Self {
        Self {
            active: true,
            cost_points,
            daily_limit,
            today_count: 0,
            stock: None,
            can_play: false,
        }
    }

    pub fn with_today_count(mut self, today_count: u32) -> Self {
        self.today_count = today_count;
        self
    }

    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = Some(stock);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn can_play_with(&self, balance: u64) -> bool {
        self.active
            && balance >= self.cost_points
            && self.has_quota_left()
            && self.stock.is_none_or(|stock| stock > 0)
    }

    pub fn has_quota_left(&self) -> bool {
        self.daily_limit
            .is_none_or(|limit| self.today_count < limit)
    }

    pub fn remaining_today(&self) -> Option<u32> {
        self.daily_limit
            .map(|limit| limit.saturating_sub(self.today_count))
    }

    /// Returns a copy with `can_play` recomputed against `balance`.
    pub fn derive(&self, balance: u64) -> Self {
        let mut status = self.clone();
        status.can_play = status.can_play_with(balance);
        status
    }

    /// Explains why `can_play_with(balance)` is false, if it is.
    pub fn blocker(&self, balance: u64) -> Option<String> {
        if !self.active {
            return Some("activity is closed".to_string());
        }
        if !self.has_quota_left() {
            return Some(format!(
                "daily limit of {} reached",
                self.daily_limit.unwrap_or_default()
            ));
        }
        if self.stock == Some(0) {
            return Some("sold out".to_string());
        }
        if balance < self.cost_points {
            return Some(format!(
                "needs {} points, balance is {}",
                self.cost_points, balance
            ));
        }
        None
    }
}

/// A partial overwrite of an [`ActivityStatus`] applied optimistically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusPatch {
    pub today_count: Option<u32>,
    pub stock: Option<u32>,
    pub active: Option<bool>,
}

impl StatusPatch {
    /// The patch predicting the effect of a successful `action` on `status`.
    pub fn predict(action: ActionKind, status: &ActivityStatus) -> Self {
        let today_count = action
            .counts_toward_daily_limit()
            .then(|| status.today_count.saturating_add(1));
        let stock = if action.consumes_stock() {
            status.stock.map(|stock| stock.saturating_sub(1))
        } else {
            None
        };
        Self {
            today_count,
            stock,
            active: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &StatusPatch::default()
    }

    pub fn apply_to(&self, status: &mut ActivityStatus) {
        if let Some(today_count) = self.today_count {
            status.today_count = today_count;
        }
        if let Some(stock) = self.stock {
            status.stock = Some(stock);
        }
        if let Some(active) = self.active {
            status.active = active;
        }
    }

    /// Later fields win.
    pub fn merge(&mut self, other: &StatusPatch) {
        if other.today_count.is_some() {
            self.today_count = other.today_count;
        }
        if other.stock.is_some() {
            self.stock = other.stock;
        }
        if other.active.is_some() {
            self.active = other.active;
        }
    }
}
