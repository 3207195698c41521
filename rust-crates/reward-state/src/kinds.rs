use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};

/// One of the mini-games that spends or earns points.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Signin,
    Lottery,
    Gacha,
    Scratch,
    Slot,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 5] = [
        ActivityKind::Signin,
        ActivityKind::Lottery,
        ActivityKind::Gacha,
        ActivityKind::Scratch,
        ActivityKind::Slot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Signin => "signin",
            ActivityKind::Lottery => "lottery",
            ActivityKind::Gacha => "gacha",
            ActivityKind::Scratch => "scratch",
            ActivityKind::Slot => "slot",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown activity '{s}'; expected one of signin, lottery, gacha, scratch, slot")
            })
    }
}

/// A user-initiated action. Several actions can belong to the same activity,
/// and single-flight is enforced per activity, not per action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Signin,
    Draw,
    GachaPlay,
    ScratchBuy,
    ScratchReveal,
    SlotSpin,
}

impl ActionKind {
    pub fn activity(self) -> ActivityKind {
        match self {
            ActionKind::Signin => ActivityKind::Signin,
            ActionKind::Draw => ActivityKind::Lottery,
            ActionKind::GachaPlay => ActivityKind::Gacha,
            ActionKind::ScratchBuy | ActionKind::ScratchReveal => ActivityKind::Scratch,
            ActionKind::SlotSpin => ActivityKind::Slot,
        }
    }

    /// Revealing an already purchased card costs nothing and does not count
    /// against the daily quota, so it skips the eligibility gate.
    pub fn requires_eligibility(self) -> bool {
        !matches!(self, ActionKind::ScratchReveal)
    }

    pub fn debits_cost(self) -> bool {
        !matches!(self, ActionKind::Signin | ActionKind::ScratchReveal)
    }

    pub fn counts_toward_daily_limit(self) -> bool {
        !matches!(self, ActionKind::ScratchReveal)
    }

    pub fn consumes_stock(self) -> bool {
        matches!(self, ActionKind::GachaPlay)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Signin => "signin",
            ActionKind::Draw => "draw",
            ActionKind::GachaPlay => "gacha_play",
            ActionKind::ScratchBuy => "scratch_buy",
            ActionKind::ScratchReveal => "scratch_reveal",
            ActionKind::SlotSpin => "slot_spin",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
