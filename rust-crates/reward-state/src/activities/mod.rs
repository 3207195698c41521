//! Per-activity bindings of the session. Every failure is turned into an
//! [`Attempt`] carrying a [`Notice`]; nothing here returns an error.

use crate::{
    Error,
    ErrorClass,
    Result,
    notice::Notice,
    outcome::ActionOutcome,
};

pub mod gacha;
pub mod lottery;
pub mod scratch;
pub mod signin;
pub mod slot;

pub use gacha::Gacha;
pub use lottery::Lottery;
pub use scratch::{
    Scratch,
    ScratchCard,
    scratch_coverage,
};
pub use signin::Signin;
pub use slot::Slot;

/// How a user action ended, from the presentation layer's point of view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attempt {
    Completed {
        outcome: ActionOutcome,
        notice: Option<Notice>,
    },
    /// Another action for the same activity was still in flight.
    Ignored,
    /// Rejected locally; the control should have been disabled.
    Blocked { error: Error, notice: Notice },
    Failed { error: Error, notice: Notice },
}

impl Attempt {
    pub(crate) fn from_result(result: Result<ActionOutcome>, fallback: &str) -> Self {
        match result {
            Ok(outcome) => {
                let notice = Notice::for_reward(&outcome.reward);
                Attempt::Completed { outcome, notice }
            }
            Err(Error::AlreadyPending(_)) => Attempt::Ignored,
            Err(error) => {
                let notice = Notice::from_error(&error, fallback);
                if error.class() == ErrorClass::Local {
                    Attempt::Blocked { error, notice }
                } else {
                    Attempt::Failed { error, notice }
                }
            }
        }
    }

    pub fn outcome(&self) -> Option<&ActionOutcome> {
        match self {
            Attempt::Completed { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        match self {
            Attempt::Completed { notice, .. } => notice.as_ref(),
            Attempt::Ignored => None,
            Attempt::Blocked { notice, .. } | Attempt::Failed { notice, .. } => Some(notice),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Attempt::Completed { .. })
    }
}
