use crate::{
    Error,
    outcome::Reward,
};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A short user-facing message produced at the activity boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: Option<String>,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: None,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: None,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: None,
            message: message.into(),
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Transport failures get a retry hint, server rejections keep the
    /// server's own text, local guards say why the control is disabled.
    pub fn from_error(err: &Error, fallback: &str) -> Self {
        match err {
            Error::Network(_) => Notice::error("network error, please try again later"),
            Error::Timeout(_) => Notice::error("the request timed out, please try again"),
            Error::Server { detail, .. } | Error::Validation { detail }
                if !detail.is_empty() =>
            {
                Notice::error(detail.clone())
            }
            Error::Conflict { detail, .. } => {
                Notice::error(detail.clone()).titled("already claimed or sold out")
            }
            Error::Server { .. } | Error::Validation { .. } | Error::Decode(_) => {
                Notice::error(fallback)
            }
            Error::AlreadyPending(_)
            | Error::InsufficientFunds { .. }
            | Error::NotEligible { .. } => Notice::info(err.to_string()),
        }
    }

    /// The notice announcing `reward`, or `None` for an empty prize.
    pub fn for_reward(reward: &Reward) -> Option<Self> {
        let notice = match reward {
            Reward::Points {
                amount, milestone, ..
            } => Notice::success(
                milestone
                    .clone()
                    .unwrap_or_else(|| format!("earned {amount} points")),
            )
            .titled("signed in"),
            Reward::Prize { .. } if reward.is_empty_prize() => return None,
            Reward::Prize {
                name, is_rare: true, ..
            } => Notice::success(format!("rare prize: {name}")).titled("jackpot"),
            Reward::Prize { name, .. } => Notice::success(format!("won: {name}")),
            Reward::Card { .. } => Notice::success("scratch card bought, start scratching"),
            Reward::Capsule { description, .. } => {
                Notice::success(format!("you got: {description}")).titled("capsule opened")
            }
            Reward::Spin { .. } if reward.is_empty_prize() => return None,
            Reward::Spin {
                reels,
                payout,
                jackpot: true,
            } => Notice::success(format!("{} triple! {payout} points", reels.join(" ")))
                .titled("jackpot"),
            Reward::Spin { payout, .. } => Notice::success(format!("won {payout} points")),
        };
        Some(notice)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        };
        match &self.title {
            Some(title) => write!(f, "[{tag}] {title}: {}", self.message),
            None => write!(f, "[{tag}] {}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::ActivityKind;
    use std::time::Duration;

    #[test]
    fn from_error__network_failure_shows_retry_hint() {
        let notice = Notice::from_error(&Error::Network("connection reset".into()), "draw failed");
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "network error, please try again later");
    }

    #[test]
    fn from_error__validation_shows_server_detail() {
        // given
        let err = Error::from_status(400, Some("need 50 points, have 20".into()));

        // when
        let notice = Notice::from_error(&err, "draw failed");

        // then
        assert_eq!(notice.message, "need 50 points, have 20");
    }

    #[test]
    fn from_error__server_error_without_detail_uses_fallback() {
        let notice = Notice::from_error(&Error::from_status(502, None), "draw failed");
        assert_eq!(notice.message, "draw failed");
    }

    #[test]
    fn from_error__local_guard_is_informational() {
        let notice = Notice::from_error(&Error::AlreadyPending(ActivityKind::Gacha), "x");
        assert_eq!(notice.level, NoticeLevel::Info);
    }

    #[test]
    fn from_error__timeout_is_an_error() {
        let notice = Notice::from_error(&Error::Timeout(Duration::from_secs(10)), "x");
        assert_eq!(notice.level, NoticeLevel::Error);
    }

    #[test]
    fn for_reward__empty_prize_is_silent() {
        let reward = Reward::Prize {
            name: "Thanks for playing".into(),
            prize_type: "EMPTY".into(),
            value: None,
            is_rare: false,
        };
        assert_eq!(Notice::for_reward(&reward), None);
    }

    #[test]
    fn for_reward__milestone_message_replaces_points_text() {
        let reward = Reward::Points {
            amount: 50,
            streak_day: Some(7),
            milestone: Some("7 day streak!".into()),
        };
        let notice = Notice::for_reward(&reward).unwrap();
        assert_eq!(notice.message, "7 day streak!");
    }

    #[test]
    fn for_reward__rare_prize_gets_a_title() {
        let reward = Reward::Prize {
            name: "Keyboard".into(),
            prize_type: "ITEM".into(),
            value: None,
            is_rare: true,
        };
        let notice = Notice::for_reward(&reward).unwrap();
        assert_eq!(notice.to_string(), "[ok] jackpot: rare prize: Keyboard");
    }
}
