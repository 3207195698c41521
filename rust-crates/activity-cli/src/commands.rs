use clap::Subcommand;
use color_eyre::eyre::{
    Result,
    eyre,
};
use reward_state::{
    ActivityKind,
    ActivityStatus,
    RewardSession,
    activities::{
        Attempt,
        Gacha,
        Lottery,
        Scratch,
        Signin,
        Slot,
    },
    api::RewardApi,
    outcome::Reward,
    session::ControlState,
};
use std::time::Duration;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the current point balance
    Balance,
    /// Print eligibility for one activity, or all of them
    Status { kind: Option<ActivityKind> },
    /// Claim today's signin points
    Signin,
    /// Draw the lottery
    Draw {
        /// Number of consecutive draws
        #[arg(long, default_value_t = 1)]
        times: u32,
    },
    /// Open a gacha capsule
    Gacha,
    /// Buy a scratch card and scratch it
    Scratch {
        /// Percentage of the foil to scratch off
        #[arg(long, default_value_t = 100.0)]
        coverage: f64,
    },
    /// Spin the slot machine
    Slot,
    /// Reload balance and statuses on an interval
    Watch {
        /// Stop after this many polls
        #[arg(long)]
        count: Option<u64>,
    },
}

pub async fn run<A: RewardApi>(
    session: &RewardSession<A>,
    command: Command,
    poll_interval: Duration,
) -> Result<()> {
    load(session).await;
    let trailing_balance = !matches!(command, Command::Balance | Command::Watch { .. });

    match command {
        Command::Balance => println!("balance: {}", session.balance().get()),
        Command::Status { kind } => {
            let kinds = kind.map_or_else(|| ActivityKind::ALL.to_vec(), |kind| vec![kind]);
            print_statuses(session, &kinds);
        }
        Command::Signin => report(Signin::new(session.clone()).sign_in().await)?,
        Command::Draw { times } => {
            let lottery = Lottery::new(session.clone());
            for _ in 0..times {
                report(lottery.draw().await)?;
            }
        }
        Command::Gacha => report(Gacha::new(session.clone()).play().await)?,
        Command::Scratch { coverage } => scratch(session, coverage).await?,
        Command::Slot => report(Slot::new(session.clone()).spin().await)?,
        Command::Watch { count } => watch(session, poll_interval, count).await,
    }

    session.settle().await;
    if trailing_balance {
        println!("balance: {}", session.balance().get());
    }
    Ok(())
}

async fn load<A: RewardApi>(session: &RewardSession<A>) {
    let summary = session.load_all().await;
    for err in summary.failures() {
        tracing::warn!("initial load failed: {err}");
    }
}

async fn scratch<A: RewardApi>(session: &RewardSession<A>, coverage: f64) -> Result<()> {
    let scratch = Scratch::new(session.clone());
    report(scratch.buy().await)?;
    match scratch.scratch(coverage).await {
        Some(attempt) => report(attempt),
        None => {
            let threshold = session.config().scratch_reveal_threshold;
            println!("scratched {coverage:.0}%, the card reveals past {threshold:.0}%");
            Ok(())
        }
    }
}

async fn watch<A: RewardApi>(
    session: &RewardSession<A>,
    poll_interval: Duration,
    count: Option<u64>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    let mut polls = 0;
    loop {
        ticker.tick().await;
        if polls > 0 {
            load(session).await;
        }
        println!("balance: {}", session.balance().get());
        print_statuses(session, &ActivityKind::ALL);
        polls += 1;
        if count.is_some_and(|count| polls >= count) {
            break;
        }
    }
}

fn print_statuses<A>(session: &RewardSession<A>, kinds: &[ActivityKind]) {
    for &kind in kinds {
        match session.status(kind) {
            Some(status) => {
                println!("{}", render_status(kind, &status, &session.control_state(kind)))
            }
            None => println!("{kind:<8} unavailable"),
        }
    }
}

/// Prints a finished attempt. Rejections become the command's error.
fn report(attempt: Attempt) -> Result<()> {
    match &attempt {
        Attempt::Completed { outcome, notice } => {
            println!("{}", describe_reward(&outcome.reward));
            if let Some(notice) = notice {
                println!("{notice}");
            }
            Ok(())
        }
        Attempt::Ignored => {
            println!("an action is already in flight");
            Ok(())
        }
        Attempt::Blocked { notice, .. } | Attempt::Failed { notice, .. } => {
            Err(eyre!("{notice}"))
        }
    }
}

pub fn render_status(kind: ActivityKind, status: &ActivityStatus, control: &ControlState) -> String {
    let limit = status
        .daily_limit
        .map_or_else(|| "-".to_string(), |limit| limit.to_string());
    let stock = status
        .stock
        .map_or_else(|| "-".to_string(), |stock| stock.to_string());
    let control = match control {
        ControlState::Enabled => "ready".to_string(),
        ControlState::Busy => "busy".to_string(),
        ControlState::Disabled(reason) => format!("disabled ({reason})"),
    };
    format!(
        "{kind:<8} cost {:>4}  today {}/{limit}  stock {stock}  {control}",
        status.cost_points, status.today_count
    )
}

pub fn describe_reward(reward: &Reward) -> String {
    match reward {
        Reward::Points {
            amount, streak_day, ..
        } => match streak_day {
            Some(day) => format!("+{amount} points (day {day} of the streak)"),
            None => format!("+{amount} points"),
        },
        Reward::Prize { .. } if reward.is_empty_prize() => "no prize this time".to_string(),
        Reward::Prize { name, is_rare, .. } => {
            let rare = if *is_rare { " [rare]" } else { "" };
            format!("prize: {name}{rare}")
        }
        Reward::Card { card_id } => format!("bought scratch card #{card_id}"),
        Reward::Capsule { code, description } => match code {
            Some(code) => format!("capsule: {description}, code {code}"),
            None => format!("capsule: {description}"),
        },
        Reward::Spin {
            reels,
            payout,
            jackpot,
        } => {
            let jackpot = if *jackpot { " JACKPOT" } else { "" };
            format!("[{}] payout {payout}{jackpot}", reels.join(" | "))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use reward_state::{
        in_memory_api::InMemoryRewardApi,
        session::SessionConfig,
    };

    fn session(balance: u64) -> RewardSession<InMemoryRewardApi> {
        let api = InMemoryRewardApi::new(balance);
        api.set_status(ActivityKind::Lottery, ActivityStatus::new(20, Some(3)));
        api.set_status(ActivityKind::Signin, ActivityStatus::new(0, Some(1)));
        RewardSession::new(api, SessionConfig::default())
    }

    #[test]
    fn render_status__shows_limits_and_control() {
        // given
        let status = ActivityStatus::new(30, Some(5))
            .with_today_count(2)
            .with_stock(4);

        // when
        let line = render_status(
            ActivityKind::Gacha,
            &status,
            &ControlState::Disabled("sold out".into()),
        );

        // then
        assert_eq!(
            line,
            "gacha    cost   30  today 2/5  stock 4  disabled (sold out)"
        );
    }

    #[test]
    fn describe_reward__empty_prize_reads_as_a_miss() {
        let reward = Reward::Prize {
            name: "Thanks for playing".into(),
            prize_type: "EMPTY".into(),
            value: None,
            is_rare: false,
        };
        assert_eq!(describe_reward(&reward), "no prize this time");
    }

    #[test]
    fn describe_reward__spin_lists_reels() {
        let reward = Reward::Spin {
            reels: vec!["seven".into(), "seven".into(), "seven".into()],
            payout: 3000,
            jackpot: true,
        };
        assert_eq!(
            describe_reward(&reward),
            "[seven | seven | seven] payout 3000 JACKPOT"
        );
    }

    #[tokio::test]
    async fn run__draw_settles_balance() {
        // given
        let session = session(100);

        // when
        run(&session, Command::Draw { times: 2 }, Duration::from_millis(1))
            .await
            .unwrap();

        // then
        assert_eq!(session.balance().get(), 60);
        assert_eq!(
            session.status(ActivityKind::Lottery).unwrap().today_count,
            2
        );
    }

    #[tokio::test]
    async fn run__rejection_is_an_error() {
        // given
        let session = session(10);

        // when
        let result = run(&session, Command::Draw { times: 1 }, Duration::from_millis(1)).await;

        // then
        let err = result.unwrap_err().to_string();
        assert!(err.contains("insufficient points"), "{err}");
        assert_eq!(session.balance().get(), 10);
    }

    #[tokio::test]
    async fn run__watch_stops_after_count() {
        // given
        let session = session(50);

        // when
        run(
            &session,
            Command::Watch { count: Some(2) },
            Duration::from_millis(1),
        )
        .await
        .unwrap();

        // then
        assert_eq!(session.balance().get(), 50);
    }
}
