#![allow(non_snake_case)]

use mock_server::{
    BackendConfig,
    Endpoint,
    MockServer,
    RewardBackend,
};
use reward_state::{
    ActionKind,
    ActivityKind,
    Error,
    RewardSession,
    activities::{
        Attempt,
        Gacha,
        Scratch,
        Signin,
    },
    http_client::HttpRewardApi,
    session::{
        ControlState,
        SessionConfig,
    },
};
use std::time::Duration;

fn start_server(config: BackendConfig) -> MockServer {
    let backend = RewardBackend::new(BackendConfig {
        seed: Some(42),
        ..config
    });
    MockServer::start(backend, None).unwrap()
}

async fn session_for(server: &MockServer) -> RewardSession<HttpRewardApi> {
    let api = HttpRewardApi::new(server.base_url(), Some("test-token".into())).unwrap();
    let session = RewardSession::new(
        api,
        SessionConfig {
            gacha_reveal_delay: Duration::from_millis(10),
            ..SessionConfig::default()
        },
    );
    let summary = session.load_all().await;
    assert_eq!(summary.failures().count(), 0, "{summary:?}");
    session
}

#[tokio::test]
async fn load_all__reads_every_endpoint() {
    // given
    let server = start_server(BackendConfig::default());

    // when
    let session = session_for(&server).await;

    // then
    assert_eq!(session.balance().get(), 100);
    let lottery = session.status(ActivityKind::Lottery).unwrap();
    assert_eq!(lottery.cost_points, 20);
    assert_eq!(lottery.daily_limit, Some(10));
    assert!(lottery.can_play);
    assert_eq!(session.status(ActivityKind::Gacha).unwrap().stock, Some(5));
    assert_eq!(
        session.control_state(ActivityKind::Signin),
        ControlState::Enabled
    );
}

#[tokio::test]
async fn execute__draw_settles_on_server_balance() {
    // given
    let server = start_server(BackendConfig::default());
    let session = session_for(&server).await;

    // when
    session.execute(ActionKind::Draw, None).await.unwrap();
    session.settle().await;

    // then
    assert_eq!(session.balance().get(), server.backend().balance_value());
    assert_eq!(session.status(ActivityKind::Lottery).unwrap().today_count, 1);
    assert!(session.pending(ActivityKind::Lottery).is_none());
}

#[tokio::test]
async fn execute__server_side_limit_reverts_and_refreshes() {
    // given
    let server = start_server(BackendConfig::default());
    let session = session_for(&server).await;
    server.backend().set_lottery_today_count(10);

    // when
    let result = session.execute(ActionKind::Draw, None).await;
    session.settle().await;

    // then
    assert_eq!(
        result,
        Err(Error::Validation {
            detail: "daily limit reached".into()
        })
    );
    assert_eq!(session.balance().get(), 100);
    let status = session.status(ActivityKind::Lottery).unwrap();
    assert_eq!(status.today_count, 10);
    assert!(!status.can_play);
}

#[tokio::test]
async fn execute__unreachable_server_is_a_network_error() {
    // given
    let server = start_server(BackendConfig::default());
    let session = session_for(&server).await;
    drop(server);

    // when
    let result = session.execute(ActionKind::SlotSpin, None).await;

    // then
    assert!(matches!(result, Err(Error::Network(_))), "{result:?}");
    assert_eq!(session.balance().get(), 100);
    assert_eq!(
        session.control_state(ActivityKind::Slot),
        ControlState::Enabled
    );
}

#[tokio::test]
async fn execute__server_error_keeps_status_last_known_good() {
    // given
    let server = start_server(BackendConfig::default());
    let session = session_for(&server).await;
    server
        .backend()
        .fail_next(Endpoint::SlotSpin, 503, "maintenance");
    let before = session.status(ActivityKind::Slot).unwrap();

    // when
    let result = session.execute(ActionKind::SlotSpin, None).await;
    session.settle().await;

    // then
    assert_eq!(
        result,
        Err(Error::Server {
            status: 503,
            detail: "maintenance".into()
        })
    );
    assert_eq!(session.status(ActivityKind::Slot).unwrap(), before);
    assert_eq!(session.balance().get(), 100);
}

#[tokio::test]
async fn gacha__claimed_out_conflict_disables_control() {
    // given
    let server = start_server(BackendConfig::default());
    let session = session_for(&server).await;
    server.backend().set_gacha_codes(0);
    let gacha = Gacha::new(session.clone());

    // when
    let attempt = gacha.play().await;
    session.settle().await;

    // then
    let Attempt::Failed { error, notice } = attempt else {
        panic!("expected a failed attempt, got {attempt:?}");
    };
    assert_eq!(error.class(), reward_state::ErrorClass::Conflict);
    assert_eq!(notice.message, "all codes have been claimed");
    assert_eq!(session.balance().get(), 100);
    assert_eq!(
        session.control_state(ActivityKind::Gacha),
        ControlState::Disabled("sold out".into())
    );
}

#[tokio::test]
async fn gacha__play_reveals_capsule() {
    // given
    let server = start_server(BackendConfig::default());
    let session = session_for(&server).await;
    let gacha = Gacha::new(session.clone());

    // when
    let attempt = gacha.play().await;
    session.settle().await;

    // then
    assert!(attempt.is_completed(), "{attempt:?}");
    assert_eq!(session.balance().get(), 50);
    assert_eq!(gacha.available_codes(), Some(4));
}

#[tokio::test]
async fn scratch__buy_then_reveal_over_http() {
    // given
    let server = start_server(BackendConfig::default());
    let session = session_for(&server).await;
    let scratch = Scratch::new(session.clone());

    // when
    let bought = scratch.buy().await;
    let reveal = scratch.scratch(55.0).await;
    session.settle().await;

    // then
    assert!(bought.is_completed(), "{bought:?}");
    assert!(reveal.unwrap().is_completed());
    assert!(scratch.card().unwrap().revealed);
    assert_eq!(session.balance().get(), server.backend().balance_value());
    assert_eq!(session.status(ActivityKind::Scratch).unwrap().today_count, 1);
}

#[tokio::test]
async fn signin__credits_points_once() {
    // given
    let server = start_server(BackendConfig::default());
    let session = session_for(&server).await;
    let signin = Signin::new(session.clone());

    // when
    let first = signin.sign_in().await;
    let second = signin.sign_in().await;
    session.settle().await;

    // then
    assert!(first.is_completed());
    assert!(matches!(second, Attempt::Blocked { .. }));
    assert_eq!(session.balance().get(), 110);
    assert!(signin.signed_today());
}
