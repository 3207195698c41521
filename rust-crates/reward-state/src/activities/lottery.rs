use super::Attempt;
use crate::{
    RewardSession,
    api::RewardApi,
    kinds::ActionKind,
};

pub struct Lottery<A> {
    session: RewardSession<A>,
}

impl<A: RewardApi> Lottery<A> {
    pub fn new(session: RewardSession<A>) -> Self {
        Self { session }
    }

    pub async fn draw(&self) -> Attempt {
        let result = self.session.execute(ActionKind::Draw, None).await;
        Attempt::from_result(result, "draw failed")
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        ActivityKind,
        ActivityStatus,
        Error,
        in_memory_api::InMemoryRewardApi,
        notice::NoticeLevel,
        session::SessionConfig,
    };

    async fn lottery(api: &InMemoryRewardApi) -> Lottery<InMemoryRewardApi> {
        let session = RewardSession::new(api.clone(), SessionConfig::default());
        session.load_status(ActivityKind::Lottery).await.unwrap();
        Lottery::new(session)
    }

    #[tokio::test]
    async fn draw__forwards_an_idempotency_key() {
        // given
        let api = InMemoryRewardApi::new(100);
        api.set_status(ActivityKind::Lottery, ActivityStatus::new(30, None));
        let lottery = lottery(&api).await;

        // when
        lottery.draw().await;
        lottery.draw().await;

        // then
        let performed = api.performed();
        assert_eq!(performed.len(), 2);
        assert_eq!(performed[0].request_id.len(), 32);
        assert_ne!(performed[0].request_id, performed[1].request_id);
    }

    #[tokio::test]
    async fn draw__server_detail_reaches_the_notice() {
        // given
        let api = InMemoryRewardApi::new(100);
        api.set_status(ActivityKind::Lottery, ActivityStatus::new(30, None));
        api.fail_next_action(
            ActionKind::Draw,
            Error::from_status(400, Some("lottery paused".into())),
        );
        let lottery = lottery(&api).await;

        // when
        let attempt = lottery.draw().await;

        // then
        let notice = attempt.notice().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "lottery paused");
    }
}
