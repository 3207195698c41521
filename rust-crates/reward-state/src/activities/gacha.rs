use super::Attempt;
use crate::{
    RewardSession,
    api::RewardApi,
    kinds::{
        ActionKind,
        ActivityKind,
    },
};

/// Capsule machine with a shared stock of codes.
pub struct Gacha<A> {
    session: RewardSession<A>,
}

impl<A: RewardApi> Gacha<A> {
    pub fn new(session: RewardSession<A>) -> Self {
        Self { session }
    }

    pub fn available_codes(&self) -> Option<u32> {
        self.session
            .status(ActivityKind::Gacha)
            .and_then(|status| status.stock)
    }

    /// Plays once. A successful result is only returned after the reveal
    /// delay, and the control stays busy until then.
    pub async fn play(&self) -> Attempt {
        match self
            .session
            .execute_presented(ActionKind::GachaPlay, None)
            .await
        {
            Ok((outcome, presentation)) => {
                presentation
                    .finish_after(self.session.config().gacha_reveal_delay)
                    .await;
                Attempt::from_result(Ok(outcome), "gacha failed")
            }
            Err(err) => Attempt::from_result(Err(err), "gacha failed"),
        }
    }
}
