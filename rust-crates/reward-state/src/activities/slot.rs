use super::Attempt;
use crate::{
    RewardSession,
    api::RewardApi,
    kinds::ActionKind,
};

/// Slot machine. Reels and payout are decided by the server; the payout
/// reaches the balance through the reported remaining balance.
pub struct Slot<A> {
    session: RewardSession<A>,
}

impl<A: RewardApi> Slot<A> {
    pub fn new(session: RewardSession<A>) -> Self {
        Self { session }
    }

    pub async fn spin(&self) -> Attempt {
        let result = self.session.execute(ActionKind::SlotSpin, None).await;
        Attempt::from_result(result, "spin failed")
    }
}
