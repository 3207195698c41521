use super::Attempt;
use crate::{
    RewardSession,
    api::RewardApi,
    kinds::{
        ActionKind,
        ActivityKind,
    },
};

/// Daily signin. Earns points instead of spending them.
pub struct Signin<A> {
    session: RewardSession<A>,
}

impl<A: RewardApi> Signin<A> {
    pub fn new(session: RewardSession<A>) -> Self {
        Self { session }
    }

    pub fn signed_today(&self) -> bool {
        self.session
            .status(ActivityKind::Signin)
            .is_some_and(|status| !status.has_quota_left())
    }

    pub async fn sign_in(&self) -> Attempt {
        let result = self.session.execute(ActionKind::Signin, None).await;
        Attempt::from_result(result, "signin failed")
    }
}
