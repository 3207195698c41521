use crate::{
    Result,
    kinds::ActivityKind,
    outcome::{
        ActionOutcome,
        ActionRequest,
        StatusReport,
    },
};
use std::future::Future;

/// The opaque backend boundary. Implementations translate transport failures
/// into [`crate::Error`] using [`crate::Error::from_status`].
pub trait RewardApi: Send + Sync + 'static {
    fn balance(&self) -> impl Future<Output = Result<u64>> + Send;

    fn activity_status(
        &self,
        kind: ActivityKind,
    ) -> impl Future<Output = Result<StatusReport>> + Send;

    fn perform(
        &self,
        request: &ActionRequest,
    ) -> impl Future<Output = Result<ActionOutcome>> + Send;
}
