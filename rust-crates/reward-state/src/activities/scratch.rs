use super::Attempt;
use crate::{
    Error,
    RewardSession,
    api::RewardApi,
    kinds::{
        ActionKind,
        ActivityKind,
    },
    notice::Notice,
    outcome::Reward,
};
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};

pub const DEFAULT_SAMPLE_STEP: usize = 4;

/// Percentage of the foil already scratched off, sampling the alpha channel
/// of every `step`-th RGBA pixel. Pixels with alpha below 128 count as
/// scratched.
pub fn scratch_coverage(rgba: &[u8], step: usize) -> f64 {
    let step = step.max(1);
    let pixels = rgba.len() / 4;
    if pixels == 0 {
        return 0.0;
    }
    let scratched = rgba
        .iter()
        .skip(3)
        .step_by(4 * step)
        .filter(|&&alpha| alpha < 128)
        .count();
    let sampled = pixels as f64 / step as f64;
    (scratched as f64 / sampled * 100.0).min(100.0)
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScratchCard {
    pub card_id: u64,
    /// Highest coverage reported so far, in percent.
    pub coverage: f64,
    pub revealed: bool,
}

/// Scratch cards: buying debits the cost, revealing is free and happens once
/// enough of the card was scratched.
pub struct Scratch<A> {
    session: RewardSession<A>,
    card: Arc<Mutex<Option<ScratchCard>>>,
}

impl<A> Clone for Scratch<A> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            card: self.card.clone(),
        }
    }
}

impl<A: RewardApi> Scratch<A> {
    pub fn new(session: RewardSession<A>) -> Self {
        Self {
            session,
            card: Arc::new(Mutex::new(None)),
        }
    }

    pub fn card(&self) -> Option<ScratchCard> {
        self.lock().clone()
    }

    pub async fn buy(&self) -> Attempt {
        if let Some(card) = self.card()
            && !card.revealed
        {
            let error = Error::NotEligible {
                kind: ActivityKind::Scratch,
                reason: format!("card {} is not revealed yet", card.card_id),
            };
            let notice = Notice::from_error(&error, "buy failed");
            return Attempt::Blocked { error, notice };
        }

        let attempt = Attempt::from_result(
            self.session.execute(ActionKind::ScratchBuy, None).await,
            "buy failed",
        );
        if let Some(outcome) = attempt.outcome()
            && let Reward::Card { card_id } = outcome.reward
        {
            *self.lock() = Some(ScratchCard {
                card_id,
                coverage: 0.0,
                revealed: false,
            });
        }
        attempt
    }

    /// Records scratching progress. Going past the reveal threshold sends the
    /// reveal; the returned attempt is `None` while nothing was sent.
    pub async fn scratch(&self, coverage: f64) -> Option<Attempt> {
        let threshold = self.session.config().scratch_reveal_threshold;
        let card_id = {
            let mut card = self.lock();
            let card = card.as_mut()?;
            card.coverage = card.coverage.max(coverage);
            if card.revealed || card.coverage <= threshold {
                return None;
            }
            card.card_id
        };

        let attempt = Attempt::from_result(
            self.session
                .execute(ActionKind::ScratchReveal, Some(card_id))
                .await,
            "reveal failed",
        );
        if attempt.is_completed()
            && let Some(card) = self.lock().as_mut()
            && card.card_id == card_id
        {
            card.revealed = true;
        }
        Some(attempt)
    }

    /// Forgets a revealed card so a new one can be bought.
    pub fn reset(&self) {
        let mut card = self.lock();
        if card.as_ref().is_some_and(|card| card.revealed) {
            *card = None;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ScratchCard>> {
        self.card.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
