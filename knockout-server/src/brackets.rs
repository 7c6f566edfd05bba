//! Bracket operations on top of a [`Store`].
//!
//! Every operation is a sequence of atomic store calls. A reported result is persisted before the
//! winner is written into the next match. If the second step fails the result stays recorded and
//! the winner can be moved later using [`Brackets::propagate`].
use knockout_core::id::{BracketId, MatchId, ParticipantId, TournamentId};
use knockout_core::{Match, MatchResult, MatchStatus, Propagation, Slot};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::store::{Bracket, MatchEntry, Store};
use crate::Error;

#[derive(Clone, Debug)]
pub struct Brackets<S> {
    store: S,
    seed: Option<u64>,
}

/// A bracket with all of its matches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketView {
    pub bracket: Bracket,
    pub matches: Vec<MatchEntry>,
}

impl BracketView {
    #[inline]
    pub fn current_round(&self) -> u32 {
        self.bracket.current_round
    }

    #[inline]
    pub fn champion(&self) -> Option<ParticipantId> {
        self.bracket.structure.champion()
    }
}

/// The outcome of [`Brackets::report_result`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// The completed match.
    pub r#match: Match,
    /// The match that received the winner. `None` if the completed match was the final.
    pub next: Option<Match>,
}

impl<S> Brackets<S>
where
    S: Store,
{
    pub fn new(store: S) -> Self {
        Self { store, seed: None }
    }

    /// Draws every bracket using the given seed instead of a random one.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    async fn bracket(&self, id: BracketId) -> Result<Bracket, Error> {
        self.store
            .get_bracket_by_id(id)
            .await?
            .ok_or(Error::BracketNotFound(id))
    }

    /// Creates the bracket of a tournament from its participants. The participants are shuffled
    /// before they are paired.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BracketExists`] if the tournament already has a bracket and a validation
    /// error if the tournament has less than 2 participants. If storing the matches fails the
    /// bracket is removed again.
    pub async fn generate(&self, tournament_id: TournamentId) -> Result<BracketView, Error> {
        if self.store.get_bracket(tournament_id).await?.is_some() {
            return Err(Error::BracketExists(tournament_id));
        }

        let participants = self.store.list_participants(tournament_id).await?;

        let plan = knockout_core::build(participants.iter().map(|p| p.id), &mut self.rng())?;

        log::info!(
            "Generating bracket for tournament {} with {} participants ({} rounds, {} matches)",
            tournament_id,
            participants.len(),
            plan.rounds(),
            plan.total_matches()
        );

        let bracket = self
            .store
            .insert_bracket(tournament_id, &plan.structure())
            .await?;

        if let Err(err) = self.store.insert_matches(&bracket, plan.matches()).await {
            log::error!("Failed to insert matches of bracket {}: {}", bracket.id, err);

            if let Err(err) = self.store.delete_bracket(bracket.id).await {
                log::error!("Failed to remove incomplete bracket {}: {}", bracket.id, err);
            }

            return Err(err);
        }

        let matches = self.store.list_matches(tournament_id).await?;
        Ok(BracketView { bracket, matches })
    }

    /// Returns the bracket of a tournament with all matches ordered by round and match number.
    pub async fn view(&self, tournament_id: TournamentId) -> Result<BracketView, Error> {
        let bracket = self
            .store
            .get_bracket(tournament_id)
            .await?
            .ok_or(Error::NoBracket(tournament_id))?;

        let matches = self.store.list_matches(tournament_id).await?;

        Ok(BracketView { bracket, matches })
    }

    /// Completes a match and writes the winner into the next match.
    ///
    /// # Errors
    ///
    /// Fails without changing anything if the match is unknown, not pending or `result` is
    /// invalid for the match. Returns [`Error::Propagation`] if the result was recorded but the
    /// winner could not be written into the next match.
    pub async fn report_result(
        &self,
        match_id: MatchId,
        result: MatchResult,
    ) -> Result<Report, Error> {
        let r#match = self
            .store
            .get_match(match_id)
            .await?
            .ok_or(Error::MatchNotFound(match_id))?;

        let bracket = self.bracket(r#match.bracket_id).await?;
        let layout = bracket.structure.layout()?;

        let advance = knockout_core::apply_result(&layout, &r#match, &result)?;

        let r#match = self
            .store
            .update_match(match_id, &advance.r#match.update())
            .await?;

        let next = match advance.propagation {
            Some(propagation) => Some(self.advance(bracket.id, propagation).await?),
            None => {
                log::info!(
                    "Bracket {} finished, won by participant {}",
                    bracket.id,
                    result.winner
                );
                None
            }
        };

        Ok(Report { r#match, next })
    }

    async fn advance(&self, bracket_id: BracketId, propagation: Propagation) -> Result<Match, Error> {
        self.fill(bracket_id, propagation).await.map_err(|err| {
            log::error!(
                "Failed to move participant {} into match {} of bracket {}: {}",
                propagation.participant,
                propagation.match_number,
                bracket_id,
                err
            );

            Error::Propagation {
                bracket_id,
                round: propagation.round,
                match_number: propagation.match_number,
                source: Box::new(err),
            }
        })
    }

    async fn fill(&self, bracket_id: BracketId, propagation: Propagation) -> Result<Match, Error> {
        let target = self
            .store
            .find_match(bracket_id, propagation.round, propagation.match_number)
            .await?
            .ok_or(Error::MatchNotInBracket {
                bracket_id,
                round: propagation.round,
                match_number: propagation.match_number,
            })?;

        self.store
            .fill_slot(target.id, propagation.slot, propagation.participant)
            .await
    }

    /// Cancels a pending match. A cancelled match never propagates a winner.
    pub async fn cancel_match(&self, match_id: MatchId) -> Result<Match, Error> {
        let r#match = self
            .store
            .get_match(match_id)
            .await?
            .ok_or(Error::MatchNotFound(match_id))?;

        let cancelled = knockout_core::cancel(&r#match)?;

        self.store.update_match(match_id, &cancelled.update()).await
    }

    /// Writes the winners of all completed feeder matches into `match_number`. Slots that already
    /// contain the winner are left untouched, which makes this safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns a conflict if a slot contains a participant other than the winner of its feeder.
    pub async fn propagate(
        &self,
        bracket_id: BracketId,
        round: u32,
        match_number: u32,
    ) -> Result<Match, Error> {
        let bracket = self.bracket(bracket_id).await?;
        let layout = bracket.structure.layout()?;
        let feeders = layout.feeders(round, match_number)?;

        let mut target = self
            .store
            .find_match(bracket_id, round, match_number)
            .await?
            .ok_or(Error::MatchNotInBracket {
                bracket_id,
                round,
                match_number,
            })?;

        for (slot, feeder) in [Slot::First, Slot::Second].into_iter().zip(feeders) {
            let feeder = match feeder {
                Some(feeder) => feeder,
                None => continue,
            };

            let feeder = self
                .store
                .find_match(bracket_id, round - 1, feeder)
                .await?
                .ok_or(Error::MatchNotInBracket {
                    bracket_id,
                    round: round - 1,
                    match_number: feeder,
                })?;

            if let (MatchStatus::Completed, Some(winner)) = (feeder.status, feeder.winner) {
                target = self.store.fill_slot(target.id, slot, winner).await?;
            }
        }

        Ok(target)
    }

    /// Removes the bracket of a tournament together with all of its matches.
    pub async fn reset(&self, tournament_id: TournamentId) -> Result<(), Error> {
        let bracket = self
            .store
            .get_bracket(tournament_id)
            .await?
            .ok_or(Error::NoBracket(tournament_id))?;

        self.store.delete_bracket(bracket.id).await?;

        log::info!(
            "Removed bracket {} of tournament {}",
            bracket.id,
            tournament_id
        );
        Ok(())
    }
}
