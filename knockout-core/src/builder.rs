use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::id::ParticipantId;
use crate::layout::Layout;
use crate::structure::{BracketStructure, MatchDescriptor};
use crate::{Error, Result};

/// The initial matches of a new bracket.
///
/// A `BracketPlan` contains every match of the bracket: the first round matches with their
/// participants and placeholder matches for all following rounds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BracketPlan {
    layout: Layout,
    matches: Vec<MatchDescriptor>,
}

impl BracketPlan {
    #[inline]
    pub fn rounds(&self) -> u32 {
        self.layout.rounds()
    }

    /// Returns the number of matches in all rounds.
    #[inline]
    pub fn total_matches(&self) -> usize {
        self.matches.len()
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Returns all matches ordered by their match number.
    #[inline]
    pub fn matches(&self) -> &[MatchDescriptor] {
        &self.matches
    }

    /// Returns the matches of the first round.
    pub fn first_round(&self) -> &[MatchDescriptor] {
        &self.matches[..self.layout.round_len(1) as usize]
    }

    /// Returns the [`BracketStructure`] document describing this plan.
    pub fn structure(&self) -> BracketStructure {
        BracketStructure {
            rounds: self.rounds(),
            matches: self.matches.clone(),
        }
    }
}

/// Builds a new bracket from `participants` using a random seeding drawn from `rng`.
///
/// Every permutation of `participants` is equally likely to become the seeding.
///
/// # Errors
///
/// Returns an [`enum@Error`] if less than 2 participants are given or a participant is given more
/// than once.
pub fn build<I, R>(participants: I, rng: &mut R) -> Result<BracketPlan>
where
    I: IntoIterator<Item = ParticipantId>,
    R: Rng + ?Sized,
{
    let mut participants: Vec<ParticipantId> = participants.into_iter().collect();
    participants.shuffle(rng);

    build_ordered(participants)
}

/// Builds a new bracket pairing `participants` in the given order: the first match gets the first
/// and second participant, the second match the third and fourth and so on. With an odd number of
/// participants the last one gets a bye.
///
/// # Errors
///
/// Returns an [`enum@Error`] if less than 2 participants are given or a participant is given more
/// than once.
pub fn build_ordered<I>(participants: I) -> Result<BracketPlan>
where
    I: IntoIterator<Item = ParticipantId>,
{
    let participants: Vec<ParticipantId> = participants.into_iter().collect();

    let mut seen = HashSet::with_capacity(participants.len());
    for participant in &participants {
        if !seen.insert(*participant) {
            return Err(Error::DuplicateParticipant {
                participant: *participant,
            });
        }
    }

    let layout = Layout::new(participants.len())?;

    log::debug!(
        "Creating new bracket with {} participants in {} rounds",
        participants.len(),
        layout.rounds()
    );

    let mut matches = Vec::with_capacity(layout.total_matches());

    let mut match_number = 1;
    for pair in participants.chunks(2) {
        matches.push(MatchDescriptor::new(
            match_number,
            1,
            [Some(pair[0]), pair.get(1).copied()],
        ));

        match_number += 1;
    }

    // Placeholders for all following rounds.
    for round in 2..=layout.rounds() {
        for _ in 0..layout.round_len(round) {
            matches.push(MatchDescriptor::new(match_number, round, [None, None]));
            match_number += 1;
        }
    }

    debug_assert_eq!(matches.len(), layout.total_matches());

    log::debug!("Created new bracket with {} matches", matches.len());

    Ok(BracketPlan { layout, matches })
}
