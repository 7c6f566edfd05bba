//! Completing matches and moving winners into the following round.
use serde::{Deserialize, Serialize};

use crate::id::ParticipantId;
use crate::layout::Layout;
use crate::{Error, Match, MatchStatus, Result, Slot};

/// The reported outcome of a match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner: ParticipantId,
    /// The scores of the first and second slot. Only optional for byes.
    pub scores: Option<[u64; 2]>,
}

impl MatchResult {
    #[inline]
    pub fn new(winner: ParticipantId, score1: u64, score2: u64) -> Self {
        Self {
            winner,
            scores: Some([score1, score2]),
        }
    }

    /// Creates a `MatchResult` advancing `winner` through a bye.
    #[inline]
    pub fn bye(winner: ParticipantId) -> Self {
        Self {
            winner,
            scores: None,
        }
    }
}

/// A winner that must be written into a later match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Propagation {
    pub round: u32,
    pub match_number: u32,
    pub slot: Slot,
    pub participant: ParticipantId,
}

/// The result of [`apply_result`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Advance {
    /// The completed match.
    pub r#match: Match,
    /// The slot receiving the winner. `None` if the match was the final.
    pub propagation: Option<Propagation>,
}

/// Completes `match` using `result` and returns the completed match together with the slot the
/// winner moves into.
///
/// Both scores are required if both slots are occupied. A participant facing a bye may be
/// advanced without scores, the match is then recorded as 0-0.
///
/// # Errors
///
/// Returns an [`enum@Error`] if the match is already decided, the winner is not playing in the
/// match, scores are missing or the opponent of the winner is not decided yet.
pub fn apply_result(layout: &Layout, r#match: &Match, result: &MatchResult) -> Result<Advance> {
    if !r#match.status.is_pending() {
        return Err(Error::AlreadyDecided {
            match_number: r#match.match_number,
            status: r#match.status,
        });
    }

    let slot = r#match
        .slot_of(result.winner)
        .ok_or(Error::NotAParticipant {
            participant: result.winner,
            match_number: r#match.match_number,
        })?;

    let scores = match r#match.slot(slot.other()) {
        Some(_) => result.scores.ok_or(Error::MissingScores {
            match_number: r#match.match_number,
        })?,
        None => {
            if !layout.is_bye(r#match.round, r#match.match_number, slot.other())? {
                return Err(Error::MatchNotReady {
                    match_number: r#match.match_number,
                });
            }

            result.scores.unwrap_or([0, 0])
        }
    };

    let mut updated = r#match.clone();
    updated.scores = scores.map(Some);
    updated.winner = Some(result.winner);
    updated.status = MatchStatus::Completed;

    let propagation = layout
        .next(r#match.round, r#match.match_number)?
        .map(|target| Propagation {
            round: target.round,
            match_number: target.match_number,
            slot: target.slot,
            participant: result.winner,
        });

    log::debug!(
        "Match {} won by {}, next: {:?}",
        r#match.match_number,
        result.winner,
        propagation
    );

    Ok(Advance {
        r#match: updated,
        propagation,
    })
}

/// Cancels a pending match. Nothing is propagated from a cancelled match.
///
/// # Errors
///
/// Returns [`Error::AlreadyDecided`] if the match is not pending.
pub fn cancel(r#match: &Match) -> Result<Match> {
    if !r#match.status.is_pending() {
        return Err(Error::AlreadyDecided {
            match_number: r#match.match_number,
            status: r#match.status,
        });
    }

    let mut updated = r#match.clone();
    updated.status = MatchStatus::Cancelled;
    Ok(updated)
}

/// Writes `participant` into `slot` of `match`. Returns `true` if the match was changed and
/// `false` if the slot already contained `participant`.
///
/// # Errors
///
/// Returns [`Error::SlotTaken`] if the slot contains another participant and
/// [`Error::AlreadyDecided`] if the slot is empty but the match is no longer pending.
pub fn fill_slot(r#match: &mut Match, slot: Slot, participant: ParticipantId) -> Result<bool> {
    match r#match.slots[slot.index()] {
        Some(occupant) if occupant == participant => Ok(false),
        Some(occupant) => Err(Error::SlotTaken {
            match_number: r#match.match_number,
            slot,
            occupant,
        }),
        None if !r#match.status.is_pending() => Err(Error::AlreadyDecided {
            match_number: r#match.match_number,
            status: r#match.status,
        }),
        None => {
            r#match.slots[slot.index()] = Some(participant);
            Ok(true)
        }
    }
}
