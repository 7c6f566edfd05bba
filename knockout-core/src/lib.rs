//! # knockout-core
//!
//! This crate contains everything required to run a single elimination bracket without touching
//! any storage: generating the initial matches, advancing winners and validating the stored
//! bracket summary.
//!
//! Important types:
//! - [`Layout`]: The geometry of a bracket (rounds, matches per round and numbering). All pairing
//! math goes through it.
//! - [`BracketPlan`]: The result of [`build`], the set of matches to persist for a new bracket.
//! - [`Match`]: A persisted match of two [`Slot`]s.
//! - [`BracketStructure`]: The summary document stored with every bracket.
//! - [`MatchResult`] and [`Advance`]: Input and output of [`apply_result`].
//!
pub mod advance;
pub mod builder;
pub mod id;
pub mod layout;
pub mod structure;
mod utils;

pub use advance::{apply_result, cancel, fill_slot, Advance, MatchResult, Propagation};
pub use builder::{build, build_ordered, BracketPlan};
pub use layout::Layout;
pub use structure::{BracketStructure, FormatError, MatchDescriptor};

use id::{BracketId, MatchId, ParticipantId, TournamentId, UserId};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt::{self, Display, Formatter};
use std::result;
use std::str::FromStr;

/// One of the two participant positions within a match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    /// Returns the array index of this slot (0 or 1).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }

    /// Returns the slot a match with the round-relative `index` feeds into. Even indexes take the
    /// first slot of their successor, odd indexes the second one.
    #[inline]
    pub fn for_index(index: usize) -> Self {
        if index % 2 == 0 {
            Self::First
        } else {
            Self::Second
        }
    }

    /// Returns the opposite slot.
    #[inline]
    pub fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::First => f.write_str("slot1"),
            Self::Second => f.write_str("slot2"),
        }
    }
}

/// The status of a [`Match`].
///
/// A match starts out as [`Pending`] and moves into either [`Completed`] or [`Cancelled`]. Both
/// are terminal.
///
/// [`Pending`]: Self::Pending
/// [`Completed`]: Self::Completed
/// [`Cancelled`]: Self::Cancelled
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl Display for MatchStatus {
    #[inline]
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseStatusError(s.to_owned())),
        }
    }
}

/// The display status of a [`Participant`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    #[default]
    Pending,
    Confirmed,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
        }
    }
}

impl FromStr for ParticipantStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            _ => Err(ParseStatusError(s.to_owned())),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid status: {0:?}")]
pub struct ParseStatusError(pub String);

/// A user assigned to a tournament.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub tournament_id: TournamentId,
    pub user_id: UserId,
    /// The display name of the user.
    pub name: String,
    pub status: ParticipantStatus,
    pub seed: Option<u32>,
}

/// A match row of a bracket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub bracket_id: BracketId,
    pub tournament_id: TournamentId,
    /// The round of the match, starting at 1.
    pub round: u32,
    /// The number of the match, unique within the whole bracket and starting at 1.
    pub match_number: u32,
    /// The participants in both slots. `None` is either a bye or a not yet decided spot.
    pub slots: [Option<ParticipantId>; 2],
    pub status: MatchStatus,
    pub scores: [Option<u64>; 2],
    pub winner: Option<ParticipantId>,
}

impl Match {
    /// Creates a new `Match` row from a [`MatchDescriptor`].
    pub fn new(
        id: MatchId,
        bracket_id: BracketId,
        tournament_id: TournamentId,
        descriptor: &MatchDescriptor,
    ) -> Self {
        Self {
            id,
            bracket_id,
            tournament_id,
            round: descriptor.round,
            match_number: descriptor.match_number,
            slots: [descriptor.slot1, descriptor.slot2],
            status: descriptor.status,
            scores: [None, None],
            winner: descriptor.winner,
        }
    }

    #[inline]
    pub fn slot(&self, slot: Slot) -> Option<ParticipantId> {
        self.slots[slot.index()]
    }

    /// Returns the [`Slot`] occupied by `participant`.
    pub fn slot_of(&self, participant: ParticipantId) -> Option<Slot> {
        if self.slots[0] == Some(participant) {
            Some(Slot::First)
        } else if self.slots[1] == Some(participant) {
            Some(Slot::Second)
        } else {
            None
        }
    }

    /// Returns the [`MatchUpdate`] that turns a pending copy of this match into `self`.
    #[inline]
    pub fn update(&self) -> MatchUpdate {
        MatchUpdate {
            scores: self.scores,
            winner: self.winner,
            status: self.status,
        }
    }

    /// Applies a [`MatchUpdate`] to this match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDecided`] if the match is no longer pending. The match is left
    /// unchanged.
    pub fn apply_update(&mut self, update: &MatchUpdate) -> Result<()> {
        if !self.status.is_pending() {
            return Err(Error::AlreadyDecided {
                match_number: self.match_number,
                status: self.status,
            });
        }

        self.scores = update.scores;
        self.winner = update.winner;
        self.status = update.status;
        Ok(())
    }
}

/// The mutable part of a [`Match`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchUpdate {
    pub scores: [Option<u64>; 2],
    pub winner: Option<ParticipantId>,
    pub status: MatchStatus,
}

/// An `Result<T>` using [`enum@Error`] as an error type.
pub type Result<T> = result::Result<T, Error>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("a bracket requires at least 2 participants, found {found}")]
    NotEnoughParticipants { found: usize },
    #[error("participant {participant} is listed more than once")]
    DuplicateParticipant { participant: ParticipantId },
    #[error("invalid number of matches: expected {expected}, found {found}")]
    InvalidNumberOfMatches { expected: usize, found: usize },
    #[error("match {match_number} is not part of the bracket")]
    UnknownMatch { match_number: u32 },
    #[error("participant {participant} is not playing in match {match_number}")]
    NotAParticipant {
        participant: ParticipantId,
        match_number: u32,
    },
    #[error("match {match_number} is still waiting for a participant")]
    MatchNotReady { match_number: u32 },
    #[error("match {match_number} requires a score for both participants")]
    MissingScores { match_number: u32 },
    #[error("match {match_number} is already {status}")]
    AlreadyDecided {
        match_number: u32,
        status: MatchStatus,
    },
    #[error("{slot} of match {match_number} is already taken by participant {occupant}")]
    SlotTaken {
        match_number: u32,
        slot: Slot,
        occupant: ParticipantId,
    },
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotEnoughParticipants { .. }
            | Self::DuplicateParticipant { .. }
            | Self::InvalidNumberOfMatches { .. }
            | Self::NotAParticipant { .. }
            | Self::MatchNotReady { .. }
            | Self::MissingScores { .. }
            | Self::Format(_) => ErrorKind::Validation,
            Self::UnknownMatch { .. } => ErrorKind::NotFound,
            Self::AlreadyDecided { .. } | Self::SlotTaken { .. } => ErrorKind::Conflict,
        }
    }
}

/// The class of an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input had a bad shape.
    Validation,
    /// A bracket, match or tournament does not exist.
    NotFound,
    /// The operation would overwrite an already decided value.
    Conflict,
    /// The underlying storage failed.
    Persistence,
}

#[cfg(test)]
mod tests {
    use serde_test::{assert_tokens, Token};

    use super::*;

    #[test]
    fn test_slot_for_index() {
        assert_eq!(Slot::for_index(0), Slot::First);
        assert_eq!(Slot::for_index(1), Slot::Second);
        assert_eq!(Slot::for_index(6), Slot::First);
        assert_eq!(Slot::for_index(7), Slot::Second);
        assert_eq!(Slot::First.other(), Slot::Second);
    }

    #[test]
    fn test_match_status_serde() {
        assert_tokens(
            &MatchStatus::Pending,
            &[Token::UnitVariant {
                name: "MatchStatus",
                variant: "pending",
            }],
        );
        assert_tokens(
            &MatchStatus::Cancelled,
            &[Token::UnitVariant {
                name: "MatchStatus",
                variant: "cancelled",
            }],
        );
    }

    #[test]
    fn test_match_status_parse() {
        for status in [
            MatchStatus::Pending,
            MatchStatus::Completed,
            MatchStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<MatchStatus>().unwrap(), status);
        }

        assert_eq!(
            "done".parse::<MatchStatus>().unwrap_err(),
            ParseStatusError(String::from("done"))
        );
    }

    #[test]
    fn test_match_apply_update() {
        let mut r#match = Match {
            id: MatchId(1),
            bracket_id: BracketId(1),
            tournament_id: TournamentId(1),
            round: 1,
            match_number: 1,
            slots: [Some(ParticipantId(1)), Some(ParticipantId(2))],
            status: MatchStatus::Pending,
            scores: [None, None],
            winner: None,
        };

        let update = MatchUpdate {
            scores: [Some(2), Some(1)],
            winner: Some(ParticipantId(1)),
            status: MatchStatus::Completed,
        };

        r#match.apply_update(&update).unwrap();
        assert_eq!(r#match.update(), update);

        assert_eq!(
            r#match.apply_update(&update).unwrap_err(),
            Error::AlreadyDecided {
                match_number: 1,
                status: MatchStatus::Completed
            }
        );
        assert_eq!(
            r#match.apply_update(&update).unwrap_err().kind(),
            ErrorKind::Conflict
        );
    }
}
