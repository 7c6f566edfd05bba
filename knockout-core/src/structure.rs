//! The structure document stored with every bracket.
//!
//! The document is a summary of all match rows of a bracket:
//!
//! ```json
//! {
//!     "rounds": 2,
//!     "matches": [
//!         { "match_number": 1, "round": 1, "slot1": 4, "slot2": 9, "status": "pending" },
//!         { "match_number": 2, "round": 1, "slot1": 2, "slot2": null, "status": "pending" },
//!         { "match_number": 3, "round": 2, "slot1": null, "slot2": null, "status": "pending" }
//!     ]
//! }
//! ```
//!
//! Documents read back from storage must go through [`BracketStructure::parse`] before being
//! used.
use serde::{Deserialize, Serialize};

use crate::id::ParticipantId;
use crate::layout::Layout;
use crate::{Error, Match, MatchStatus, Result};

/// The summary of a bracket and all of its matches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketStructure {
    pub rounds: u32,
    /// All matches, ordered by their match number.
    pub matches: Vec<MatchDescriptor>,
}

impl BracketStructure {
    /// Parses and validates a structure document.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] if a field is missing, has the wrong type or the matches are not
    /// numbered contiguously starting at 1.
    pub fn parse(raw: &str) -> std::result::Result<Self, FormatError> {
        let this: Self = serde_json::from_str(raw).map_err(FormatError::new)?;
        this.validate()?;
        Ok(this)
    }

    /// Parses and validates a structure document from raw bytes.
    ///
    /// # Errors
    ///
    /// See [`parse`].
    ///
    /// [`parse`]: Self::parse
    pub fn parse_slice(raw: &[u8]) -> std::result::Result<Self, FormatError> {
        let this: Self = serde_json::from_slice(raw).map_err(FormatError::new)?;
        this.validate()?;
        Ok(this)
    }

    /// Serializes the structure into its JSON text representation.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn validate(&self) -> std::result::Result<(), FormatError> {
        if self.rounds == 0 {
            return Err(FormatError(String::from("bracket has no rounds")));
        }

        if self.matches.is_empty() {
            return Err(FormatError(String::from("bracket has no matches")));
        }

        for (index, descriptor) in self.matches.iter().enumerate() {
            if descriptor.match_number as usize != index + 1 {
                return Err(FormatError(format!(
                    "expected match number {}, found {}",
                    index + 1,
                    descriptor.match_number
                )));
            }

            if descriptor.round == 0 || descriptor.round > self.rounds {
                return Err(FormatError(format!(
                    "match {} is in round {} of a bracket with {} rounds",
                    descriptor.match_number, descriptor.round, self.rounds
                )));
            }
        }

        Ok(())
    }

    /// Returns the [`Layout`] of the bracket. The number of participants is taken from the first
    /// round.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if the matches don't follow the layout of a single elimination
    /// bracket for that number of participants.
    pub fn layout(&self) -> Result<Layout> {
        let participants = self
            .matches
            .iter()
            .filter(|descriptor| descriptor.round == 1)
            .map(|descriptor| descriptor.slots().iter().flatten().count())
            .sum();

        let layout = Layout::new(participants)?;

        if layout.total_matches() != self.matches.len() {
            return Err(Error::InvalidNumberOfMatches {
                expected: layout.total_matches(),
                found: self.matches.len(),
            });
        }

        if layout.rounds() != self.rounds {
            return Err(FormatError(format!(
                "expected {} rounds for {} participants, found {}",
                layout.rounds(),
                participants,
                self.rounds
            ))
            .into());
        }

        for descriptor in &self.matches {
            if layout.round_of(descriptor.match_number) != Some(descriptor.round) {
                return Err(FormatError(format!(
                    "match {} is placed in the wrong round {}",
                    descriptor.match_number, descriptor.round
                ))
                .into());
            }
        }

        Ok(layout)
    }

    /// Returns the descriptor of `match_number`.
    pub fn get(&self, match_number: u32) -> Option<&MatchDescriptor> {
        let index = (match_number as usize).checked_sub(1)?;
        self.matches.get(index)
    }

    /// Copies the current state of `match` into its descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMatch`] if the document contains no descriptor for `match`.
    pub fn record(&mut self, r#match: &Match) -> Result<()> {
        let descriptor = (r#match.match_number as usize)
            .checked_sub(1)
            .and_then(|index| self.matches.get_mut(index))
            .filter(|descriptor| descriptor.round == r#match.round)
            .ok_or(Error::UnknownMatch {
                match_number: r#match.match_number,
            })?;

        descriptor.slot1 = r#match.slots[0];
        descriptor.slot2 = r#match.slots[1];
        descriptor.status = r#match.status;
        descriptor.winner = r#match.winner;
        Ok(())
    }

    /// Returns the lowest round that still has a pending match. Matches that can never receive
    /// a participant are ignored. Once all matches are decided this is the final round.
    pub fn current_round(&self) -> u32 {
        let layout = self.layout().ok();

        self.matches
            .iter()
            .filter(|descriptor| descriptor.status.is_pending())
            .filter(|descriptor| match &layout {
                Some(layout) => layout
                    .is_playable(descriptor.round, descriptor.match_number)
                    .unwrap_or(true),
                None => true,
            })
            .map(|descriptor| descriptor.round)
            .min()
            .unwrap_or(self.rounds)
    }

    /// Returns the winner of the final. Returns `None` if the final is not completed yet.
    pub fn champion(&self) -> Option<ParticipantId> {
        let r#final = self.matches.last()?;

        match r#final.status {
            MatchStatus::Completed => r#final.winner,
            _ => None,
        }
    }

    /// Returns `true` if the final is no longer pending.
    pub fn is_finished(&self) -> bool {
        self.matches
            .last()
            .map(|r#final| !r#final.status.is_pending())
            .unwrap_or(false)
    }
}

/// The summary of a single match within a [`BracketStructure`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDescriptor {
    pub match_number: u32,
    pub round: u32,
    #[serde(default)]
    pub slot1: Option<ParticipantId>,
    #[serde(default)]
    pub slot2: Option<ParticipantId>,
    pub status: MatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<ParticipantId>,
}

impl MatchDescriptor {
    /// Creates a new pending `MatchDescriptor`.
    #[inline]
    pub fn new(match_number: u32, round: u32, slots: [Option<ParticipantId>; 2]) -> Self {
        Self {
            match_number,
            round,
            slot1: slots[0],
            slot2: slots[1],
            status: MatchStatus::Pending,
            winner: None,
        }
    }

    #[inline]
    pub fn slots(&self) -> [Option<ParticipantId>; 2] {
        [self.slot1, self.slot2]
    }
}

/// A structure document with a missing field, a field of the wrong type or an inconsistent
/// numbering.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
#[error("malformed bracket structure: {0}")]
pub struct FormatError(pub String);

impl FormatError {
    fn new(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{BracketStructure, FormatError, MatchDescriptor};
    use crate::builder::build_ordered;
    use crate::id::{BracketId, MatchId, ParticipantId, TournamentId};
    use crate::{Error, Match, MatchStatus};

    const DOCUMENT: &str = r#"{
        "rounds": 2,
        "matches": [
            { "match_number": 1, "round": 1, "slot1": 4, "slot2": 9, "status": "pending" },
            { "match_number": 2, "round": 1, "slot1": 2, "slot2": null, "status": "pending" },
            { "match_number": 3, "round": 2, "slot1": null, "slot2": null, "status": "pending" }
        ]
    }"#;

    #[test]
    fn test_structure_parse() {
        let structure = BracketStructure::parse(DOCUMENT).unwrap();

        assert_eq!(structure.rounds, 2);
        assert_eq!(
            structure.matches,
            vec![
                MatchDescriptor::new(1, 1, [Some(ParticipantId(4)), Some(ParticipantId(9))]),
                MatchDescriptor::new(2, 1, [Some(ParticipantId(2)), None]),
                MatchDescriptor::new(3, 2, [None, None]),
            ]
        );

        let layout = structure.layout().unwrap();
        assert_eq!(layout.participants(), 3);
        assert_eq!(layout.rounds(), 2);

        // Unknown fields are ignored.
        let raw = r#"{"rounds":1,"matches":[{"match_number":1,"round":1,"status":"completed","note":"x"}]}"#;
        let structure = BracketStructure::parse(raw).unwrap();
        assert_eq!(structure.matches[0].status, MatchStatus::Completed);
        assert_eq!(structure.matches[0].slot1, None);
    }

    #[test]
    fn test_structure_parse_invalid() {
        let inputs = [
            "",
            "[]",
            r#"{"matches":[]}"#,
            r#"{"rounds":"2","matches":[]}"#,
            r#"{"rounds":1.5,"matches":[]}"#,
            r#"{"rounds":1}"#,
            r#"{"rounds":1,"matches":{}}"#,
            r#"{"rounds":1,"matches":[]}"#,
            r#"{"rounds":0,"matches":[{"match_number":1,"round":1,"status":"pending"}]}"#,
            r#"{"rounds":1,"matches":[{"round":1,"status":"pending"}]}"#,
            r#"{"rounds":1,"matches":[{"match_number":1,"status":"pending"}]}"#,
            r#"{"rounds":1,"matches":[{"match_number":1,"round":1}]}"#,
            r#"{"rounds":1,"matches":[{"match_number":1,"round":1,"status":"done"}]}"#,
            r#"{"rounds":1,"matches":[{"match_number":1,"round":1,"status":3}]}"#,
            r#"{"rounds":1,"matches":[{"match_number":-1,"round":1,"status":"pending"}]}"#,
            r#"{"rounds":1,"matches":[{"match_number":1,"round":1,"slot1":"a","status":"pending"}]}"#,
            r#"{"rounds":1,"matches":[{"match_number":1,"round":2,"status":"pending"}]}"#,
            r#"{"rounds":1,"matches":[{"match_number":2,"round":1,"status":"pending"}]}"#,
        ];

        for input in inputs {
            let err = BracketStructure::parse(input).unwrap_err();
            assert!(matches!(err, FormatError(_)), "{}", input);

            assert!(BracketStructure::parse_slice(input.as_bytes()).is_err());
        }
    }

    #[test]
    fn test_structure_layout_mismatch() {
        // Three participants require three matches.
        let raw = r#"{"rounds":2,"matches":[
            {"match_number":1,"round":1,"slot1":1,"slot2":2,"status":"pending"},
            {"match_number":2,"round":1,"slot1":3,"status":"pending"}
        ]}"#;
        let structure = BracketStructure::parse(raw).unwrap();

        assert_eq!(
            structure.layout().unwrap_err(),
            Error::InvalidNumberOfMatches {
                expected: 3,
                found: 2
            }
        );

        let raw = r#"{"rounds":2,"matches":[
            {"match_number":1,"round":1,"slot1":1,"slot2":2,"status":"pending"},
            {"match_number":2,"round":1,"slot1":3,"status":"pending"},
            {"match_number":3,"round":1,"status":"pending"}
        ]}"#;
        let structure = BracketStructure::parse(raw).unwrap();

        assert!(matches!(structure.layout().unwrap_err(), Error::Format(_)));
    }

    #[test]
    fn test_structure_roundtrip() {
        let participants = [1, 2, 3, 4, 5].map(ParticipantId);
        let structure = build_ordered(participants).unwrap().structure();

        let raw = structure.to_json().unwrap();
        assert_eq!(BracketStructure::parse(&raw).unwrap(), structure);
    }

    #[test]
    fn test_structure_record() {
        let [a, b, c] = [1, 2, 3].map(ParticipantId);
        let mut structure = build_ordered([a, b, c]).unwrap().structure();

        assert_eq!(structure.current_round(), 1);
        assert_eq!(structure.champion(), None);

        let mut r#match = Match::new(
            MatchId(1),
            BracketId(1),
            TournamentId(1),
            structure.get(1).unwrap(),
        );
        r#match.status = MatchStatus::Completed;
        r#match.scores = [Some(3), Some(0)];
        r#match.winner = Some(a);
        structure.record(&r#match).unwrap();

        assert_eq!(structure.get(1).unwrap().status, MatchStatus::Completed);
        assert_eq!(structure.get(1).unwrap().winner, Some(a));
        assert_eq!(structure.current_round(), 1);

        let mut r#match = Match::new(
            MatchId(2),
            BracketId(1),
            TournamentId(1),
            structure.get(2).unwrap(),
        );
        r#match.status = MatchStatus::Completed;
        r#match.scores = [Some(0), Some(0)];
        r#match.winner = Some(c);
        structure.record(&r#match).unwrap();
        assert_eq!(structure.current_round(), 2);

        let mut r#final = Match::new(
            MatchId(3),
            BracketId(1),
            TournamentId(1),
            structure.get(3).unwrap(),
        );
        r#final.slots = [Some(a), Some(c)];
        structure.record(&r#final).unwrap();
        assert_eq!(structure.get(3).unwrap().slots(), [Some(a), Some(c)]);
        assert!(!structure.is_finished());

        r#final.status = MatchStatus::Completed;
        r#final.winner = Some(c);
        structure.record(&r#final).unwrap();

        assert_eq!(structure.current_round(), 2);
        assert_eq!(structure.champion(), Some(c));
        assert!(structure.is_finished());

        // The descriptor of match 3 is in round 2.
        r#final.round = 1;
        assert_eq!(
            structure.record(&r#final).unwrap_err(),
            Error::UnknownMatch { match_number: 3 }
        );
    }

    #[test]
    fn test_structure_current_round_unplayable() {
        let participants: Vec<_> = (1..=9).map(ParticipantId).collect();
        let mut structure = build_ordered(participants).unwrap().structure();

        for match_number in 1..=5 {
            let descriptor = structure.get(match_number).unwrap();
            let mut r#match = Match::new(
                MatchId(match_number as u64),
                BracketId(1),
                TournamentId(1),
                descriptor,
            );
            r#match.status = MatchStatus::Completed;
            r#match.winner = descriptor.slot1;
            structure.record(&r#match).unwrap();
        }

        assert_eq!(structure.current_round(), 2);

        for match_number in 6..=8 {
            let mut r#match = Match::new(
                MatchId(match_number as u64),
                BracketId(1),
                TournamentId(1),
                structure.get(match_number).unwrap(),
            );
            r#match.status = MatchStatus::Completed;
            structure.record(&r#match).unwrap();
        }

        // Match 9 is never fed and stays pending.
        assert!(structure.get(9).unwrap().status.is_pending());
        assert_eq!(structure.current_round(), 3);
    }
}
