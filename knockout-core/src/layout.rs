//! The geometry of a single elimination bracket.
//!
//! The first round contains `ceil(n / 2)` matches for `n` participants, every following round `r`
//! contains `2^(rounds - r)` matches. Matches are numbered contiguously across the whole bracket,
//! starting at 1 with the first match of the first round.
//!
//! Pairing between rounds always uses the index of a match *relative to its round*: the matches
//! at index `2k` and `2k + 1` of round `r` feed the first and second slot of the match at index
//! `k` in round `r + 1`.
use crate::utils::NumExt;
use crate::{Error, Result, Slot};

/// The numbering and pairing of a bracket for a fixed number of participants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    participants: usize,
    rounds: u32,
    /// The first match number of every round, followed by the number after the last match.
    starts: Vec<u32>,
}

impl Layout {
    /// Creates the `Layout` for a bracket with `participants` participants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotEnoughParticipants`] if less than 2 participants are given.
    pub fn new(participants: usize) -> Result<Self> {
        if participants < 2 {
            return Err(Error::NotEnoughParticipants {
                found: participants,
            });
        }

        let rounds = participants.ilog2_ceil();

        let mut starts = Vec::with_capacity(rounds as usize + 1);
        let mut next = 1;
        for round in 1..=rounds {
            starts.push(next);
            next += match round {
                1 => ((participants + 1) / 2) as u32,
                round => 1 << (rounds - round),
            };
        }
        starts.push(next);

        Ok(Self {
            participants,
            rounds,
            starts,
        })
    }

    /// Returns the number of participants in the first round.
    #[inline]
    pub fn participants(&self) -> usize {
        self.participants
    }

    /// Returns the number of rounds.
    #[inline]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Returns the number of matches in all rounds.
    #[inline]
    pub fn total_matches(&self) -> usize {
        // `starts` always contains at least two elements.
        (self.starts[self.starts.len() - 1] - 1) as usize
    }

    /// Returns the number of matches in `round`. Returns 0 if `round` is not part of the bracket.
    pub fn round_len(&self, round: u32) -> u32 {
        if round == 0 || round > self.rounds {
            return 0;
        }

        let round = round as usize;
        self.starts[round] - self.starts[round - 1]
    }

    /// Returns the match number of the first match in `round`.
    pub fn first_match(&self, round: u32) -> Option<u32> {
        if round == 0 || round > self.rounds {
            None
        } else {
            Some(self.starts[round as usize - 1])
        }
    }

    /// Returns the round containing the match `match_number`.
    pub fn round_of(&self, match_number: u32) -> Option<u32> {
        (1..=self.rounds).find(|round| {
            let round = *round as usize;
            match_number >= self.starts[round - 1] && match_number < self.starts[round]
        })
    }

    /// Returns the round-relative index of `match_number`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMatch`] if `match_number` is not a match of `round`.
    pub fn index_of(&self, round: u32, match_number: u32) -> Result<usize> {
        match self.first_match(round) {
            Some(first) if match_number >= first && match_number - first < self.round_len(round) => {
                Ok((match_number - first) as usize)
            }
            _ => Err(Error::UnknownMatch { match_number }),
        }
    }

    /// Returns the match number of the match at the round-relative `index` in `round`.
    pub fn match_number(&self, round: u32, index: usize) -> Option<u32> {
        let first = self.first_match(round)?;

        if index < self.round_len(round) as usize {
            Some(first + index as u32)
        } else {
            None
        }
    }

    /// Returns the match and slot receiving the winner of `match_number`. Returns `None` if
    /// `match_number` is the final.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMatch`] if `match_number` is not a match of `round`.
    pub fn next(&self, round: u32, match_number: u32) -> Result<Option<Target>> {
        let index = self.index_of(round, match_number)?;

        let next_round = round + 1;
        Ok(self
            .match_number(next_round, index / 2)
            .map(|match_number| Target {
                round: next_round,
                match_number,
                slot: Slot::for_index(index),
            }))
    }

    /// Returns the match numbers of the matches feeding the first and second slot of
    /// `match_number`. First round matches are not fed by any match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMatch`] if `match_number` is not a match of `round`.
    pub fn feeders(&self, round: u32, match_number: u32) -> Result<[Option<u32>; 2]> {
        let index = self.index_of(round, match_number)?;

        if round == 1 {
            return Ok([None, None]);
        }

        Ok([
            self.match_number(round - 1, index * 2),
            self.match_number(round - 1, index * 2 + 1),
        ])
    }

    /// Returns `true` if `slot` of `match_number` can never receive a participant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMatch`] if `match_number` is not a match of `round`.
    pub fn is_bye(&self, round: u32, match_number: u32, slot: Slot) -> Result<bool> {
        let index = self.index_of(round, match_number)?;
        Ok(!self.is_live(round, index, slot))
    }

    /// Returns `false` if neither slot of `match_number` can ever receive a participant. Such a
    /// match stays pending forever.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMatch`] if `match_number` is not a match of `round`.
    pub fn is_playable(&self, round: u32, match_number: u32) -> Result<bool> {
        let index = self.index_of(round, match_number)?;
        Ok(self.is_live(round, index, Slot::First) || self.is_live(round, index, Slot::Second))
    }

    fn is_live(&self, round: u32, index: usize, slot: Slot) -> bool {
        if round == 1 {
            return index * 2 + slot.index() < self.participants;
        }

        let feeder = index * 2 + slot.index();
        if feeder >= self.round_len(round - 1) as usize {
            return false;
        }

        self.is_live(round - 1, feeder, Slot::First) || self.is_live(round - 1, feeder, Slot::Second)
    }
}

/// A slot in a later match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    pub round: u32,
    pub match_number: u32,
    pub slot: Slot,
}
