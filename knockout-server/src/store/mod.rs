#[cfg(test)]
pub mod id;
#[cfg(test)]
pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use knockout_core::id::{BracketId, MatchId, ParticipantId, TournamentId};
use knockout_core::{BracketStructure, Match, MatchDescriptor, MatchUpdate, Participant, Slot};
use serde::{Deserialize, Serialize};

use crate::Error;

#[cfg(test)]
pub use memory::MemoryStore;
pub use mysql::MySqlStore;

/// A persisted bracket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    pub id: BracketId,
    pub tournament_id: TournamentId,
    /// The summary of all matches. Kept in sync with the match rows on every write.
    pub structure: BracketStructure,
    pub current_round: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A [`Match`] together with the display names of the participants in both slots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEntry {
    pub r#match: Match,
    pub names: [Option<String>; 2],
}

/// The storage of participants, brackets and matches.
///
/// Every method is a single atomic unit. Writes to a match also update the structure document
/// and the current round of its bracket within the same unit.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns all participants of the tournament ordered by their id.
    async fn list_participants(&self, tournament_id: TournamentId)
        -> Result<Vec<Participant>, Error>;

    /// Inserts a new bracket for the tournament.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BracketExists`] if the tournament already has a bracket.
    async fn insert_bracket(
        &self,
        tournament_id: TournamentId,
        structure: &BracketStructure,
    ) -> Result<Bracket, Error>;

    /// Inserts all `matches` of `bracket`. Either all or none of the matches are inserted.
    async fn insert_matches(
        &self,
        bracket: &Bracket,
        matches: &[MatchDescriptor],
    ) -> Result<Vec<Match>, Error>;

    /// Deletes the bracket with the given `id` and all of its matches.
    async fn delete_bracket(&self, id: BracketId) -> Result<(), Error>;

    async fn get_bracket(&self, tournament_id: TournamentId) -> Result<Option<Bracket>, Error>;

    async fn get_bracket_by_id(&self, id: BracketId) -> Result<Option<Bracket>, Error>;

    /// Returns all matches of the tournament ordered by round and match number.
    async fn list_matches(&self, tournament_id: TournamentId) -> Result<Vec<MatchEntry>, Error>;

    async fn get_match(&self, id: MatchId) -> Result<Option<Match>, Error>;

    async fn find_match(
        &self,
        bracket_id: BracketId,
        round: u32,
        match_number: u32,
    ) -> Result<Option<Match>, Error>;

    /// Applies `update` to a pending match and returns the updated match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MatchNotFound`] if the match doesn't exist and a conflict if the match is
    /// no longer pending.
    async fn update_match(&self, id: MatchId, update: &MatchUpdate) -> Result<Match, Error>;

    /// Writes `participant` into `slot` of the match and returns the updated match. Writing the
    /// same participant again has no effect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MatchNotFound`] if the match doesn't exist and a conflict if the slot is
    /// taken by another participant.
    async fn fill_slot(
        &self,
        id: MatchId,
        slot: Slot,
        participant: ParticipantId,
    ) -> Result<Match, Error>;
}
