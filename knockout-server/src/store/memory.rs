use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use knockout_core::id::{BracketId, MatchId, ParticipantId, TournamentId, UserId};
use knockout_core::{
    BracketStructure, Match, MatchDescriptor, MatchUpdate, Participant, ParticipantStatus, Slot,
};
use parking_lot::Mutex;

use super::{id, Bracket, MatchEntry, Store};
use crate::Error;

/// A [`Store`] keeping everything in memory.
///
/// All operations take a single lock, which makes every operation atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, String>,
    participants: Vec<Participant>,
    brackets: HashMap<BracketId, Bracket>,
    matches: HashMap<MatchId, Match>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, name: &str) -> UserId {
        let id = UserId(id::USER.generate());

        let mut inner = self.inner.lock();
        inner.users.insert(id, name.to_owned());
        id
    }

    /// Creates a new user with the given `name` and registers them for the tournament.
    pub fn insert_participant(&self, tournament_id: TournamentId, name: &str) -> Participant {
        let user_id = self.insert_user(name);

        let participant = Participant {
            id: ParticipantId(id::PARTICIPANT.generate()),
            tournament_id,
            user_id,
            name: name.to_owned(),
            status: ParticipantStatus::Confirmed,
            seed: None,
        };

        let mut inner = self.inner.lock();
        inner.participants.push(participant.clone());
        participant
    }
}

impl Inner {
    fn name_of(&self, participant: Option<ParticipantId>) -> Option<String> {
        let participant = self
            .participants
            .iter()
            .find(|p| Some(p.id) == participant)?;

        self.users.get(&participant.user_id).cloned()
    }

    /// Writes `updated` into the match and bracket tables. Nothing is written if the bracket
    /// structure rejects the match.
    fn commit(&mut self, updated: Match) -> Result<Match, Error> {
        let bracket = self
            .brackets
            .get_mut(&updated.bracket_id)
            .ok_or(Error::BracketNotFound(updated.bracket_id))?;

        let mut structure = bracket.structure.clone();
        structure.record(&updated)?;

        bracket.current_round = structure.current_round();
        bracket.structure = structure;
        bracket.updated_at = Utc::now();

        self.matches.insert(updated.id, updated.clone());
        Ok(updated)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_participants(
        &self,
        tournament_id: TournamentId,
    ) -> Result<Vec<Participant>, Error> {
        let inner = self.inner.lock();

        let mut participants: Vec<_> = inner
            .participants
            .iter()
            .filter(|p| p.tournament_id == tournament_id)
            .cloned()
            .collect();

        participants.sort_by_key(|p| p.id);
        Ok(participants)
    }

    async fn insert_bracket(
        &self,
        tournament_id: TournamentId,
        structure: &BracketStructure,
    ) -> Result<Bracket, Error> {
        let mut inner = self.inner.lock();

        if inner
            .brackets
            .values()
            .any(|b| b.tournament_id == tournament_id)
        {
            return Err(Error::BracketExists(tournament_id));
        }

        let now = Utc::now();
        let bracket = Bracket {
            id: BracketId(id::BRACKET.generate()),
            tournament_id,
            structure: structure.clone(),
            current_round: structure.current_round(),
            created_at: now,
            updated_at: now,
        };

        inner.brackets.insert(bracket.id, bracket.clone());
        Ok(bracket)
    }

    async fn insert_matches(
        &self,
        bracket: &Bracket,
        matches: &[MatchDescriptor],
    ) -> Result<Vec<Match>, Error> {
        let mut inner = self.inner.lock();

        if !inner.brackets.contains_key(&bracket.id) {
            return Err(Error::BracketNotFound(bracket.id));
        }

        let matches: Vec<_> = matches
            .iter()
            .map(|descriptor| {
                Match::new(
                    MatchId(id::MATCH.generate()),
                    bracket.id,
                    bracket.tournament_id,
                    descriptor,
                )
            })
            .collect();

        for r#match in &matches {
            inner.matches.insert(r#match.id, r#match.clone());
        }

        Ok(matches)
    }

    async fn delete_bracket(&self, id: BracketId) -> Result<(), Error> {
        let mut inner = self.inner.lock();

        inner.brackets.remove(&id);
        inner.matches.retain(|_, m| m.bracket_id != id);
        Ok(())
    }

    async fn get_bracket(&self, tournament_id: TournamentId) -> Result<Option<Bracket>, Error> {
        let inner = self.inner.lock();

        Ok(inner
            .brackets
            .values()
            .find(|b| b.tournament_id == tournament_id)
            .cloned())
    }

    async fn get_bracket_by_id(&self, id: BracketId) -> Result<Option<Bracket>, Error> {
        let inner = self.inner.lock();
        Ok(inner.brackets.get(&id).cloned())
    }

    async fn list_matches(&self, tournament_id: TournamentId) -> Result<Vec<MatchEntry>, Error> {
        let inner = self.inner.lock();

        let mut matches: Vec<_> = inner
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .collect();

        matches.sort_by_key(|m| (m.round, m.match_number));

        Ok(matches
            .into_iter()
            .map(|m| MatchEntry {
                names: [inner.name_of(m.slots[0]), inner.name_of(m.slots[1])],
                r#match: m.clone(),
            })
            .collect())
    }

    async fn get_match(&self, id: MatchId) -> Result<Option<Match>, Error> {
        let inner = self.inner.lock();
        Ok(inner.matches.get(&id).cloned())
    }

    async fn find_match(
        &self,
        bracket_id: BracketId,
        round: u32,
        match_number: u32,
    ) -> Result<Option<Match>, Error> {
        let inner = self.inner.lock();

        Ok(inner
            .matches
            .values()
            .find(|m| {
                m.bracket_id == bracket_id && m.round == round && m.match_number == match_number
            })
            .cloned())
    }

    async fn update_match(&self, id: MatchId, update: &MatchUpdate) -> Result<Match, Error> {
        let mut inner = self.inner.lock();

        let mut r#match = inner
            .matches
            .get(&id)
            .cloned()
            .ok_or(Error::MatchNotFound(id))?;

        r#match.apply_update(update)?;
        inner.commit(r#match)
    }

    async fn fill_slot(
        &self,
        id: MatchId,
        slot: Slot,
        participant: ParticipantId,
    ) -> Result<Match, Error> {
        let mut inner = self.inner.lock();

        let mut r#match = inner
            .matches
            .get(&id)
            .cloned()
            .ok_or(Error::MatchNotFound(id))?;

        if !knockout_core::fill_slot(&mut r#match, slot, participant)? {
            return Ok(r#match);
        }

        inner.commit(r#match)
    }
}

#[cfg(test)]
mod tests {
    use knockout_core::id::{MatchId, TournamentId};
    use knockout_core::{build_ordered, ErrorKind, MatchStatus, MatchUpdate, Slot};

    use super::MemoryStore;
    use crate::store::Store;
    use crate::Error;

    const TOURNAMENT: TournamentId = TournamentId(1);

    async fn setup(names: &[&str]) -> (MemoryStore, super::Bracket, Vec<knockout_core::Match>) {
        let store = MemoryStore::new();
        let participants: Vec<_> = names
            .iter()
            .map(|name| store.insert_participant(TOURNAMENT, name).id)
            .collect();

        let plan = build_ordered(participants).unwrap();
        let bracket = store
            .insert_bracket(TOURNAMENT, &plan.structure())
            .await
            .unwrap();
        let matches = store.insert_matches(&bracket, plan.matches()).await.unwrap();

        (store, bracket, matches)
    }

    #[tokio::test]
    async fn test_list_participants() {
        let store = MemoryStore::new();
        let a = store.insert_participant(TOURNAMENT, "A");
        let b = store.insert_participant(TOURNAMENT, "B");
        store.insert_participant(TournamentId(2), "C");

        let participants = store.list_participants(TOURNAMENT).await.unwrap();
        assert_eq!(participants, [a, b]);
    }

    #[tokio::test]
    async fn test_insert_bracket_exists() {
        let (store, bracket, _) = setup(&["A", "B", "C"]).await;

        let err = store
            .insert_bracket(TOURNAMENT, &bracket.structure)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BracketExists(id) if id == TOURNAMENT));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_list_matches() {
        let (store, _, matches) = setup(&["A", "B", "C"]).await;

        let entries = store.list_matches(TOURNAMENT).await.unwrap();
        assert_eq!(entries.len(), 3);

        let numbers: Vec<_> = entries.iter().map(|e| e.r#match.match_number).collect();
        assert_eq!(numbers, [1, 2, 3]);

        assert_eq!(entries[0].r#match, matches[0]);
        assert_eq!(
            entries[0].names,
            [Some(String::from("A")), Some(String::from("B"))]
        );
        assert_eq!(entries[1].names, [Some(String::from("C")), None]);
        assert_eq!(entries[2].names, [None, None]);
    }

    #[tokio::test]
    async fn test_update_match() {
        let (store, bracket, matches) = setup(&["A", "B", "C"]).await;
        let winner = matches[0].slots[0];

        let update = MatchUpdate {
            scores: [Some(3), Some(1)],
            winner,
            status: MatchStatus::Completed,
        };

        let r#match = store.update_match(matches[0].id, &update).await.unwrap();
        assert_eq!(r#match.update(), update);

        let bracket = store.get_bracket_by_id(bracket.id).await.unwrap().unwrap();
        let descriptor = bracket.structure.get(1).unwrap();
        assert_eq!(descriptor.status, MatchStatus::Completed);
        assert_eq!(descriptor.winner, winner);
        assert_eq!(bracket.current_round, 1);

        let err = store.update_match(matches[0].id, &update).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = store.update_match(MatchId(0), &update).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_fill_slot() {
        let (store, bracket, matches) = setup(&["A", "B", "C"]).await;
        let a = matches[0].slots[0].unwrap();
        let b = matches[0].slots[1].unwrap();

        let r#match = store.fill_slot(matches[2].id, Slot::First, a).await.unwrap();
        assert_eq!(r#match.slots, [Some(a), None]);

        // Writing the same participant twice is fine.
        let r#match = store.fill_slot(matches[2].id, Slot::First, a).await.unwrap();
        assert_eq!(r#match.slots, [Some(a), None]);

        let err = store
            .fill_slot(matches[2].id, Slot::First, b)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let bracket = store.get_bracket_by_id(bracket.id).await.unwrap().unwrap();
        assert_eq!(bracket.structure.get(3).unwrap().slots(), [Some(a), None]);
    }

    #[tokio::test]
    async fn test_delete_bracket() {
        let (store, bracket, _) = setup(&["A", "B", "C"]).await;

        store.delete_bracket(bracket.id).await.unwrap();

        assert_eq!(store.get_bracket(TOURNAMENT).await.unwrap(), None);
        assert!(store.list_matches(TOURNAMENT).await.unwrap().is_empty());
    }
}
