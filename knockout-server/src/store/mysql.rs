use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use knockout_core::id::{BracketId, MatchId, ParticipantId, TournamentId, UserId};
use knockout_core::{BracketStructure, Match, MatchDescriptor, MatchUpdate, Participant, Slot};
use sqlx::mysql::{MySql, MySqlPool, MySqlRow};
use sqlx::pool::PoolOptions;
use sqlx::{Row, Transaction};

use super::{Bracket, MatchEntry, Store};
use crate::config::Database;
use crate::Error;

/// SQLSTATE for a violated unique or primary key.
const DUPLICATE_KEY: &str = "23000";

const MATCH_COLUMNS: &str = "id, bracket_id, tournament_id, round, match_number, slot1, slot2, \
                             status, score1, score2, winner";

/// A [`Store`] backed by a MySQL database.
#[derive(Clone, Debug)]
pub struct MySqlStore {
    pub pool: MySqlPool,
    pub table_prefix: String,
}

impl MySqlStore {
    /// Creates a new `MySqlStore`. No connection is opened until the first query.
    pub fn connect_lazy(config: &Database) -> Result<Self, Error> {
        let pool: MySqlPool = PoolOptions::new()
            .min_connections(0)
            .max_connections(8)
            .max_lifetime(Duration::new(3600, 0))
            .idle_timeout(Duration::new(60, 0))
            .connect_lazy(&config.connect_string())?;

        Ok(Self {
            pool,
            table_prefix: config.prefix.clone(),
        })
    }

    /// Creates all tables that don't exist yet.
    pub async fn migrate(&self) -> Result<(), Error> {
        let queries = [
            format!(
                "CREATE TABLE IF NOT EXISTS {}users (
                    id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
                    name TEXT NOT NULL
                )",
                self.table_prefix
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {}participants (
                    id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
                    tournament_id BIGINT UNSIGNED NOT NULL,
                    user_id BIGINT UNSIGNED NOT NULL,
                    status VARCHAR(16) NOT NULL,
                    seed INT UNSIGNED NULL,
                    KEY (tournament_id)
                )",
                self.table_prefix
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {}brackets (
                    id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
                    tournament_id BIGINT UNSIGNED NOT NULL UNIQUE,
                    structure MEDIUMTEXT NOT NULL,
                    current_round INT UNSIGNED NOT NULL,
                    created_at DATETIME NOT NULL,
                    updated_at DATETIME NOT NULL
                )",
                self.table_prefix
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {}matches (
                    id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
                    bracket_id BIGINT UNSIGNED NOT NULL,
                    tournament_id BIGINT UNSIGNED NOT NULL,
                    round INT UNSIGNED NOT NULL,
                    match_number INT UNSIGNED NOT NULL,
                    slot1 BIGINT UNSIGNED NULL,
                    slot2 BIGINT UNSIGNED NULL,
                    status VARCHAR(16) NOT NULL,
                    score1 BIGINT UNSIGNED NULL,
                    score2 BIGINT UNSIGNED NULL,
                    winner BIGINT UNSIGNED NULL,
                    UNIQUE KEY (bracket_id, match_number),
                    KEY (tournament_id, round, match_number)
                )",
                self.table_prefix
            ),
        ];

        for query in queries {
            sqlx::query(&query).execute(&self.pool).await?;
        }

        Ok(())
    }

    /// Locks the bracket of `match` and copies the state of `match` into its structure.
    async fn record(
        &self,
        tx: &mut Transaction<'_, MySql>,
        r#match: &Match,
    ) -> Result<(), Error> {
        let row = sqlx::query(&format!(
            "SELECT structure FROM {}brackets WHERE id = ? FOR UPDATE",
            self.table_prefix
        ))
        .bind(r#match.bracket_id.0)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::BracketNotFound(r#match.bracket_id))?;

        let structure: String = row.try_get("structure")?;
        let mut structure =
            BracketStructure::parse(&structure).map_err(knockout_core::Error::from)?;
        structure.record(r#match)?;

        sqlx::query(&format!(
            "UPDATE {}brackets SET structure = ?, current_round = ?, updated_at = ? WHERE id = ?",
            self.table_prefix
        ))
        .bind(structure.to_json()?)
        .bind(structure.current_round())
        .bind(Utc::now())
        .bind(r#match.bracket_id.0)
        .execute(&mut *tx)
        .await?;

        Ok(())
    }

    async fn lock_match(
        &self,
        tx: &mut Transaction<'_, MySql>,
        id: MatchId,
    ) -> Result<Match, Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {}matches WHERE id = ? FOR UPDATE",
            MATCH_COLUMNS, self.table_prefix
        ))
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::MatchNotFound(id))?;

        match_from_row(&row)
    }
}

#[async_trait]
impl Store for MySqlStore {
    async fn list_participants(
        &self,
        tournament_id: TournamentId,
    ) -> Result<Vec<Participant>, Error> {
        let sql = format!(
            "SELECT p.id, p.tournament_id, p.user_id, p.status, p.seed, u.name
            FROM {p}participants p
            JOIN {p}users u ON u.id = p.user_id
            WHERE p.tournament_id = ?
            ORDER BY p.id",
            p = self.table_prefix
        );

        let mut rows = sqlx::query(&sql).bind(tournament_id.0).fetch(&self.pool);

        let mut participants = Vec::new();
        while let Some(row) = rows.try_next().await? {
            let status: String = row.try_get("status")?;

            participants.push(Participant {
                id: ParticipantId(row.try_get("id")?),
                tournament_id: TournamentId(row.try_get("tournament_id")?),
                user_id: UserId(row.try_get("user_id")?),
                name: row.try_get("name")?,
                status: parse_column(&status, "participants.status")?,
                seed: row.try_get("seed")?,
            });
        }

        Ok(participants)
    }

    async fn insert_bracket(
        &self,
        tournament_id: TournamentId,
        structure: &BracketStructure,
    ) -> Result<Bracket, Error> {
        let now = Utc::now();

        let res = sqlx::query(&format!(
            "INSERT INTO {}brackets (tournament_id, structure, current_round, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)",
            self.table_prefix
        ))
        .bind(tournament_id.0)
        .bind(structure.to_json()?)
        .bind(structure.current_round())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        let res = match res {
            Ok(res) => res,
            Err(sqlx::Error::Database(err)) if err.code().as_deref() == Some(DUPLICATE_KEY) => {
                return Err(Error::BracketExists(tournament_id));
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Bracket {
            id: BracketId(res.last_insert_id()),
            tournament_id,
            structure: structure.clone(),
            current_round: structure.current_round(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn insert_matches(
        &self,
        bracket: &Bracket,
        matches: &[MatchDescriptor],
    ) -> Result<Vec<Match>, Error> {
        let sql = format!(
            "INSERT INTO {}matches (bracket_id, tournament_id, round, match_number, slot1, slot2, status)
            VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.table_prefix
        );

        let mut tx = self.pool.begin().await?;

        let mut inserted = Vec::with_capacity(matches.len());
        for descriptor in matches {
            let res = sqlx::query(&sql)
                .bind(bracket.id.0)
                .bind(bracket.tournament_id.0)
                .bind(descriptor.round)
                .bind(descriptor.match_number)
                .bind(descriptor.slot1.map(|id| id.0))
                .bind(descriptor.slot2.map(|id| id.0))
                .bind(descriptor.status.as_str())
                .execute(&mut tx)
                .await?;

            inserted.push(Match::new(
                MatchId(res.last_insert_id()),
                bracket.id,
                bracket.tournament_id,
                descriptor,
            ));
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn delete_bracket(&self, id: BracketId) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM {}matches WHERE bracket_id = ?",
            self.table_prefix
        ))
        .bind(id.0)
        .execute(&mut tx)
        .await?;

        sqlx::query(&format!(
            "DELETE FROM {}brackets WHERE id = ?",
            self.table_prefix
        ))
        .bind(id.0)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_bracket(&self, tournament_id: TournamentId) -> Result<Option<Bracket>, Error> {
        let row = match sqlx::query(&format!(
            "SELECT id, tournament_id, structure, current_round, created_at, updated_at
            FROM {}brackets WHERE tournament_id = ?",
            self.table_prefix
        ))
        .bind(tournament_id.0)
        .fetch_one(&self.pool)
        .await
        {
            Ok(row) => row,
            Err(sqlx::Error::RowNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        bracket_from_row(&row).map(Some)
    }

    async fn get_bracket_by_id(&self, id: BracketId) -> Result<Option<Bracket>, Error> {
        let row = match sqlx::query(&format!(
            "SELECT id, tournament_id, structure, current_round, created_at, updated_at
            FROM {}brackets WHERE id = ?",
            self.table_prefix
        ))
        .bind(id.0)
        .fetch_one(&self.pool)
        .await
        {
            Ok(row) => row,
            Err(sqlx::Error::RowNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        bracket_from_row(&row).map(Some)
    }

    async fn list_matches(&self, tournament_id: TournamentId) -> Result<Vec<MatchEntry>, Error> {
        let sql = format!(
            "SELECT m.id, m.bracket_id, m.tournament_id, m.round, m.match_number, m.slot1,
                m.slot2, m.status, m.score1, m.score2, m.winner,
                u1.name AS name1, u2.name AS name2
            FROM {p}matches m
            LEFT JOIN {p}participants p1 ON p1.id = m.slot1
            LEFT JOIN {p}users u1 ON u1.id = p1.user_id
            LEFT JOIN {p}participants p2 ON p2.id = m.slot2
            LEFT JOIN {p}users u2 ON u2.id = p2.user_id
            WHERE m.tournament_id = ?
            ORDER BY m.round, m.match_number",
            p = self.table_prefix
        );

        let mut rows = sqlx::query(&sql).bind(tournament_id.0).fetch(&self.pool);

        let mut matches = Vec::new();
        while let Some(row) = rows.try_next().await? {
            matches.push(MatchEntry {
                r#match: match_from_row(&row)?,
                names: [row.try_get("name1")?, row.try_get("name2")?],
            });
        }

        Ok(matches)
    }

    async fn get_match(&self, id: MatchId) -> Result<Option<Match>, Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {}matches WHERE id = ?",
            MATCH_COLUMNS, self.table_prefix
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(match_from_row).transpose()
    }

    async fn find_match(
        &self,
        bracket_id: BracketId,
        round: u32,
        match_number: u32,
    ) -> Result<Option<Match>, Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {}matches WHERE bracket_id = ? AND round = ? AND match_number = ?",
            MATCH_COLUMNS, self.table_prefix
        ))
        .bind(bracket_id.0)
        .bind(round)
        .bind(match_number)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(match_from_row).transpose()
    }

    async fn update_match(&self, id: MatchId, update: &MatchUpdate) -> Result<Match, Error> {
        let mut tx = self.pool.begin().await?;

        let mut r#match = self.lock_match(&mut tx, id).await?;
        r#match.apply_update(update)?;

        sqlx::query(&format!(
            "UPDATE {}matches SET status = ?, score1 = ?, score2 = ?, winner = ? WHERE id = ?",
            self.table_prefix
        ))
        .bind(r#match.status.as_str())
        .bind(r#match.scores[0])
        .bind(r#match.scores[1])
        .bind(r#match.winner.map(|id| id.0))
        .bind(id.0)
        .execute(&mut tx)
        .await?;

        self.record(&mut tx, &r#match).await?;

        tx.commit().await?;
        Ok(r#match)
    }

    async fn fill_slot(
        &self,
        id: MatchId,
        slot: Slot,
        participant: ParticipantId,
    ) -> Result<Match, Error> {
        let mut tx = self.pool.begin().await?;

        let mut r#match = self.lock_match(&mut tx, id).await?;
        if !knockout_core::fill_slot(&mut r#match, slot, participant)? {
            tx.rollback().await?;
            return Ok(r#match);
        }

        let column = match slot {
            Slot::First => "slot1",
            Slot::Second => "slot2",
        };

        sqlx::query(&format!(
            "UPDATE {}matches SET {} = ? WHERE id = ?",
            self.table_prefix, column
        ))
        .bind(participant.0)
        .bind(id.0)
        .execute(&mut tx)
        .await?;

        self.record(&mut tx, &r#match).await?;

        tx.commit().await?;
        Ok(r#match)
    }
}

fn match_from_row(row: &MySqlRow) -> Result<Match, Error> {
    let status: String = row.try_get("status")?;

    let slot1: Option<u64> = row.try_get("slot1")?;
    let slot2: Option<u64> = row.try_get("slot2")?;
    let winner: Option<u64> = row.try_get("winner")?;

    Ok(Match {
        id: MatchId(row.try_get("id")?),
        bracket_id: BracketId(row.try_get("bracket_id")?),
        tournament_id: TournamentId(row.try_get("tournament_id")?),
        round: row.try_get("round")?,
        match_number: row.try_get("match_number")?,
        slots: [slot1.map(ParticipantId), slot2.map(ParticipantId)],
        status: parse_column(&status, "matches.status")?,
        scores: [row.try_get("score1")?, row.try_get("score2")?],
        winner: winner.map(ParticipantId),
    })
}

fn bracket_from_row(row: &MySqlRow) -> Result<Bracket, Error> {
    let structure: String = row.try_get("structure")?;

    Ok(Bracket {
        id: BracketId(row.try_get("id")?),
        tournament_id: TournamentId(row.try_get("tournament_id")?),
        structure: BracketStructure::parse(&structure).map_err(knockout_core::Error::from)?,
        current_round: row.try_get("current_round")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Parses a text column, naming the column in the error.
fn parse_column<T>(value: &str, column: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|err| Error::InvalidRow(format!("{}: {}", column, err)))
}
