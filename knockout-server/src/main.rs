mod brackets;
mod config;
mod logger;
mod store;

use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use knockout_core::id::{BracketId, MatchId, ParticipantId, TournamentId};
use knockout_core::{ErrorKind, MatchResult};
use thiserror::Error;

use crate::brackets::{BracketView, Brackets};
use crate::config::{Config, ConfigError};
use crate::store::MySqlStore;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Path to the config file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create all missing tables.
    Migrate,
    /// Create the bracket of a tournament.
    Generate { tournament: TournamentId },
    /// Print the bracket of a tournament.
    Show { tournament: TournamentId },
    /// Report the result of a match.
    Report {
        #[arg(value_name = "MATCH")]
        id: MatchId,
        #[arg(short, long)]
        winner: ParticipantId,
        /// The scores of the first and second slot. May be omitted to advance through a bye.
        #[arg(short, long, num_args = 2, value_names = ["SLOT1", "SLOT2"])]
        scores: Option<Vec<u64>>,
    },
    /// Cancel a pending match.
    Cancel {
        #[arg(value_name = "MATCH")]
        id: MatchId,
    },
    /// Move the winners of completed matches into a match of the next round.
    Propagate {
        bracket: BracketId,
        round: u32,
        match_number: u32,
    },
    /// Remove the bracket of a tournament.
    Reset { tournament: TournamentId },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match Config::from_file(&args.config).await {
        Ok(config) => config.with_environment(),
        Err(ConfigError::Io(err)) if err.kind() == IoErrorKind::NotFound => {
            Config::from_environment()?
        }
        Err(err) => return Err(err.into()),
    };

    logger::init(config.loglevel)?;

    let store = MySqlStore::connect_lazy(&config.database)?;

    if let Command::Migrate = args.command {
        store.migrate().await?;
        log::info!("Tables are up to date");
        return Ok(());
    }

    let brackets = Brackets::new(store).with_seed(config.seeding.seed);

    if let Err(err) = run(&brackets, args.command).await {
        log::error!("{}", err);
        std::process::exit(match err.kind() {
            ErrorKind::Validation => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::Conflict => 4,
            ErrorKind::Persistence => 1,
        });
    }

    Ok(())
}

async fn run(brackets: &Brackets<MySqlStore>, command: Command) -> Result<(), Error> {
    match command {
        Command::Migrate => (),
        Command::Generate { tournament } => {
            let view = brackets.generate(tournament).await?;
            print_bracket(&view);
        }
        Command::Show { tournament } => {
            let view = brackets.view(tournament).await?;
            print_bracket(&view);
        }
        Command::Report { id, winner, scores } => {
            let result = match scores.as_deref() {
                Some(&[score1, score2]) => MatchResult::new(winner, score1, score2),
                _ => MatchResult::bye(winner),
            };

            let report = brackets.report_result(id, result).await?;
            match report.next {
                Some(next) => println!(
                    "Match {} completed, participant {} advances to match {}",
                    report.r#match.match_number, winner, next.match_number
                ),
                None => println!(
                    "Match {} completed, participant {} wins the bracket",
                    report.r#match.match_number, winner
                ),
            }
        }
        Command::Cancel { id } => {
            let r#match = brackets.cancel_match(id).await?;
            println!("Match {} cancelled", r#match.match_number);
        }
        Command::Propagate {
            bracket,
            round,
            match_number,
        } => {
            let r#match = brackets.propagate(bracket, round, match_number).await?;
            println!(
                "Match {}: {} vs {}",
                r#match.match_number,
                display_slot(r#match.slots[0]),
                display_slot(r#match.slots[1])
            );
        }
        Command::Reset { tournament } => {
            brackets.reset(tournament).await?;
            println!("Bracket of tournament {} removed", tournament);
        }
    }

    Ok(())
}

fn print_bracket(view: &BracketView) {
    println!(
        "Bracket {} (tournament {}), round {} of {}",
        view.bracket.id,
        view.bracket.tournament_id,
        view.current_round(),
        view.bracket.structure.rounds
    );

    let mut round = 0;
    for entry in &view.matches {
        let r#match = &entry.r#match;
        if r#match.round != round {
            round = r#match.round;
            println!("Round {}", round);
        }

        let name = |index: usize| match (&entry.names[index], r#match.slots[index]) {
            (Some(name), _) => name.clone(),
            (None, slot) => display_slot(slot),
        };

        let scores = match r#match.scores {
            [Some(score1), Some(score2)] => format!(" ({}-{})", score1, score2),
            _ => String::new(),
        };

        println!(
            "  #{} [{}] {} vs {}{}",
            r#match.match_number,
            r#match.status,
            name(0),
            name(1),
            scores
        );
    }

    if let Some(champion) = view.champion() {
        println!("Champion: {}", champion);
    }
}

fn display_slot(slot: Option<ParticipantId>) -> String {
    match slot {
        Some(id) => id.to_string(),
        None => String::from("-"),
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Bracket(#[from] knockout_core::Error),
    #[error("{0}")]
    Store(#[from] sqlx::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid stored value in {0}")]
    InvalidRow(String),
    #[error("tournament {0} has no bracket")]
    NoBracket(TournamentId),
    #[error("bracket {0} not found")]
    BracketNotFound(BracketId),
    #[error("match {0} not found")]
    MatchNotFound(MatchId),
    #[error("bracket {bracket_id} has no match {match_number} in round {round}")]
    MatchNotInBracket {
        bracket_id: BracketId,
        round: u32,
        match_number: u32,
    },
    #[error("tournament {0} already has a bracket")]
    BracketExists(TournamentId),
    #[error(
        "result recorded, but the winner could not be moved into match {match_number} of \
         bracket {bracket_id}: {source}"
    )]
    Propagation {
        bracket_id: BracketId,
        round: u32,
        match_number: u32,
        source: Box<Error>,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Bracket(err) => err.kind(),
            Self::Store(_) | Self::Json(_) | Self::InvalidRow(_) => ErrorKind::Persistence,
            Self::NoBracket(_)
            | Self::BracketNotFound(_)
            | Self::MatchNotFound(_)
            | Self::MatchNotInBracket { .. } => ErrorKind::NotFound,
            Self::BracketExists(_) => ErrorKind::Conflict,
            Self::Propagation { source, .. } => source.kind(),
        }
    }
}
