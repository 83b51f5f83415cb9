use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq)]
pub enum ModelError {
    WrongPlayerCount(usize),
    DuplicateAgent(String),
    DuplicateGood(String),
    MissingValuation { player: String, good: String },
    NegativeValuation { player: String, good: String, value: f64 },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongPlayerCount(count) => {
                write!(f, "exactly four players are required, got {count}")
            }
            Self::DuplicateAgent(name) => write!(f, "duplicate player name: {name}"),
            Self::DuplicateGood(good) => write!(f, "duplicate good: {good}"),
            Self::MissingValuation { player, good } => {
                write!(f, "player {player} has no valuation for good {good}")
            }
            Self::NegativeValuation {
                player,
                good,
                value,
            } => {
                write!(f, "player {player} values good {good} at {value} (negative)")
            }
        }
    }
}

impl Error for ModelError {}
