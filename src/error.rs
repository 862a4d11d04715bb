use crate::battle::Side;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{side:?} roster is empty")]
    InvalidTeam { side: Side },
    #[error("{species} knows more than four moves")]
    InvalidMoveSet { species: String },
    #[error("invalid action: {0}")]
    InvalidAction(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
