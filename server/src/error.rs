//! Rejections produced by the game core
//!
//! Nothing here is fatal. Each variant is either reported back to the
//! offending connection as a notice or dropped with a debug log, depending
//! on [`GameError::is_silent`].

use shared::{MAX_PLAYERS, MIN_PLAYERS_TO_START};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("The room is full (max {} players)", MAX_PLAYERS)]
    RoomFull,
    #[error("A username is required")]
    BlankUsername,
    #[error("A room code is required")]
    BlankRoomCode,
    #[error("Only the host can do that")]
    NotHost,
    #[error("At least {} players are needed to start the game", MIN_PLAYERS_TO_START)]
    NotEnoughPlayers,
    #[error("The game has already started")]
    AlreadyStarted,
    #[error("The game is not running")]
    NotRunning,
    #[error("A fact cannot be empty")]
    BlankFact,

    #[error("room {0} does not exist")]
    UnknownRoom(String),
    #[error("client {0} is not in the room")]
    NotAMember(u32),
    #[error("client {0} is not the current submitter")]
    NotYourTurn(u32),
    #[error("the submitter cannot vote on their own fact")]
    SubmitterVote,
    #[error("client {0} has already voted")]
    DuplicateVote(u32),
    #[error("there is no fact open for voting")]
    NoActiveFact,
}

impl GameError {
    /// Rejections that are dropped without telling the client. These are
    /// stale or duplicated requests, such as a vote arriving after the reveal.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            GameError::UnknownRoom(_)
                | GameError::NotAMember(_)
                | GameError::NotYourTurn(_)
                | GameError::SubmitterVote
                | GameError::DuplicateVote(_)
                | GameError::NoActiveFact
        )
    }

    /// Join failures are reported as `JoinError`, everything else as `GameError`.
    pub fn is_join_error(&self) -> bool {
        matches!(
            self,
            GameError::RoomFull | GameError::BlankUsername | GameError::BlankRoomCode
        )
    }
}
