//! Room, roster and round records
//!
//! The roster is kept in join order and is never re-sorted: that order is the
//! submitter rotation. The score-sorted leaderboard clients see is a derived
//! projection built by [`Room::leaderboard`].

use crate::timer::PhaseTimer;
use shared::{
    ChatEntry, ClientId, GameMode, Packet, PlayerInfo, VoteInfo, CHAT_HISTORY_LIMIT,
    VOTE_TIME_CAP_SECS,
};
use std::collections::VecDeque;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: ClientId,
    pub name: String,
    pub score: i64,
    pub is_host: bool,
    pub ready: bool,
}

impl Player {
    pub fn new(id: ClientId, name: String, is_host: bool) -> Self {
        Self {
            id,
            name,
            score: 0,
            is_host,
            ready: false,
        }
    }

    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id,
            name: self.name.clone(),
            score: self.score,
            is_host: self.is_host,
            ready: self.ready,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    pub voter: ClientId,
    pub vote: bool,
    /// Seconds between submission and vote, capped at [`VOTE_TIME_CAP_SECS`].
    pub response_secs: f32,
}

impl Vote {
    pub fn info(&self) -> VoteInfo {
        VoteInfo {
            voter: self.voter,
            vote: self.vote,
            response_secs: self.response_secs,
        }
    }
}

/// One round's statement and the votes cast on it.
#[derive(Debug, Clone)]
pub struct Fact {
    pub text: String,
    pub is_true: bool,
    pub submitted_by: ClientId,
    pub submitter_name: String,
    pub submitted_at: Instant,
    pub votes: Vec<Vote>,
    /// Set once the round has been scored or abandoned.
    pub finalized: bool,
}

impl Fact {
    pub fn new(
        text: String,
        is_true: bool,
        submitted_by: ClientId,
        submitter_name: String,
        submitted_at: Instant,
    ) -> Self {
        Self {
            text,
            is_true,
            submitted_by,
            submitter_name,
            submitted_at,
            votes: Vec::new(),
            finalized: false,
        }
    }

    pub fn has_voted(&self, voter: ClientId) -> bool {
        self.votes.iter().any(|v| v.voter == voter)
    }

    /// Elapsed time since submission in seconds, capped.
    pub fn response_secs(&self, now: Instant) -> f32 {
        now.saturating_duration_since(self.submitted_at)
            .as_secs_f32()
            .min(VOTE_TIME_CAP_SECS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Lobby,
    AwaitingSubmission,
    AwaitingVotes,
    Reveal,
    /// The host ended the match; the room stays open but no rounds run.
    Finished,
}

#[derive(Debug)]
pub struct Room {
    pub code: String,
    pub players: Vec<Player>,
    pub facts: Vec<Fact>,
    pub chat: VecDeque<ChatEntry>,
    /// Rotation position of the most recent submitter, `None` before the first.
    pub last_submitter_index: Option<usize>,
    pub timer: PhaseTimer,
    pub game_mode: GameMode,
    pub in_lobby: bool,
    pub game_started: bool,
    pub phase: RoundPhase,
}

impl Room {
    pub fn new(code: String, game_mode: GameMode) -> Self {
        Self {
            code,
            players: Vec::new(),
            facts: Vec::new(),
            chat: VecDeque::new(),
            last_submitter_index: None,
            timer: PhaseTimer::new(),
            game_mode,
            in_lobby: true,
            game_started: false,
            phase: RoundPhase::Lobby,
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: ClientId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn player(&self, id: ClientId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: ClientId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }

    pub fn member_ids(&self) -> Vec<ClientId> {
        self.players.iter().map(|p| p.id).collect()
    }

    /// Appends a player to the end of the rotation. The first player becomes
    /// host. Returns false if the player was already present.
    pub fn add_player(&mut self, id: ClientId, name: String) -> bool {
        if self.contains(id) {
            return false;
        }
        let is_host = self.players.is_empty();
        self.players.push(Player::new(id, name, is_host));
        true
    }

    /// Removes a player, handing the host flag to the new first roster entry
    /// if needed. Returns the roster position the player held.
    ///
    /// Rotation bookkeeping is left to the caller.
    pub fn remove_player(&mut self, id: ClientId) -> Option<(usize, Player)> {
        let index = self.position(id)?;
        let player = self.players.remove(index);
        if player.is_host {
            if let Some(first) = self.players.first_mut() {
                first.is_host = true;
            }
        }
        Some((index, player))
    }

    /// Player at the rotation pointer.
    pub fn current_submitter(&self) -> Option<&Player> {
        self.last_submitter_index
            .and_then(|index| self.players.get(index))
    }

    /// Votes needed for a round to complete: everyone except the submitter.
    pub fn expected_votes(&self) -> usize {
        self.players.len().saturating_sub(1)
    }

    /// The fact currently open for voting, if any.
    pub fn active_fact(&self) -> Option<&Fact> {
        if self.phase != RoundPhase::AwaitingVotes {
            return None;
        }
        self.facts.last().filter(|f| !f.finalized)
    }

    pub fn active_fact_mut(&mut self) -> Option<&mut Fact> {
        if self.phase != RoundPhase::AwaitingVotes {
            return None;
        }
        self.facts.last_mut().filter(|f| !f.finalized)
    }

    /// Roster sorted by score, highest first. Ties keep rotation order.
    pub fn leaderboard(&self) -> Vec<PlayerInfo> {
        let mut board: Vec<PlayerInfo> = self.players.iter().map(Player::info).collect();
        board.sort_by(|a, b| b.score.cmp(&a.score));
        board
    }

    pub fn lobby_status(&self) -> Packet {
        Packet::LobbyStatus {
            players: self.leaderboard(),
            game_mode: self.game_mode,
            in_lobby: self.in_lobby,
            game_started: self.game_started,
        }
    }

    /// Records a system notice and returns it for broadcasting.
    pub fn push_notice(&mut self, text: String) -> ChatEntry {
        let entry = ChatEntry {
            username: "System".to_string(),
            text,
            timestamp: unix_millis(),
            system: true,
        };
        self.chat.push_back(entry.clone());
        while self.chat.len() > CHAT_HISTORY_LIMIT {
            self.chat.pop_front();
        }
        entry
    }

    pub fn chat_history(&self) -> Vec<ChatEntry> {
        self.chat.iter().cloned().collect()
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis()
        .min(u64::MAX as u128) as u64
}
