use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_PACKET_SIZE: usize = 16 * 1024;

pub const MAX_PLAYERS: usize = 10;
pub const MIN_PLAYERS_TO_START: usize = 2;
pub const VOTE_TIME_CAP_SECS: f32 = 30.0;
pub const REVEAL_PAUSE_SECS: u64 = 5;
pub const CHAT_HISTORY_LIMIT: usize = 50;
pub const MAX_NAME_LENGTH: usize = 32;
pub const MAX_FACT_LENGTH: usize = 280;

/// Transient connection identifier assigned by the server on `Connect`.
pub type ClientId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameMode {
    #[default]
    Classic,
    Rapid,
    Expert,
}

impl GameMode {
    /// Length of both the submission and the voting countdown.
    pub fn phase_seconds(self) -> u64 {
        match self {
            GameMode::Rapid => 15,
            GameMode::Classic | GameMode::Expert => 30,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AchievementId {
    FirstWin,
    FooledAll,
    PerfectStreak,
    TruthMaster,
    QuickThinker,
}

impl AchievementId {
    pub const ALL: [AchievementId; 5] = [
        AchievementId::FirstWin,
        AchievementId::FooledAll,
        AchievementId::PerfectStreak,
        AchievementId::TruthMaster,
        AchievementId::QuickThinker,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AchievementId::FirstWin => "first-win",
            AchievementId::FooledAll => "fooled-all",
            AchievementId::PerfectStreak => "perfect-streak",
            AchievementId::TruthMaster => "truth-master",
            AchievementId::QuickThinker => "quick-thinker",
        }
    }
}

impl std::fmt::Display for AchievementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roster entry as seen by clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerInfo {
    pub id: ClientId,
    pub name: String,
    pub score: i64,
    pub is_host: bool,
    pub ready: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VoteInfo {
    pub voter: ClientId,
    pub vote: bool,
    pub response_secs: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatEntry {
    pub username: String,
    pub text: String,
    pub timestamp: u64,
    pub system: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct StatsSnapshot {
    pub games_played: u32,
    pub wins: u32,
    pub correct_guesses: u32,
    pub total_guesses: u32,
    pub accuracy_percent: u32,
    pub win_rate_percent: u32,
    pub avg_response_secs: f32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub truths: u32,
    pub lies: u32,
    pub achievements: Vec<AchievementId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client -> server
    Connect {
        client_version: u32,
    },
    Heartbeat,
    JoinRoom {
        room: String,
        username: String,
        game_mode: GameMode,
        player_key: Option<String>,
    },
    ToggleReady {
        room: String,
    },
    StartGame {
        room: String,
    },
    SubmitFact {
        room: String,
        fact: String,
        is_true: bool,
        username: String,
    },
    VoteFact {
        room: String,
        vote: bool,
    },
    EndGame {
        room: String,
    },
    RequestStats,
    Disconnect,

    // Server -> client
    Connected {
        client_id: ClientId,
    },
    Disconnected {
        reason: String,
    },
    LobbyStatus {
        players: Vec<PlayerInfo>,
        game_mode: GameMode,
        in_lobby: bool,
        game_started: bool,
    },
    GameStarted,
    NextSubmitter {
        submitter_id: ClientId,
        submitter_name: String,
    },
    Timer {
        seconds_remaining: u32,
    },
    NewFact {
        fact: String,
        username: String,
    },
    RevealFact {
        fact: String,
        is_true: bool,
        votes: Vec<VoteInfo>,
        players: Vec<PlayerInfo>,
        timeout: bool,
    },
    TurnSkipped {
        player_id: ClientId,
        player_name: String,
    },
    AchievementUnlocked {
        achievement: AchievementId,
    },
    PlayerStats {
        stats: StatsSnapshot,
    },
    ChatHistory {
        entries: Vec<ChatEntry>,
    },
    ChatMessage {
        entry: ChatEntry,
    },
    GameOver {
        standings: Vec<PlayerInfo>,
    },
    JoinError {
        message: String,
    },
    GameError {
        message: String,
    },
}

impl Packet {
    /// True for packets that travel from the server to a client.
    pub fn is_client_bound(&self) -> bool {
        !matches!(
            self,
            Packet::Connect { .. }
                | Packet::Heartbeat
                | Packet::JoinRoom { .. }
                | Packet::ToggleReady { .. }
                | Packet::StartGame { .. }
                | Packet::SubmitFact { .. }
                | Packet::VoteFact { .. }
                | Packet::EndGame { .. }
                | Packet::RequestStats
                | Packet::Disconnect
        )
    }
}

/// Trims surrounding whitespace and caps the length in characters.
pub fn clean_text(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}
