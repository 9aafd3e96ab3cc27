//! Player statistics and achievements
//!
//! Statistics live for the whole process and are keyed by a stats key, not by
//! room. A connection is bound to a key when it joins a room: the
//! client-supplied `player_key` if one was given, otherwise a key derived
//! from the connection id (so progress resets on reconnect).

use log::info;
use shared::{AchievementId, ClientId, StatsSnapshot};
use std::collections::{BTreeSet, HashMap, VecDeque};

pub const RESPONSE_SAMPLE_LIMIT: usize = 50;
pub const PERFECT_STREAK: u32 = 5;
pub const TRUTH_MASTER_GUESSES: u32 = 10;
pub const QUICK_THINKER_SECS: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatEvent {
    FactSubmitted { is_true: bool },
    CorrectGuess { response_secs: f32 },
    WrongGuess,
    Win,
    GameCompleted,
    FooledAll,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerStats {
    pub games_played: u32,
    pub wins: u32,
    pub correct_guesses: u32,
    pub total_guesses: u32,
    /// Most recent correct-guess response times, oldest first.
    pub response_times: VecDeque<f32>,
    pub avg_response_secs: f32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub truths: u32,
    pub lies: u32,
    pub achievements: BTreeSet<AchievementId>,
}

impl PlayerStats {
    fn apply(&mut self, event: StatEvent) {
        match event {
            StatEvent::FactSubmitted { is_true } => {
                if is_true {
                    self.truths += 1;
                } else {
                    self.lies += 1;
                }
            }
            StatEvent::CorrectGuess { response_secs } => {
                self.correct_guesses += 1;
                self.total_guesses += 1;
                self.current_streak += 1;
                self.best_streak = self.best_streak.max(self.current_streak);

                self.response_times.push_back(response_secs);
                while self.response_times.len() > RESPONSE_SAMPLE_LIMIT {
                    self.response_times.pop_front();
                }
                let sum: f32 = self.response_times.iter().sum();
                self.avg_response_secs = sum / self.response_times.len() as f32;
            }
            StatEvent::WrongGuess => {
                self.total_guesses += 1;
                self.current_streak = 0;
            }
            StatEvent::Win => {
                self.wins += 1;
                self.games_played += 1;
            }
            StatEvent::GameCompleted => {
                self.games_played += 1;
            }
            StatEvent::FooledAll => {}
        }
    }

    /// Achievements whose conditions currently hold.
    fn qualifying(&self, event: StatEvent) -> Vec<AchievementId> {
        let mut earned = Vec::new();
        if self.wins == 1 {
            earned.push(AchievementId::FirstWin);
        }
        if event == StatEvent::FooledAll {
            earned.push(AchievementId::FooledAll);
        }
        if self.current_streak >= PERFECT_STREAK {
            earned.push(AchievementId::PerfectStreak);
        }
        if self.correct_guesses >= TRUTH_MASTER_GUESSES {
            earned.push(AchievementId::TruthMaster);
        }
        if self.response_times.iter().any(|&t| t < QUICK_THINKER_SECS) {
            earned.push(AchievementId::QuickThinker);
        }
        earned
    }

    pub fn accuracy_percent(&self) -> u32 {
        percent(self.correct_guesses, self.total_guesses)
    }

    pub fn win_rate_percent(&self) -> u32 {
        percent(self.wins, self.games_played)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            games_played: self.games_played,
            wins: self.wins,
            correct_guesses: self.correct_guesses,
            total_guesses: self.total_guesses,
            accuracy_percent: self.accuracy_percent(),
            win_rate_percent: self.win_rate_percent(),
            avg_response_secs: self.avg_response_secs,
            current_streak: self.current_streak,
            best_streak: self.best_streak,
            truths: self.truths,
            lies: self.lies,
            achievements: self.achievements.iter().copied().collect(),
        }
    }
}

fn percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 * 100.0 / whole as f64).round() as u32
}

#[derive(Debug, Default)]
pub struct StatsTracker {
    stats: HashMap<String, PlayerStats>,
    identities: HashMap<ClientId, String>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a connection with a stats key.
    pub fn bind(&mut self, client_id: ClientId, player_key: Option<&str>) {
        let key = match player_key.map(str::trim) {
            Some(key) if !key.is_empty() => format!("player:{}", key),
            _ => connection_key(client_id),
        };
        self.identities.insert(client_id, key);
    }

    /// Forgets the connection mapping. The statistics themselves are kept.
    pub fn unbind(&mut self, client_id: ClientId) {
        self.identities.remove(&client_id);
    }

    pub fn key_for(&self, client_id: ClientId) -> String {
        self.identities
            .get(&client_id)
            .cloned()
            .unwrap_or_else(|| connection_key(client_id))
    }

    /// Applies an event and returns achievements unlocked by it.
    ///
    /// Each achievement is returned at most once per stats key, on the call
    /// that first inserts it.
    pub fn record(&mut self, client_id: ClientId, event: StatEvent) -> Vec<AchievementId> {
        let key = self.key_for(client_id);
        let stats = self.stats.entry(key).or_default();
        stats.apply(event);

        let unlocked: Vec<AchievementId> = stats
            .qualifying(event)
            .into_iter()
            .filter(|id| stats.achievements.insert(*id))
            .collect();

        for achievement in &unlocked {
            info!("Client {} unlocked achievement {}", client_id, achievement);
        }
        unlocked
    }

    pub fn get(&self, client_id: ClientId) -> Option<&PlayerStats> {
        self.stats.get(&self.key_for(client_id))
    }

    pub fn snapshot(&self, client_id: ClientId) -> StatsSnapshot {
        self.get(client_id)
            .map(PlayerStats::snapshot)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

fn connection_key(client_id: ClientId) -> String {
    format!("conn:{}", client_id)
}
