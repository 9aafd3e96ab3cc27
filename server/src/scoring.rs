//! Round scoring
//!
//! [`score_round`] is a pure function of a finished fact, the roster size and
//! the game mode. It does not touch the room; the round engine applies the
//! returned deltas and feeds the guesses into the statistics tracker.

use crate::room::Fact;
use shared::{ClientId, GameMode};

/// Awarded for any correct guess.
pub const BASE_POINTS: f64 = 1.0;
/// Extra base point for a correct guess in expert mode.
pub const EXPERT_GUESS_BONUS: f64 = 1.0;
/// Submitter reward per fooled voter.
pub const POINTS_PER_FOOLED: f64 = 300.0;
pub const EXPERT_SUBMITTER_MULTIPLIER: f64 = 1.5;

/// Speed bonus for the vote at `rank` in response-time order.
///
/// The rank counts every vote, right or wrong, so a fast wrong answer still
/// pushes slower correct voters down a tier.
pub fn speed_bonus(rank: usize) -> f64 {
    match rank {
        0 => 1000.0,
        1 => 700.0,
        2 => 500.0,
        3..=4 => 300.0,
        5..=7 => 100.0,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreDelta {
    pub player: ClientId,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Guess {
    pub voter: ClientId,
    pub correct: bool,
    pub response_secs: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoundScore {
    /// Points per player, voters in response-time order then the submitter.
    pub deltas: Vec<ScoreDelta>,
    /// Every vote in response-time order.
    pub guesses: Vec<Guess>,
    pub correct_count: usize,
    pub fooled: usize,
    pub submitter_bonus: f64,
    pub fooled_everyone: bool,
}

impl RoundScore {
    pub fn points_for(&self, player: ClientId) -> f64 {
        self.deltas
            .iter()
            .filter(|d| d.player == player)
            .map(|d| d.points)
            .sum()
    }
}

pub fn score_round(fact: &Fact, player_count: usize, mode: GameMode, timed_out: bool) -> RoundScore {
    let mut ordered: Vec<_> = fact.votes.iter().collect();
    // Stable: equal times keep arrival order
    ordered.sort_by(|a, b| a.response_secs.total_cmp(&b.response_secs));

    let expert = mode == GameMode::Expert;
    let mut score = RoundScore::default();

    for (rank, vote) in ordered.into_iter().enumerate() {
        let correct = vote.vote == fact.is_true;
        if correct {
            let mut points = BASE_POINTS + speed_bonus(rank);
            if expert {
                points += EXPERT_GUESS_BONUS;
            }
            score.deltas.push(ScoreDelta {
                player: vote.voter,
                points,
            });
            score.correct_count += 1;
        }
        score.guesses.push(Guess {
            voter: vote.voter,
            correct,
            response_secs: vote.response_secs,
        });
    }

    let voters = player_count.saturating_sub(1);
    score.fooled = voters.saturating_sub(score.correct_count);

    if !timed_out && score.fooled > 0 {
        let mut bonus = score.fooled as f64 * POINTS_PER_FOOLED;
        if expert {
            bonus *= EXPERT_SUBMITTER_MULTIPLIER;
        }
        score.submitter_bonus = bonus;
        score.deltas.push(ScoreDelta {
            player: fact.submitted_by,
            points: bonus,
        });
        score.fooled_everyone = score.fooled == voters;
    }

    score
}
