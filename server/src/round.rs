//! Round engine
//!
//! Drives a room through `Lobby -> AwaitingSubmission -> AwaitingVotes ->
//! Reveal -> AwaitingSubmission ...`. Player actions and timer expiries both
//! enter through the functions here. A room is only ever touched by the
//! server's main loop, one event at a time, so every function runs to
//! completion against a consistent room.
//!
//! Timer expiries re-check the room phase before acting: an expiry for a
//! phase the room has already left is a no-op.

use crate::error::GameError;
use crate::outbox::Outbox;
use crate::registry::Departure;
use crate::room::{Fact, Player, Room, RoundPhase, Vote};
use crate::scoring::{score_round, RoundScore};
use crate::stats::{StatEvent, StatsTracker};
use crate::timer::{Phase, TimerEvent};
use log::{debug, info};
use shared::{
    clean_text, AchievementId, ClientId, Packet, MAX_FACT_LENGTH, MIN_PLAYERS_TO_START,
    REVEAL_PAUSE_SECS,
};
use std::time::{Duration, Instant};

/// Moves the rotation pointer one step and returns the player it lands on.
///
/// Returns `None` without touching the pointer if the room is empty or the
/// game has not started.
pub fn advance_to_next_submitter(room: &mut Room) -> Option<&Player> {
    if room.is_empty() || !room.game_started {
        return None;
    }
    let next = match room.last_submitter_index {
        Some(index) => (index + 1) % room.len(),
        None => 0,
    };
    room.last_submitter_index = Some(next);
    room.players.get(next)
}

pub fn start_game(
    room: &mut Room,
    requester: ClientId,
    outbox: &mut Outbox,
    now: Instant,
) -> Result<(), GameError> {
    let player = room.player(requester).ok_or(GameError::NotAMember(requester))?;
    if !player.is_host {
        return Err(GameError::NotHost);
    }
    if room.game_started {
        return Err(GameError::AlreadyStarted);
    }
    if room.len() < MIN_PLAYERS_TO_START {
        return Err(GameError::NotEnoughPlayers);
    }

    room.game_started = true;
    room.in_lobby = false;
    info!(
        "Room {} started a {:?} game with {} players",
        room.code,
        room.game_mode,
        room.len()
    );

    outbox.to_room(room, Packet::GameStarted);
    outbox.to_room(room, room.lobby_status());
    start_next_round(room, outbox, now);
    Ok(())
}

/// Selects the next submitter and opens the submission countdown.
pub fn start_next_round(room: &mut Room, outbox: &mut Outbox, now: Instant) {
    if !room.game_started || room.phase == RoundPhase::Finished {
        return;
    }

    let Some(submitter) = advance_to_next_submitter(room) else {
        room.timer.cancel();
        return;
    };
    let submitter_id = submitter.id;
    let submitter_name = submitter.name.clone();
    debug!("Room {}: {} is submitting", room.code, submitter_name);

    room.phase = RoundPhase::AwaitingSubmission;
    outbox.to_room(
        room,
        Packet::NextSubmitter {
            submitter_id,
            submitter_name,
        },
    );
    arm_phase(room, Phase::Submission, outbox, now);
}

pub fn submit_fact(
    room: &mut Room,
    stats: &mut StatsTracker,
    submitter: ClientId,
    text: &str,
    is_true: bool,
    outbox: &mut Outbox,
    now: Instant,
) -> Result<(), GameError> {
    if room.phase != RoundPhase::AwaitingSubmission {
        return Err(GameError::NotYourTurn(submitter));
    }
    let name = match room.current_submitter() {
        Some(current) if current.id == submitter => current.name.clone(),
        _ => return Err(GameError::NotYourTurn(submitter)),
    };
    let text = clean_text(text, MAX_FACT_LENGTH);
    if text.is_empty() {
        return Err(GameError::BlankFact);
    }

    room.facts
        .push(Fact::new(text.clone(), is_true, submitter, name.clone(), now));
    room.phase = RoundPhase::AwaitingVotes;

    // The truth value stays server-side until the reveal
    outbox.to_room(
        room,
        Packet::NewFact {
            fact: text,
            username: name,
        },
    );

    let unlocked = stats.record(submitter, StatEvent::FactSubmitted { is_true });
    notify_unlocks(outbox, submitter, unlocked);

    arm_phase(room, Phase::Voting, outbox, now);
    Ok(())
}

pub fn cast_vote(
    room: &mut Room,
    stats: &mut StatsTracker,
    voter: ClientId,
    vote: bool,
    outbox: &mut Outbox,
    now: Instant,
) -> Result<(), GameError> {
    if !room.contains(voter) {
        return Err(GameError::NotAMember(voter));
    }

    let fact = room.active_fact_mut().ok_or(GameError::NoActiveFact)?;
    if fact.submitted_by == voter {
        return Err(GameError::SubmitterVote);
    }
    if fact.has_voted(voter) {
        return Err(GameError::DuplicateVote(voter));
    }
    let response_secs = fact.response_secs(now);
    fact.votes.push(Vote {
        voter,
        vote,
        response_secs,
    });

    if round_complete(room) {
        room.timer.cancel();
        finalize_round(room, stats, outbox, false, now);
    }
    Ok(())
}

/// Everyone but the submitter has voted on the open fact.
fn round_complete(room: &Room) -> bool {
    let expected = room.expected_votes();
    expected > 0
        && room
            .active_fact()
            .map_or(false, |fact| fact.votes.len() >= expected)
}

/// Scores the open fact, applies the result and schedules the next round.
///
/// Returns `None` if there is no open fact, which makes a second
/// finalization of the same fact impossible.
pub fn finalize_round(
    room: &mut Room,
    stats: &mut StatsTracker,
    outbox: &mut Outbox,
    timed_out: bool,
    now: Instant,
) -> Option<RoundScore> {
    let player_count = room.len();
    let game_mode = room.game_mode;
    let fact = room.active_fact_mut()?;
    fact.finalized = true;
    let fact = fact.clone();

    room.timer.cancel();
    let score = score_round(&fact, player_count, game_mode, timed_out);

    for delta in &score.deltas {
        if let Some(player) = room.player_mut(delta.player) {
            player.score = (player.score as f64 + delta.points).round() as i64;
        }
    }

    for guess in &score.guesses {
        let event = if guess.correct {
            StatEvent::CorrectGuess {
                response_secs: guess.response_secs,
            }
        } else {
            StatEvent::WrongGuess
        };
        let unlocked = stats.record(guess.voter, event);
        notify_unlocks(outbox, guess.voter, unlocked);
    }
    if score.fooled_everyone {
        let unlocked = stats.record(fact.submitted_by, StatEvent::FooledAll);
        notify_unlocks(outbox, fact.submitted_by, unlocked);
    }

    info!(
        "Room {}: round {} revealed ({} correct, {} fooled{})",
        room.code,
        room.facts.len(),
        score.correct_count,
        score.fooled,
        if timed_out { ", timed out" } else { "" }
    );

    outbox.to_room(
        room,
        Packet::RevealFact {
            fact: fact.text.clone(),
            is_true: fact.is_true,
            votes: fact.votes.iter().map(Vote::info).collect(),
            players: room.leaderboard(),
            timeout: timed_out,
        },
    );

    room.phase = RoundPhase::Reveal;
    room.timer.arm(
        Phase::Reveal,
        Duration::from_secs(REVEAL_PAUSE_SECS),
        now,
    );
    Some(score)
}

/// Advances the room's countdown and reacts to whatever it yields.
pub fn poll_timer(room: &mut Room, stats: &mut StatsTracker, outbox: &mut Outbox, now: Instant) {
    let Some(event) = room.timer.poll(now) else {
        return;
    };

    match event {
        TimerEvent::Tick(seconds_remaining) => {
            outbox.to_room(room, Packet::Timer { seconds_remaining });
        }
        TimerEvent::Expired(Phase::Submission) if room.phase == RoundPhase::AwaitingSubmission => {
            if let Some(skipped) = room.current_submitter() {
                info!("Room {}: {} ran out of time", room.code, skipped.name);
                let packet = Packet::TurnSkipped {
                    player_id: skipped.id,
                    player_name: skipped.name.clone(),
                };
                outbox.to_room(room, packet);
            }
            start_next_round(room, outbox, now);
        }
        TimerEvent::Expired(Phase::Voting) if room.active_fact().is_some() => {
            finalize_round(room, stats, outbox, true, now);
        }
        TimerEvent::Expired(Phase::Reveal) if room.phase == RoundPhase::Reveal => {
            start_next_round(room, outbox, now);
        }
        TimerEvent::Expired(phase) => {
            debug!(
                "Room {}: ignoring stale {:?} expiry in {:?}",
                room.code, phase, room.phase
            );
        }
    }
}

pub fn toggle_ready(room: &mut Room, client_id: ClientId, outbox: &mut Outbox) -> Result<(), GameError> {
    if !room.in_lobby {
        return Err(GameError::AlreadyStarted);
    }
    let player = room
        .player_mut(client_id)
        .ok_or(GameError::NotAMember(client_id))?;
    player.ready = !player.ready;
    outbox.to_room(room, room.lobby_status());
    Ok(())
}

/// Host-requested end of the match: records wins and completed games.
///
/// Every player sharing the top score is credited with a win.
pub fn end_game(
    room: &mut Room,
    stats: &mut StatsTracker,
    requester: ClientId,
    outbox: &mut Outbox,
) -> Result<(), GameError> {
    let player = room.player(requester).ok_or(GameError::NotAMember(requester))?;
    if !player.is_host {
        return Err(GameError::NotHost);
    }
    if !room.game_started || room.phase == RoundPhase::Finished {
        return Err(GameError::NotRunning);
    }

    room.timer.cancel();
    if let Some(fact) = room.active_fact_mut() {
        fact.finalized = true;
    }
    room.phase = RoundPhase::Finished;

    let top_score = room.players.iter().map(|p| p.score).max().unwrap_or(0);
    let results: Vec<(ClientId, bool)> = room
        .players
        .iter()
        .map(|p| (p.id, p.score == top_score))
        .collect();
    for (client_id, won) in results {
        let event = if won {
            StatEvent::Win
        } else {
            StatEvent::GameCompleted
        };
        let unlocked = stats.record(client_id, event);
        notify_unlocks(outbox, client_id, unlocked);
    }

    info!("Room {} finished after {} rounds", room.code, room.facts.len());
    outbox.to_room(
        room,
        Packet::GameOver {
            standings: room.leaderboard(),
        },
    );
    Ok(())
}

/// Repairs rotation and round state after a player has left a room that
/// still has members.
pub fn handle_departure(
    room: &mut Room,
    stats: &mut StatsTracker,
    departure: &Departure,
    outbox: &mut Outbox,
    now: Instant,
) {
    let Departure { index, player, .. } = departure;

    let left = room.push_notice(format!("{} left the game", player.name));
    outbox.to_room(room, Packet::ChatMessage { entry: left });
    if player.is_host {
        if let Some(host) = room.host().map(|h| h.name.clone()) {
            let notice = room.push_notice(format!("{} is the new host", host));
            outbox.to_room(room, Packet::ChatMessage { entry: notice });
        }
    }
    outbox.to_room(room, room.lobby_status());

    let round_running = matches!(
        room.phase,
        RoundPhase::AwaitingSubmission | RoundPhase::AwaitingVotes
    );
    if round_running && room.last_submitter_index == Some(*index) {
        info!(
            "Room {}: submitter {} left, restarting the round",
            room.code, player.name
        );
        room.timer.cancel();
        if let Some(fact) = room.active_fact_mut() {
            fact.finalized = true;
        }
        // The next player in rotation now occupies `index`
        room.last_submitter_index = index.checked_sub(1);
        start_next_round(room, outbox, now);
        return;
    }

    if let Some(pointer) = room.last_submitter_index {
        if *index <= pointer {
            room.last_submitter_index = pointer.checked_sub(1);
        }
    }

    if let Some(fact) = room.active_fact_mut() {
        fact.votes.retain(|v| v.voter != player.id);
    }
    if round_complete(room) {
        finalize_round(room, stats, outbox, false, now);
    }
}

fn arm_phase(room: &mut Room, phase: Phase, outbox: &mut Outbox, now: Instant) {
    let duration = Duration::from_secs(room.game_mode.phase_seconds());
    let seconds_remaining = room.timer.arm(phase, duration, now);
    outbox.to_room(room, Packet::Timer { seconds_remaining });
}

fn notify_unlocks(outbox: &mut Outbox, client_id: ClientId, unlocked: Vec<AchievementId>) {
    for achievement in unlocked {
        outbox.to_client(client_id, Packet::AchievementUnlocked { achievement });
    }
}
