//! Process-wide game state and inbound event dispatch
//!
//! [`GameState`] owns the room registry and the statistics tracker. The
//! network layer hands it one event at a time together with the current
//! instant; everything the event produces is appended to an [`Outbox`].

use crate::error::GameError;
use crate::outbox::Outbox;
use crate::registry::RoomRegistry;
use crate::round;
use crate::room::{Room, RoundPhase};
use crate::stats::StatsTracker;
use log::{debug, info, warn};
use shared::{ClientId, GameMode, Packet};
use std::time::Instant;

#[derive(Debug, Default)]
pub struct GameState {
    pub rooms: RoomRegistry,
    pub stats: StatsTracker,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one packet from `client_id`.
    ///
    /// Rejections never escape: they are either reported to the sender or
    /// logged, so one misbehaving client cannot disturb any other room.
    pub fn handle_packet(&mut self, client_id: ClientId, packet: Packet, now: Instant, outbox: &mut Outbox) {
        let result = match packet {
            Packet::JoinRoom {
                room,
                username,
                game_mode,
                player_key,
            } => self.join_room(
                client_id,
                &room,
                &username,
                game_mode,
                player_key.as_deref(),
                now,
                outbox,
            ),
            Packet::ToggleReady { room } => self
                .room_mut(&room)
                .and_then(|room| round::toggle_ready(room, client_id, outbox)),
            Packet::StartGame { room } => self
                .room_mut(&room)
                .and_then(|room| round::start_game(room, client_id, outbox, now)),
            Packet::SubmitFact {
                room,
                fact,
                is_true,
                // Display name comes from the roster
                username: _,
            } => match self.rooms.get_mut(room.trim()) {
                Some(room) => {
                    round::submit_fact(room, &mut self.stats, client_id, &fact, is_true, outbox, now)
                }
                None => Err(GameError::UnknownRoom(room)),
            },
            Packet::VoteFact { room, vote } => match self.rooms.get_mut(room.trim()) {
                Some(room) => round::cast_vote(room, &mut self.stats, client_id, vote, outbox, now),
                None => Err(GameError::UnknownRoom(room)),
            },
            Packet::EndGame { room } => match self.rooms.get_mut(room.trim()) {
                Some(room) => round::end_game(room, &mut self.stats, client_id, outbox),
                None => Err(GameError::UnknownRoom(room)),
            },
            Packet::RequestStats => {
                outbox.to_client(
                    client_id,
                    Packet::PlayerStats {
                        stats: self.stats.snapshot(client_id),
                    },
                );
                Ok(())
            }
            Packet::Disconnect => {
                self.disconnect(client_id, now, outbox);
                Ok(())
            }
            // Connection bookkeeping is handled by the network layer
            Packet::Connect { .. } | Packet::Heartbeat => Ok(()),
            Packet::Connected { .. }
            | Packet::Disconnected { .. }
            | Packet::LobbyStatus { .. }
            | Packet::GameStarted
            | Packet::NextSubmitter { .. }
            | Packet::Timer { .. }
            | Packet::NewFact { .. }
            | Packet::RevealFact { .. }
            | Packet::TurnSkipped { .. }
            | Packet::AchievementUnlocked { .. }
            | Packet::PlayerStats { .. }
            | Packet::ChatHistory { .. }
            | Packet::ChatMessage { .. }
            | Packet::GameOver { .. }
            | Packet::JoinError { .. }
            | Packet::GameError { .. } => {
                warn!("Client {} sent a server-only packet", client_id);
                Ok(())
            }
        };

        if let Err(error) = result {
            report(outbox, client_id, error);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn join_room(
        &mut self,
        client_id: ClientId,
        code: &str,
        username: &str,
        game_mode: GameMode,
        player_key: Option<&str>,
        now: Instant,
        outbox: &mut Outbox,
    ) -> Result<(), GameError> {
        let code = code.trim();
        let outcome = self.rooms.join(code, client_id, username, game_mode)?;
        self.stats.bind(client_id, player_key);

        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| GameError::UnknownRoom(code.to_string()))?;

        outbox.to_room(room, room.lobby_status());
        outbox.to_client(
            client_id,
            Packet::ChatHistory {
                entries: room.chat_history(),
            },
        );

        if outcome.added {
            let name = room
                .player(client_id)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            let entry = room.push_notice(format!("{} joined the game", name));
            outbox.to_room(room, Packet::ChatMessage { entry });
        }

        // Catch a late joiner up on the round in progress
        if room.game_started {
            outbox.to_client(client_id, Packet::GameStarted);
            if matches!(
                room.phase,
                RoundPhase::AwaitingSubmission | RoundPhase::AwaitingVotes
            ) {
                if let Some(submitter) = room.current_submitter() {
                    outbox.to_client(
                        client_id,
                        Packet::NextSubmitter {
                            submitter_id: submitter.id,
                            submitter_name: submitter.name.clone(),
                        },
                    );
                }
                if let Some(fact) = room.active_fact() {
                    outbox.to_client(
                        client_id,
                        Packet::NewFact {
                            fact: fact.text.clone(),
                            username: fact.submitter_name.clone(),
                        },
                    );
                }
                outbox.to_client(
                    client_id,
                    Packet::Timer {
                        seconds_remaining: room.timer.remaining_secs(now),
                    },
                );
            }
        }
        Ok(())
    }

    /// Removes the client from every room it is in.
    pub fn disconnect(&mut self, client_id: ClientId, now: Instant, outbox: &mut Outbox) {
        for code in self.rooms.rooms_of(client_id) {
            let Some(departure) = self.rooms.leave(&code, client_id) else {
                continue;
            };
            info!("Client {} left room {}", client_id, code);
            if departure.room_closed {
                continue;
            }
            if let Some(room) = self.rooms.get_mut(&code) {
                round::handle_departure(room, &mut self.stats, &departure, outbox, now);
            }
        }
        self.stats.unbind(client_id);
    }

    /// Advances every room's countdown to `now`.
    pub fn poll_timers(&mut self, now: Instant, outbox: &mut Outbox) {
        for room in self.rooms.iter_mut() {
            round::poll_timer(room, &mut self.stats, outbox, now);
        }
    }

    fn room_mut(&mut self, code: &str) -> Result<&mut Room, GameError> {
        self.rooms
            .get_mut(code.trim())
            .ok_or_else(|| GameError::UnknownRoom(code.to_string()))
    }
}

fn report(outbox: &mut Outbox, client_id: ClientId, error: GameError) {
    if error.is_silent() {
        debug!("Ignored request from client {}: {}", client_id, error);
        return;
    }
    info!("Rejected request from client {}: {}", client_id, error);
    let message = error.to_string();
    let packet = if error.is_join_error() {
        Packet::JoinError { message }
    } else {
        Packet::GameError { message }
    };
    outbox.to_client(client_id, packet);
}
