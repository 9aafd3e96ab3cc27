//! Room registry
//!
//! Owns every live room, keyed by room code. Rooms are created by the first
//! join and destroyed together with their last player; the countdown lives
//! inside the room, so destroying the room also discards any pending expiry.

use crate::error::GameError;
use crate::room::{Player, Room};
use log::info;
use shared::{clean_text, ClientId, GameMode, MAX_NAME_LENGTH, MAX_PLAYERS};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    pub created_room: bool,
    /// False when the client was already on the roster.
    pub added: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    /// Roster position the player held before removal.
    pub index: usize,
    pub player: Player,
    pub room_closed: bool,
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `client_id` to the room, creating the room on first join.
    ///
    /// The game mode only matters for the joiner that creates the room.
    pub fn join(
        &mut self,
        code: &str,
        client_id: ClientId,
        username: &str,
        game_mode: GameMode,
    ) -> Result<JoinOutcome, GameError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(GameError::BlankRoomCode);
        }
        let name = clean_text(username, MAX_NAME_LENGTH);
        if name.is_empty() {
            return Err(GameError::BlankUsername);
        }

        if let Some(room) = self.rooms.get(code) {
            if !room.contains(client_id) && room.len() >= MAX_PLAYERS {
                return Err(GameError::RoomFull);
            }
        }

        let created_room = !self.rooms.contains_key(code);
        let room = self.rooms.entry(code.to_string()).or_insert_with(|| {
            info!("Created room {} ({:?})", code, game_mode);
            Room::new(code.to_string(), game_mode)
        });

        let added = room.add_player(client_id, name);
        if added {
            info!(
                "Client {} joined room {} ({}/{})",
                client_id,
                code,
                room.len(),
                MAX_PLAYERS
            );
        }

        Ok(JoinOutcome {
            created_room,
            added,
        })
    }

    /// Removes `client_id` from the room, deleting the room if it empties.
    pub fn leave(&mut self, code: &str, client_id: ClientId) -> Option<Departure> {
        let room = self.rooms.get_mut(code)?;
        let (index, player) = room.remove_player(client_id)?;

        let room_closed = room.is_empty();
        if room_closed {
            room.timer.cancel();
            self.rooms.remove(code);
            info!("Closed empty room {}", code);
        }

        Some(Departure {
            index,
            player,
            room_closed,
        })
    }

    pub fn get(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    /// Codes of every room the client is a member of.
    pub fn rooms_of(&self, client_id: ClientId) -> Vec<String> {
        let mut codes: Vec<String> = self
            .rooms
            .values()
            .filter(|room| room.contains(client_id))
            .map(|room| room.code.clone())
            .collect();
        codes.sort();
        codes
    }

    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.rooms.keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Room> {
        self.rooms.values_mut()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
