//! Addressed outgoing packets
//!
//! Game code never touches sockets. It appends to an [`Outbox`], and the
//! network layer drains it after each event, resolving client ids to
//! addresses.

use crate::room::Room;
use shared::{ClientId, Packet};

#[derive(Debug, Clone)]
pub struct Outgoing {
    pub client_id: ClientId,
    pub packet: Packet,
}

#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<Outgoing>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_client(&mut self, client_id: ClientId, packet: Packet) {
        self.messages.push(Outgoing { client_id, packet });
    }

    /// Queues one copy of `packet` for every current member of `room`.
    pub fn to_room(&mut self, room: &Room, packet: Packet) {
        for player in &room.players {
            self.messages.push(Outgoing {
                client_id: player.id,
                packet: packet.clone(),
            });
        }
    }

    pub fn drain(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.messages)
    }

    pub fn messages(&self) -> &[Outgoing] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
