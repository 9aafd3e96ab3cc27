//! Integration tests for the game server
//!
//! These tests drive whole games through the public server API with a
//! simulated clock, and run one short game over real UDP sockets.

use assert_approx_eq::assert_approx_eq;
use bincode::{deserialize, serialize};
use server::config::ServerConfig;
use server::game::GameState;
use server::network::Server;
use server::outbox::Outbox;
use shared::{
    AchievementId, ClientId, GameMode, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::timeout;

const ROOM: &str = "TRIVIA";

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn join(state: &mut GameState, outbox: &mut Outbox, id: ClientId, mode: GameMode, now: Instant) {
    state.handle_packet(
        id,
        Packet::JoinRoom {
            room: ROOM.to_string(),
            username: format!("Player{}", id),
            game_mode: mode,
            player_key: None,
        },
        now,
        outbox,
    );
}

/// Joins players `1..=count` and has player 1 start the game at `now`.
fn started_game(count: ClientId, mode: GameMode, now: Instant) -> (GameState, Outbox) {
    let mut state = GameState::new();
    let mut outbox = Outbox::new();
    for id in 1..=count {
        join(&mut state, &mut outbox, id, mode, now);
    }
    state.handle_packet(
        1,
        Packet::StartGame {
            room: ROOM.to_string(),
        },
        now,
        &mut outbox,
    );
    (state, outbox)
}

fn submit(state: &mut GameState, outbox: &mut Outbox, id: ClientId, is_true: bool, now: Instant) {
    state.handle_packet(
        id,
        Packet::SubmitFact {
            room: ROOM.to_string(),
            fact: "Honey never spoils".to_string(),
            is_true,
            username: String::new(),
        },
        now,
        outbox,
    );
}

fn vote(state: &mut GameState, outbox: &mut Outbox, id: ClientId, vote: bool, now: Instant) {
    state.handle_packet(
        id,
        Packet::VoteFact {
            room: ROOM.to_string(),
            vote,
        },
        now,
        outbox,
    );
}

fn current_submitter(state: &GameState) -> ClientId {
    state
        .rooms
        .get(ROOM)
        .and_then(|room| room.current_submitter())
        .map(|player| player.id)
        .expect("no current submitter")
}

fn score_of(state: &GameState, id: ClientId) -> i64 {
    state
        .rooms
        .get(ROOM)
        .and_then(|room| room.player(id))
        .map(|player| player.score)
        .expect("player not in room")
}

fn packets_for(outbox: &Outbox, id: ClientId) -> Vec<Packet> {
    outbox
        .messages()
        .iter()
        .filter(|m| m.client_id == id)
        .map(|m| m.packet.clone())
        .collect()
}

fn reveals_for(outbox: &Outbox, id: ClientId) -> Vec<Packet> {
    packets_for(outbox, id)
        .into_iter()
        .filter(|p| matches!(p, Packet::RevealFact { .. }))
        .collect()
}

/// ROUND FLOW TESTS
mod round_flow_tests {
    use super::*;

    /// Submitters follow join order and wrap around
    #[test]
    fn rotation_follows_join_order() {
        let t0 = Instant::now();
        let (mut state, mut outbox) = started_game(3, GameMode::Classic, t0);

        let mut submitters = Vec::new();
        for round in 0..4u64 {
            let t = t0 + secs(round * 10);
            let submitter = current_submitter(&state);
            submitters.push(submitter);

            submit(&mut state, &mut outbox, submitter, true, t);
            for voter in (1..=3).filter(|id| *id != submitter) {
                vote(&mut state, &mut outbox, voter, true, t + secs(1));
            }
            // Reveal pause ends and the next round opens
            state.poll_timers(t + secs(6), &mut outbox);
        }

        assert_eq!(submitters, vec![1, 2, 3, 1]);
        assert_eq!(reveals_for(&outbox, 1).len(), 4);
    }

    /// Correct voters are ranked by response time; the submitter earns a
    /// bonus for each fooled voter
    #[test]
    fn speed_bonus_ladder_and_deception_bonus() {
        let t0 = Instant::now();
        let (mut state, mut outbox) = started_game(4, GameMode::Classic, t0);
        submit(&mut state, &mut outbox, 1, true, t0);
        outbox.drain();

        vote(&mut state, &mut outbox, 2, true, t0 + secs(2));
        vote(&mut state, &mut outbox, 3, true, t0 + secs(1));
        vote(&mut state, &mut outbox, 4, false, t0 + secs(3));

        assert_eq!(score_of(&state, 3), 1001);
        assert_eq!(score_of(&state, 2), 701);
        assert_eq!(score_of(&state, 4), 0);
        assert_eq!(score_of(&state, 1), 300);

        match &reveals_for(&outbox, 4)[0] {
            Packet::RevealFact {
                is_true,
                votes,
                players,
                timeout,
                ..
            } => {
                assert!(*is_true);
                assert!(!timeout);
                assert_eq!(votes.len(), 3);
                let order: Vec<ClientId> = players.iter().map(|p| p.id).collect();
                assert_eq!(order, vec![3, 2, 1, 4]);
            }
            other => panic!("Unexpected packet {:?}", other),
        }

        assert!(packets_for(&outbox, 3).contains(&Packet::AchievementUnlocked {
            achievement: AchievementId::QuickThinker
        }));
        assert!(!packets_for(&outbox, 4)
            .iter()
            .any(|p| matches!(p, Packet::AchievementUnlocked { .. })));
    }

    /// Expert mode multiplies the deception bonus and fooling everyone
    /// unlocks an achievement
    #[test]
    fn expert_mode_fooling_everyone() {
        let t0 = Instant::now();
        let (mut state, mut outbox) = started_game(3, GameMode::Expert, t0);
        submit(&mut state, &mut outbox, 1, false, t0);
        vote(&mut state, &mut outbox, 2, true, t0 + secs(1));
        vote(&mut state, &mut outbox, 3, true, t0 + secs(2));

        assert_eq!(score_of(&state, 1), 900);
        assert_eq!(score_of(&state, 2), 0);
        assert!(packets_for(&outbox, 1).contains(&Packet::AchievementUnlocked {
            achievement: AchievementId::FooledAll
        }));
        assert_eq!(state.stats.snapshot(1).lies, 1);
    }

    /// A round that times out is revealed once and late votes are dropped
    #[test]
    fn voting_timeout_reveals_partial_votes_once() {
        let t0 = Instant::now();
        let (mut state, mut outbox) = started_game(3, GameMode::Classic, t0);
        submit(&mut state, &mut outbox, 1, true, t0);
        vote(&mut state, &mut outbox, 2, true, t0 + secs(1));

        state.poll_timers(t0 + secs(30), &mut outbox);
        vote(&mut state, &mut outbox, 3, false, t0 + secs(30));

        let reveals = reveals_for(&outbox, 3);
        assert_eq!(reveals.len(), 1);
        match &reveals[0] {
            Packet::RevealFact { votes, timeout, .. } => {
                assert!(*timeout);
                assert_eq!(votes.len(), 1);
            }
            other => panic!("Unexpected packet {:?}", other),
        }
        // No deception bonus on timeout
        assert_eq!(score_of(&state, 1), 0);
        assert_eq!(score_of(&state, 2), 1001);
        assert_eq!(score_of(&state, 3), 0);
        assert!(!packets_for(&outbox, 3)
            .iter()
            .any(|p| matches!(p, Packet::GameError { .. })));
    }

    /// The countdown is announced each second and a silent submitter loses
    /// the turn
    #[test]
    fn submission_timeout_skips_turn() {
        let t0 = Instant::now();
        let (mut state, mut outbox) = started_game(3, GameMode::Classic, t0);
        outbox.drain();

        state.poll_timers(t0 + secs(1), &mut outbox);
        assert_eq!(
            packets_for(&outbox, 2),
            vec![Packet::Timer {
                seconds_remaining: 29
            }]
        );

        state.poll_timers(t0 + secs(30), &mut outbox);
        let packets = packets_for(&outbox, 3);
        assert!(packets.contains(&Packet::TurnSkipped {
            player_id: 1,
            player_name: "Player1".to_string(),
        }));
        assert!(packets.contains(&Packet::NextSubmitter {
            submitter_id: 2,
            submitter_name: "Player2".to_string(),
        }));
        assert_eq!(current_submitter(&state), 2);
    }

    /// Rapid mode uses the shorter countdown
    #[test]
    fn rapid_mode_countdown() {
        let t0 = Instant::now();
        let (state, outbox) = started_game(2, GameMode::Rapid, t0);

        assert!(packets_for(&outbox, 2).contains(&Packet::Timer {
            seconds_remaining: 15
        }));
        assert_eq!(
            state.rooms.get(ROOM).unwrap().timer.remaining_secs(t0 + secs(5)),
            10
        );
    }

    /// Only the current submitter may submit, and nobody votes twice
    #[test]
    fn out_of_turn_requests_are_ignored() {
        let t0 = Instant::now();
        let (mut state, mut outbox) = started_game(3, GameMode::Classic, t0);
        outbox.drain();

        submit(&mut state, &mut outbox, 2, true, t0);
        assert!(outbox.is_empty());

        submit(&mut state, &mut outbox, 1, true, t0);
        vote(&mut state, &mut outbox, 1, true, t0 + secs(1));
        vote(&mut state, &mut outbox, 2, true, t0 + secs(1));
        vote(&mut state, &mut outbox, 2, false, t0 + secs(2));

        let room = state.rooms.get(ROOM).unwrap();
        assert_eq!(room.facts[0].votes.len(), 1);
        assert!(room.facts[0].votes[0].vote);
    }
}

/// MEMBERSHIP TESTS
mod membership_tests {
    use super::*;

    /// Losing the submitter mid-round hands the turn to the next player
    #[test]
    fn submitter_disconnect_restarts_round() {
        let t0 = Instant::now();
        let (mut state, mut outbox) = started_game(3, GameMode::Classic, t0);
        submit(&mut state, &mut outbox, 1, true, t0);
        outbox.drain();

        state.disconnect(1, t0 + secs(2), &mut outbox);

        assert!(reveals_for(&outbox, 2).is_empty());
        assert!(packets_for(&outbox, 2).contains(&Packet::NextSubmitter {
            submitter_id: 2,
            submitter_name: "Player2".to_string(),
        }));
        let room = state.rooms.get(ROOM).unwrap();
        assert_eq!(room.host().map(|p| p.id), Some(2));
        assert_eq!(room.len(), 2);
    }

    /// When the last outstanding voter leaves, the round completes
    #[test]
    fn voter_disconnect_completes_round() {
        let t0 = Instant::now();
        let (mut state, mut outbox) = started_game(3, GameMode::Classic, t0);
        submit(&mut state, &mut outbox, 1, true, t0);
        vote(&mut state, &mut outbox, 2, true, t0 + secs(1));
        outbox.drain();

        state.disconnect(3, t0 + secs(2), &mut outbox);

        let reveals = reveals_for(&outbox, 1);
        assert_eq!(reveals.len(), 1);
        match &reveals[0] {
            Packet::RevealFact { timeout, .. } => assert!(!timeout),
            other => panic!("Unexpected packet {:?}", other),
        }
        assert_eq!(score_of(&state, 2), 1001);
    }

    /// A departing player before the pointer does not cause anyone to be
    /// skipped
    #[test]
    fn earlier_player_leaving_keeps_rotation() {
        let t0 = Instant::now();
        let (mut state, mut outbox) = started_game(4, GameMode::Classic, t0);
        // Player 1 times out, player 2 is up
        state.poll_timers(t0 + secs(30), &mut outbox);
        assert_eq!(current_submitter(&state), 2);

        submit(&mut state, &mut outbox, 2, true, t0 + secs(31));
        state.disconnect(1, t0 + secs(32), &mut outbox);
        for voter in [3, 4] {
            vote(&mut state, &mut outbox, voter, true, t0 + secs(33));
        }
        state.poll_timers(t0 + secs(38), &mut outbox);

        assert_eq!(current_submitter(&state), 3);
    }

    /// Rooms are independent and vanish with their last player
    #[test]
    fn rooms_are_isolated() {
        let now = Instant::now();
        let mut state = GameState::new();
        let mut outbox = Outbox::new();
        join(&mut state, &mut outbox, 1, GameMode::Classic, now);
        state.handle_packet(
            2,
            Packet::JoinRoom {
                room: "OTHER".to_string(),
                username: "Zed".to_string(),
                game_mode: GameMode::Rapid,
                player_key: None,
            },
            now,
            &mut outbox,
        );
        outbox.drain();

        state.handle_packet(
            2,
            Packet::ToggleReady {
                room: "OTHER".to_string(),
            },
            now,
            &mut outbox,
        );
        assert!(packets_for(&outbox, 1).is_empty());
        assert_eq!(packets_for(&outbox, 2).len(), 1);

        state.disconnect(2, now, &mut outbox);
        assert!(state.rooms.get("OTHER").is_none());
        assert_eq!(state.rooms.len(), 1);
    }
}

/// END OF GAME TESTS
mod end_game_tests {
    use super::*;

    /// The top scorer is credited with the win and everyone else with a
    /// completed game
    #[test]
    fn end_game_records_results() {
        let t0 = Instant::now();
        let (mut state, mut outbox) = started_game(3, GameMode::Classic, t0);
        submit(&mut state, &mut outbox, 1, true, t0);
        vote(&mut state, &mut outbox, 2, true, t0 + secs(1));
        vote(&mut state, &mut outbox, 3, false, t0 + secs(2));
        outbox.drain();

        state.handle_packet(
            1,
            Packet::EndGame {
                room: ROOM.to_string(),
            },
            t0 + secs(3),
            &mut outbox,
        );

        match packets_for(&outbox, 3).last() {
            Some(Packet::GameOver { standings }) => assert_eq!(standings[0].id, 2),
            other => panic!("Unexpected packet {:?}", other),
        }
        assert!(packets_for(&outbox, 2).contains(&Packet::AchievementUnlocked {
            achievement: AchievementId::FirstWin
        }));

        let winner = state.stats.snapshot(2);
        assert_eq!((winner.wins, winner.games_played), (1, 1));
        let loser = state.stats.snapshot(1);
        assert_eq!((loser.wins, loser.games_played), (0, 1));

        // No further rounds run after the match ends
        outbox.drain();
        state.poll_timers(t0 + secs(60), &mut outbox);
        assert!(outbox.is_empty());
    }

    /// Statistics are reported on request
    #[test]
    fn request_stats_reports_accuracy() {
        let t0 = Instant::now();
        let (mut state, mut outbox) = started_game(2, GameMode::Classic, t0);
        submit(&mut state, &mut outbox, 1, true, t0);
        vote(&mut state, &mut outbox, 2, true, t0 + secs(4));
        outbox.drain();

        state.handle_packet(2, Packet::RequestStats, t0 + secs(5), &mut outbox);

        match &outbox.drain()[0].packet {
            Packet::PlayerStats { stats } => {
                assert_eq!(stats.correct_guesses, 1);
                assert_eq!(stats.accuracy_percent, 100);
                assert_eq!(stats.current_streak, 1);
                assert_approx_eq!(stats.avg_response_secs, 4.0, 0.001);
            }
            other => panic!("Unexpected packet {:?}", other),
        }
    }
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    async fn spawn_server() -> SocketAddr {
        let config = ServerConfig {
            port: 0,
            poll_interval_ms: 10,
            ..ServerConfig::default()
        };
        let mut server = Server::new(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        addr
    }

    async fn send(socket: &UdpSocket, packet: Packet, server: SocketAddr) {
        let data = serialize(&packet).unwrap();
        socket.send_to(&data, server).await.unwrap();
    }

    async fn recv_until<F: Fn(&Packet) -> bool>(socket: &UdpSocket, wanted: F) -> Packet {
        let mut buffer = vec![0u8; MAX_PACKET_SIZE];
        timeout(Duration::from_secs(5), async {
            loop {
                let (len, _) = socket.recv_from(&mut buffer).await.unwrap();
                let packet: Packet = deserialize(&buffer[..len]).unwrap();
                if wanted(&packet) {
                    return packet;
                }
            }
        })
        .await
        .expect("timed out waiting for packet")
    }

    async fn connect(socket: &UdpSocket, server: SocketAddr) -> ClientId {
        send(
            socket,
            Packet::Connect {
                client_version: PROTOCOL_VERSION,
            },
            server,
        )
        .await;
        match recv_until(socket, |p| matches!(p, Packet::Connected { .. })).await {
            Packet::Connected { client_id } => client_id,
            other => panic!("Unexpected packet {:?}", other),
        }
    }

    /// Tests packet serialization round-trip for client requests
    #[test]
    fn packet_serialization_roundtrip() {
        let test_packets = vec![
            Packet::Connect { client_version: 1 },
            Packet::JoinRoom {
                room: "ABCD".to_string(),
                username: "Alice".to_string(),
                game_mode: GameMode::Expert,
                player_key: Some("alice".to_string()),
            },
            Packet::VoteFact {
                room: "ABCD".to_string(),
                vote: false,
            },
            Packet::Disconnect,
        ];

        for packet in test_packets {
            let serialized = serialize(&packet).unwrap();
            let deserialized: Packet = deserialize(&serialized).unwrap();
            assert_eq!(packet, deserialized);
        }
    }

    /// Plays one round between two real UDP clients
    #[tokio::test]
    async fn full_round_over_udp() {
        let server = spawn_server().await;
        let alice = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let bob = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let alice_id = connect(&alice, server).await;
        let bob_id = connect(&bob, server).await;
        assert_ne!(alice_id, bob_id);

        // Join one at a time so Alice is reliably the host
        for (socket, name) in [(&alice, "Alice"), (&bob, "Bob")] {
            send(
                socket,
                Packet::JoinRoom {
                    room: ROOM.to_string(),
                    username: name.to_string(),
                    game_mode: GameMode::Classic,
                    player_key: None,
                },
                server,
            )
            .await;
            recv_until(socket, |p| matches!(p, Packet::LobbyStatus { .. })).await;
        }
        recv_until(&alice, |p| {
            matches!(p, Packet::LobbyStatus { players, .. } if players.len() == 2)
        })
        .await;

        send(
            &alice,
            Packet::StartGame {
                room: ROOM.to_string(),
            },
            server,
        )
        .await;
        let next = recv_until(&alice, |p| matches!(p, Packet::NextSubmitter { .. })).await;
        assert_eq!(
            next,
            Packet::NextSubmitter {
                submitter_id: alice_id,
                submitter_name: "Alice".to_string(),
            }
        );

        send(
            &alice,
            Packet::SubmitFact {
                room: ROOM.to_string(),
                fact: "Octopuses have three hearts".to_string(),
                is_true: true,
                username: "Alice".to_string(),
            },
            server,
        )
        .await;
        recv_until(&bob, |p| matches!(p, Packet::NewFact { .. })).await;
        send(
            &bob,
            Packet::VoteFact {
                room: ROOM.to_string(),
                vote: true,
            },
            server,
        )
        .await;

        match recv_until(&alice, |p| matches!(p, Packet::RevealFact { .. })).await {
            Packet::RevealFact {
                votes,
                players,
                timeout,
                ..
            } => {
                assert!(!timeout);
                assert_eq!(votes.len(), 1);
                assert_eq!(votes[0].voter, bob_id);
                assert_eq!(players[0].id, bob_id);
            }
            other => panic!("Unexpected packet {:?}", other),
        }
    }

    /// Packets from an address that never connected are ignored
    #[tokio::test]
    async fn unconnected_clients_are_ignored() {
        let server = spawn_server().await;
        let stranger = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        send(&stranger, Packet::RequestStats, server).await;

        let mut buffer = vec![0u8; MAX_PACKET_SIZE];
        let result = timeout(Duration::from_millis(200), stranger.recv_from(&mut buffer)).await;
        assert!(result.is_err());
    }
}
