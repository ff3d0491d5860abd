//! WebSocket server and connection handling.

use crate::matchmaker::{EnqueueOutcome, Matchmaker};
use crate::protocol::{ClientMessage, QueueStatus, ServerMessage};
use crate::session::GameSession;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;
use wuzi_core::{GameEvent, PerSeat, PlayerProfile, Pos, Seat, Skill, BOARD_SIZE};

const MAX_USERNAME_LEN: usize = 16;

/// Server state shared across all connections.
///
/// Each session is mutated only through exclusive `sessions` access,
/// which serializes the two seats' actions; the matchmaker has its own
/// lock, held only across a single queue operation and never while a
/// session is being driven.
pub struct ServerState {
    /// All live sessions
    pub sessions: DashMap<Uuid, GameSession>,
    /// Mapping from client ID to their session ID
    pub client_sessions: DashMap<Uuid, Uuid>,
    /// Mapping from client ID to their message sender
    pub client_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
    /// Display names picked at login
    pub usernames: DashMap<Uuid, String>,
    /// The matchmaking queue
    matchmaker: Mutex<Matchmaker>,
}

impl ServerState {
    pub fn new() -> Self {
        Self::with_matchmaker(Matchmaker::new())
    }

    pub fn with_matchmaker(matchmaker: Matchmaker) -> Self {
        Self {
            sessions: DashMap::new(),
            client_sessions: DashMap::new(),
            client_senders: DashMap::new(),
            usernames: DashMap::new(),
            matchmaker: Mutex::new(matchmaker),
        }
    }

    fn matchmaker(&self) -> MutexGuard<'_, Matchmaker> {
        self.matchmaker.lock().expect("matchmaker lock poisoned")
    }

    /// Send a message to a specific client. Send failures are logged
    /// and never surface into game logic.
    pub fn send_to_client(&self, client_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.client_senders.get(&client_id) {
            if sender.send(msg).is_err() {
                warn!("Dropping message for closed connection {}", client_id);
            }
        }
    }

    /// Send a message to both seats of a session.
    pub fn broadcast_to_session(&self, clients: PerSeat<Uuid>, msg: ServerMessage) {
        for seat in Seat::ALL {
            self.send_to_client(clients[seat], msg.clone());
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Wuzi server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let client_id = Uuid::new_v4();

    // Channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.client_senders.insert(client_id, tx);

    // Forward messages from the channel to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(client_id, client_msg, &state),
                Err(_) => {
                    warn!("Invalid message from {}: {}", client_id, text);
                    state.send_to_client(
                        client_id,
                        ServerMessage::Error {
                            message: "Unrecognized message.".to_string(),
                        },
                    );
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", client_id);
                break;
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", client_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up exactly once, after the read loop has stopped, so
    // teardown cannot race an in-flight action for the same seat.
    // The sender goes first: once it is gone, a pairing that races
    // this teardown sees the connection as dead.
    state.client_senders.remove(&client_id);
    handle_disconnect(client_id, &state);
    send_task.abort();

    info!("Connection closed for {}", client_id);
    Ok(())
}

/// Handle a client message. Every branch validates before it mutates.
fn handle_message(client_id: Uuid, msg: ClientMessage, state: &Arc<ServerState>) {
    match msg {
        ClientMessage::Login { username } => {
            let username = username.trim().to_string();
            if username.is_empty() {
                state.send_to_client(
                    client_id,
                    ServerMessage::Error {
                        message: "Username must not be empty.".to_string(),
                    },
                );
                return;
            }
            if username.chars().count() > MAX_USERNAME_LEN {
                state.send_to_client(
                    client_id,
                    ServerMessage::Error {
                        message: "Username must be at most 16 characters.".to_string(),
                    },
                );
                return;
            }
            state.usernames.insert(client_id, username.clone());
            state.send_to_client(client_id, ServerMessage::LoginSuccess { username });
        }

        ClientMessage::FindMatch => {
            if !state.usernames.contains_key(&client_id) {
                state.send_to_client(
                    client_id,
                    ServerMessage::Error {
                        message: "Log in before matchmaking.".to_string(),
                    },
                );
                return;
            }
            // Already seated: silent no-op, like a duplicate enqueue.
            if state.client_sessions.contains_key(&client_id) {
                return;
            }
            enqueue_client(client_id, QueueStatus::Queued, state);
        }

        ClientMessage::CancelQueue => {
            let removed = state.matchmaker().cancel(client_id);
            if removed {
                state.send_to_client(
                    client_id,
                    ServerMessage::QueueUpdate {
                        status: QueueStatus::Cancelled,
                    },
                );
            }
        }

        ClientMessage::ActivateSkill { skill } => {
            let Some(skill) = Skill::from_wire(&skill) else {
                state.send_to_client(
                    client_id,
                    ServerMessage::Error {
                        message: "Unknown skill.".to_string(),
                    },
                );
                return;
            };
            drive_session(client_id, state, |session| {
                session.activate_skill(client_id, skill)
            });
        }

        ClientMessage::BoardClick { row, col } => {
            let in_range = |v: i64| (0..BOARD_SIZE as i64).contains(&v);
            if !in_range(row) || !in_range(col) {
                state.send_to_client(
                    client_id,
                    ServerMessage::Error {
                        message: "Position is outside the board.".to_string(),
                    },
                );
                return;
            }
            let pos = Pos::new(row as usize, col as usize);
            drive_session(client_id, state, |session| {
                session.handle_click(client_id, pos)
            });
        }

        ClientMessage::Restart => {
            drive_session(client_id, state, |session| session.vote_restart(client_id));
        }
    }
}

/// Route an action into the caller's session, then broadcast the new
/// snapshot to both seats on success or report the error to the caller.
///
/// The exclusive session reference is dropped before anything is sent.
fn drive_session<F>(client_id: Uuid, state: &Arc<ServerState>, action: F)
where
    F: FnOnce(&mut GameSession) -> Result<Vec<GameEvent>, crate::session::SessionError>,
{
    let Some(session_id) = state.client_sessions.get(&client_id).map(|r| *r) else {
        state.send_to_client(
            client_id,
            ServerMessage::Error {
                message: "You are not in a match.".to_string(),
            },
        );
        return;
    };

    let outcome = state.sessions.get_mut(&session_id).map(|mut session| {
        let result = action(&mut session);
        (result, session.snapshot(), session.clients)
    });

    let Some((result, snapshot, clients)) = outcome else {
        // The mapping outlived its session; drop it and answer as if
        // the client were never seated.
        state
            .client_sessions
            .remove_if(&client_id, |_, sid| *sid == session_id);
        state.send_to_client(
            client_id,
            ServerMessage::Error {
                message: "You are not in a match.".to_string(),
            },
        );
        return;
    };

    match result {
        Ok(events) => {
            state.broadcast_to_session(clients, ServerMessage::State { state: snapshot });
            notify_events(client_id, &events, clients, state);
        }
        Err(e) => {
            state.send_to_client(
                client_id,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            );
        }
    }
}

/// Side-channel notifications derived from the emitted events.
fn notify_events(
    client_id: Uuid,
    events: &[GameEvent],
    clients: PerSeat<Uuid>,
    state: &Arc<ServerState>,
) {
    let restarted = events.contains(&GameEvent::MatchRestarted);
    for event in events {
        match event {
            GameEvent::GameWon { seat } => {
                info!("Seat {} won in session of client {}", seat, client_id);
            }
            GameEvent::MatchRestarted => {
                info!("Session restarted by mutual consent");
            }
            GameEvent::RestartVoted { .. } if !restarted => {
                let name = state
                    .usernames
                    .get(&client_id)
                    .map(|r| r.clone())
                    .unwrap_or_else(|| "Your opponent".to_string());
                for seat in Seat::ALL {
                    if clients[seat] != client_id {
                        state.send_to_client(
                            clients[seat],
                            ServerMessage::Info {
                                message: format!("{} wants a rematch.", name),
                            },
                        );
                    }
                }
            }
            _ => {}
        }
    }
}

/// Put a client into the queue and create a session when a pair forms.
fn enqueue_client(client_id: Uuid, status: QueueStatus, state: &Arc<ServerState>) {
    let outcome = state.matchmaker().enqueue(client_id);
    match outcome {
        EnqueueOutcome::AlreadyQueued => {}
        EnqueueOutcome::Queued => {
            state.send_to_client(client_id, ServerMessage::QueueUpdate { status });
        }
        EnqueueOutcome::Paired { seat_one, seat_two } => {
            state.send_to_client(client_id, ServerMessage::QueueUpdate { status });
            create_session(seat_one, seat_two, state);
        }
    }
}

/// Instantiate a session for a freshly paired couple and tell both.
fn create_session(seat_one: Uuid, seat_two: Uuid, state: &Arc<ServerState>) {
    let username = |id: Uuid| {
        state
            .usernames
            .get(&id)
            .map(|r| r.clone())
            .unwrap_or_else(|| "Anonymous".to_string())
    };

    let session_id = Uuid::new_v4();
    let clients = PerSeat::new(seat_one, seat_two);
    let names = PerSeat::new(username(seat_one), username(seat_two));
    info!(
        "Match {}: {} (seat 1) vs {} (seat 2)",
        session_id, names.one, names.two
    );

    let session = GameSession::new(session_id, clients, names.clone());
    let snapshot = session.snapshot();
    state.sessions.insert(session_id, session);
    state.client_sessions.insert(seat_one, session_id);
    state.client_sessions.insert(seat_two, session_id);

    // A connection can finish tearing down between the pairing and
    // this registration; its disconnect handler found nothing to
    // clean up then, so replay it now that the session exists.
    for id in [seat_one, seat_two] {
        if !state.client_senders.contains_key(&id) {
            handle_disconnect(id, state);
            return;
        }
    }

    let players = PerSeat::new(
        PlayerProfile {
            username: names.one,
        },
        PlayerProfile {
            username: names.two,
        },
    );
    for seat in Seat::ALL {
        state.send_to_client(
            clients[seat],
            ServerMessage::MatchFound {
                seat,
                players: players.clone(),
                state: snapshot.clone(),
            },
        );
    }
}

/// Handle a client disconnect: drop any queue entry, tear down the
/// session, notify the survivor, and put them straight back in the
/// queue rather than stranding them.
fn handle_disconnect(client_id: Uuid, state: &Arc<ServerState>) {
    state.matchmaker().cancel(client_id);

    if let Some((_, session_id)) = state.client_sessions.remove(&client_id) {
        if let Some((_, session)) = state.sessions.remove(&session_id) {
            info!("Session {} torn down: {} left", session_id, client_id);
            if let Some(survivor) = session.other_client(client_id) {
                state.client_sessions.remove(&survivor);
                state.send_to_client(survivor, ServerMessage::OpponentLeft);
                if state.client_senders.contains_key(&survivor) {
                    enqueue_client(survivor, QueueStatus::Waiting, state);
                }
            }
        }
    }

    state.usernames.remove(&client_id);
}
