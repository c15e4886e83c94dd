use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use onetoten::commitment::{commit, generate_salt};
use onetoten::config::RoomConfig;
use onetoten::history::{HistoryError, HistorySink, SqliteHistory};
use onetoten::protocol::{ClientFrame, ClientMessage, Reply, ServerMessage};
use onetoten::state::{spawn_idle_sweeper, AppState};
use onetoten::types::{ConnectionId, GameRecord, HistoryRecord, Role, RoomState};
use onetoten::ws::handlers::handle_message;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt;

/// History that keeps records in memory; no real I/O so paused-clock tests stay deterministic
#[derive(Default)]
struct MemoryHistory {
    records: Mutex<Vec<HistoryRecord>>,
}

#[async_trait]
impl HistorySink for MemoryHistory {
    async fn append(&self, record: &HistoryRecord) -> Result<(), HistoryError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn recent(&self, _limit: u32) -> Result<Vec<GameRecord>, HistoryError> {
        Ok(Vec::new())
    }
}

struct BrokenHistory;

#[async_trait]
impl HistorySink for BrokenHistory {
    async fn append(&self, _record: &HistoryRecord) -> Result<(), HistoryError> {
        Err(HistoryError::Sqlx(sqlx::Error::PoolClosed))
    }

    async fn recent(&self, _limit: u32) -> Result<Vec<GameRecord>, HistoryError> {
        Err(HistoryError::Sqlx(sqlx::Error::PoolClosed))
    }
}

/// A connected client: its id and the pushes addressed to it
struct Client {
    id: ConnectionId,
    pushes: UnboundedReceiver<ServerMessage>,
}

impl Client {
    async fn connect(state: &AppState, name: &str) -> Self {
        let id = name.to_string();
        let pushes = state.connections.register(&id).await;
        Self { id, pushes }
    }

    async fn send(&self, state: &AppState, msg: ClientMessage) -> Reply {
        handle_message(msg, &self.id, state).await
    }

    fn next_push(&mut self) -> ServerMessage {
        self.pushes.try_recv().expect("Expected a pending push")
    }

    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.pushes.try_recv() {
            out.push(msg);
        }
        out
    }
}

fn memory_state() -> AppState {
    AppState::new(Arc::new(MemoryHistory::default()), RoomConfig::default())
}

/// p1 created a room, p2 joined, a challenge committed to `secret` is set.
/// Returns the room code, p2's session token and the salt.
async fn seated_game(
    state: &AppState,
    p1: &Client,
    p2: &Client,
    secret: u32,
) -> (String, String, String) {
    let created = p1.send(state, ClientMessage::CreateRoom).await;
    let code = created.room_code.expect("room code");

    let joined = p2
        .send(
            state,
            ClientMessage::JoinRoom {
                room_code: code.clone(),
            },
        )
        .await;
    let token = joined.session_token.expect("player 2 token");

    let salt = generate_salt();
    let reply = p1
        .send(
            state,
            ClientMessage::SubmitChallenge {
                challenge: "Pick your lucky number".to_string(),
                max_number: Some(5),
                number_hash: commit(secret, &salt),
            },
        )
        .await;
    assert!(reply.success, "challenge rejected: {:?}", reply.error);

    (code, token, salt)
}

/// End-to-end game against the real SQLite history
#[tokio::test]
async fn test_full_game_flow() {
    let history = Arc::new(SqliteHistory::open(":memory:").await.unwrap());
    let state = AppState::new(history.clone(), RoomConfig::default());
    let mut p1 = Client::connect(&state, "p1").await;
    let mut p2 = Client::connect(&state, "p2").await;
    let mut watcher = Client::connect(&state, "watcher").await;

    // 1. Create and name
    let created = p1.send(&state, ClientMessage::CreateRoom).await;
    assert!(created.success);
    let code = created.room_code.unwrap();
    assert!(created.session_token.is_some());

    let reply = p1
        .send(
            &state,
            ClientMessage::SetName {
                name: "Alice".to_string(),
            },
        )
        .await;
    assert!(reply.success);

    // 2. Guesser joins before the challenge
    let joined = p2
        .send(
            &state,
            ClientMessage::JoinRoom {
                room_code: code.to_lowercase(),
            },
        )
        .await;
    assert!(joined.success);
    assert_eq!(joined.role, Some(Role::Player2));
    assert_eq!(joined.has_challenge, Some(false));
    assert_eq!(joined.player1_name.as_deref(), Some("Alice"));
    assert_eq!(p1.next_push(), ServerMessage::PlayerJoined);

    p2.send(
        &state,
        ClientMessage::SetName {
            name: "Bob".to_string(),
        },
    )
    .await;
    assert_eq!(
        p1.next_push(),
        ServerMessage::Player2Named {
            name: "Bob".to_string()
        }
    );

    // 3. Commit
    let salt = generate_salt();
    let reply = p1
        .send(
            &state,
            ClientMessage::SubmitChallenge {
                challenge: "Pick your lucky number".to_string(),
                max_number: Some(5),
                number_hash: commit(3, &salt),
            },
        )
        .await;
    assert!(reply.success);
    assert_eq!(
        p2.next_push(),
        ServerMessage::ChallengeReady {
            challenge: "Pick your lucky number".to_string(),
            max_number: 5,
            player1_name: Some("Alice".to_string()),
        }
    );

    // 4. A third party can only watch
    let watching = watcher
        .send(
            &state,
            ClientMessage::JoinRoom {
                room_code: code.clone(),
            },
        )
        .await;
    assert_eq!(watching.role, Some(Role::Spectator));
    assert_eq!(watching.state, Some(RoomState::ChallengeSet));
    assert_eq!(watching.max_number, Some(5));
    assert!(watching.session_token.is_none());

    // 5. Guess, then reveal
    let reply = p2.send(&state, ClientMessage::SubmitGuess { number: 3 }).await;
    assert!(reply.success);
    assert_eq!(
        p1.next_push(),
        ServerMessage::GuessSubmitted {
            player2_name: Some("Bob".to_string())
        }
    );

    let revealed = p1
        .send(
            &state,
            ClientMessage::RevealNumber {
                number: 3,
                salt: salt.clone(),
            },
        )
        .await;
    assert!(revealed.success);
    let result = revealed.result.unwrap();
    assert!(result.matched);
    assert_eq!(result.player1_number, 3);
    assert_eq!(result.player2_number, 3);
    assert_eq!(result.salt, salt);
    assert_eq!(result.number_hash, commit(3, &salt));

    assert_eq!(p2.next_push(), ServerMessage::GameResult { result: result.clone() });
    assert_eq!(watcher.next_push(), ServerMessage::GameResult { result });

    // 6. History lands in the background
    let mut rows = Vec::new();
    for _ in 0..100 {
        rows = history.recent(10).await.unwrap();
        if !rows.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].room_code, code);
    assert_eq!(rows[0].challenge, "Pick your lucky number");
    assert_eq!(rows[0].max_number, 5);
    assert_eq!(rows[0].player1_number, 3);
    assert_eq!(rows[0].player2_number, 3);
    assert_eq!(rows[0].matched, 1);

    // 7. And is served over HTTP
    let app = onetoten::app(Arc::new(state), "public");
    let response = app
        .oneshot(Request::get("/history").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body[0]["player1_number"], 3);
    assert_eq!(body[0]["matched"], 1);
}

#[tokio::test]
async fn test_result_is_identical_for_everyone() {
    let state = memory_state();
    let p1 = Client::connect(&state, "p1").await;
    let mut p2 = Client::connect(&state, "p2").await;
    let mut s1 = Client::connect(&state, "s1").await;
    let (code, _, salt) = seated_game(&state, &p1, &p2, 7).await;
    s1.send(&state, ClientMessage::JoinRoom { room_code: code.clone() })
        .await;
    p2.send(&state, ClientMessage::SubmitGuess { number: 2 }).await;

    let revealed = p1
        .send(&state, ClientMessage::RevealNumber { number: 7, salt })
        .await;
    let replied = serde_json::to_string(&revealed.result.unwrap()).unwrap();

    for client in [&mut p2, &mut s1] {
        let pushed = client
            .drain()
            .into_iter()
            .find_map(|msg| match msg {
                ServerMessage::GameResult { result } => Some(result),
                _ => None,
            })
            .expect("game result push");
        assert_eq!(serde_json::to_string(&pushed).unwrap(), replied);
        assert!(!pushed.matched);
    }

    // A late spectator gets the very same snapshot
    let late = Client::connect(&state, "late").await;
    let snapshot = late
        .send(&state, ClientMessage::JoinRoom { room_code: code })
        .await;
    assert_eq!(snapshot.state, Some(RoomState::Completed));
    assert_eq!(
        serde_json::to_string(&snapshot.result.unwrap()).unwrap(),
        replied
    );
}

#[tokio::test]
async fn test_rejoin_after_disconnect() {
    let state = memory_state();
    let mut p1 = Client::connect(&state, "p1").await;
    let p2 = Client::connect(&state, "p2").await;
    let (code, token, salt) = seated_game(&state, &p1, &p2, 4).await;
    p1.drain();

    // Guesser drops; host is told, the seat survives
    state.disconnect(&p2.id).await;
    assert_eq!(p1.next_push(), ServerMessage::OpponentDisconnected);

    let mut p2b = Client::connect(&state, "p2-reconnected").await;
    let rejoined = p2b
        .send(
            &state,
            ClientMessage::RejoinRoom {
                room_code: code.clone(),
                session_token: token.clone(),
            },
        )
        .await;
    assert!(rejoined.success);
    assert_eq!(rejoined.role, Some(Role::Player2));
    assert_eq!(rejoined.state, Some(RoomState::ChallengeSet));
    assert_eq!(rejoined.challenge.as_deref(), Some("Pick your lucky number"));
    assert_eq!(rejoined.max_number, Some(5));
    // No new token is issued
    assert!(rejoined.session_token.is_none());

    p2b.send(&state, ClientMessage::SubmitGuess { number: 4 }).await;
    let revealed = p1
        .send(&state, ClientMessage::RevealNumber { number: 4, salt })
        .await;
    assert!(revealed.result.as_ref().unwrap().matched);
    assert!(matches!(p2b.next_push(), ServerMessage::GameResult { .. }));

    // Rejoining a completed room still works and replays the result
    let mut p2c = Client::connect(&state, "p2-again").await;
    let again = p2c
        .send(
            &state,
            ClientMessage::RejoinRoom {
                room_code: code,
                session_token: token,
            },
        )
        .await;
    assert_eq!(again.state, Some(RoomState::Completed));
    assert_eq!(again.result, revealed.result);
    assert!(p2c.drain().is_empty());
}

#[tokio::test]
async fn test_rejoin_with_bad_token() {
    let state = memory_state();
    let p1 = Client::connect(&state, "p1").await;
    let p2 = Client::connect(&state, "p2").await;
    let (code, _, _) = seated_game(&state, &p1, &p2, 1).await;
    let before = format!("{:?}", state.get_room(&code).await.unwrap());

    let stranger = Client::connect(&state, "stranger").await;
    for (room_code, session_token) in [(code.clone(), "forged"), ("QQQQQQ".to_string(), "x")] {
        let reply = stranger
            .send(
                &state,
                ClientMessage::RejoinRoom {
                    room_code,
                    session_token: session_token.to_string(),
                },
            )
            .await;
        assert!(!reply.success);
        assert_eq!(reply.code.as_deref(), Some("INVALID_SESSION"));
    }

    assert_eq!(format!("{:?}", state.get_room(&code).await.unwrap()), before);
}

#[tokio::test]
async fn test_wrong_role_and_wrong_state() {
    let state = memory_state();
    let p1 = Client::connect(&state, "p1").await;
    let p2 = Client::connect(&state, "p2").await;
    let (_, _, salt) = seated_game(&state, &p1, &p2, 3).await;

    let reply = p1.send(&state, ClientMessage::SubmitGuess { number: 3 }).await;
    assert_eq!(reply.code.as_deref(), Some("INVALID_ROLE"));

    let reply = p2
        .send(
            &state,
            ClientMessage::SubmitChallenge {
                challenge: "Mine".to_string(),
                max_number: None,
                number_hash: commit(1, "s"),
            },
        )
        .await;
    assert_eq!(reply.code.as_deref(), Some("INVALID_ROLE"));

    // Reveal before any guess
    let reply = p1
        .send(
            &state,
            ClientMessage::RevealNumber {
                number: 3,
                salt: salt.clone(),
            },
        )
        .await;
    assert_eq!(reply.code.as_deref(), Some("CONFLICT"));

    let reply = p2.send(&state, ClientMessage::SubmitGuess { number: 6 }).await;
    assert_eq!(reply.code.as_deref(), Some("INVALID_INPUT"));
    let reply = p2.send(&state, ClientMessage::SubmitGuess { number: 5 }).await;
    assert!(reply.success);

    // Changing the committed number is refused
    let reply = p1
        .send(
            &state,
            ClientMessage::RevealNumber {
                number: 5,
                salt: salt.clone(),
            },
        )
        .await;
    assert_eq!(reply.code.as_deref(), Some("INVALID_INPUT"));

    let reply = p1
        .send(&state, ClientMessage::RevealNumber { number: 3, salt })
        .await;
    assert!(reply.success);
    assert!(!reply.result.unwrap().matched);
}

#[tokio::test]
async fn test_history_failure_does_not_block_result() {
    let state = AppState::new(Arc::new(BrokenHistory), RoomConfig::default());
    let p1 = Client::connect(&state, "p1").await;
    let mut p2 = Client::connect(&state, "p2").await;
    let (_, _, salt) = seated_game(&state, &p1, &p2, 2).await;
    p2.send(&state, ClientMessage::SubmitGuess { number: 2 }).await;

    let reply = p1
        .send(&state, ClientMessage::RevealNumber { number: 2, salt })
        .await;
    assert!(reply.success);
    assert!(p2
        .drain()
        .iter()
        .any(|msg| matches!(msg, ServerMessage::GameResult { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_idle_room_expires() {
    let state = memory_state();
    let _sweeper = spawn_idle_sweeper(state.clone());
    let p1 = Client::connect(&state, "p1").await;
    let code = p1
        .send(&state, ClientMessage::CreateRoom)
        .await
        .room_code
        .unwrap();

    tokio::time::sleep(Duration::from_secs(30 * 60)).await;
    assert!(state.get_room(&code).await.is_some());

    tokio::time::sleep(Duration::from_secs(32 * 60)).await;
    assert!(state.get_room(&code).await.is_none());

    let late = Client::connect(&state, "late").await;
    let reply = late
        .send(&state, ClientMessage::JoinRoom { room_code: code })
        .await;
    assert_eq!(reply.code.as_deref(), Some("ROOM_NOT_FOUND"));

    // The host's session went with the room
    let reply = p1
        .send(
            &state,
            ClientMessage::SetName {
                name: "Alice".to_string(),
            },
        )
        .await;
    assert_eq!(reply.code.as_deref(), Some("NOT_IN_ROOM"));
}

#[tokio::test(start_paused = true)]
async fn test_completed_room_lingers_for_grace_period() {
    let state = memory_state();
    let p1 = Client::connect(&state, "p1").await;
    let p2 = Client::connect(&state, "p2").await;
    let (code, token, salt) = seated_game(&state, &p1, &p2, 5).await;
    p2.send(&state, ClientMessage::SubmitGuess { number: 5 }).await;
    p1.send(&state, ClientMessage::RevealNumber { number: 5, salt })
        .await;

    // Late rejoin within the grace period
    tokio::time::sleep(Duration::from_secs(4 * 60)).await;
    let p2b = Client::connect(&state, "p2b").await;
    let reply = p2b
        .send(
            &state,
            ClientMessage::RejoinRoom {
                room_code: code.clone(),
                session_token: token.clone(),
            },
        )
        .await;
    assert!(reply.success);
    assert!(reply.result.unwrap().matched);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(state.get_room(&code).await.is_none());

    let reply = p2b
        .send(
            &state,
            ClientMessage::RejoinRoom {
                room_code: code,
                session_token: token,
            },
        )
        .await;
    assert_eq!(reply.code.as_deref(), Some("INVALID_SESSION"));
}

#[tokio::test]
async fn test_rooms_endpoint_lists_open_challenges() {
    let state = memory_state();
    let p1 = Client::connect(&state, "p1").await;
    let code = p1
        .send(&state, ClientMessage::CreateRoom)
        .await
        .room_code
        .unwrap();
    p1.send(
        &state,
        ClientMessage::SubmitChallenge {
            challenge: "Lucky?".to_string(),
            max_number: None,
            number_hash: commit(9, "pepper"),
        },
    )
    .await;

    let app = onetoten::app(Arc::new(state), "public");
    let response = app
        .oneshot(Request::get("/rooms").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body[0]["roomCode"], code.as_str());
    assert_eq!(body[0]["maxNumber"], 10);
}

#[test]
fn test_wire_frames() {
    let frame: ClientFrame = serde_json::from_str(
        r#"{"t":"reveal-number","req":9,"number":3,"salt":"abc"}"#,
    )
    .unwrap();
    assert_eq!(frame.req, Some(9));
    assert_eq!(
        frame.msg,
        ClientMessage::RevealNumber {
            number: 3,
            salt: "abc".to_string()
        }
    );

    let reply = Reply::ok().with_req(frame.req);
    let json = serde_json::to_value(ServerMessage::Reply(reply)).unwrap();
    assert_eq!(json, serde_json::json!({"t": "reply", "req": 9, "success": true}));

    assert!(serde_json::from_str::<ClientFrame>(r#"{"t":"launch-missiles"}"#).is_err());
}
