use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type RoomCode = String;
pub type RoomId = String;
pub type SessionToken = String;
pub type ConnectionId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Waiting,
    ChallengeSet,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player1,
    Player2,
    Spectator,
}

/// Binding of a live connection to a role in a room.
///
/// Looked up by connection id so the room logic never sees transport types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub room_code: RoomCode,
    pub role: Role,
    /// None for spectators, who cannot resume anything
    pub token: Option<SessionToken>,
}

pub const DEFAULT_PLAYER1_NAME: &str = "Player 1";
pub const DEFAULT_PLAYER2_NAME: &str = "Player 2";

/// Immutable snapshot of a finished game.
///
/// Built once at reveal and replayed verbatim to everyone who asks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    pub player1_number: u32,
    pub player2_number: u32,
    pub salt: String,
    pub number_hash: String,
    pub matched: bool,
    pub challenge: String,
    pub player1_name: String,
    pub player2_name: String,
}

/// A joinable room as shown in the lobby browser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_code: RoomCode,
    pub challenge: Option<String>,
    pub max_number: u32,
    pub player1_name: Option<String>,
    pub created_secs_ago: u64,
}

/// One completed game as handed to the history store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub room_code: RoomCode,
    pub player1_name: String,
    pub player2_name: String,
    pub challenge: String,
    pub max_number: u32,
    pub player1_number: u32,
    pub player2_number: u32,
    pub matched: bool,
}

/// One completed game as read back from the history store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct GameRecord {
    pub id: i64,
    pub room_code: String,
    pub player1_name: String,
    pub player2_name: String,
    pub challenge: String,
    pub max_number: i64,
    pub player1_number: i64,
    pub player2_number: i64,
    /// 1 for a match, 0 otherwise
    pub matched: i64,
    pub created_at: String,
}

/// What a party learns when admitted to a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub room_code: RoomCode,
    pub role: Role,
    pub state: RoomState,
    /// Issued only to a new player 2
    pub session_token: Option<SessionToken>,
    pub challenge: Option<String>,
    pub max_number: Option<u32>,
    pub player1_name: Option<String>,
    pub player2_name: Option<String>,
    pub result: Option<GameResult>,
    /// Only reported to a new player 2
    pub has_challenge: Option<bool>,
}

/// What a player learns when reattaching to their role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejoinOutcome {
    pub room_code: RoomCode,
    pub role: Role,
    pub state: RoomState,
    pub challenge: Option<String>,
    pub max_number: Option<u32>,
    pub result: Option<GameResult>,
    pub opponent_name: Option<String>,
}
