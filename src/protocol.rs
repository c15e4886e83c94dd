use crate::error::GameError;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// A client frame: the message plus an optional correlation id echoed in the reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req: Option<u64>,
    #[serde(flatten)]
    pub msg: ClientMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    CreateRoom,
    JoinRoom {
        room_code: String,
    },
    RejoinRoom {
        room_code: String,
        session_token: String,
    },
    SetName {
        name: String,
    },
    SubmitChallenge {
        /// Missing text is answered with INVALID_INPUT rather than a parse error
        #[serde(default)]
        challenge: String,
        #[serde(default)]
        max_number: Option<u32>,
        #[serde(default)]
        number_hash: String,
    },
    SubmitGuess {
        number: u32,
    },
    RevealNumber {
        number: u32,
        salt: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Answer to exactly one client frame
    Reply(Reply),
    /// Sent to player 1 when a guesser takes the second seat
    PlayerJoined,
    Player2Named {
        name: String,
    },
    /// Sent to player 2 and spectators once the challenge is committed
    ChallengeReady {
        challenge: String,
        max_number: u32,
        player1_name: Option<String>,
    },
    /// Sent to player 1: time to reveal
    GuessSubmitted {
        player2_name: Option<String>,
    },
    GameResult {
        result: GameResult,
    },
    OpponentDisconnected,
    /// Frame-level problems (unparsable input, rate limiting)
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn error(code: &str, msg: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            msg: msg.into(),
        }
    }
}

/// Reply payload. Only the fields relevant to the request are serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req: Option<u64>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_code: Option<RoomCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<SessionToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<RoomState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player1_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player2_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opponent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_challenge: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GameResult>,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(err: &GameError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            code: Some(err.code().to_string()),
            ..Default::default()
        }
    }

    pub fn room_created(room_code: RoomCode, session_token: SessionToken) -> Self {
        Self {
            room_code: Some(room_code),
            session_token: Some(session_token),
            ..Self::ok()
        }
    }

    pub fn revealed(result: GameResult) -> Self {
        Self {
            result: Some(result),
            ..Self::ok()
        }
    }

    pub fn with_req(mut self, req: Option<u64>) -> Self {
        self.req = req;
        self
    }
}

impl From<JoinOutcome> for Reply {
    fn from(o: JoinOutcome) -> Self {
        Self {
            room_code: Some(o.room_code),
            session_token: o.session_token,
            role: Some(o.role),
            state: Some(o.state),
            challenge: o.challenge,
            max_number: o.max_number,
            player1_name: o.player1_name,
            player2_name: o.player2_name,
            has_challenge: o.has_challenge,
            result: o.result,
            ..Self::ok()
        }
    }
}

impl From<RejoinOutcome> for Reply {
    fn from(o: RejoinOutcome) -> Self {
        Self {
            room_code: Some(o.room_code),
            role: Some(o.role),
            state: Some(o.state),
            challenge: o.challenge,
            max_number: o.max_number,
            result: o.result,
            opponent_name: o.opponent_name,
            ..Self::ok()
        }
    }
}

impl<T> From<Result<T, GameError>> for Reply
where
    T: Into<Reply>,
{
    fn from(r: Result<T, GameError>) -> Self {
        match r {
            Ok(v) => v.into(),
            Err(e) => Reply::failed(&e),
        }
    }
}
