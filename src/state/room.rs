//! Per-room commit-then-reveal protocol
//!
//! `Room` is plain data plus synchronous transitions. Every transition either
//! fails without touching the room or applies completely and returns the
//! pushes that should go out to other connections. Locking, delivery and
//! persistence live one layer up in `AppState`.

use crate::commitment;
use crate::config::RoomConfig;
use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::types::*;
use rand::distr::Alphanumeric;
use rand::Rng;
use tokio::time::Instant;

const SESSION_TOKEN_LENGTH: usize = 32;

/// Long opaque secret used only for reattaching to a role
pub fn generate_session_token() -> SessionToken {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// A push addressed to one connection
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub to: ConnectionId,
    pub msg: ServerMessage,
}

impl Notice {
    fn new(to: &ConnectionId, msg: ServerMessage) -> Self {
        Self {
            to: to.clone(),
            msg,
        }
    }
}

/// Player 1's number and salt, disclosed together at reveal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reveal {
    pub number: u32,
    pub salt: String,
}

#[derive(Debug, Clone)]
pub struct Player1 {
    /// None while the player is away
    pub connection: Option<ConnectionId>,
    pub session_token: SessionToken,
    pub name: Option<String>,
    pub number_hash: Option<String>,
    pub reveal: Option<Reveal>,
}

#[derive(Debug, Clone)]
pub struct Player2 {
    pub connection: Option<ConnectionId>,
    pub session_token: SessionToken,
    pub name: Option<String>,
    pub number: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Room {
    /// Distinguishes this room from any other that ever held the same code
    pub id: RoomId,
    pub code: RoomCode,
    pub state: RoomState,
    pub player1: Player1,
    pub player2: Option<Player2>,
    pub spectators: Vec<ConnectionId>,
    pub challenge: Option<String>,
    pub max_number: u32,
    pub result: Option<GameResult>,
    pub created_at: Instant,
}

impl Room {
    /// Open a room with `connection` as player 1
    pub fn new(code: RoomCode, connection: ConnectionId, default_max_number: u32) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            code,
            state: RoomState::Waiting,
            player1: Player1 {
                connection: Some(connection),
                session_token: generate_session_token(),
                name: None,
                number_hash: None,
                reveal: None,
            },
            player2: None,
            spectators: Vec::new(),
            challenge: None,
            max_number: default_max_number,
            result: None,
            created_at: Instant::now(),
        }
    }

    /// Role currently held by `connection` in this room, if any
    pub fn role_of(&self, connection: &ConnectionId) -> Option<Role> {
        if self.player1.connection.as_ref() == Some(connection) {
            Some(Role::Player1)
        } else if self.player2.as_ref().and_then(|p| p.connection.as_ref()) == Some(connection) {
            Some(Role::Player2)
        } else if self.spectators.contains(connection) {
            Some(Role::Spectator)
        } else {
            None
        }
    }

    fn challenge_if_set(&self) -> (Option<String>, Option<u32>) {
        if self.state == RoomState::Waiting {
            (None, None)
        } else {
            (self.challenge.clone(), Some(self.max_number))
        }
    }

    /// Admit a new party as player 2, or as a spectator once the seat is taken
    /// or the game is over.
    pub fn join(
        &mut self,
        connection: &ConnectionId,
    ) -> Result<(JoinOutcome, Vec<Notice>), GameError> {
        if self.role_of(connection).is_some() {
            return Err(GameError::Conflict("Already in this room"));
        }

        if self.player2.is_some() || self.state == RoomState::Completed {
            self.spectators.push(connection.clone());
            let (challenge, max_number) = self.challenge_if_set();
            let outcome = JoinOutcome {
                room_code: self.code.clone(),
                role: Role::Spectator,
                state: self.state,
                session_token: None,
                challenge,
                max_number,
                player1_name: self.player1.name.clone(),
                player2_name: self.player2.as_ref().and_then(|p| p.name.clone()),
                result: self.result.clone(),
                has_challenge: None,
            };
            return Ok((outcome, Vec::new()));
        }

        let player2 = Player2 {
            connection: Some(connection.clone()),
            session_token: generate_session_token(),
            name: None,
            number: None,
        };
        let session_token = player2.session_token.clone();
        self.player2 = Some(player2);

        let (challenge, max_number) = self.challenge_if_set();
        let outcome = JoinOutcome {
            room_code: self.code.clone(),
            role: Role::Player2,
            state: self.state,
            session_token: Some(session_token),
            challenge,
            max_number,
            player1_name: self.player1.name.clone(),
            player2_name: None,
            result: None,
            has_challenge: Some(self.state == RoomState::ChallengeSet),
        };
        let notices = self
            .player1
            .connection
            .iter()
            .map(|to| Notice::new(to, ServerMessage::PlayerJoined))
            .collect();
        Ok((outcome, notices))
    }

    /// Reattach `connection` to the role owning `token`.
    ///
    /// Returns the outcome and the connection previously attached to that role.
    pub fn rejoin(
        &mut self,
        token: &str,
        connection: &ConnectionId,
    ) -> Result<(RejoinOutcome, Option<ConnectionId>), GameError> {
        let (role, previous, opponent_name) = if self.player1.session_token == token {
            let previous =
                self.player1.connection.replace(connection.clone());
            let opponent = self.player2.as_ref().and_then(|p| p.name.clone());
            (Role::Player1, previous, opponent)
        } else if let Some(p2) = self.player2.as_mut().filter(|p| p.session_token == token) {
            let previous = p2.connection.replace(connection.clone());
            (Role::Player2, previous, self.player1.name.clone())
        } else {
            return Err(GameError::InvalidSession);
        };

        // A spectator reclaiming a seat on the same connection stops spectating
        self.spectators.retain(|c| c != connection);

        let (challenge, max_number) = self.challenge_if_set();
        let outcome = RejoinOutcome {
            room_code: self.code.clone(),
            role,
            state: self.state,
            challenge,
            max_number,
            result: self.result.clone(),
            opponent_name,
        };
        Ok((outcome, previous))
    }

    pub fn set_name(
        &mut self,
        role: Role,
        name: &str,
        config: &RoomConfig,
    ) -> Result<Vec<Notice>, GameError> {
        if self.state == RoomState::Completed {
            return Err(GameError::Conflict("Game is already over"));
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::InvalidInput("Name cannot be empty".to_string()));
        }
        if name.chars().count() > config.max_name_chars {
            return Err(GameError::InvalidInput(format!(
                "Name must be at most {} characters",
                config.max_name_chars
            )));
        }

        match role {
            Role::Player1 => {
                self.player1.name = Some(name.to_string());
                Ok(Vec::new())
            }
            Role::Player2 => {
                let player2 = self
                    .player2
                    .as_mut()
                    .ok_or(GameError::InvalidRole("No player 2 in this room"))?;
                player2.name = Some(name.to_string());
                let named = ServerMessage::Player2Named {
                    name: name.to_string(),
                };
                Ok(self
                    .player1
                    .connection
                    .iter()
                    .map(|to| Notice::new(to, named.clone()))
                    .collect())
            }
            Role::Spectator => Err(GameError::InvalidRole("Spectators cannot set a name")),
        }
    }

    pub fn submit_challenge(
        &mut self,
        role: Role,
        challenge: &str,
        max_number: Option<u32>,
        number_hash: &str,
        config: &RoomConfig,
    ) -> Result<Vec<Notice>, GameError> {
        if role != Role::Player1 {
            return Err(GameError::InvalidRole("Only player 1 can set the challenge"));
        }
        match self.state {
            RoomState::Waiting => {}
            RoomState::ChallengeSet => {
                return Err(GameError::Conflict("Challenge already set"));
            }
            RoomState::Completed => return Err(GameError::Conflict("Game is already over")),
        }

        let challenge = challenge.trim();
        let number_hash = number_hash.trim();
        if challenge.is_empty() || number_hash.is_empty() {
            return Err(GameError::InvalidInput(
                "Challenge and number are required".to_string(),
            ));
        }
        if challenge.chars().count() > config.max_challenge_chars {
            return Err(GameError::InvalidInput(format!(
                "Challenge must be at most {} characters",
                config.max_challenge_chars
            )));
        }
        if !commitment::is_well_formed_hash(number_hash) {
            return Err(GameError::InvalidInput(
                "Number hash must be a hex SHA-256 digest".to_string(),
            ));
        }
        let max_number = max_number.unwrap_or(config.default_max_number);
        if max_number < 1 || max_number > config.max_number_ceiling {
            return Err(GameError::InvalidInput(format!(
                "Max number must be between 1 and {}",
                config.max_number_ceiling
            )));
        }

        self.challenge = Some(challenge.to_string());
        self.max_number = max_number;
        self.player1.number_hash = Some(number_hash.to_ascii_lowercase());
        self.state = RoomState::ChallengeSet;

        let ready = ServerMessage::ChallengeReady {
            challenge: challenge.to_string(),
            max_number,
            player1_name: self.player1.name.clone(),
        };
        let notices = self
            .player2
            .iter()
            .filter_map(|p| p.connection.as_ref())
            .chain(self.spectators.iter())
            .map(|to| Notice::new(to, ready.clone()))
            .collect();
        Ok(notices)
    }

    pub fn submit_guess(&mut self, role: Role, number: u32) -> Result<Vec<Notice>, GameError> {
        if role != Role::Player2 {
            return Err(GameError::InvalidRole("Only player 2 can guess"));
        }
        match self.state {
            RoomState::ChallengeSet => {}
            RoomState::Waiting => return Err(GameError::Conflict("No challenge has been set yet")),
            RoomState::Completed => return Err(GameError::Conflict("Game is already over")),
        }
        let max_number = self.max_number;
        let player2 = self
            .player2
            .as_mut()
            .ok_or(GameError::InvalidRole("No player 2 in this room"))?;
        if player2.number.is_some() {
            return Err(GameError::Conflict("Guess already submitted"));
        }
        if !(1..=max_number).contains(&number) {
            return Err(GameError::InvalidInput(format!(
                "Guess must be between 1 and {}",
                max_number
            )));
        }

        player2.number = Some(number);
        let submitted = ServerMessage::GuessSubmitted {
            player2_name: player2.name.clone(),
        };
        let notices = self
            .player1
            .connection
            .iter()
            .map(|to| Notice::new(to, submitted.clone()))
            .collect();
        Ok(notices)
    }

    /// Open player 1's commitment and finish the game.
    ///
    /// The returned result is the one stored on the room; every notice carries
    /// a clone of it.
    pub fn reveal(
        &mut self,
        role: Role,
        number: u32,
        salt: &str,
    ) -> Result<(GameResult, Vec<Notice>), GameError> {
        if role != Role::Player1 {
            return Err(GameError::InvalidRole("Only player 1 can reveal"));
        }
        if self.state == RoomState::Completed {
            return Err(GameError::Conflict("Game is already over"));
        }
        let player2 = self
            .player2
            .as_ref()
            .ok_or(GameError::InvalidRole("No opponent has joined yet"))?;
        let guess = player2
            .number
            .ok_or(GameError::Conflict("Opponent has not guessed yet"))?;
        let (challenge, number_hash) = match (&self.challenge, &self.player1.number_hash) {
            (Some(c), Some(h)) => (c.clone(), h.clone()),
            _ => return Err(GameError::Conflict("No challenge has been set yet")),
        };
        if !commitment::verify(number, salt, &number_hash) {
            return Err(GameError::InvalidInput(
                "Revealed number does not match the commitment".to_string(),
            ));
        }

        let result = GameResult {
            player1_number: number,
            player2_number: guess,
            salt: salt.to_string(),
            number_hash,
            matched: number == guess,
            challenge,
            player1_name: self
                .player1
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_PLAYER1_NAME.to_string()),
            player2_name: player2
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_PLAYER2_NAME.to_string()),
        };

        self.player1.reveal = Some(Reveal {
            number,
            salt: salt.to_string(),
        });
        self.result = Some(result.clone());
        self.state = RoomState::Completed;

        let push = ServerMessage::GameResult {
            result: result.clone(),
        };
        let notices = player2
            .connection
            .iter()
            .chain(self.spectators.iter())
            .map(|to| Notice::new(to, push.clone()))
            .collect();
        Ok((result, notices))
    }

    /// Detach a departing connection. Seats are kept for rejoin; only the
    /// other player is told.
    pub fn disconnect(&mut self, connection: &ConnectionId) -> Vec<Notice> {
        match self.role_of(connection) {
            Some(Role::Player1) => {
                self.player1.connection = None;
                self.player2
                    .iter()
                    .filter_map(|p| p.connection.as_ref())
                    .map(|to| Notice::new(to, ServerMessage::OpponentDisconnected))
                    .collect()
            }
            Some(Role::Player2) => {
                if let Some(p2) = self.player2.as_mut() {
                    p2.connection = None;
                }
                self.player1
                    .connection
                    .iter()
                    .map(|to| Notice::new(to, ServerMessage::OpponentDisconnected))
                    .collect()
            }
            Some(Role::Spectator) => {
                self.spectators.retain(|c| c != connection);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Lobby entry, if this room is still looking for a guesser
    pub fn joinable_summary(&self, now: Instant) -> Option<RoomSummary> {
        if self.state != RoomState::ChallengeSet || self.player2.is_some() {
            return None;
        }
        Some(RoomSummary {
            room_code: self.code.clone(),
            challenge: self.challenge.clone(),
            max_number: self.max_number,
            player1_name: self.player1.name.clone(),
            created_secs_ago: now.saturating_duration_since(self.created_at).as_secs(),
        })
    }

    /// Row for the history log, once the game is complete
    pub fn history_record(&self) -> Option<HistoryRecord> {
        let result = self.result.as_ref()?;
        Some(HistoryRecord {
            room_code: self.code.clone(),
            player1_name: result.player1_name.clone(),
            player2_name: result.player2_name.clone(),
            challenge: result.challenge.clone(),
            max_number: self.max_number,
            player1_number: result.player1_number,
            player2_number: result.player2_number,
            matched: result.matched,
        })
    }
}
