//! Room registry: live rooms by code plus the connection → session index.
//!
//! Not thread-safe on its own; `AppState` keeps exactly one behind a lock so
//! every room operation sees and leaves a consistent registry.

use super::room::Room;
use crate::error::GameError;
use crate::types::*;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// Safe character set for room codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

/// Generate a random short room code
fn generate_room_code() -> RoomCode {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Canonical form of a user-typed room code
pub fn normalize_code(code: &str) -> RoomCode {
    code.trim().to_ascii_uppercase()
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, Room>,
    sessions: HashMap<ConnectionId, Session>,
    /// Codes of deleted rooms; never handed out again.
    ///
    /// Kept for the life of the process, one 6-character code per deleted
    /// room, so it is bounded by the size of the code space.
    retired: HashSet<RoomCode>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a room with `connection` as player 1 and bind the session.
    ///
    /// Returns the room code and player 1's session token.
    pub fn create(
        &mut self,
        connection: &ConnectionId,
        default_max_number: u32,
    ) -> (RoomCode, SessionToken) {
        // Collisions are rare with ~887M codes; just draw again
        let code = loop {
            let code = generate_room_code();
            if !self.rooms.contains_key(&code) && !self.retired.contains(&code) {
                break code;
            }
        };

        let room = Room::new(code.clone(), connection.clone(), default_max_number);
        let token = room.player1.session_token.clone();
        self.rooms.insert(code.clone(), room);
        self.bind(
            connection,
            Session {
                room_code: code.clone(),
                role: Role::Player1,
                token: Some(token.clone()),
            },
        );
        (code, token)
    }

    /// Case-insensitive room lookup
    pub fn lookup(&self, code: &str) -> Option<&Room> {
        self.rooms.get(&normalize_code(code))
    }

    pub fn lookup_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(&normalize_code(code))
    }

    /// Rooms waiting for a guesser, newest first
    pub fn list_joinable(&self, now: Instant) -> Vec<RoomSummary> {
        let mut rooms: Vec<(&Room, RoomSummary)> = self
            .rooms
            .values()
            .filter_map(|room| room.joinable_summary(now).map(|s| (room, s)))
            .collect();
        rooms.sort_by(|(a, _), (b, _)| b.created_at.cmp(&a.created_at));
        rooms.into_iter().map(|(_, summary)| summary).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Delete a room and every session bound to it. Returns whether it existed.
    pub fn expire(&mut self, code: &str) -> bool {
        let code = normalize_code(code);
        match self.rooms.remove(&code) {
            Some(_) => {
                self.sessions.retain(|_, s| s.room_code != code);
                self.retired.insert(code);
                true
            }
            None => false,
        }
    }

    /// Delete the room at `code` only if it is still the room identified by `id`
    pub fn expire_if(&mut self, code: &str, id: &RoomId) -> bool {
        match self.lookup(code) {
            Some(room) if room.id == *id => self.expire(code),
            _ => false,
        }
    }

    /// Delete every room older than `max_age`. Returns the deleted codes.
    pub fn sweep(&mut self, now: Instant, max_age: Duration) -> Vec<RoomCode> {
        let stale: Vec<RoomCode> = self
            .rooms
            .values()
            .filter(|room| now.saturating_duration_since(room.created_at) > max_age)
            .map(|room| room.code.clone())
            .collect();
        for code in &stale {
            self.expire(code);
        }
        stale
    }

    pub fn bind(&mut self, connection: &ConnectionId, session: Session) {
        self.sessions.insert(connection.clone(), session);
    }

    pub fn unbind(&mut self, connection: &ConnectionId) -> Option<Session> {
        self.sessions.remove(connection)
    }

    pub fn session(&self, connection: &ConnectionId) -> Option<&Session> {
        self.sessions.get(connection)
    }

    /// Resolve a connection to its room and role
    pub fn resolve_mut(
        &mut self,
        connection: &ConnectionId,
    ) -> Result<(Role, &mut Room), GameError> {
        let session = self.sessions.get(connection).ok_or(GameError::NotInRoom)?;
        let role = session.role;
        let room = self
            .rooms
            .get_mut(&session.room_code)
            .ok_or(GameError::RoomNotFound)?;
        Ok((role, room))
    }
}
