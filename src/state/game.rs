//! Room operations as seen from a connection
//!
//! Every operation takes the registry write lock, applies one room transition,
//! releases the lock and only then delivers the resulting pushes.

use super::registry::RoomRegistry;
use super::room::Notice;
use super::{schedule_room_deletion, AppState};
use crate::error::GameError;
use crate::types::*;

/// Drop whatever session `connection` holds, as if it had disconnected
fn release_session(registry: &mut RoomRegistry, connection: &ConnectionId) -> Vec<Notice> {
    let Some(session) = registry.unbind(connection) else {
        return Vec::new();
    };
    match registry.lookup_mut(&session.room_code) {
        Some(room) => room.disconnect(connection),
        None => Vec::new(),
    }
}

impl AppState {
    /// Open a new room with this connection as player 1
    pub async fn create_room(
        &self,
        connection: &ConnectionId,
    ) -> Result<(RoomCode, SessionToken), GameError> {
        let (code, token, notices) = {
            let mut registry = self.registry.write().await;
            let notices = release_session(&mut registry, connection);
            let (code, token) = registry.create(connection, self.config.default_max_number);
            (code, token, notices)
        };
        self.connections.deliver(notices).await;

        tracing::info!(room = %code, connection = %connection, "Room created");
        Ok((code, token))
    }

    /// Take the guesser seat, or watch if it is taken
    pub async fn join_room(
        &self,
        connection: &ConnectionId,
        code: &str,
    ) -> Result<JoinOutcome, GameError> {
        let (outcome, notices) = {
            let mut registry = self.registry.write().await;
            let room = registry.lookup(code).ok_or(GameError::RoomNotFound)?;
            if registry
                .session(connection)
                .is_some_and(|s| s.room_code == room.code)
            {
                return Err(GameError::Conflict("Already in this room"));
            }

            let mut notices = release_session(&mut registry, connection);
            let room = registry.lookup_mut(code).ok_or(GameError::RoomNotFound)?;
            let (outcome, joined) = room.join(connection)?;
            notices.extend(joined);

            registry.bind(
                connection,
                Session {
                    room_code: outcome.room_code.clone(),
                    role: outcome.role,
                    token: outcome.session_token.clone(),
                },
            );
            (outcome, notices)
        };
        self.connections.deliver(notices).await;

        tracing::info!(
            room = %outcome.room_code,
            connection = %connection,
            role = ?outcome.role,
            "Joined room"
        );
        Ok(outcome)
    }

    /// Reattach this connection to a seat by its session token
    pub async fn rejoin_room(
        &self,
        connection: &ConnectionId,
        code: &str,
        token: &str,
    ) -> Result<RejoinOutcome, GameError> {
        let (outcome, notices) = {
            let mut registry = self.registry.write().await;
            let current = registry.session(connection).cloned();
            let room = registry
                .lookup_mut(code)
                .ok_or(GameError::InvalidSession)?;

            // Already seated here under another token
            if let Some(session) = &current {
                if session.room_code == room.code
                    && session.role != Role::Spectator
                    && session.token.as_deref() != Some(token)
                {
                    return Err(GameError::Conflict("Already seated in this room"));
                }
            }

            let (outcome, previous) = room.rejoin(token, connection)?;

            // The replaced connection loses its session only if it is still here
            if let Some(previous) = previous.filter(|p| p != connection) {
                if registry
                    .session(&previous)
                    .is_some_and(|s| s.room_code == outcome.room_code)
                {
                    registry.unbind(&previous);
                }
            }
            let notices = match &current {
                Some(session) if session.room_code != outcome.room_code => {
                    release_session(&mut registry, connection)
                }
                _ => Vec::new(),
            };

            registry.bind(
                connection,
                Session {
                    room_code: outcome.room_code.clone(),
                    role: outcome.role,
                    token: Some(token.to_string()),
                },
            );
            (outcome, notices)
        };
        self.connections.deliver(notices).await;

        tracing::info!(
            room = %outcome.room_code,
            connection = %connection,
            role = ?outcome.role,
            "Rejoined room"
        );
        Ok(outcome)
    }

    pub async fn set_name(&self, connection: &ConnectionId, name: &str) -> Result<(), GameError> {
        let notices = {
            let mut registry = self.registry.write().await;
            let (role, room) = registry.resolve_mut(connection)?;
            room.set_name(role, name, &self.config)?
        };
        self.connections.deliver(notices).await;
        Ok(())
    }

    pub async fn submit_challenge(
        &self,
        connection: &ConnectionId,
        challenge: &str,
        max_number: Option<u32>,
        number_hash: &str,
    ) -> Result<(), GameError> {
        let (code, notices) = {
            let mut registry = self.registry.write().await;
            let (role, room) = registry.resolve_mut(connection)?;
            let notices =
                room.submit_challenge(role, challenge, max_number, number_hash, &self.config)?;
            (room.code.clone(), notices)
        };
        self.connections.deliver(notices).await;

        tracing::info!(room = %code, "Challenge set");
        Ok(())
    }

    pub async fn submit_guess(&self, connection: &ConnectionId, number: u32) -> Result<(), GameError> {
        let (code, notices) = {
            let mut registry = self.registry.write().await;
            let (role, room) = registry.resolve_mut(connection)?;
            let notices = room.submit_guess(role, number)?;
            (room.code.clone(), notices)
        };
        self.connections.deliver(notices).await;

        tracing::info!(room = %code, "Guess submitted");
        Ok(())
    }

    /// Open the commitment, finish the game and fan out the result.
    ///
    /// History is written in the background; the result is delivered whether
    /// or not that succeeds.
    pub async fn reveal_number(
        &self,
        connection: &ConnectionId,
        number: u32,
        salt: &str,
    ) -> Result<GameResult, GameError> {
        let (result, notices, record, code, id) = {
            let mut registry = self.registry.write().await;
            let (role, room) = registry.resolve_mut(connection)?;
            let (result, notices) = room.reveal(role, number, salt)?;
            (
                result,
                notices,
                room.history_record(),
                room.code.clone(),
                room.id.clone(),
            )
        };
        self.connections.deliver(notices).await;

        tracing::info!(room = %code, matched = result.matched, "Game completed");

        if let Some(record) = record {
            let history = self.history.clone();
            tokio::spawn(async move {
                if let Err(e) = history.append(&record).await {
                    tracing::error!(room = %record.room_code, error = %e, "Failed to record game");
                }
            });
        }
        schedule_room_deletion(self.clone(), code, id, self.config.completed_grace);

        Ok(result)
    }

    /// Forget a closed connection. Rooms and seats survive for rejoin.
    pub async fn disconnect(&self, connection: &ConnectionId) {
        let notices = {
            let mut registry = self.registry.write().await;
            release_session(&mut registry, connection)
        };
        self.connections.unregister(connection).await;
        if let Some(ref limiter) = self.abuse.rate_limiter {
            limiter.forget(connection).await;
        }
        if !notices.is_empty() {
            tracing::info!(connection = %connection, "Player disconnected");
        }
        self.connections.deliver(notices).await;
    }
}
