//! WebSocket message dispatch
//!
//! Maps each client message onto a room operation and its outcome onto the
//! single reply the client is waiting for.

use crate::protocol::{ClientMessage, Reply};
use crate::state::AppState;
use crate::types::ConnectionId;

/// Handle one client message and build its reply
pub async fn handle_message(
    msg: ClientMessage,
    connection: &ConnectionId,
    state: &AppState,
) -> Reply {
    match msg {
        ClientMessage::CreateRoom => state
            .create_room(connection)
            .await
            .map(|(code, token)| Reply::room_created(code, token))
            .into(),

        ClientMessage::JoinRoom { room_code } => {
            state.join_room(connection, &room_code).await.into()
        }

        ClientMessage::RejoinRoom {
            room_code,
            session_token,
        } => state
            .rejoin_room(connection, &room_code, &session_token)
            .await
            .into(),

        ClientMessage::SetName { name } => state
            .set_name(connection, &name)
            .await
            .map(|()| Reply::ok())
            .into(),

        ClientMessage::SubmitChallenge {
            challenge,
            max_number,
            number_hash,
        } => state
            .submit_challenge(connection, &challenge, max_number, &number_hash)
            .await
            .map(|()| Reply::ok())
            .into(),

        ClientMessage::SubmitGuess { number } => state
            .submit_guess(connection, number)
            .await
            .map(|()| Reply::ok())
            .into(),

        ClientMessage::RevealNumber { number, salt } => state
            .reveal_number(connection, number, &salt)
            .await
            .map(Reply::revealed)
            .into(),
    }
}
