/// Errors returned by room operations.
///
/// All of these are answered to the caller in the reply payload; none of them
/// is fatal to the connection or to other rooms.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Invalid session")]
    InvalidSession,

    #[error("Not in a room")]
    NotInRoom,

    /// Operation attempted by the wrong role, or a role that doesn't exist yet
    #[error("{0}")]
    InvalidRole(&'static str),

    #[error("{0}")]
    InvalidInput(String),

    /// Operation attempted in the wrong room state
    #[error("{0}")]
    Conflict(&'static str),
}

impl GameError {
    /// Stable machine-readable code sent alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            GameError::RoomNotFound => "ROOM_NOT_FOUND",
            GameError::InvalidSession => "INVALID_SESSION",
            GameError::NotInRoom => "NOT_IN_ROOM",
            GameError::InvalidRole(_) => "INVALID_ROLE",
            GameError::InvalidInput(_) => "INVALID_INPUT",
            GameError::Conflict(_) => "CONFLICT",
        }
    }
}
