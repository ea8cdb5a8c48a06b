use shared::{Guid, ProtocolError, SpawnError, WorldError};
use thiserror::Error;

use crate::level::LevelError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Spawn error: {0}")]
    Spawn(#[from] SpawnError),
    #[error("World error: {0}")]
    World(#[from] WorldError),
    #[error("Level error: {0}")]
    Level(#[from] LevelError),
    #[error("Session {session} sent an update for object {claimed}")]
    ProtocolViolation { session: Guid, claimed: Guid },
    #[error("Unexpected {0} packet from client")]
    UnexpectedPacket(&'static str),
    #[error("Server is full ({0} clients)")]
    ServerFull(usize),
    #[error("Server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServerError {
    /// Errors that leave the whole server unable to admit anyone
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServerError::Spawn(SpawnError::NoSpawnPoints)
                | ServerError::World(_)
                | ServerError::Level(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ServerError::Spawn(SpawnError::NoSpawnPoints).is_fatal());
        assert!(ServerError::World(WorldError::GuidsExhausted).is_fatal());
        assert!(!ServerError::Spawn(SpawnError::NoFreeSpawnPoint).is_fatal());
        assert!(!ServerError::ServerFull(4).is_fatal());
        assert!(!ServerError::Protocol(ProtocolError::ConnectionClosed).is_fatal());
    }

    #[test]
    fn test_violation_message_names_both_guids() {
        let e = ServerError::ProtocolViolation {
            session: 4,
            claimed: 9,
        };
        assert_eq!(e.to_string(), "Session 4 sent an update for object 9");
    }
}
