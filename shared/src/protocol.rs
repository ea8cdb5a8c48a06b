//! Wire format shared by server and client.
//!
//! Each message is a frame: a little-endian `u32` payload length followed by
//! the bincode encoding of a [`Packet`].

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::object::GameObject;

/// Largest payload accepted from the wire
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet {
    /// First server message: the client's own character
    Assigned {
        character: GameObject,
        window_size: i32,
    },
    /// A batch of objects; the first one after `Assigned` is the snapshot
    Objects(Vec<GameObject>),
    /// Client to server: new state of the sender's character
    CharacterUpdate(GameObject),
}

impl Packet {
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Assigned { .. } => "Assigned",
            Packet::Objects(_) => "Objects",
            Packet::CharacterUpdate(_) => "CharacterUpdate",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("Frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),
    #[error("Connection closed by peer")]
    ConnectionClosed,
}

pub fn encode(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let payload = bincode::serialize(packet)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(packet)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame. A clean EOF before the length prefix is reported as
/// [`ProtocolError::ConnectionClosed`].
pub async fn read_packet<R>(reader: &mut R) -> Result<Packet, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(bincode::deserialize(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Color, ObjectKind};
    use tokio_test::io::Builder;

    fn character() -> GameObject {
        let mut character = GameObject::character(3, Color::rgb(200, 10, 10));
        character.guid = 17;
        character
    }

    #[test]
    fn test_frame_has_length_prefix() {
        let frame = encode(&Packet::CharacterUpdate(character())).unwrap();
        let len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);
    }

    #[tokio::test]
    async fn test_write_packet_emits_single_frame() {
        let packet = Packet::CharacterUpdate(character());
        let frame = encode(&packet).unwrap();
        let mut mock = Builder::new().write(&frame).build();

        write_packet(&mut mock, &packet).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_packet_across_split_reads() {
        let packet = Packet::Objects(vec![
            character(),
            GameObject::platform(ObjectKind::StaticPlatform, 100, 400, 50, 10, Color::BLACK),
        ]);
        let frame = encode(&packet).unwrap();
        let (head, tail) = frame.split_at(6);
        let mut mock = Builder::new().read(head).read(tail).build();

        assert_eq!(read_packet(&mut mock).await.unwrap(), packet);
    }

    #[tokio::test]
    async fn test_read_packet_reports_clean_close() {
        let mut mock = Builder::new().build();
        assert!(matches!(
            read_packet(&mut mock).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_read_packet_rejects_oversized_frame() {
        let prefix = ((MAX_FRAME_SIZE + 1) as u32).to_le_bytes();
        let mut mock = Builder::new().read(&prefix).build();
        assert!(matches!(
            read_packet(&mut mock).await,
            Err(ProtocolError::FrameTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn test_read_packet_rejects_garbage_payload() {
        let mut frame = 3u32.to_le_bytes().to_vec();
        frame.extend_from_slice(&[0xff, 0xff, 0xff]);
        let mut mock = Builder::new().read(&frame).build();
        assert!(matches!(
            read_packet(&mut mock).await,
            Err(ProtocolError::Codec(_))
        ));
    }

    #[tokio::test]
    async fn test_truncated_payload_is_io_error() {
        let frame = encode(&Packet::CharacterUpdate(character())).unwrap();
        let mut mock = Builder::new().read(&frame[..frame.len() - 2]).build();
        assert!(matches!(
            read_packet(&mut mock).await,
            Err(ProtocolError::Io(_))
        ));
    }
}
