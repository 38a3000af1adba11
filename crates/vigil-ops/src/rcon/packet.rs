//! Source RCON packet framing.
//!
//! ```text
//! i32 size | i32 id | i32 type | body bytes | 0x00 | 0x00
//! ```
//!
//! All integers are little-endian; `size` counts everything after itself.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use vigil_core::RconError;

pub const SERVERDATA_AUTH: i32 = 3;
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// id + type + two terminators.
const MIN_SIZE: i32 = 10;
const MAX_SIZE: i32 = 4096 + MIN_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, RconError> {
        let body = self.body.as_bytes();
        let size = i32::try_from(body.len())
            .ok()
            .and_then(|len| len.checked_add(MIN_SIZE))
            .filter(|size| *size <= MAX_SIZE)
            .ok_or_else(|| RconError::Protocol(format!("body too long ({} bytes)", body.len())))?;

        let mut buf = Vec::with_capacity(body.len() + 14);
        buf.extend_from_slice(&size.to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.kind.to_le_bytes());
        buf.extend_from_slice(body);
        buf.extend_from_slice(&[0, 0]);
        Ok(buf)
    }
}

pub async fn write_packet<W: AsyncWrite + Unpin>(
    writer: &mut W,
    packet: &Packet,
) -> Result<(), RconError> {
    let bytes = packet.encode()?;
    writer
        .write_all(&bytes)
        .await
        .map_err(|e| RconError::Io(e.to_string()))?;
    writer.flush().await.map_err(|e| RconError::Io(e.to_string()))
}

pub async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Packet, RconError> {
    let size = reader
        .read_i32_le()
        .await
        .map_err(|e| RconError::Io(e.to_string()))?;
    if !(MIN_SIZE..=MAX_SIZE).contains(&size) {
        return Err(RconError::Protocol(format!("invalid packet size {size}")));
    }

    let len = usize::try_from(size).map_err(|e| RconError::Protocol(e.to_string()))?;
    let mut rest = vec![0u8; len];
    reader
        .read_exact(&mut rest)
        .await
        .map_err(|e| RconError::Io(e.to_string()))?;

    let id = i32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
    let kind = i32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]);
    let body = &rest[8..rest.len() - 2];
    let body = body.split(|b| *b == 0).next().unwrap_or_default();

    Ok(Packet {
        id,
        kind,
        body: String::from_utf8_lossy(body).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let bytes = Packet::new(7, SERVERDATA_EXECCOMMAND, "say hi").encode().unwrap();
        assert_eq!(&bytes[0..4], &16i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &7i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &2i32.to_le_bytes());
        assert_eq!(&bytes[12..18], b"say hi");
        assert_eq!(&bytes[18..], &[0, 0]);
    }

    #[tokio::test]
    async fn test_read_written_packet() {
        let packet = Packet::new(-1, SERVERDATA_AUTH_RESPONSE, "");
        let bytes = packet.encode().unwrap();
        let mut reader = bytes.as_slice();
        assert_eq!(read_packet(&mut reader).await.unwrap(), packet);
    }

    #[tokio::test]
    async fn test_rejects_bad_size() {
        let mut bytes = 3i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0; 3]);
        let mut reader = bytes.as_slice();
        assert!(matches!(
            read_packet(&mut reader).await,
            Err(RconError::Protocol(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_body() {
        let body = "x".repeat(5000);
        assert!(Packet::new(1, SERVERDATA_EXECCOMMAND, body).encode().is_err());
    }
}
