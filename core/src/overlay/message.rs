//! Overlay payload definitions
//!
//! Defines the wire format of the overlay's payloads. Every payload starts
//! with a version byte; integers are big-endian.
//!
//! - text: `[version][u32 length][text bytes]`
//! - sync: `[version][u32 counter]`

/// Current payload version
pub const WIRE_VERSION: u8 = 1;

/// Protocol id of free-text messages
pub const MESSAGE_PROTOCOL_ID: u8 = 1;

/// Protocol id of Lamport clock synchronization
pub const CLOCK_PROTOCOL_ID: u8 = 2;

/// A free-text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    text: Vec<u8>,
}

impl Message {
    pub fn new(text: impl Into<Vec<u8>>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Text as UTF-8, replacing invalid sequences
    pub fn to_text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.text).into_owned()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 4 + self.text.len());
        buf.push(WIRE_VERSION);
        write_u32(&mut buf, self.text.len() as u32);
        buf.extend_from_slice(&self.text);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let rest = read_version(bytes)?;
        let (len, rest) = read_u32(rest, "missing length prefix")?;
        let len = len as usize;
        if rest.len() < len {
            return Err(CodecError::MalformedPayload("truncated text"));
        }
        if rest.len() > len {
            return Err(CodecError::MalformedPayload("trailing bytes"));
        }
        Ok(Self::new(rest))
    }
}

/// Carries a peer's Lamport counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncMessage {
    pub clock: u32,
}

impl SyncMessage {
    pub fn new(clock: u32) -> Self {
        Self { clock }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(5);
        buf.push(WIRE_VERSION);
        write_u32(&mut buf, self.clock);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let rest = read_version(bytes)?;
        let (clock, rest) = read_u32(rest, "missing clock")?;
        if !rest.is_empty() {
            return Err(CodecError::MalformedPayload("trailing bytes"));
        }
        Ok(Self { clock })
    }
}

/// Codec errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(&'static str),
    #[error("Unsupported wire version {0}")]
    UnsupportedVersion(u8),
}

fn read_version(bytes: &[u8]) -> Result<&[u8], CodecError> {
    match bytes.split_first() {
        Some((&WIRE_VERSION, rest)) => Ok(rest),
        Some((&other, _)) => Err(CodecError::UnsupportedVersion(other)),
        None => Err(CodecError::MalformedPayload("empty payload")),
    }
}

fn read_u32<'a>(bytes: &'a [u8], missing: &'static str) -> Result<(u32, &'a [u8]), CodecError> {
    if bytes.len() < 4 {
        return Err(CodecError::MalformedPayload(missing));
    }
    let (head, rest) = bytes.split_at(4);
    let mut buf = [0u8; 4];
    buf.copy_from_slice(head);
    Ok((u32::from_be_bytes(buf), rest))
}

fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_layout() {
        let bytes = Message::new("hi").encode();
        assert_eq!(bytes, vec![1, 0, 0, 0, 2, b'h', b'i']);
        assert_eq!(Message::decode(&bytes).unwrap().to_text_lossy(), "hi");
    }

    #[test]
    fn test_empty_text_is_valid() {
        let decoded = Message::decode(&Message::new("").encode()).unwrap();
        assert!(decoded.text().is_empty());
    }

    #[test]
    fn test_text_malformed_payloads() {
        assert_eq!(
            Message::decode(&[]),
            Err(CodecError::MalformedPayload("empty payload"))
        );
        assert_eq!(
            Message::decode(&[1, 0, 0]),
            Err(CodecError::MalformedPayload("missing length prefix"))
        );
        assert_eq!(
            Message::decode(&[1, 0, 0, 0, 5, b'a']),
            Err(CodecError::MalformedPayload("truncated text"))
        );
        assert_eq!(
            Message::decode(&[1, 0, 0, 0, 0, b'a']),
            Err(CodecError::MalformedPayload("trailing bytes"))
        );
        assert_eq!(
            Message::decode(&[9, 0, 0, 0, 0]),
            Err(CodecError::UnsupportedVersion(9))
        );
    }

    #[test]
    fn test_no_semantic_limits() {
        let long = "x".repeat(100_000);
        let decoded = Message::decode(&Message::new(long.clone()).encode()).unwrap();
        assert_eq!(decoded.to_text_lossy(), long);
    }

    #[test]
    fn test_non_utf8_text_is_carried() {
        let decoded = Message::decode(&Message::new(vec![0xff, b'a']).encode()).unwrap();
        assert_eq!(decoded.text(), &[0xff, b'a']);
        assert_eq!(decoded.to_text_lossy(), "\u{fffd}a");
    }

    #[test]
    fn test_sync_layout() {
        let bytes = SyncMessage::new(0x0102_0304).encode();
        assert_eq!(bytes, vec![1, 1, 2, 3, 4]);
        assert_eq!(SyncMessage::decode(&bytes).unwrap().clock, 0x0102_0304);
    }

    #[test]
    fn test_sync_malformed_payloads() {
        assert!(SyncMessage::decode(&[1, 0, 0]).is_err());
        assert!(SyncMessage::decode(&[1, 0, 0, 0, 1, 0]).is_err());
        assert_eq!(
            SyncMessage::decode(&[2, 0, 0, 0, 1]),
            Err(CodecError::UnsupportedVersion(2))
        );
    }
}
