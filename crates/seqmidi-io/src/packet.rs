//! 3-byte MIDI packets as delivered to consumers.

use seqmidi_core::{MessageType, PACKET_SIZE};

use crate::error::Error;

/// Consumer end of a device's packet queue.
///
/// Disconnection (`recv` returning `Err`) is end-of-stream and only happens
/// after every enqueued packet has been received.
pub type PacketReceiver = crossbeam_channel::Receiver<Packet>;

/// One MIDI short message.
///
/// `error` is only set on the final packet of a stream that ended because
/// the device could no longer be read. Its `data` is all zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub data: [u8; PACKET_SIZE],
    pub error: Option<Error>,
}

impl Packet {
    pub const fn new(data: [u8; PACKET_SIZE]) -> Self {
        Self { data, error: None }
    }

    /// Build a packet from a native message. Shorter messages are zero
    /// padded, longer ones truncated. Returns `None` for an empty slice.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }
        let mut data = [0u8; PACKET_SIZE];
        let n = bytes.len().min(PACKET_SIZE);
        data[..n].copy_from_slice(&bytes[..n]);
        Some(Self::new(data))
    }

    pub(crate) fn failed(error: Error) -> Self {
        Self {
            data: [0; PACKET_SIZE],
            error: Some(error),
        }
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.data[0]
    }

    #[inline]
    pub fn message_type(&self) -> MessageType {
        MessageType::classify(&self.data)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl From<[u8; PACKET_SIZE]> for Packet {
    fn from(data: [u8; PACKET_SIZE]) -> Self {
        Self::new(data)
    }
}
