//! Status-byte classification for 3-byte MIDI short messages.

use serde::{Deserialize, Serialize};

/// Size of a standard (non-SysEx) MIDI message, and of every packet.
pub const PACKET_SIZE: usize = 3;

/// Coarse message kind derived from a packet's status byte.
///
/// Only note on / note off are recognised today. `ControlChange` and
/// `PolyKeyPressure` are reserved so callers can match on the full
/// vocabulary; the classifier reports them as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MessageType {
    #[default]
    Unknown,
    ControlChange,
    NoteOff,
    NoteOn,
    PolyKeyPressure,
}

impl MessageType {
    /// Classify a message by the high nibble of its status byte.
    #[inline]
    pub fn of(status: u8) -> Self {
        match status & 0xF0 {
            0x80 => MessageType::NoteOff,
            0x90 => MessageType::NoteOn,
            _ => MessageType::Unknown,
        }
    }

    #[inline]
    pub fn classify(data: &[u8; PACKET_SIZE]) -> Self {
        Self::of(data[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_any_channel() {
        assert_eq!(MessageType::classify(&[0x90, 0x4f, 0x16]), MessageType::NoteOn);
        assert_eq!(MessageType::of(0x9F), MessageType::NoteOn);
    }

    #[test]
    fn test_note_off() {
        assert_eq!(MessageType::classify(&[0x80, 0x4f, 0x00]), MessageType::NoteOff);
        assert_eq!(MessageType::of(0x83), MessageType::NoteOff);
    }

    #[test]
    fn test_other_nibbles_unknown() {
        for status in [0x00, 0x70, 0xA0, 0xB0, 0xC0, 0xD0, 0xE0, 0xF0, 0xF8] {
            assert_eq!(
                MessageType::of(status),
                MessageType::Unknown,
                "status {:#04x}",
                status
            );
        }
    }

    #[test]
    fn test_default_is_unknown() {
        assert_eq!(MessageType::default(), MessageType::Unknown);
    }
}
