//! # seqmidi - MIDI device registry
//!
//! Cross-platform MIDI device discovery and 3-byte packet exchange.
//!
//! ## Architecture
//!
//! seqmidi is an umbrella crate over:
//! - **seqmidi-core** - Device snapshots and message classification
//! - **seqmidi-io** - Enumeration, packet registry, push/pull ingestion, backends
//!
//! ## Quick Start
//!
//! ```ignore
//! use seqmidi::prelude::*;
//!
//! let midi = MidiSystem::builder().build()?;
//! for info in midi.devices()? {
//!     println!("{} {} {}", info.id, info.name, info.device_type());
//! }
//!
//! let keys = midi.open("hw:1", 16)?;
//! keys.write(&[0x90, 60, 100])?;
//! for packet in keys.packets()? {
//!     if packet.message_type() == MessageType::NoteOn {
//!         println!("note {}", packet.data[1]);
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Both native backends
//! - `midi-io` - midir backend (push ingestion, all platforms)
//! - `alsa` - ALSA backend (pull ingestion, Linux only)

/// Re-export of seqmidi-core for direct access
pub use seqmidi_core as core;

/// Re-export of seqmidi-io for direct access
pub use seqmidi_io as io;

pub use seqmidi_core::{DeviceInfo, DeviceType, MessageType, Stream, PACKET_SIZE};

pub use seqmidi_io::{
    enumerate, map_native_error, Backpressure, ConnectionId, Device, Error, MidiSystem,
    MidiSystemBuilder, NativeError, NativeErrorKind, Packet, PacketReceiver, PacketRegistry,
    Pull, Push, Result,
};

#[cfg(any(all(feature = "alsa", target_os = "linux"), feature = "midi-io"))]
pub use seqmidi_io::NativeStrategy;

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        Backpressure, Device, DeviceInfo, DeviceType, Error, MessageType, MidiSystem,
        MidiSystemBuilder, Packet, PacketReceiver, Result, Stream,
    };

    #[cfg(any(all(feature = "alsa", target_os = "linux"), feature = "midi-io"))]
    pub use crate::NativeStrategy;
}
