//! MIDI device registry and 3-byte packet distribution.
//!
//! Enumerates MIDI endpoints and exposes every opened device as a bounded
//! packet queue, whether the platform pushes packets from a callback thread
//! (midir) or must be read from a dedicated thread (ALSA rawmidi).
//!
//! Feature gates: `midi-io` (midir backend), `alsa` (ALSA backend, Linux only).

pub mod error;
pub use error::{map_native_error, Error, NativeError, NativeErrorKind, NativeResult, Result};

pub mod connection;
pub use connection::{ConnectionId, PullTransport, PushTransport, RawInput, RawOutput};

mod packet;
pub use packet::{Packet, PacketReceiver};

pub mod registry;
pub use registry::{PacketRegistry, QueueHandle};

pub mod ingest;
pub use ingest::{Backpressure, DeviceLink, Dispatcher, IngestionStrategy, Pull, Push};

pub mod sequencer;
pub use sequencer::{
    enumerate, ClientRecord, PortCaps, PortKind, PortRecord, Sequencer, SequencerSession,
    SnapshotSession,
};

mod device;
pub use device::Device;

mod system;
pub use system::{MidiSystem, MidiSystemBuilder};

#[cfg(any(all(feature = "alsa", target_os = "linux"), feature = "midi-io"))]
pub use system::NativeStrategy;

pub mod mock;

#[cfg(any(all(feature = "alsa", target_os = "linux"), feature = "midi-io"))]
pub mod io;

#[cfg(all(feature = "alsa", target_os = "linux"))]
pub use io::{AlsaRawmidi, AlsaSequencer};

#[cfg(feature = "midi-io")]
pub use io::{MidirSequencer, MidirTransport};

pub use seqmidi_core::{DeviceInfo, DeviceType, MessageType, Stream, PACKET_SIZE};
