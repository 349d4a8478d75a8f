//! Native MIDI backends.
//!
//! - `alsa` (Linux): sequencer enumeration, rawmidi connections, pull model.
//! - `midi-io`: midir enumeration and connections, push model.

#[cfg(all(feature = "alsa", target_os = "linux"))]
mod alsa;

#[cfg(feature = "midi-io")]
mod midir;

#[cfg(all(feature = "alsa", target_os = "linux"))]
pub use self::alsa::{AlsaInput, AlsaOutput, AlsaRawmidi, AlsaSequencer};

#[cfg(feature = "midi-io")]
pub use self::midir::{MidirConnection, MidirSequencer, MidirTransport};
