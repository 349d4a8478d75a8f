//! MIDI system: enumeration plus opening devices under one ingestion strategy.
//!
//! ## Quick Start
//!
//! ```ignore
//! use seqmidi_io::MidiSystem;
//!
//! let midi = MidiSystem::builder().client_name("my-app").build()?;
//!
//! for info in midi.devices()? {
//!     println!("{} {} {}", info.id, info.name, info.device_type());
//! }
//!
//! let keys = midi.open("hw:1", 16)?;
//! for packet in keys.packets()? {
//!     println!("{:?} {:02x?}", packet.message_type(), packet.data);
//! }
//! keys.close()?;
//! ```

mod builder;

pub use builder::MidiSystemBuilder;

use seqmidi_core::DeviceInfo;
use std::sync::Arc;
use tracing::debug;

use crate::device::Device;
use crate::error::{Error, Result};
use crate::ingest::IngestionStrategy;
use crate::registry::PacketRegistry;
use crate::sequencer::{enumerate, Sequencer};

#[cfg(all(feature = "alsa", target_os = "linux"))]
pub type NativeStrategy = crate::ingest::Pull<crate::io::AlsaRawmidi>;

#[cfg(all(feature = "midi-io", not(all(feature = "alsa", target_os = "linux"))))]
pub type NativeStrategy = crate::ingest::Push<crate::io::MidirTransport>;

/// Entry point for enumerating and opening devices.
///
/// Clone is cheap (Arc internally). All clones share one strategy, one
/// sequencer and one registry.
pub struct MidiSystem<S: IngestionStrategy> {
    inner: Arc<MidiSystemInner<S>>,
}

pub(crate) struct MidiSystemInner<S> {
    pub(crate) client_name: String,
    pub(crate) strategy: S,
    pub(crate) sequencer: Box<dyn Sequencer>,
    pub(crate) registry: Arc<PacketRegistry>,
}

#[cfg(any(all(feature = "alsa", target_os = "linux"), feature = "midi-io"))]
impl MidiSystem<NativeStrategy> {
    /// Create a new MIDI system builder
    ///
    /// # Example
    ///
    /// ```ignore
    /// let midi = MidiSystem::builder().build()?;
    /// ```
    pub fn builder() -> MidiSystemBuilder {
        MidiSystemBuilder::default()
    }
}

impl<S: IngestionStrategy> MidiSystem<S> {
    pub(crate) fn from_inner(inner: MidiSystemInner<S>) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Snapshot of every MIDI-capable device, in native order.
    pub fn devices(&self) -> Result<Vec<DeviceInfo>> {
        enumerate(self.inner.sequencer.as_ref())
    }

    /// Open the device called `name` and start delivering its packets.
    ///
    /// `queue_size` bounds the packet queue; 0 makes every delivery wait for
    /// a consumer. On failure nothing stays registered.
    pub fn open(&self, name: &str, queue_size: usize) -> Result<Device<S>> {
        if name.is_empty() {
            return Err(Error::InvalidConfig(
                "device name must not be empty".to_string(),
            ));
        }

        let registry = &self.inner.registry;
        let id = registry.allocate_id();
        let queue = registry.register(id, queue_size)?;
        let receiver = queue.receiver();

        match self.inner.strategy.start(name, id, queue, registry) {
            Ok(link) => {
                debug!("Opened MIDI device '{}' as {}", name, id);
                Ok(Device::new(
                    name.to_string(),
                    queue_size,
                    id,
                    Arc::clone(registry),
                    receiver,
                    link,
                ))
            }
            Err(e) => {
                registry.unregister(id);
                Err(e)
            }
        }
    }

    pub fn registry(&self) -> &Arc<PacketRegistry> {
        &self.inner.registry
    }

    pub fn strategy(&self) -> &S {
        &self.inner.strategy
    }

    pub fn client_name(&self) -> &str {
        &self.inner.client_name
    }
}

impl<S: IngestionStrategy> Clone for MidiSystem<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: IngestionStrategy> std::fmt::Debug for MidiSystem<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiSystem")
            .field("client_name", &self.inner.client_name)
            .field("registry", &self.inner.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{Pull, Push};
    use crate::mock::{MockSequencer, MockTransport};
    use crate::sequencer::{PortCaps, PortKind, PortRecord};
    use std::time::Duration;

    fn pull_system() -> (MidiSystem<Pull<MockTransport>>, MockTransport) {
        let transport = MockTransport::new();
        let midi = MidiSystemBuilder::default()
            .registry(Arc::new(PacketRegistry::new()))
            .read_poll_interval(Duration::from_millis(5))
            .build_pull(transport.clone(), MockSequencer::new())
            .unwrap();
        (midi, transport)
    }

    #[test]
    fn test_devices_from_sequencer() {
        let seq = Arc::new(MockSequencer::new());
        seq.add_client(20, "TestSynth", Some(2));
        seq.add_port(20, PortRecord::new(0, "Port A", PortKind::MIDI_GENERIC, PortCaps::DUPLEX));

        let midi = MidiSystemBuilder::default()
            .registry(Arc::new(PacketRegistry::new()))
            .build_push(MockTransport::new(), Arc::clone(&seq))
            .unwrap();

        let devices = midi.devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "hw:2");
    }

    #[test]
    fn test_open_registers_and_close_unregisters() {
        let (midi, transport) = pull_system();
        transport.add_device("Keys");

        let device = midi.open("Keys", 4).unwrap();
        assert_eq!(device.name(), "Keys");
        assert_eq!(device.queue_size(), 4);
        assert!(midi.registry().contains(device.id()));

        let id = device.id();
        device.close().unwrap();
        assert!(!midi.registry().contains(id));
    }

    #[test]
    fn test_empty_name_rejected() {
        let (midi, _) = pull_system();
        assert!(matches!(midi.open("", 1), Err(Error::InvalidConfig(_))));
        assert!(midi.registry().is_empty());
    }

    #[test]
    fn test_failed_open_rolls_back_registration() {
        let (midi, _) = pull_system();
        let err = midi.open("Missing", 1).unwrap_err();
        match err {
            Error::Open { name, .. } => assert_eq!(name, "Missing"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(midi.registry().is_empty());
    }

    #[test]
    fn test_clone_shares_registry() {
        let (midi, transport) = pull_system();
        transport.add_device("Keys");
        let other = midi.clone();

        let device = other.open("Keys", 1).unwrap();
        assert!(midi.registry().contains(device.id()));
    }

    #[test]
    fn test_push_write_reaches_device() {
        let transport = MockTransport::new();
        let pad = transport.add_device("Pad");
        let midi = MidiSystemBuilder::default()
            .registry(Arc::new(PacketRegistry::new()))
            .build_push(transport, MockSequencer::new())
            .unwrap();

        let device: Device<Push<MockTransport>> = midi.open("Pad", 1).unwrap();
        assert_eq!(device.write(&[0x90, 36, 127]).unwrap(), 3);
        assert_eq!(device.write(&[]).unwrap(), 0);
        assert_eq!(pad.written(), vec![0x90, 36, 127]);
    }
}
