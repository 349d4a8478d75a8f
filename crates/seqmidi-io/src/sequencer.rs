//! Device enumeration over a sequencer's client/port graph.
//!
//! A [`Sequencer`] is the native enumeration service (ALSA seq, a midir
//! port scan, the mock). [`enumerate`] walks it once and produces one
//! [`DeviceInfo`] per client, in native order.

use std::ops::BitOr;
use std::sync::Arc;

use seqmidi_core::{DeviceInfo, DeviceType, Stream};
use tracing::{debug, warn};

use crate::error::{Error, NativeResult, Result};

/// The reserved system client (timer, announce). Never a device.
pub const SYSTEM_CLIENT: i32 = 0;

/// Port capability bits, as in `SND_SEQ_PORT_CAP_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PortCaps(u32);

impl PortCaps {
    pub const READ: PortCaps = PortCaps(1 << 0);
    pub const WRITE: PortCaps = PortCaps(1 << 1);
    pub const SYNC_READ: PortCaps = PortCaps(1 << 2);
    pub const SYNC_WRITE: PortCaps = PortCaps(1 << 3);
    pub const DUPLEX: PortCaps = PortCaps(1 << 4);
    pub const SUBS_READ: PortCaps = PortCaps(1 << 5);
    pub const SUBS_WRITE: PortCaps = PortCaps(1 << 6);

    const ANY_READ: PortCaps = PortCaps(Self::READ.0 | Self::SYNC_READ.0 | Self::SUBS_READ.0);
    const ANY_WRITE: PortCaps = PortCaps(Self::WRITE.0 | Self::SYNC_WRITE.0 | Self::SUBS_WRITE.0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn intersects(self, other: PortCaps) -> bool {
        self.0 & other.0 != 0
    }

    /// Which stream lists a port with these capabilities belongs to.
    ///
    /// Duplex wins over everything else, then writability, then readability.
    pub fn direction(self) -> DeviceType {
        if self.intersects(Self::DUPLEX) {
            DeviceType::Duplex
        } else if self.intersects(Self::ANY_WRITE) {
            DeviceType::Output
        } else if self.intersects(Self::ANY_READ) {
            DeviceType::Input
        } else {
            DeviceType::None
        }
    }
}

impl BitOr for PortCaps {
    type Output = PortCaps;

    fn bitor(self, rhs: Self) -> Self {
        PortCaps(self.0 | rhs.0)
    }
}

/// Port type bits, as in `SND_SEQ_PORT_TYPE_*`. Only the MIDI family is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PortKind(u32);

impl PortKind {
    pub const MIDI_GENERIC: PortKind = PortKind(1 << 1);
    pub const MIDI_GM: PortKind = PortKind(1 << 2);
    pub const MIDI_GS: PortKind = PortKind(1 << 3);
    pub const MIDI_XG: PortKind = PortKind(1 << 4);
    pub const MIDI_MT32: PortKind = PortKind(1 << 5);
    pub const MIDI_GM2: PortKind = PortKind(1 << 6);

    const ANY_MIDI: u32 = Self::MIDI_GENERIC.0
        | Self::MIDI_GM.0
        | Self::MIDI_GS.0
        | Self::MIDI_XG.0
        | Self::MIDI_MT32.0
        | Self::MIDI_GM2.0;

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_midi(self) -> bool {
        self.0 & Self::ANY_MIDI != 0
    }
}

impl BitOr for PortKind {
    type Output = PortKind;

    fn bitor(self, rhs: Self) -> Self {
        PortKind(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub client: i32,
    pub name: String,
    /// Sound card index, when the client is backed by hardware.
    pub card: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRecord {
    pub port: i32,
    pub name: String,
    pub kind: PortKind,
    pub caps: PortCaps,
}

impl PortRecord {
    pub fn new(port: i32, name: impl Into<String>, kind: PortKind, caps: PortCaps) -> Self {
        Self {
            port,
            name: name.into(),
            kind,
            caps,
        }
    }
}

/// Native enumeration service.
pub trait Sequencer: Send + Sync {
    /// Open a session for one enumeration pass.
    fn open_session(&self) -> NativeResult<Box<dyn SequencerSession + '_>>;
}

/// One open enumeration session. Dropping it closes the native handle.
pub trait SequencerSession {
    /// All clients in native iteration order, including the system client.
    fn clients(&mut self) -> Vec<ClientRecord>;

    /// Ports of `client` in native order. A port whose record can't be read
    /// is reported as an `Err` entry rather than failing the whole client.
    fn ports(&mut self, client: i32) -> Vec<NativeResult<PortRecord>>;
}

/// A session over a graph captured up front.
///
/// Backends without a live client/port graph (midir, the mock) build one of
/// these when a session is opened.
#[derive(Debug, Default)]
pub struct SnapshotSession {
    clients: Vec<(ClientRecord, Vec<NativeResult<PortRecord>>)>,
}

impl SnapshotSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_client(&mut self, client: ClientRecord) {
        self.clients.push((client, Vec::new()));
    }

    /// Attach a port to a previously pushed client. Unknown clients are ignored.
    pub fn push_port(&mut self, client: i32, port: NativeResult<PortRecord>) {
        if let Some((_, ports)) = self.clients.iter_mut().find(|(c, _)| c.client == client) {
            ports.push(port);
        }
    }
}

impl SequencerSession for SnapshotSession {
    fn clients(&mut self) -> Vec<ClientRecord> {
        self.clients.iter().map(|(c, _)| c.clone()).collect()
    }

    fn ports(&mut self, client: i32) -> Vec<NativeResult<PortRecord>> {
        self.clients
            .iter()
            .find(|(c, _)| c.client == client)
            .map(|(_, ports)| ports.clone())
            .unwrap_or_default()
    }
}

impl<T: Sequencer + ?Sized> Sequencer for Arc<T> {
    fn open_session(&self) -> NativeResult<Box<dyn SequencerSession + '_>> {
        (**self).open_session()
    }
}

impl<T: Sequencer + ?Sized> Sequencer for Box<T> {
    fn open_session(&self) -> NativeResult<Box<dyn SequencerSession + '_>> {
        (**self).open_session()
    }
}

/// List every MIDI-capable device the sequencer knows about.
///
/// Fails only when the session itself can't be opened. Non-MIDI ports,
/// ports with no usable capability and unreadable ports are skipped; a
/// client with no remaining ports is still listed.
pub fn enumerate(sequencer: &dyn Sequencer) -> Result<Vec<DeviceInfo>> {
    let mut session = sequencer.open_session().map_err(Error::Connection)?;
    let mut devices = Vec::new();

    for client in session.clients() {
        if client.client == SYSTEM_CLIENT {
            continue;
        }

        let mut info = DeviceInfo::new(client.name.clone());
        if let Some(card) = client.card {
            info.id = format!("hw:{card}");
        }

        for port in session.ports(client.client) {
            let port = match port {
                Ok(port) => port,
                Err(e) => {
                    warn!(
                        "Ignoring unreadable port on client {} ('{}'): {}",
                        client.client, client.name, e
                    );
                    continue;
                }
            };
            if !port.kind.is_midi() {
                debug!(
                    "Skipping non-MIDI port {}:{} ('{}')",
                    client.client, port.port, port.name
                );
                continue;
            }
            match port.caps.direction() {
                DeviceType::Duplex => {
                    info.inputs.push(Stream::new(port.name.clone()));
                    info.outputs.push(Stream::new(port.name));
                }
                DeviceType::Output => info.outputs.push(Stream::new(port.name)),
                DeviceType::Input => info.inputs.push(Stream::new(port.name)),
                DeviceType::None => {}
            }
        }

        devices.push(info);
    }

    debug!("Enumerated {} MIDI devices", devices.len());
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NativeError, NativeErrorKind};
    use crate::mock::MockSequencer;

    const MIDI: PortKind = PortKind::MIDI_GENERIC;

    #[test]
    fn test_direction_precedence() {
        assert_eq!(PortCaps::DUPLEX.direction(), DeviceType::Duplex);
        assert_eq!(
            (PortCaps::DUPLEX | PortCaps::WRITE).direction(),
            DeviceType::Duplex
        );
        assert_eq!(
            (PortCaps::WRITE | PortCaps::READ).direction(),
            DeviceType::Output
        );
        assert_eq!(PortCaps::SUBS_WRITE.direction(), DeviceType::Output);
        assert_eq!(PortCaps::SYNC_READ.direction(), DeviceType::Input);
        assert_eq!(PortCaps::default().direction(), DeviceType::None);
    }

    #[test]
    fn test_port_kind_midi_family() {
        assert!(PortKind::MIDI_GM2.is_midi());
        assert!((PortKind::from_bits(1 << 10) | PortKind::MIDI_XG).is_midi());
        assert!(!PortKind::from_bits(1 << 0).is_midi());
        assert!(!PortKind::default().is_midi());
    }

    #[test]
    fn test_duplex_card_client() {
        let seq = MockSequencer::new();
        seq.add_client(20, "TestSynth", Some(2));
        seq.add_port(20, PortRecord::new(0, "Port A", MIDI, PortCaps::DUPLEX));

        let devices = enumerate(&seq).unwrap();
        assert_eq!(devices.len(), 1);
        let synth = &devices[0];
        assert_eq!(synth.id, "hw:2");
        assert_eq!(synth.name, "TestSynth");
        assert_eq!(synth.inputs, vec![Stream::new("Port A")]);
        assert_eq!(synth.outputs, vec![Stream::new("Port A")]);
        assert_eq!(synth.device_type(), DeviceType::Duplex);
    }

    #[test]
    fn test_system_client_and_non_midi_ports_skipped() {
        let seq = MockSequencer::new();
        seq.add_client(SYSTEM_CLIENT, "System", None);
        seq.add_port(SYSTEM_CLIENT, PortRecord::new(0, "Timer", MIDI, PortCaps::READ));
        seq.add_client(14, "Midi Through", None);
        seq.add_port(14, PortRecord::new(0, "Audio", PortKind::from_bits(1 << 11), PortCaps::READ));

        let devices = enumerate(&seq).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Midi Through");
        assert_eq!(devices[0].id, "");
        assert_eq!(devices[0].device_type(), DeviceType::None);
    }

    #[test]
    fn test_write_only_and_read_only_ports() {
        let seq = MockSequencer::new();
        seq.add_client(24, "Keys", Some(1));
        seq.add_port(24, PortRecord::new(0, "Out", MIDI, PortCaps::WRITE));
        seq.add_port(24, PortRecord::new(1, "In", MIDI, PortCaps::READ));
        seq.add_port(24, PortRecord::new(2, "Idle", MIDI, PortCaps::default()));

        let devices = enumerate(&seq).unwrap();
        assert_eq!(devices[0].outputs, vec![Stream::new("Out")]);
        assert_eq!(devices[0].inputs, vec![Stream::new("In")]);
    }

    #[test]
    fn test_native_order_preserved() {
        let seq = MockSequencer::new();
        seq.add_client(40, "Zeta", None);
        seq.add_client(20, "Alpha", None);

        let names: Vec<_> = enumerate(&seq)
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["Zeta", "Alpha"]);
    }

    #[test]
    fn test_unreadable_port_ignored() {
        let seq = MockSequencer::new();
        seq.add_client(20, "Flaky", None);
        seq.add_broken_port(20, NativeError::new(NativeErrorKind::Io, "port vanished"));
        seq.add_port(20, PortRecord::new(1, "Good", MIDI, PortCaps::SUBS_READ));

        let devices = enumerate(&seq).unwrap();
        assert_eq!(devices[0].inputs, vec![Stream::new("Good")]);
    }

    #[test]
    fn test_session_failure_is_connection_error() {
        let seq = MockSequencer::new();
        let native = NativeError::from_code(-2).unwrap();
        seq.fail_open(native.clone());

        assert_eq!(enumerate(&seq).unwrap_err(), Error::Connection(native));
    }
}
