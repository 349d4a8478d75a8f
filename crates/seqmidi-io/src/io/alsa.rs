//! ALSA backend: `alsa::seq` for enumeration, `alsa::rawmidi` for I/O.

use alsa::poll::{pollfd, Flags};
use alsa::rawmidi::Rawmidi;
use alsa::seq::{ClientIter, PortIter, Seq};
use alsa::{Direction, PollDescriptors};
use std::ffi::CString;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::debug;

use crate::connection::{PullTransport, RawInput, RawOutput};
use crate::error::{NativeError, NativeErrorKind, NativeResult};
use crate::sequencer::{ClientRecord, PortCaps, PortKind, PortRecord, Sequencer, SequencerSession};

/// Enumerates the ALSA sequencer graph.
#[derive(Debug, Clone)]
pub struct AlsaSequencer {
    client_name: String,
}

impl AlsaSequencer {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }
}

impl Sequencer for AlsaSequencer {
    fn open_session(&self) -> NativeResult<Box<dyn SequencerSession + '_>> {
        // No direction means a duplex handle.
        let seq = Seq::open(None, None, false)?;
        let name = CString::new(self.client_name.as_str())
            .map_err(|e| NativeError::new(NativeErrorKind::InvalidArgument, e.to_string()))?;
        seq.set_client_name(&name)?;
        Ok(Box::new(AlsaSession { seq }))
    }
}

struct AlsaSession {
    seq: Seq,
}

impl SequencerSession for AlsaSession {
    fn clients(&mut self) -> Vec<ClientRecord> {
        ClientIter::new(&self.seq)
            .map(|client| {
                let id = client.get_client();
                ClientRecord {
                    client: id,
                    name: client
                        .get_name()
                        .map(str::to_string)
                        .unwrap_or_else(|_| format!("Client {id}")),
                    card: client.get_card().ok().filter(|card| *card >= 0),
                }
            })
            .collect()
    }

    fn ports(&mut self, client: i32) -> Vec<NativeResult<PortRecord>> {
        PortIter::new(&self.seq, client)
            .map(|port| {
                let name = port.get_name().map_err(NativeError::from)?;
                Ok(PortRecord::new(
                    port.get_port(),
                    name,
                    PortKind::from_bits(port.get_type().bits()),
                    PortCaps::from_bits(port.get_capability().bits()),
                ))
            })
            .collect()
    }
}

/// Opens rawmidi devices by ALSA name (`hw:1`, `hw:1,0,0`, ...).
///
/// Input and output are separate handles, so a write never waits on the
/// reader thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlsaRawmidi;

impl AlsaRawmidi {
    pub const fn new() -> Self {
        Self
    }
}

impl PullTransport for AlsaRawmidi {
    type Input = AlsaInput;
    type Output = AlsaOutput;

    fn open(&self, name: &str) -> NativeResult<(AlsaInput, AlsaOutput)> {
        let input = Rawmidi::new(name, Direction::Capture, true)?;
        let fds = PollDescriptors::get(&input)?;
        let output = Rawmidi::new(name, Direction::Playback, false)?;
        debug!("Opened rawmidi '{}' ({} poll descriptors)", name, fds.len());
        Ok((AlsaInput { midi: input, fds }, AlsaOutput { midi: output }))
    }
}

/// Non-blocking capture handle, waited on with `poll`.
pub struct AlsaInput {
    midi: Rawmidi,
    fds: Vec<pollfd>,
}

impl RawInput for AlsaInput {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> NativeResult<usize> {
        let ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let ready = match alsa::poll::poll(&mut self.fds, ms) {
            Ok(ready) => ready,
            Err(e) => {
                let e = NativeError::from(e);
                return if e.is_interrupted() { Ok(0) } else { Err(e) };
            }
        };
        if ready == 0 {
            return Ok(0);
        }

        let revents = self.midi.revents(&self.fds)?;
        if revents.intersects(Flags::ERR | Flags::HUP | Flags::NVAL) {
            return Err(NativeError::new(
                NativeErrorKind::Disconnected,
                "rawmidi device reported an error condition",
            ));
        }
        if !revents.contains(Flags::IN) {
            return Ok(0);
        }

        match self.midi.io().read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn close(self) -> NativeResult<()> {
        drop(self.midi);
        Ok(())
    }
}

/// Blocking playback handle.
pub struct AlsaOutput {
    midi: Rawmidi,
}

impl RawOutput for AlsaOutput {
    fn write(&mut self, bytes: &[u8]) -> NativeResult<usize> {
        Ok(self.midi.io().write(bytes)?)
    }

    fn close(self) -> NativeResult<()> {
        drop(self.midi);
        Ok(())
    }
}
