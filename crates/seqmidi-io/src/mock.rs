//! In-memory backend for tests and headless harnesses.
//!
//! [`MockSequencer`] is a scriptable client/port graph. [`MockTransport`]
//! implements both transport shapes over named [`MockDevice`]s: under the
//! pull strategy the device feeds a reader through a channel, under the push
//! strategy [`MockDevice::send`] calls the installed dispatcher directly,
//! the way a native callback would.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::connection::{ConnectionId, PullTransport, PushTransport, RawInput, RawOutput};
use crate::error::{NativeError, NativeErrorKind, NativeResult};
use crate::ingest::Dispatcher;
use crate::sequencer::{ClientRecord, PortRecord, Sequencer, SequencerSession, SnapshotSession};

// ============================================================================
// Sequencer
// ============================================================================

#[derive(Debug, Default)]
pub struct MockSequencer {
    graph: Mutex<SnapshotGraph>,
}

#[derive(Debug, Default)]
struct SnapshotGraph {
    clients: Vec<ClientRecord>,
    ports: Vec<(i32, NativeResult<PortRecord>)>,
    open_error: Option<NativeError>,
}

impl MockSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_client(&self, client: i32, name: impl Into<String>, card: Option<i32>) {
        self.graph.lock().clients.push(ClientRecord {
            client,
            name: name.into(),
            card,
        });
    }

    pub fn add_port(&self, client: i32, port: PortRecord) {
        self.graph.lock().ports.push((client, Ok(port)));
    }

    /// A port whose record fails to read.
    pub fn add_broken_port(&self, client: i32, error: NativeError) {
        self.graph.lock().ports.push((client, Err(error)));
    }

    /// Make every following `open_session` fail with `error`.
    pub fn fail_open(&self, error: NativeError) {
        self.graph.lock().open_error = Some(error);
    }
}

impl Sequencer for MockSequencer {
    fn open_session(&self) -> NativeResult<Box<dyn SequencerSession + '_>> {
        let graph = self.graph.lock();
        if let Some(e) = &graph.open_error {
            return Err(e.clone());
        }
        let mut session = SnapshotSession::new();
        for client in &graph.clients {
            session.push_client(client.clone());
        }
        for (client, port) in &graph.ports {
            session.push_port(*client, port.clone());
        }
        Ok(Box::new(session))
    }
}

// ============================================================================
// Transport
// ============================================================================

enum MockInput {
    Bytes(Vec<u8>),
    Fail(NativeError),
}

struct MockState {
    input_tx: Sender<MockInput>,
    input_rx: Receiver<MockInput>,
    /// Installed while the device is open under the push strategy.
    push: Mutex<Option<(ConnectionId, Dispatcher)>>,
    written: Mutex<Vec<u8>>,
    open_error: Mutex<Option<NativeError>>,
    write_error: Mutex<Option<NativeError>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    input_closes: AtomicUsize,
}

/// Handle to one simulated device. Clones share the same device.
#[derive(Clone)]
pub struct MockDevice {
    name: String,
    state: Arc<MockState>,
}

impl MockDevice {
    fn new(name: String) -> Self {
        let (input_tx, input_rx) = unbounded();
        Self {
            name,
            state: Arc::new(MockState {
                input_tx,
                input_rx,
                push: Mutex::new(None),
                written: Mutex::new(Vec::new()),
                open_error: Mutex::new(None),
                write_error: Mutex::new(None),
                opens: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                input_closes: AtomicUsize::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver bytes as if the device had produced them.
    ///
    /// Under push this runs the dispatcher on the calling thread, so it
    /// blocks exactly as the configured backpressure policy says. Under pull
    /// the bytes are queued for the reader thread.
    pub fn send(&self, bytes: &[u8]) {
        let push = self.state.push.lock().clone();
        match push {
            Some((id, dispatcher)) => {
                dispatcher.dispatch(id, bytes);
            }
            None => {
                let _ = self.state.input_tx.send(MockInput::Bytes(bytes.to_vec()));
            }
        }
    }

    /// Make the next pull read fail with `error`, after any queued bytes.
    pub fn fail(&self, error: NativeError) {
        let _ = self.state.input_tx.send(MockInput::Fail(error));
    }

    pub fn set_open_error(&self, error: Option<NativeError>) {
        *self.state.open_error.lock() = error;
    }

    pub fn set_write_error(&self, error: Option<NativeError>) {
        *self.state.write_error.lock() = error;
    }

    /// Everything written to the device so far.
    pub fn written(&self) -> Vec<u8> {
        self.state.written.lock().clone()
    }

    pub fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Pull-mode input halves released so far.
    pub fn input_close_count(&self) -> usize {
        self.state.input_closes.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.open_count() > self.close_count()
    }

    fn begin_open(&self) -> NativeResult<()> {
        if let Some(e) = self.state.open_error.lock().clone() {
            return Err(e);
        }
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDevice")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Transport over a set of named mock devices. Clones share the device set.
#[derive(Clone, Default)]
pub struct MockTransport {
    devices: Arc<Mutex<HashMap<String, MockDevice>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or fetch) the device called `name`.
    pub fn add_device(&self, name: impl Into<String>) -> MockDevice {
        let name = name.into();
        self.devices
            .lock()
            .entry(name.clone())
            .or_insert_with(|| MockDevice::new(name))
            .clone()
    }

    pub fn device(&self, name: &str) -> Option<MockDevice> {
        self.devices.lock().get(name).cloned()
    }

    fn find(&self, name: &str) -> NativeResult<MockDevice> {
        self.device(name).ok_or_else(|| {
            NativeError::new(
                NativeErrorKind::NoSuchDevice,
                format!("no mock device named '{name}'"),
            )
        })
    }
}

pub struct MockInputHalf {
    device: MockDevice,
    pending: VecDeque<u8>,
}

impl RawInput for MockInputHalf {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> NativeResult<usize> {
        if self.pending.is_empty() {
            match self.device.state.input_rx.recv_timeout(timeout) {
                Ok(MockInput::Bytes(bytes)) => self.pending.extend(bytes),
                Ok(MockInput::Fail(e)) => return Err(e),
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(NativeError::new(
                        NativeErrorKind::Disconnected,
                        "mock device removed",
                    ))
                }
            }
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn close(self) -> NativeResult<()> {
        self.device.state.input_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockOutputHalf {
    device: MockDevice,
    push_id: Option<ConnectionId>,
}

impl RawOutput for MockOutputHalf {
    fn write(&mut self, bytes: &[u8]) -> NativeResult<usize> {
        if let Some(e) = self.device.state.write_error.lock().clone() {
            return Err(e);
        }
        self.device.state.written.lock().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn close(self) -> NativeResult<()> {
        if let Some(id) = self.push_id {
            let mut push = self.device.state.push.lock();
            if matches!(*push, Some((installed, _)) if installed == id) {
                *push = None;
            }
        }
        self.device.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl PullTransport for MockTransport {
    type Input = MockInputHalf;
    type Output = MockOutputHalf;

    fn open(&self, name: &str) -> NativeResult<(MockInputHalf, MockOutputHalf)> {
        let device = self.find(name)?;
        device.begin_open()?;
        Ok((
            MockInputHalf {
                device: device.clone(),
                pending: VecDeque::new(),
            },
            MockOutputHalf {
                device,
                push_id: None,
            },
        ))
    }
}

impl PushTransport for MockTransport {
    type Connection = MockOutputHalf;

    fn open(
        &self,
        name: &str,
        id: ConnectionId,
        dispatcher: Dispatcher,
    ) -> NativeResult<MockOutputHalf> {
        let device = self.find(name)?;
        device.begin_open()?;
        *device.state.push.lock() = Some((id, dispatcher));
        Ok(MockOutputHalf {
            device,
            push_id: Some(id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Backpressure;
    use crate::registry::PacketRegistry;
    use crate::sequencer::{PortCaps, PortKind};

    #[test]
    fn test_pull_read_splits_and_times_out() {
        let transport = MockTransport::new();
        let device = transport.add_device("Keys");
        let (mut input, _output) = PullTransport::open(&transport, "Keys").unwrap();

        device.send(&[0x90, 60, 100, 0x80]);
        let mut buf = [0u8; 3];
        assert_eq!(input.read(&mut buf, Duration::from_millis(10)).unwrap(), 3);
        assert_eq!(buf, [0x90, 60, 100]);
        assert_eq!(input.read(&mut buf, Duration::from_millis(10)).unwrap(), 1);
        assert_eq!(buf[0], 0x80);
        assert_eq!(input.read(&mut buf, Duration::from_millis(10)).unwrap(), 0);
    }

    #[test]
    fn test_pull_failure_after_queued_bytes() {
        let transport = MockTransport::new();
        let device = transport.add_device("Keys");
        let (mut input, _output) = PullTransport::open(&transport, "Keys").unwrap();

        device.send(&[1, 2, 3]);
        device.fail(NativeError::new(NativeErrorKind::Io, "gone"));

        let mut buf = [0u8; 3];
        assert_eq!(input.read(&mut buf, Duration::from_millis(10)).unwrap(), 3);
        assert!(input.read(&mut buf, Duration::from_millis(10)).is_err());
    }

    #[test]
    fn test_open_unknown_and_scripted_failure() {
        let transport = MockTransport::new();
        let err = PullTransport::open(&transport, "Nope").err().unwrap();
        assert_eq!(err.kind, NativeErrorKind::NoSuchDevice);

        let device = transport.add_device("Busy");
        device.set_open_error(NativeError::from_code(-16));
        let err = PullTransport::open(&transport, "Busy").err().unwrap();
        assert_eq!(err.kind, NativeErrorKind::Busy);
        assert_eq!(device.open_count(), 0);
    }

    #[test]
    fn test_push_close_uninstalls_dispatcher() {
        let registry = Arc::new(PacketRegistry::new());
        let id = registry.allocate_id();
        let rx = registry.register(id, 8).unwrap().receiver();

        let transport = MockTransport::new();
        let device = transport.add_device("Pad");
        let dispatcher = Dispatcher::new(Arc::clone(&registry), Backpressure::Drop);
        let conn = PushTransport::open(&transport, "Pad", id, dispatcher).unwrap();

        device.send(&[0x90, 36, 127]);
        assert_eq!(rx.try_recv().unwrap().data, [0x90, 36, 127]);

        conn.close().unwrap();
        assert!(!device.is_open());
        device.send(&[0x90, 36, 127]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_sequencer_snapshot() {
        let seq = MockSequencer::new();
        seq.add_client(20, "Synth", Some(1));
        seq.add_port(20, PortRecord::new(0, "Out", PortKind::MIDI_GENERIC, PortCaps::WRITE));

        let mut session = seq.open_session().unwrap();
        assert_eq!(session.clients().len(), 1);
        assert_eq!(session.ports(20).len(), 1);
        assert!(session.ports(99).is_empty());
    }
}
