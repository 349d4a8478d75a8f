//! Blocking-read ingestion on a dedicated thread per device.

use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use seqmidi_core::PACKET_SIZE;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

use super::{DeviceLink, IngestionStrategy};
use crate::connection::{ConnectionId, PullTransport, RawInput, RawOutput};
use crate::error::{Error, NativeError, NativeErrorKind, Result};
use crate::packet::Packet;
use crate::registry::{PacketRegistry, QueueHandle};

pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Pull strategy over a blocking-read transport (ALSA rawmidi, mock).
///
/// Reads are bounded by `poll_interval`, which is also the longest `close`
/// waits for the reader thread to notice it should stop.
pub struct Pull<T: PullTransport> {
    transport: T,
    poll_interval: Duration,
}

impl<T: PullTransport> Pull<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: PullTransport> IngestionStrategy for Pull<T> {
    type Link = PullLink<T::Input, T::Output>;

    fn start(
        &self,
        name: &str,
        id: ConnectionId,
        queue: QueueHandle,
        registry: &Arc<PacketRegistry>,
    ) -> Result<Self::Link> {
        let open_error = |source: NativeError| Error::Open {
            name: name.to_string(),
            source,
        };
        let (input, output) = self.transport.open(name).map_err(open_error)?;

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let reader = Reader {
            id,
            input,
            sender: queue.sender().clone(),
            stop: stop_rx,
            registry: Arc::clone(registry),
            poll_interval: self.poll_interval,
        };
        drop(queue);

        let task = match thread::Builder::new()
            .name(format!("seqmidi-read-{}", id.raw()))
            .spawn(move || reader.run())
        {
            Ok(task) => task,
            Err(e) => {
                if let Err(close_err) = output.close() {
                    debug!("Closing output of {} after spawn failure: {}", id, close_err);
                }
                return Err(open_error(e.into()));
            }
        };
        debug!("Started reader thread for {} ('{}')", id, name);

        Ok(PullLink {
            output,
            input: None,
            stop: Some(stop_tx),
            task: Some(task),
        })
    }
}

/// Owns the input half for its whole life and returns it on exit.
struct Reader<I: RawInput> {
    id: ConnectionId,
    input: I,
    sender: Sender<Packet>,
    /// Never carries a message; disconnects when the link is stopped.
    stop: Receiver<()>,
    registry: Arc<PacketRegistry>,
    poll_interval: Duration,
}

impl<I: RawInput> Reader<I> {
    fn run(mut self) -> I {
        let mut buf = [0u8; PACKET_SIZE];
        let mut filled = 0;

        while !self.stopped() {
            match self.input.read(&mut buf[filled..], self.poll_interval) {
                Ok(0) => {}
                Ok(n) => {
                    filled += n;
                    if filled < PACKET_SIZE {
                        continue;
                    }
                    filled = 0;
                    if !self.enqueue(Packet::new(buf)) {
                        break;
                    }
                }
                Err(e) => {
                    debug!("Read from {} failed, ending stream: {}", self.id, e);
                    self.registry.unregister(self.id);
                    self.enqueue(Packet::failed(Error::Read(e)));
                    break;
                }
            }
        }

        debug!("Reader thread for {} exiting", self.id);
        // Dropping the sender here closes the stream for consumers.
        let Reader { input, .. } = self;
        input
    }

    fn stopped(&self) -> bool {
        matches!(self.stop.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Blocks while the queue is full, unless the link is stopped.
    fn enqueue(&self, packet: Packet) -> bool {
        select! {
            send(self.sender, packet) -> res => res.is_ok(),
            recv(self.stop) -> _ => false,
        }
    }
}

pub struct PullLink<I: RawInput, O: RawOutput> {
    output: O,
    /// Handed back by the reader thread once it has exited.
    input: Option<I>,
    stop: Option<Sender<()>>,
    task: Option<JoinHandle<I>>,
}

impl<I: RawInput, O: RawOutput> DeviceLink for PullLink<I, O> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        self.output.write(bytes).map_err(Error::Write)
    }

    fn stop(&mut self) -> Result<()> {
        drop(self.stop.take());
        if let Some(task) = self.task.take() {
            let input = task.join().map_err(|_| {
                Error::Close(NativeError::new(
                    NativeErrorKind::Unknown,
                    "MIDI reader thread panicked",
                ))
            })?;
            self.input = Some(input);
        }
        Ok(())
    }

    fn release(self) -> Result<()> {
        let PullLink { output, input, .. } = self;
        let input_result = input.map(RawInput::close).unwrap_or(Ok(()));
        let output_result = output.close();
        input_result.and(output_result).map_err(Error::Close)
    }
}
