//! Callback-driven ingestion.

use crossbeam_channel::{select, TrySendError};
use std::sync::Arc;
use tracing::{debug, trace};

use super::{Backpressure, DeviceLink, IngestionStrategy};
use crate::connection::{ConnectionId, PushTransport, RawOutput};
use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::registry::{PacketRegistry, QueueHandle};

/// Entry point native callbacks use to hand over received messages.
///
/// Cheap to clone; every connection's callback holds one. Lookups go through
/// the injected registry, so packets for a closed device are dropped.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<PacketRegistry>,
    backpressure: Backpressure,
}

impl Dispatcher {
    pub fn new(registry: Arc<PacketRegistry>, backpressure: Backpressure) -> Self {
        Self {
            registry,
            backpressure,
        }
    }

    /// Route one native message to the queue registered for `id`.
    ///
    /// Returns whether the packet was enqueued. Misses and drops are not
    /// errors: there is no caller on the native thread to report them to.
    pub fn dispatch(&self, id: ConnectionId, bytes: &[u8]) -> bool {
        let Some(packet) = Packet::from_slice(bytes) else {
            return false;
        };
        let queue = match self.registry.lookup(id) {
            Ok(queue) => queue,
            Err(_) => {
                trace!("Dropping packet for {}: not registered", id);
                return false;
            }
        };
        let sender = queue.sender();

        // A rendezvous queue is a hand-off: wait for the consumer regardless
        // of policy. Every wait ends early if the device is closed meanwhile.
        let policy = match queue.capacity() {
            0 => Backpressure::Block,
            _ => self.backpressure,
        };
        match policy {
            Backpressure::Block => select! {
                send(sender, packet) -> res => res.is_ok(),
                recv(queue.closed()) -> _ => false,
            },
            Backpressure::Timeout(timeout) => select! {
                send(sender, packet) -> res => res.is_ok(),
                recv(queue.closed()) -> _ => false,
                default(timeout) => {
                    debug!("Queue for {} full after {:?}, dropping packet", id, timeout);
                    false
                }
            },
            Backpressure::Drop => match sender.try_send(packet) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    debug!("Queue for {} full, dropping packet", id);
                    false
                }
                Err(TrySendError::Disconnected(_)) => false,
            },
        }
    }
}

/// Push strategy over a callback-driven transport (midir, mock).
pub struct Push<T: PushTransport> {
    transport: T,
    backpressure: Backpressure,
}

impl<T: PushTransport> Push<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            backpressure: Backpressure::default(),
        }
    }

    pub fn with_backpressure(mut self, backpressure: Backpressure) -> Self {
        self.backpressure = backpressure;
        self
    }

    pub fn backpressure(&self) -> Backpressure {
        self.backpressure
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: PushTransport> IngestionStrategy for Push<T> {
    type Link = PushLink<T::Connection>;

    fn start(
        &self,
        name: &str,
        id: ConnectionId,
        _queue: QueueHandle,
        registry: &Arc<PacketRegistry>,
    ) -> Result<Self::Link> {
        let dispatcher = Dispatcher::new(Arc::clone(registry), self.backpressure);
        let connection = self
            .transport
            .open(name, id, dispatcher)
            .map_err(|source| Error::Open {
                name: name.to_string(),
                source,
            })?;
        debug!("Opened push connection {} for '{}'", id, name);
        Ok(PushLink { connection })
    }
}

pub struct PushLink<C: RawOutput> {
    connection: C,
}

impl<C: RawOutput> DeviceLink for PushLink<C> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        self.connection.write(bytes).map_err(Error::Write)
    }

    // Unregistering is enough: the shared dispatcher drops anything that
    // arrives for this id afterwards.
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn release(self) -> Result<()> {
        self.connection.close().map_err(Error::Close)
    }
}
