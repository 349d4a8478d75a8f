//! The open-device façade.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::connection::ConnectionId;
use crate::error::{Error, Result};
use crate::ingest::{DeviceLink, IngestionStrategy};
use crate::packet::PacketReceiver;
use crate::registry::PacketRegistry;

/// An open MIDI device.
///
/// Created by [`MidiSystem::open`](crate::MidiSystem::open). The device owns
/// its native connection until [`close`](Device::close) consumes it; dropping
/// an open device performs the same teardown and logs any failure.
///
/// `Device` is `Sync`: writes from several threads are serialised, and any
/// number of threads may hold the receiver returned by
/// [`packets`](Device::packets).
pub struct Device<S: IngestionStrategy> {
    name: String,
    queue_size: usize,
    id: ConnectionId,
    registry: Arc<PacketRegistry>,
    receiver: PacketReceiver,
    link: Mutex<Option<S::Link>>,
}

impl<S: IngestionStrategy> Device<S> {
    pub(crate) fn new(
        name: String,
        queue_size: usize,
        id: ConnectionId,
        registry: Arc<PacketRegistry>,
        receiver: PacketReceiver,
        link: S::Link,
    ) -> Self {
        Self {
            name,
            queue_size,
            id,
            registry,
            receiver,
            link: Mutex::new(Some(link)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capacity of the packet queue; 0 is a synchronous hand-off.
    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Write raw MIDI bytes. Returns the number of bytes the backend accepted.
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        if bytes.is_empty() {
            return Ok(0);
        }
        let mut link = self.link.lock();
        match link.as_mut() {
            Some(link) => link.write(bytes),
            None => Err(Error::DeviceNotFound(self.id)),
        }
    }

    /// The device's packet stream.
    ///
    /// Every call returns a handle to the same queue. The stream ends
    /// (`recv` returns `Err`) after the device is closed or its input fails,
    /// and only once every packet enqueued before that has been received.
    /// A failed input drops the registry entry, so later calls fall back to
    /// the receiver taken at open.
    pub fn packets(&self) -> Result<PacketReceiver> {
        match self.registry.lookup(self.id) {
            Ok(queue) => Ok(queue.receiver()),
            Err(Error::DeviceNotFound(_)) => Ok(self.receiver.clone()),
            Err(e) => Err(e),
        }
    }

    /// Stop ingestion, drop the registry entry and release the native handle.
    pub fn close(self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&self) -> Result<()> {
        let Some(mut link) = self.link.lock().take() else {
            return Ok(());
        };
        let stopped = link.stop();
        self.registry.unregister(self.id);
        let released = link.release();
        debug!("Closed MIDI device '{}' ({})", self.name, self.id);
        stopped.and(released)
    }
}

impl<S: IngestionStrategy> Drop for Device<S> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Failed to release MIDI device '{}' ({}): {}", self.name, self.id, e);
        }
    }
}

impl<S: IngestionStrategy> std::fmt::Debug for Device<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("queue_size", &self.queue_size)
            .field("id", &self.id)
            .finish()
    }
}
