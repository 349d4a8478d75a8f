//! Packet ingestion strategies.
//!
//! Two native delivery models end up behind the same consumer contract:
//!
//! - [`Push`]: the backend calls us from its own service thread. Every
//!   message goes through a shared [`Dispatcher`] that resolves the
//!   destination queue in the registry.
//! - [`Pull`]: we own a reader thread per device that loops on a blocking
//!   read and enqueues whole 3-byte packets.
//!
//! The strategy is a type parameter of `MidiSystem`, so one build uses one
//! model and nothing branches per packet.

mod pull;
mod push;

pub(crate) use pull::DEFAULT_POLL_INTERVAL;
pub use pull::{Pull, PullLink};
pub use push::{Dispatcher, Push, PushLink};

use std::sync::Arc;
use std::time::Duration;

use crate::connection::ConnectionId;
use crate::error::Result;
use crate::registry::{PacketRegistry, QueueHandle};

/// What a push callback does when the destination queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    /// Block the native thread until there is room. Only safe when the
    /// consumer keeps draining until end-of-stream.
    Block,
    /// Block for at most this long, then drop the packet.
    Timeout(Duration),
    /// Drop the packet immediately.
    Drop,
}

impl Default for Backpressure {
    fn default() -> Self {
        Backpressure::Timeout(Duration::from_millis(10))
    }
}

/// Running state of one open device.
pub trait DeviceLink: Send + 'static {
    fn write(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Stop producing packets. Called before the registry entry is removed.
    fn stop(&mut self) -> Result<()>;

    /// Release the native handle. Called exactly once, after `stop`.
    fn release(self) -> Result<()>;
}

pub trait IngestionStrategy: Send + Sync + 'static {
    type Link: DeviceLink;

    /// Open `name` natively and start delivering its packets into `queue`.
    ///
    /// `id` is already registered when this is called.
    fn start(
        &self,
        name: &str,
        id: ConnectionId,
        queue: QueueHandle,
        registry: &Arc<PacketRegistry>,
    ) -> Result<Self::Link>;
}
