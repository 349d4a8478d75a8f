//! Native connection primitives.
//!
//! A backend opens a device by name and hands back owning halves. Closing a
//! half consumes it, so a released handle can't be used again. The registry
//! never sees these types; it is keyed by [`ConnectionId`] instead.

use std::time::Duration;

use crate::error::NativeResult;
use crate::ingest::Dispatcher;

/// Registry key for one open connection. Copyable, owns nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "connection #{}", self.0)
    }
}

/// Read side of a pull-model connection.
pub trait RawInput: Send + 'static {
    /// Wait up to `timeout` for bytes and copy them into `buf`.
    ///
    /// `Ok(0)` means nothing arrived in time. Any error is terminal for the
    /// connection.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> NativeResult<usize>;

    fn close(self) -> NativeResult<()>;
}

/// Write side of a connection (both models).
pub trait RawOutput: Send + 'static {
    fn write(&mut self, bytes: &[u8]) -> NativeResult<usize>;

    /// Release the native resource. For push connections this also stops
    /// the native callback for this device.
    fn close(self) -> NativeResult<()>;
}

/// Backend whose input must be polled with blocking reads (ALSA rawmidi).
pub trait PullTransport: Send + Sync + 'static {
    type Input: RawInput;
    type Output: RawOutput;

    fn open(&self, name: &str) -> NativeResult<(Self::Input, Self::Output)>;
}

/// Backend that delivers input by invoking a callback on its own thread.
///
/// The transport must route every message for this connection through
/// `dispatcher.dispatch(id, bytes)`.
pub trait PushTransport: Send + Sync + 'static {
    type Connection: RawOutput;

    fn open(
        &self,
        name: &str,
        id: ConnectionId,
        dispatcher: Dispatcher,
    ) -> NativeResult<Self::Connection>;
}
