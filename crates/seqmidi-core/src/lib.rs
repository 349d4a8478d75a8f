//! Core types for the seqmidi workspace.
//!
//! Plain data only: device snapshots produced by enumeration and the
//! status-byte classification used on received packets. No I/O lives here;
//! see `seqmidi-io` for the registry, ingestion and native backends.

pub mod device;
pub mod message;

pub use device::{DeviceInfo, DeviceType, Stream};
pub use message::{MessageType, PACKET_SIZE};
