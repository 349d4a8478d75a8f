//! Error types for the MIDI device registry.
//!
//! Native backends report failures in their own domains (negative errno
//! values for ALSA, string-only errors for midir). Everything is funnelled
//! into [`NativeError`], which keeps the raw code, and wrapped in an
//! [`Error`] variant that says which operation failed.

use thiserror::Error;

use crate::connection::ConnectionId;

// Linux errno values as returned (negated) by the ALSA sequencer and rawmidi APIs.
const EPERM: i32 = 1;
const ENOENT: i32 = 2;
const EINTR: i32 = 4;
const EIO: i32 = 5;
const ENXIO: i32 = 6;
const EBADF: i32 = 9;
const EAGAIN: i32 = 11;
const ENOMEM: i32 = 12;
const EACCES: i32 = 13;
const EBUSY: i32 = 16;
const ENODEV: i32 = 19;
const EINVAL: i32 = 22;
const EPIPE: i32 = 32;
const ESTRPIPE: i32 = 86;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeErrorKind {
    NoSuchDevice,
    Busy,
    PermissionDenied,
    InvalidArgument,
    OutOfMemory,
    WouldBlock,
    Disconnected,
    Io,
    /// Not individually mapped; the raw code is still carried.
    Unknown,
}

impl std::fmt::Display for NativeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NativeErrorKind::NoSuchDevice => "no such device",
            NativeErrorKind::Busy => "device busy",
            NativeErrorKind::PermissionDenied => "permission denied",
            NativeErrorKind::InvalidArgument => "invalid argument",
            NativeErrorKind::OutOfMemory => "out of memory",
            NativeErrorKind::WouldBlock => "would block",
            NativeErrorKind::Disconnected => "disconnected",
            NativeErrorKind::Io => "I/O error",
            NativeErrorKind::Unknown => "unknown error",
        };
        f.write_str(s)
    }
}

/// A failure reported by a native MIDI subsystem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}{}", .code.map(|c| format!(" (code {c})")).unwrap_or_default())]
pub struct NativeError {
    pub kind: NativeErrorKind,
    /// Raw platform code, `None` for backends that only report text.
    pub code: Option<i32>,
    pub message: String,
}

pub type NativeResult<T> = std::result::Result<T, NativeError>;

impl NativeError {
    pub fn new(kind: NativeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    /// Map an ALSA-style status code. Zero and positive values are success.
    pub fn from_code(code: i32) -> Option<Self> {
        if code >= 0 {
            return None;
        }
        let errno = code.checked_neg().unwrap_or(i32::MAX);
        let kind = match errno {
            ENOENT | ENODEV | ENXIO => NativeErrorKind::NoSuchDevice,
            EBUSY => NativeErrorKind::Busy,
            EPERM | EACCES => NativeErrorKind::PermissionDenied,
            EINVAL | EBADF => NativeErrorKind::InvalidArgument,
            ENOMEM => NativeErrorKind::OutOfMemory,
            EAGAIN => NativeErrorKind::WouldBlock,
            EPIPE | ESTRPIPE => NativeErrorKind::Disconnected,
            EIO | EINTR => NativeErrorKind::Io,
            _ => NativeErrorKind::Unknown,
        };
        Some(Self {
            kind,
            code: Some(code),
            message: strerror(errno),
        })
    }

    /// A wait that was cut short by a signal; safe to retry.
    pub fn is_interrupted(&self) -> bool {
        self.code == Some(-EINTR)
    }

    #[cfg(all(feature = "alsa", target_os = "linux"))]
    pub(crate) fn context(mut self, what: &str) -> Self {
        self.message = format!("{}: {}", what, self.message);
        self
    }
}

/// Map a native status code into the domain taxonomy.
///
/// Total over `i32`: unmapped failure codes become [`NativeErrorKind::Unknown`]
/// with the code preserved.
pub fn map_native_error(code: i32) -> Option<NativeError> {
    NativeError::from_code(code)
}

/// Platform description of an errno value, without the "(os error N)" suffix.
fn strerror(errno: i32) -> String {
    let text = std::io::Error::from_raw_os_error(errno).to_string();
    match text.find(" (os error") {
        Some(idx) if idx > 0 => text[..idx].to_string(),
        _ => text,
    }
}

impl From<std::io::Error> for NativeError {
    fn from(e: std::io::Error) -> Self {
        if let Some(errno) = e.raw_os_error() {
            if let Some(mapped) = NativeError::from_code(-errno) {
                return mapped;
            }
        }
        let kind = match e.kind() {
            std::io::ErrorKind::NotFound => NativeErrorKind::NoSuchDevice,
            std::io::ErrorKind::PermissionDenied => NativeErrorKind::PermissionDenied,
            std::io::ErrorKind::InvalidInput => NativeErrorKind::InvalidArgument,
            std::io::ErrorKind::WouldBlock => NativeErrorKind::WouldBlock,
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::UnexpectedEof => {
                NativeErrorKind::Disconnected
            }
            _ => NativeErrorKind::Io,
        };
        NativeError::new(kind, e.to_string())
    }
}

#[cfg(all(feature = "alsa", target_os = "linux"))]
impl From<alsa::Error> for NativeError {
    fn from(e: alsa::Error) -> Self {
        NativeError::from_code(-e.errno())
            .unwrap_or_else(|| NativeError::new(NativeErrorKind::Unknown, e.to_string()))
            .context(e.func())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::InitError> for NativeError {
    fn from(e: midir::InitError) -> Self {
        NativeError::new(NativeErrorKind::Unknown, e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl<T> From<midir::ConnectError<T>> for NativeError {
    fn from(e: midir::ConnectError<T>) -> Self {
        let kind = match e.kind() {
            midir::ConnectErrorKind::InvalidPort => NativeErrorKind::NoSuchDevice,
            midir::ConnectErrorKind::Other(_) => NativeErrorKind::Unknown,
        };
        NativeError::new(kind, e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::SendError> for NativeError {
    fn from(e: midir::SendError) -> Self {
        let kind = match e {
            midir::SendError::InvalidData(_) => NativeErrorKind::InvalidArgument,
            midir::SendError::Other(_) => NativeErrorKind::Io,
        };
        NativeError::new(kind, e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::PortInfoError> for NativeError {
    fn from(e: midir::PortInfoError) -> Self {
        let kind = match e {
            midir::PortInfoError::PortNumberOutOfRange | midir::PortInfoError::InvalidPort => {
                NativeErrorKind::NoSuchDevice
            }
            midir::PortInfoError::CannotRetrievePortName => NativeErrorKind::Unknown,
        };
        NativeError::new(kind, e.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("MIDI sequencer connection error: {0}")]
    Connection(NativeError),

    #[error("Failed to open MIDI device '{name}': {source}")]
    Open { name: String, source: NativeError },

    #[error("MIDI close error: {0}")]
    Close(NativeError),

    #[error("MIDI write error: {0}")]
    Write(NativeError),

    #[error("MIDI read error: {0}")]
    Read(NativeError),

    #[error("No open MIDI device for {0}")]
    DeviceNotFound(ConnectionId),

    #[error("MIDI device {0} is already registered")]
    AlreadyRegistered(ConnectionId),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// The native error behind this failure, if any.
    pub fn native(&self) -> Option<&NativeError> {
        match self {
            Error::Connection(e) | Error::Close(e) | Error::Write(e) | Error::Read(e) => Some(e),
            Error::Open { source, .. } => Some(source),
            Error::DeviceNotFound(_) | Error::AlreadyRegistered(_) | Error::InvalidConfig(_) => {
                None
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_codes_are_not_errors() {
        assert!(map_native_error(0).is_none());
        assert!(map_native_error(3).is_none());
    }

    #[test]
    fn test_known_codes() {
        let e = map_native_error(-ENOENT).unwrap();
        assert_eq!(e.kind, NativeErrorKind::NoSuchDevice);
        assert_eq!(e.code, Some(-ENOENT));

        assert_eq!(map_native_error(-EBUSY).unwrap().kind, NativeErrorKind::Busy);
        assert_eq!(
            map_native_error(-EACCES).unwrap().kind,
            NativeErrorKind::PermissionDenied
        );
        assert_eq!(
            map_native_error(-EAGAIN).unwrap().kind,
            NativeErrorKind::WouldBlock
        );
        assert_eq!(
            map_native_error(-ENODEV).unwrap().kind,
            NativeErrorKind::NoSuchDevice
        );
    }

    #[test]
    fn test_unmapped_code_keeps_raw_value() {
        let e = map_native_error(-4242).unwrap();
        assert_eq!(e.kind, NativeErrorKind::Unknown);
        assert_eq!(e.code, Some(-4242));
        assert!(e.to_string().contains("-4242"));

        let e = map_native_error(i32::MIN).unwrap();
        assert_eq!(e.kind, NativeErrorKind::Unknown);
        assert_eq!(e.code, Some(i32::MIN));
    }

    #[test]
    fn test_message_is_populated() {
        let e = map_native_error(-ENOENT).unwrap();
        assert!(!e.message.is_empty());
        assert!(!e.message.contains("os error"));
    }

    #[test]
    fn test_io_error_conversion_keeps_errno() {
        let e: NativeError = std::io::Error::from_raw_os_error(EBUSY).into();
        assert_eq!(e.kind, NativeErrorKind::Busy);
        assert_eq!(e.code, Some(-EBUSY));

        let e: NativeError = std::io::Error::new(std::io::ErrorKind::WouldBlock, "later").into();
        assert_eq!(e.kind, NativeErrorKind::WouldBlock);
        assert_eq!(e.code, None);
    }

    #[cfg(all(feature = "alsa", target_os = "linux"))]
    #[test]
    fn test_alsa_error_names_failing_call() {
        let e: NativeError = alsa::Error::new("snd_rawmidi_open", ENOENT).into();
        assert_eq!(e.kind, NativeErrorKind::NoSuchDevice);
        assert_eq!(e.code, Some(-ENOENT));
        assert!(e.message.starts_with("snd_rawmidi_open: "));
    }

    #[test]
    fn test_error_exposes_native_cause() {
        let native = NativeError::new(NativeErrorKind::Io, "cable pulled");
        let err = Error::Read(native.clone());
        assert_eq!(err.native(), Some(&native));
        assert!(err.to_string().contains("cable pulled"));

        let err = Error::DeviceNotFound(ConnectionId::from_raw(7));
        assert!(err.native().is_none());
    }
}
