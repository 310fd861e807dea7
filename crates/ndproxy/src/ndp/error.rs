//! Error types for the NDP proxy core.

use std::io;

use super::link::LinkId;
use crate::util::ifname::IfError;

/// Result type for NDP proxy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the NDP proxy core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A socket, bind, filter or ioctl step failed while acquiring a link.
    #[error("{step} failed on interface {interface}: {source}")]
    Setup {
        /// The interface being set up.
        interface: String,
        /// The OS call that failed.
        step: &'static str,
        /// The underlying error.
        source: io::Error,
    },

    /// Interface name rejected before any OS call.
    #[error("invalid interface name: {0}")]
    InvalidName(String),

    /// Captured packet is shorter than the headers it must contain.
    #[error("packet truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum length required.
        expected: usize,
        /// Bytes actually captured.
        actual: usize,
    },

    /// Captured packet carries the wrong ICMPv6 type.
    #[error("unexpected ICMPv6 type: expected {expected}, got {actual}")]
    UnexpectedType {
        /// ICMPv6 type the decoder accepts.
        expected: u8,
        /// ICMPv6 type found in the packet.
        actual: u8,
    },

    /// Sending a packet failed.
    #[error("transmit on interface {interface} failed: {source}")]
    Transmit {
        /// The interface the packet was sent on.
        interface: String,
        /// The underlying error.
        source: io::Error,
    },

    /// The multiplexed wait itself failed.
    #[error("poll failed: {0}")]
    Wait(io::Error),

    /// The link handle does not resolve to a registered link.
    #[error("link not found: {0}")]
    LinkNotFound(LinkId),

    /// No link is registered under this name.
    #[error("interface not registered: {0}")]
    NotRegistered(String),

    /// The link exists but the socket needed for the operation is not open.
    #[error("{socket} socket not open on interface {interface}")]
    SocketNotOpen {
        /// The interface name.
        interface: String,
        /// Which of the two sockets is missing.
        socket: &'static str,
    },
}

impl Error {
    /// Create a setup error from the current `errno`.
    pub fn setup(interface: &str, step: &'static str) -> Self {
        Self::Setup {
            interface: interface.to_string(),
            step,
            source: io::Error::last_os_error(),
        }
    }

    /// Check if this error came from decoding a captured packet.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Truncated { .. } | Self::UnexpectedType { .. })
    }

    /// Check if this error came from acquiring a link.
    pub fn is_setup(&self) -> bool {
        matches!(self, Self::Setup { .. } | Self::InvalidName(_))
    }

    /// Check if this is a "not found" error (stale handle, unknown name or
    /// missing device).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::LinkNotFound(_) | Self::NotRegistered(_) => true,
            Self::Setup { source, .. } => source.raw_os_error() == Some(libc::ENODEV),
            _ => false,
        }
    }

    /// Check if a non-blocking call would have blocked.
    pub fn is_would_block(&self) -> bool {
        match self {
            Self::Io(e) | Self::Transmit { source: e, .. } => {
                e.kind() == io::ErrorKind::WouldBlock
            }
            _ => false,
        }
    }
}

impl From<IfError> for Error {
    fn from(err: IfError) -> Self {
        match err {
            IfError::InvalidName(msg) => Self::InvalidName(msg),
        }
    }
}
