//! Error taxonomy for the encryption core.
//!
//! Every failure surfaced by the core maps onto exactly one of these kinds so
//! that callers can react without parsing message text. The core never
//! retries and never produces user-facing prose; translating kinds into
//! messages is the shell's job.

use std::fmt;
use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Path or id validation failed before any I/O was attempted.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The master key string did not decode to a usable key.
    #[error("invalid master key: {0}")]
    InvalidMasterKey(String),

    /// The system key file could not be read or written.
    #[error("system key unavailable: {0}")]
    VaultUnavailable(String),

    /// The system key file exists but does not hold a key of the right size.
    #[error("system key file corrupt: expected {expected} bytes, found {actual}")]
    VaultCorrupt { expected: usize, actual: usize },

    /// An AEAD tag failed verification, on a wrapped key or on a chunk.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// A read or write failed mid-stream.
    #[error("i/o failure during {phase}")]
    Io {
        phase: IoPhase,
        #[source]
        source: io::Error,
    },

    /// The platform durable-flush call reported failure.
    #[error("durable flush failed: {operation} returned {code}")]
    Durability { operation: &'static str, code: i32 },

    /// Cooperative cancellation was observed.
    #[error("operation cancelled")]
    Cancelled,

    /// An operation was attempted on a closed stream.
    #[error("stream already closed")]
    AlreadyClosed,
}

impl Error {
    #[inline]
    pub(crate) fn io(phase: IoPhase, source: io::Error) -> Self {
        Self::Io { phase, source }
    }
}

/// Where in the pipeline an I/O failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoPhase {
    OpenSource,
    OpenDestination,
    ReadHeader,
    ReadChunk,
    WriteHeader,
    WriteChunk,
    Flush,
    ReadKeyFile,
    WriteKeyFile,
}

impl IoPhase {
    fn label(self) -> &'static str {
        match self {
            Self::OpenSource => "source open",
            Self::OpenDestination => "destination open",
            Self::ReadHeader => "header read",
            Self::ReadChunk => "chunk read",
            Self::WriteHeader => "header write",
            Self::WriteChunk => "chunk write",
            Self::Flush => "flush",
            Self::ReadKeyFile => "key file read",
            Self::WriteKeyFile => "key file write",
        }
    }
}

impl fmt::Display for IoPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
