use std::{error::Error as StdError, fmt};

use thiserror::Error;

/// Boxed cause carried by a [`WireError`].
pub type Cause = Box<dyn StdError + Send + Sync>;

/// Classification of a failed wire operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The initial dial or connection setup failed.
    NotEstablished,
    /// No data is currently available; the peer closed its side between frames.
    Empty,
    /// The channel is permanently unusable and has been closed.
    Terminated,
    /// The peer violated the framing protocol or sent an unparsable payload.
    CorruptMessage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotEstablished => "connection not established",
            ErrorKind::Empty => "no data available",
            ErrorKind::Terminated => "connection terminated",
            ErrorKind::CorruptMessage => "corrupt message",
        };
        f.write_str(s)
    }
}

/// Failure of a channel, transport or connection operation.
#[derive(Debug, Error)]
#[error("{kind}: {source}")]
pub struct WireError {
    kind: ErrorKind,
    source: Cause,
}

impl WireError {
    pub fn new(kind: ErrorKind, cause: impl Into<Cause>) -> Self {
        Self {
            kind,
            source: cause.into(),
        }
    }

    pub fn not_established(cause: impl Into<Cause>) -> Self {
        Self::new(ErrorKind::NotEstablished, cause)
    }

    pub fn empty(cause: impl Into<Cause>) -> Self {
        Self::new(ErrorKind::Empty, cause)
    }

    pub fn terminated(cause: impl Into<Cause>) -> Self {
        Self::new(ErrorKind::Terminated, cause)
    }

    pub fn corrupt(cause: impl Into<Cause>) -> Self {
        Self::new(ErrorKind::CorruptMessage, cause)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Underlying reason for the failure, without the kind prefix.
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }
}
