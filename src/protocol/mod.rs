//! Client-server wire protocol.
//!
//! This module turns a raw byte stream into a channel for discrete messages and defines the
//! request/response vocabulary exchanged with a Cryo server.
//!
//! # Key Components
//!
//! - [`FramedChannel`]: Owns one socket and moves length-prefixed byte frames over it.
//! - [`MessageTransport`]: Typed messages over a [`FramedChannel`] through a pluggable [`Codec`].
//! - [`Command`] / [`Response`]: Messages sent to and received from the server.
//! - [`WireError`]: Classified failure of any of the above.
//!
//! # Binary Format
//!
//! Every message on the socket is a single frame:
//!
//! - A 4 byte, big-endian, unsigned length `N`.
//! - Exactly `N` bytes of payload, where `0 < N <= max_message_size`.
//!
//! The payload is opaque to the framing layer. [`BincodeCodec`] encodes it with bincode using
//! big-endian, fixed-width integers.
//!
//! # Failure Handling
//!
//! Partial reads and writes are resumed, and transient I/O errors (timeouts, would-block,
//! interrupts) are retried with a short doubling backoff. Once a failure is classified as
//! [`ErrorKind::Terminated`] or [`ErrorKind::CorruptMessage`] the channel is closed; callers
//! recover by building a new one. See [`retry`](crate::retry) for the policy that does so.
pub mod channel;
mod error;
mod request;
mod response;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{FramedChannel, Socket, Status};
pub use error::{Cause, ErrorKind, WireError};
pub use request::{Command, CommandError, HANDSHAKE, Purpose};
pub use response::{Response, ResponseError};
pub use transport::{
    BincodeCodec, ClientWire, Codec, CodecError, MAX_MESSAGE_SIZE, MessageTransport, ServerWire,
    WireConfig,
};
