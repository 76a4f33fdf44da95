use std::{
    marker::PhantomData,
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use bincode::{
    Decode, Encode,
    config::{BigEndian, Configuration, Fixint},
    decode_from_slice, encode_to_vec,
};
use log::{debug, trace};
use thiserror::Error;

use super::{
    Command, Response, WireError,
    channel::{FramedChannel, Socket, Status},
};

/// Largest frame accepted by default (32 MiB).
pub const MAX_MESSAGE_SIZE: usize = 32 * 1024 * 1024;
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Socket level settings for a dialed transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireConfig {
    pub max_message_size: usize,
    pub dial_timeout: Duration,
    /// Read/write timeout on the socket. Expiry counts as a transient error and is retried
    /// with backoff before the channel gives up.
    pub io_timeout: Option<Duration>,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_message_size: MAX_MESSAGE_SIZE,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            io_timeout: None,
        }
    }
}

/// Serializes outbound messages and parses inbound ones.
pub trait Codec: Send + Sync {
    type Outbound;
    type Inbound;
    type Error: std::error::Error + Send + Sync + 'static;

    fn encode(&self, msg: &Self::Outbound) -> Result<Vec<u8>, Self::Error>;
    fn decode(&self, bytes: &[u8]) -> Result<Self::Inbound, Self::Error>;
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode message: {0}")]
    Serialize(#[from] bincode::error::EncodeError),
    #[error("failed to decode message: {0}")]
    Deserialize(#[from] bincode::error::DecodeError),
    #[error("{0} trailing bytes after decoded message")]
    TrailingBytes(usize),
}

/// Bincode codec using big-endian, fixed-width integers.
pub struct BincodeCodec<O, I> {
    config: Configuration<BigEndian, Fixint>,
    _marker: PhantomData<fn(&O) -> I>,
}

impl<O, I> Default for BincodeCodec<O, I> {
    fn default() -> Self {
        let config = bincode::config::standard()
            .with_big_endian()
            .with_fixed_int_encoding();
        Self {
            config,
            _marker: PhantomData,
        }
    }
}

impl<O, I> Codec for BincodeCodec<O, I>
where
    O: Encode,
    I: Decode<()>,
{
    type Outbound = O;
    type Inbound = I;
    type Error = CodecError;

    fn encode(&self, msg: &O) -> Result<Vec<u8>, CodecError> {
        Ok(encode_to_vec(msg, self.config)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<I, CodecError> {
        let (msg, read) = decode_from_slice(bytes, self.config)?;
        if read != bytes.len() {
            return Err(CodecError::TrailingBytes(bytes.len() - read));
        }
        Ok(msg)
    }
}

/// Typed messages over a [`FramedChannel`].
pub struct MessageTransport<S: Socket, C: Codec> {
    channel: FramedChannel<S>,
    codec: C,
}

/// Client side of a connection: sends [`Command`]s, receives [`Response`]s.
pub type ClientWire = MessageTransport<TcpStream, BincodeCodec<Command, Response>>;

/// Server side of a connection: receives [`Command`]s, sends [`Response`]s.
pub type ServerWire = MessageTransport<TcpStream, BincodeCodec<Response, Command>>;

impl<S: Socket, C: Codec> MessageTransport<S, C> {
    pub fn with_codec(socket: S, max_message_size: usize, codec: C) -> Result<Self, WireError> {
        let channel =
            FramedChannel::new(socket, max_message_size).map_err(WireError::not_established)?;
        Ok(Self { channel, codec })
    }

    pub fn new(socket: S, max_message_size: usize) -> Result<Self, WireError>
    where
        C: Default,
    {
        Self::with_codec(socket, max_message_size, C::default())
    }

    pub fn send(&self, msg: &C::Outbound) -> Result<(), WireError> {
        let bytes = match self.codec.encode(msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.channel.close();
                return Err(WireError::corrupt(e));
            }
        };

        trace!("sending {} byte message", bytes.len());
        self.channel.send(&bytes)
    }

    pub fn receive(&self) -> Result<C::Inbound, WireError> {
        let bytes = self.channel.receive()?;

        self.codec.decode(&bytes).map_err(|e| {
            self.channel.close();
            WireError::corrupt(e)
        })
    }

    pub fn close(&self) {
        self.channel.close();
    }

    pub fn status(&self) -> Status {
        self.channel.status()
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}

impl<C> MessageTransport<TcpStream, C>
where
    C: Codec + Default,
{
    /// Connect to `addr`, trying each resolved address in turn.
    pub fn dial(addr: impl ToSocketAddrs, config: &WireConfig) -> Result<Self, WireError> {
        let mut last_err = None;

        for candidate in addr.to_socket_addrs().map_err(WireError::not_established)? {
            match TcpStream::connect_timeout(&candidate, config.dial_timeout) {
                Ok(stream) => {
                    debug!("connected to {candidate}");
                    return Self::accept(stream, config);
                }
                Err(e) => {
                    debug!("failed to connect to {candidate}: {e}");
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(e) => WireError::not_established(e),
            None => WireError::not_established("address resolved to nothing"),
        })
    }

    /// Wrap an already connected stream.
    pub fn accept(stream: TcpStream, config: &WireConfig) -> Result<Self, WireError> {
        stream
            .set_nodelay(true)
            .and_then(|_| stream.set_read_timeout(config.io_timeout))
            .and_then(|_| stream.set_write_timeout(config.io_timeout))
            .map_err(WireError::not_established)?;

        Self::new(stream, config.max_message_size)
    }
}
