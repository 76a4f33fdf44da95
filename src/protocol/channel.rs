//! Length-prefixed framing over a byte stream socket.
//!
//! Every frame on the wire is a 4 byte big-endian length `N` followed by exactly `N` payload
//! bytes, with `0 < N <= max_message_size`. The [`FramedChannel`] owns the socket, absorbs
//! partial reads and writes, retries transient I/O errors with a bounded exponential backoff
//! and classifies everything else into a [`WireError`]. Any classified failure other than
//! [`ErrorKind::Empty`](super::ErrorKind::Empty) closes the channel for good.
use std::{
    io::{self, BufReader, Read, Write},
    net::{Shutdown, TcpStream},
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use log::{debug, trace, warn};

use crate::utilities::lock;

use super::WireError;

/// Size of the length prefix in bytes.
pub const PREFIX_SIZE: usize = 4;

const MAX_PARTIAL_WRITE_RETRIES: usize = 10;
const MAX_BACKOFF_RETRIES: usize = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(5);

/// Byte stream a [`FramedChannel`] can own.
///
/// The channel keeps independent handles for reading, writing and shutting down so that a
/// `close` can interrupt an in-flight `receive` from another thread.
pub trait Socket: Read + Write + Send + Sized + 'static {
    fn try_clone(&self) -> io::Result<Self>;

    /// Shut down both directions of the underlying stream.
    fn shutdown(&self) -> io::Result<()>;
}

impl Socket for TcpStream {
    fn try_clone(&self) -> io::Result<Self> {
        TcpStream::try_clone(self)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Open,
    Closed,
}

pub struct FramedChannel<S: Socket> {
    closed: AtomicBool,
    max_message_size: usize,
    reader: Mutex<BufReader<S>>,
    writer: Mutex<S>,
    control: Mutex<S>,
}

impl<S: Socket> FramedChannel<S> {
    pub fn new(socket: S, max_message_size: usize) -> io::Result<Self> {
        let reader = socket.try_clone()?;
        let control = socket.try_clone()?;

        Ok(Self {
            closed: AtomicBool::new(false),
            max_message_size,
            reader: Mutex::new(BufReader::new(reader)),
            writer: Mutex::new(socket),
            control: Mutex::new(control),
        })
    }

    pub fn status(&self) -> Status {
        if self.closed.load(Ordering::SeqCst) {
            Status::Closed
        } else {
            Status::Open
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status() == Status::Closed
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Write `payload` as a single frame.
    pub fn send(&self, payload: &[u8]) -> Result<(), WireError> {
        let mut writer = lock(&self.writer);

        if self.is_closed() {
            return Err(WireError::terminated("trying to use closed channel"));
        }

        let size = u32::try_from(payload.len())
            .ok()
            .filter(|size| *size > 0 && payload.len() <= self.max_message_size)
            .ok_or_else(|| {
                WireError::corrupt(format!(
                    "cannot frame message of {} bytes (max: {})",
                    payload.len(),
                    self.max_message_size
                ))
            })?;

        let mut frame = Vec::with_capacity(PREFIX_SIZE + payload.len());
        frame.extend_from_slice(&size.to_be_bytes());
        frame.extend_from_slice(payload);

        self.write_frame(&mut *writer, &frame)
    }

    /// Read the next frame and return its payload.
    pub fn receive(&self) -> Result<Vec<u8>, WireError> {
        let mut reader = lock(&self.reader);

        if self.is_closed() {
            return Err(WireError::terminated("trying to use closed channel"));
        }

        let mut prefix = [0u8; PREFIX_SIZE];
        fill(&mut *reader, &mut prefix, false).map_err(|e| self.prefix_failure(e))?;

        let size = u32::from_be_bytes(prefix) as usize;
        if size == 0 {
            self.close();
            return Err(WireError::corrupt("invalid message size: 0"));
        }
        if size > self.max_message_size {
            self.close();
            return Err(WireError::corrupt(format!(
                "message too large: {size} bytes (max: {})",
                self.max_message_size
            )));
        }

        let mut payload = vec![0u8; size];
        fill(&mut *reader, &mut payload, true).map_err(|e| self.payload_failure(e, size))?;

        trace!("received frame of {size} bytes");
        Ok(payload)
    }

    /// Shut the socket down. Only the first call has any effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        debug!("closing channel");
        if let Err(e) = lock(&self.control).shutdown() {
            // The peer may already have torn the connection down.
            warn!("error closing network connection: {e}");
        }
    }

    fn write_frame(&self, writer: &mut S, frame: &[u8]) -> Result<(), WireError> {
        let mut written = 0;
        let mut partial_writes = 0;
        let mut backoff = Backoff::default();

        while written < frame.len() {
            let remaining = frame.len() - written;

            match writer.write(&frame[written..]) {
                Ok(n) => {
                    written += n;
                    if n < remaining {
                        if partial_writes >= MAX_PARTIAL_WRITE_RETRIES {
                            self.close();
                            return Err(WireError::terminated(format!(
                                "max partial write retries reached after {written} of {} bytes",
                                frame.len()
                            )));
                        }
                        partial_writes += 1;
                        trace!("partial write of {n} bytes, {} remaining", remaining - n);
                    }
                }
                Err(e) if is_transient(&e) => {
                    if !backoff.wait() {
                        self.close();
                        return Err(WireError::terminated(format!(
                            "max backoff retries reached: {e}"
                        )));
                    }
                }
                Err(e) => {
                    self.close();
                    return Err(WireError::terminated(e));
                }
            }
        }

        writer.flush().map_err(|e| {
            self.close();
            WireError::terminated(e)
        })
    }

    fn prefix_failure(&self, failure: ReadFailure) -> WireError {
        if self.is_closed() {
            return WireError::terminated("channel closed while reading");
        }

        match failure {
            ReadFailure::Eof { filled: 0 } => {
                WireError::empty(io::Error::from(io::ErrorKind::UnexpectedEof))
            }
            ReadFailure::Eof { filled } => {
                self.close();
                WireError::terminated(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended after {filled} of {PREFIX_SIZE} prefix bytes"),
                ))
            }
            ReadFailure::Io(e) => {
                self.close();
                WireError::terminated(e)
            }
        }
    }

    fn payload_failure(&self, failure: ReadFailure, size: usize) -> WireError {
        let closed_by_us = self.is_closed();
        self.close();

        match failure {
            _ if closed_by_us => WireError::terminated("channel closed while reading"),
            ReadFailure::Eof { filled: 0 } => WireError::corrupt(format!(
                "stream ended before any of the {size} promised payload bytes"
            )),
            ReadFailure::Eof { filled } => WireError::terminated(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended after {filled} of {size} payload bytes"),
            )),
            ReadFailure::Io(e) => WireError::terminated(e),
        }
    }
}

enum ReadFailure {
    Eof { filled: usize },
    Io(io::Error),
}

/// Fill `buf` completely. Transient errors are retried with backoff and, when `retry_eof` is
/// set, so is a zero-byte read. Bytes read before a retry are kept.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8], retry_eof: bool) -> Result<(), ReadFailure> {
    let mut filled = 0;
    let mut backoff = Backoff::default();

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                if retry_eof && backoff.wait() {
                    continue;
                }
                return Err(ReadFailure::Eof { filled });
            }
            Ok(n) => filled += n,
            Err(e) if is_transient(&e) => {
                if !backoff.wait() {
                    return Err(ReadFailure::Io(io::Error::new(
                        e.kind(),
                        format!("max backoff retries reached: {e}"),
                    )));
                }
            }
            Err(e) => return Err(ReadFailure::Io(e)),
        }
    }

    Ok(())
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Doubling sleep used between retries of transient I/O errors.
struct Backoff {
    delay: Duration,
    attempts: usize,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            delay: INITIAL_BACKOFF,
            attempts: 0,
        }
    }
}

impl Backoff {
    /// Sleep for the current delay and double it. Returns `false`, without sleeping, once
    /// the retries are spent.
    fn wait(&mut self) -> bool {
        if self.attempts >= MAX_BACKOFF_RETRIES {
            return false;
        }

        self.attempts += 1;
        trace!("backing off for {:?}", self.delay);
        thread::sleep(self.delay);
        self.delay *= 2;
        true
    }
}
