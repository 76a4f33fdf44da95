//! In-memory socket with scripted reads and writes for exercising the channel.
use std::{
    collections::VecDeque,
    io::{self, Read, Write},
    sync::{Arc, Mutex},
    thread,
};

use crate::utilities::lock;

use super::channel::Socket;

enum ReadStep {
    Data(Vec<u8>),
    Fail(io::ErrorKind),
}

#[derive(Default)]
struct Script {
    reads: VecDeque<ReadStep>,
    write_failures: VecDeque<io::ErrorKind>,
    write_chunk: Option<usize>,
    written: Vec<u8>,
    shutdowns: usize,
}

/// Clones share the same script, so the handles a channel keeps all see one stream. Once the
/// read script runs out every read reports end-of-stream.
#[derive(Clone, Default)]
pub(crate) struct ScriptedSocket {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSocket {
    pub(crate) fn read(self, data: &[u8]) -> Self {
        lock(&self.script)
            .reads
            .push_back(ReadStep::Data(data.to_vec()));
        self
    }

    pub(crate) fn fail_read(self, kind: io::ErrorKind) -> Self {
        lock(&self.script).reads.push_back(ReadStep::Fail(kind));
        self
    }

    pub(crate) fn fail_write(self, kind: io::ErrorKind) -> Self {
        lock(&self.script).write_failures.push_back(kind);
        self
    }

    /// Accept at most `chunk` bytes per write call.
    pub(crate) fn with_write_chunk(self, chunk: usize) -> Self {
        lock(&self.script).write_chunk = Some(chunk);
        self
    }

    pub(crate) fn written(&self) -> Vec<u8> {
        lock(&self.script).written.clone()
    }

    pub(crate) fn shutdowns(&self) -> usize {
        lock(&self.script).shutdowns
    }
}

impl Read for ScriptedSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut script = lock(&self.script);

        match script.reads.pop_front() {
            None => Ok(0),
            Some(ReadStep::Fail(kind)) => Err(io::Error::from(kind)),
            Some(ReadStep::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    script.reads.push_front(ReadStep::Data(data.split_off(n)));
                }
                Ok(n)
            }
        }
    }
}

impl Write for ScriptedSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = {
            let mut script = lock(&self.script);
            if let Some(kind) = script.write_failures.pop_front() {
                return Err(io::Error::from(kind));
            }

            let n = script.write_chunk.map_or(buf.len(), |c| c.min(buf.len()));
            script.written.extend_from_slice(&buf[..n]);
            n
        };

        // Give concurrent writers a chance to run between chunks.
        thread::yield_now();
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Socket for ScriptedSocket {
    fn try_clone(&self) -> io::Result<Self> {
        Ok(self.clone())
    }

    fn shutdown(&self) -> io::Result<()> {
        lock(&self.script).shutdowns += 1;
        Ok(())
    }
}
