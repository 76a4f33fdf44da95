//! Server-push stream.
//!
//! A watch runs on its own connection, tagged `watch` during the handshake, and a background
//! thread that keeps receiving from it. Every response is published to a bounded queue read
//! through a [`Watcher`]. A full queue blocks the thread, which is the only backpressure on
//! the stream. When the connection fails for good the thread closes the queue, and a consumer
//! sees the end of the stream once it has drained what was already published.
use std::{
    sync::{
        Arc, Mutex,
        mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError},
    },
    thread,
    time::Duration,
};

use log::{debug, warn};

use crate::{
    protocol::{ErrorKind, Response},
    retry,
    utilities::lock,
};

use super::half::{Endpoint, Half};

/// Producer side of the push queue. Closing it is a one-way transition.
pub(crate) struct Queue {
    tx: Mutex<Option<SyncSender<Response>>>,
}

impl Queue {
    pub(crate) fn bounded(capacity: usize) -> (Self, Watcher) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        let queue = Self {
            tx: Mutex::new(Some(tx)),
        };
        let watcher = Watcher {
            rx: Arc::new(Mutex::new(rx)),
        };
        (queue, watcher)
    }

    /// Blocks while the queue is full. Returns `false` once the queue is closed or every
    /// consumer handle has been dropped.
    fn publish(&self, resp: Response) -> bool {
        // Send on a clone so a blocked publish never holds up `close`.
        let tx = lock(&self.tx).clone();
        match tx {
            Some(tx) => tx.send(resp).is_ok(),
            None => false,
        }
    }

    pub(crate) fn close(&self) {
        lock(&self.tx).take();
    }
}

/// Consumer handle for pushed responses. Clones share the same stream.
#[derive(Clone)]
pub struct Watcher {
    rx: Arc<Mutex<Receiver<Response>>>,
}

impl Watcher {
    /// Wait for the next response. `None` once the stream has ended.
    pub fn recv(&self) -> Option<Response> {
        lock(&self.rx).recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Response, RecvTimeoutError> {
        lock(&self.rx).recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Result<Response, TryRecvError> {
        lock(&self.rx).try_recv()
    }
}

impl Iterator for Watcher {
    type Item = Response;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// A running push stream as held by the client.
pub(crate) struct Watch {
    half: Arc<Half>,
    queue: Arc<Queue>,
    watcher: Watcher,
}

impl Watch {
    pub(crate) fn spawn(
        endpoint: Arc<Endpoint>,
        half: Half,
        capacity: usize,
    ) -> std::io::Result<Self> {
        let half = Arc::new(half);
        let (queue, watcher) = Queue::bounded(capacity);
        let queue = Arc::new(queue);

        {
            let half = Arc::clone(&half);
            let queue = Arc::clone(&queue);
            thread::Builder::new()
                .name("cryo-watch".to_string())
                .spawn(move || stream(&endpoint, &half, &queue))?;
        }

        Ok(Self {
            half,
            queue,
            watcher,
        })
    }

    pub(crate) fn watcher(&self) -> Watcher {
        self.watcher.clone()
    }

    pub(crate) fn close(&self) {
        self.half.close();
        self.queue.close();
    }
}

fn stream(endpoint: &Endpoint, half: &Half, queue: &Queue) {
    debug!("watch stream started");

    loop {
        let res = retry::execute(
            half.budget(),
            &[ErrorKind::Terminated],
            || half.receive(),
            || half.reconnect(endpoint),
        );

        match res {
            Ok(resp) => {
                if !queue.publish(resp) {
                    debug!("watch queue closed, stopping stream");
                    break;
                }
            }
            Err(err) if half.is_closed() => {
                debug!("watch connection closed: {err}");
                break;
            }
            Err(err) => {
                warn!("watch connection has been terminated due to an error: {err}");
                break;
            }
        }
    }

    queue.close();
    half.close();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_delivers_in_order_then_ends() {
        let (queue, watcher) = Queue::bounded(4);

        assert!(queue.publish(Response::ok("1")));
        assert!(queue.publish(Response::ok("2")));
        queue.close();

        assert!(!queue.publish(Response::ok("3")));
        assert_eq!(
            watcher.clone().collect::<Vec<_>>(),
            vec![Response::ok("1"), Response::ok("2")]
        );
        assert_eq!(watcher.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[test]
    fn full_queue_blocks_publisher() {
        let (queue, watcher) = Queue::bounded(1);
        let queue = Arc::new(queue);
        assert!(queue.publish(Response::ok("first")));

        let publisher = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.publish(Response::ok("second")))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!publisher.is_finished());

        assert_eq!(watcher.recv(), Some(Response::ok("first")));
        assert!(publisher.join().unwrap());
        assert_eq!(watcher.recv(), Some(Response::ok("second")));
    }

    #[test]
    fn dropped_watcher_stops_publishing() {
        let (queue, watcher) = Queue::bounded(1);
        drop(watcher);

        assert!(!queue.publish(Response::ok("lost")));
    }
}
