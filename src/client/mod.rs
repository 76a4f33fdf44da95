//! Self-healing connection to a Cryo server.
//!
//! A [`Client`] holds up to two connections to the same server:
//!
//! - The command connection, used by [`Client::fire`] for strict request/response traffic.
//!   One request is in flight at a time; concurrent callers queue up behind it.
//! - The watch connection, opened lazily by [`Client::watch`], which streams server-pushed
//!   responses to a [`Watcher`] from a background thread.
//!
//! Both connections announce the client's identity and their purpose in a handshake right
//! after they are dialed. When a connection is terminated mid-operation it is re-dialed,
//! re-handshaken and the operation retried, for as long as that connection's
//! [`RetryBudget`](crate::retry::RetryBudget) allows.
//!
//! # Example
//! ```rust,no_run
//! use cryo_client::{Client, ClientConfig, Command};
//!
//! let client = Client::connect(ClientConfig::new("localhost", 7379)).unwrap();
//! let resp = client.fire(&Command::new("PING", Vec::<String>::new()));
//! println!("{resp}");
//! ```
mod config;
mod half;
mod watch;

use std::sync::{Arc, Mutex};

use log::{debug, info};
use thiserror::Error;

use crate::{
    protocol::{Command, ErrorKind, Purpose, Response, ResponseError, WireError},
    retry::{self, RetryBudget, RetryPolicy},
    utilities::lock,
};

pub use config::{
    ClientConfig, DEFAULT_DIAL_ATTEMPTS, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_WATCH_QUEUE_CAPACITY,
};
pub use watch::Watcher;

use half::{Endpoint, Half, handshake};
use watch::Watch;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("could not connect to server after {attempts} retries: {source}")]
    NotEstablished { attempts: u32, source: WireError },

    #[error("could not complete the handshake: {0}")]
    Handshake(String),

    #[error("unexpected error when establishing server connection: {0}")]
    Wire(#[from] WireError),

    #[error("failed to start watch stream: {0}")]
    Spawn(#[from] std::io::Error),
}

pub struct Client {
    endpoint: Arc<Endpoint>,
    main: Half,
    in_flight: Mutex<()>,
    watch: Mutex<Option<Watch>>,
}

impl Client {
    /// Dial the server, retrying refused or unreachable dials, and complete the command
    /// handshake. A rejected handshake is not retried.
    pub fn connect(config: ClientConfig) -> Result<Self, ConnectError> {
        let endpoint = Arc::new(Endpoint::new(config));
        let config = endpoint.config();

        let attempts = config.dial_attempts;
        let budget = RetryBudget::new(RetryPolicy::new(attempts, config.command_retry.window));
        let wire = retry::execute(
            &budget,
            &[ErrorKind::NotEstablished],
            || endpoint.dial(),
            retry::no_recovery,
        )
        .map_err(|source| match source.kind() {
            ErrorKind::NotEstablished => ConnectError::NotEstablished { attempts, source },
            _ => ConnectError::Wire(source),
        })?;

        handshake(&wire, endpoint.id(), Purpose::Command)?;
        info!(
            "connected to {}:{} as {}",
            config.host,
            config.port,
            endpoint.id()
        );

        let main = Half::new(Purpose::Command, wire, config.command_retry);
        Ok(Self {
            endpoint,
            main,
            in_flight: Mutex::new(()),
            watch: Mutex::new(None),
        })
    }

    /// Identity announced to the server.
    pub fn id(&self) -> &str {
        self.endpoint.id()
    }

    /// Send `command` and wait for its response.
    ///
    /// A terminated connection is restored and the command resent while the command
    /// connection's retry budget allows. Failures never surface as errors: they come back as
    /// a [`Response::Err`] describing what went wrong.
    pub fn fire(&self, command: &Command) -> Response {
        let _in_flight = lock(&self.in_flight);

        let res = retry::execute(
            self.main.budget(),
            &[ErrorKind::Terminated],
            || self.main.round_trip(command),
            || self.main.reconnect(&self.endpoint),
        );

        match res {
            Ok(resp) => resp,
            Err(err) => {
                debug!("command '{}' failed: {err}", command.cmd);
                Response::from(&err)
            }
        }
    }

    /// Parse a whitespace separated line such as `SET key value` and fire it.
    pub fn fire_str(&self, line: &str) -> Response {
        match Command::try_from(line) {
            Ok(command) => self.fire(&command),
            Err(e) => Response::err(ResponseError::Command, e.to_string()),
        }
    }

    /// Open the watch stream, or return the existing one.
    pub fn watch(&self) -> Result<Watcher, ConnectError> {
        let mut watch = lock(&self.watch);
        if let Some(watch) = watch.as_ref() {
            return Ok(watch.watcher());
        }

        if self.main.is_closed() {
            return Err(ConnectError::Wire(WireError::terminated(
                "connection closed by client",
            )));
        }

        let config = self.endpoint.config();
        let wire = self.endpoint.open(Purpose::Watch).map_err(|err| match err {
            ConnectError::Wire(source) if source.kind() == ErrorKind::NotEstablished => {
                ConnectError::NotEstablished {
                    attempts: 1,
                    source,
                }
            }
            err => err,
        })?;

        let half = Half::new(Purpose::Watch, wire, config.watch_retry);
        let stream = Watch::spawn(
            Arc::clone(&self.endpoint),
            half,
            config.watch_queue_capacity,
        )?;
        let watcher = stream.watcher();
        *watch = Some(stream);

        info!("watch stream established");
        Ok(watcher)
    }

    /// Close both connections and end the watch stream, if any. Safe to call repeatedly.
    pub fn close(&self) {
        self.main.close();
        if let Some(watch) = lock(&self.watch).as_ref() {
            watch.close();
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}
