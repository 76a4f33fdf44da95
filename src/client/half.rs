use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use log::{debug, info, warn};
use uuid::Uuid;

use crate::{
    protocol::{ClientWire, Command, ErrorKind, Purpose, Response, WireError},
    retry::{RetryBudget, RetryPolicy},
    utilities::lock,
};

use super::{ClientConfig, ConnectError};

/// Where and as whom to connect.
pub(crate) struct Endpoint {
    config: ClientConfig,
    id: String,
}

impl Endpoint {
    pub(crate) fn new(config: ClientConfig) -> Self {
        let id = config
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self { config, id }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn dial(&self) -> Result<ClientWire, WireError> {
        ClientWire::dial(self.config.address(), &self.config.wire)
    }

    /// Dial once and identify ourselves for `purpose`.
    pub(crate) fn open(&self, purpose: Purpose) -> Result<ClientWire, ConnectError> {
        let wire = self.dial()?;
        handshake(&wire, &self.id, purpose)?;
        Ok(wire)
    }
}

pub(crate) fn handshake(wire: &ClientWire, id: &str, purpose: Purpose) -> Result<(), ConnectError> {
    wire.send(&Command::handshake(id, purpose))?;

    match receive(wire)? {
        Response::Err { description, .. } => {
            wire.close();
            Err(ConnectError::Handshake(description))
        }
        _ => {
            debug!("{purpose} handshake completed as {id}");
            Ok(())
        }
    }
}

/// Receive a response that the server owes us. A clean end of stream at a frame boundary
/// means the server hung up, so it is reported as a termination.
fn receive(wire: &ClientWire) -> Result<Response, WireError> {
    wire.receive().map_err(|err| match err.kind() {
        ErrorKind::Empty => {
            wire.close();
            WireError::terminated("server closed the connection")
        }
        _ => err,
    })
}

/// One role of a connection: the transport currently in use plus its retry budget.
///
/// The transport lives behind a slot so that a reconnect replaces it for every later
/// operation, while `close` can still reach it from another thread during blocking I/O.
pub(crate) struct Half {
    purpose: Purpose,
    slot: Mutex<Arc<ClientWire>>,
    budget: RetryBudget,
    closed: AtomicBool,
}

impl Half {
    pub(crate) fn new(purpose: Purpose, wire: ClientWire, policy: RetryPolicy) -> Self {
        Self {
            purpose,
            slot: Mutex::new(Arc::new(wire)),
            budget: RetryBudget::new(policy),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn budget(&self) -> &RetryBudget {
        &self.budget
    }

    fn current(&self) -> Arc<ClientWire> {
        Arc::clone(&lock(&self.slot))
    }

    /// Send `command` and wait for its response.
    pub(crate) fn round_trip(&self, command: &Command) -> Result<Response, WireError> {
        let wire = self.current();
        wire.send(command)?;
        receive(&wire)
    }

    pub(crate) fn receive(&self) -> Result<Response, WireError> {
        receive(&self.current())
    }

    /// Dial and handshake a fresh transport, then install it in place of the failed one.
    /// The retry budget is left untouched.
    pub(crate) fn reconnect(&self, endpoint: &Endpoint) -> Result<(), WireError> {
        if self.is_closed() {
            return Err(WireError::terminated("connection closed by client"));
        }

        warn!("trying to restore {} connection with server...", self.purpose);
        let wire = endpoint.open(self.purpose).map_err(|err| {
            warn!("failed to restore {} connection: {err}", self.purpose);
            WireError::terminated(format!(
                "failed to restore {} connection: {err}",
                self.purpose
            ))
        })?;

        let mut slot = lock(&self.slot);
        if self.is_closed() {
            wire.close();
            return Err(WireError::terminated("connection closed by client"));
        }
        *slot = Arc::new(wire);

        info!("{} connection restored successfully", self.purpose);
        Ok(())
    }

    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        debug!("closing {} connection", self.purpose);
        lock(&self.slot).close();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
