use std::{
    sync::Arc,
    thread::{self, ThreadId},
};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::{
    error::{Error, Result},
    host::{BoxError, UnsupportedMethod},
    value::Value,
};

pub type HostReply = core::result::Result<Value, BoxError>;

/// A call addressed to a named host object, answered through `reply`.
#[derive(Debug)]
pub struct HostRequest {
    pub target: String,
    pub method: String,
    pub args: Vec<Value>,
    pub reply: oneshot::Sender<HostReply>,
}

/// Sent back by the host runtime when `target` names no registered object.
#[derive(Debug, thiserror::Error)]
#[error("unknown host capability {0}")]
pub(crate) struct MissingCapability(pub(crate) String);

/// Sandbox end of the host boundary.
///
/// Cloned freely into execution units. Every call blocks the calling unit
/// until the host answers, so it must never be used from the host thread.
#[derive(Debug, Clone)]
pub struct HostChannel {
    tx: mpsc::UnboundedSender<HostRequest>,
    host_thread: Arc<ThreadId>,
}

impl HostChannel {
    pub(crate) fn new(host_thread: ThreadId) -> (Self, mpsc::UnboundedReceiver<HostRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                host_thread: Arc::new(host_thread),
            },
            rx,
        )
    }

    fn on_host_thread(&self) -> bool {
        thread::current().id() == *self.host_thread
    }

    /// Invokes `method` on the host object `target` and waits for its answer.
    ///
    /// # Errors
    /// [`Error::HostThreadBlocked`] when called on the host thread,
    /// [`Error::HostUnavailable`] when the host stopped serving,
    /// [`Error::UnknownCapability`] for unregistered targets,
    /// [`Error::Unimplemented`] when the object lacks `method`, and
    /// [`Error::Delegate`] with the host's message for any other failure.
    pub fn call(&self, target: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        if self.on_host_thread() {
            return Err(Error::HostThreadBlocked {
                target: target.to_owned(),
                method: method.to_owned(),
            });
        }

        debug!(host.target = target, host.method = method, "calling host");
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HostRequest {
                target: target.to_owned(),
                method: method.to_owned(),
                args,
                reply,
            })
            .map_err(|_| Error::HostUnavailable)?;

        rx.blocking_recv()
            .map_err(|_| Error::HostUnavailable)?
            .map_err(|e| host_error(target, method, e))
    }
}

fn host_error(target: &str, method: &str, err: BoxError) -> Error {
    let err = match err.downcast::<UnsupportedMethod>() {
        Ok(_) => {
            return Error::Unimplemented {
                operation: format!("{target}.{method}"),
                variant: "the host",
            };
        }
        Err(err) => err,
    };
    match err.downcast::<MissingCapability>() {
        Ok(missing) => Error::UnknownCapability(missing.0),
        Err(err) => Error::Delegate(err.to_string()),
    }
}
