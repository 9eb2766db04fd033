//! The call boundary between host and sandbox.
//!
//! Host to sandbox: [`Bridge::spawn`] runs blocking work on a sandbox
//! execution unit and hands the host a [`Deferred`]. Sandbox to host:
//! [`HostChannel::call`] sends a [`HostRequest`] to the [`HostRuntime`] and
//! parks the calling unit until the single-use reply fires.

mod channel;
mod deferred;
mod host_runtime;

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{Dispatch, debug, error};

pub use channel::{HostChannel, HostReply, HostRequest};
pub use deferred::{Deferred, Rejection, Settlement, Settler};
pub use host_runtime::HostRuntime;

use crate::error::Result;

struct UnitPool {
    runtime: Option<Runtime>,
    handle: Handle,
    dispatch: Dispatch,
}

impl Drop for UnitPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Runs bridged calls on sandbox execution units.
///
/// Calls started through the same bridge are independent: there is no
/// ordering between them and none can be cancelled once started.
#[derive(Clone)]
pub struct Bridge {
    pool: Arc<UnitPool>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge").finish_non_exhaustive()
    }
}

impl Bridge {
    /// Creates a bridge whose units log into `dispatch`. `threads == 0` lets
    /// the runtime pick its worker count.
    ///
    /// # Errors
    /// Returns an error if the unit runtime cannot be built.
    pub fn new(threads: usize, dispatch: Dispatch) -> Result<Self> {
        let runtime = match threads {
            0 => Builder::new_multi_thread()
                .thread_name("flowbridge-unit")
                .enable_all()
                .build()?,
            n => Builder::new_multi_thread()
                .worker_threads(n)
                .thread_name("flowbridge-unit")
                .enable_all()
                .build()?,
        };
        let handle = runtime.handle().clone();
        Ok(Self {
            pool: Arc::new(UnitPool {
                runtime: Some(runtime),
                handle,
                dispatch,
            }),
        })
    }

    /// Starts `work` on a fresh execution unit and returns immediately.
    ///
    /// The deferred resolves with the work's value, or rejects with its error
    /// message. A panic inside `work` rejects the deferred instead of taking
    /// the module down.
    pub fn spawn<V, F>(&self, name: &'static str, work: F) -> Deferred<V>
    where
        V: Send + 'static,
        F: FnOnce() -> Result<V> + Send + 'static,
    {
        let (settler, deferred) = Deferred::channel();
        let dispatch = self.pool.dispatch.clone();
        self.pool.handle.spawn_blocking(move || {
            tracing::dispatcher::with_default(&dispatch, || {
                debug!(call = name, "bridged call started");
                let outcome = match std::panic::catch_unwind(AssertUnwindSafe(work)) {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => {
                        debug!(call = name, error = %err, "bridged call rejected");
                        Err(Rejection::from(err))
                    }
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        error!(call = name, %message, "execution unit panicked");
                        Err(Rejection::new(message))
                    }
                };
                settler.settle(outcome);
            });
        });
        deferred
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "execution unit panicked".to_owned())
}
