use std::{future::Future, thread};

use tokio::{
    runtime::{Builder, Runtime},
    sync::mpsc,
    task::{JoinSet, LocalSet},
};
use tracing::{debug, warn};

use super::channel::{HostChannel, HostRequest, MissingCapability};
use crate::{error::Result, host::Capabilities};

/// The host side of the boundary: a single cooperative thread that owns the
/// capability directory and answers [`HostRequest`]s.
///
/// The runtime is bound to the thread that created it. Requests are only
/// served while [`HostRuntime::block_on`] is driving a future, and each one
/// runs as its own local task so a slow host object never holds up others.
pub struct HostRuntime {
    runtime: Runtime,
    requests: mpsc::UnboundedReceiver<HostRequest>,
    channel: HostChannel,
    capabilities: Capabilities,
}

impl HostRuntime {
    /// # Errors
    /// Returns an error if the executor cannot be built.
    pub fn new(capabilities: Capabilities) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let (channel, requests) = HostChannel::new(thread::current().id());
        Ok(Self {
            runtime,
            requests,
            channel,
            capabilities,
        })
    }

    /// Handle given to the sandbox for calls back into this host.
    #[must_use]
    pub fn channel(&self) -> HostChannel {
        self.channel.clone()
    }

    /// Drives `fut` to completion on the host thread while serving host
    /// requests issued by sandbox execution units.
    ///
    /// Host calls already started when `fut` completes run to completion
    /// before this returns, so their units still get an answer. Requests that
    /// arrive after that stay queued until the next `block_on`.
    pub fn block_on<F: Future>(&mut self, fut: F) -> F::Output {
        let Self {
            runtime,
            requests,
            capabilities,
            ..
        } = self;
        let local = LocalSet::new();
        local.block_on(runtime, async move {
            let mut in_flight = JoinSet::new();
            tokio::pin!(fut);
            let out = loop {
                tokio::select! {
                    biased;
                    out = &mut fut => break out,
                    Some(request) = requests.recv() => {
                        dispatch(request, capabilities, &mut in_flight);
                    }
                    Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                }
            };
            if !in_flight.is_empty() {
                debug!(pending = in_flight.len(), "finishing in-flight host calls");
            }
            while in_flight.join_next().await.is_some() {}
            out
        })
    }
}

fn dispatch(request: HostRequest, capabilities: &Capabilities, in_flight: &mut JoinSet<()>) {
    let HostRequest {
        target,
        method,
        args,
        reply,
    } = request;
    let Some(object) = capabilities.get(&target) else {
        warn!(host.target = %target, host.method = %method, "no such host capability");
        let _ = reply.send(Err(Box::new(MissingCapability(target))));
        return;
    };
    in_flight.spawn_local(async move {
        let outcome = object.call(&method, args).await;
        debug!(
            host.target = %target,
            host.method = %method,
            ok = outcome.is_ok(),
            "host call finished"
        );
        let _ = reply.send(outcome);
    });
}
