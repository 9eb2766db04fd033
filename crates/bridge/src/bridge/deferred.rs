use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::oneshot;

use crate::error::Error;

/// Failure reported to the host. Only the message crosses the boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Rejection {
    pub message: String,
}

impl Rejection {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<Error> for Rejection {
    fn from(value: Error) -> Self {
        Self::new(value.to_string())
    }
}

pub type Settlement<V> = Result<V, Rejection>;

/// Write half of a [`Deferred`]. Consumed by [`Settler::settle`], so a
/// deferred is settled at most once.
#[derive(Debug)]
pub struct Settler<V>(oneshot::Sender<Settlement<V>>);

impl<V> Settler<V> {
    pub fn settle(self, outcome: Settlement<V>) {
        // the host may have dropped the deferred; nobody is left to tell
        let _ = self.0.send(outcome);
    }

    pub fn resolve(self, value: V) {
        self.settle(Ok(value));
    }

    pub fn reject(self, rejection: impl Into<Rejection>) {
        self.settle(Err(rejection.into()));
    }
}

/// Host-visible result of a bridged call.
///
/// Resolves or rejects exactly once. Awaiting it never blocks the thread that
/// polls it.
#[derive(Debug)]
#[must_use = "a deferred does nothing unless awaited"]
pub struct Deferred<V> {
    state: State<V>,
}

#[derive(Debug)]
enum State<V> {
    Settled(Option<Settlement<V>>),
    Pending(oneshot::Receiver<Settlement<V>>),
}

impl<V> Unpin for Deferred<V> {}

impl<V> Deferred<V> {
    pub fn channel() -> (Settler<V>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            Settler(tx),
            Self {
                state: State::Pending(rx),
            },
        )
    }

    pub const fn resolved(value: V) -> Self {
        Self {
            state: State::Settled(Some(Ok(value))),
        }
    }

    pub fn rejected(rejection: impl Into<Rejection>) -> Self {
        Self {
            state: State::Settled(Some(Err(rejection.into()))),
        }
    }
}

impl<V> Future for Deferred<V> {
    type Output = Settlement<V>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            State::Settled(outcome) => Poll::Ready(
                outcome
                    .take()
                    .unwrap_or_else(|| Err(Rejection::new("deferred polled after completion"))),
            ),
            State::Pending(rx) => Pin::new(rx).poll(cx).map(|outcome| {
                outcome.unwrap_or_else(|_| {
                    Err(Rejection::new("execution unit ended without settling"))
                })
            }),
        }
    }
}
