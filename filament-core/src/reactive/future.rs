//! Observable futures.
//!
//! An observable future wraps one asynchronous operation and exposes its
//! lifecycle — pending, fulfilled, or rejected — as trackable reactive
//! state. A computed cell or reaction that reads the tracker re-runs
//! automatically when the operation settles.
//!
//! # Lifecycle
//!
//! A tracker is born `Pending` and transitions exactly once, to
//! `Fulfilled` or `Rejected`. The transition is performed by a
//! [`Completer`], a move-only handle whose settle methods consume it, so a
//! second transition is unrepresentable by construction. Starting a new
//! operation means constructing a new tracker; a settled one never mutates
//! again.
//!
//! Settlement writes the terminal state through the normal action path, so
//! downstream derivations observe status and value as a single atomic
//! update, never a torn pair. Rejection is surfaced as data from the read
//! accessors; nothing is thrown.

use std::future::Future;

use super::action::Action;
use super::observable::Observable;

/// Lifecycle of a tracked asynchronous operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncState<T, E> {
    /// The operation has not settled yet.
    Pending,
    /// The operation completed with a value.
    Fulfilled(T),
    /// The operation failed with an error.
    Rejected(E),
}

impl<T, E> AsyncState<T, E> {
    /// The status tag without the payload.
    pub fn status(&self) -> AsyncStatus {
        match self {
            Self::Pending => AsyncStatus::Pending,
            Self::Fulfilled(_) => AsyncStatus::Fulfilled,
            Self::Rejected(_) => AsyncStatus::Rejected,
        }
    }

    /// Whether the operation is still in flight.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Whether the operation reached a terminal state.
    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }
}

/// Payload-free status tag of an [`AsyncState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncStatus {
    /// Not settled yet.
    Pending,
    /// Completed with a value.
    Fulfilled,
    /// Failed with an error.
    Rejected,
}

/// Reactive wrapper around one asynchronous operation.
pub struct ObservableFuture<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    state: Observable<AsyncState<T, E>>,
}

impl<T, E> ObservableFuture<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a pending tracker and the one-shot handle that settles it.
    ///
    /// Use this when the host environment delivers completion through its
    /// own callback mechanism: hand the [`Completer`] to the completion
    /// path and keep the tracker for readers.
    pub fn pending() -> (Self, Completer<T, E>) {
        let state = Observable::new(AsyncState::Pending);
        (
            Self {
                state: state.clone(),
            },
            Completer { state },
        )
    }

    /// Track a future, settling when it completes.
    ///
    /// The future is spawned on the ambient tokio runtime; this must be
    /// called from within one. The settlement write happens on the runtime
    /// worker, relying on the cells' internal synchronization — a host
    /// that needs strict single-timeline ordering should route completion
    /// through [`ObservableFuture::pending`] and settle on its own thread.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (tracker, completer) = Self::pending();
        tokio::spawn(async move {
            match future.await {
                Ok(value) => completer.fulfill(value),
                Err(error) => completer.reject(error),
            }
        });
        tracker
    }

    /// The full current state. A tracked read.
    pub fn state(&self) -> AsyncState<T, E> {
        self.state.get()
    }

    /// The status tag. A tracked read.
    pub fn status(&self) -> AsyncStatus {
        self.state.get().status()
    }

    /// The fulfilled value, if settled successfully. A tracked read.
    pub fn value(&self) -> Option<T> {
        match self.state.get() {
            AsyncState::Fulfilled(value) => Some(value),
            _ => None,
        }
    }

    /// The rejection error, if settled with a failure. A tracked read.
    pub fn error(&self) -> Option<E> {
        match self.state.get() {
            AsyncState::Rejected(error) => Some(error),
            _ => None,
        }
    }
}

impl<T, E> Clone for ObservableFuture<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T, E> std::fmt::Debug for ObservableFuture<T, E>
where
    T: Clone + PartialEq + Send + Sync + std::fmt::Debug + 'static,
    E: Clone + PartialEq + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableFuture")
            .field("state", &self.state.get_untracked())
            .finish()
    }
}

/// One-shot handle that settles an [`ObservableFuture`].
///
/// Settling consumes the handle, so each tracker transitions at most once.
#[must_use = "an unsettled completer leaves its tracker pending forever"]
pub struct Completer<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    state: Observable<AsyncState<T, E>>,
}

impl<T, E> Completer<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    /// Settle the tracker as fulfilled.
    pub fn fulfill(self, value: T) {
        self.settle(AsyncState::Fulfilled(value));
    }

    /// Settle the tracker as rejected.
    pub fn reject(self, error: E) {
        self.settle(AsyncState::Rejected(error));
    }

    fn settle(self, terminal: AsyncState<T, E>) {
        debug_assert!(self.state.get_untracked().is_pending());
        // one atomic transition: status and payload land together
        Action::run(|| self.state.set(terminal));
    }
}
