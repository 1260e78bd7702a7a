//! Reactions.
//!
//! A reaction is a side-effecting subscriber that re-runs whenever a
//! tracked dependency changes. Reactions are how reactive state reaches
//! the outside world: refreshing a view, logging, writing caches.
//!
//! # How Reactions Work
//!
//! 1. On creation, the body runs once inside a tracking frame to establish
//!    its initial dependencies.
//!
//! 2. When an action commits a real change to any dependency, the
//!    propagation pass schedules the reaction exactly once, no matter how
//!    many of its dependencies changed in that action.
//!
//! 3. Every re-run re-tracks from scratch and fully replaces the
//!    dependency set, so conditional reads rewire the subscription.
//!
//! # Failures
//!
//! A failing body is reported to the handler installed with
//! [`Runtime::set_error_handler`] and does not abort the propagation pass;
//! the remaining scheduled reactions still run.
//!
//! # Disposal
//!
//! `dispose` makes the reaction permanently inert and removes it from
//! every cell's subscriber set. Disposal is safe at any time, including
//! from inside the reaction's own running body; a run already scheduled
//! for a disposed reaction is dropped, not executed. Dropping the last
//! handle retires the reaction the same way.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::derivation::{CellId, Derivation, DerivationId};
use super::error::BoxError;
use super::runtime::Runtime;
use super::tracker;

type ReactionFn = dyn Fn() -> Result<(), BoxError> + Send + Sync;

/// A side-effecting subscriber that re-runs when dependencies change.
///
/// The handle is cheap to clone; all clones share one reaction. The
/// reaction stays subscribed for as long as any handle is alive or until
/// [`Reaction::dispose`] is called.
#[must_use = "a reaction unsubscribes when its last handle is dropped"]
pub struct Reaction {
    inner: Arc<ReactionInner>,
}

struct ReactionInner {
    /// Identity in the dependency graph.
    id: DerivationId,

    /// The side-effecting body.
    body: Box<ReactionFn>,

    /// Permanently inert once set.
    disposed: AtomicBool,

    /// Number of completed body runs.
    runs: AtomicU64,
}

impl Reaction {
    /// Create a reaction from an infallible body.
    ///
    /// The body runs once immediately to establish initial dependencies.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::try_new(move || {
            body();
            Ok(())
        })
    }

    /// Create a reaction from a fallible body.
    ///
    /// Failures go to the handler installed with
    /// [`Runtime::set_error_handler`].
    pub fn try_new<F>(body: F) -> Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let inner = Arc::new(ReactionInner {
            id: DerivationId::new(),
            body: Box::new(body),
            disposed: AtomicBool::new(false),
            runs: AtomicU64::new(0),
        });

        let derivation_arc: Arc<dyn Derivation> = inner.clone();
        let weak: Weak<dyn Derivation> = Arc::downgrade(&derivation_arc);
        Runtime::register_derivation(inner.id, weak);

        // initial run establishes the dependency set
        inner.execute();

        Self { inner }
    }

    /// Permanently retire the reaction.
    ///
    /// Unsubscribes from every tracked cell; runs already scheduled in an
    /// in-flight propagation pass are dropped. Safe to call from inside
    /// the reaction's own body.
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            Runtime::unregister_derivation(self.inner.id);
        }
    }

    /// Whether the reaction has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Number of times the body has run.
    pub fn runs(&self) -> u64 {
        self.inner.runs.load(Ordering::SeqCst)
    }
}

impl ReactionInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        self.runs.fetch_add(1, Ordering::SeqCst);

        let (result, reads) = tracker::tracked(self.id, || (self.body)());

        // the body may have disposed its own reaction; in that case the
        // edges were already torn down and must not be re-added
        if !self.disposed.load(Ordering::SeqCst) {
            Runtime::set_dependencies(self.id, reads);
        }

        if let Err(err) = result {
            Runtime::report_error(&err);
        }
    }
}

impl Derivation for ReactionInner {
    fn id(&self) -> DerivationId {
        self.id
    }

    fn is_eager(&self) -> bool {
        true
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn output(&self) -> Option<CellId> {
        None
    }

    fn mark_dirty(&self) {}

    fn mark_maybe_dirty(&self) {}

    fn refresh(&self) -> bool {
        self.execute();
        false
    }
}

impl Drop for ReactionInner {
    fn drop(&mut self) {
        if !self.disposed.load(Ordering::SeqCst) {
            Runtime::unregister_derivation(self.id);
        }
    }
}

impl Clone for Reaction {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Reaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reaction")
            .field("runs", &self.runs())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
