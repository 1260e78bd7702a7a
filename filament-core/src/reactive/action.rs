//! Action scopes.
//!
//! An action is a transactional boundary for writes: every observable
//! write performed inside one action is staged, and dependents see a
//! single propagation pass when the outermost scope exits. A cell written
//! several times inside one action is observed as a single transition from
//! its pre-action value to its final value; a cell restored to its
//! pre-action value is observed as no change at all.
//!
//! A bare `Observable::set` outside any scope behaves as its own
//! single-write action: propagation runs synchronously before `set`
//! returns.
//!
//! Writes performed by reaction bodies while a propagation pass is running
//! are deferred into follow-up batches, drained after the current pass
//! completes. Two passes never interleave.

use std::cell::{Cell, RefCell};
use std::sync::Weak;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use super::derivation::{CellId, Source};
use super::runtime::Runtime;

thread_local! {
    static DEPTH: Cell<usize> = Cell::new(0);
    static PENDING: RefCell<IndexMap<CellId, Weak<dyn Source>>> =
        RefCell::new(IndexMap::new());
    static PROPAGATING: Cell<bool> = Cell::new(false);
    static DEFERRED: RefCell<Vec<CellId>> = RefCell::new(Vec::new());
}

/// Transactional scope for batched writes.
pub struct Action;

impl Action {
    /// Run `f` inside an action scope.
    ///
    /// Scopes are re-entrant: nested `run` calls merge into the outermost
    /// one, and the single commit covers the union of all cells written
    /// anywhere in the scope.
    pub fn run<R>(f: impl FnOnce() -> R) -> R {
        DEPTH.with(|depth| depth.set(depth.get() + 1));

        struct DepthGuard;
        impl Drop for DepthGuard {
            fn drop(&mut self) {
                DEPTH.with(|depth| depth.set(depth.get() - 1));
            }
        }

        let result = {
            let _guard = DepthGuard;
            f()
        };

        if !Self::in_action() {
            commit_and_propagate();
        }
        result
    }

    /// Check whether an action scope is open on this thread.
    pub fn in_action() -> bool {
        DEPTH.with(|depth| depth.get() > 0)
    }
}

/// Stage a cell whose value was rewritten inside the current action.
///
/// The first write wins the staging slot; commit asks the cell itself to
/// compare its final value against the pre-action baseline.
pub(crate) fn note_write(cell: CellId, source: Weak<dyn Source>) {
    PENDING.with(|pending| {
        pending.borrow_mut().entry(cell).or_insert(source);
    });
}

fn commit_and_propagate() {
    let staged = PENDING.with(|pending| std::mem::take(&mut *pending.borrow_mut()));
    if staged.is_empty() {
        return;
    }

    let mut changed: SmallVec<[CellId; 8]> = SmallVec::new();
    for (cell, source) in staged {
        if let Some(source) = source.upgrade() {
            if source.commit() {
                changed.push(cell);
            }
        }
    }
    if changed.is_empty() {
        return;
    }

    if PROPAGATING.with(|flag| flag.get()) {
        // a reaction body wrote during a pass; hand the batch to the outer loop
        DEFERRED.with(|deferred| deferred.borrow_mut().extend(changed));
        return;
    }

    PROPAGATING.with(|flag| flag.set(true));
    struct PropagationGuard;
    impl Drop for PropagationGuard {
        fn drop(&mut self) {
            PROPAGATING.with(|flag| flag.set(false));
        }
    }
    let _guard = PropagationGuard;

    let mut batch = changed;
    loop {
        trace!(cells = batch.len(), "committing action batch");
        Runtime::run_pass(&batch);

        batch = DEFERRED.with(|deferred| deferred.borrow_mut().drain(..).collect());
        if batch.is_empty() {
            break;
        }
    }
}
