//! Computed cells.
//!
//! A computed cell is a cached derived value that re-evaluates only when a
//! dependency actually changed.
//!
//! # How Computed Cells Work
//!
//! 1. On first access, the cell runs its closure inside a tracking frame
//!    and caches the result together with the observed dependency set.
//!
//! 2. When accessed again with no intervening dependency change, the cache
//!    is returned and the closure is not invoked.
//!
//! 3. The propagation pass marks the cell `Dirty` when a direct dependency
//!    really changed, or `MaybeDirty` when only a transitive dependency
//!    might have. `MaybeDirty` cells revalidate on next access by pulling
//!    dependency versions; they recompute only if something really moved.
//!
//! 4. If the recomputed value equals the cached one, the cell's output
//!    version does not move, so downstream derivations stay clean: change
//!    suppression travels through computed chains, not just the cell that
//!    originated the write.
//!
//! # Failures
//!
//! A failing closure is not an abort. The `Err` is cached as the cell's
//! current state and handed back to every reader until a dependency change
//! invalidates it. Re-entrant evaluation (a cycle in the dependency graph)
//! is detected through a currently-evaluating marker and reported as
//! [`EvalError::Cycle`] instead of looping.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::derivation::{CellId, Derivation, DerivationId, Source};
use super::error::EvalError;
use super::runtime::Runtime;
use super::tracker;

/// Dirtiness of a computed cell's cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// A transitive dependency might have changed; revalidate before
    /// trusting the cache.
    MaybeDirty,

    /// A direct dependency really changed; the cell must recompute.
    Dirty,
}

type ComputeFn<T> = dyn Fn() -> Result<T, EvalError> + Send + Sync;

/// A cached derived value that recomputes only when dependencies change.
pub struct Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

struct ComputedInner<T> {
    /// Identity as a reader of upstream cells.
    derivation: DerivationId,

    /// Identity of the output slot downstream derivations read.
    out: CellId,

    /// The compute closure.
    compute: Box<ComputeFn<T>>,

    /// Cached result of the last evaluation (`None` before the first).
    cached: RwLock<Option<Result<T, EvalError>>>,

    /// Current dirtiness.
    state: RwLock<ComputedState>,

    /// Re-entrancy marker for cycle detection.
    evaluating: AtomicBool,

    /// Version of the output slot; moves only when the value really changes.
    out_version: AtomicU64,
}

impl<T> Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a computed cell from an infallible closure.
    ///
    /// The closure does not run until the first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::try_new(move || Ok(compute()))
    }

    /// Create a computed cell from a fallible closure.
    ///
    /// An `Err` result is cached like any other value and handed back to
    /// readers until a dependency change invalidates it.
    pub fn try_new<F>(compute: F) -> Self
    where
        F: Fn() -> Result<T, EvalError> + Send + Sync + 'static,
    {
        let inner = Arc::new(ComputedInner {
            derivation: DerivationId::new(),
            out: CellId::new(),
            compute: Box::new(compute),
            cached: RwLock::new(None),
            state: RwLock::new(ComputedState::Dirty),
            evaluating: AtomicBool::new(false),
            out_version: AtomicU64::new(0),
        });

        let derivation_arc: Arc<dyn Derivation> = inner.clone();
        let source_arc: Arc<dyn Source> = inner.clone();
        let as_derivation: Weak<dyn Derivation> = Arc::downgrade(&derivation_arc);
        let as_source: Weak<dyn Source> = Arc::downgrade(&source_arc);
        Runtime::register_derivation(inner.derivation, as_derivation);
        Runtime::register_source(inner.out, as_source);
        Runtime::register_output(inner.derivation, inner.out);

        Self { inner }
    }

    /// Get the current value, recomputing or revalidating if necessary.
    ///
    /// Inside a tracking frame this registers the running derivation as a
    /// dependent of this cell's output (transitive tracking).
    pub fn get(&self) -> Result<T, EvalError> {
        let result = self.inner.ensure_current();
        tracker::record_read(
            self.inner.out,
            self.inner.out_version.load(Ordering::SeqCst),
        );
        result
    }

    /// The current dirtiness of the cache.
    pub fn state(&self) -> ComputedState {
        *self.inner.state.read()
    }

    /// Whether the cell has evaluated at least once.
    pub fn has_value(&self) -> bool {
        self.inner.cached.read().is_some()
    }
}

impl<T> ComputedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn ensure_current(&self) -> Result<T, EvalError> {
        let state = *self.state.read();
        match state {
            ComputedState::Clean => self.cached_value(),
            ComputedState::Dirty => self.refresh_value(),
            ComputedState::MaybeDirty => {
                if self.inputs_moved() {
                    self.refresh_value()
                } else {
                    *self.state.write() = ComputedState::Clean;
                    self.cached_value()
                }
            }
        }
    }

    fn cached_value(&self) -> Result<T, EvalError> {
        if let Some(value) = self.cached.read().clone() {
            return value;
        }
        self.refresh_value()
    }

    /// Pull dependency versions to decide whether a `MaybeDirty` cache is
    /// actually stale. Forces upstream computed cells current first.
    fn inputs_moved(&self) -> bool {
        let deps = Runtime::dependencies_of(self.derivation);
        for (cell, seen) in deps {
            match Runtime::lookup_source(cell) {
                Some(source) => {
                    if source.pull_version() != seen {
                        return true;
                    }
                }
                // dependency went away; recompute to rebuild the edge set
                None => return true,
            }
        }
        false
    }

    fn refresh_value(&self) -> Result<T, EvalError> {
        if self.evaluating.swap(true, Ordering::SeqCst) {
            return Err(EvalError::Cycle { cell: self.out });
        }

        struct EvalGuard<'a>(&'a AtomicBool);
        impl Drop for EvalGuard<'_> {
            fn drop(&mut self) {
                self.0.store(false, Ordering::SeqCst);
            }
        }
        let _guard = EvalGuard(&self.evaluating);

        let (result, reads) = tracker::tracked(self.derivation, || (self.compute)());
        Runtime::set_dependencies(self.derivation, reads);

        let changed = {
            let cached = self.cached.read();
            match (cached.as_ref(), &result) {
                (Some(Ok(old)), Ok(new)) => old != new,
                _ => true,
            }
        };

        *self.cached.write() = Some(result.clone());
        *self.state.write() = ComputedState::Clean;
        if changed {
            self.out_version.fetch_add(1, Ordering::SeqCst);
        }

        result
    }
}

impl<T> Derivation for ComputedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn id(&self) -> DerivationId {
        self.derivation
    }

    fn is_eager(&self) -> bool {
        false
    }

    fn is_disposed(&self) -> bool {
        false
    }

    fn output(&self) -> Option<CellId> {
        Some(self.out)
    }

    fn mark_dirty(&self) {
        *self.state.write() = ComputedState::Dirty;
    }

    fn mark_maybe_dirty(&self) {
        let mut state = self.state.write();
        if *state == ComputedState::Clean {
            *state = ComputedState::MaybeDirty;
        }
    }

    fn refresh(&self) -> bool {
        let before = self.out_version.load(Ordering::SeqCst);
        let _ = self.refresh_value();
        self.out_version.load(Ordering::SeqCst) != before
    }
}

impl<T> Source for ComputedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn cell_id(&self) -> CellId {
        self.out
    }

    fn version(&self) -> u64 {
        self.out_version.load(Ordering::SeqCst)
    }

    fn pull_version(&self) -> u64 {
        let _ = self.ensure_current();
        self.out_version.load(Ordering::SeqCst)
    }

    fn commit(&self) -> bool {
        // computed outputs are never staged by actions
        false
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        Runtime::unregister_derivation(self.derivation);
        Runtime::unregister_source(self.out);
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .finish()
    }
}
