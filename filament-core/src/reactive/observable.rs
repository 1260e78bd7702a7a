//! Observable cells.
//!
//! An observable cell is the fundamental reactive primitive: a single
//! mutable slot whose reads register dependency edges and whose writes
//! drive propagation.
//!
//! # How Cells Work
//!
//! 1. When a cell is read inside a tracking frame (a computed cell or
//!    reaction run), the read is recorded and becomes a dependency edge.
//!
//! 2. Writes are equality-gated: writing the value a cell already holds is
//!    a complete no-op. This is the core optimization that keeps redundant
//!    recompute storms from ever starting.
//!
//! 3. An effective write stages the cell in the surrounding action; the
//!    first write snapshots the pre-action value so commit can tell
//!    whether the cell changed *over the whole action*, not per write.
//!
//! # Memory Layout
//!
//! The public type is a cheap-to-clone handle; the value, the staged
//! baseline, and the version counter live in shared inner state. Readers
//! receive clones of the value, never references into the cell.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::action::{self, Action};
use super::derivation::{CellId, Source};
use super::runtime::Runtime;
use super::tracker;

/// A reactive cell holding a value of type `T`.
///
/// # Example
///
/// ```rust,ignore
/// let count = Observable::new(0);
///
/// // Read the value (registers a dependency when tracked)
/// let value = count.get();
///
/// // Update the value (propagates to dependents)
/// count.set(5);
/// ```
pub struct Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<ObservableInner<T>>,
}

struct ObservableInner<T> {
    /// Identity of this cell in the dependency graph.
    id: CellId,

    /// The current value.
    value: RwLock<T>,

    /// Pre-action snapshot, present only while a write is staged.
    baseline: Mutex<Option<T>>,

    /// Bumped exactly once per committed net change.
    version: AtomicU64,
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new cell with the given initial value.
    pub fn new(value: T) -> Self {
        let inner = Arc::new(ObservableInner {
            id: CellId::new(),
            value: RwLock::new(value),
            baseline: Mutex::new(None),
            version: AtomicU64::new(0),
        });
        let source_arc: Arc<dyn Source> = inner.clone();
        let weak: Weak<dyn Source> = Arc::downgrade(&source_arc);
        Runtime::register_source(inner.id, weak);
        Self { inner }
    }

    /// The cell's identity in the dependency graph.
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// Inside a tracking frame this registers the running derivation as a
    /// dependent of the cell. The caller receives a snapshot clone.
    pub fn get(&self) -> T {
        let value = self.inner.value.read().clone();
        tracker::record_read(self.inner.id, self.inner.version.load(Ordering::SeqCst));
        value
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value.
    ///
    /// Writing an equal value is a no-op: no version bump, no propagation.
    /// Outside an action scope the write is its own single-write action and
    /// propagation completes before `set` returns; inside a scope the write
    /// is staged until the outermost scope exits.
    pub fn set(&self, value: T) {
        Action::run(|| self.stage(value));
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.get_untracked());
        self.set(next);
    }

    /// The cell's version counter; moves exactly once per net change.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    fn stage(&self, value: T) {
        let mut slot = self.inner.value.write();
        if *slot == value {
            return;
        }
        let previous = std::mem::replace(&mut *slot, value);
        drop(slot);

        {
            let mut baseline = self.inner.baseline.lock();
            if baseline.is_none() {
                *baseline = Some(previous);
            }
        }

        let source_arc: Arc<dyn Source> = self.inner.clone();
        let weak: Weak<dyn Source> = Arc::downgrade(&source_arc);
        action::note_write(self.inner.id, weak);
    }
}

impl<T> Source for ObservableInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn cell_id(&self) -> CellId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    fn pull_version(&self) -> u64 {
        // observable cells are always current
        self.version.load(Ordering::SeqCst)
    }

    fn commit(&self) -> bool {
        let before = self.baseline.lock().take();
        let Some(before) = before else {
            return false;
        };
        let changed = *self.value.read() != before;
        if changed {
            self.version.fetch_add(1, Ordering::SeqCst);
        }
        changed
    }
}

impl<T> Drop for ObservableInner<T> {
    fn drop(&mut self) {
        Runtime::unregister_source(self.id);
    }
}

impl<T> Clone for Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Observable<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_set() {
        let cell = Observable::new(0);
        assert_eq!(cell.get(), 0);

        cell.set(42);
        assert_eq!(cell.get(), 42);
    }

    #[test]
    fn update_applies_function() {
        let cell = Observable::new(10);
        cell.update(|v| v + 5);
        assert_eq!(cell.get(), 15);
    }

    #[test]
    fn noop_write_does_not_bump_version() {
        let cell = Observable::new(7);
        let before = cell.version();

        cell.set(7);

        assert_eq!(cell.version(), before);
    }

    #[test]
    fn effective_write_bumps_version_once() {
        let cell = Observable::new(0);
        let before = cell.version();

        cell.set(1);

        assert_eq!(cell.version(), before + 1);
    }

    #[test]
    fn rewrites_inside_one_action_count_as_one_transition() {
        let cell = Observable::new(0);
        let before = cell.version();

        Action::run(|| {
            cell.set(1);
            cell.set(2);
            cell.set(3);
        });

        assert_eq!(cell.get(), 3);
        assert_eq!(cell.version(), before + 1);
    }

    #[test]
    fn action_restoring_the_value_is_no_change() {
        let cell = Observable::new(1);
        let before = cell.version();

        Action::run(|| {
            cell.set(2);
            cell.set(1);
        });

        assert_eq!(cell.get(), 1);
        assert_eq!(cell.version(), before);
    }

    #[test]
    fn clone_shares_state() {
        let cell1 = Observable::new(0);
        let cell2 = cell1.clone();

        cell1.set(42);
        assert_eq!(cell2.get(), 42);

        cell2.set(100);
        assert_eq!(cell1.get(), 100);
    }

    #[test]
    fn cell_ids_are_unique() {
        let a = Observable::new(0);
        let b = Observable::new(0);

        assert_ne!(a.id(), b.id());
    }
}
