//! Identities and traits for participants in the dependency graph.
//!
//! Two kinds of identity exist:
//!
//! - [`CellId`] names a readable value slot: every observable cell, and the
//!   output slot of every computed cell.
//! - [`DerivationId`] names a computation that reads cells: computed cells
//!   and reactions.
//!
//! A computed cell carries both: it is a derivation (it reads upstream
//! cells) and it owns an output cell (downstream derivations read it).
//! Keeping both sides keyed by stable IDs lets the runtime store adjacency
//! in a central registry instead of circular back-references, which makes
//! cleanup on disposal a matter of removing entries.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a readable value slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    /// Generate a new unique cell ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for CellId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a derivation (computed cell or reaction).
///
/// IDs are handed out by a monotonic counter, so ascending ID order is
/// creation order. The propagation pass runs reactions in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DerivationId(u64);

impl DerivationId {
    /// Generate a new unique derivation ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for DerivationId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that depends on cells and can be notified of changes.
///
/// Implemented by the shared inner state of computed cells and reactions.
/// The runtime registry holds these behind `Weak` so a derivation whose
/// handles were all dropped stops participating without explicit teardown.
pub trait Derivation: Send + Sync {
    /// The derivation's identity in the dependency graph.
    fn id(&self) -> DerivationId;

    /// Whether this derivation is eager (reaction) or lazy (computed cell).
    ///
    /// Eager derivations are scheduled to re-run during a propagation pass.
    /// Lazy ones are at most marked stale and recompute on next read.
    fn is_eager(&self) -> bool;

    /// Whether the derivation has been permanently retired.
    fn is_disposed(&self) -> bool;

    /// The output cell for computed cells; `None` for reactions.
    fn output(&self) -> Option<CellId>;

    /// A direct dependency reported a real change.
    fn mark_dirty(&self);

    /// A transitive dependency may have changed; revalidate before trusting
    /// the cache.
    fn mark_maybe_dirty(&self);

    /// Recompute (computed cell) or re-run (reaction).
    ///
    /// Returns `true` when the derivation's observable output really
    /// changed. Reactions have no output and always return `false`.
    fn refresh(&self) -> bool;
}

/// A readable value slot with a version counter.
///
/// Implemented by observable cells and by computed cells (for their output
/// slot). The version moves exactly once per net change, which is what
/// lazy revalidation compares against.
pub trait Source: Send + Sync {
    /// The cell's identity in the dependency graph.
    fn cell_id(&self) -> CellId;

    /// The current version counter.
    fn version(&self) -> u64;

    /// Bring the source up to date, then report the current version.
    ///
    /// Observable cells are always current. Computed outputs revalidate
    /// (and possibly recompute) first.
    fn pull_version(&self) -> u64;

    /// Commit a staged write, comparing against the pre-action baseline.
    ///
    /// Returns whether the cell's value really changed over the action.
    /// Only observable cells stage writes; computed outputs return `false`.
    fn commit(&self) -> bool;
}
