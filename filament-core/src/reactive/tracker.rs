//! Dependency tracking context.
//!
//! The tracker records which derivation is currently evaluating so that
//! cell reads can register dependency edges without any manual wiring.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Running a computed cell or a
//! reaction pushes a frame; every tracked read inside it records the cell's
//! ID and the version observed at read time into the innermost frame only.
//! When the frame is popped, the collected set becomes the derivation's new
//! dependency list.
//!
//! Nesting attributes reads correctly: a reaction that reads a computed
//! cell is charged with the computed cell's output, while the cells the
//! computed cell itself reads land in the computed cell's own frame.

use std::cell::RefCell;

use indexmap::IndexMap;

use super::derivation::{CellId, DerivationId};

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = RefCell::new(Vec::new());
}

/// An entry in the tracking stack.
enum Frame {
    /// An actively tracking derivation and the reads observed so far.
    Tracking {
        derivation: DerivationId,
        reads: IndexMap<CellId, u64>,
    },
    /// A sentinel that swallows reads, for [`untracked`].
    Untracked,
}

/// Guard that pops the innermost frame when dropped.
///
/// Keeps the stack consistent even if the tracked closure panics.
struct FrameGuard;

impl Drop for FrameGuard {
    fn drop(&mut self) {
        FRAMES.with(|frames| {
            frames.borrow_mut().pop();
        });
    }
}

/// Run `f` while recording every tracked read performed directly inside it.
///
/// Returns the closure's result together with the observed dependency set:
/// each cell read, in first-read order, with the version seen at read time.
pub(crate) fn tracked<R>(
    derivation: DerivationId,
    f: impl FnOnce() -> R,
) -> (R, IndexMap<CellId, u64>) {
    FRAMES.with(|frames| {
        frames.borrow_mut().push(Frame::Tracking {
            derivation,
            reads: IndexMap::new(),
        });
    });

    let guard = FrameGuard;
    let result = f();
    std::mem::forget(guard);

    let reads = FRAMES.with(|frames| match frames.borrow_mut().pop() {
        Some(Frame::Tracking { reads, .. }) => reads,
        _ => IndexMap::new(),
    });

    (result, reads)
}

/// Run `f` with dependency tracking suppressed.
///
/// Reads inside `f` do not register edges for any enclosing derivation.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    FRAMES.with(|frames| {
        frames.borrow_mut().push(Frame::Untracked);
    });

    let _guard = FrameGuard;
    f()
}

/// Record a read of `cell` at `version` into the innermost tracking frame.
///
/// No-op when no frame is active or the innermost frame is untracked.
pub(crate) fn record_read(cell: CellId, version: u64) {
    FRAMES.with(|frames| {
        if let Some(Frame::Tracking { reads, .. }) = frames.borrow_mut().last_mut() {
            reads.insert(cell, version);
        }
    });
}

/// Check whether reads are currently being tracked.
pub fn is_tracking() -> bool {
    FRAMES.with(|frames| matches!(frames.borrow().last(), Some(Frame::Tracking { .. })))
}

/// Get the derivation currently being tracked, if any.
pub fn current_derivation() -> Option<DerivationId> {
    FRAMES.with(|frames| match frames.borrow().last() {
        Some(Frame::Tracking { derivation, .. }) => Some(*derivation),
        _ => None,
    })
}
