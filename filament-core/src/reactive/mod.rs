//! Reactive Primitives
//!
//! This module implements the core reactive system: observable cells,
//! computed cells, reactions, action scopes, and observable futures.
//!
//! # Concepts
//!
//! ## Observable cells
//!
//! An [`Observable`] is a container for mutable state. When its value is
//! read within a tracking frame (a computed cell or reaction run), the
//! cell automatically registers that derivation as a dependent. When the
//! value changes, dependents are notified — writes of an equal value are
//! no-ops.
//!
//! ## Computed cells
//!
//! A [`Computed`] is a derived value that caches its result and
//! re-evaluates only when a dependency really changed. Unchanged results
//! do not wake dependents, so change suppression travels through chains.
//!
//! ## Reactions
//!
//! A [`Reaction`] is a side-effecting subscriber that re-runs whenever its
//! dependencies change. Reactions synchronize reactive state with external
//! systems, such as re-rendering a view.
//!
//! ## Actions
//!
//! [`Action::run`] batches writes into one transaction: dependents observe
//! all cells at their final values and each affected reaction re-runs at
//! most once per action.
//!
//! ## Observable futures
//!
//! An [`ObservableFuture`] exposes the pending/fulfilled/rejected
//! lifecycle of one asynchronous operation as trackable state.
//!
//! # Implementation Notes
//!
//! Dependency discovery funnels through a single thread-local tracking
//! stack: any tracked read registers with the innermost frame, regardless
//! of the value's type. This approach (sometimes called "transparent
//! reactivity") is used by MobX, Vue 3, and SolidJS.

mod action;
mod computed;
mod derivation;
mod error;
mod future;
mod observable;
mod reaction;
mod runtime;
mod tracker;

pub use action::Action;
pub use computed::{Computed, ComputedState};
pub use derivation::{CellId, Derivation, DerivationId, Source};
pub use error::{BoxError, EvalError};
pub use future::{AsyncState, AsyncStatus, Completer, ObservableFuture};
pub use observable::Observable;
pub use reaction::Reaction;
pub use runtime::{ErrorHandler, Runtime};
pub use tracker::{current_derivation, is_tracking, untracked};
