//! Filament Core
//!
//! This crate provides the core runtime for the Filament reactive state
//! framework. It implements:
//!
//! - Reactive primitives (observable cells, computed cells, reactions)
//! - Transactional write batching (actions)
//! - A dependency graph with ordered, minimal change propagation
//! - Observable futures that expose async operation lifecycles as state
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: the reactive primitives and dependency tracking
//! - `graph`: the dependency graph and propagation ordering
//!
//! # Example
//!
//! ```rust,ignore
//! use filament_core::reactive::{Action, Computed, Observable, Reaction};
//!
//! // Create an observable cell
//! let count = Observable::new(0);
//!
//! // Create a derived value
//! let doubled = {
//!     let count = count.clone();
//!     Computed::new(move || count.get() * 2)
//! };
//!
//! // Create a reaction
//! let _render = {
//!     let count = count.clone();
//!     let doubled = doubled.clone();
//!     Reaction::new(move || {
//!         println!("count: {}, doubled: {:?}", count.get(), doubled.get());
//!     })
//! };
//!
//! // Batch writes; the reaction re-runs once with the final values
//! Action::run(|| {
//!     count.set(2);
//!     count.set(5);
//! });
//! ```

pub mod graph;
pub mod reactive;
