//! Dependency Graph
//!
//! This module implements the dependency graph that tracks relationships
//! between cells and the derivations that read them.
//!
//! # Overview
//!
//! The graph is a DAG where:
//!
//! - Cells (observable values and computed outputs) are the sources
//! - Derivations (computed cells, reactions) are the readers
//!
//! When a cell changes, we traverse the graph to find every affected
//! derivation and order them so dependencies settle before dependents.
//!
//! # Design Decisions
//!
//! 1. We use a centralized graph rather than distributed back-references
//!    because:
//!    - It enables topological ordering for batched updates
//!    - It makes disposal a matter of deleting entries, with no dangling
//!      pointers to chase
//!
//! 2. The graph is indexed by stable IDs for O(1) lookups.
//!
//! 3. We maintain both forward (dependencies) and reverse (subscribers)
//!    edges to enable efficient traversal in both directions.

mod edges;
mod topo;

pub use edges::DepGraph;
pub use topo::affected_in_order;
