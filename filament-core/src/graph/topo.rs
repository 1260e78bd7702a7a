//! Propagation ordering.
//!
//! Given the set of cells that really changed in an action, find every
//! derivation that could be affected and return them in dependency order,
//! so a derivation is only processed after all of its still-relevant
//! dependencies have settled.
//!
//! # Algorithm
//!
//! 1. BFS from the changed cells through subscriber edges, chaining through
//!    computed outputs, to collect the affected set.
//! 2. Kahn's algorithm over the affected subgraph: in-degree counts only
//!    dependencies whose owning derivation is itself affected.
//!
//! Nodes that never reach in-degree zero sit on a dependency cycle. They
//! are appended at the end in discovery order; evaluating them reports the
//! cycle as a distinguishable failure instead of looping.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexSet;

use crate::reactive::{CellId, DerivationId};

use super::edges::DepGraph;

/// Collect the derivations affected by `changed` in dependency order.
pub fn affected_in_order(graph: &DepGraph, changed: &[CellId]) -> Vec<DerivationId> {
    let mut seen: IndexSet<DerivationId> = IndexSet::new();
    let mut queue: VecDeque<DerivationId> = VecDeque::new();

    for cell in changed {
        if let Some(subs) = graph.subscribers_of(*cell) {
            queue.extend(subs.iter().copied());
        }
    }

    while let Some(derivation) = queue.pop_front() {
        if !seen.insert(derivation) {
            continue;
        }
        if let Some(out) = graph.output_of(derivation) {
            if let Some(subs) = graph.subscribers_of(out) {
                queue.extend(subs.iter().copied());
            }
        }
    }

    if seen.is_empty() {
        return Vec::new();
    }

    // Kahn's algorithm over the affected subgraph.
    let mut in_degree: HashMap<DerivationId, usize> = HashMap::new();
    let mut ready: VecDeque<DerivationId> = VecDeque::new();

    for &derivation in &seen {
        let degree = graph
            .dependencies_of(derivation)
            .map(|deps| {
                deps.keys()
                    .filter_map(|cell| graph.owner_of(*cell))
                    .filter(|owner| seen.contains(owner))
                    .count()
            })
            .unwrap_or(0);
        in_degree.insert(derivation, degree);
        if degree == 0 {
            ready.push_back(derivation);
        }
    }

    let mut order: Vec<DerivationId> = Vec::with_capacity(seen.len());

    while let Some(derivation) = ready.pop_front() {
        order.push(derivation);

        if let Some(out) = graph.output_of(derivation) {
            if let Some(subs) = graph.subscribers_of(out) {
                for dependent in subs {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            ready.push_back(*dependent);
                        }
                    }
                }
            }
        }
    }

    // Anything left is on a cycle; keep it so evaluation can report that.
    if order.len() < seen.len() {
        for &derivation in &seen {
            if !order.contains(&derivation) {
                order.push(derivation);
            }
        }
    }

    order
}
