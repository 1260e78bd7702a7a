//! Dependency edge bookkeeping.
//!
//! Edges are stored centrally, keyed by the stable IDs from the reactive
//! module, rather than as back-references between cells and derivations.
//! Both directions are kept:
//!
//! - cell -> dependent derivations, for change notification
//! - derivation -> dependency cells, for cleanup and revalidation
//!
//! A derivation's dependency set is replaced wholesale after every run, so
//! conditional reads rewire the graph automatically. Subscriber sets are
//! ordered by first subscription, which is what makes propagation
//! deterministic.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use crate::reactive::{CellId, DerivationId};

/// The central dependency graph.
#[derive(Default)]
pub struct DepGraph {
    /// cell -> derivations that read it, in first-subscription order.
    subscribers: HashMap<CellId, IndexSet<DerivationId>>,

    /// derivation -> cells it read on its last run, with the versions
    /// observed at read time.
    dependencies: HashMap<DerivationId, IndexMap<CellId, u64>>,

    /// computed derivation -> its output cell.
    outputs: HashMap<DerivationId, CellId>,

    /// output cell -> owning computed derivation.
    owners: HashMap<CellId, DerivationId>,
}

impl DepGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `derivation` produces `cell` as its output.
    pub fn register_output(&mut self, derivation: DerivationId, cell: CellId) {
        self.outputs.insert(derivation, cell);
        self.owners.insert(cell, derivation);
    }

    /// Replace `derivation`'s dependency set with the reads from its latest
    /// run, updating subscriber sets on both the dropped and added cells.
    pub fn set_dependencies(&mut self, derivation: DerivationId, deps: IndexMap<CellId, u64>) {
        if let Some(old) = self.dependencies.get(&derivation) {
            let dropped: Vec<CellId> = old
                .keys()
                .filter(|cell| !deps.contains_key(*cell))
                .copied()
                .collect();
            for cell in dropped {
                if let Some(subs) = self.subscribers.get_mut(&cell) {
                    subs.shift_remove(&derivation);
                }
            }
        }

        for cell in deps.keys() {
            self.subscribers.entry(*cell).or_default().insert(derivation);
        }

        self.dependencies.insert(derivation, deps);
    }

    /// Remove a derivation and every edge involving it.
    ///
    /// Leaves no dangling back-references: the derivation disappears from
    /// all subscriber sets, and its output cell (if any) is forgotten.
    pub fn remove_derivation(&mut self, derivation: DerivationId) {
        if let Some(old) = self.dependencies.remove(&derivation) {
            for cell in old.keys() {
                if let Some(subs) = self.subscribers.get_mut(cell) {
                    subs.shift_remove(&derivation);
                }
            }
        }

        if let Some(cell) = self.outputs.remove(&derivation) {
            self.owners.remove(&cell);
            self.subscribers.remove(&cell);
        }
    }

    /// Drop the subscriber set of a cell that no longer exists.
    pub fn remove_cell(&mut self, cell: CellId) {
        self.subscribers.remove(&cell);
    }

    /// The derivations currently subscribed to `cell`.
    pub fn subscribers_of(&self, cell: CellId) -> Option<&IndexSet<DerivationId>> {
        self.subscribers.get(&cell)
    }

    /// Whether any derivation currently reads `cell`.
    pub fn has_subscribers(&self, cell: CellId) -> bool {
        self.subscribers
            .get(&cell)
            .is_some_and(|subs| !subs.is_empty())
    }

    /// The cells `derivation` read on its last run, with observed versions.
    pub fn dependencies_of(&self, derivation: DerivationId) -> Option<&IndexMap<CellId, u64>> {
        self.dependencies.get(&derivation)
    }

    /// The output cell of a computed derivation.
    pub fn output_of(&self, derivation: DerivationId) -> Option<CellId> {
        self.outputs.get(&derivation).copied()
    }

    /// The computed derivation that owns `cell`, if it is a computed output.
    pub fn owner_of(&self, cell: CellId) -> Option<DerivationId> {
        self.owners.get(&cell).copied()
    }
}
