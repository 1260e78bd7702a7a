//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects observable cells,
//! computed cells, and reactions. It owns the dependency graph and runs the
//! propagation pass when an action commits.
//!
//! # How It Works
//!
//! 1. When a cell or derivation is created, it registers with the runtime.
//!
//! 2. When a derivation finishes a run, the reads it observed replace its
//!    dependency edges in the graph.
//!
//! 3. When an action commits net-changed cells, the runtime:
//!    a. Collects the affected derivations in dependency order
//!    b. Recomputes listened-to computed cells to decide whether their
//!       value really moved (push-pull: changes are pushed, values pulled)
//!    c. Marks unlistened computed cells stale without recomputing them
//!    d. Runs the scheduled reactions, each at most once, in creation order
//!
//! # Thread Safety
//!
//! The registries are `Send + Sync` behind locks, but tracking, action, and
//! propagation state is thread-local: the reactive timeline is
//! single-threaded by convention, and a multi-threaded host is expected to
//! serialize entry points onto one timeline.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::{error, trace};

use crate::graph::{affected_in_order, DepGraph};

use super::derivation::{CellId, Derivation, DerivationId, Source};
use super::error::BoxError;
use super::tracker;

/// Consumer-injected handler for reaction body failures.
pub type ErrorHandler = Box<dyn Fn(&BoxError) + Send + Sync>;

static DERIVATIONS: OnceLock<RwLock<HashMap<DerivationId, Weak<dyn Derivation>>>> =
    OnceLock::new();
static SOURCES: OnceLock<RwLock<HashMap<CellId, Weak<dyn Source>>>> = OnceLock::new();
static GRAPH: OnceLock<RwLock<DepGraph>> = OnceLock::new();
static ERROR_HANDLER: OnceLock<RwLock<Option<ErrorHandler>>> = OnceLock::new();

fn derivations() -> &'static RwLock<HashMap<DerivationId, Weak<dyn Derivation>>> {
    DERIVATIONS.get_or_init(|| RwLock::new(HashMap::new()))
}

fn sources() -> &'static RwLock<HashMap<CellId, Weak<dyn Source>>> {
    SOURCES.get_or_init(|| RwLock::new(HashMap::new()))
}

fn graph() -> &'static RwLock<DepGraph> {
    GRAPH.get_or_init(|| RwLock::new(DepGraph::new()))
}

fn error_handler() -> &'static RwLock<Option<ErrorHandler>> {
    ERROR_HANDLER.get_or_init(|| RwLock::new(None))
}

/// The global reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Register a derivation. The registry holds a weak handle, so dropping
    /// every strong handle retires the derivation without explicit teardown.
    pub(crate) fn register_derivation(id: DerivationId, derivation: Weak<dyn Derivation>) {
        derivations().write().insert(id, derivation);
    }

    /// Remove a derivation and every dependency edge involving it.
    pub(crate) fn unregister_derivation(id: DerivationId) {
        derivations().write().remove(&id);
        graph().write().remove_derivation(id);
    }

    /// Register a readable cell for version pulls during revalidation.
    pub(crate) fn register_source(id: CellId, source: Weak<dyn Source>) {
        sources().write().insert(id, source);
    }

    /// Remove a cell that no longer exists.
    pub(crate) fn unregister_source(id: CellId) {
        sources().write().remove(&id);
        graph().write().remove_cell(id);
    }

    pub(crate) fn lookup_derivation(id: DerivationId) -> Option<Arc<dyn Derivation>> {
        let weak = derivations().read().get(&id).cloned()?;
        match weak.upgrade() {
            Some(strong) => Some(strong),
            None => {
                // stale entry from a dropped derivation; prune lazily
                derivations().write().remove(&id);
                None
            }
        }
    }

    pub(crate) fn lookup_source(cell: CellId) -> Option<Arc<dyn Source>> {
        let weak = sources().read().get(&cell).cloned()?;
        match weak.upgrade() {
            Some(strong) => Some(strong),
            None => {
                sources().write().remove(&cell);
                None
            }
        }
    }

    /// Replace a derivation's dependency edges with its latest reads.
    pub(crate) fn set_dependencies(id: DerivationId, deps: IndexMap<CellId, u64>) {
        graph().write().set_dependencies(id, deps);
    }

    /// Record a computed derivation's output cell.
    pub(crate) fn register_output(id: DerivationId, cell: CellId) {
        graph().write().register_output(id, cell);
    }

    /// The cells a derivation read on its last run, with observed versions.
    pub(crate) fn dependencies_of(id: DerivationId) -> IndexMap<CellId, u64> {
        graph()
            .read()
            .dependencies_of(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Install the handler invoked when a reaction body fails.
    ///
    /// The default handler logs the failure; the propagation pass continues
    /// with the remaining scheduled reactions either way.
    pub fn set_error_handler(handler: impl Fn(&BoxError) + Send + Sync + 'static) {
        *error_handler().write() = Some(Box::new(handler));
    }

    pub(crate) fn report_error(err: &BoxError) {
        let handler = error_handler().read();
        match handler.as_ref() {
            Some(handler) => handler(err),
            None => error!(error = %err, "reaction failed"),
        }
    }

    /// Check whether reads are currently being tracked on this thread.
    pub fn is_tracking() -> bool {
        tracker::is_tracking()
    }

    /// Run one propagation pass for the given net-changed cells.
    ///
    /// Within a pass every derivation is processed at most once, after all
    /// of its still-relevant dependencies have settled. Scheduled reactions
    /// run at the end, in creation order.
    pub(crate) fn run_pass(changed: &[CellId]) {
        let order = {
            let graph = graph().read();
            affected_in_order(&graph, changed)
        };
        if order.is_empty() {
            return;
        }

        let handles: Vec<(DerivationId, Arc<dyn Derivation>)> = order
            .iter()
            .filter_map(|id| Self::lookup_derivation(*id).map(|d| (*id, d)))
            .collect();

        trace!(
            changed = changed.len(),
            affected = handles.len(),
            "propagation pass"
        );

        // Reverse scan: a derivation is live when a non-disposed reaction
        // is reachable downstream of it. Only live computed cells are worth
        // recomputing during the pass; the rest stay lazy.
        let mut live: HashSet<DerivationId> = HashSet::new();
        for (id, derivation) in handles.iter().rev() {
            if derivation.is_eager() {
                if !derivation.is_disposed() {
                    live.insert(*id);
                }
            } else if let Some(out) = derivation.output() {
                let listened = {
                    let graph = graph().read();
                    graph
                        .subscribers_of(out)
                        .is_some_and(|subs| subs.iter().any(|sub| live.contains(sub)))
                };
                if listened {
                    live.insert(*id);
                }
            }
        }

        let mut net_changed: HashSet<CellId> = changed.iter().copied().collect();
        let mut maybe_changed: HashSet<CellId> = HashSet::new();
        let mut scheduled: SmallVec<[(DerivationId, Arc<dyn Derivation>); 8]> = SmallVec::new();

        for (id, derivation) in &handles {
            if derivation.is_disposed() {
                continue;
            }

            let (touched, maybe) = {
                let graph = graph().read();
                match graph.dependencies_of(*id) {
                    Some(deps) => (
                        deps.keys().any(|cell| net_changed.contains(cell)),
                        deps.keys().any(|cell| maybe_changed.contains(cell)),
                    ),
                    None => (false, false),
                }
            };
            if !touched && !maybe {
                continue;
            }

            if derivation.is_eager() {
                scheduled.push((*id, Arc::clone(derivation)));
            } else if touched {
                if live.contains(id) {
                    if derivation.refresh() {
                        if let Some(out) = derivation.output() {
                            net_changed.insert(out);
                        }
                    }
                } else {
                    derivation.mark_dirty();
                    if let Some(out) = derivation.output() {
                        maybe_changed.insert(out);
                    }
                }
            } else {
                derivation.mark_maybe_dirty();
                if let Some(out) = derivation.output() {
                    maybe_changed.insert(out);
                }
            }
        }

        // Reactions fire after marking settles, each at most once per pass,
        // in creation order (ascending derivation id).
        scheduled.sort_by_key(|(id, _)| *id);
        for (_, reaction) in scheduled {
            if !reaction.is_disposed() {
                reaction.refresh();
            }
        }
    }
}
