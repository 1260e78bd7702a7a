//! Integration Tests for the Reactive System
//!
//! These tests verify that observable cells, computed cells, reactions,
//! actions, and observable futures work together correctly.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use filament_core::reactive::{
    Action, AsyncStatus, Computed, Observable, ObservableFuture, Reaction, Runtime,
};

/// Writing an unchanged value never wakes dependents.
#[test]
fn noop_write_triggers_nothing() {
    let cell = Observable::new(5);
    let computes = Arc::new(AtomicI32::new(0));

    let cell_in = cell.clone();
    let computes_in = computes.clone();
    let doubled = Computed::new(move || {
        computes_in.fetch_add(1, Ordering::SeqCst);
        cell_in.get() * 2
    });

    let doubled_in = doubled.clone();
    let reaction = Reaction::new(move || {
        let _ = doubled_in.get();
    });

    assert_eq!(computes.load(Ordering::SeqCst), 1);
    assert_eq!(reaction.runs(), 1);

    cell.set(5);

    assert_eq!(computes.load(Ordering::SeqCst), 1);
    assert_eq!(reaction.runs(), 1);
}

/// Two writes inside one action produce exactly one re-run, observing both
/// final values together — never a torn intermediate pair.
#[test]
fn action_batches_writes_atomically() {
    let a = Observable::new(0);
    let b = Observable::new(0);
    let pairs: Arc<Mutex<Vec<(i32, i32)>>> = Arc::new(Mutex::new(Vec::new()));

    let (a_in, b_in) = (a.clone(), b.clone());
    let pairs_in = pairs.clone();
    let _reaction = Reaction::new(move || {
        pairs_in.lock().push((a_in.get(), b_in.get()));
    });

    Action::run(|| {
        a.set(1);
        b.set(2);
    });

    assert_eq!(*pairs.lock(), vec![(0, 0), (1, 2)]);
}

/// Nested action scopes flatten into the outermost commit.
#[test]
fn nested_actions_commit_once() {
    let a = Observable::new(0);
    let b = Observable::new(0);

    let (a_in, b_in) = (a.clone(), b.clone());
    let reaction = Reaction::new(move || {
        a_in.get();
        b_in.get();
    });

    Action::run(|| {
        a.set(1);
        Action::run(|| b.set(2));
        a.set(3);
    });

    assert_eq!(reaction.runs(), 2);
}

/// A cell written away from and back to its pre-action value commits no
/// change at all: zero recomputation, zero re-runs.
#[test]
fn action_restoring_a_value_propagates_nothing() {
    let cell = Observable::new(1);
    let computes = Arc::new(AtomicI32::new(0));

    let cell_in = cell.clone();
    let computes_in = computes.clone();
    let doubled = Computed::new(move || {
        computes_in.fetch_add(1, Ordering::SeqCst);
        cell_in.get() * 2
    });

    let doubled_in = doubled.clone();
    let reaction = Reaction::new(move || {
        let _ = doubled_in.get();
    });

    Action::run(|| {
        cell.set(2);
        cell.set(1);
    });

    assert_eq!(computes.load(Ordering::SeqCst), 1);
    assert_eq!(reaction.runs(), 1);
}

/// A computed cell whose recomputed value is unchanged does not wake its
/// downstream reactions, even though its own dependency changed.
#[test]
fn unchanged_computed_suppresses_downstream_reactions() {
    let cell = Observable::new(1);

    let cell_in = cell.clone();
    let parity = Computed::new(move || cell_in.get() % 2);

    let parity_in = parity.clone();
    let reaction = Reaction::new(move || {
        let _ = parity_in.get();
    });

    assert_eq!(reaction.runs(), 1);

    // 1 -> 3: parity stays 1
    cell.set(3);
    assert_eq!(reaction.runs(), 1);

    // 3 -> 2: parity flips to 0
    cell.set(2);
    assert_eq!(reaction.runs(), 2);
}

/// Within one pass a computed cell settles before the reactions that read
/// it: a reaction never observes a half-updated graph.
#[test]
fn reactions_never_observe_torn_computed_values() {
    let cell = Observable::new(1);

    let cell_in = cell.clone();
    let doubled = Computed::new(move || cell_in.get() * 2);

    let violations = Arc::new(AtomicI32::new(0));
    let (cell_in, doubled_in) = (cell.clone(), doubled.clone());
    let violations_in = violations.clone();
    let _reaction = Reaction::new(move || {
        let v = cell_in.get();
        let d = doubled_in.get().expect("doubling cannot fail");
        if d != v * 2 {
            violations_in.fetch_add(1, Ordering::SeqCst);
        }
    });

    cell.set(2);
    cell.set(3);
    Action::run(|| {
        cell.set(10);
        cell.set(11);
    });

    assert_eq!(violations.load(Ordering::SeqCst), 0);
}

/// Reactions fire in creation order when one action wakes several of them.
#[test]
fn reactions_run_in_creation_order() {
    let cell = Observable::new(0);
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let make = |label: &'static str| {
        let cell_in = cell.clone();
        let log_in = log.clone();
        Reaction::new(move || {
            cell_in.get();
            log_in.lock().push(label);
        })
    };

    let _first = make("first");
    let _second = make("second");
    let _third = make("third");

    log.lock().clear();
    cell.set(1);

    assert_eq!(*log.lock(), vec!["first", "second", "third"]);
}

/// A reaction that disposes itself from inside its own body is never
/// invoked again.
#[test]
fn self_disposal_is_safe() {
    let cell = Observable::new(0);
    let count = Arc::new(AtomicI32::new(0));
    let slot: Arc<Mutex<Option<Reaction>>> = Arc::new(Mutex::new(None));

    let cell_in = cell.clone();
    let count_in = count.clone();
    let slot_in = slot.clone();
    let reaction = Reaction::new(move || {
        let value = cell_in.get();
        count_in.fetch_add(1, Ordering::SeqCst);
        if value > 0 {
            if let Some(me) = slot_in.lock().as_ref() {
                me.dispose();
            }
        }
    });
    *slot.lock() = Some(reaction.clone());

    assert_eq!(count.load(Ordering::SeqCst), 1);

    // triggers the run that disposes the reaction mid-body
    cell.set(1);
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert!(reaction.is_disposed());

    cell.set(2);
    cell.set(3);
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

/// Disposing a reaction that is already queued in the running pass drops
/// the queued run instead of executing it.
#[test]
fn disposal_drops_queued_runs() {
    let cell = Observable::new(0);
    let victim_runs = Arc::new(AtomicI32::new(0));
    let victim_slot: Arc<Mutex<Option<Reaction>>> = Arc::new(Mutex::new(None));

    // created first, so it runs first and disposes the victim
    let cell_in = cell.clone();
    let slot_in = victim_slot.clone();
    let _assassin = Reaction::new(move || {
        if cell_in.get() > 0 {
            if let Some(victim) = slot_in.lock().as_ref() {
                victim.dispose();
            }
        }
    });

    let cell_in = cell.clone();
    let runs_in = victim_runs.clone();
    let victim = Reaction::new(move || {
        cell_in.get();
        runs_in.fetch_add(1, Ordering::SeqCst);
    });
    *victim_slot.lock() = Some(victim.clone());

    assert_eq!(victim_runs.load(Ordering::SeqCst), 1);

    // both are queued; the assassin runs first and the victim's queued run
    // must be dropped
    cell.set(1);

    assert!(victim.is_disposed());
    assert_eq!(victim_runs.load(Ordering::SeqCst), 1);
}

/// A reaction body failure reaches the injected handler and the pass
/// continues with the remaining reactions.
#[test]
fn reaction_failures_reach_the_handler_without_aborting_the_pass() {
    let reported: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let reported_in = reported.clone();
    Runtime::set_error_handler(move |err| {
        reported_in.lock().push(err.to_string());
    });

    let cell = Observable::new(0);

    let cell_in = cell.clone();
    let _failing = Reaction::try_new(move || {
        if cell_in.get() > 0 {
            return Err("quota exceeded while refreshing".into());
        }
        Ok(())
    });

    let cell_in = cell.clone();
    let survivor = Reaction::new(move || {
        cell_in.get();
    });

    cell.set(1);

    assert_eq!(survivor.runs(), 2);
    assert!(reported
        .lock()
        .iter()
        .any(|msg| msg.contains("quota exceeded")));
}

/// Mutually dependent computed cells are reported as a cycle, not an
/// infinite loop or a stack overflow.
#[test]
fn dependency_cycles_are_reported() {
    let slot: Arc<Mutex<Option<Computed<i32>>>> = Arc::new(Mutex::new(None));

    let slot_in = slot.clone();
    let a = Computed::try_new(move || {
        let other = slot_in.lock().clone();
        match other {
            Some(other) => other.get(),
            None => Ok(1),
        }
    });

    let a_in = a.clone();
    let b = Computed::try_new(move || a_in.get());
    *slot.lock() = Some(b.clone());

    let result = a.get();
    assert!(matches!(result, Err(ref err) if err.is_cycle()));
}

/// A reaction's dependency set is rebuilt on every run, so conditional
/// reads rewire what it listens to.
#[test]
fn conditional_dependencies_rewire_reactions() {
    let use_first = Observable::new(true);
    let first = Observable::new("a");
    let second = Observable::new("b");

    let (flag_in, first_in, second_in) = (use_first.clone(), first.clone(), second.clone());
    let reaction = Reaction::new(move || {
        if flag_in.get() {
            first_in.get();
        } else {
            second_in.get();
        }
    });

    assert_eq!(reaction.runs(), 1);

    // not currently a dependency
    second.set("x");
    assert_eq!(reaction.runs(), 1);

    use_first.set(false);
    assert_eq!(reaction.runs(), 2);

    // sides have swapped
    first.set("y");
    assert_eq!(reaction.runs(), 2);

    second.set("z");
    assert_eq!(reaction.runs(), 3);
}

/// A reaction that writes cells re-propagates after the current pass, so
/// two passes never interleave and downstream reactions see final values.
#[test]
fn writes_from_reaction_bodies_run_as_follow_up_batches() {
    let input = Observable::new(1);
    let mirrored = Observable::new(10);

    let (input_in, mirrored_in) = (input.clone(), mirrored.clone());
    let forwarder = Reaction::new(move || {
        let value = input_in.get();
        mirrored_in.set(value * 10);
    });

    let seen = Arc::new(AtomicI32::new(0));
    let mirrored_in = mirrored.clone();
    let seen_in = seen.clone();
    let follower = Reaction::new(move || {
        seen_in.store(mirrored_in.get(), Ordering::SeqCst);
    });

    assert_eq!(seen.load(Ordering::SeqCst), 10);

    input.set(4);

    assert_eq!(forwarder.runs(), 2);
    assert_eq!(follower.runs(), 2);
    assert_eq!(seen.load(Ordering::SeqCst), 40);
}

/// The full async lifecycle: a reaction observing the tracker runs once at
/// subscribe time seeing `Pending`, and exactly once more at settlement,
/// seeing status and value land together.
#[test]
fn async_settlement_is_one_atomic_update() {
    let (tracker, completer) = ObservableFuture::<&str, String>::pending();
    let observed: Arc<Mutex<Vec<(AsyncStatus, Option<&str>)>>> = Arc::new(Mutex::new(Vec::new()));

    let tracker_in = tracker.clone();
    let observed_in = observed.clone();
    let reaction = Reaction::new(move || {
        observed_in
            .lock()
            .push((tracker_in.status(), tracker_in.value()));
    });

    assert_eq!(*observed.lock(), vec![(AsyncStatus::Pending, None)]);

    completer.fulfill("x");

    assert_eq!(reaction.runs(), 2);
    assert_eq!(
        *observed.lock(),
        vec![
            (AsyncStatus::Pending, None),
            (AsyncStatus::Fulfilled, Some("x")),
        ]
    );
}

/// Rejection surfaces as terminal state readable by derivations.
#[test]
fn rejected_operations_notify_dependents() {
    let (tracker, completer) = ObservableFuture::<i32, String>::pending();

    let tracker_in = tracker.clone();
    let message = Computed::new(move || match tracker_in.state() {
        filament_core::reactive::AsyncState::Pending => "loading".to_string(),
        filament_core::reactive::AsyncState::Fulfilled(v) => format!("got {v}"),
        filament_core::reactive::AsyncState::Rejected(e) => format!("failed: {e}"),
    });

    assert_eq!(message.get(), Ok("loading".to_string()));

    completer.reject("connection reset".to_string());

    assert_eq!(message.get(), Ok("failed: connection reset".to_string()));
}

/// Computed chains stay lazy when nothing is listening: a write marks them
/// stale but recomputation waits for the next read.
#[test]
fn unobserved_computed_chains_recompute_lazily() {
    let cell = Observable::new(2);
    let computes = Arc::new(AtomicI32::new(0));

    let cell_in = cell.clone();
    let computes_in = computes.clone();
    let squared = Computed::new(move || {
        computes_in.fetch_add(1, Ordering::SeqCst);
        let v = cell_in.get();
        v * v
    });

    assert_eq!(squared.get(), Ok(4));
    assert_eq!(computes.load(Ordering::SeqCst), 1);

    // no reaction is attached; the write must not recompute eagerly
    cell.set(3);
    assert_eq!(computes.load(Ordering::SeqCst), 1);

    assert_eq!(squared.get(), Ok(9));
    assert_eq!(computes.load(Ordering::SeqCst), 2);
}
