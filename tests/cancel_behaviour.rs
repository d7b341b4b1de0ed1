mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::common::{
    Behaviour, FakeSpec, Gate, GraphBuilder, coordinator_for, init_tracing, is_built,
    within_timeout,
};

use nodeforge::engine::{BuildOutcome, BuildRequest, CoordinatorState};
use nodeforge::types::{Generation, GenerationMask};

/// Open `gate` from another thread after a short delay, so a cancel issued
/// now reaches the coordinator while the gated item is still running.
fn open_later(gate: &std::sync::Arc<Gate>) -> thread::JoinHandle<()> {
    let gate = gate.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        gate.open();
    })
}

#[test]
fn test_cancel_mid_build_resets_progress_and_build_info() {
    init_tracing();
    let gate = Gate::new();
    let test = GraphBuilder::new()
        .node_with(
            "slow",
            FakeSpec::new()
                .items(4)
                .behaviour(Behaviour::Gated(gate.clone())),
        )
        .node("fast")
        .node("sink")
        .edge("slow", "sink")
        .edge("fast", "sink")
        .build();
    let target = test.id("sink");
    let (coordinator, test) = coordinator_for(test, 2);

    coordinator
        .start_build(BuildRequest::preview([target]))
        .unwrap();
    assert!(gate.wait_entered(1, Duration::from_secs(5)));

    let opener = open_later(&gate);
    let outcome = coordinator.cancel();
    opener.join().unwrap();

    assert_eq!(outcome, Some(BuildOutcome::Cancelled));
    assert!(!coordinator.is_building());
    assert_eq!(coordinator.state(), CoordinatorState::CancelBuild);

    let info = coordinator.build_info();
    assert!(!info.is_building());
    assert_eq!(info.generation(), GenerationMask::None);
    assert_eq!(info.progress(), 0.0);

    {
        let graph = coordinator.graph().lock();
        for node in graph.nodes() {
            assert_eq!(node.progress(), 0.0, "{} kept progress", node.name);
            assert!(!node.flags.building, "{} still building", node.name);
        }
    }
    assert!(!is_built(&coordinator, "sink", Generation::Preview));
    assert!(!test.log.created().contains(&"sink".to_string()));
    assert_eq!(coordinator.pool().open_items(), 0);
}

#[test]
fn test_cancel_without_active_build_is_a_no_op() {
    let test = GraphBuilder::new().node("A").build();
    let (coordinator, _test) = coordinator_for(test, 1);

    assert_eq!(coordinator.cancel(), None);
    assert!(!coordinator.is_building());
}

#[test]
fn test_build_after_cancel_completes() {
    init_tracing();
    let gate = Gate::new();
    let test = GraphBuilder::new()
        .node_with("slow", FakeSpec::new().behaviour(Behaviour::Gated(gate.clone())))
        .node("sink")
        .edge("slow", "sink")
        .build();
    let target = test.id("sink");
    let (coordinator, _test) = coordinator_for(test, 2);

    coordinator
        .start_build(BuildRequest::preview([target]))
        .unwrap();
    assert!(gate.wait_entered(1, Duration::from_secs(5)));
    let opener = open_later(&gate);
    assert_eq!(coordinator.cancel(), Some(BuildOutcome::Cancelled));
    opener.join().unwrap();

    // The gate is open now, so the rebuild runs straight through.
    let outcome = coordinator
        .build_blocking(BuildRequest::preview([target]))
        .unwrap();
    assert_eq!(outcome, BuildOutcome::Completed);
    assert!(is_built(&coordinator, "sink", Generation::Preview));
}

#[test]
fn test_cancel_keeps_other_generation_built() {
    init_tracing();
    let gate = Gate::new();
    let test = GraphBuilder::new()
        .node("steady")
        .node_with("slow", FakeSpec::new().behaviour(Behaviour::Gated(gate.clone())))
        .node("sink")
        .edge("slow", "sink")
        .build();
    let (steady, sink) = (test.id("steady"), test.id("sink"));
    let (coordinator, _test) = coordinator_for(test, 2);

    coordinator
        .build_blocking(BuildRequest::full([steady]))
        .unwrap();
    assert!(is_built(&coordinator, "steady", Generation::Full));

    coordinator
        .start_build(BuildRequest::preview([sink]))
        .unwrap();
    assert!(gate.wait_entered(1, Duration::from_secs(5)));
    let opener = open_later(&gate);
    assert_eq!(coordinator.cancel(), Some(BuildOutcome::Cancelled));
    opener.join().unwrap();

    assert!(is_built(&coordinator, "steady", Generation::Full));
    assert!(!is_built(&coordinator, "sink", Generation::Preview));
}

#[test]
fn test_dropping_coordinator_cancels_active_build() {
    init_tracing();
    let gate = Gate::new();
    let test = GraphBuilder::new()
        .node_with("slow", FakeSpec::new().behaviour(Behaviour::Gated(gate.clone())))
        .node("sink")
        .edge("slow", "sink")
        .build();
    let target = test.id("sink");
    let (coordinator, test) = coordinator_for(test, 2);

    coordinator
        .start_build(BuildRequest::preview([target]))
        .unwrap();
    assert!(gate.wait_entered(1, Duration::from_secs(5)));

    let opener = open_later(&gate);
    within_timeout(move || drop(coordinator));
    opener.join().unwrap();

    assert!(!test.log.created().contains(&"sink".to_string()));
}

#[test]
fn test_cancel_right_after_start_is_honoured() {
    init_tracing();
    let gate = Gate::new();
    let test = GraphBuilder::new()
        .node_with("slow", FakeSpec::new().behaviour(Behaviour::Gated(gate.clone())))
        .node("sink")
        .edge("slow", "sink")
        .build();
    let target = test.id("sink");
    let (coordinator, test) = coordinator_for(test, 2);

    coordinator
        .start_build(BuildRequest::preview([target]))
        .unwrap();
    let opener = open_later(&gate);
    let outcome = coordinator.cancel();
    opener.join().unwrap();

    assert_eq!(outcome, Some(BuildOutcome::Cancelled));
    assert!(!coordinator.is_building());
    assert!(!is_built(&coordinator, "sink", Generation::Preview));
    assert!(!test.log.created().contains(&"sink".to_string()));
}

#[test]
fn test_cancel_racing_build_setup_is_not_lost() {
    init_tracing();
    for _ in 0..20 {
        let gate = Gate::new();
        let test = GraphBuilder::new()
            .node_with("slow", FakeSpec::new().behaviour(Behaviour::Gated(gate.clone())))
            .node("sink")
            .edge("slow", "sink")
            .build();
        let target = test.id("sink");
        let (coordinator, test) = coordinator_for(test, 2);
        let coordinator = Arc::new(coordinator);

        let canceller = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                while !coordinator.is_building() {
                    thread::yield_now();
                }
                coordinator.cancel()
            })
        };
        coordinator
            .start_build(BuildRequest::preview([target]))
            .unwrap();
        let opener = open_later(&gate);

        let outcome = canceller.join().unwrap();
        opener.join().unwrap();

        assert_eq!(outcome, Some(BuildOutcome::Cancelled));
        let waiter = Arc::clone(&coordinator);
        assert!(within_timeout(move || waiter.wait()).is_some());
        assert!(!coordinator.is_building());
        assert!(!is_built(&coordinator, "sink", Generation::Preview));
        assert!(!test.log.created().contains(&"sink".to_string()));
    }
}
