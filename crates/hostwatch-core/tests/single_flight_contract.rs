//! Contract Test: Single-Flight per Host
//!
//! Constraints verified:
//! - Two simultaneous triggers for one host run exactly one pass
//! - The second trigger is dropped, not queued
//! - The lock is released after every pass, including failed and panicked ones
//! - Different hosts do not block each other
//!
//! If this test fails, passes for one host can overlap.

mod common;

use common::*;
use hostwatch_core::PassOutcome;
use hostwatch_core::model::Host;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn concurrent_trigger_is_dropped() {
    let probe = ScriptedProbe::always(true).with_delay(Duration::from_millis(100));
    let probes = probe.call_counter();

    let h = HarnessBuilder::new(Host::new(1, "edge-1", 10))
        .probe(probe)
        .build()
        .await;

    let (first, second) = tokio::join!(h.job.run(1), h.job.run(1));

    let outcomes = [first, second];
    assert_eq!(
        outcomes.iter().filter(|o| **o == PassOutcome::Dropped).count(),
        1,
        "exactly one trigger is dropped: {:?}",
        outcomes
    );
    assert!(
        outcomes.iter().any(|o| matches!(o, PassOutcome::Completed(_))),
        "the other one runs: {:?}",
        outcomes
    );
    assert_eq!(probes.load(Ordering::SeqCst), 1, "only one pass touched the host");
}

#[tokio::test]
async fn lock_is_released_after_pass() {
    let h = HarnessBuilder::new(Host::new(1, "edge-1", 10)).build().await;

    assert!(matches!(h.job.run(1).await, PassOutcome::Completed(_)));
    assert!(!h.lock.is_held(1));
    assert!(matches!(h.job.run(1).await, PassOutcome::Completed(_)));
}

#[tokio::test]
async fn failed_pass_is_alerted_and_releases_lock() {
    let h = HarnessBuilder::new(Host::new(1, "edge-1", 10)).build().await;

    let outcome = h.job.run(99).await;
    let PassOutcome::Failed { error } = outcome else {
        panic!("unknown host should fail the pass, got {:?}", outcome);
    };
    assert!(error.contains("host 99"));
    assert_eq!(h.alerts.count(), 1);
    assert!(!h.lock.is_held(99));

    assert!(
        matches!(h.job.run(99).await, PassOutcome::Failed { .. }),
        "a retry is not dropped"
    );
}

#[tokio::test]
async fn different_hosts_run_in_parallel() {
    let h = HarnessBuilder::new(Host::new(1, "edge-1", 10))
        .host(Host::new(2, "edge-2", 10))
        .probe(ScriptedProbe::always(true).with_delay(Duration::from_millis(50)))
        .build()
        .await;

    let (one, two) = tokio::join!(h.job.run(1), h.job.run(2));

    assert!(matches!(one, PassOutcome::Completed(_)));
    assert!(matches!(two, PassOutcome::Completed(_)));
}

#[tokio::test]
async fn panicking_pass_is_alerted_and_releases_lock() {
    let h = HarnessBuilder::new(Host::new(1, "edge-1", 10))
        .probe(ScriptedProbe::always(true).with_panics(1))
        .build()
        .await;

    let job = h.job.clone();
    let first = tokio::spawn(async move { job.run(1).await })
        .await
        .expect("a collaborator panic stays inside the pass");

    let PassOutcome::Failed { error } = first else {
        panic!("a panicking pass should fail, got {:?}", first);
    };
    assert!(error.contains("probe transport crashed"), "{}", error);
    assert_eq!(h.alerts.count(), 1, "the panic is reported once");
    assert!(!h.lock.is_held(1));

    for _ in 0..3 {
        let outcome = h.job.run(1).await;
        assert!(
            matches!(outcome, PassOutcome::Completed(_)),
            "later passes run instead of being dropped: {:?}",
            outcome
        );
    }
    assert_eq!(h.alerts.count(), 1);
}
