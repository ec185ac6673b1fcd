//! Integration tests for the deploy dispatcher.
//!
//! Each test wires the dispatcher to an in-memory store and fake agent
//! sessions, runs ticks by hand and inspects the queued commands.

mod support;

use harbormaster::domain::command::encode_manifests;
use harbormaster::domain::{AgentCommand, ClusterId, ReleaseStatus, SessionId};
use harbormaster::error::Error;
use harbormaster::port::outbound::store::ReleaseStore;
use harbormaster::testkit::domain::{self, release, semver_release};
use harbormaster::testkit::session::{connect, drain};
use support::agent::{deploys, deployed_sequences, kinds};
use support::world::{archive, cluster, World};

// ---------------------------------------------------------------------------
// Dispatch memory
// ---------------------------------------------------------------------------

#[tokio::test]
async fn desired_sequence_is_dispatched_once_per_change() {
    let world = World::new();
    let app_id = world.seed_default(Some(0));
    let mut rx = connect(&world.registry, "s1", "cluster-1");

    assert_eq!(world.dispatcher.tick().await, 1);
    let commands = drain(&mut rx);
    let sent = deploys(&commands);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].sequence, 0);
    assert_eq!(sent[0].app_slug, "app");
    assert_eq!(sent[0].manifests, encode_manifests(&archive(&app_id, 0)));
    assert_eq!(sent[0].previous_manifests, None);
    assert_eq!(sent[0].result_callback_path, "/api/v1/deploy/result");

    assert_eq!(world.dispatcher.tick().await, 0);
    assert!(drain(&mut rx).is_empty());

    world.store.set_desired(&app_id, &cluster(), 1);
    assert_eq!(world.dispatcher.tick().await, 1);
    let sent = deploys(&drain(&mut rx));
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].sequence, 1);
    assert_eq!(
        sent[0].previous_manifests,
        Some(encode_manifests(&archive(&app_id, 0)))
    );
}

#[tokio::test]
async fn every_session_of_a_cluster_gets_its_own_deploy() {
    let world = World::new();
    world.seed_default(Some(2));
    let mut a = connect(&world.registry, "s1", "cluster-1");
    let mut b = connect(&world.registry, "s2", "cluster-1");
    let mut other = connect(&world.registry, "s3", "cluster-9");

    assert_eq!(world.dispatcher.tick().await, 2);
    assert_eq!(deployed_sequences(&drain(&mut a)), vec![2]);
    assert_eq!(deployed_sequences(&drain(&mut b)), vec![2]);
    assert!(drain(&mut other).is_empty());
}

#[tokio::test]
async fn reconnected_session_starts_with_empty_memory() {
    let world = World::new();
    world.seed_default(Some(1));
    let mut first = connect(&world.registry, "s1", "cluster-1");
    world.dispatcher.tick().await;
    assert_eq!(deployed_sequences(&drain(&mut first)), vec![1]);

    world.registry.on_disconnect(&SessionId::new("s1"));
    let mut second = connect(&world.registry, "s2", "cluster-1");
    assert_eq!(world.dispatcher.tick().await, 1);
    assert_eq!(deployed_sequences(&drain(&mut second)), vec![1]);
}

#[tokio::test]
async fn apps_without_desired_sequence_are_left_alone() {
    let world = World::new();
    world.seed_default(None);
    let mut rx = connect(&world.registry, "s1", "cluster-1");

    assert_eq!(world.dispatcher.tick().await, 0);
    assert!(drain(&mut rx).is_empty());
}

// ---------------------------------------------------------------------------
// Statuses and follow-up commands
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatched_release_is_marked_deploying_and_ready() {
    let world = World::new();
    let app_id = world.seed_default(Some(2));
    let _rx = connect(&world.registry, "s1", "cluster-1");

    world.dispatcher.tick().await;

    assert_eq!(
        world.store.release_status(&app_id, &cluster(), 2),
        Some((ReleaseStatus::Deploying, None))
    );
    assert!(world.store.is_ready(&app_id, &cluster()));
}

#[tokio::test]
async fn informers_are_sent_instead_of_marking_ready() {
    let world = World::new();
    let app_id = world.seed_default(Some(2));
    world
        .store
        .set_informers(&app_id, vec!["deployment/web".to_string()]);
    let mut rx = connect(&world.registry, "s1", "cluster-1");

    world.dispatcher.tick().await;

    let commands = drain(&mut rx);
    assert_eq!(kinds(&commands), vec!["deploy", "app_informers"]);
    match &commands[1] {
        AgentCommand::AppInformers { app_id: id, informers } => {
            assert_eq!(id, &app_id);
            assert_eq!(informers, &vec!["deployment/web".to_string()]);
        }
        other => panic!("expected informers, got {other:?}"),
    }
    assert!(!world.store.is_ready(&app_id, &cluster()));
}

#[tokio::test]
async fn render_failure_marks_release_failed_and_is_retried() {
    let world = World::new();
    let app_id = world.seed_default(Some(1));
    let mut rx = connect(&world.registry, "s1", "cluster-1");
    world.renderer.fail_sequence(1);

    assert_eq!(world.dispatcher.tick().await, 0);
    assert!(deploys(&drain(&mut rx)).is_empty());
    let (status, message) = world
        .store
        .release_status(&app_id, &cluster(), 1)
        .unwrap();
    assert_eq!(status, ReleaseStatus::Failed);
    assert!(message.unwrap().contains("failed to render sequence 1"));

    world.renderer.heal();
    assert_eq!(world.dispatcher.tick().await, 1);
    assert_eq!(deployed_sequences(&drain(&mut rx)), vec![1]);
    assert!(world.renderer.attempts() >= 2);
}

#[tokio::test]
async fn repeated_render_failure_is_recorded_once() {
    let world = World::new();
    let app_id = world.seed_default(Some(1));
    let mut rx = connect(&world.registry, "s1", "cluster-1");
    world.renderer.fail_sequence(1);

    world.dispatcher.tick().await;
    assert_eq!(
        world.store.release_status(&app_id, &cluster(), 1).unwrap().0,
        ReleaseStatus::Failed
    );

    // An operator resets the status; retries must not keep overwriting it.
    world
        .store
        .set_release_status(&app_id, &cluster(), 1, ReleaseStatus::Pending, None)
        .await
        .unwrap();
    let attempts = world.renderer.attempts();
    world.dispatcher.tick().await;
    world.dispatcher.tick().await;

    assert_eq!(world.renderer.attempts(), attempts + 2);
    assert_eq!(
        world.store.release_status(&app_id, &cluster(), 1).unwrap(),
        (ReleaseStatus::Pending, None)
    );
    assert!(drain(&mut rx).is_empty());

    // Once a render succeeds, a later failure is reported again.
    world.renderer.heal();
    assert_eq!(world.dispatcher.tick().await, 1);
    world.renderer.fail_sequence(2);
    world.store.set_desired(&app_id, &cluster(), 2);
    world.dispatcher.tick().await;
    let (status, message) = world.store.release_status(&app_id, &cluster(), 2).unwrap();
    assert_eq!(status, ReleaseStatus::Failed);
    assert!(message.unwrap().contains("failed to render sequence 2"));
}

#[tokio::test]
async fn preflights_are_requested_once_per_session() {
    let world = World::new();
    let app_id = world.seed_default(Some(0));
    let mut preflight = release(3, "3", "1.2.0");
    preflight.status = ReleaseStatus::PendingPreflight;
    world.store.insert_release(&app_id, preflight);
    let mut rx = connect(&world.registry, "s1", "cluster-1");

    world.dispatcher.tick().await;
    let commands = drain(&mut rx);
    assert_eq!(kinds(&commands), vec!["deploy", "preflight"]);
    match &commands[1] {
        AgentCommand::Preflight { sequence, uri, .. } => {
            assert_eq!(*sequence, 3);
            assert_eq!(uri, "http://localhost:8800/api/v1/preflight/app/app/sequence/3");
        }
        other => panic!("expected preflight, got {other:?}"),
    }

    world.dispatcher.tick().await;
    assert!(drain(&mut rx).is_empty());

    let mut fresh = connect(&world.registry, "s2", "cluster-1");
    world.dispatcher.tick().await;
    assert_eq!(kinds(&drain(&mut fresh)), vec!["deploy", "preflight"]);
}

#[tokio::test]
async fn restoring_apps_are_not_dispatched() {
    let world = World::new();
    let app_id = world.seed_default(Some(2));
    assert!(world.store.request_restore(&app_id, "nightly"));
    let mut rx = connect(&world.registry, "s1", "cluster-1");

    assert_eq!(world.dispatcher.tick().await, 0);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn closed_session_does_not_stop_other_sessions() {
    let world = World::new();
    world.seed_default(Some(2));
    let closed = connect(&world.registry, "s1", "cluster-1");
    drop(closed);
    let mut open = connect(&world.registry, "s2", "cluster-1");

    assert_eq!(world.dispatcher.tick().await, 1);
    assert_eq!(deployed_sequences(&drain(&mut open)), vec![2]);
}

// ---------------------------------------------------------------------------
// Forced redeploy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn redeploy_bypasses_and_resets_dispatch_memory() {
    let world = World::new();
    let app_id = world.seed_default(Some(2));
    let mut rx = connect(&world.registry, "s1", "cluster-1");
    world.dispatcher.tick().await;
    drain(&mut rx);

    let app = world.store.app(&app_id).unwrap();
    let sessions = world.dispatcher.redeploy(&app, &cluster(), 2).await.unwrap();
    assert_eq!(sessions, 1);

    let sent = deploys(&drain(&mut rx));
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].sequence, 2);
    assert_eq!(sent[0].previous_manifests, None);

    assert_eq!(world.dispatcher.tick().await, 0);
    assert_eq!(world.registry.last_dispatched(&SessionId::new("s1"), &app_id), Some(2));
}

#[tokio::test]
async fn redeploy_without_sessions_fails() {
    let world = World::new();
    let app_id = world.seed(
        domain::app("solo"),
        vec![semver_release(0, "1.0.0")],
        Some(0),
    );
    let app = world.store.app(&app_id).unwrap();

    let err = world
        .dispatcher
        .redeploy(&app, &ClusterId::new("cluster-1"), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoSession(_)));
}
