//! Integration tests for the restore coordinator.
//!
//! The default app runs sequence 2 and is restored from a backup taken at
//! sequence 1. Agent results are fed back through the result callbacks.

mod support;

use std::sync::Arc;

use harbormaster::application::ResultCallbacks;
use harbormaster::domain::backup::APP_SLUG_LABEL;
use harbormaster::domain::command::encode_manifests;
use harbormaster::domain::{
    AppId, DeployAction, LabelSelector, RestorePhase, RestoreState, SessionId,
};
use harbormaster::port::outbound::store::Store;
use harbormaster::testkit::domain::{instance_backup, single_app_backup};
use harbormaster::testkit::fake::RecordingSupportBundles;
use harbormaster::testkit::session::{connect, drain};
use support::agent::{deploys, deployed_sequences};
use support::world::{archive, cluster, World};

const BACKUP: &str = "nightly";

fn restoring_world(world: &World) -> AppId {
    let app_id = world.seed_default(Some(2));
    world
        .backups
        .insert_backup(single_app_backup(BACKUP, "app", 1, &["app-ns"]));
    assert!(world.store.request_restore(&app_id, BACKUP));
    app_id
}

fn state(world: &World, app_id: &AppId) -> RestoreState {
    world.store.app(app_id).unwrap().restore_state
}

/// Walk the restore up to a created restore object.
async fn through_undeploy(world: &World, app_id: &AppId) {
    world.restore.tick().await;
    world
        .callbacks
        .undeploy_result(app_id, true, "")
        .await
        .unwrap();
    world.restore.tick().await;
}

// ---------------------------------------------------------------------------
// Undeploy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_tick_undeploys_current_release() {
    let world = World::new();
    let app_id = restoring_world(&world);
    let mut rx = connect(&world.registry, "s1", "cluster-1");

    assert_eq!(world.restore.tick().await, 1);

    assert_eq!(state(&world, &app_id), RestoreState::UndeployInProgress);
    let sent = deploys(&drain(&mut rx));
    assert_eq!(sent.len(), 1);
    let undeploy = &sent[0];
    assert_eq!(undeploy.action, DeployAction::Undeploy);
    assert_eq!(undeploy.sequence, 2);
    assert!(undeploy.manifests.is_empty());
    assert_eq!(
        undeploy.previous_manifests,
        Some(encode_manifests(&archive(&app_id, 2)))
    );
    assert_eq!(undeploy.clear_namespaces, vec!["app-ns".to_string()]);
    assert!(undeploy.clear_pvcs);
    assert!(undeploy.wait);
    assert_eq!(undeploy.result_callback_path, "/api/v1/undeploy/result");
}

#[tokio::test]
async fn waiting_for_undeploy_sends_nothing_more() {
    let world = World::new();
    let app_id = restoring_world(&world);
    let mut rx = connect(&world.registry, "s1", "cluster-1");

    world.restore.tick().await;
    drain(&mut rx);
    world.restore.tick().await;
    world.dispatcher.tick().await;

    assert!(drain(&mut rx).is_empty());
    assert_eq!(state(&world, &app_id), RestoreState::UndeployInProgress);
}

#[tokio::test]
async fn restore_waits_for_a_connected_agent() {
    let world = World::new();
    let app_id = restoring_world(&world);

    world.restore.tick().await;
    assert_eq!(state(&world, &app_id), RestoreState::None);
    assert!(world.store.app(&app_id).unwrap().restore_in_progress.is_some());

    let mut rx = connect(&world.registry, "s1", "cluster-1");
    world.restore.tick().await;
    assert_eq!(state(&world, &app_id), RestoreState::UndeployInProgress);
    assert_eq!(deploys(&drain(&mut rx)).len(), 1);
}

#[tokio::test]
async fn nothing_deployed_skips_straight_to_restore() {
    let world = World::new();
    let app_id = world.seed_default(None);
    world
        .backups
        .insert_backup(single_app_backup(BACKUP, "app", 1, &["app-ns"]));
    world.store.request_restore(&app_id, BACKUP);
    let mut rx = connect(&world.registry, "s1", "cluster-1");

    world.restore.tick().await;

    assert!(drain(&mut rx).is_empty());
    assert_eq!(state(&world, &app_id), RestoreState::UndeployCompleted);
}

#[tokio::test]
async fn missing_backup_abandons_restore() {
    let world = World::new();
    let app_id = world.seed_default(Some(2));
    world.store.request_restore(&app_id, "ghost");
    let mut rx = connect(&world.registry, "s1", "cluster-1");

    world.restore.tick().await;

    let app = world.store.app(&app_id).unwrap();
    assert_eq!(app.restore_in_progress, None);
    assert_eq!(app.restore_state, RestoreState::None);
    assert_eq!(
        world.store.restore_history(&app_id),
        vec![RestoreState::RestoreFailed, RestoreState::None]
    );
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn agent_answering_during_dispatch_is_not_lost() {
    for _ in 0..50 {
        let world = World::new();
        let app_id = restoring_world(&world);
        let mut rx = connect(&world.registry, "s1", "cluster-1");

        // The agent posts its result the moment the command lands.
        let shared: Arc<dyn Store> = world.store.clone();
        let agent_app = app_id.clone();
        let agent = tokio::spawn(async move {
            let command = rx.recv().await;
            ResultCallbacks::new(shared)
                .undeploy_result(&agent_app, true, "")
                .await
                .unwrap();
            command
        });

        world.restore.tick().await;
        let command = agent.await.unwrap().expect("undeploy was sent");

        assert_eq!(deploys(&[command])[0].action, DeployAction::Undeploy);
        assert_eq!(state(&world, &app_id), RestoreState::UndeployCompleted);
        assert_eq!(
            world.store.restore_history(&app_id),
            vec![RestoreState::UndeployInProgress, RestoreState::UndeployCompleted]
        );
    }
}

#[tokio::test]
async fn unsent_undeploy_is_retried_next_tick() {
    let world = World::new();
    let app_id = restoring_world(&world);
    drop(connect(&world.registry, "s1", "cluster-1"));

    world.restore.tick().await;

    assert_eq!(state(&world, &app_id), RestoreState::UndeployRequested);
    assert_eq!(
        world.store.restore_history(&app_id),
        vec![RestoreState::UndeployInProgress, RestoreState::UndeployRequested]
    );

    world.registry.on_disconnect(&SessionId::new("s1"));
    let mut rx = connect(&world.registry, "s2", "cluster-1");
    world.restore.tick().await;

    assert_eq!(state(&world, &app_id), RestoreState::UndeployInProgress);
    let sent = deploys(&drain(&mut rx));
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].action, DeployAction::Undeploy);
}

#[tokio::test]
async fn unrenderable_undeploy_leaves_state_untouched() {
    let world = World::new();
    let app_id = restoring_world(&world);
    let mut rx = connect(&world.registry, "s1", "cluster-1");
    world.renderer.fail_sequence(2);

    world.restore.tick().await;

    assert_eq!(state(&world, &app_id), RestoreState::None);
    assert!(world.store.restore_history(&app_id).is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn failed_undeploy_abandons_restore() {
    let world = World::new();
    let app_id = restoring_world(&world);
    let _rx = connect(&world.registry, "s1", "cluster-1");

    world.restore.tick().await;
    world
        .callbacks
        .undeploy_result(&app_id, false, "namespace stuck terminating")
        .await
        .unwrap();
    assert_eq!(state(&world, &app_id), RestoreState::RestoreFailed);

    world.restore.tick().await;
    let app = world.store.app(&app_id).unwrap();
    assert_eq!(app.restore_in_progress, None);
    assert_eq!(app.restore_state, RestoreState::None);
    assert!(world.backups.restores().is_empty());
}

#[tokio::test]
async fn undeploy_result_outside_undeploy_is_ignored() {
    let world = World::new();
    let app_id = restoring_world(&world);

    world
        .callbacks
        .undeploy_result(&app_id, true, "")
        .await
        .unwrap();

    assert_eq!(state(&world, &app_id), RestoreState::None);
}

// ---------------------------------------------------------------------------
// Restore and redeploy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn restore_object_is_created_exactly_once() {
    let world = World::new();
    let app_id = restoring_world(&world);
    let _rx = connect(&world.registry, "s1", "cluster-1");

    through_undeploy(&world, &app_id).await;
    assert_eq!(state(&world, &app_id), RestoreState::RestorePolling);

    world.restore.tick().await;
    world.restore.tick().await;

    let restores = world.backups.restores();
    assert_eq!(restores.len(), 1);
    assert_eq!(restores[0].name, BACKUP);
    assert_eq!(restores[0].backup_name, BACKUP);
    assert_eq!(restores[0].selector, None);
    assert_eq!(state(&world, &app_id), RestoreState::RestorePolling);
}

#[tokio::test]
async fn completed_restore_redeploys_backup_sequence() {
    let world = World::new();
    let app_id = restoring_world(&world);
    let mut rx = connect(&world.registry, "s1", "cluster-1");

    through_undeploy(&world, &app_id).await;
    drain(&mut rx);
    assert!(world.backups.set_restore_phase(BACKUP, RestorePhase::Completed));
    world.restore.tick().await;

    assert_eq!(deployed_sequences(&drain(&mut rx)), vec![1]);
    assert_eq!(world.store.desired(&app_id, &cluster()), Some(1));
    let app = world.store.app(&app_id).unwrap();
    assert_eq!(app.restore_in_progress, None);
    assert_eq!(app.restore_state, RestoreState::None);
    assert_eq!(world.bundles.collected(), vec![app_id.clone()]);

    assert_eq!(world.dispatcher.tick().await, 0);
    assert_eq!(
        world.registry.last_dispatched(&SessionId::new("s1"), &app_id),
        Some(1)
    );
}

#[tokio::test]
async fn support_bundle_failure_does_not_block_completion() {
    let world = World::with_bundles(RecordingSupportBundles::failing());
    let app_id = restoring_world(&world);
    let mut rx = connect(&world.registry, "s1", "cluster-1");

    through_undeploy(&world, &app_id).await;
    world.backups.set_restore_phase(BACKUP, RestorePhase::Completed);
    world.restore.tick().await;

    assert!(deployed_sequences(&drain(&mut rx)).contains(&1));
    assert_eq!(world.store.app(&app_id).unwrap().restore_in_progress, None);
    assert_eq!(world.bundles.collected().len(), 1);
}

#[tokio::test]
async fn failed_restore_clears_flag_without_redeploy() {
    let world = World::new();
    let app_id = restoring_world(&world);
    let mut rx = connect(&world.registry, "s1", "cluster-1");

    through_undeploy(&world, &app_id).await;
    drain(&mut rx);
    world
        .backups
        .set_restore_phase(BACKUP, RestorePhase::PartiallyFailed);
    world.restore.tick().await;

    assert!(drain(&mut rx).is_empty());
    let app = world.store.app(&app_id).unwrap();
    assert_eq!(app.restore_in_progress, None);
    assert_eq!(app.restore_state, RestoreState::None);
    assert!(world.bundles.collected().is_empty());
    assert_eq!(world.store.desired(&app_id, &cluster()), Some(2));
}

#[tokio::test]
async fn instance_backup_restores_only_the_app() {
    let world = World::new();
    let app_id = world.seed_default(Some(2));
    world.backups.insert_backup(instance_backup(
        "instance-7",
        &[("app", 0), ("other", 4)],
        &["app-ns", "other-ns"],
    ));
    world.store.request_restore(&app_id, "instance-7");
    let mut rx = connect(&world.registry, "s1", "cluster-1");

    through_undeploy(&world, &app_id).await;

    let restores = world.backups.restores();
    assert_eq!(restores.len(), 1);
    assert_eq!(restores[0].name, "instance-7.app");
    assert_eq!(
        restores[0].selector,
        Some(LabelSelector {
            key: APP_SLUG_LABEL.to_string(),
            value: "app".to_string(),
        })
    );

    drain(&mut rx);
    world
        .backups
        .set_restore_phase("instance-7.app", RestorePhase::Completed);
    world.restore.tick().await;
    assert_eq!(deployed_sequences(&drain(&mut rx)), vec![0]);
}
