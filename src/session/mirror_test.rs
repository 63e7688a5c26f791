use super::*;
use crate::session::test_helpers::{MockAuth, MockProfiles, profile, session_for, signed_in, signed_out};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

use crate::session::store::AuthSnapshot;

fn mirror_with(auth: MockAuth, profiles: MockProfiles) -> (SessionMirror, Arc<MockAuth>, Arc<MockProfiles>) {
    let auth = Arc::new(auth);
    let profiles = Arc::new(profiles);
    let store = ProfileStore::new(auth.clone(), profiles.clone());
    (SessionMirror::start(store), auth, profiles)
}

async fn wait_for(rx: &mut watch::Receiver<AuthSnapshot>, f: impl FnMut(&AuthSnapshot) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(f))
        .await
        .expect("timed out waiting for auth state")
        .expect("store dropped");
}

fn profile_id(snap: &AuthSnapshot) -> Option<Uuid> {
    snap.profile.as_ref().map(|p| p.id)
}

// =============================================================================
// initialize
// =============================================================================

#[tokio::test]
async fn initialize_with_session_loads_profile() {
    let a = Uuid::new_v4();
    let (profiles, _done) = MockProfiles::new(vec![profile(a, "A")]);
    let (mirror, _, _) = mirror_with(MockAuth::with_session(session_for(a)), profiles);
    assert!(mirror.store().snapshot().loading);

    mirror.initialize().await;
    let snap = mirror.store().snapshot();
    assert!(!snap.loading);
    assert_eq!(snap.identity.map(|i| i.id), Some(a));
    assert_eq!(snap.profile.map(|p| p.name), Some("A".to_owned()));
}

#[tokio::test]
async fn initialize_without_session_finishes_loading() {
    let (profiles, _done) = MockProfiles::new(vec![]);
    let (mirror, _, profiles) = mirror_with(MockAuth::default(), profiles);

    mirror.initialize().await;
    let snap = mirror.store().snapshot();
    assert!(!snap.loading);
    assert!(snap.identity.is_none());
    assert_eq!(profiles.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn initialize_session_error_finishes_loading() {
    let (profiles, _done) = MockProfiles::new(vec![]);
    let auth = MockAuth { fail_get_session: true, ..MockAuth::default() };
    let (mirror, _, _) = mirror_with(auth, profiles);

    mirror.initialize().await;
    assert!(!mirror.store().snapshot().loading);
    assert!(!mirror.store().snapshot().is_signed_in());
}

#[tokio::test]
async fn initialize_profile_failure_keeps_identity() {
    let a = Uuid::new_v4();
    let (profiles, _done) = MockProfiles::new(vec![profile(a, "A")]);
    let (mirror, _, _) = mirror_with(MockAuth::with_session(session_for(a)), profiles.failing_for(a));

    mirror.initialize().await;
    let snap = mirror.store().snapshot();
    assert!(!snap.loading);
    assert_eq!(snap.identity.map(|i| i.id), Some(a));
    assert!(snap.profile.is_none());
}

#[tokio::test]
async fn initialize_keeps_sign_in_from_newer_notification() {
    let a = Uuid::new_v4();
    let (profiles, _done) = MockProfiles::new(vec![profile(a, "A")]);
    let (mirror, auth, _) = mirror_with(MockAuth::default(), profiles);
    let (entered, release) = auth.gate_get_session();
    let mut rx = mirror.store().subscribe();

    let interleave = async {
        entered.await.unwrap();
        auth.listeners.emit(&signed_in(a));
        wait_for(&mut rx, |s| profile_id(s) == Some(a)).await;
        release.send(()).unwrap();
    };
    tokio::join!(mirror.initialize(), interleave);

    let snap = mirror.store().snapshot();
    assert!(!snap.loading);
    assert_eq!(profile_id(&snap), Some(a));
    assert_eq!(snap.identity.map(|i| i.id), Some(a));
}

#[tokio::test]
async fn initialize_keeps_sign_out_from_newer_notification() {
    let a = Uuid::new_v4();
    let (profiles, _done) = MockProfiles::new(vec![profile(a, "A")]);
    let (mirror, auth, profiles) = mirror_with(MockAuth::with_session(session_for(a)), profiles);
    let (entered, release) = auth.gate_get_session();
    let mut rx = mirror.store().subscribe();
    let before = mirror.store().snapshot().epoch();

    let interleave = async {
        entered.await.unwrap();
        auth.listeners.emit(&signed_out());
        wait_for(&mut rx, |s| s.epoch() > before).await;
        release.send(()).unwrap();
    };
    tokio::join!(mirror.initialize(), interleave);

    let snap = mirror.store().snapshot();
    assert!(!snap.loading);
    assert!(snap.identity.is_none());
    assert!(snap.profile.is_none());
    assert_eq!(profiles.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

// =============================================================================
// Notifications
// =============================================================================

#[tokio::test]
async fn sign_in_notification_loads_profile() {
    let a = Uuid::new_v4();
    let (profiles, _done) = MockProfiles::new(vec![profile(a, "A")]);
    let (mirror, auth, _) = mirror_with(MockAuth::default(), profiles);
    let mut rx = mirror.store().subscribe();

    auth.listeners.emit(&signed_in(a));
    wait_for(&mut rx, |s| profile_id(s) == Some(a)).await;
    assert_eq!(mirror.store().snapshot().identity.map(|i| i.id), Some(a));
}

#[tokio::test]
async fn sign_out_notification_clears_profile_immediately() {
    let a = Uuid::new_v4();
    let (profiles, _done) = MockProfiles::new(vec![profile(a, "A")]);
    let (mirror, _, _) = mirror_with(MockAuth::default(), profiles);
    let mut rx = mirror.store().subscribe();

    mirror.on_session_change(signed_in(a));
    wait_for(&mut rx, |s| profile_id(s) == Some(a)).await;

    mirror.on_session_change(signed_out());
    let snap = mirror.store().snapshot();
    assert!(snap.identity.is_none());
    assert!(snap.profile.is_none());
}

#[tokio::test]
async fn newer_identity_wins_over_slow_fetch() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let (profiles, mut done) = MockProfiles::new(vec![profile(a, "A"), profile(b, "B")]);
    let (mirror, _, profiles) = mirror_with(MockAuth::default(), profiles);
    let mut rx = mirror.store().subscribe();

    let release_a = profiles.gate(a);
    mirror.on_session_change(signed_in(a));
    tokio::task::yield_now().await;

    mirror.on_session_change(signed_in(b));
    wait_for(&mut rx, |s| profile_id(s) == Some(b)).await;
    assert_eq!(done.recv().await, Some(b));

    release_a.send(()).unwrap();
    assert_eq!(done.recv().await, Some(a));
    tokio::task::yield_now().await;

    let snap = mirror.store().snapshot();
    assert_eq!(snap.identity.map(|i| i.id), Some(b));
    assert_eq!(snap.profile.map(|p| p.name), Some("B".to_owned()));
}

#[tokio::test]
async fn failed_fetch_leaves_profile_unset() {
    let a = Uuid::new_v4();
    let (profiles, mut done) = MockProfiles::new(vec![profile(a, "A")]);
    let (mirror, _, _) = mirror_with(MockAuth::default(), profiles.failing_for(a));

    mirror.on_session_change(signed_in(a));
    assert_eq!(done.recv().await, Some(a));
    tokio::task::yield_now().await;

    let snap = mirror.store().snapshot();
    assert_eq!(snap.identity.map(|i| i.id), Some(a));
    assert!(snap.profile.is_none());
}

// =============================================================================
// teardown
// =============================================================================

#[tokio::test]
async fn teardown_twice_is_noop() {
    let (profiles, _done) = MockProfiles::new(vec![]);
    let (mirror, auth, _) = mirror_with(MockAuth::default(), profiles);
    assert_eq!(auth.listeners.len(), 1);

    assert!(mirror.teardown());
    assert!(!mirror.teardown());
    assert!(mirror.is_torn_down());
    assert!(auth.listeners.is_empty());
}

#[tokio::test]
async fn no_updates_after_teardown() {
    let a = Uuid::new_v4();
    let (profiles, _done) = MockProfiles::new(vec![profile(a, "A")]);
    let (mirror, auth, _) = mirror_with(MockAuth::default(), profiles);
    mirror.teardown();

    auth.listeners.emit(&signed_in(a));
    mirror.on_session_change(signed_in(a));
    tokio::task::yield_now().await;

    assert!(mirror.store().snapshot().identity.is_none());
}

#[tokio::test]
async fn teardown_aborts_in_flight_fetch() {
    let a = Uuid::new_v4();
    let (profiles, _done) = MockProfiles::new(vec![profile(a, "A")]);
    let (mirror, _, profiles) = mirror_with(MockAuth::default(), profiles);

    let release_a = profiles.gate(a);
    mirror.on_session_change(signed_in(a));
    tokio::task::yield_now().await;
    mirror.teardown();

    // The gate's receiver is dropped with the aborted fetch.
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }
    assert!(release_a.send(()).is_err());
    assert!(mirror.store().snapshot().profile.is_none());
}

#[tokio::test]
async fn drop_unsubscribes() {
    let (profiles, _done) = MockProfiles::new(vec![]);
    let (mirror, auth, _) = mirror_with(MockAuth::default(), profiles);
    drop(mirror);
    assert!(auth.listeners.is_empty());
}
