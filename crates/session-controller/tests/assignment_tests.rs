//! Assignment policy and roster tests.
//!
//! Verifies first-fit selection in creation order, single creation at
//! saturation, and that concurrent joins never overfill a session.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::Arc;

use session_controller::actors::{RegistryConfig, SessionRegistryHandle};
use session_controller::broadcast::mock::RecordingBroadcaster;
use session_controller::errors::ScError;
use session_controller::models::{ConnectionHandle, Participant};
use session_controller::provider::mock::MockMediaProvider;

fn registry(capacity: usize, provider: Arc<MockMediaProvider>) -> SessionRegistryHandle {
    SessionRegistryHandle::new(
        "sc-assignment-test".to_string(),
        RegistryConfig {
            session_capacity: capacity,
            ..RegistryConfig::default()
        },
        provider,
        Arc::new(RecordingBroadcaster::new()),
    )
}

fn participant(name: &str, connection_id: &str) -> Participant {
    let (handle, _rx) = ConnectionHandle::new(connection_id, 8);
    Participant::new(name, handle)
}

async fn fill(registry: &SessionRegistryHandle, session: &str, count: usize, prefix: &str) {
    for i in 0..count {
        registry
            .add_participant(session, participant("P", &format!("{prefix}-{i}")))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_empty_registry_creates_session() {
    let provider = Arc::new(MockMediaProvider::new());
    let registry = registry(6, provider.clone());

    let name = registry.find_or_create_available_session().await.unwrap();

    assert!(name.starts_with("session-"));
    assert_eq!(provider.sessions_created(), 1);
    assert!(registry.get_session(&name).await.unwrap().is_some());
}

#[tokio::test]
async fn test_first_fit_prefers_earliest_session() {
    let provider = Arc::new(MockMediaProvider::new());
    let registry = registry(6, provider.clone());

    registry.create_session("first").await.unwrap();
    registry.create_session("second").await.unwrap();
    fill(&registry, "first", 3, "a").await;

    // Both have room; the earliest-created wins even though it is fuller
    assert_eq!(
        registry.find_or_create_available_session().await.unwrap(),
        "first"
    );

    fill(&registry, "first", 3, "b").await;
    assert_eq!(
        registry.find_or_create_available_session().await.unwrap(),
        "second"
    );
    assert_eq!(provider.sessions_created(), 2);
}

#[tokio::test]
async fn test_saturation_creates_exactly_one_session() {
    let provider = Arc::new(MockMediaProvider::new());
    let registry = registry(6, provider.clone());

    registry.create_session("a").await.unwrap();
    registry.create_session("b").await.unwrap();
    fill(&registry, "a", 6, "a").await;
    fill(&registry, "b", 6, "b").await;

    let fresh = registry.find_or_create_available_session().await.unwrap();
    assert_ne!(fresh, "a");
    assert_ne!(fresh, "b");
    assert_eq!(provider.sessions_created(), 3);

    // The new empty session is reused until it fills
    let again = registry.find_or_create_available_session().await.unwrap();
    assert_eq!(fresh, again);
    assert_eq!(provider.sessions_created(), 3);
}

#[tokio::test]
async fn test_assign_fills_sessions_in_order() {
    let provider = Arc::new(MockMediaProvider::new());
    let registry = registry(2, provider.clone());

    let mut placements = Vec::new();
    for i in 0..5 {
        let assignment = registry
            .assign_participant(participant("P", &format!("c{i}")))
            .await
            .unwrap();
        placements.push((assignment.session, assignment.roster_len));
    }

    assert_eq!(placements[0].0, placements[1].0);
    assert_eq!(placements[2].0, placements[3].0);
    assert_ne!(placements[1].0, placements[2].0);
    assert_ne!(placements[3].0, placements[4].0);
    assert_eq!(
        placements.iter().map(|p| p.1).collect::<Vec<_>>(),
        vec![1, 2, 1, 2, 1]
    );
    assert_eq!(provider.sessions_created(), 3);

    let sessions = registry.list_sessions().await.unwrap();
    let names: Vec<&str> = sessions.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            placements[0].0.as_str(),
            placements[2].0.as_str(),
            placements[4].0.as_str()
        ]
    );
}

#[tokio::test]
async fn test_concurrent_joins_never_overfill() {
    let provider = Arc::new(MockMediaProvider::new());
    let registry = registry(6, provider.clone());

    let joins = (0..20).map(|i| {
        let registry = registry.clone();
        tokio::spawn(async move {
            registry
                .assign_participant(participant("P", &format!("c{i}")))
                .await
                .unwrap()
        })
    });
    let results = futures::future::join_all(joins).await;
    assert!(results.iter().all(Result::is_ok));

    let sessions = registry.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 4);
    assert!(sessions.iter().all(|s| s.participant_count <= 6));
    assert_eq!(
        sessions.iter().map(|s| s.participant_count).sum::<usize>(),
        20
    );
}

#[tokio::test]
async fn test_assign_surfaces_provider_failure() {
    let provider = Arc::new(MockMediaProvider::failing());
    let registry = registry(6, provider);

    let result = registry
        .assign_participant(participant("Alice", "c1"))
        .await;
    assert!(matches!(result, Err(ScError::ProviderUnavailable(_))));
    assert!(registry.list_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_removed_connection_never_returned() {
    let registry = registry(6, Arc::new(MockMediaProvider::new()));
    registry.create_session("s").await.unwrap();
    registry
        .add_participant("s", participant("Sam", "c1"))
        .await
        .unwrap();
    registry
        .add_participant("s", participant("Sam", "c2"))
        .await
        .unwrap();
    registry
        .add_participant("s", participant("Sam", "c3"))
        .await
        .unwrap();

    registry.remove_participant("s", "c2").await.unwrap();

    let ids: Vec<String> = registry
        .get_participants("s")
        .await
        .unwrap()
        .iter()
        .map(|p| p.connection_id().to_string())
        .collect();
    assert_eq!(ids, vec!["c1", "c3"]);
}
