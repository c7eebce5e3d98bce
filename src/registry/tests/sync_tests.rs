//! Registry bootstrap tests
//!
//! Covers the enable flag, the three duplicate dimensions, idempotence, and
//! concurrent bootstrap from several nodes sharing one store.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;
use wicket_registry::{
    AuthorizationCache, InMemoryRegistryStore, JsonServiceSource, MatchDimension,
    RecordingObserver, RegistryStore, ServiceDefinition, ServicesManager, SledRegistryStore,
    StaticServiceSource, SyncEngine, SyncEvent,
};
use wicket_core::Service;

fn engine(
    init_from_json: bool,
    store: Arc<dyn RegistryStore>,
    candidates: Vec<ServiceDefinition>,
) -> (SyncEngine, Arc<ServicesManager>) {
    let cache = Arc::new(ServicesManager::new(store.clone()));
    let engine = SyncEngine::new(
        init_from_json,
        store,
        Arc::new(StaticServiceSource::new(candidates)),
        cache.clone(),
    );
    (engine, cache)
}

fn three_distinct() -> Vec<ServiceDefinition> {
    vec![
        ServiceDefinition::new(1, r"^https://one\.example\.org/.*", "One"),
        ServiceDefinition::new(2, r"^https://two\.example\.org/.*", "Two"),
        ServiceDefinition::new(3, r"^https://three\.example\.org/.*", "Three"),
    ]
}

async fn assert_no_duplicates(store: &dyn RegistryStore) {
    let definitions = store.load().await.unwrap();
    let ids: HashSet<_> = definitions.iter().map(|d| d.id).collect();
    let service_ids: HashSet<_> = definitions.iter().map(|d| d.service_id.clone()).collect();
    assert_eq!(ids.len(), definitions.len(), "duplicate ids in {:?}", definitions);
    assert_eq!(service_ids.len(), definitions.len(), "duplicate service ids in {:?}", definitions);
}

// ============================================================================
// ENABLE FLAG
// ============================================================================

#[tokio::test]
async fn test_disabled_leaves_store_and_cache_untouched() {
    let store = Arc::new(InMemoryRegistryStore::new());
    let (engine, cache) = engine(false, store.clone(), three_distinct());

    let before = store.size().await.unwrap();
    let report = engine.initialize_registry_if_necessary().await.unwrap();

    assert!(report.is_disabled());
    assert_eq!(store.size().await.unwrap(), before);
    assert_eq!(cache.count().await, 0);
    assert_eq!(cache.stats().loads, 0);
}

#[tokio::test]
async fn test_disabled_emits_guidance_only() {
    let observer = Arc::new(RecordingObserver::new());
    let store = Arc::new(InMemoryRegistryStore::new());
    let (engine, _) = engine(false, store, three_distinct());

    engine
        .with_observer(observer.clone())
        .initialize_registry_if_necessary()
        .await
        .unwrap();

    let events = observer.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[1], SyncEvent::InitializationDisabled { .. }));
}

// ============================================================================
// MERGE
// ============================================================================

#[tokio::test]
async fn test_empty_store_receives_all_distinct_candidates() {
    let store = Arc::new(InMemoryRegistryStore::new());
    let (engine, cache) = engine(true, store.clone(), three_distinct());

    let report = engine.initialize_registry_if_necessary().await.unwrap();

    assert_eq!(report.persisted.len(), 3);
    assert!(report.skipped.is_empty());
    assert_eq!(report.cache_count, Some(3));
    assert_eq!(cache.count().await, 3);
    assert_eq!(store.size().await.unwrap(), 3);
}

#[tokio::test]
async fn test_candidate_matching_existing_pattern_is_skipped() {
    let store = Arc::new(InMemoryRegistryStore::with_definitions([ServiceDefinition::new(
        10,
        r"^https://app\.example\.org.*",
        "Existing App",
    )]));
    let candidate = ServiceDefinition::new(11, "https://app.example.org/portal", "Portal");
    let (engine, _) = engine(true, store.clone(), vec![candidate]);

    let report = engine.initialize_registry_if_necessary().await.unwrap();

    assert!(report.persisted.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].dimension, MatchDimension::ServiceIdPattern);
    assert_eq!(report.skipped[0].existing.id, 10);
    assert_eq!(store.size().await.unwrap(), 1);
}

#[tokio::test]
async fn test_candidate_with_existing_id_is_skipped() {
    let store = Arc::new(InMemoryRegistryStore::with_definitions([ServiceDefinition::new(
        42,
        r"^https://legacy\.example\.org/.*",
        "Legacy",
    )]));
    let candidate = ServiceDefinition::new(42, r"^https://new\.example\.org/.*", "New");
    let (engine, cache) = engine(true, store.clone(), vec![candidate]);

    let report = engine.initialize_registry_if_necessary().await.unwrap();

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].dimension, MatchDimension::Id);
    assert_eq!(store.find_by_id(42).await.unwrap().unwrap().name, "Legacy");
    assert!(cache
        .find_service(&Service::new("https://new.example.org/home"))
        .is_none());
}

#[tokio::test]
async fn test_candidate_with_same_pattern_text_is_skipped() {
    let store = Arc::new(InMemoryRegistryStore::with_definitions([ServiceDefinition::new(
        1,
        r"^https://app\.example\.org/\d+$",
        "App",
    )]));
    let candidate = ServiceDefinition::new(2, r"^https://app\.example\.org/\d+$", "Copy");
    let (engine, _) = engine(true, store.clone(), vec![candidate]);

    let report = engine.initialize_registry_if_necessary().await.unwrap();

    assert_eq!(report.skipped[0].dimension, MatchDimension::ExactServiceId);
    assert_eq!(store.size().await.unwrap(), 1);
}

#[tokio::test]
async fn test_duplicates_within_one_source_keep_first() {
    let store = Arc::new(InMemoryRegistryStore::new());
    let candidates = vec![
        ServiceDefinition::new(1, r"^https://app\.example\.org/.*", "First"),
        ServiceDefinition::new(1, r"^https://other\.example\.org/.*", "Second"),
    ];
    let (engine, _) = engine(true, store.clone(), candidates);

    let report = engine.initialize_registry_if_necessary().await.unwrap();

    assert_eq!(report.persisted.len(), 1);
    assert_eq!(store.find_by_id(1).await.unwrap().unwrap().name, "First");
}

#[tokio::test]
async fn test_second_pass_is_a_no_op() {
    let store = Arc::new(InMemoryRegistryStore::new());
    let (engine, cache) = engine(true, store.clone(), three_distinct());

    engine.initialize_registry_if_necessary().await.unwrap();
    let snapshot = store.load().await.unwrap();

    let report = engine.initialize_registry_if_necessary().await.unwrap();

    assert!(report.persisted.is_empty());
    assert_eq!(report.skipped.len(), 3);
    assert_eq!(store.load().await.unwrap(), snapshot);
    assert_eq!(cache.count().await, 3);
}

// ============================================================================
// BACKENDS AND SOURCES
// ============================================================================

#[tokio::test]
async fn test_json_directory_into_sled_survives_restart() {
    let definitions = TempDir::new().unwrap();
    for (file, json) in [
        ("10-app.json", r#"{"id": 1, "serviceId": "^https://app\\.example\\.org/.*", "name": "App", "evaluationOrder": 1}"#),
        ("20-admin.json", r#"{"id": 2, "serviceId": "^https://admin\\.example\\.org/.*", "name": "Admin", "evaluationOrder": 0}"#),
    ] {
        std::fs::write(definitions.path().join(file), json).unwrap();
    }
    let data = TempDir::new().unwrap();

    for pass in 0..2 {
        let store: Arc<dyn RegistryStore> = Arc::new(SledRegistryStore::open(data.path()).unwrap());
        let cache = Arc::new(ServicesManager::new(store.clone()));
        let engine = SyncEngine::new(
            true,
            store.clone(),
            Arc::new(JsonServiceSource::new(definitions.path())),
            cache.clone(),
        );

        let report = engine.initialize_registry_if_necessary().await.unwrap();
        let expected_persisted = if pass == 0 { 2 } else { 0 };
        assert_eq!(report.persisted.len(), expected_persisted);
        assert_eq!(store.size().await.unwrap(), 2);

        let names: Vec<_> = cache.all_services().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Admin".to_string(), "App".to_string()]);
    }
}

#[tokio::test]
async fn test_concurrent_bootstrap_creates_no_duplicates() {
    let candidates: Vec<_> = (0..50)
        .map(|i| ServiceDefinition::new(i, format!(r"^https://svc{}\.example\.org/.*", i), format!("Service {}", i)))
        .collect();

    let stores: Vec<Arc<dyn RegistryStore>> = vec![
        Arc::new(InMemoryRegistryStore::new()),
        Arc::new(SledRegistryStore::temporary().unwrap()),
    ];

    for store in stores {
        let mut handles = Vec::new();
        for _ in 0..4 {
            let (engine, _) = engine(true, store.clone(), candidates.clone());
            handles.push(tokio::spawn(async move {
                engine.initialize_registry_if_necessary().await.unwrap()
            }));
        }

        let mut persisted = 0;
        for handle in handles {
            persisted += handle.await.unwrap().persisted.len();
        }

        assert_eq!(persisted, candidates.len(), "backend {}", store.name());
        assert_eq!(store.size().await.unwrap(), candidates.len());
        assert_no_duplicates(store.as_ref()).await;
    }
}

// ============================================================================
// PROPERTIES
// ============================================================================

fn candidate_strategy() -> impl Strategy<Value = ServiceDefinition> {
    (0i64..16, "[a-f]{1,2}").prop_map(|(id, host)| {
        ServiceDefinition::new(id, format!(r"^https://{}\.example\.org/.*", host), format!("svc-{}", host))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_sync_is_idempotent(
        existing in prop::collection::vec(candidate_strategy(), 0..6),
        candidates in prop::collection::vec(candidate_strategy(), 0..12),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let store = Arc::new(InMemoryRegistryStore::new());
            for definition in existing {
                store.insert_new(definition).await.unwrap();
            }
            let (engine, _) = engine(true, store.clone(), candidates.clone());

            let first = engine.initialize_registry_if_necessary().await.unwrap();
            let after_first = store.load().await.unwrap();

            let second = engine.initialize_registry_if_necessary().await.unwrap();
            let after_second = store.load().await.unwrap();

            assert!(second.persisted.is_empty());
            assert_eq!(after_first, after_second);
            assert_eq!(first.persisted.len() + first.skipped.len(), candidates.len());
            assert_no_duplicates(store.as_ref()).await;
        });
    }
}
