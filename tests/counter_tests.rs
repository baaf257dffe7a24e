use std::sync::Arc;

use cqlmap::{
    CompoundKey, ConfigurationContext, ConsistencyLevel, Counter, CqlMapError, Entity,
    MemorySession, PersistenceManagerFactory,
};

#[derive(Debug, Default, Entity)]
struct Profile {
    #[id]
    id: i64,
    #[column]
    name: String,
    #[column]
    visits: Counter,
}

#[derive(Debug, Clone, Default, PartialEq, CompoundKey)]
struct PageKey {
    #[partition]
    page: String,
    #[clustering]
    day: i64,
}

#[derive(Debug, Default, Entity)]
struct PageStats {
    #[embedded_id]
    key: PageKey,
    #[column]
    views: Counter,
}

async fn setup() -> (Arc<MemorySession>, PersistenceManagerFactory) {
    let session = Arc::new(MemorySession::new());
    let factory = PersistenceManagerFactory::builder(ConfigurationContext::new())
        .register::<Profile>()
        .unwrap()
        .register::<PageStats>()
        .unwrap()
        .build(session.clone())
        .await
        .unwrap();
    (session, factory)
}

fn page_key() -> PageKey {
    PageKey {
        page: "home".to_string(),
        day: 20240101,
    }
}

#[tokio::test]
async fn test_simple_counter_lifecycle() {
    let (_session, factory) = setup().await;
    let manager = factory.create_persistence_manager();

    let proxy = manager
        .persist(Profile {
            id: 1,
            name: "ann".to_string(),
            visits: Counter::new(3),
        })
        .await
        .unwrap();

    let visits = proxy.counter("visits").unwrap();
    assert_eq!(visits.property_name(), "visits");
    assert_eq!(visits.get().await.unwrap(), Some(3));

    visits.incr_by(2).await.unwrap();
    assert_eq!(visits.get().await.unwrap(), Some(5));
    visits.decr().await.unwrap();
    assert_eq!(visits.get().await.unwrap(), Some(4));

    manager.remove(proxy).await.unwrap();
    let reference = manager.get_reference::<Profile, _>(1i64).unwrap();
    assert_eq!(reference.counter("visits").unwrap().get().await.unwrap(), None);
}

#[tokio::test]
async fn test_counter_delta_extremes() {
    let (_session, factory) = setup().await;
    let manager = factory.create_persistence_manager();
    let proxy = manager
        .persist(Profile {
            id: 4,
            visits: Counter::new(10),
            ..Default::default()
        })
        .await
        .unwrap();
    let visits = proxy.counter("visits").unwrap();

    let err = visits.incr_by(i64::MIN).await.unwrap_err();
    assert!(matches!(err, CqlMapError::Usage(_)));
    let err = visits.decr_by(i64::MIN).await.unwrap_err();
    assert!(matches!(err, CqlMapError::Usage(_)));
    assert_eq!(visits.get().await.unwrap(), Some(10));

    visits.decr_by(-2).await.unwrap();
    assert_eq!(visits.get().await.unwrap(), Some(12));
    visits.incr_by(-5).await.unwrap();
    assert_eq!(visits.get().await.unwrap(), Some(7));
    visits.decr_by(i64::MAX).await.unwrap();
    assert_eq!(visits.get().await.unwrap(), Some(7 - i64::MAX));
}

#[tokio::test]
async fn test_counter_without_initial_value_is_not_written() {
    let (session, factory) = setup().await;
    let manager = factory.create_persistence_manager();

    let proxy = manager
        .persist(Profile {
            id: 2,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(session.executed().await.len(), 1);
    assert_eq!(proxy.counter("visits").unwrap().get().await.unwrap(), None);
}

#[tokio::test]
async fn test_counter_rejects_any_level_at_call_time() {
    let (_session, factory) = setup().await;
    let manager = factory.create_persistence_manager();
    let proxy = manager.get_reference::<Profile, _>(3i64).unwrap();

    let err = proxy
        .counter("visits")
        .unwrap()
        .incr_by_with_consistency(1, ConsistencyLevel::Any)
        .await
        .unwrap_err();
    assert!(matches!(err, CqlMapError::Usage(_)));
}

#[tokio::test]
async fn test_clustered_counter_with_consistency() {
    let (session, factory) = setup().await;
    let manager = factory.create_persistence_manager();

    let proxy = manager
        .persist(PageStats {
            key: page_key(),
            views: Counter::new(1),
        })
        .await
        .unwrap();

    let views = proxy.counter("views").unwrap();
    assert_eq!(
        views
            .get_with_consistency(ConsistencyLevel::LocalQuorum)
            .await
            .unwrap(),
        Some(1)
    );

    views
        .incr_by_with_consistency(5, ConsistencyLevel::LocalQuorum)
        .await
        .unwrap();
    let executed = session.executed().await;
    assert_eq!(
        executed.last().unwrap().consistency,
        ConsistencyLevel::LocalQuorum
    );
    assert_eq!(views.get().await.unwrap(), Some(6));
}

#[tokio::test]
async fn test_clustered_counter_needs_a_value() {
    let (_session, factory) = setup().await;
    let manager = factory.create_persistence_manager();

    let err = manager
        .persist(PageStats {
            key: page_key(),
            views: Counter::empty(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CqlMapError::Usage(_)));
    assert!(err.to_string().contains("PageStats"));
}
