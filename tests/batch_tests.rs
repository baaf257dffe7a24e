use std::sync::Arc;

use cqlmap::{
    ConfigurationContext, ConsistencyLevel, Counter, CqlMapError, Entity, MemorySession, Options,
    PersistenceManagerFactory, Value,
};

#[derive(Debug, Default, Entity)]
struct Order {
    #[id]
    id: i64,
    #[column]
    item: String,
    #[column]
    quantity: i32,
    #[column]
    views: Counter,
}

fn order(id: i64) -> Order {
    Order {
        id,
        item: format!("item-{}", id),
        quantity: 1,
        ..Default::default()
    }
}

async fn setup() -> (Arc<MemorySession>, PersistenceManagerFactory) {
    let session = Arc::new(MemorySession::new());
    let factory = PersistenceManagerFactory::builder(ConfigurationContext::new())
        .register::<Order>()
        .unwrap()
        .build(session.clone())
        .await
        .unwrap();
    (session, factory)
}

#[tokio::test]
async fn test_end_batch_runs_pending_statements_in_order() {
    let (session, factory) = setup().await;
    let batch = factory.create_batching_persistence_manager();
    batch.start_batch().unwrap();

    let before = session.request_count();
    for id in 1..=3 {
        batch.persist(order(id)).await.unwrap();
    }
    assert_eq!(batch.pending_statements().unwrap(), 3);
    assert_eq!(session.request_count(), before);
    assert!(batch.find::<Order, _>(1i64).await.unwrap().is_none());

    batch.end_batch().await.unwrap();
    assert_eq!(batch.pending_statements().unwrap(), 0);

    let batches = session.batches().await;
    assert_eq!(batches.len(), 1);
    let executed = &batches[0];
    assert!(!executed.counter);
    assert_eq!(executed.consistency, ConsistencyLevel::One);
    let ids: Vec<&Value> = executed.statements.iter().map(|s| &s.values[0]).collect();
    assert_eq!(ids, vec![&Value::Bigint(1), &Value::Bigint(2), &Value::Bigint(3)]);

    let timestamps: Vec<i64> = executed
        .statements
        .iter()
        .map(|s| s.timestamp.unwrap())
        .collect();
    assert!(timestamps.windows(2).all(|pair| pair[0] < pair[1]));

    assert!(batch.find::<Order, _>(3i64).await.unwrap().is_some());
}

#[tokio::test]
async fn test_batch_consistency_is_fixed_at_start() {
    let (session, factory) = setup().await;
    let batch = factory.create_batching_persistence_manager();
    batch
        .start_batch_with_consistency(ConsistencyLevel::LocalQuorum, ConsistencyLevel::Quorum)
        .unwrap();

    let mut proxy = batch.persist(order(1)).await.unwrap();
    proxy.set_as("quantity", 5i32).unwrap();
    batch.merge(&mut proxy).await.unwrap();
    batch.end_batch().await.unwrap();

    let batches = session.batches().await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].consistency, ConsistencyLevel::Quorum);
    assert_eq!(batches[0].statements.len(), 2);
    assert!(batches[0].statements[1].cql.starts_with("UPDATE Order"));

    let found = batch.find::<Order, _>(1i64).await.unwrap().unwrap();
    assert_eq!(found.target().quantity, 5);
}

#[tokio::test]
async fn test_clean_batch_discards_pending_statements() {
    let (session, factory) = setup().await;
    let batch = factory.create_batching_persistence_manager();
    batch.start_batch().unwrap();

    batch.persist(order(1)).await.unwrap();
    batch.persist(order(2)).await.unwrap();
    batch.clean_batch().unwrap();
    assert_eq!(batch.pending_statements().unwrap(), 0);

    batch.end_batch().await.unwrap();
    assert!(session.batches().await.is_empty());
    assert!(batch.find::<Order, _>(1i64).await.unwrap().is_none());
}

#[tokio::test]
async fn test_consistency_override_aborts_batch() {
    let (session, factory) = setup().await;
    let batch = factory.create_batching_persistence_manager();
    batch.start_batch().unwrap();

    batch.persist(order(1)).await.unwrap();
    let err = batch
        .persist_with_options(order(2), Options::with_consistency(ConsistencyLevel::All))
        .await
        .unwrap_err();

    assert!(matches!(err, CqlMapError::Usage(_)));
    assert!(err.to_string().contains("ALL"));
    assert_eq!(batch.pending_statements().unwrap(), 0);

    batch.end_batch().await.unwrap();
    assert!(session.batches().await.is_empty());
}

#[tokio::test]
async fn test_counter_writes_go_to_a_counter_batch() {
    let (session, factory) = setup().await;
    let batch = factory.create_batching_persistence_manager();
    batch.start_batch().unwrap();

    batch
        .persist(Order {
            views: Counter::new(4),
            ..order(1)
        })
        .await
        .unwrap();
    assert_eq!(batch.pending_statements().unwrap(), 2);
    batch.end_batch().await.unwrap();

    let batches = session.batches().await;
    assert_eq!(batches.len(), 2);
    assert!(!batches[0].counter);
    assert!(batches[1].counter);
    assert!(batches[1].statements[0].timestamp.is_none());

    let proxy = batch.find::<Order, _>(1i64).await.unwrap().unwrap();
    assert_eq!(proxy.counter("views").unwrap().get().await.unwrap(), Some(4));
}

#[tokio::test]
async fn test_counter_handle_bypasses_batch() {
    let (_session, factory) = setup().await;
    let manager = factory.create_persistence_manager();
    manager.persist(order(1)).await.unwrap();

    let batch = factory.create_batching_persistence_manager();
    batch.start_batch().unwrap();
    let proxy = batch.find::<Order, _>(1i64).await.unwrap().unwrap();
    proxy.counter("views").unwrap().incr_by(2).await.unwrap();
    assert_eq!(batch.pending_statements().unwrap(), 0);
    assert_eq!(proxy.counter("views").unwrap().get().await.unwrap(), Some(2));
    batch.end_batch().await.unwrap();
}

#[tokio::test]
async fn test_batch_controls_need_batch_mode() {
    let (_session, factory) = setup().await;
    let batch = factory.create_batching_persistence_manager();
    assert!(batch.is_batch());
    assert!(!factory.create_persistence_manager().is_batch());
}
