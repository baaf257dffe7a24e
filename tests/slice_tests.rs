use std::sync::Arc;

use cqlmap::{
    CompoundKey, ConfigurationContext, CqlMapError, Entity, MemorySession,
    PersistenceManager, PersistenceManagerFactory, SliceOrdering, Value,
};

#[derive(Debug, Clone, Default, PartialEq, CompoundKey)]
struct MessageKey {
    #[partition]
    user_id: i64,
    #[clustering]
    sent_at: i64,
}

#[derive(Debug, Default, Entity)]
#[entity(table = "messages")]
struct Message {
    #[embedded_id]
    key: MessageKey,
    #[column]
    body: String,
}

#[derive(Debug, Default, Entity)]
struct Note {
    #[id]
    id: i64,
    #[column]
    text: String,
}

async fn setup() -> (Arc<MemorySession>, PersistenceManager) {
    let session = Arc::new(MemorySession::new());
    let factory = PersistenceManagerFactory::builder(ConfigurationContext::new())
        .register::<Message>()
        .unwrap()
        .register::<Note>()
        .unwrap()
        .build(session.clone())
        .await
        .unwrap();
    let manager = factory.create_persistence_manager();

    for sent_at in 1..=5 {
        manager
            .persist(message(1, sent_at))
            .await
            .unwrap();
    }
    manager.persist(message(2, 3)).await.unwrap();
    session.clear_log().await;
    (session, manager)
}

fn message(user_id: i64, sent_at: i64) -> Message {
    Message {
        key: MessageKey { user_id, sent_at },
        body: format!("message {} of {}", sent_at, user_id),
    }
}

fn sent_at(proxies: &[cqlmap::EntityProxy<Message>]) -> Vec<i64> {
    proxies.iter().map(|p| p.target().key.sent_at).collect()
}

#[tokio::test]
async fn test_slice_within_inclusive_bounds() {
    let (session, manager) = setup().await;

    let messages = manager
        .slice_query::<Message>()
        .unwrap()
        .partition_component(1i64)
        .from_clustering([Value::Bigint(2)])
        .to_clustering([Value::Bigint(4)])
        .get()
        .await
        .unwrap();

    assert_eq!(sent_at(&messages), vec![2, 3, 4]);
    assert_eq!(session.request_count(), 1);
    assert_eq!(messages[0].target().body, "message 2 of 1");
    assert_eq!(
        messages[0].primary_key(),
        &Value::Tuple(vec![Value::Bigint(1), Value::Bigint(2)])
    );
    assert!(messages[0].is_loaded("body"));
}

#[tokio::test]
async fn test_slice_descending_with_limit() {
    let (_session, manager) = setup().await;

    let messages = manager
        .slice_query::<Message>()
        .unwrap()
        .partition_component(1i64)
        .ordering(SliceOrdering::Descending)
        .limit(2)
        .get()
        .await
        .unwrap();

    assert_eq!(sent_at(&messages), vec![5, 4]);
}

#[tokio::test]
async fn test_slice_stays_in_its_partition() {
    let (_session, manager) = setup().await;

    let messages = manager
        .slice_query::<Message>()
        .unwrap()
        .partition_key([Value::Bigint(2)])
        .get()
        .await
        .unwrap();

    assert_eq!(sent_at(&messages), vec![3]);
    assert_eq!(messages[0].target().key.user_id, 2);
}

#[tokio::test]
async fn test_get_first_returns_the_lowest_clustering() {
    let (_session, manager) = setup().await;

    let first = manager
        .slice_query::<Message>()
        .unwrap()
        .partition_component(1i64)
        .get_first()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.target().key.sent_at, 1);
}

#[tokio::test]
async fn test_slice_proxy_can_be_merged() {
    let (_session, manager) = setup().await;

    let mut first = manager
        .slice_query::<Message>()
        .unwrap()
        .partition_component(1i64)
        .get_first()
        .await
        .unwrap()
        .unwrap();
    first.set_as("body", "edited".to_string()).unwrap();
    manager.merge(&mut first).await.unwrap();

    let key = MessageKey {
        user_id: 1,
        sent_at: 1,
    };
    let found = manager.find::<Message, _>(key).await.unwrap().unwrap();
    assert_eq!(found.target().body, "edited");
}

#[tokio::test]
async fn test_slice_rejects_wrong_partition_arity() {
    let (session, manager) = setup().await;

    let err = manager
        .slice_query::<Message>()
        .unwrap()
        .partition_key([Value::Bigint(1), Value::Bigint(2)])
        .get()
        .await
        .unwrap_err();

    assert!(matches!(err, CqlMapError::Usage(_)));
    assert_eq!(session.request_count(), 0);
}

#[tokio::test]
async fn test_slice_needs_compound_key() {
    let (_session, manager) = setup().await;

    let err = manager
        .slice_query::<Note>()
        .unwrap()
        .partition_component(1i64)
        .get()
        .await
        .unwrap_err();

    assert!(matches!(err, CqlMapError::Usage(_)));
}
