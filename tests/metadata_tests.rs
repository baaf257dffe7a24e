use std::collections::{BTreeMap, BTreeSet};

use cqlmap::metadata::{Accessor, EntityParser, PropertyType};
use cqlmap::{
    CompoundKey, ConfigurationContext, ConsistencyLevel, Counter, CqlMapError, Entity, Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Creator {
    name: String,
    age: i32,
}

#[derive(Debug, Default, Entity)]
struct Bean {
    #[id]
    id: i64,
    #[column]
    name: String,
    #[column(name = "age_in_years")]
    age: i64,
    #[column(lazy)]
    friends: Vec<String>,
    #[column]
    followers: BTreeSet<String>,
    #[column]
    preferences: BTreeMap<i32, String>,
    #[column]
    creator: Json<Creator>,
    #[transient]
    #[allow(dead_code)]
    scratch: String,
}

#[derive(Debug, Default, Entity)]
struct NoIdentity {
    #[column]
    name: String,
}

#[derive(Debug, Default, Entity)]
struct DuplicateAlias {
    #[id]
    id: i64,
    #[column(name = "label")]
    name: String,
    #[column]
    label: String,
}

#[derive(Debug, Clone, Default, PartialEq, CompoundKey)]
struct TimelineKey {
    #[partition]
    user_id: i64,
    #[clustering(reversed)]
    posted_at: i64,
}

#[derive(Debug, Default, Entity)]
#[entity(table = "timeline", consistency(read = "LOCAL_QUORUM", write = "QUORUM"))]
struct TimelineEntry {
    #[embedded_id]
    key: TimelineKey,
    #[column]
    content: String,
}

#[derive(Debug, Default, Entity)]
struct TooManyClusteredColumns {
    #[embedded_id]
    key: TimelineKey,
    #[column]
    content: String,
    #[column]
    author: String,
}

#[derive(Debug, Default, Entity)]
struct ClusteredList {
    #[embedded_id]
    key: TimelineKey,
    #[column]
    tags: Vec<String>,
}

#[derive(Debug, Default, Entity)]
struct ClusteredCounters {
    #[embedded_id]
    key: TimelineKey,
    #[column]
    views: Counter,
    #[column]
    shares: Counter,
}

#[derive(Debug, Default, Entity)]
struct AnyCounter {
    #[id]
    id: i64,
    #[column(consistency(read = "ONE", write = "ANY"))]
    hits: Counter,
}

fn bean_config() -> ConfigurationContext {
    ConfigurationContext::new()
        .default_read_level(ConsistencyLevel::One)
        .default_write_level(ConsistencyLevel::All)
}

#[test]
fn test_parse_bean_metadata() {
    let config = bean_config();
    let policy = config.new_consistency_policy();
    let meta = EntityParser::new(&config, &policy).parse::<Bean>().unwrap();

    assert_eq!(meta.properties.len(), 7);
    assert_eq!(meta.table_name, "Bean");
    assert!(meta.type_name.ends_with("::Bean"));
    assert_eq!(meta.id_meta.property_name, "id");
    assert_eq!(meta.property("id").unwrap().property_type, PropertyType::Id);
    assert_eq!(
        meta.property("friends").unwrap().property_type,
        PropertyType::LazyList
    );
    assert_eq!(meta.property("followers").unwrap().property_type, PropertyType::Set);
    assert_eq!(meta.property("preferences").unwrap().property_type, PropertyType::Map);
    assert_eq!(meta.property("creator").unwrap().property_type, PropertyType::Simple);
    assert!(meta.property("age_in_years").is_some());
    assert!(meta.property("age").is_none());
    assert!(meta.property("scratch").is_none());

    let getter = meta.meta_for_getter(&Accessor::getter("age_in_years")).unwrap();
    let setter = meta.meta_for_setter(&Accessor::setter("age_in_years")).unwrap();
    assert!(std::sync::Arc::ptr_eq(getter, setter));
    assert!(meta.meta_for_getter(&Accessor::setter("name")).is_none());
    assert!(meta.is_id_getter(&Accessor::getter("id")));
    assert!(!meta.is_id_setter(&Accessor::setter("name")));

    assert_eq!(meta.read_level, ConsistencyLevel::One);
    assert_eq!(meta.write_level, ConsistencyLevel::All);
    assert_eq!(policy.read_level_for_table("Bean").unwrap(), ConsistencyLevel::One);
    assert_eq!(policy.write_level_for_table("Bean").unwrap(), ConsistencyLevel::All);
    assert!(!meta.clustered);
    assert!(!meta.has_counter());
}

#[test]
fn test_missing_identity_names_the_type() {
    let config = ConfigurationContext::new();
    let policy = config.new_consistency_policy();
    let err = EntityParser::new(&config, &policy)
        .parse::<NoIdentity>()
        .unwrap_err();

    assert!(matches!(err, CqlMapError::BeanMapping(_)));
    assert!(err.is_configuration());
    assert!(err.to_string().contains("NoIdentity"));
}

#[test]
fn test_duplicate_alias_is_rejected() {
    let config = ConfigurationContext::new();
    let policy = config.new_consistency_policy();
    let err = EntityParser::new(&config, &policy)
        .parse::<DuplicateAlias>()
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("'label'"));
    assert!(message.contains("DuplicateAlias"));
}

#[test]
fn test_compound_key_layout_and_type_levels() {
    let config = ConfigurationContext::new();
    let policy = config.new_consistency_policy();
    let meta = EntityParser::new(&config, &policy)
        .parse::<TimelineEntry>()
        .unwrap();

    assert_eq!(meta.table_name, "timeline");
    assert!(meta.clustered);
    assert!(!meta.clustered_counter);
    assert_eq!(meta.primary_key_columns(), vec!["user_id", "posted_at"]);

    let embedded = meta.id_meta.embedded_id.as_ref().unwrap();
    assert_eq!(embedded.partition_components.len(), 1);
    assert_eq!(embedded.clustering_components.len(), 1);
    assert!(embedded.clustering_components[0].reversed);

    assert_eq!(meta.read_level, ConsistencyLevel::LocalQuorum);
    assert_eq!(meta.write_level, ConsistencyLevel::Quorum);
    assert_eq!(
        policy.read_level_for_table("timeline").unwrap(),
        ConsistencyLevel::LocalQuorum
    );
}

#[test]
fn test_clustered_entity_restrictions() {
    let config = ConfigurationContext::new();
    let policy = config.new_consistency_policy();
    let parser = EntityParser::new(&config, &policy);

    let err = parser.parse::<TooManyClusteredColumns>().unwrap_err();
    assert!(err.to_string().contains("TooManyClusteredColumns"));

    let err = parser.parse::<ClusteredList>().unwrap_err();
    assert!(err.to_string().contains("simple/counter"));

    let meta = parser.parse::<ClusteredCounters>().unwrap();
    assert!(meta.clustered_counter);
    assert_eq!(meta.counter_metas().count(), 2);
}

#[test]
fn test_counter_rejects_any_level() {
    let config = ConfigurationContext::new();
    let policy = config.new_consistency_policy();
    let err = EntityParser::new(&config, &policy)
        .parse::<AnyCounter>()
        .unwrap_err();

    assert!(matches!(err, CqlMapError::BeanMapping(_)));
    assert!(err.to_string().contains("hits"));
}

#[test]
fn test_compound_key_round_trip_through_value() {
    use cqlmap::{CqlValue, Value};

    let key = TimelineKey {
        user_id: 7,
        posted_at: 1_700_000,
    };
    let value = key.to_value().unwrap();
    assert_eq!(value, Value::Tuple(vec![Value::Bigint(7), Value::Bigint(1_700_000)]));
    assert_eq!(TimelineKey::from_value(value).unwrap(), key);
    assert!(TimelineKey::from_value(Value::Bigint(7)).is_err());
}
