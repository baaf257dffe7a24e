use std::sync::Arc;

use crate::metadata::{EntityMeta, PropertyMeta};
use crate::statement::query::{Clause, ClusteringColumn, Query, SortDirection};

/// Shared table holding the simple counters of every type.
pub const COUNTER_TABLE: &str = "cqlmap_counter_table";
pub const COUNTER_FQCN: &str = "fqcn";
pub const COUNTER_PRIMARY_KEY: &str = "primary_key";
pub const COUNTER_PROPERTY_NAME: &str = "property_name";
pub const COUNTER_VALUE: &str = "counter_value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterOperation {
    Incr,
    Decr,
    Select,
    Delete,
}

impl CounterOperation {
    pub const ALL: [CounterOperation; 4] = [Self::Incr, Self::Decr, Self::Select, Self::Delete];
}

/// Query shapes derived from entity metadata.
pub struct StatementGenerator;

impl StatementGenerator {
    /// Partition key columns and clustering columns of the entity table.
    pub fn key_layout(meta: &EntityMeta) -> (Vec<String>, Vec<ClusteringColumn>) {
        match &meta.id_meta.embedded_id {
            Some(embedded) => (
                embedded
                    .partition_components
                    .iter()
                    .map(|c| c.name.clone())
                    .collect(),
                embedded
                    .clustering_components
                    .iter()
                    .map(|c| ClusteringColumn {
                        name: c.name.clone(),
                        reversed: c.reversed,
                    })
                    .collect(),
            ),
            None => (vec![meta.id_meta.property_name.clone()], Vec::new()),
        }
    }

    fn insert_columns(meta: &EntityMeta) -> Vec<String> {
        let mut columns = meta.primary_key_columns();
        columns.extend(meta.column_metas().map(|m| m.property_name.clone()));
        columns
    }

    /// Full insert with a bound TTL; prepared once per type.
    pub fn insert(meta: &EntityMeta) -> Query {
        let (partition, clustering) = Self::key_layout(meta);
        Query::insert(&meta.table_name, partition, clustering, Self::insert_columns(meta))
            .ttl(Clause::Marker)
    }

    /// Ad hoc insert carrying its write timestamp.
    pub fn insert_with_timestamp(meta: &EntityMeta, timestamp: i64, ttl: Option<i32>) -> Query {
        let (partition, clustering) = Self::key_layout(meta);
        let columns = Self::insert_columns(meta);
        let query = Query::insert(&meta.table_name, partition, clustering, columns)
            .timestamp(Clause::Literal(timestamp));
        match ttl {
            Some(ttl) => query.ttl(Clause::Literal(i64::from(ttl))),
            None => query,
        }
    }

    fn update_columns(fields: &[Arc<PropertyMeta>]) -> Vec<String> {
        let mut columns: Vec<String> = fields.iter().map(|m| m.property_name.clone()).collect();
        columns.sort();
        columns.dedup();
        columns
    }

    /// Update of a field subset with a bound TTL.
    pub fn update_fields(meta: &EntityMeta, fields: &[Arc<PropertyMeta>]) -> Query {
        let (partition, clustering) = Self::key_layout(meta);
        Query::update(&meta.table_name, partition, clustering, Self::update_columns(fields))
            .ttl(Clause::Marker)
    }

    pub fn update_fields_with_timestamp(
        meta: &EntityMeta,
        fields: &[Arc<PropertyMeta>],
        timestamp: i64,
        ttl: Option<i32>,
    ) -> Query {
        let (partition, clustering) = Self::key_layout(meta);
        let columns = Self::update_columns(fields);
        let query = Query::update(&meta.table_name, partition, clustering, columns)
            .timestamp(Clause::Literal(timestamp));
        match ttl {
            Some(ttl) => query.ttl(Clause::Literal(i64::from(ttl))),
            None => query,
        }
    }

    pub fn select_eager(meta: &EntityMeta) -> Query {
        let (partition, clustering) = Self::key_layout(meta);
        let mut columns = meta.primary_key_columns();
        columns.extend(
            meta.eager_metas()
                .filter(|m| !m.property_type.is_id())
                .map(|m| m.property_name.clone()),
        );
        Query::select(&meta.table_name, partition, clustering, columns)
    }

    pub fn select_field(meta: &EntityMeta, property: &PropertyMeta) -> Query {
        let (partition, clustering) = Self::key_layout(meta);
        Query::select(&meta.table_name, partition, clustering, property.column_names())
    }

    pub fn delete(meta: &EntityMeta) -> Query {
        let (partition, clustering) = Self::key_layout(meta);
        Query::delete(&meta.table_name, partition, clustering)
    }

    fn counter_layout() -> (Vec<String>, Vec<ClusteringColumn>) {
        (
            vec![COUNTER_FQCN.to_string(), COUNTER_PRIMARY_KEY.to_string()],
            vec![ClusteringColumn {
                name: COUNTER_PROPERTY_NAME.to_string(),
                reversed: false,
            }],
        )
    }

    /// Fixed statements over the shared counter table.
    pub fn simple_counter(operation: CounterOperation) -> Query {
        let (partition, clustering) = Self::counter_layout();
        match operation {
            CounterOperation::Incr => {
                Query::increment(COUNTER_TABLE, partition, clustering, COUNTER_VALUE)
            }
            CounterOperation::Decr => {
                Query::decrement(COUNTER_TABLE, partition, clustering, COUNTER_VALUE)
            }
            CounterOperation::Select => Query::select(
                COUNTER_TABLE,
                partition,
                clustering,
                vec![COUNTER_VALUE.to_string()],
            ),
            CounterOperation::Delete => Query::delete(COUNTER_TABLE, partition, clustering),
        }
    }

    /// Statement on one counter column of a clustered counter type.
    pub fn clustered_counter(
        meta: &EntityMeta,
        property: &PropertyMeta,
        operation: CounterOperation,
    ) -> Query {
        let (partition, clustering) = Self::key_layout(meta);
        let table = &meta.table_name;
        let column = &property.property_name;
        match operation {
            CounterOperation::Incr => Query::increment(table, partition, clustering, column),
            CounterOperation::Decr => Query::decrement(table, partition, clustering, column),
            CounterOperation::Select => {
                Query::select(table, partition, clustering, vec![column.clone()])
            }
            CounterOperation::Delete => Query::delete(table, partition, clustering),
        }
    }

    /// Range read over clustering columns within one partition.
    pub fn slice(
        meta: &EntityMeta,
        start_components: usize,
        end_components: usize,
        ordering: Option<SortDirection>,
        limit: Option<u32>,
    ) -> Query {
        let (partition, clustering) = Self::key_layout(meta);
        let first_clustering = clustering.first().map(|c| c.name.clone());
        let mut query = Query::select(&meta.table_name, partition, clustering, Vec::new())
            .restrict_clustering(0)
            .slice(start_components, end_components);
        if let (Some(direction), Some(column)) = (ordering, first_clustering) {
            query = query.order_by(&column, direction);
        }
        if let Some(limit) = limit {
            query = query.limit(Clause::Literal(i64::from(limit)));
        }
        query
    }
}
