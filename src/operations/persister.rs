use std::any::Any;

use log::debug;

use crate::context::PersistenceContext;
use crate::core::{CqlMapError, Result, Value};
use crate::metadata::EntityMeta;

/// Reads the primary key of a plain record, rejecting missing components.
///
/// Only key types with an absent state (`Option<_>`) can be missing: a plain
/// `i64` or `String` key always holds a value, even its default.
pub fn primary_key_of(meta: &EntityMeta, entity: &dyn Any) -> Result<Value> {
    let key = meta.id_meta.get_value(entity)?;
    let incomplete = match &key {
        Value::Null => true,
        Value::Tuple(components) => components.iter().any(Value::is_null),
        _ => false,
    };
    if incomplete {
        return Err(CqlMapError::Usage(format!(
            "Cannot persist entity '{}' without a complete primary key",
            meta.type_name
        )));
    }
    Ok(key)
}

/// Queues the statements that write a new record.
///
/// Records of a clustered counter table are written as increments only;
/// the others get one insert plus an increment per initialised counter.
pub async fn persist(context: &PersistenceContext, entity: &(dyn Any + Send + Sync)) -> Result<()> {
    let meta = context.meta().clone();
    debug!(
        "Persisting entity '{}' with primary key {}",
        meta.type_name,
        context.primary_key()
    );

    if meta.clustered_counter {
        let mut written = 0;
        for property in meta.counter_metas() {
            if let Some(delta) = property.get_value(entity)?.as_i64() {
                context.push_clustered_counter_increment(property, delta).await?;
                written += 1;
            }
        }
        if written == 0 {
            return Err(CqlMapError::Usage(format!(
                "Cannot insert clustered counter entity '{}' with null value",
                meta.type_name
            )));
        }
        return Ok(());
    }

    context.push_insert(entity).await?;
    for property in meta.counter_metas() {
        if let Some(delta) = property.get_value(entity)?.as_i64() {
            context.push_simple_counter_increment(property, delta).await?;
        }
    }
    Ok(())
}

/// Queues the deletion of a record and of its shared-table counters.
pub async fn remove(context: &PersistenceContext) -> Result<()> {
    let meta = context.meta().clone();
    debug!(
        "Removing entity '{}' with primary key {}",
        meta.type_name,
        context.primary_key()
    );
    context.push_removal().await?;
    if meta.has_simple_counter() {
        for property in meta.counter_metas() {
            context.push_simple_counter_deletion(property).await?;
        }
    }
    Ok(())
}
