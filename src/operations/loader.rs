use std::any::Any;

use log::debug;

use crate::config::ObjectCodec;
use crate::context::PersistenceContext;
use crate::core::{Result, Value};
use crate::entity::Entity;
use crate::metadata::{EntityMeta, PropertyMeta};
use crate::session::Row;
use crate::statement::binder;

/// Builds a record from its eager row, or `None` when the row does not exist.
pub async fn load<T: Entity>(context: &PersistenceContext) -> Result<Option<T>> {
    let meta = context.meta();
    debug!(
        "Loading entity '{}' with primary key {}",
        meta.type_name,
        context.primary_key()
    );
    let Some(row) = context.load_entity().await? else {
        return Ok(None);
    };

    let mut entity = T::default();
    meta.id_meta.set_value(&mut entity, context.primary_key().clone())?;
    apply_eager_row(meta, &mut entity, &row, context.codec())?;
    Ok(Some(entity))
}

/// Copies the eager, non-identity columns of `row` into `target`.
pub fn apply_eager_row(
    meta: &EntityMeta,
    target: &mut dyn Any,
    row: &Row,
    codec: &dyn ObjectCodec,
) -> Result<()> {
    for property in meta.eager_metas().filter(|p| !p.property_type.is_id()) {
        let value = binder::decode_value(row.get(&property.property_name), property, codec)?;
        property.set_value(target, value)?;
    }
    Ok(())
}

/// Primary key of a row of a compound-key table.
pub fn primary_key_from_row(meta: &EntityMeta, row: &Row) -> Value {
    match &meta.id_meta.embedded_id {
        Some(embedded) => Value::Tuple(
            embedded
                .component_names()
                .iter()
                .map(|name| row.get(name))
                .collect(),
        ),
        None => row.get(&meta.id_meta.property_name),
    }
}

/// Fetches the current value of one property; a missing row yields `Null`.
pub async fn load_property(context: &PersistenceContext, property: &PropertyMeta) -> Result<Value> {
    debug!(
        "Loading property '{}' of entity '{}'",
        property.property_name,
        context.meta().type_name
    );
    match context.load_property(property).await? {
        Some(row) => {
            binder::decode_value(row.get(&property.property_name), property, context.codec())
        }
        None => Ok(Value::Null),
    }
}
