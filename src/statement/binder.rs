use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ObjectCodec;
use crate::core::{CqlMapError, Result, Value, ValueType};
use crate::metadata::{EntityMeta, PropertyMeta};
use crate::statement::query::{BindSlot, Query};

/// Values for the bind slots of one statement.
#[derive(Debug, Default, Clone)]
pub struct BoundValues {
    columns: HashMap<String, Value>,
    slice_start: Vec<Value>,
    slice_end: Vec<Value>,
    delta: Option<i64>,
    ttl: Option<i64>,
    timestamp: Option<i64>,
    limit: Option<i64>,
}

impl BoundValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>, value: Value) -> Self {
        self.columns.insert(name.into(), value);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn slice_start(mut self, values: Vec<Value>) -> Self {
        self.slice_start = values;
        self
    }

    pub fn slice_end(mut self, values: Vec<Value>) -> Self {
        self.slice_end = values;
        self
    }

    pub fn delta(mut self, delta: i64) -> Self {
        self.delta = Some(delta);
        self
    }

    pub fn ttl(mut self, ttl: Option<i32>) -> Self {
        self.ttl = ttl.map(i64::from);
        self
    }

    pub fn timestamp(mut self, timestamp: Option<i64>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Values in slot order of `query`.
    pub fn bind(&self, query: &Query) -> Result<Vec<Value>> {
        let mut start = self.slice_start.iter();
        let mut end = self.slice_end.iter();
        query
            .bind_slots()
            .into_iter()
            .map(|slot| match slot {
                BindSlot::Column(name) => {
                    Ok(self.columns.get(&name).cloned().unwrap_or(Value::Null))
                }
                BindSlot::Key(name) => match self.columns.get(&name) {
                    Some(value) if !value.is_null() => Ok(value.clone()),
                    _ => Err(CqlMapError::Usage(format!(
                        "Missing value for primary key column '{}' of table '{}'",
                        name, query.table
                    ))),
                },
                BindSlot::SliceStart(name) => start.next().cloned().ok_or_else(|| missing(&name)),
                BindSlot::SliceEnd(name) => end.next().cloned().ok_or_else(|| missing(&name)),
                BindSlot::Delta => Ok(Value::Bigint(self.delta.unwrap_or(0))),
                // A zero TTL means no expiry.
                BindSlot::Ttl => Ok(Value::Bigint(self.ttl.unwrap_or(0))),
                BindSlot::Timestamp => self
                    .timestamp
                    .map(Value::Bigint)
                    .ok_or_else(|| missing("timestamp")),
                BindSlot::Limit => self.limit.map(Value::Bigint).ok_or_else(|| missing("limit")),
            })
            .collect()
    }
}

fn missing(name: &str) -> CqlMapError {
    CqlMapError::Usage(format!("No value bound for '{}'", name))
}

/// Key columns of the entity table paired with the primary key components.
pub fn key_columns(meta: &EntityMeta, primary_key: &Value) -> Result<Vec<(String, Value)>> {
    let names = meta.primary_key_columns();
    let components = primary_key.key_components();
    if names.len() != components.len() {
        return Err(CqlMapError::Usage(format!(
            "The primary key of entity '{}' expects {} components, got {}",
            meta.type_name,
            names.len(),
            components.len()
        )));
    }
    Ok(names.into_iter().zip(components).collect())
}

/// Key columns plus the encoded values of `properties` read from `entity`.
pub fn entity_columns<'a>(
    meta: &EntityMeta,
    entity: &dyn Any,
    primary_key: &Value,
    properties: impl IntoIterator<Item = &'a Arc<PropertyMeta>>,
    codec: &dyn ObjectCodec,
) -> Result<Vec<(String, Value)>> {
    let mut columns = key_columns(meta, primary_key)?;
    for property in properties {
        let value = encode_value(property.get_value(entity)?, codec)?;
        columns.push((property.property_name.clone(), value));
    }
    Ok(columns)
}

/// Replaces complex values by their codec text.
pub fn encode_value(value: Value, codec: &dyn ObjectCodec) -> Result<Value> {
    match value {
        Value::Object(json) => Ok(Value::Text(codec.encode(&json)?)),
        Value::List(items) => Ok(Value::List(encode_all(items, codec)?)),
        Value::Set(items) => Ok(Value::Set(encode_all(items, codec)?)),
        Value::Map(entries) => Ok(Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| Ok((encode_value(key, codec)?, encode_value(value, codec)?)))
                .collect::<Result<_>>()?,
        )),
        other => Ok(other),
    }
}

fn encode_all(items: Vec<Value>, codec: &dyn ObjectCodec) -> Result<Vec<Value>> {
    items.into_iter().map(|item| encode_value(item, codec)).collect()
}

/// Turns stored codec text back into complex values for object-typed properties.
pub fn decode_value(
    value: Value,
    property: &PropertyMeta,
    codec: &dyn ObjectCodec,
) -> Result<Value> {
    let decode = |value: Value, value_type: Option<ValueType>| -> Result<Value> {
        match (value, value_type) {
            (Value::Text(text), Some(ValueType::Object(_))) => {
                Ok(Value::Object(codec.decode(&text)?))
            }
            (value, _) => Ok(value),
        }
    };
    let value_type = Some(property.value_type);
    match value {
        Value::List(items) => Ok(Value::List(
            items
                .into_iter()
                .map(|item| decode(item, value_type))
                .collect::<Result<_>>()?,
        )),
        Value::Set(items) => Ok(Value::Set(
            items
                .into_iter()
                .map(|item| decode(item, value_type))
                .collect::<Result<_>>()?,
        )),
        Value::Map(entries) => Ok(Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| {
                    Ok((decode(key, property.key_type)?, decode(value, value_type)?))
                })
                .collect::<Result<_>>()?,
        )),
        other => decode(other, value_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsonCodec;
    use crate::statement::query::{ClusteringColumn, Clause};

    #[test]
    fn test_bind_follows_slot_order() {
        let query = Query::update(
            "users",
            vec!["id".to_string()],
            Vec::<ClusteringColumn>::new(),
            vec!["age".to_string(), "name".to_string()],
        )
        .ttl(Clause::Marker);

        let values = BoundValues::new()
            .column("id", Value::Bigint(1))
            .column("name", Value::from("bob"))
            .ttl(Some(60))
            .bind(&query)
            .unwrap();

        assert_eq!(
            values,
            vec![Value::Bigint(60), Value::Null, Value::from("bob"), Value::Bigint(1)]
        );
    }

    #[test]
    fn test_missing_key_is_usage_error() {
        let query = Query::delete("users", vec!["id".to_string()], Vec::new());
        let err = BoundValues::new().bind(&query).unwrap_err();
        assert!(matches!(err, CqlMapError::Usage(_)));
    }

    #[test]
    fn test_encode_nested_objects() {
        let value = Value::List(vec![Value::Object(serde_json::json!({"a": 1}))]);
        let encoded = encode_value(value, &JsonCodec).unwrap();
        assert_eq!(encoded, Value::List(vec![Value::from(r#"{"a":1}"#)]));
    }
}
