//! Typed bridge between application records and the dynamic [`Value`] model.
//!
//! Records implement [`Entity`] (usually through `#[derive(Entity)]`), which
//! describes their fields once. Field types implement [`CqlValue`], which
//! supplies the declared type and structural kind used by the metadata parser
//! and the conversions used by the generated accessors.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::core::{CqlMapError, Result, Value, ValueType};
use crate::metadata::{ComponentDescriptor, EntityDescriptor};

/// Structural kind of a mapped field, before laziness is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Simple,
    List,
    Set,
    Map,
    Counter,
    Compound,
}

/// A record type mapped onto one table.
pub trait Entity: Default + Send + Sync + 'static {
    fn descriptor() -> EntityDescriptor<Self>;
}

/// A compound primary key made of partition and clustering components.
pub trait CompoundKey: CqlValue {
    fn components() -> Vec<ComponentDescriptor>;
}

pub trait CqlValue: Sized + Send + Sync + 'static {
    fn value_type() -> ValueType;

    fn kind() -> ValueKind {
        ValueKind::Simple
    }

    /// Declared key type, for map kinds.
    fn key_type() -> Option<ValueType> {
        None
    }

    /// Fails when the value cannot be represented, e.g. a codec error.
    fn to_value(&self) -> Result<Value>;

    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T> {
    Err(CqlMapError::TypeMismatch(format!(
        "Expected {}, got {}",
        expected,
        value.type_name()
    )))
}

impl CqlValue for i64 {
    fn value_type() -> ValueType {
        ValueType::Bigint
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Bigint(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(0),
            Value::Bigint(v) => Ok(v),
            Value::Int(v) => Ok(i64::from(v)),
            other => mismatch("BIGINT", &other),
        }
    }
}

impl CqlValue for i32 {
    fn value_type() -> ValueType {
        ValueType::Int
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Int(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(0),
            Value::Int(v) => Ok(v),
            Value::Bigint(v) => i32::try_from(v).map_err(|_| {
                CqlMapError::TypeMismatch(format!("Value {} does not fit in INT", v))
            }),
            other => mismatch("INT", &other),
        }
    }
}

impl CqlValue for f64 {
    fn value_type() -> ValueType {
        ValueType::Double
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Double(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(0.0),
            Value::Double(v) => Ok(v),
            other => mismatch("DOUBLE", &other),
        }
    }
}

impl CqlValue for String {
    fn value_type() -> ValueType {
        ValueType::Text
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Text(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Text(v) => Ok(v),
            other => mismatch("TEXT", &other),
        }
    }
}

impl CqlValue for bool {
    fn value_type() -> ValueType {
        ValueType::Boolean
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Boolean(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(false),
            Value::Boolean(v) => Ok(v),
            other => mismatch("BOOLEAN", &other),
        }
    }
}

impl CqlValue for Uuid {
    fn value_type() -> ValueType {
        ValueType::Uuid
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Uuid(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Uuid::nil()),
            Value::Uuid(v) => Ok(v),
            other => mismatch("UUID", &other),
        }
    }
}

impl CqlValue for DateTime<Utc> {
    fn value_type() -> ValueType {
        ValueType::Timestamp
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Timestamp(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(DateTime::<Utc>::UNIX_EPOCH),
            Value::Timestamp(v) => Ok(v),
            other => mismatch("TIMESTAMP", &other),
        }
    }
}

impl<T: CqlValue> CqlValue for Option<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }

    fn kind() -> ValueKind {
        T::kind()
    }

    fn key_type() -> Option<ValueType> {
        T::key_type()
    }

    fn to_value(&self) -> Result<Value> {
        match self {
            Some(inner) => inner.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

fn collection_items(value: Value, expected: &str) -> Result<Vec<Value>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::List(items) | Value::Set(items) => Ok(items),
        other => mismatch(expected, &other),
    }
}

fn map_entries(value: Value) -> Result<Vec<(Value, Value)>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Map(entries) => Ok(entries),
        other => mismatch("MAP", &other),
    }
}

impl<T: CqlValue> CqlValue for Vec<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }

    fn kind() -> ValueKind {
        ValueKind::List
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::List(self.iter().map(CqlValue::to_value).collect::<Result<_>>()?))
    }

    fn from_value(value: Value) -> Result<Self> {
        collection_items(value, "LIST")?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

impl<T: CqlValue + Ord> CqlValue for BTreeSet<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }

    fn kind() -> ValueKind {
        ValueKind::Set
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Set(self.iter().map(CqlValue::to_value).collect::<Result<_>>()?))
    }

    fn from_value(value: Value) -> Result<Self> {
        collection_items(value, "SET")?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

impl<T: CqlValue + Eq + Hash> CqlValue for HashSet<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }

    fn kind() -> ValueKind {
        ValueKind::Set
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Set(self.iter().map(CqlValue::to_value).collect::<Result<_>>()?))
    }

    fn from_value(value: Value) -> Result<Self> {
        collection_items(value, "SET")?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

impl<K: CqlValue + Ord, V: CqlValue> CqlValue for BTreeMap<K, V> {
    fn value_type() -> ValueType {
        V::value_type()
    }

    fn kind() -> ValueKind {
        ValueKind::Map
    }

    fn key_type() -> Option<ValueType> {
        Some(K::value_type())
    }

    fn to_value(&self) -> Result<Value> {
        let entries = self
            .iter()
            .map(|(key, value)| Ok((key.to_value()?, value.to_value()?)))
            .collect::<Result<_>>()?;
        Ok(Value::Map(entries))
    }

    fn from_value(value: Value) -> Result<Self> {
        map_entries(value)?
            .into_iter()
            .map(|(key, value)| Ok((K::from_value(key)?, V::from_value(value)?)))
            .collect()
    }
}

impl<K: CqlValue + Eq + Hash, V: CqlValue> CqlValue for HashMap<K, V> {
    fn value_type() -> ValueType {
        V::value_type()
    }

    fn kind() -> ValueKind {
        ValueKind::Map
    }

    fn key_type() -> Option<ValueType> {
        Some(K::value_type())
    }

    fn to_value(&self) -> Result<Value> {
        let entries = self
            .iter()
            .map(|(key, value)| Ok((key.to_value()?, value.to_value()?)))
            .collect::<Result<_>>()?;
        Ok(Value::Map(entries))
    }

    fn from_value(value: Value) -> Result<Self> {
        map_entries(value)?
            .into_iter()
            .map(|(key, value)| Ok((K::from_value(key)?, V::from_value(value)?)))
            .collect()
    }
}

/// Plain-record slot of a counter column.
///
/// Holds the initial value written on persist. On a managed record the slot
/// is never loaded; reads and updates go through a `CounterHandle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter(Option<i64>);

impl Counter {
    pub fn new(initial: i64) -> Self {
        Self(Some(initial))
    }

    pub fn empty() -> Self {
        Self(None)
    }

    pub fn value(&self) -> Option<i64> {
        self.0
    }
}

impl CqlValue for Counter {
    fn value_type() -> ValueType {
        ValueType::Counter
    }

    fn kind() -> ValueKind {
        ValueKind::Counter
    }

    fn to_value(&self) -> Result<Value> {
        Ok(match self.0 {
            Some(v) => Value::Bigint(v),
            None => Value::Null,
        })
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self(None)),
            other => match other.as_i64() {
                Some(v) => Ok(Self(Some(v))),
                None => mismatch("COUNTER", &other),
            },
        }
    }
}

/// Complex field value stored as text through the configured object codec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> CqlValue for Json<T>
where
    T: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
{
    fn value_type() -> ValueType {
        ValueType::Object(std::any::type_name::<T>())
    }

    fn to_value(&self) -> Result<Value> {
        serde_json::to_value(&self.0).map(Value::Object).map_err(|err| {
            CqlMapError::Codec(format!(
                "Cannot serialize value of type {}: {}",
                std::any::type_name::<T>(),
                err
            ))
        })
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self(T::default())),
            Value::Object(json) => Ok(Self(serde_json::from_value(json)?)),
            Value::Text(text) => Ok(Self(serde_json::from_str(&text)?)),
            other => mismatch("OBJECT", &other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_kinds() {
        assert_eq!(<Vec<String>>::kind(), ValueKind::List);
        assert_eq!(<Vec<String>>::value_type(), ValueType::Text);
        assert_eq!(<BTreeSet<String>>::kind(), ValueKind::Set);
        assert_eq!(<BTreeMap<i32, String>>::kind(), ValueKind::Map);
        assert_eq!(<BTreeMap<i32, String>>::key_type(), Some(ValueType::Int));
        assert_eq!(<Option<Vec<i64>>>::kind(), ValueKind::List);
        assert_eq!(Counter::kind(), ValueKind::Counter);
    }

    #[test]
    fn test_null_converts_to_empty_values() {
        assert_eq!(String::from_value(Value::Null).unwrap(), "");
        assert!(<Vec<String>>::from_value(Value::Null).unwrap().is_empty());
        assert_eq!(<Option<i64>>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Counter::from_value(Value::Null).unwrap(), Counter::empty());
    }

    #[test]
    fn test_conversion_rejects_wrong_type() {
        let err = i64::from_value(Value::from("x")).unwrap_err();
        assert!(matches!(err, CqlMapError::TypeMismatch(_)));
    }

    #[test]
    fn test_json_accepts_encoded_text() {
        #[derive(Debug, Default, PartialEq, Serialize, serde::Deserialize)]
        struct Creator {
            login: String,
        }

        let decoded = <Json<Creator>>::from_value(Value::from(r#"{"login":"bob"}"#)).unwrap();
        assert_eq!(decoded.0.login, "bob");
    }

    #[test]
    fn test_json_serialization_failure_is_an_error() {
        let mut grid = HashMap::new();
        grid.insert((1, 2), "cell".to_string());

        let err = Json(grid).to_value().unwrap_err();
        assert!(matches!(err, CqlMapError::Codec(_)));

        let nested = vec![Json(HashMap::from([((0, 0), "origin".to_string())]))];
        assert!(nested.to_value().is_err());
    }
}
