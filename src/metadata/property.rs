use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::core::{ConsistencyLevel, Result, Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Id,
    EmbeddedId,
    Simple,
    List,
    Set,
    Map,
    LazySimple,
    LazyList,
    LazySet,
    LazyMap,
    Counter,
}

impl PropertyType {
    pub fn is_lazy(&self) -> bool {
        matches!(
            self,
            Self::LazySimple | Self::LazyList | Self::LazySet | Self::LazyMap
        )
    }

    pub fn is_id(&self) -> bool {
        matches!(self, Self::Id | Self::EmbeddedId)
    }

    pub fn is_counter(&self) -> bool {
        matches!(self, Self::Counter)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List | Self::LazyList)
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set | Self::LazySet)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map | Self::LazyMap)
    }

    /// Eagerly loaded by the full select: identity and non-lazy plain columns.
    pub fn is_eager(&self) -> bool {
        !self.is_lazy() && !self.is_counter()
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Id => "ID",
            Self::EmbeddedId => "EMBEDDED_ID",
            Self::Simple => "SIMPLE",
            Self::List => "LIST",
            Self::Set => "SET",
            Self::Map => "MAP",
            Self::LazySimple => "LAZY_SIMPLE",
            Self::LazyList => "LAZY_LIST",
            Self::LazySet => "LAZY_SET",
            Self::LazyMap => "LAZY_MAP",
            Self::Counter => "COUNTER",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    Get,
    Set,
}

/// Key of the accessor dispatch tables: one getter and one setter per property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Accessor {
    pub property: String,
    pub kind: AccessorKind,
}

impl Accessor {
    pub fn getter(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            kind: AccessorKind::Get,
        }
    }

    pub fn setter(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            kind: AccessorKind::Set,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyComponent {
    pub name: String,
    pub value_type: ValueType,
    pub reversed: bool,
}

/// Partition and clustering layout of a compound primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedIdProperties {
    pub partition_components: Vec<KeyComponent>,
    pub clustering_components: Vec<KeyComponent>,
}

impl EmbeddedIdProperties {
    pub fn component_names(&self) -> Vec<String> {
        self.partition_components
            .iter()
            .chain(self.clustering_components.iter())
            .map(|component| component.name.clone())
            .collect()
    }

    pub fn is_clustered(&self) -> bool {
        !self.clustering_components.is_empty()
    }
}

pub type ErasedGetter = Arc<dyn Fn(&dyn Any) -> Result<Value> + Send + Sync>;
pub type ErasedSetter = Arc<dyn Fn(&mut dyn Any, Value) -> Result<()> + Send + Sync>;

/// Resolved description of one mapped field.
#[derive(Clone)]
pub struct PropertyMeta {
    pub entity_type_name: String,
    pub property_name: String,
    pub property_type: PropertyType,
    pub value_type: ValueType,
    pub key_type: Option<ValueType>,
    pub read_level: ConsistencyLevel,
    pub write_level: ConsistencyLevel,
    pub embedded_id: Option<EmbeddedIdProperties>,
    /// Counter key prefix: the owning type name for simple counters.
    pub counter_fqcn: Option<String>,
    pub(crate) getter: ErasedGetter,
    pub(crate) setter: ErasedSetter,
}

impl PropertyMeta {
    pub fn get_value(&self, entity: &dyn Any) -> Result<Value> {
        (self.getter)(entity)
    }

    pub fn set_value(&self, entity: &mut dyn Any, value: Value) -> Result<()> {
        (self.setter)(entity, value)
    }

    pub fn getter_accessor(&self) -> Accessor {
        Accessor::getter(self.property_name.clone())
    }

    pub fn setter_accessor(&self) -> Accessor {
        Accessor::setter(self.property_name.clone())
    }

    pub fn is_lazy(&self) -> bool {
        self.property_type.is_lazy()
    }

    pub fn is_counter(&self) -> bool {
        self.property_type.is_counter()
    }

    /// Stored columns of this property: key components for a compound key.
    pub fn column_names(&self) -> Vec<String> {
        match &self.embedded_id {
            Some(embedded) => embedded.component_names(),
            None => vec![self.property_name.clone()],
        }
    }
}

impl fmt::Debug for PropertyMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMeta")
            .field("property_name", &self.property_name)
            .field("property_type", &self.property_type)
            .field("value_type", &self.value_type)
            .field("key_type", &self.key_type)
            .field("read_level", &self.read_level)
            .field("write_level", &self.write_level)
            .field("embedded_id", &self.embedded_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_type_flags() {
        assert!(PropertyType::LazyList.is_lazy());
        assert!(PropertyType::LazyList.is_list());
        assert!(!PropertyType::Counter.is_eager());
        assert!(PropertyType::Id.is_eager());
        assert!(PropertyType::Map.is_map());
    }
}
