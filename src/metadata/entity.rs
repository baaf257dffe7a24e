use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::ConsistencyLevel;
use crate::metadata::property::{Accessor, PropertyMeta, PropertyType};

/// Immutable schema of one record type, shared by every context.
#[derive(Debug)]
pub struct EntityMeta {
    pub type_id: TypeId,
    pub type_name: String,
    pub table_name: String,
    pub id_meta: Arc<PropertyMeta>,
    /// Every mapped property in declaration order, identity included.
    pub properties: Vec<Arc<PropertyMeta>>,
    pub read_level: ConsistencyLevel,
    pub write_level: ConsistencyLevel,
    pub clustered: bool,
    pub clustered_counter: bool,
    pub(crate) getter_metas: HashMap<Accessor, Arc<PropertyMeta>>,
    pub(crate) setter_metas: HashMap<Accessor, Arc<PropertyMeta>>,
}

impl EntityMeta {
    /// Looks a property up by name through its getter.
    pub fn property(&self, name: &str) -> Option<&Arc<PropertyMeta>> {
        self.meta_for_getter(&Accessor::getter(name))
    }

    pub fn meta_for_getter(&self, accessor: &Accessor) -> Option<&Arc<PropertyMeta>> {
        self.getter_metas.get(accessor)
    }

    pub fn meta_for_setter(&self, accessor: &Accessor) -> Option<&Arc<PropertyMeta>> {
        self.setter_metas.get(accessor)
    }

    pub fn is_id_getter(&self, accessor: &Accessor) -> bool {
        self.id_meta.getter_accessor() == *accessor
    }

    pub fn is_id_setter(&self, accessor: &Accessor) -> bool {
        self.id_meta.setter_accessor() == *accessor
    }

    /// Properties fetched by the full select, identity first.
    pub fn eager_metas(&self) -> impl Iterator<Item = &Arc<PropertyMeta>> {
        self.properties
            .iter()
            .filter(|meta| meta.property_type.is_eager())
    }

    /// Non-identity, non-counter properties stored in the main table.
    pub fn column_metas(&self) -> impl Iterator<Item = &Arc<PropertyMeta>> {
        self.properties.iter().filter(|meta| {
            !meta.property_type.is_id() && !meta.property_type.is_counter()
        })
    }

    pub fn counter_metas(&self) -> impl Iterator<Item = &Arc<PropertyMeta>> {
        self.properties
            .iter()
            .filter(|meta| meta.property_type == PropertyType::Counter)
    }

    pub fn has_counter(&self) -> bool {
        self.counter_metas().next().is_some()
    }

    /// True when counters live in the shared counter table.
    pub fn has_simple_counter(&self) -> bool {
        !self.clustered_counter && self.has_counter()
    }

    pub fn primary_key_columns(&self) -> Vec<String> {
        self.id_meta.column_names()
    }
}
