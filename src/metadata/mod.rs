pub mod descriptor;
pub mod entity;
pub mod parser;
pub mod property;

pub use descriptor::{
    ComponentDescriptor, ComponentRole, ConsistencyOverride, EntityDescriptor, FieldDescriptor,
    FieldRole,
};
pub use entity::EntityMeta;
pub use parser::EntityParser;
pub use property::{
    Accessor, AccessorKind, EmbeddedIdProperties, KeyComponent, PropertyMeta, PropertyType,
};

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{CqlMapError, Result};

/// Parsed metadata of every registered type, keyed by Rust type.
#[derive(Debug, Default)]
pub struct EntityMetaRegistry {
    metas: HashMap<TypeId, Arc<EntityMeta>>,
}

impl EntityMetaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, meta: EntityMeta) -> Arc<EntityMeta> {
        let meta = Arc::new(meta);
        self.metas.insert(meta.type_id, meta.clone());
        meta
    }

    pub fn get<T: 'static>(&self) -> Result<Arc<EntityMeta>> {
        self.metas.get(&TypeId::of::<T>()).cloned().ok_or_else(|| {
            CqlMapError::BeanMapping(format!(
                "The type '{}' is not managed",
                std::any::type_name::<T>()
            ))
        })
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.metas.contains_key(&TypeId::of::<T>())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityMeta>> {
        self.metas.values()
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }
}
