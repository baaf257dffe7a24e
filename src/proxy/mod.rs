//! Managed records.
//!
//! An [`EntityProxy`] owns the record returned by `find`, `get_reference` or
//! `persist` together with its persistence context. Reads of properties that
//! have not been fetched yet trigger one select each; writes are recorded in
//! the dirty map consumed by `merge`.

pub mod counter;
pub mod wrappers;

pub use counter::CounterHandle;
pub use wrappers::{ListWrapper, MapWrapper, SetWrapper};

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use log::{debug, trace};

use crate::context::PersistenceContext;
use crate::core::{CqlMapError, Result, Value};
use crate::entity::{CqlValue, Entity};
use crate::metadata::{Accessor, AccessorKind, EntityMeta, PropertyMeta};
use crate::operations::loader;
use wrappers::FieldBinding;

pub struct EntityProxy<T: Entity> {
    target: T,
    context: PersistenceContext,
    already_loaded: HashSet<Accessor>,
    dirty_map: HashMap<Accessor, Arc<PropertyMeta>>,
}

impl<T: Entity> EntityProxy<T> {
    pub(crate) fn new(target: T, context: PersistenceContext) -> Self {
        Self {
            target,
            context,
            already_loaded: HashSet::new(),
            dirty_map: HashMap::new(),
        }
    }

    pub fn meta(&self) -> &Arc<EntityMeta> {
        self.context.meta()
    }

    pub fn primary_key(&self) -> &Value {
        self.context.primary_key()
    }

    /// The wrapped record as it currently stands in memory.
    ///
    /// Properties that were never read through the proxy may still hold
    /// their default values.
    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn into_target(self) -> T {
        self.target
    }

    /// Resolves an intercepted getter or setter to its property.
    fn dispatch(&self, accessor: &Accessor) -> Result<Arc<PropertyMeta>> {
        let property = match accessor.kind {
            AccessorKind::Get => self.meta().meta_for_getter(accessor),
            AccessorKind::Set => self.meta().meta_for_setter(accessor),
        };
        property.cloned().ok_or_else(|| {
            CqlMapError::Usage(format!(
                "The entity '{}' has no property '{}'",
                self.meta().type_name,
                accessor.property
            ))
        })
    }

    async fn ensure_loaded(&mut self, property: &Arc<PropertyMeta>) -> Result<()> {
        let accessor = property.getter_accessor();
        if self.already_loaded.contains(&accessor) {
            return Ok(());
        }
        debug!(
            "Lazy loading property '{}' of entity '{}'",
            property.property_name,
            self.meta().type_name
        );
        let value = loader::load_property(&self.context, property).await?;
        property.set_value(&mut self.target, value)?;
        self.already_loaded.insert(accessor);
        Ok(())
    }

    /// Reads a property, fetching it first when it has not been loaded.
    pub async fn get(&mut self, name: &str) -> Result<Value> {
        let accessor = Accessor::getter(name);
        let property = self.dispatch(&accessor)?;
        if self.meta().is_id_getter(&accessor) {
            return Ok(self.primary_key().clone());
        }
        if property.is_counter() {
            return Err(CqlMapError::UnsupportedOperation(format!(
                "Counter property '{}' must be read through its counter handle",
                name
            )));
        }
        self.ensure_loaded(&property).await?;
        property.get_value(&self.target)
    }

    pub async fn get_as<V: CqlValue>(&mut self, name: &str) -> Result<V> {
        V::from_value(self.get(name).await?)
    }

    /// Writes a property locally and marks it dirty.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let accessor = Accessor::setter(name);
        let property = self.dispatch(&accessor)?;
        if self.meta().is_id_setter(&accessor) {
            return Err(CqlMapError::IllegalAccess(
                "Cannot change primary key value for existing entity".to_string(),
            ));
        }
        if property.is_counter() {
            return Err(CqlMapError::Usage(
                "Cannot set value directly to a Counter type. Please call the getter first to get handle on the wrapper"
                    .to_string(),
            ));
        }
        property.set_value(&mut self.target, value)?;
        trace!("Property '{}' of '{}' marked dirty", name, self.meta().type_name);
        self.already_loaded.insert(property.getter_accessor());
        self.dirty_map.insert(accessor, property);
        Ok(())
    }

    pub fn set_as<V: CqlValue>(&mut self, name: &str, value: V) -> Result<()> {
        self.set(name, value.to_value()?)
    }

    async fn collection(
        &mut self,
        name: &str,
        check: fn(&PropertyMeta) -> bool,
        kind: &str,
    ) -> Result<(Arc<PropertyMeta>, Value)> {
        let property = self.dispatch(&Accessor::getter(name))?;
        if !check(&property) {
            return Err(CqlMapError::Usage(format!(
                "Property '{}' of entity '{}' is not a {}",
                name,
                self.meta().type_name,
                kind
            )));
        }
        self.ensure_loaded(&property).await?;
        let value = property.get_value(&self.target)?;
        Ok((property, value))
    }

    /// Mutable view of a list property; every mutation marks it dirty.
    pub async fn list_mut<V: CqlValue>(&mut self, name: &str) -> Result<ListWrapper<'_, V>> {
        let (property, value) = self
            .collection(name, |p| p.property_type.is_list(), "list")
            .await?;
        let items = Vec::<V>::from_value(value)?;
        Ok(ListWrapper::new(
            items,
            FieldBinding::new(&mut self.target, property, &mut self.dirty_map),
        ))
    }

    pub async fn set_mut<V: CqlValue + Ord>(&mut self, name: &str) -> Result<SetWrapper<'_, V>> {
        let (property, value) = self
            .collection(name, |p| p.property_type.is_set(), "set")
            .await?;
        let items = BTreeSet::<V>::from_value(value)?;
        Ok(SetWrapper::new(
            items,
            FieldBinding::new(&mut self.target, property, &mut self.dirty_map),
        ))
    }

    pub async fn map_mut<K: CqlValue + Ord, V: CqlValue>(
        &mut self,
        name: &str,
    ) -> Result<MapWrapper<'_, K, V>> {
        let (property, value) = self
            .collection(name, |p| p.property_type.is_map(), "map")
            .await?;
        let entries = BTreeMap::<K, V>::from_value(value)?;
        Ok(MapWrapper::new(
            entries,
            FieldBinding::new(&mut self.target, property, &mut self.dirty_map),
        ))
    }

    pub fn counter(&self, name: &str) -> Result<CounterHandle> {
        let property = self.dispatch(&Accessor::getter(name))?;
        if !property.is_counter() {
            return Err(CqlMapError::Usage(format!(
                "Property '{}' of entity '{}' is not a counter",
                name,
                self.meta().type_name
            )));
        }
        Ok(CounterHandle::new(self.context.clone(), property))
    }

    /// Fetches every property that has not been loaded yet.
    pub async fn initialize(&mut self) -> Result<()> {
        let pending: Vec<Arc<PropertyMeta>> = self
            .meta()
            .column_metas()
            .filter(|p| !self.already_loaded.contains(&p.getter_accessor()))
            .cloned()
            .collect();
        for property in &pending {
            self.ensure_loaded(property).await?;
        }
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty_map.is_empty()
    }

    /// Names of the properties written since the last merge, sorted.
    pub fn dirty_properties(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .dirty_map
            .values()
            .map(|p| p.property_name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.already_loaded.contains(&Accessor::getter(name))
    }

    pub(crate) fn mark_loaded<'a>(
        &mut self,
        properties: impl IntoIterator<Item = &'a Arc<PropertyMeta>>,
    ) {
        self.already_loaded
            .extend(properties.into_iter().map(|p| p.getter_accessor()));
    }

    pub(crate) fn forget_loaded(&mut self) {
        self.already_loaded.clear();
    }

    /// Dirty properties in declaration order.
    pub(crate) fn dirty_metas(&self) -> Vec<Arc<PropertyMeta>> {
        self.context
            .meta()
            .properties
            .iter()
            .filter(|p| self.dirty_map.contains_key(&p.setter_accessor()))
            .cloned()
            .collect()
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty_map.clear();
    }

    pub(crate) fn context(&self) -> &PersistenceContext {
        &self.context
    }

    pub(crate) fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }
}

impl<T: Entity + std::fmt::Debug> std::fmt::Debug for EntityProxy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityProxy")
            .field("target", &self.target)
            .field("primary_key", self.context.primary_key())
            .field("dirty", &self.dirty_properties())
            .finish()
    }
}
