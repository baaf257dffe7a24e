//! Mutation-tracking views over collection properties.
//!
//! A wrapper holds a typed copy of the collection. Reads go through `Deref`;
//! every mutation writes the whole collection back into the record and
//! marks the property dirty, exactly as a setter call would.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Deref;
use std::sync::Arc;

use log::trace;

use crate::core::{CqlMapError, Result};
use crate::entity::CqlValue;
use crate::metadata::{Accessor, PropertyMeta};

pub(crate) struct FieldBinding<'a> {
    target: &'a mut (dyn Any + Send + Sync),
    property: Arc<PropertyMeta>,
    dirty_map: &'a mut HashMap<Accessor, Arc<PropertyMeta>>,
}

impl<'a> FieldBinding<'a> {
    pub(crate) fn new(
        target: &'a mut (dyn Any + Send + Sync),
        property: Arc<PropertyMeta>,
        dirty_map: &'a mut HashMap<Accessor, Arc<PropertyMeta>>,
    ) -> Self {
        Self {
            target,
            property,
            dirty_map,
        }
    }

    fn write_back<C: CqlValue>(&mut self, collection: &C) -> Result<()> {
        self.property.set_value(&mut *self.target, collection.to_value()?)?;
        trace!("Property '{}' marked dirty", self.property.property_name);
        self.dirty_map
            .insert(self.property.setter_accessor(), self.property.clone());
        Ok(())
    }
}

pub struct ListWrapper<'a, V: CqlValue> {
    items: Vec<V>,
    binding: FieldBinding<'a>,
}

impl<'a, V: CqlValue> ListWrapper<'a, V> {
    pub(crate) fn new(items: Vec<V>, binding: FieldBinding<'a>) -> Self {
        Self { items, binding }
    }

    fn commit(&mut self) -> Result<()> {
        self.binding.write_back(&self.items)
    }

    fn check_index(&self, index: usize, allow_end: bool) -> Result<()> {
        let len = self.items.len();
        if index < len || (allow_end && index == len) {
            Ok(())
        } else {
            Err(CqlMapError::Usage(format!(
                "Index {} out of bounds for list property '{}' of length {}",
                index, self.binding.property.property_name, len
            )))
        }
    }

    pub fn push(&mut self, value: V) -> Result<()> {
        self.items.push(value);
        self.commit()
    }

    pub fn insert(&mut self, index: usize, value: V) -> Result<()> {
        self.check_index(index, true)?;
        self.items.insert(index, value);
        self.commit()
    }

    pub fn set(&mut self, index: usize, value: V) -> Result<V> {
        self.check_index(index, false)?;
        let previous = std::mem::replace(&mut self.items[index], value);
        self.commit()?;
        Ok(previous)
    }

    pub fn remove(&mut self, index: usize) -> Result<V> {
        self.check_index(index, false)?;
        let removed = self.items.remove(index);
        self.commit()?;
        Ok(removed)
    }

    pub fn pop(&mut self) -> Result<Option<V>> {
        let popped = self.items.pop();
        if popped.is_some() {
            self.commit()?;
        }
        Ok(popped)
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = V>) -> Result<()> {
        self.items.extend(values);
        self.commit()
    }

    pub fn retain(&mut self, f: impl FnMut(&V) -> bool) -> Result<()> {
        self.items.retain(f);
        self.commit()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.items.clear();
        self.commit()
    }
}

impl<V: CqlValue> Deref for ListWrapper<'_, V> {
    type Target = [V];

    fn deref(&self) -> &[V] {
        &self.items
    }
}

pub struct SetWrapper<'a, V: CqlValue + Ord> {
    items: BTreeSet<V>,
    binding: FieldBinding<'a>,
}

impl<'a, V: CqlValue + Ord> SetWrapper<'a, V> {
    pub(crate) fn new(items: BTreeSet<V>, binding: FieldBinding<'a>) -> Self {
        Self { items, binding }
    }

    fn commit(&mut self) -> Result<()> {
        self.binding.write_back(&self.items)
    }

    /// Returns whether the value was newly inserted.
    pub fn insert(&mut self, value: V) -> Result<bool> {
        let inserted = self.items.insert(value);
        if inserted {
            self.commit()?;
        }
        Ok(inserted)
    }

    pub fn remove(&mut self, value: &V) -> Result<bool> {
        let removed = self.items.remove(value);
        if removed {
            self.commit()?;
        }
        Ok(removed)
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = V>) -> Result<()> {
        self.items.extend(values);
        self.commit()
    }

    pub fn retain(&mut self, f: impl FnMut(&V) -> bool) -> Result<()> {
        self.items.retain(f);
        self.commit()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.items.clear();
        self.commit()
    }
}

impl<V: CqlValue + Ord> Deref for SetWrapper<'_, V> {
    type Target = BTreeSet<V>;

    fn deref(&self) -> &BTreeSet<V> {
        &self.items
    }
}

pub struct MapWrapper<'a, K: CqlValue + Ord, V: CqlValue> {
    entries: BTreeMap<K, V>,
    binding: FieldBinding<'a>,
}

impl<'a, K: CqlValue + Ord, V: CqlValue> MapWrapper<'a, K, V> {
    pub(crate) fn new(entries: BTreeMap<K, V>, binding: FieldBinding<'a>) -> Self {
        Self { entries, binding }
    }

    fn commit(&mut self) -> Result<()> {
        self.binding.write_back(&self.entries)
    }

    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let previous = self.entries.insert(key, value);
        self.commit()?;
        Ok(previous)
    }

    pub fn remove(&mut self, key: &K) -> Result<Option<V>> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.commit()?;
        }
        Ok(removed)
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        self.entries.extend(entries);
        self.commit()
    }

    pub fn retain(&mut self, f: impl FnMut(&K, &mut V) -> bool) -> Result<()> {
        self.entries.retain(f);
        self.commit()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.commit()
    }
}

impl<K: CqlValue + Ord, V: CqlValue> Deref for MapWrapper<'_, K, V> {
    type Target = BTreeMap<K, V>;

    fn deref(&self) -> &BTreeMap<K, V> {
        &self.entries
    }
}
