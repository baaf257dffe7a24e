use std::any::{Any, TypeId};
use std::sync::Arc;

use log::debug;

use crate::config::ConfigurationContext;
use crate::core::{ConsistencyLevel, ConsistencyLevelPolicy, CqlMapError, Result};
use crate::entity::{Entity, ValueKind};
use crate::metadata::descriptor::{
    ComponentDescriptor, ComponentRole, EntityDescriptor, FieldDescriptor, FieldGetter,
    FieldRole, FieldSetter,
};
use crate::metadata::entity::EntityMeta;
use crate::metadata::property::{
    EmbeddedIdProperties, ErasedGetter, ErasedSetter, KeyComponent, PropertyMeta, PropertyType,
};

/// Builds [`EntityMeta`] from record descriptors and records the per-table
/// consistency defaults into the shared policy.
pub struct EntityParser<'a> {
    config: &'a ConfigurationContext,
    policy: &'a ConsistencyLevelPolicy,
}

impl<'a> EntityParser<'a> {
    pub fn new(config: &'a ConfigurationContext, policy: &'a ConsistencyLevelPolicy) -> Self {
        Self { config, policy }
    }

    pub fn parse<T: Entity>(&self) -> Result<EntityMeta> {
        self.parse_descriptor(T::descriptor())
    }

    pub fn parse_descriptor<T: 'static>(
        &self,
        descriptor: EntityDescriptor<T>,
    ) -> Result<EntityMeta> {
        let type_name = descriptor.type_name.clone();
        let table_name = descriptor.table_name();
        debug!("Parsing entity '{}' mapped to table '{}'", type_name, table_name);

        let (read_level, write_level) = match descriptor.consistency {
            Some(levels) => (levels.read, levels.write),
            None => (self.config.default_read_level, self.config.default_write_level),
        };

        let mut properties: Vec<Arc<PropertyMeta>> = Vec::with_capacity(descriptor.fields.len());
        let mut id_meta: Option<Arc<PropertyMeta>> = None;

        for field in descriptor.fields {
            let property_name = field.property_name().to_string();
            if properties.iter().any(|meta| meta.property_name == property_name) {
                return Err(CqlMapError::BeanMapping(format!(
                    "The property '{}' is already used for the entity '{}'",
                    property_name, type_name
                )));
            }

            let meta = Arc::new(self.parse_field(&type_name, field, read_level, write_level)?);
            if meta.property_type.is_id() {
                if id_meta.is_some() {
                    return Err(CqlMapError::BeanMapping(format!(
                        "The entity '{}' should have only one field with #[id] or #[embedded_id]",
                        type_name
                    )));
                }
                id_meta = Some(meta.clone());
            }

            properties.push(meta);
        }

        let id_meta = id_meta.ok_or_else(|| {
            CqlMapError::BeanMapping(format!(
                "The entity '{}' should have at least one field with #[id] or #[embedded_id]",
                type_name
            ))
        })?;

        let clustered = id_meta
            .embedded_id
            .as_ref()
            .is_some_and(EmbeddedIdProperties::is_clustered);
        let clustered_counter = if clustered {
            validate_clustered(&type_name, &properties)?
        } else {
            false
        };

        let getter_metas = properties
            .iter()
            .map(|meta| (meta.getter_accessor(), meta.clone()))
            .collect();
        let setter_metas = properties
            .iter()
            .map(|meta| (meta.setter_accessor(), meta.clone()))
            .collect();

        self.policy.set_read_level_for_table(read_level, &table_name)?;
        self.policy.set_write_level_for_table(write_level, &table_name)?;

        debug!(
            "Entity '{}' parsed: {} properties, clustered={}, read={}, write={}",
            type_name,
            properties.len(),
            clustered,
            read_level,
            write_level
        );

        Ok(EntityMeta {
            type_id: TypeId::of::<T>(),
            type_name,
            table_name,
            id_meta,
            properties,
            read_level,
            write_level,
            clustered,
            clustered_counter,
            getter_metas,
            setter_metas,
        })
    }

    fn parse_field<T: 'static>(
        &self,
        type_name: &str,
        field: FieldDescriptor<T>,
        type_read: ConsistencyLevel,
        type_write: ConsistencyLevel,
    ) -> Result<PropertyMeta> {
        let property_name = field.property_name().to_string();

        let property_type = match (&field.role, field.kind, field.lazy) {
            (FieldRole::Id | FieldRole::EmbeddedId(_), _, true) => {
                return Err(CqlMapError::BeanMapping(format!(
                    "The identity '{}' of entity '{}' cannot be lazy",
                    property_name, type_name
                )));
            }
            (FieldRole::Id, _, false) => PropertyType::Id,
            (FieldRole::EmbeddedId(_), _, false) => PropertyType::EmbeddedId,
            (FieldRole::Column, ValueKind::Counter, _) => PropertyType::Counter,
            (FieldRole::Column, ValueKind::List, false) => PropertyType::List,
            (FieldRole::Column, ValueKind::List, true) => PropertyType::LazyList,
            (FieldRole::Column, ValueKind::Set, false) => PropertyType::Set,
            (FieldRole::Column, ValueKind::Set, true) => PropertyType::LazySet,
            (FieldRole::Column, ValueKind::Map, false) => PropertyType::Map,
            (FieldRole::Column, ValueKind::Map, true) => PropertyType::LazyMap,
            (FieldRole::Column, ValueKind::Simple | ValueKind::Compound, false) => {
                PropertyType::Simple
            }
            (FieldRole::Column, ValueKind::Simple | ValueKind::Compound, true) => {
                PropertyType::LazySimple
            }
        };

        let (read_level, write_level) = match field.consistency {
            Some(levels) => (levels.read, levels.write),
            None => (type_read, type_write),
        };

        if property_type.is_counter()
            && field.consistency.is_some()
            && !(read_level.is_valid_for_counter() && write_level.is_valid_for_counter())
        {
            return Err(CqlMapError::BeanMapping(format!(
                "Counter property '{}' of entity '{}' cannot use consistency level {}",
                property_name,
                type_name,
                ConsistencyLevel::Any
            )));
        }

        let embedded_id = match &field.role {
            FieldRole::EmbeddedId(components) => {
                Some(parse_components(type_name, &property_name, components)?)
            }
            _ => None,
        };

        let counter_fqcn = property_type
            .is_counter()
            .then(|| type_name.to_string());

        Ok(PropertyMeta {
            entity_type_name: type_name.to_string(),
            property_name,
            getter: erase_getter::<T>(type_name, field.getter),
            setter: erase_setter::<T>(type_name, field.setter),
            property_type,
            value_type: field.value_type,
            key_type: field.key_type,
            read_level,
            write_level,
            embedded_id,
            counter_fqcn,
        })
    }
}

fn parse_components(
    type_name: &str,
    property_name: &str,
    components: &[ComponentDescriptor],
) -> Result<EmbeddedIdProperties> {
    if components.is_empty() {
        return Err(CqlMapError::BeanMapping(format!(
            "The compound key '{}' of entity '{}' should have at least one component",
            property_name, type_name
        )));
    }

    // Without an explicit partition component the first one partitions.
    let explicit_partition = components
        .iter()
        .any(|c| c.role == ComponentRole::Partition);

    let mut partition_components = Vec::new();
    let mut clustering_components = Vec::new();
    for (index, component) in components.iter().enumerate() {
        let (is_partition, reversed) = match component.role {
            ComponentRole::Partition => (true, false),
            ComponentRole::Clustering { reversed } => (false, reversed),
            ComponentRole::Unspecified => (!explicit_partition && index == 0, false),
        };
        let key_component = KeyComponent {
            name: component.name.clone(),
            value_type: component.value_type,
            reversed,
        };
        if is_partition {
            if !clustering_components.is_empty() {
                return Err(CqlMapError::BeanMapping(format!(
                    "Partition component '{}' of entity '{}' must precede clustering components",
                    component.name, type_name
                )));
            }
            partition_components.push(key_component);
        } else {
            clustering_components.push(key_component);
        }
    }

    if partition_components.is_empty() {
        return Err(CqlMapError::BeanMapping(format!(
            "The compound key '{}' of entity '{}' should have at least one partition component",
            property_name, type_name
        )));
    }

    Ok(EmbeddedIdProperties {
        partition_components,
        clustering_components,
    })
}

/// Returns whether the clustered type is a clustered counter.
fn validate_clustered(type_name: &str, properties: &[Arc<PropertyMeta>]) -> Result<bool> {
    let value_metas: Vec<&Arc<PropertyMeta>> = properties
        .iter()
        .filter(|meta| !meta.property_type.is_id())
        .collect();
    let all_counters = !value_metas.is_empty() && value_metas.iter().all(|meta| meta.is_counter());

    if value_metas.len() > 1 && !all_counters {
        return Err(CqlMapError::BeanMapping(format!(
            "The clustered entity '{}' should not have more than two properties annotated with #[embedded_id]/#[id]/#[column]",
            type_name
        )));
    }

    for meta in &value_metas {
        if !matches!(
            meta.property_type,
            PropertyType::Simple | PropertyType::LazySimple | PropertyType::Counter
        ) {
            return Err(CqlMapError::BeanMapping(format!(
                "The clustered entity '{}' should have a single #[column] property of type simple/counter",
                type_name
            )));
        }
    }

    Ok(all_counters)
}

fn erase_getter<T: 'static>(type_name: &str, getter: FieldGetter<T>) -> ErasedGetter {
    let type_name = type_name.to_string();
    Arc::new(move |entity: &dyn Any| {
        let entity = entity.downcast_ref::<T>().ok_or_else(|| {
            CqlMapError::TypeMismatch(format!(
                "Accessor of '{}' applied to another type",
                type_name
            ))
        })?;
        getter(entity)
    })
}

fn erase_setter<T: 'static>(type_name: &str, setter: FieldSetter<T>) -> ErasedSetter {
    let type_name = type_name.to_string();
    Arc::new(move |entity: &mut dyn Any, value| match entity.downcast_mut::<T>() {
        Some(entity) => setter(entity, value),
        None => Err(CqlMapError::TypeMismatch(format!(
            "Accessor of '{}' applied to another type",
            type_name
        ))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Value, ValueType};
    use crate::entity::{Counter, CqlValue};

    #[derive(Default, Clone)]
    struct Tweet {
        id: i64,
        text: String,
        likes: Counter,
    }

    fn tweet_descriptor() -> EntityDescriptor<Tweet> {
        EntityDescriptor::new("app::Tweet")
            .field(FieldDescriptor::id::<i64>(
                "id",
                |t: &Tweet| t.id.to_value(),
                |t: &mut Tweet, v| {
                    t.id = i64::from_value(v)?;
                    Ok(())
                },
            ))
            .field(FieldDescriptor::column::<String>(
                "text",
                |t: &Tweet| t.text.to_value(),
                |t: &mut Tweet, v| {
                    t.text = String::from_value(v)?;
                    Ok(())
                },
            ))
            .field(FieldDescriptor::column::<Counter>(
                "likes",
                |t: &Tweet| t.likes.to_value(),
                |t: &mut Tweet, v| {
                    t.likes = Counter::from_value(v)?;
                    Ok(())
                },
            ))
    }

    #[test]
    fn test_parse_simple_entity() {
        let config = ConfigurationContext::new();
        let policy = config.new_consistency_policy();
        let meta = EntityParser::new(&config, &policy)
            .parse_descriptor(tweet_descriptor())
            .unwrap();

        assert_eq!(meta.table_name, "Tweet");
        assert_eq!(meta.id_meta.property_type, PropertyType::Id);
        assert_eq!(meta.id_meta.value_type, ValueType::Bigint);
        assert!(meta.has_simple_counter());
        assert_eq!(
            meta.property("likes").unwrap().counter_fqcn.as_deref(),
            Some("app::Tweet")
        );
        assert_eq!(meta.eager_metas().count(), 2);
        assert!(policy.has_table("Tweet").unwrap());
    }

    #[test]
    fn test_erased_accessors_dispatch_to_fields() {
        let config = ConfigurationContext::new();
        let policy = config.new_consistency_policy();
        let meta = EntityParser::new(&config, &policy)
            .parse_descriptor(tweet_descriptor())
            .unwrap();

        let mut tweet = Tweet::default();
        let text = meta.property("text").unwrap();
        text.set_value(&mut tweet, Value::from("hello")).unwrap();
        assert_eq!(tweet.text, "hello");
        assert_eq!(text.get_value(&tweet).unwrap(), Value::from("hello"));
        assert!(text.get_value(&42_i64).is_err());
    }

    #[test]
    fn test_duplicate_property_name() {
        let descriptor = tweet_descriptor().field(
            FieldDescriptor::column::<String>(
                "body",
                |t: &Tweet| t.text.to_value(),
                |_t: &mut Tweet, _v| Ok(()),
            )
            .name("text"),
        );
        let config = ConfigurationContext::new();
        let policy = config.new_consistency_policy();
        let err = EntityParser::new(&config, &policy)
            .parse_descriptor(descriptor)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bean mapping error: The property 'text' is already used for the entity 'app::Tweet'"
        );
    }

    #[test]
    fn test_counter_with_any_rejected() {
        let mut descriptor = tweet_descriptor();
        descriptor.fields[2] = descriptor.fields[2]
            .clone()
            .consistency(ConsistencyLevel::Any, ConsistencyLevel::One);
        let config = ConfigurationContext::new();
        let policy = config.new_consistency_policy();
        let err = EntityParser::new(&config, &policy)
            .parse_descriptor(descriptor)
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_unspecified_components_first_partitions() {
        let components = vec![
            ComponentDescriptor::of::<i64>("user_id", ComponentRole::Unspecified),
            ComponentDescriptor::of::<String>("name", ComponentRole::Unspecified),
        ];
        let embedded = parse_components("app::Tweet", "id", &components).unwrap();
        assert_eq!(embedded.partition_components.len(), 1);
        assert_eq!(embedded.clustering_components[0].name, "name");
    }

    #[test]
    fn test_partition_after_clustering_rejected() {
        let components = vec![
            ComponentDescriptor::of::<String>(
                "name",
                ComponentRole::Clustering { reversed: false },
            ),
            ComponentDescriptor::of::<i64>("user_id", ComponentRole::Partition),
        ];
        assert!(parse_components("app::Tweet", "id", &components).is_err());
    }
}
