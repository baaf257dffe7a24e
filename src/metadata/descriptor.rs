use crate::core::{ConsistencyLevel, Result, Value, ValueType};
use crate::entity::{CompoundKey, CqlValue, ValueKind};

pub type FieldGetter<T> = fn(&T) -> Result<Value>;
pub type FieldSetter<T> = fn(&mut T, Value) -> Result<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencyOverride {
    pub read: ConsistencyLevel,
    pub write: ConsistencyLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentRole {
    Partition,
    Clustering { reversed: bool },
    /// No explicit role; the parser decides from position.
    Unspecified,
}

/// One component of a compound primary key, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    pub name: String,
    pub value_type: ValueType,
    pub role: ComponentRole,
}

impl ComponentDescriptor {
    pub fn of<V: CqlValue>(name: impl Into<String>, role: ComponentRole) -> Self {
        Self {
            name: name.into(),
            value_type: V::value_type(),
            role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRole {
    Id,
    EmbeddedId(Vec<ComponentDescriptor>),
    Column,
}

/// Declared shape of one record field, as produced by `#[derive(Entity)]`.
#[derive(Debug, Clone)]
pub struct FieldDescriptor<T> {
    pub field_name: String,
    pub column_name: Option<String>,
    pub value_type: ValueType,
    pub kind: ValueKind,
    pub key_type: Option<ValueType>,
    pub role: FieldRole,
    pub lazy: bool,
    pub consistency: Option<ConsistencyOverride>,
    pub getter: FieldGetter<T>,
    pub setter: FieldSetter<T>,
}

impl<T> FieldDescriptor<T> {
    pub fn column<V: CqlValue>(
        field_name: impl Into<String>,
        getter: FieldGetter<T>,
        setter: FieldSetter<T>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            column_name: None,
            value_type: V::value_type(),
            kind: V::kind(),
            key_type: V::key_type(),
            role: FieldRole::Column,
            lazy: false,
            consistency: None,
            getter,
            setter,
        }
    }

    pub fn id<V: CqlValue>(
        field_name: impl Into<String>,
        getter: FieldGetter<T>,
        setter: FieldSetter<T>,
    ) -> Self {
        Self {
            role: FieldRole::Id,
            ..Self::column::<V>(field_name, getter, setter)
        }
    }

    pub fn embedded_id<K: CompoundKey>(
        field_name: impl Into<String>,
        getter: FieldGetter<T>,
        setter: FieldSetter<T>,
    ) -> Self {
        Self {
            kind: ValueKind::Compound,
            role: FieldRole::EmbeddedId(K::components()),
            ..Self::column::<K>(field_name, getter, setter)
        }
    }

    /// Store under a different column name than the field name
    pub fn name(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = Some(column_name.into());
        self
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn consistency(mut self, read: ConsistencyLevel, write: ConsistencyLevel) -> Self {
        self.consistency = Some(ConsistencyOverride { read, write });
        self
    }

    pub fn property_name(&self) -> &str {
        self.column_name.as_deref().unwrap_or(&self.field_name)
    }
}

/// Field-by-field description of a record type.
#[derive(Debug, Clone)]
pub struct EntityDescriptor<T> {
    pub type_name: String,
    pub table: Option<String>,
    pub consistency: Option<ConsistencyOverride>,
    pub fields: Vec<FieldDescriptor<T>>,
}

impl<T> EntityDescriptor<T> {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            table: None,
            consistency: None,
            fields: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Type-level consistency applied to every field without its own override
    pub fn consistency(mut self, read: ConsistencyLevel, write: ConsistencyLevel) -> Self {
        self.consistency = Some(ConsistencyOverride { read, write });
        self
    }

    pub fn field(mut self, field: FieldDescriptor<T>) -> Self {
        self.fields.push(field);
        self
    }

    /// Table name, defaulting to the unqualified type name.
    pub fn table_name(&self) -> String {
        match &self.table {
            Some(table) => table.clone(),
            None => self
                .type_name
                .rsplit("::")
                .next()
                .unwrap_or(&self.type_name)
                .to_string(),
        }
    }
}
