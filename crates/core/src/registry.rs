// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Entity registry: name to validated descriptor.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::remote::RemoteApi;
use crate::schema::{validate_field_name, validate_table_name, Schema, TableSpec};

/// How one entity is stored, routed and reached remotely.
#[derive(Clone)]
pub struct EntityDescriptor {
    pub name: String,
    pub table: String,
    /// May be created/updated/deleted while offline.
    pub offline_writable: bool,
    /// Record fields backed by a local index.
    pub indexes: Vec<String>,
    pub remote: Arc<dyn RemoteApi>,
}

impl EntityDescriptor {
    /// A read-only-offline entity stored in a table of the same name.
    pub fn new(name: impl Into<String>, remote: Arc<dyn RemoteApi>) -> Self {
        let name = name.into();
        EntityDescriptor {
            table: name.clone(),
            name,
            offline_writable: false,
            indexes: Vec::new(),
            remote,
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn offline_writable(mut self) -> Self {
        self.offline_writable = true;
        self
    }

    pub fn index(mut self, field: impl Into<String>) -> Self {
        self.indexes.push(field.into());
        self
    }

    pub fn table_spec(&self) -> TableSpec {
        self.indexes
            .iter()
            .fold(TableSpec::new(&self.table), |spec, field| {
                spec.with_index(field)
            })
    }
}

impl std::fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("offline_writable", &self.offline_writable)
            .field("indexes", &self.indexes)
            .finish_non_exhaustive()
    }
}

/// The set of entities one engine serves, plus the schema version they map to.
#[derive(Debug, Clone)]
pub struct Registry {
    version: i64,
    entities: BTreeMap<String, Arc<EntityDescriptor>>,
}

impl Registry {
    pub fn new(version: i64) -> Self {
        Registry {
            version,
            entities: BTreeMap::new(),
        }
    }

    /// Add an entity. Names, tables and index fields must be valid and unique.
    pub fn register(&mut self, descriptor: EntityDescriptor) -> Result<()> {
        validate_table_name(&descriptor.name)?;
        validate_table_name(&descriptor.table)?;
        for field in &descriptor.indexes {
            validate_field_name(field)?;
        }
        if self.entities.contains_key(&descriptor.name) {
            return Err(Error::InvalidSchema(format!(
                "entity '{}' registered twice",
                descriptor.name
            )));
        }
        if let Some(other) = self
            .entities
            .values()
            .find(|d| d.table == descriptor.table)
        {
            return Err(Error::InvalidSchema(format!(
                "entities '{}' and '{}' share table '{}'",
                other.name, descriptor.name, descriptor.table
            )));
        }
        self.entities
            .insert(descriptor.name.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Builder-style [`Registry::register`].
    pub fn with(mut self, descriptor: EntityDescriptor) -> Result<Self> {
        self.register(descriptor)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<&Arc<EntityDescriptor>> {
        self.entities
            .get(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Entity names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    /// The persisted schema: one table per entity.
    pub fn schema(&self) -> Schema {
        self.entities
            .values()
            .fold(Schema::new(self.version), |schema, d| {
                schema.with_table(d.table_spec())
            })
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
