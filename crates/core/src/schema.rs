// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted local schema: one table per entity plus secondary indexes.

use crate::error::{Error, Result};

/// One entity table and the record fields indexed for `query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub indexes: Vec<String>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        TableSpec {
            name: name.into(),
            indexes: Vec::new(),
        }
    }

    pub fn with_index(mut self, field: impl Into<String>) -> Self {
        self.indexes.push(field.into());
        self
    }

    pub fn is_indexed(&self, field: &str) -> bool {
        self.indexes.iter().any(|f| f == field)
    }

    /// Name of the SQLite index backing `field`.
    pub fn index_name(&self, field: &str) -> String {
        format!("idx_{}_{}", self.name, field.to_ascii_lowercase())
    }
}

/// Versioned set of entity tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub version: i64,
    pub tables: Vec<TableSpec>,
}

impl Schema {
    pub fn new(version: i64) -> Self {
        Schema {
            version,
            tables: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: TableSpec) -> Self {
        self.tables.push(table);
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Check names, reserved prefixes and duplicates.
    pub fn validate(&self) -> Result<()> {
        if self.version < 1 {
            return Err(Error::InvalidSchema(format!(
                "version must be positive, got {}",
                self.version
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for table in &self.tables {
            validate_table_name(&table.name)?;
            if !seen.insert(table.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate table '{}'",
                    table.name
                )));
            }
            for field in &table.indexes {
                validate_field_name(field)?;
            }
        }
        Ok(())
    }
}

/// Table names: lowercase snake case. A leading `_` is reserved for the
/// engine's own tables.
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidSchema(format!(
            "invalid table name '{name}'\n  hint: use lowercase letters, digits and '_', starting with a letter"
        )))
    }
}

/// Field names may be camelCase; they end up inside a JSON path literal.
pub fn validate_field_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidSchema(format!("invalid field name '{name}'")))
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
