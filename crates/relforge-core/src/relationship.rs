use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::column::Column;
use crate::error::{Error, Result};

/// Parent column -> child column pair of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub parent: String,
    pub child: String,
}

impl ColumnMapping {
    pub fn new(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
        }
    }
}

/// Named lookup used to render a human-readable label for a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityLookup {
    pub name: String,
    /// View listing candidate rows.
    pub view: String,
    /// Lookup procedure resolving one key to its description.
    pub procedure: String,
    pub id_column_index: usize,
    pub description_column_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_parameter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compound_key_group: Option<String>,
}

impl EntityLookup {
    pub fn new(
        name: impl Into<String>,
        view: impl Into<String>,
        procedure: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            view: view.into(),
            procedure: procedure.into(),
            id_column_index: 0,
            description_column_index: 1,
            key_parameter: None,
            compound_key_group: None,
        }
    }

    pub fn columns(mut self, id_column_index: usize, description_column_index: usize) -> Self {
        self.id_column_index = id_column_index;
        self.description_column_index = description_column_index;
        self
    }

    pub fn key_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.key_parameter = Some(parameter.into());
        self
    }

    pub fn compound_key_group(mut self, group: impl Into<String>) -> Self {
        self.compound_key_group = Some(group.into());
        self
    }
}

/// Foreign key from a child entity to a parent entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityForeignKey {
    name: String,
    parent: String,
    child: String,
    mappings: Vec<ColumnMapping>,
    fake: bool,
    do_not_create_index: bool,
    lookups: BTreeMap<String, EntityLookup>,
}

impl EntityForeignKey {
    pub fn builder(name: impl Into<String>, parent: impl Into<String>) -> ForeignKeyBuilder {
        ForeignKeyBuilder {
            name: name.into(),
            parent: parent.into(),
            mappings: Vec::new(),
            fake: false,
            do_not_create_index: false,
            lookups: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mnemonic of the referenced entity.
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Mnemonic of the owning entity.
    pub fn child(&self) -> &str {
        &self.child
    }

    /// Explicit mappings; empty means "join by primary-key names".
    pub fn mappings(&self) -> &[ColumnMapping] {
        &self.mappings
    }

    /// Fake relationships produce no DDL.
    pub fn is_fake(&self) -> bool {
        self.fake
    }

    pub fn do_not_create_index(&self) -> bool {
        self.do_not_create_index
    }

    pub fn lookups(&self) -> &BTreeMap<String, EntityLookup> {
        &self.lookups
    }

    pub fn lookup(&self, name: &str) -> Option<&EntityLookup> {
        self.lookups.get(name)
    }
}

/// Unattached foreign key declaration; the child is set by the owning entity.
#[derive(Debug, Clone)]
pub struct ForeignKeyBuilder {
    name: String,
    parent: String,
    mappings: Vec<ColumnMapping>,
    fake: bool,
    do_not_create_index: bool,
    lookups: Vec<EntityLookup>,
}

impl ForeignKeyBuilder {
    pub fn map(mut self, parent: impl Into<String>, child: impl Into<String>) -> Self {
        self.mappings.push(ColumnMapping::new(parent, child));
        self
    }

    pub fn fake(mut self) -> Self {
        self.fake = true;
        self
    }

    pub fn do_not_create_index(mut self) -> Self {
        self.do_not_create_index = true;
        self
    }

    pub fn lookup(mut self, lookup: EntityLookup) -> Self {
        self.lookups.push(lookup);
        self
    }

    pub(crate) fn attach(self, child: &str, columns: &[Column]) -> Result<EntityForeignKey> {
        for mapping in &self.mappings {
            if !columns.iter().any(|column| column.name() == mapping.child) {
                return Err(Error::MissingColumn {
                    entity: child.to_string(),
                    owner: self.name.clone(),
                    column: mapping.child.clone(),
                });
            }
        }

        let mut lookups = BTreeMap::new();
        for lookup in self.lookups {
            if lookup.id_column_index == lookup.description_column_index {
                return Err(Error::InvalidDefinition(format!(
                    "lookup '{}' of '{}' uses the same column for key and description",
                    lookup.name, self.name
                )));
            }
            let name = lookup.name.clone();
            if lookups.insert(name.clone(), lookup).is_some() {
                return Err(Error::InvalidDefinition(format!(
                    "duplicate lookup '{name}' in foreign key '{}'",
                    self.name
                )));
            }
        }

        Ok(EntityForeignKey {
            name: self.name,
            parent: self.parent,
            child: child.to_string(),
            mappings: self.mappings,
            fake: self.fake,
            do_not_create_index: self.do_not_create_index,
            lookups,
        })
    }
}

/// Secondary (non-unique) index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityIndex {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
}

impl EntityIndex {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            include: Vec::new(),
        }
    }

    pub fn include<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// Unique constraint over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityUniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

impl EntityUniqueConstraint {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}
