use std::collections::BTreeMap;

use serde::Serialize;

use crate::column::Column;
use crate::domain::DomainRegistry;
use crate::entity::EntityDefinition;
use crate::error::{Error, Result};
use crate::relationship::{ColumnMapping, EntityForeignKey};

/// Resolved join condition of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyJoin {
    pub name: String,
    pub parent: String,
    pub parent_table: String,
    pub child: String,
    pub child_table: String,
    /// Parent column -> child column, in key order.
    pub pairs: Vec<ColumnMapping>,
}

/// Name-unique set of entities keyed by mnemonic.
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    entities: BTreeMap<String, EntityDefinition>,
    domains: DomainRegistry,
}

impl EntityCatalog {
    pub fn new(domains: DomainRegistry) -> Self {
        Self {
            entities: BTreeMap::new(),
            domains,
        }
    }

    /// Build a catalog and check every foreign key resolves.
    pub fn from_entities<I>(domains: DomainRegistry, entities: I) -> Result<Self>
    where
        I: IntoIterator<Item = EntityDefinition>,
    {
        let mut catalog = Self::new(domains);
        for entity in entities {
            catalog.insert(entity)?;
        }
        crate::validation::validate_catalog(&catalog)?;
        Ok(catalog)
    }

    pub fn insert(&mut self, entity: EntityDefinition) -> Result<()> {
        if self.entities.contains_key(entity.mneo()) {
            return Err(Error::InvalidDefinition(format!(
                "duplicate entity mnemonic '{}'",
                entity.mneo()
            )));
        }
        self.entities.insert(entity.mneo().to_string(), entity);
        Ok(())
    }

    pub fn get(&self, mneo: &str) -> Option<&EntityDefinition> {
        self.entities.get(mneo)
    }

    /// Entities ordered by mnemonic.
    pub fn entities(&self) -> impl Iterator<Item = &EntityDefinition> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn domains(&self) -> &DomainRegistry {
        &self.domains
    }

    /// Resolve the join condition of `fk`.
    ///
    /// Priority: explicit mappings, then identically named primary keys, then a
    /// parent unique constraint fully covered by the child's PK and FK columns.
    pub fn resolve_join(&self, fk: &EntityForeignKey) -> Result<ForeignKeyJoin> {
        let unresolved = |reason: String| Error::UnresolvedForeignKey {
            name: fk.name().to_string(),
            parent: fk.parent().to_string(),
            child: fk.child().to_string(),
            reason,
        };

        let parent = self
            .get(fk.parent())
            .ok_or_else(|| unresolved(format!("entity '{}' is not registered", fk.parent())))?;
        let child = self
            .get(fk.child())
            .ok_or_else(|| unresolved(format!("entity '{}' is not registered", fk.child())))?;

        let pairs = if !fk.mappings().is_empty() {
            for mapping in fk.mappings() {
                if parent.column(&mapping.parent).is_none() {
                    return Err(unresolved(format!(
                        "parent column '{}' does not exist",
                        mapping.parent
                    )));
                }
            }
            fk.mappings().to_vec()
        } else if let Some(pairs) = pk_name_pairs(parent, child) {
            pairs
        } else if let Some(pairs) = unique_constraint_pairs(parent, child) {
            pairs
        } else {
            return Err(unresolved(
                "no identically named primary key or covered unique constraint".to_string(),
            ));
        };

        for pair in &pairs {
            let (Some(parent_column), Some(child_column)) =
                (parent.column(&pair.parent), child.column(&pair.child))
            else {
                continue;
            };
            if parent_column.is_fake() || child_column.is_fake() {
                return Err(unresolved(format!(
                    "column pair '{}' -> '{}' uses a fake column",
                    pair.parent, pair.child
                )));
            }
            if parent_column.sql_type() != child_column.sql_type() {
                return Err(unresolved(format!(
                    "column pair '{}' -> '{}' mixes {} and {}",
                    pair.parent,
                    pair.child,
                    parent_column.sql_type(),
                    child_column.sql_type()
                )));
            }
        }

        Ok(ForeignKeyJoin {
            name: fk.name().to_string(),
            parent: parent.mneo().to_string(),
            parent_table: parent.table_name().to_string(),
            child: child.mneo().to_string(),
            child_table: child.table_name().to_string(),
            pairs,
        })
    }
}

fn pk_name_pairs(parent: &EntityDefinition, child: &EntityDefinition) -> Option<Vec<ColumnMapping>> {
    let pk: Vec<&Column> = parent.primary_key().collect();
    if pk.is_empty() {
        return None;
    }
    pk.iter()
        .map(|column| {
            child
                .column(column.name())
                .map(|_| ColumnMapping::new(column.name(), column.name()))
        })
        .collect()
}

fn unique_constraint_pairs(
    parent: &EntityDefinition,
    child: &EntityDefinition,
) -> Option<Vec<ColumnMapping>> {
    let key_columns = |name: &str| {
        child
            .column(name)
            .is_some_and(|column| column.is_pk() || column.has(crate::flags::ColumnFlags::FK))
    };
    parent
        .unique_constraints()
        .iter()
        .find(|constraint| {
            !constraint.columns.is_empty()
                && constraint.columns.iter().all(|name| key_columns(name))
        })
        .map(|constraint| {
            constraint
                .columns
                .iter()
                .map(|name| ColumnMapping::new(name.as_str(), name.as_str()))
                .collect()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::EntityUniqueConstraint;
    use crate::types::SqlType;

    fn empresa() -> EntityDefinition {
        EntityDefinition::builder("emp", "empresas")
            .column(Column::pk("c_empresa_id", SqlType::Char).size(10))
            .column(Column::varchar("vc_code", 20))
            .column(Column::varchar("vc_name", 80))
            .unique(EntityUniqueConstraint::new("uq_emp_code", ["vc_code"]))
            .build()
            .unwrap()
    }

    fn sucursal(fk: crate::relationship::ForeignKeyBuilder) -> EntityDefinition {
        EntityDefinition::builder("suc", "sucursales")
            .column(Column::pk("c_empresa_id", SqlType::Char).size(10))
            .column(Column::pk("c_sucursal_id", SqlType::Char).size(10))
            .column(Column::fk("vc_code", SqlType::VarChar).size(20))
            .column(Column::fk("c_owner_id", SqlType::Char).size(10).nullable())
            .foreign_key(fk)
            .build()
            .unwrap()
    }

    fn catalog(child: EntityDefinition) -> EntityCatalog {
        let mut catalog = EntityCatalog::new(DomainRegistry::default());
        catalog.insert(empresa()).unwrap();
        catalog.insert(child).unwrap();
        catalog
    }

    #[test]
    fn explicit_mappings_win() {
        let child = sucursal(EntityForeignKey::builder("fk_suc_owner", "emp").map("c_empresa_id", "c_owner_id"));
        let catalog = catalog(child);
        let fk = &catalog.get("suc").unwrap().foreign_keys()[0];
        let join = catalog.resolve_join(fk).unwrap();
        assert_eq!(join.pairs, vec![ColumnMapping::new("c_empresa_id", "c_owner_id")]);
        assert_eq!(join.parent_table, "empresas");
    }

    #[test]
    fn falls_back_to_primary_key_names() {
        let catalog = catalog(sucursal(EntityForeignKey::builder("fk_suc_emp", "emp")));
        let fk = &catalog.get("suc").unwrap().foreign_keys()[0];
        let join = catalog.resolve_join(fk).unwrap();
        assert_eq!(join.pairs, vec![ColumnMapping::new("c_empresa_id", "c_empresa_id")]);
    }

    #[test]
    fn falls_back_to_unique_constraint() {
        let child = EntityDefinition::builder("cta", "cuentas")
            .column(Column::pk("c_cuenta_id", SqlType::Char).size(10))
            .column(Column::fk("vc_code", SqlType::VarChar).size(20))
            .foreign_key(EntityForeignKey::builder("fk_cta_emp", "emp"))
            .build()
            .unwrap();
        let catalog = catalog(child);
        let fk = &catalog.get("cta").unwrap().foreign_keys()[0];
        let join = catalog.resolve_join(fk).unwrap();
        assert_eq!(join.pairs, vec![ColumnMapping::new("vc_code", "vc_code")]);
    }

    #[test]
    fn unresolvable_join_asks_for_mappings() {
        let child = EntityDefinition::builder("doc", "documentos")
            .column(Column::pk("c_doc_id", SqlType::Char).size(10))
            .foreign_key(EntityForeignKey::builder("fk_doc_emp", "emp"))
            .build()
            .unwrap();
        let catalog = catalog(child);
        let fk = &catalog.get("doc").unwrap().foreign_keys()[0];
        let err = catalog.resolve_join(fk).unwrap_err();
        assert!(err.to_string().contains("you may need to map columns"));
    }

    #[test]
    fn duplicate_mnemonics_are_rejected() {
        let mut catalog = EntityCatalog::new(DomainRegistry::default());
        catalog.insert(empresa()).unwrap();
        assert!(catalog.insert(empresa()).is_err());
    }
}
