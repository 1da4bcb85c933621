use std::collections::BTreeMap;

use crate::catalog::EntityCatalog;
use crate::domain::SatelliteKind;
use crate::error::{Error, Result};

/// Validate internal consistency of an entity catalog.
///
/// This checks:
/// - table names (including satellite tables) are unique
/// - every foreign key points at a registered entity and resolves to a join
/// - lookups name a procedure or view the parent entity actually has
pub fn validate_catalog(catalog: &EntityCatalog) -> Result<()> {
    let mut tables: BTreeMap<String, String> = BTreeMap::new();
    let mut claim = |table: String, owner: &str| -> Result<()> {
        match tables.insert(table.to_ascii_lowercase(), owner.to_string()) {
            Some(previous) => Err(Error::InvalidDefinition(format!(
                "table '{table}' of '{owner}' is already used by '{previous}'"
            ))),
            None => Ok(()),
        }
    };

    for entity in catalog.entities().filter(|entity| !entity.is_fake()) {
        claim(entity.table_name().to_string(), entity.mneo())?;
        for (kind, ids) in [
            (SatelliteKind::Category, entity.related_categories()),
            (SatelliteKind::Status, entity.related_status()),
        ] {
            if !ids.is_empty() {
                let domain = catalog.domains().domain(kind);
                claim(domain.satellite_table(entity.table_name()), entity.mneo())?;
            }
        }
    }

    for entity in catalog.entities() {
        for fk in entity.foreign_keys() {
            let join = catalog.resolve_join(fk)?;
            let parent = catalog.get(&join.parent).ok_or_else(|| {
                Error::InvalidDefinition(format!("entity '{}' vanished from catalog", join.parent))
            })?;

            for lookup in fk.lookups().values() {
                if parent.procedure(&lookup.procedure).is_none() {
                    return Err(Error::InvalidDefinition(format!(
                        "lookup '{}' of '{}' names unknown procedure '{}' in '{}'",
                        lookup.name,
                        fk.name(),
                        lookup.procedure,
                        parent.mneo()
                    )));
                }
                if parent.view(&lookup.view).is_none() {
                    return Err(Error::InvalidDefinition(format!(
                        "lookup '{}' of '{}' names unknown view '{}' in '{}'",
                        lookup.name,
                        fk.name(),
                        lookup.view,
                        parent.mneo()
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::domain::DomainRegistry;
    use crate::entity::EntityDefinition;
    use crate::relationship::{EntityForeignKey, EntityLookup};
    use crate::types::SqlType;

    fn persona() -> EntityDefinition {
        EntityDefinition::builder("pers", "personas")
            .column(Column::pk("c_persona_id", SqlType::Char).size(20))
            .column(Column::varchar("vc_name", 80))
            .build()
            .unwrap()
    }

    fn contacto(lookup: EntityLookup) -> EntityDefinition {
        EntityDefinition::builder("cont", "contactos")
            .column(Column::pk("c_contacto_id", SqlType::Char).size(20))
            .column(Column::fk("c_persona_id", SqlType::Char).size(20))
            .foreign_key(EntityForeignKey::builder("fk_cont_pers", "pers").lookup(lookup))
            .build()
            .unwrap()
    }

    #[test]
    fn accepts_resolvable_catalog() {
        let lookup = EntityLookup::new("persona", "pers_brwStandard", "pers_lookup");
        let catalog =
            EntityCatalog::from_entities(DomainRegistry::default(), [persona(), contacto(lookup)]);
        assert!(catalog.is_ok());
    }

    #[test]
    fn rejects_unknown_parent() {
        let lookup = EntityLookup::new("persona", "pers_brwStandard", "pers_lookup");
        let err = EntityCatalog::from_entities(DomainRegistry::default(), [contacto(lookup)])
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedForeignKey { .. }));
    }

    #[test]
    fn rejects_lookup_to_missing_procedure() {
        let lookup = EntityLookup::new("persona", "pers_brwStandard", "pers_find");
        let err =
            EntityCatalog::from_entities(DomainRegistry::default(), [persona(), contacto(lookup)])
                .unwrap_err();
        assert!(err.to_string().contains("pers_find"));
    }

    #[test]
    fn rejects_satellite_table_collision() {
        let clash = EntityDefinition::builder("pcat", "personas_cat")
            .column(Column::pk("c_id", SqlType::Char).size(10))
            .build()
            .unwrap();
        let persona = EntityDefinition::builder("pers", "personas")
            .column(Column::pk("c_persona_id", SqlType::Char).size(20))
            .column(Column::category("vc_kind", "CAT1"))
            .build()
            .unwrap();
        let err = EntityCatalog::from_entities(DomainRegistry::default(), [clash, persona])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDefinition(_)));
    }
}
