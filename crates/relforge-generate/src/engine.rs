use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::{info, warn};

use relforge_core::{EntityCatalog, EntityDefinition, build_fk_graph_report, creation_order};

use crate::errors::GenerationError;
use crate::generators::drop::generate_drop;
use crate::generators::get::generate_get;
use crate::generators::join::deferred_foreign_keys;
use crate::generators::lookup::generate_lookup;
use crate::generators::security::grant_script;
use crate::generators::support::generate_support;
use crate::generators::table::generate_table;
use crate::generators::update::generate_update;
use crate::generators::view::generate_view;
use crate::generators::EntityContext;
use crate::model::{EntityReport, GenerateOptions, GeneratedScript, GenerationReport};

/// Scripts of a whole catalog plus the run report.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub scripts: Vec<GeneratedScript>,
    pub report: GenerationReport,
}

/// Entry point turning an entity catalog into SQL scripts.
///
/// Generation is pure: the same catalog and options always produce the same
/// scripts in the same order.
#[derive(Debug, Clone, Default)]
pub struct SqlGenerator {
    options: GenerateOptions,
}

impl SqlGenerator {
    pub fn new(options: GenerateOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Scripts of one entity: table, get, update, drop, lookups, views and
    /// grants. Fake entities produce nothing.
    pub fn generate_entity(
        &self,
        catalog: &EntityCatalog,
        entity: &EntityDefinition,
    ) -> Result<Vec<GeneratedScript>, GenerationError> {
        self.entity_scripts(catalog, entity, &BTreeSet::new())
    }

    fn entity_scripts(
        &self,
        catalog: &EntityCatalog,
        entity: &EntityDefinition,
        deferred: &BTreeSet<String>,
    ) -> Result<Vec<GeneratedScript>, GenerationError> {
        if entity.is_fake() {
            return Ok(Vec::new());
        }
        let ctx = EntityContext::new(entity, catalog, &self.options);

        let mut scripts = vec![generate_table(&ctx, deferred)?, generate_get(&ctx)?];
        scripts.extend(generate_update(&ctx)?);
        scripts.extend(generate_drop(&ctx)?);

        for procedure in entity.procedures().iter().filter(|p| p.is_lookup()) {
            match generate_lookup(&ctx, procedure) {
                Ok(script) => scripts.push(script),
                Err(GenerationError::NoDescriptionColumn { .. }) => {
                    warn!(
                        event = "lookup_skipped",
                        mneo = %entity.mneo(),
                        object = %procedure.name(),
                        "no description column"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        for view in entity.views() {
            scripts.push(generate_view(&ctx, view)?);
        }

        if let Some(grants) = grant_script(&ctx, &scripts) {
            scripts.push(grants);
        }
        Ok(scripts)
    }

    /// Support objects first, then every entity parent-before-child.
    ///
    /// Foreign key cycles do not stop generation: the constraints closing a
    /// cycle are added by `ALTER TABLE` scripts after every entity.
    pub fn generate(&self, catalog: &EntityCatalog) -> Result<GenerationOutput, GenerationError> {
        let start = Instant::now();
        let graph = build_fk_graph_report(catalog);
        let order = match graph.topo_order {
            Some(order) => order,
            None => {
                warn!(
                    event = "fk_cycle",
                    entities = %graph.cycle.unwrap_or_default().join(", "),
                    "foreign key cycle, closing constraints are deferred"
                );
                creation_order(catalog)
            }
        };
        let position: BTreeMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(index, mneo)| (mneo.as_str(), index))
            .collect();

        info!(
            event = "generation_started",
            entities = catalog.len(),
            schema = %self.options.schema,
            "generation started"
        );

        let mut scripts = Vec::new();
        if self.options.emit_support {
            scripts.extend(generate_support(&self.options, catalog.domains())?);
        }

        let mut report = GenerationReport::default();
        let mut closing = Vec::new();
        for (index, mneo) in order.iter().enumerate() {
            let Some(entity) = catalog.get(mneo) else {
                continue;
            };
            let entity_start = Instant::now();
            // parents created later in the order
            let deferred: BTreeSet<String> = entity
                .foreign_keys()
                .iter()
                .filter(|fk| !fk.is_fake() && fk.parent() != entity.mneo())
                .filter(|fk| position.get(fk.parent()).is_some_and(|parent| *parent > index))
                .map(|fk| fk.name().to_string())
                .collect();
            let generated = self.entity_scripts(catalog, entity, &deferred)?;
            info!(
                event = "entity_generated",
                mneo = %mneo,
                scripts = generated.len(),
                duration_ms = entity_start.elapsed().as_millis() as u64,
                "entity generated"
            );
            report.record_entity(EntityReport {
                mneo: mneo.clone(),
                table: entity.table_name().to_string(),
                scripts: generated.len(),
                skipped: false,
            });
            scripts.extend(generated);
            if !deferred.is_empty() {
                closing.push((entity, deferred));
            }
        }

        for (entity, deferred) in closing {
            let ctx = EntityContext::new(entity, catalog, &self.options);
            if let Some(script) = deferred_foreign_keys(&ctx, &deferred)? {
                info!(
                    event = "foreign_keys_deferred",
                    mneo = %entity.mneo(),
                    foreign_keys = deferred.len(),
                    "foreign keys deferred"
                );
                scripts.push(script);
                report.record_deferred(entity.mneo(), deferred);
            }
        }

        for entity in catalog.entities().filter(|entity| entity.is_fake()) {
            report.record_entity(EntityReport {
                mneo: entity.mneo().to_string(),
                table: entity.table_name().to_string(),
                scripts: 0,
                skipped: true,
            });
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            event = "generation_completed",
            entities = report.entities.len(),
            scripts = scripts.len(),
            duration_ms = report.duration_ms,
            "generation completed"
        );
        Ok(GenerationOutput { scripts, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScriptKind;
    use relforge_core::{Column, DomainRegistry, EntityForeignKey, SqlType};

    fn catalog() -> EntityCatalog {
        let empresa = EntityDefinition::builder("emp", "empresas")
            .column(Column::pk("c_empresa_id", SqlType::Char).size(10))
            .column(Column::varchar("vc_name", 80))
            .build()
            .unwrap();
        let sucursal = EntityDefinition::builder("suc", "sucursales")
            .column(Column::pk("c_empresa_id", SqlType::Char).size(10))
            .column(Column::pk("c_sucursal_id", SqlType::Char).size(10))
            .column(Column::varchar("vc_name", 80))
            .foreign_key(EntityForeignKey::builder("fk_suc_emp", "emp"))
            .split_update()
            .build()
            .unwrap();
        let filtro = EntityDefinition::builder("flt", "filtros")
            .column(Column::varchar("vc_text", 80))
            .fake()
            .build()
            .unwrap();
        // inserted child first; ordering must still put the parent first
        EntityCatalog::from_entities(DomainRegistry::default(), [sucursal, filtro, empresa])
            .unwrap()
    }

    #[test]
    fn orders_support_then_parents_before_children() {
        let output = SqlGenerator::default().generate(&catalog()).unwrap();
        let first_table = |mneo: &str| {
            output
                .scripts
                .iter()
                .position(|s| s.kind == ScriptKind::Table && s.entity.as_deref() == Some(mneo))
                .unwrap()
        };
        assert_eq!(output.scripts[0].kind, ScriptKind::Support);
        assert!(first_table("emp") < first_table("suc"));
    }

    #[test]
    fn entity_scripts_follow_dependency_order() {
        let catalog = catalog();
        let generator = SqlGenerator::default();
        let scripts = generator
            .generate_entity(&catalog, catalog.get("suc").unwrap())
            .unwrap();
        let names: Vec<&str> = scripts.iter().map(|s| s.object_name.as_str()).collect();
        assert_eq!(
            names,
            [
                "sucursales",
                "suc_get",
                "suc_iupdate",
                "suc_update",
                "suc_drop",
                "suc_lookup",
                "suc_brwStandard"
            ]
        );
    }

    #[test]
    fn fake_entities_are_reported_as_skipped() {
        let output = SqlGenerator::default().generate(&catalog()).unwrap();
        let fake = output
            .report
            .entities
            .iter()
            .find(|entity| entity.mneo == "flt")
            .unwrap();
        assert!(fake.skipped);
        assert!(output.scripts.iter().all(|s| s.entity.as_deref() != Some("flt")));
        assert_eq!(output.report.scripts_total + 4, output.scripts.len());
    }

    #[test]
    fn mutual_foreign_keys_defer_the_closing_constraint() {
        let empresa = EntityDefinition::builder("emp", "empresas")
            .column(Column::pk("c_empresa_id", SqlType::Char).size(10))
            .column(Column::fk("c_sucursal_id", SqlType::Char).size(10).nullable())
            .column(Column::varchar("vc_name", 80))
            .foreign_key(
                EntityForeignKey::builder("fk_emp_suc", "suc").map("c_sucursal_id", "c_sucursal_id"),
            )
            .build()
            .unwrap();
        let sucursal = EntityDefinition::builder("suc", "sucursales")
            .column(Column::pk("c_sucursal_id", SqlType::Char).size(10))
            .column(Column::fk("c_empresa_id", SqlType::Char).size(10))
            .column(Column::varchar("vc_name", 80))
            .foreign_key(EntityForeignKey::builder("fk_suc_emp", "emp"))
            .build()
            .unwrap();
        let catalog =
            EntityCatalog::from_entities(DomainRegistry::default(), [sucursal, empresa]).unwrap();

        let output = SqlGenerator::default().generate(&catalog).unwrap();
        let script = |name: &str| {
            output
                .scripts
                .iter()
                .position(|s| s.object_name == name)
                .unwrap()
        };
        assert!(script("empresas") < script("sucursales"));
        assert!(script("emp_get") < script("suc_get"));
        assert_eq!(script("empresas_fk"), output.scripts.len() - 1);

        let empresas = &output.scripts[script("empresas")].sql;
        assert!(!empresas.contains("CONSTRAINT [fk_emp_suc]"));
        assert!(empresas.contains("CREATE INDEX [ix_fk_emp_suc] ON [dbo].[empresas]"));
        assert!(output.scripts[script("sucursales")].sql.contains("CONSTRAINT [fk_suc_emp] FOREIGN KEY"));
        assert!(output.scripts[script("empresas_fk")]
            .sql
            .starts_with("ALTER TABLE [dbo].[empresas] ADD CONSTRAINT [fk_emp_suc] FOREIGN KEY ([c_sucursal_id])"));

        assert_eq!(output.report.deferred_foreign_keys, ["fk_emp_suc"]);
        assert_eq!(output.report.scripts_total + 4, output.scripts.len());
    }

    #[test]
    fn grants_cover_every_procedure() {
        let options = GenerateOptions {
            grant_roles: vec!["app".to_string()],
            emit_support: false,
            ..GenerateOptions::default()
        };
        let catalog = catalog();
        let scripts = SqlGenerator::new(options)
            .generate_entity(&catalog, catalog.get("emp").unwrap())
            .unwrap();
        let grants = scripts.last().unwrap();
        assert_eq!(grants.kind, ScriptKind::Security);
        assert_eq!(grants.sql.lines().count(), 5);
        assert!(grants.sql.contains("GRANT EXECUTE ON [dbo].[emp_brwStandard] TO [app];"));
        assert!(!grants.sql.contains("[dbo].[empresas]"));
    }
}
