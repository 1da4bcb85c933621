//! `{mneo}_get`: one row by primary key.

use relforge_core::{ColumnFlags, ProcedureKind};

use super::columns::{parameter_block, quote};
use super::satellite::{SatelliteColumn, array_pre_query, single_join};
use super::{EntityContext, key_filter};
use crate::alias::{AliasAllocator, MAIN_ALIAS};
use crate::errors::GenerationError;
use crate::model::{GeneratedScript, ScriptKind};
use crate::skeletons;
use crate::template::{TemplateValues, indent, render};

/// Projection and joins shared by `_get`.
struct Projection {
    select: Vec<String>,
    joins: Vec<String>,
    pre_queries: Vec<String>,
}

fn projection(ctx: &EntityContext<'_>) -> Projection {
    let mut aliases = AliasAllocator::new();
    let mut projection = Projection {
        select: Vec::new(),
        joins: Vec::new(),
        pre_queries: Vec::new(),
    };

    for column in ctx.entity.columns_with(ColumnFlags::GET) {
        match SatelliteColumn::of(column) {
            Some(sat) if sat.is_array() => {
                projection.pre_queries.push(array_pre_query(ctx, &sat));
                projection
                    .select
                    .push(format!("{} AS {}", sat.json_variable(), quote(column.name())));
            }
            Some(sat) => {
                let alias = aliases.allocate();
                let (join, select) = single_join(ctx, &sat, &alias);
                projection.joins.push(join);
                projection.select.push(select);
            }
            // computed fakes have no storage to read from
            None if column.is_fake() => projection
                .select
                .push(format!("CAST(NULL AS nvarchar(1)) AS {}", quote(column.name()))),
            None => projection
                .select
                .push(format!("{MAIN_ALIAS}.{}", quote(column.name()))),
        }
    }

    projection
}

pub fn generate_get(ctx: &EntityContext<'_>) -> Result<GeneratedScript, GenerationError> {
    let procedure = ctx
        .entity
        .standard_procedure(ProcedureKind::Get)
        .ok_or_else(|| GenerationError::MissingPrimaryKey {
            entity: ctx.mneo().to_string(),
            procedure: ctx.entity.object_name(ProcedureKind::Get),
        })?;
    let pk = ctx.primary_key_parameters(procedure)?;

    let projection = projection(ctx);
    let expected = ctx.entity.columns_with(ColumnFlags::GET).count();
    if projection.select.len() != expected {
        return Err(GenerationError::ColumnCountMismatch {
            procedure: procedure.name().to_string(),
            expected,
            actual: projection.select.len(),
        });
    }

    let values = TemplateValues::new()
        .with("PROCEDURE", ctx.object(procedure.name()))
        .with("PARAMETERS", parameter_block(procedure.parms(), &[]))
        .with("ARRAY_QUERIES", indent(&projection.pre_queries.join("\n"), 1))
        .with("SELECT_LIST", indent(&projection.select.join(",\n"), 2))
        .with("TABLE", ctx.table())
        .with("JOINS", indent(&projection.joins.join("\n"), 1))
        .with("PK_FILTER", key_filter(&pk, Some(MAIN_ALIAS)));

    Ok(GeneratedScript::new(
        Some(ctx.mneo()),
        procedure.name(),
        ScriptKind::Get,
        render(skeletons::GET, &values)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GenerateOptions;
    use relforge_core::{Column, DomainRegistry, EntityCatalog, EntityDefinition, SqlType};

    fn catalog() -> EntityCatalog {
        let entity = EntityDefinition::builder("pers", "personas")
            .column(Column::pk("c_persona_id", SqlType::Char).size(20))
            .column(Column::varchar("vc_name", 80))
            .column(Column::category("vc_kind", "CAT1").nullable())
            .column(Column::category_array("nvc_tags", "TAGS").nullable())
            .column(Column::status("vc_state", "ST1"))
            .column(Column::category("vc_size", "CAT2"))
            .build()
            .unwrap();
        EntityCatalog::from_entities(DomainRegistry::default(), [entity]).unwrap()
    }

    #[test]
    fn joins_each_single_valued_fake_with_next_alias() {
        let catalog = catalog();
        let options = GenerateOptions::default();
        let ctx = EntityContext::new(catalog.get("pers").unwrap(), &catalog, &options);
        let sql = generate_get(&ctx).unwrap().sql;

        assert!(sql.contains("LEFT JOIN [dbo].[personas_cat] b ON b.[c_persona_id] = a.[c_persona_id] AND b.[c_category_id] = 'CAT1'"));
        assert!(sql.contains("INNER JOIN [dbo].[personas_status] c ON c.[c_persona_id] = a.[c_persona_id] AND c.[c_status_id] = 'ST1'"));
        assert!(sql.contains("INNER JOIN [dbo].[personas_cat] d ON"));
        assert!(sql.contains("        b.[c_value_id] AS [vc_kind],"));
        assert!(sql.contains("        @tags_json AS [nvc_tags],"));
        assert!(sql.contains("    WHERE a.[c_persona_id] = @persona_id;"));
    }

    #[test]
    fn select_list_matches_get_flagged_columns() {
        let catalog = catalog();
        let options = GenerateOptions::default();
        let entity = catalog.get("pers").unwrap();
        let ctx = EntityContext::new(entity, &catalog, &options);
        let sql = generate_get(&ctx).unwrap().sql;
        let select = sql
            .split("    SELECT\n")
            .nth(1)
            .and_then(|rest| rest.split("    FROM ").next())
            .unwrap();
        assert_eq!(
            select.lines().count(),
            entity.columns_with(ColumnFlags::GET).count()
        );
    }

    #[test]
    fn arrays_are_aggregated_before_the_select() {
        let catalog = catalog();
        let options = GenerateOptions::default();
        let ctx = EntityContext::new(catalog.get("pers").unwrap(), &catalog, &options);
        let sql = generate_get(&ctx).unwrap().sql;
        let declare = sql.find("DECLARE @tags_json nvarchar(max);").unwrap();
        let select = sql.find("    SELECT\n").unwrap();
        assert!(declare < select);
        assert!(sql.contains("STRING_AGG("));
        assert!(sql.contains("N'[]')"));
    }

    #[test]
    fn generation_is_deterministic() {
        let catalog = catalog();
        let options = GenerateOptions::default();
        let ctx = EntityContext::new(catalog.get("pers").unwrap(), &catalog, &options);
        assert_eq!(generate_get(&ctx).unwrap(), generate_get(&ctx).unwrap());
    }
}
