//! `{mneo}_update`: upsert by primary key with optimistic concurrency on
//! `dt_lu`, autonum allocation and satellite maintenance. Split entities
//! get a transaction-composable `{mneo}_iupdate` plus an outer wrapper.

use relforge_core::{
    AUDIT_COLUMNS, Column, ColumnFlags, LAST_UPDATE_COLUMN, ProcedureDefinition, ProcedureKind,
    WEB_USER_COLUMN,
};

use super::columns::{is_blankable, parameter, parameter_block, quote, unicode_literal};
use super::satellite::{
    SatelliteColumn, array_staging, insert_fragment, satellite_columns, update_fragment,
};
use super::{EntityContext, StatusTarget, key_filter, required_checks};
use crate::errors::GenerationError;
use crate::model::{GeneratedScript, ScriptKind};
use crate::skeletons;
use crate::template::{TemplateValues, indent, render};

/// Width of zero-padded character autonum values.
const AUTONUM_WIDTH: u32 = 10;

struct UpdatePlan<'a> {
    procedure: &'a ProcedureDefinition,
    pk: Vec<&'a Column>,
    lu: &'a Column,
    web_user: &'a Column,
    autonum: Option<&'a Column>,
    satellites: Vec<SatelliteColumn<'a>>,
}

impl<'a> UpdatePlan<'a> {
    fn new(ctx: &EntityContext<'a>) -> Result<Self, GenerationError> {
        let procedure = ctx
            .entity
            .standard_procedure(ProcedureKind::Update)
            .ok_or_else(|| GenerationError::MissingPrimaryKey {
                entity: ctx.mneo().to_string(),
                procedure: ctx.entity.object_name(ProcedureKind::Update),
            })?;
        let pk = ctx.primary_key_parameters(procedure)?;
        let required_parm = |name: &str| {
            procedure
                .parm(name)
                .ok_or_else(|| GenerationError::MissingParameter {
                    procedure: procedure.name().to_string(),
                    parameter: name.to_string(),
                })
        };
        let lu = required_parm(LAST_UPDATE_COLUMN)?;
        let web_user = required_parm(WEB_USER_COLUMN)?;
        let autonum = ctx
            .entity
            .autonum_column()
            .and_then(|column| procedure.parm(column.name()));
        let satellites = satellite_columns(
            procedure
                .parms()
                .iter()
                .filter(|parm| ctx.entity.column(parm.name()).is_some()),
        );

        Ok(Self {
            procedure,
            pk,
            lu,
            web_user,
            autonum,
            satellites,
        })
    }

    /// Parameters backed by a column of the entity.
    fn entity_parms<'b>(&'b self, ctx: &'b EntityContext<'a>) -> impl Iterator<Item = &'a Column> + 'b {
        self.procedure
            .parms()
            .iter()
            .filter(move |parm| ctx.entity.column(parm.name()).is_some())
    }

    fn normalize(&self) -> String {
        self.procedure
            .parms()
            .iter()
            .filter(|parm| parm.is_nullable() && is_blankable(parm))
            .map(|parm| {
                let param = parameter(parm);
                format!("SET {param} = NULLIF({param}, '');")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn required(&self, ctx: &EntityContext<'a>, target: StatusTarget) -> String {
        let required: Vec<&Column> = self
            .entity_parms(ctx)
            .filter(|parm| !parm.is_nullable() && !parm.is_autonum())
            .collect();
        required_checks(&required, target)
    }

    fn autonum_declare(&self) -> String {
        match self.autonum {
            Some(_) => "DECLARE @next bigint;\nDECLARE @autonum bit = 0;".to_string(),
            None => String::new(),
        }
    }

    fn autonum_allocate(&self, ctx: &EntityContext<'a>) -> String {
        let Some(column) = self.autonum else {
            return String::new();
        };
        let param = parameter(column);
        let assign = if column.sql_type().is_character() {
            let width = match column.size() {
                0 => AUTONUM_WIDTH,
                size => size.min(AUTONUM_WIDTH),
            };
            format!(
                "SET {param} = RIGHT(REPLICATE('0', {width}) + CONVERT(varchar(20), @next), {width});"
            )
        } else {
            format!("SET {param} = @next;")
        };
        format!(
            "IF {param} IS NULL\nBEGIN\n    EXEC {} @mneo = {}, @value = @next OUTPUT;\n    {assign}\n    SET @autonum = 1;\nEND",
            ctx.object(&ctx.options.numbering_procedure),
            unicode_literal(ctx.mneo()),
        )
    }

    fn insert_status(&self, target: StatusTarget) -> String {
        match self.autonum {
            Some(column) => format!(
                "IF @autonum = 1\n{}\nELSE\n{}",
                target.emit_block(
                    15,
                    &format!("CONVERT(nvarchar(200), {})", parameter(column))
                ),
                target.emit_block(0, "N'OK'"),
            ),
            None => target.emit(0, "N'OK'"),
        }
    }

    fn audit_value(&self, name: &str) -> String {
        match name {
            "dt_insert" | LAST_UPDATE_COLUMN => "@now".to_string(),
            "vc_insert_web_user" | "vc_lu_web_user" => parameter(self.web_user),
            _ => "SUSER_SNAME()".to_string(),
        }
    }

    /// Audit columns the table stores but the entity does not declare.
    fn audit_columns<'c>(&self, ctx: &EntityContext<'c>) -> Vec<&'static str> {
        AUDIT_COLUMNS
            .iter()
            .map(|(name, _, _)| *name)
            .filter(|name| ctx.entity.column(name).is_none())
            .collect()
    }

    fn insert_columns_and_values(&self, ctx: &EntityContext<'a>) -> (String, String) {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for parm in self
            .entity_parms(ctx)
            .filter(|parm| !parm.is_fake() && parm.name() != self.lu.name())
        {
            columns.push(quote(parm.name()));
            values.push(parameter(parm));
        }
        columns.push(quote(self.lu.name()));
        values.push(self.audit_value(LAST_UPDATE_COLUMN));
        for name in self.audit_columns(ctx) {
            columns.push(quote(name));
            values.push(self.audit_value(name));
        }
        (columns.join(", "), values.join(", "))
    }

    /// UPDATE of the stored, non-key, update-flagged columns; empty when
    /// there are none.
    fn update_statement(&self, ctx: &EntityContext<'a>) -> String {
        let mut assignments: Vec<String> = self
            .entity_parms(ctx)
            .filter(|parm| {
                !parm.is_fake()
                    && !parm.is_pk()
                    && parm.has(ColumnFlags::UPDATE)
                    && parm.name() != self.lu.name()
            })
            .map(|parm| format!("{} = {}", quote(parm.name()), parameter(parm)))
            .collect();
        if assignments.is_empty() {
            return String::new();
        }
        assignments.push(format!("{} = @now", quote(self.lu.name())));
        for name in self
            .audit_columns(ctx)
            .into_iter()
            .filter(|name| name.starts_with("vc_lu_"))
        {
            assignments.push(format!("{} = {}", quote(name), self.audit_value(name)));
        }
        format!(
            "UPDATE {}\nSET {}\nWHERE {};",
            ctx.table(),
            assignments.join(",\n    "),
            key_filter(&self.pk, None)
        )
    }

    fn staging(&self, ctx: &EntityContext<'a>) -> String {
        self.satellites
            .iter()
            .filter(|sat| {
                sat.is_array()
                    && sat
                        .column
                        .flags()
                        .intersects(ColumnFlags::INSERT | ColumnFlags::UPDATE)
            })
            .map(|sat| array_staging(ctx, sat))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn satellite_inserts(&self, ctx: &EntityContext<'a>) -> String {
        self.satellites
            .iter()
            .filter(|sat| sat.column.has(ColumnFlags::INSERT))
            .map(|sat| insert_fragment(ctx, sat))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn satellite_updates(&self, ctx: &EntityContext<'a>) -> String {
        self.satellites
            .iter()
            .filter(|sat| sat.column.has(ColumnFlags::UPDATE))
            .map(|sat| update_fragment(ctx, sat))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render(
        &self,
        ctx: &EntityContext<'a>,
        name: &str,
        target: StatusTarget,
    ) -> Result<String, GenerationError> {
        let (skeleton, inside) = match target {
            StatusTarget::ResultRow => (skeletons::UPDATE, 2),
            StatusTarget::Output => (skeletons::INNER_UPDATE, 1),
        };
        let branch = inside + 1;
        let (insert_columns, insert_values) = self.insert_columns_and_values(ctx);

        let values = TemplateValues::new()
            .with("PROCEDURE", ctx.object(name))
            .with("NAME", name)
            .with(
                "PARAMETERS",
                parameter_block(self.procedure.parms(), target.output_parameters()),
            )
            .with("NORMALIZE", indent(&self.normalize(), 1))
            .with("REQUIRED_CHECKS", indent(&self.required(ctx, target), 1))
            .with("AUTONUM_DECLARE", indent(&self.autonum_declare(), 1))
            .with("ARRAY_STAGING", indent(&self.staging(ctx), inside))
            .with("TABLE", ctx.table())
            .with("PK_WHERE", key_filter(&self.pk, None))
            .with("AUTONUM_ALLOCATE", indent(&self.autonum_allocate(ctx), branch))
            .with("INSERT_COLUMNS", insert_columns)
            .with("INSERT_VALUES", insert_values)
            .with("SATELLITE_INSERTS", indent(&self.satellite_inserts(ctx), branch))
            .with("INSERT_STATUS", indent(&self.insert_status(target), branch))
            .with("LU", self.lu.parameter_name())
            .with("UPDATE_STATEMENT", indent(&self.update_statement(ctx), inside))
            .with("SATELLITE_UPDATES", indent(&self.satellite_updates(ctx), inside));
        render(skeleton, &values)
    }
}

/// Outer procedure calling an inner one inside its own transaction.
pub(crate) fn render_wrapper(
    ctx: &EntityContext<'_>,
    procedure: &ProcedureDefinition,
    inner: &str,
) -> Result<String, GenerationError> {
    let arguments: Vec<String> = procedure
        .parms()
        .iter()
        .map(|parm| {
            let param = parameter(parm);
            format!("{param} = {param},")
        })
        .chain([
            "@status = @status OUTPUT,".to_string(),
            "@message = @message OUTPUT;".to_string(),
        ])
        .collect();
    let values = TemplateValues::new()
        .with("PROCEDURE", ctx.object(procedure.name()))
        .with("PARAMETERS", parameter_block(procedure.parms(), &[]))
        .with("INNER", ctx.object(inner))
        .with("ARGUMENTS", indent(&arguments.join("\n"), 3));
    render(skeletons::WRAPPER, &values)
}

/// Update scripts of an entity: `_update`, or `_iupdate` then `_update`.
pub fn generate_update(ctx: &EntityContext<'_>) -> Result<Vec<GeneratedScript>, GenerationError> {
    let plan = UpdatePlan::new(ctx)?;
    let name = plan.procedure.name();

    if !ctx.entity.split_update() {
        let sql = plan.render(ctx, name, StatusTarget::ResultRow)?;
        return Ok(vec![GeneratedScript::new(
            Some(ctx.mneo()),
            name,
            ScriptKind::Update,
            sql,
        )]);
    }

    let inner = ctx.entity.object_name(ProcedureKind::InnerUpdate);
    let inner_sql = plan.render(ctx, &inner, StatusTarget::Output)?;
    let outer_sql = render_wrapper(ctx, plan.procedure, &inner)?;
    Ok(vec![
        GeneratedScript::new(Some(ctx.mneo()), inner, ScriptKind::InnerUpdate, inner_sql),
        GeneratedScript::new(Some(ctx.mneo()), name, ScriptKind::Update, outer_sql),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GenerateOptions;
    use relforge_core::{DomainRegistry, EntityBuilder, EntityCatalog, EntityDefinition, SqlType};

    fn persona() -> EntityBuilder {
        EntityDefinition::builder("pers", "personas")
            .column(Column::pk("c_persona_id", SqlType::Char).size(20).autonum())
            .column(Column::varchar("vc_name", 80))
            .column(Column::varchar("vc_nick", 40).nullable())
    }

    fn generate(builder: EntityBuilder) -> Vec<GeneratedScript> {
        let catalog =
            EntityCatalog::from_entities(DomainRegistry::default(), [builder.build().unwrap()])
                .unwrap();
        let options = GenerateOptions::default();
        let ctx = EntityContext::new(catalog.get("pers").unwrap(), &catalog, &options);
        generate_update(&ctx).unwrap()
    }

    #[test]
    fn declares_parameters_in_metadata_order() {
        let sql = &generate(persona())[0].sql;
        assert!(sql.starts_with(
            "CREATE OR ALTER PROCEDURE [dbo].[pers_update]\n    @persona_id char(20) = NULL,\n    @name varchar(80) = NULL,\n    @nick varchar(40) = NULL,\n    @lu datetime = NULL,\n    @web_user varchar(50) = NULL\nAS\n"
        ));
    }

    #[test]
    fn validates_and_normalizes_before_the_transaction() {
        let sql = &generate(persona())[0].sql;
        assert!(sql.contains("    SET @nick = NULLIF(@nick, '');"));
        assert!(sql.contains("    IF @name IS NULL OR @name = ''\n    BEGIN\n        SELECT 11 AS status, N'vc_name is required' AS message;\n        RETURN;\n    END"));
        assert!(!sql.contains("IF @persona_id IS NULL OR"));
        assert!(sql.find("N'vc_name is required'").unwrap() < sql.find("BEGIN TRAN;").unwrap());
    }

    #[test]
    fn locks_the_row_and_gates_on_last_update() {
        let sql = &generate(persona())[0].sql;
        assert!(sql.contains("        SELECT @cu = [dt_lu]\n        FROM [dbo].[personas] WITH (ROWLOCK, HOLDLOCK, UPDLOCK)\n        WHERE [c_persona_id] = @persona_id;"));
        assert!(sql.contains("        IF @lu IS NULL OR @lu <> @cu\n        BEGIN\n            ROLLBACK TRAN;\n            SELECT 4 AS status, N'Record changed' AS message;"));
        assert!(sql.contains("        IF @@TRANCOUNT > 0 ROLLBACK TRAN;\n        THROW;"));
    }

    #[test]
    fn allocates_autonum_only_on_insert() {
        let sql = &generate(persona())[0].sql;
        let insert_branch = sql.find("IF @cu IS NULL").unwrap();
        let allocation = sql
            .find("EXEC [dbo].[sp_next_number] @mneo = N'pers', @value = @next OUTPUT;")
            .unwrap();
        assert!(insert_branch < allocation);
        assert!(sql.contains("SET @persona_id = RIGHT(REPLICATE('0', 10) + CONVERT(varchar(20), @next), 10);"));
        assert!(sql.contains("SELECT 15 AS status, CONVERT(nvarchar(200), @persona_id) AS message;"));
    }

    #[test]
    fn insert_and_update_write_audit_columns() {
        let sql = &generate(persona())[0].sql;
        assert!(sql.contains("INSERT INTO [dbo].[personas] ([c_persona_id], [vc_name], [vc_nick], [dt_lu], [dt_insert], [vc_insert_web_user], [vc_insert_login], [vc_lu_web_user], [vc_lu_login])"));
        assert!(sql.contains("VALUES (@persona_id, @name, @nick, @now, @now, @web_user, SUSER_SNAME(), @web_user, SUSER_SNAME());"));
        assert!(sql.contains("        UPDATE [dbo].[personas]\n        SET [vc_name] = @name,\n            [vc_nick] = @nick,\n            [dt_lu] = @now,\n            [vc_lu_web_user] = @web_user,\n            [vc_lu_login] = SUSER_SNAME()\n        WHERE [c_persona_id] = @persona_id;"));
    }

    #[test]
    fn no_updatable_columns_skip_the_update_clause() {
        let builder = EntityDefinition::builder("pers", "personas")
            .column(Column::pk("c_persona_id", SqlType::Char).size(20))
            .column(Column::category("vc_kind", "CAT1").nullable());
        let sql = &generate(builder)[0].sql;
        assert!(!sql.contains("UPDATE [dbo].[personas]"));
        assert!(sql.contains("IF @kind IS NULL\n            DELETE FROM [dbo].[personas_cat]"));
        assert!(sql.contains("SELECT 0 AS status, N'OK' AS message;"));
    }

    #[test]
    fn split_update_moves_the_transaction_to_the_wrapper() {
        let scripts = generate(persona().split_update());
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[0].object_name, "pers_iupdate");
        assert_eq!(scripts[0].kind, ScriptKind::InnerUpdate);

        let inner = &scripts[0].sql;
        assert!(inner.contains("    @web_user varchar(50) = NULL,\n    @status int OUTPUT,\n    @message nvarchar(200) OUTPUT\nAS"));
        assert!(inner.contains("THROW 50001, N'pers_iupdate requires an open transaction', 1;"));
        assert!(!inner.contains("BEGIN TRAN"));
        assert!(!inner.contains("COMMIT"));
        assert!(inner.contains("        IF @autonum = 1\n        BEGIN\n            SET @status = 15;\n            SET @message = CONVERT(nvarchar(200), @persona_id);\n        END"));

        let outer = &scripts[1].sql;
        assert!(outer.contains("        EXEC [dbo].[pers_iupdate]\n            @persona_id = @persona_id,"));
        assert!(outer.contains("            @message = @message OUTPUT;\n        IF @status IN (0, 15)\n            COMMIT TRAN;\n        ELSE\n            ROLLBACK TRAN;"));
    }

    #[test]
    fn generation_is_byte_identical() {
        assert_eq!(generate(persona()), generate(persona()));
    }
}
