//! `{mneo}_drop`: delete by primary key after clearing satellites.

use relforge_core::{Column, ProcedureDefinition, ProcedureKind};

use super::columns::parameter_block;
use super::satellite::delete_fragments;
use super::update::render_wrapper;
use super::{EntityContext, StatusTarget, key_filter, required_checks};
use crate::errors::GenerationError;
use crate::model::{GeneratedScript, ScriptKind};
use crate::skeletons;
use crate::template::{TemplateValues, indent, render};

fn render_drop(
    ctx: &EntityContext<'_>,
    procedure: &ProcedureDefinition,
    pk: &[&Column],
    name: &str,
    target: StatusTarget,
) -> Result<String, GenerationError> {
    let (skeleton, inside) = match target {
        StatusTarget::ResultRow => (skeletons::DROP, 2),
        StatusTarget::Output => (skeletons::INNER_DROP, 1),
    };
    let values = TemplateValues::new()
        .with("PROCEDURE", ctx.object(name))
        .with("NAME", name)
        .with(
            "PARAMETERS",
            parameter_block(procedure.parms(), target.output_parameters()),
        )
        .with("REQUIRED_CHECKS", indent(&required_checks(pk, target), 1))
        .with("SATELLITE_DELETES", indent(&delete_fragments(ctx), inside))
        .with("TABLE", ctx.table())
        .with("PK_WHERE", key_filter(pk, None));
    render(skeleton, &values)
}

/// Drop scripts of an entity: `_drop`, or `_idrop` then `_drop`.
pub fn generate_drop(ctx: &EntityContext<'_>) -> Result<Vec<GeneratedScript>, GenerationError> {
    let procedure = ctx
        .entity
        .standard_procedure(ProcedureKind::Drop)
        .ok_or_else(|| GenerationError::MissingPrimaryKey {
            entity: ctx.mneo().to_string(),
            procedure: ctx.entity.object_name(ProcedureKind::Drop),
        })?;
    let pk = ctx.primary_key_parameters(procedure)?;
    let name = procedure.name();

    if !ctx.entity.split_drop() {
        let sql = render_drop(ctx, procedure, &pk, name, StatusTarget::ResultRow)?;
        return Ok(vec![GeneratedScript::new(
            Some(ctx.mneo()),
            name,
            ScriptKind::Drop,
            sql,
        )]);
    }

    let inner = ctx.entity.object_name(ProcedureKind::InnerDrop);
    let inner_sql = render_drop(ctx, procedure, &pk, &inner, StatusTarget::Output)?;
    let outer_sql = render_wrapper(ctx, procedure, &inner)?;
    Ok(vec![
        GeneratedScript::new(Some(ctx.mneo()), inner, ScriptKind::InnerDrop, inner_sql),
        GeneratedScript::new(Some(ctx.mneo()), name, ScriptKind::Drop, outer_sql),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GenerateOptions;
    use relforge_core::{DomainRegistry, EntityBuilder, EntityCatalog, EntityDefinition, SqlType};

    fn generate(builder: EntityBuilder) -> Vec<GeneratedScript> {
        let catalog =
            EntityCatalog::from_entities(DomainRegistry::default(), [builder.build().unwrap()])
                .unwrap();
        let options = GenerateOptions::default();
        let ctx = EntityContext::new(catalog.get("ped").unwrap(), &catalog, &options);
        generate_drop(&ctx).unwrap()
    }

    fn pedido() -> EntityBuilder {
        EntityDefinition::builder("ped", "pedidos")
            .column(Column::pk("c_empresa_id", SqlType::Char).size(10))
            .column(Column::pk("i_pedido_id", SqlType::Int))
            .column(Column::status("vc_state", "PED"))
    }

    #[test]
    fn drop_checks_every_key_then_clears_satellites() {
        let scripts = generate(pedido());
        assert_eq!(scripts.len(), 1);
        assert_eq!(
            scripts[0].sql,
            "CREATE OR ALTER PROCEDURE [dbo].[ped_drop]
    @empresa_id char(10) = NULL,
    @pedido_id int = NULL
AS
BEGIN
    SET NOCOUNT ON;
    IF @empresa_id IS NULL OR @empresa_id = ''
    BEGIN
        SELECT 11 AS status, N'c_empresa_id is required' AS message;
        RETURN;
    END
    IF @pedido_id IS NULL
    BEGIN
        SELECT 11 AS status, N'i_pedido_id is required' AS message;
        RETURN;
    END
    BEGIN TRY
        BEGIN TRAN;
        DELETE FROM [dbo].[pedidos_status]
        WHERE [c_empresa_id] = @empresa_id AND [i_pedido_id] = @pedido_id;
        DELETE FROM [dbo].[pedidos]
        WHERE [c_empresa_id] = @empresa_id AND [i_pedido_id] = @pedido_id;
        COMMIT TRAN;
        SELECT 0 AS status, N'OK' AS message;
    END TRY
    BEGIN CATCH
        IF @@TRANCOUNT > 0 ROLLBACK TRAN;
        THROW;
    END CATCH
END
"
        );
    }

    #[test]
    fn split_drop_emits_inner_and_wrapper() {
        let scripts = generate(pedido().split_drop());
        let names: Vec<&str> = scripts.iter().map(|s| s.object_name.as_str()).collect();
        assert_eq!(names, ["ped_idrop", "ped_drop"]);
        assert!(scripts[0].sql.contains("    @status int OUTPUT,\n    @message nvarchar(200) OUTPUT\nAS"));
        assert!(scripts[0].sql.contains("        SET @status = 11;"));
        assert!(!scripts[0].sql.contains("BEGIN TRAN"));
        assert!(scripts[1].sql.contains("EXEC [dbo].[ped_idrop]"));
        assert!(scripts[1].sql.contains("            @pedido_id = @pedido_id,"));
    }
}
