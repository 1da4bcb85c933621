//! `{mneo}_brw{suffix}`: paged, searchable browsing views.

use relforge_core::{
    Column, ColumnFlags, LAST_UPDATE_COLUMN, LIKE_PARAMETER, MODE_PARAMETER, ViewDefinition,
};

use super::EntityContext;
use super::columns::{is_blankable, parameter, parameter_block, quote, searchable_text};
use super::satellite::{SatelliteColumn, array_projection, single_join};
use crate::alias::{AliasAllocator, MAIN_ALIAS};
use crate::errors::GenerationError;
use crate::model::{GeneratedScript, ScriptKind};
use crate::skeletons;
use crate::template::{TemplateValues, indent, render};

struct ViewProjection<'a> {
    select: Vec<String>,
    joins: Vec<String>,
    /// Stored columns in the projection, candidates for `@like`.
    stored: Vec<&'a Column>,
}

/// Insert-flagged columns minus `dt_lu`, keeping only the browsing key
/// among the primary key columns.
fn projection<'a>(ctx: &EntityContext<'a>, browsing: &Column) -> ViewProjection<'a> {
    let mut aliases = AliasAllocator::new();
    let mut projection = ViewProjection {
        select: Vec::new(),
        joins: Vec::new(),
        stored: Vec::new(),
    };

    let projected = ctx.entity.columns_with(ColumnFlags::INSERT).filter(|column| {
        column.name() != LAST_UPDATE_COLUMN && (!column.is_pk() || column.name() == browsing.name())
    });
    for column in projected {
        match SatelliteColumn::of(column) {
            Some(sat) if sat.is_array() => projection.select.push(array_projection(ctx, &sat)),
            Some(sat) => {
                let alias = aliases.allocate();
                let (join, select) = single_join(ctx, &sat, &alias);
                projection.joins.push(join);
                projection.select.push(select);
            }
            None if column.is_fake() => projection
                .select
                .push(format!("CAST(NULL AS nvarchar(1)) AS {}", quote(column.name()))),
            None => {
                projection
                    .select
                    .push(format!("{MAIN_ALIAS}.{}", quote(column.name())));
                projection.stored.push(column);
            }
        }
    }
    projection
}

/// Columns every `@like` phrase set is matched against.
fn likeable_columns<'a>(
    ctx: &EntityContext<'a>,
    view: &ViewDefinition,
    stored: &[&'a Column],
) -> Result<Vec<&'a Column>, GenerationError> {
    let Some(names) = view.likeable_override() else {
        return Ok(stored
            .iter()
            .copied()
            .filter(|column| column.flags().intersects(ColumnFlags::CRUD) && is_blankable(column))
            .collect());
    };
    names
        .iter()
        .map(|name| {
            ctx.entity
                .column(name)
                .filter(|column| !column.is_fake() && !column.is_encrypted())
                .ok_or_else(|| GenerationError::InvalidView {
                    view: view.name().to_string(),
                    reason: format!("column '{name}' cannot be searched"),
                })
        })
        .collect()
}

fn mode_parameter(view: &ViewDefinition) -> Option<&Column> {
    view.parms()
        .iter()
        .map(|parm| parm.column())
        .find(|column| column.parameter_name() == MODE_PARAMETER)
}

fn like_parameter(view: &ViewDefinition) -> Option<&Column> {
    view.parms()
        .iter()
        .map(|parm| parm.column())
        .find(|column| column.parameter_name() == LIKE_PARAMETER)
}

fn phrases(ctx: &EntityContext<'_>, like: &Column) -> String {
    format!(
        "DECLARE @phrases TABLE ([phrase] nvarchar(max) NOT NULL);
INSERT INTO @phrases ([phrase])
SELECT [phrase] FROM {}({});
DECLARE @has_phrases bit = CASE WHEN EXISTS (SELECT 1 FROM @phrases) THEN 1 ELSE 0 END;",
        ctx.object(&ctx.options.phrase_function),
        parameter(like),
    )
}

/// A row survives unless some searchable column contains none of the
/// phrases.
fn like_filter(columns: &[&Column]) -> String {
    let texts = columns
        .iter()
        .map(|column| {
            format!(
                "({})",
                searchable_text(&format!("{MAIN_ALIAS}.{}", quote(column.name())))
            )
        })
        .collect::<Vec<_>>()
        .join(",\n            ");
    format!(
        "AND (@has_phrases = 0 OR NOT EXISTS (
    SELECT 1
    FROM (VALUES
        {texts}
    ) s([text])
    WHERE NOT EXISTS (
        SELECT 1 FROM @phrases p
        WHERE CHARINDEX(p.[phrase], s.[text]) > 0
    )
))"
    )
}

pub fn generate_view(
    ctx: &EntityContext<'_>,
    view: &ViewDefinition,
) -> Result<GeneratedScript, GenerationError> {
    let invalid = |reason: &str| GenerationError::InvalidView {
        view: view.name().to_string(),
        reason: reason.to_string(),
    };

    let browsing_parm = view.browsing_key().column();
    let browsing = ctx
        .entity
        .column(browsing_parm.name())
        .filter(|column| !column.is_fake())
        .ok_or_else(|| invalid("browsing key must be a stored column"))?;
    let browsing_column = format!("{MAIN_ALIAS}.{}", quote(browsing.name()));
    let mode = mode_parameter(view).ok_or_else(|| invalid("missing mode parameter"))?;
    let like = like_parameter(view).ok_or_else(|| invalid("missing search parameter"))?;

    let projection = projection(ctx, browsing);
    let likeable = likeable_columns(ctx, view, &projection.stored)?;

    // parameters that are not stored columns are passed through untouched
    let filters: Vec<String> = view
        .filters()
        .map(|parm| parm.column())
        .filter(|column| {
            ctx.entity
                .column(column.name())
                .is_some_and(|stored| !stored.is_fake())
        })
        .map(|column| format!("{MAIN_ALIAS}.{} = {}", quote(column.name()), parameter(column)))
        .collect();
    let filters = if filters.is_empty() {
        "1 = 1".to_string()
    } else {
        filters.join("\n    AND ")
    };

    let key = parameter(browsing_parm);
    let mode_param = parameter(mode);
    let paging = format!(
        "AND ({mode_param} IS NULL OR {key} IS NULL
    OR ({mode_param} = 'B' AND {browsing_column} <= {key})
    OR ({mode_param} <> 'B' AND {browsing_column} >= {key}))"
    );

    let isolation = if view.procedure().readonly_locks() {
        "SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED;"
    } else {
        ""
    };
    let (phrases, like_filter) = if likeable.is_empty() {
        (String::new(), String::new())
    } else {
        (phrases(ctx, like), like_filter(&likeable))
    };

    let values = TemplateValues::new()
        .with("PROCEDURE", ctx.object(view.name()))
        .with("PARAMETERS", parameter_block(view.procedure().parms(), &[]))
        .with("ISOLATION", indent(isolation, 1))
        .with("PHRASES", indent(&phrases, 1))
        .with("ROW_LIMIT", ctx.options.view_row_limit.to_string())
        .with("SELECT_LIST", indent(&projection.select.join(",\n"), 2))
        .with("TABLE", ctx.table())
        .with("JOINS", indent(&projection.joins.join("\n"), 1))
        .with("FILTERS", filters)
        .with("PAGING", indent(&paging, 2))
        .with("LIKE_FILTER", indent(&like_filter, 2))
        .with("MODE", mode.parameter_name())
        .with("BROWSING_COLUMN", browsing_column.as_str());

    Ok(GeneratedScript::new(
        Some(ctx.mneo()),
        view.name(),
        ScriptKind::View,
        render(skeletons::VIEW, &values)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GenerateOptions;
    use relforge_core::{
        DomainRegistry, EntityBuilder, EntityCatalog, EntityDefinition, SqlType, ViewBuilder,
    };

    fn sucursal() -> EntityBuilder {
        EntityDefinition::builder("suc", "sucursales")
            .column(Column::pk("c_empresa_id", SqlType::Char).size(10))
            .column(Column::pk("c_sucursal_id", SqlType::Char).size(10))
            .column(Column::varchar("vc_name", 80))
            .column(Column::nvarchar("nvc_address", 200).nullable())
            .column(Column::builder("i_rooms", SqlType::Int))
            .column(Column::category("vc_kind", "SUCK").nullable())
            .column(Column::category_array("nvc_tags", "SUCT").nullable())
    }

    fn generate(builder: EntityBuilder, options: GenerateOptions) -> Vec<GeneratedScript> {
        let catalog =
            EntityCatalog::from_entities(DomainRegistry::default(), [builder.build().unwrap()])
                .unwrap();
        let ctx = EntityContext::new(catalog.get("suc").unwrap(), &catalog, &options);
        ctx.entity
            .views()
            .iter()
            .map(|view| generate_view(&ctx, view).unwrap())
            .collect()
    }

    #[test]
    fn standard_view_keeps_only_the_browsing_key() {
        let scripts = generate(sucursal(), GenerateOptions::default());
        assert_eq!(scripts.len(), 1);
        let sql = &scripts[0].sql;
        assert_eq!(scripts[0].object_name, "suc_brwStandard");
        assert!(sql.contains("    SELECT TOP (500)\n        a.[c_sucursal_id],\n        a.[vc_name],"));
        assert!(!sql.contains("a.[c_empresa_id],"));
        assert!(!sql.contains("a.[dt_lu]"));
        assert!(sql.contains("    WHERE a.[c_empresa_id] = @empresa_id\n"));
        assert!(sql.contains("LEFT JOIN [dbo].[sucursales_cat] b ON"));
        assert!(sql.contains("AS [nvc_tags]"));
    }

    #[test]
    fn parameters_end_with_search_and_mode() {
        let sql = &generate(sucursal(), GenerateOptions::default())[0].sql;
        assert!(sql.contains("    @sucursal_id char(10) = NULL,\n    @like nvarchar(max) = NULL,\n    @d char(1) = NULL\nAS"));
        assert!(sql.contains("    SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED;"));
    }

    #[test]
    fn pages_forward_and_backward_on_the_browsing_key() {
        let sql = &generate(sucursal(), GenerateOptions::default())[0].sql;
        assert!(sql.contains("        AND (@d IS NULL OR @sucursal_id IS NULL\n            OR (@d = 'B' AND a.[c_sucursal_id] <= @sucursal_id)\n            OR (@d <> 'B' AND a.[c_sucursal_id] >= @sucursal_id))"));
        assert!(sql.ends_with("    ORDER BY\n        CASE WHEN @d = 'B' THEN a.[c_sucursal_id] END DESC,\n        a.[c_sucursal_id] ASC;\nEND\n"));
    }

    #[test]
    fn search_requires_every_searchable_column_to_match() {
        let sql = &generate(sucursal(), GenerateOptions::default())[0].sql;
        assert!(sql.contains("SELECT [phrase] FROM [dbo].[fn_split_phrases](@like);"));
        assert!(sql.contains("AND (@has_phrases = 0 OR NOT EXISTS ("));
        assert!(sql.contains("(LOWER(LTRIM(RTRIM(ISNULL(CONVERT(nvarchar(max), a.[c_sucursal_id]), N'')))))"));
        assert!(sql.contains("(LOWER(LTRIM(RTRIM(ISNULL(CONVERT(nvarchar(max), a.[vc_name]), N'')))))"));
        assert!(sql.contains("a.[nvc_address]), N'')))))"));
        assert!(!sql.contains("a.[i_rooms]), N''"));
        assert!(sql.contains("WHERE CHARINDEX(p.[phrase], s.[text]) > 0"));
    }

    #[test]
    fn likeable_override_and_row_limit() {
        let builder = sucursal().view(
            ViewBuilder::new("ByName")
                .filter("c_empresa_id")
                .browsing_key("vc_name")
                .likeable(["vc_name"])
                .readonly_locks(false),
        );
        let options = GenerateOptions {
            view_row_limit: 50,
            ..GenerateOptions::default()
        };
        let scripts = generate(builder, options);
        let names: Vec<&str> = scripts.iter().map(|s| s.object_name.as_str()).collect();
        assert_eq!(names, ["suc_brwStandard", "suc_brwByName"]);
        let sql = &scripts[1].sql;
        assert!(sql.contains("SELECT TOP (50)"));
        assert!(!sql.contains("READ UNCOMMITTED"));
        assert!(!sql.contains("a.[c_sucursal_id],"));
        assert!(!sql.contains("a.[nvc_address]), N''"));
    }

    #[test]
    fn view_without_searchable_columns_has_no_search() {
        let builder = EntityDefinition::builder("suc", "sucursales")
            .column(Column::pk("i_sucursal_id", SqlType::Int))
            .column(Column::builder("i_rooms", SqlType::Int));
        let sql = &generate(builder, GenerateOptions::default())[0].sql;
        assert!(!sql.contains("@phrases"));
        assert!(sql.contains("    WHERE 1 = 1\n"));
    }
}
