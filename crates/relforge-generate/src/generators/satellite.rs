//! Category/status satellites: fake columns stored in `<table>_cat` and
//! `<table>_status` and keyed by the entity primary key plus a domain id.

use relforge_core::{Column, RelatedDomain, SatelliteDomain, SatelliteKind};

use super::EntityContext;
use super::columns::{parameter, quote, string_literal};
use crate::alias::MAIN_ALIAS;
use crate::template::{TemplateValues, indent, render};
use crate::{errors::GenerationError, skeletons};

/// A fake column together with the satellite it resolves through.
#[derive(Debug, Clone, Copy)]
pub struct SatelliteColumn<'a> {
    pub column: &'a Column,
    pub kind: SatelliteKind,
    pub domain_id: &'a str,
}

impl<'a> SatelliteColumn<'a> {
    pub fn of(column: &'a Column) -> Option<Self> {
        if !column.is_fake() {
            return None;
        }
        match column.related()? {
            RelatedDomain::Category(id) => Some(Self {
                column,
                kind: SatelliteKind::Category,
                domain_id: id,
            }),
            RelatedDomain::Status(id) => Some(Self {
                column,
                kind: SatelliteKind::Status,
                domain_id: id,
            }),
        }
    }

    pub fn is_array(&self) -> bool {
        self.column.is_array()
    }

    fn domain<'c>(&self, ctx: &EntityContext<'c>) -> &'c SatelliteDomain {
        ctx.domains().domain(self.kind)
    }

    fn id_literal(&self) -> String {
        string_literal(self.domain_id)
    }

    /// Temp table staging the parsed JSON array of this column.
    fn staging_table(&self) -> String {
        format!("#{}", self.column.parameter_name())
    }

    /// Variable receiving the aggregated JSON array in `_get`.
    pub fn json_variable(&self) -> String {
        format!("@{}_json", self.column.parameter_name())
    }
}

/// Satellite-backed columns among `columns`, in order.
pub fn satellite_columns<'a, I>(columns: I) -> Vec<SatelliteColumn<'a>>
where
    I: IntoIterator<Item = &'a Column>,
{
    columns.into_iter().filter_map(SatelliteColumn::of).collect()
}

/// `[pk] = @pk AND ...` against a satellite, optionally aliased.
fn satellite_key(ctx: &EntityContext<'_>, alias: Option<&str>) -> String {
    super::key_filter(&ctx.primary_key(), alias)
}

/// `sat.[pk] = a.[pk] AND ...`
fn correlated_key(ctx: &EntityContext<'_>, alias: &str) -> String {
    ctx.primary_key()
        .iter()
        .map(|column| {
            let name = quote(column.name());
            format!("{alias}.{name} = {MAIN_ALIAS}.{name}")
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn domain_filter(ctx: &EntityContext<'_>, sat: &SatelliteColumn<'_>, alias: Option<&str>) -> String {
    let id_column = quote(&sat.domain(ctx).id_column);
    let target = match alias {
        Some(alias) => format!("{alias}.{id_column}"),
        None => id_column,
    };
    format!("{target} = {}", sat.id_literal())
}

/// Join resolving a single-valued column, plus its projection.
///
/// The join is LEFT for nullable columns and INNER otherwise.
pub fn single_join(
    ctx: &EntityContext<'_>,
    sat: &SatelliteColumn<'_>,
    alias: &str,
) -> (String, String) {
    let join = if sat.column.is_nullable() {
        "LEFT JOIN"
    } else {
        "INNER JOIN"
    };
    let domain = sat.domain(ctx);
    let sql = format!(
        "{join} {} {alias} ON {} AND {}",
        ctx.satellite_table(sat.kind),
        correlated_key(ctx, alias),
        domain_filter(ctx, sat, Some(alias)),
    );
    let projection = format!(
        "{alias}.{} AS {}",
        quote(&domain.value_column),
        quote(sat.column.name())
    );
    (sql, projection)
}

fn json_aggregate_select(ctx: &EntityContext<'_>, sat: &SatelliteColumn<'_>) -> String {
    let domain = sat.domain(ctx);
    let description = quote(&domain.description_column);
    format!(
        "COALESCE(N'[' + STRING_AGG(CONVERT(nvarchar(max), N'\"' + STRING_ESCAPE(val.{description}, 'json') + N'\"'), N',') WITHIN GROUP (ORDER BY val.{description}) + N']', N'[]')"
    )
}

fn json_aggregate_from(ctx: &EntityContext<'_>, sat: &SatelliteColumn<'_>) -> String {
    let domain = sat.domain(ctx);
    let id = quote(&domain.id_column);
    let value = quote(&domain.value_column);
    format!(
        "FROM {} sat\nINNER JOIN {} val ON val.{id} = sat.{id} AND val.{value} = sat.{value}",
        ctx.satellite_table(sat.kind),
        ctx.object(&domain.values_table),
    )
}

/// Pre-query filling [`SatelliteColumn::json_variable`] for `_get`.
pub fn array_pre_query(ctx: &EntityContext<'_>, sat: &SatelliteColumn<'_>) -> String {
    let variable = sat.json_variable();
    format!(
        "DECLARE {variable} nvarchar(max);\nSELECT {variable} = {}\n{}\nWHERE {} AND {};",
        json_aggregate_select(ctx, sat),
        json_aggregate_from(ctx, sat),
        satellite_key(ctx, Some("sat")),
        domain_filter(ctx, sat, Some("sat")),
    )
}

/// Correlated subquery projecting an array column in browsing views.
pub fn array_projection(ctx: &EntityContext<'_>, sat: &SatelliteColumn<'_>) -> String {
    format!(
        "(SELECT {} {} WHERE {} AND {}) AS {}",
        json_aggregate_select(ctx, sat),
        json_aggregate_from(ctx, sat).replace('\n', " "),
        correlated_key(ctx, "sat"),
        domain_filter(ctx, sat, Some("sat")),
        quote(sat.column.name()),
    )
}

/// Parse the incoming JSON array into a temp table, resolving known
/// descriptions and registering unseen ones under a checksum-derived id.
pub fn array_staging(ctx: &EntityContext<'_>, sat: &SatelliteColumn<'_>) -> String {
    let domain = sat.domain(ctx);
    let staging = sat.staging_table();
    let param = parameter(sat.column);
    let values_table = ctx.object(&domain.values_table);
    let id = quote(&domain.id_column);
    let value = quote(&domain.value_column);
    let description = quote(&domain.description_column);
    let domain_id = sat.id_literal();
    format!(
        "CREATE TABLE {staging} ({value} varchar(20) NOT NULL, {description} nvarchar(200) NOT NULL);
IF {param} IS NOT NULL
    INSERT INTO {staging} ({value}, {description})
    SELECT DISTINCT COALESCE(val.{value}, CONVERT(varchar(20), ABS(CHECKSUM(CONVERT(nvarchar(200), j.[value]))))), CONVERT(nvarchar(200), j.[value])
    FROM OPENJSON({param}) j
    LEFT JOIN {values_table} val
        ON val.{id} = {domain_id}
        AND val.{description} = CONVERT(nvarchar(200), j.[value]) COLLATE Latin1_General_BIN2
    WHERE j.[type] = 1;
INSERT INTO {values_table} ({id}, {value}, {description})
SELECT {domain_id}, t.{value}, MIN(t.{description})
FROM {staging} t
WHERE NOT EXISTS (
    SELECT 1 FROM {values_table} val
    WHERE val.{id} = {domain_id} AND val.{value} = t.{value}
)
GROUP BY t.{value};"
    )
}

fn insert_columns(ctx: &EntityContext<'_>, domain: &SatelliteDomain) -> String {
    ctx.primary_key()
        .iter()
        .map(|column| quote(column.name()))
        .chain([quote(&domain.id_column), quote(&domain.value_column)])
        .collect::<Vec<_>>()
        .join(", ")
}

fn key_parameters(ctx: &EntityContext<'_>) -> String {
    ctx.primary_key()
        .iter()
        .map(|column| parameter(column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn single_insert(ctx: &EntityContext<'_>, sat: &SatelliteColumn<'_>) -> String {
    let domain = sat.domain(ctx);
    format!(
        "INSERT INTO {} ({})\nVALUES ({}, {}, {});",
        ctx.satellite_table(sat.kind),
        insert_columns(ctx, domain),
        key_parameters(ctx),
        sat.id_literal(),
        parameter(sat.column),
    )
}

fn array_insert_missing(ctx: &EntityContext<'_>, sat: &SatelliteColumn<'_>, only_missing: bool) -> String {
    let domain = sat.domain(ctx);
    let table = ctx.satellite_table(sat.kind);
    let value = quote(&domain.value_column);
    let mut sql = format!(
        "INSERT INTO {table} ({})\nSELECT DISTINCT {}, {}, t.{value}\nFROM {} t",
        insert_columns(ctx, domain),
        key_parameters(ctx),
        sat.id_literal(),
        sat.staging_table(),
    );
    if only_missing {
        sql.push_str(&format!(
            "\nWHERE NOT EXISTS (\n    SELECT 1 FROM {table} sat\n    WHERE {} AND {} AND sat.{value} = t.{value}\n)",
            satellite_key(ctx, Some("sat")),
            domain_filter(ctx, sat, Some("sat")),
        ));
    }
    sql.push(';');
    sql
}

/// Insert-branch statement for one fake column.
///
/// Nullable single values are only inserted when present.
pub fn insert_fragment(ctx: &EntityContext<'_>, sat: &SatelliteColumn<'_>) -> String {
    if sat.is_array() {
        return array_insert_missing(ctx, sat, false);
    }
    let insert = single_insert(ctx, sat);
    if sat.column.is_nullable() {
        format!("IF {} IS NOT NULL\n{}", parameter(sat.column), indent(&insert, 1))
    } else {
        insert
    }
}

/// Update-branch statement for one fake column.
///
/// Single values are deleted when NULL (nullable columns only), updated
/// when a row exists and inserted otherwise. Arrays are reconciled against
/// the staged set.
pub fn update_fragment(ctx: &EntityContext<'_>, sat: &SatelliteColumn<'_>) -> String {
    let domain = sat.domain(ctx);
    let table = ctx.satellite_table(sat.kind);
    let key = format!(
        "{} AND {}",
        satellite_key(ctx, None),
        domain_filter(ctx, sat, None)
    );

    if sat.is_array() {
        let value = quote(&domain.value_column);
        let delete = format!(
            "DELETE sat FROM {table} sat\nWHERE {} AND {}\n    AND NOT EXISTS (SELECT 1 FROM {} t WHERE t.{value} = sat.{value});",
            satellite_key(ctx, Some("sat")),
            domain_filter(ctx, sat, Some("sat")),
            sat.staging_table(),
        );
        return format!("{delete}\n{}", array_insert_missing(ctx, sat, true));
    }

    let param = parameter(sat.column);
    let update = format!(
        "UPDATE {table}\nSET {} = {param}\nWHERE {key};",
        quote(&domain.value_column)
    );
    let upsert = format!(
        "IF EXISTS (SELECT 1 FROM {table} WHERE {key})\n{}\nELSE\n{}",
        indent(&update, 1),
        indent(&single_insert(ctx, sat), 1),
    );
    if sat.column.is_nullable() {
        format!(
            "IF {param} IS NULL\n{}\nELSE {upsert}",
            indent(&format!("DELETE FROM {table}\nWHERE {key};"), 1),
        )
    } else {
        upsert
    }
}

/// Satellite cleanup for `_drop`: one DELETE per satellite table in use.
pub fn delete_fragments(ctx: &EntityContext<'_>) -> String {
    [
        (SatelliteKind::Category, ctx.entity.related_categories()),
        (SatelliteKind::Status, ctx.entity.related_status()),
    ]
    .into_iter()
    .filter(|(_, ids)| !ids.is_empty())
    .map(|(kind, _)| {
        format!(
            "DELETE FROM {}\nWHERE {};",
            ctx.satellite_table(kind),
            satellite_key(ctx, None)
        )
    })
    .collect::<Vec<_>>()
    .join("\n")
}

/// DDL of the satellite table for `kind`, if the entity uses it.
pub fn satellite_ddl(
    ctx: &EntityContext<'_>,
    kind: SatelliteKind,
) -> Result<Option<String>, GenerationError> {
    let ids = match kind {
        SatelliteKind::Category => ctx.entity.related_categories(),
        SatelliteKind::Status => ctx.entity.related_status(),
    };
    if ids.is_empty() {
        return Ok(None);
    }

    let domain = ctx.domains().domain(kind);
    let table_name = domain.satellite_table(ctx.entity.table_name());
    let table = ctx.object(&table_name);
    let pk = ctx.primary_key();
    let pk_names: Vec<String> = pk.iter().map(|column| quote(column.name())).collect();
    let id = quote(&domain.id_column);
    let value = quote(&domain.value_column);

    let mut lines: Vec<String> = pk
        .iter()
        .map(|column| super::columns::column_decl(column, &ctx.options.encryption_key))
        .collect();
    lines.push(format!("{id} varchar(20) NOT NULL"));
    lines.push(format!("{value} varchar(20) NOT NULL"));
    lines.push(format!(
        "CONSTRAINT {} PRIMARY KEY CLUSTERED ({}, {id}, {value})",
        quote(&format!("pk_{table_name}")),
        pk_names.join(", "),
    ));
    lines.push(format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        quote(&format!("fk_{table_name}_{}", ctx.entity.table_name())),
        pk_names.join(", "),
        ctx.table(),
        pk_names.join(", "),
    ));
    lines.push(format!(
        "CONSTRAINT {} FOREIGN KEY ({id}, {value}) REFERENCES {} ({id}, {value})",
        quote(&format!("fk_{table_name}_{}", domain.values_table)),
        ctx.object(&domain.values_table),
    ));

    let index = format!(
        "CREATE INDEX {} ON {table} ({id}, {value});",
        quote(&format!("ix_{table_name}_{}", domain.values_table)),
    );

    let values = TemplateValues::new()
        .with("TABLE", table)
        .with("COLUMNS", indent(&lines.join(",\n"), 1))
        .with("INDEXES", index);
    render(skeletons::CREATE_TABLE, &values).map(Some)
}
