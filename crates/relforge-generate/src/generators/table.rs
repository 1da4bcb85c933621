//! CREATE TABLE for the entity plus its satellites.

use std::collections::BTreeSet;

use relforge_core::{AUDIT_COLUMNS, Column, SatelliteKind};

use super::EntityContext;
use super::columns::{column_decl, quote};
use super::join::foreign_key_ddl;
use super::satellite::satellite_ddl;
use crate::errors::GenerationError;
use crate::model::{GeneratedScript, ScriptKind};
use crate::skeletons;
use crate::template::{TemplateValues, indent, render};

fn audit_columns(ctx: &EntityContext<'_>) -> Result<Vec<Column>, GenerationError> {
    AUDIT_COLUMNS
        .iter()
        .filter(|(name, _, _)| ctx.entity.column(name).is_none())
        .map(|(name, sql_type, size)| {
            Column::builder(*name, *sql_type)
                .size(*size)
                .nullable()
                .build()
                .map_err(GenerationError::from)
        })
        .collect()
}

/// Table script: stored columns, audit columns, keys, foreign keys, indexes
/// and (when enabled) the category/status satellite tables.
///
/// Foreign keys named in `deferred` keep their covering index but their
/// constraint is left to [`deferred_foreign_keys`](super::join::deferred_foreign_keys).
pub fn generate_table(
    ctx: &EntityContext<'_>,
    deferred: &BTreeSet<String>,
) -> Result<GeneratedScript, GenerationError> {
    let entity = ctx.entity;
    let key = &ctx.options.encryption_key;
    let table_name = entity.table_name();

    let mut lines: Vec<String> = entity
        .stored_columns()
        .map(|column| column_decl(column, key))
        .collect();
    lines.extend(audit_columns(ctx)?.iter().map(|column| column_decl(column, key)));

    let pk: Vec<String> = ctx
        .primary_key()
        .iter()
        .map(|column| quote(column.name()))
        .collect();
    if !pk.is_empty() {
        lines.push(format!(
            "CONSTRAINT {} PRIMARY KEY CLUSTERED ({})",
            quote(&format!("pk_{table_name}")),
            pk.join(", ")
        ));
    }

    let mut indexes = Vec::new();
    for fk in entity.foreign_keys() {
        if let Some(ddl) = foreign_key_ddl(ctx, fk)? {
            if !deferred.contains(fk.name()) {
                lines.push(ddl.constraint);
            }
            indexes.extend(ddl.index);
        }
    }

    for index in entity.indexes() {
        let mut sql = format!(
            "CREATE INDEX {} ON {} ({})",
            quote(&index.name),
            ctx.table(),
            names(&index.columns)
        );
        if !index.include.is_empty() {
            sql.push_str(&format!(" INCLUDE ({})", names(&index.include)));
        }
        sql.push(';');
        indexes.push(sql);
    }

    for constraint in entity.unique_constraints() {
        indexes.push(format!(
            "CREATE UNIQUE INDEX {} ON {} ({});",
            quote(&constraint.name),
            ctx.table(),
            names(&constraint.columns)
        ));
    }

    let values = TemplateValues::new()
        .with("TABLE", ctx.table())
        .with("COLUMNS", indent(&lines.join(",\n"), 1))
        .with("INDEXES", indexes.join("\n"));
    let mut sql = render(skeletons::CREATE_TABLE, &values)?;

    if ctx.options.emit_satellites {
        for kind in [SatelliteKind::Category, SatelliteKind::Status] {
            if let Some(ddl) = satellite_ddl(ctx, kind)? {
                sql.push_str(&ddl);
            }
        }
    }

    Ok(GeneratedScript::new(
        Some(ctx.mneo()),
        table_name,
        ScriptKind::Table,
        sql,
    ))
}

fn names(columns: &[String]) -> String {
    columns
        .iter()
        .map(|name| quote(name))
        .collect::<Vec<_>>()
        .join(", ")
}
