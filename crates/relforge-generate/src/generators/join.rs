//! Foreign key constraints and their covering indexes.

use std::collections::BTreeSet;

use relforge_core::{EntityForeignKey, ForeignKeyJoin};

use super::EntityContext;
use super::columns::quote;
use crate::errors::GenerationError;
use crate::model::{GeneratedScript, ScriptKind};

/// Resolved join plus the DDL fragments it produces.
#[derive(Debug, Clone)]
pub struct ForeignKeyDdl {
    pub join: ForeignKeyJoin,
    /// `CONSTRAINT ... FOREIGN KEY ... REFERENCES ...` line for CREATE TABLE.
    pub constraint: String,
    /// Covering index on the child columns, unless disabled.
    pub index: Option<String>,
}

fn column_list<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    names.into_iter().map(quote).collect::<Vec<_>>().join(", ")
}

/// DDL for one foreign key; fake relationships produce none.
pub fn foreign_key_ddl(
    ctx: &EntityContext<'_>,
    fk: &EntityForeignKey,
) -> Result<Option<ForeignKeyDdl>, GenerationError> {
    if fk.is_fake() {
        return Ok(None);
    }
    let join = ctx.catalog.resolve_join(fk)?;
    let children = column_list(join.pairs.iter().map(|pair| pair.child.as_str()));
    let parents = column_list(join.pairs.iter().map(|pair| pair.parent.as_str()));

    let constraint = format!(
        "CONSTRAINT {} FOREIGN KEY ({children}) REFERENCES {} ({parents})",
        quote(&join.name),
        ctx.object(&join.parent_table),
    );
    let index = (!fk.do_not_create_index()).then(|| {
        format!(
            "CREATE INDEX {} ON {} ({children});",
            quote(&format!("ix_{}", join.name)),
            ctx.table(),
        )
    });

    Ok(Some(ForeignKeyDdl {
        join,
        constraint,
        index,
    }))
}

/// `ALTER TABLE ... ADD CONSTRAINT` for the foreign keys named in `names`,
/// run after every table exists. `None` when nothing is deferred.
pub fn deferred_foreign_keys(
    ctx: &EntityContext<'_>,
    names: &BTreeSet<String>,
) -> Result<Option<GeneratedScript>, GenerationError> {
    let mut statements = Vec::new();
    for fk in ctx
        .entity
        .foreign_keys()
        .iter()
        .filter(|fk| names.contains(fk.name()))
    {
        if let Some(ddl) = foreign_key_ddl(ctx, fk)? {
            statements.push(format!("ALTER TABLE {} ADD {};", ctx.table(), ddl.constraint));
        }
    }
    if statements.is_empty() {
        return Ok(None);
    }
    Ok(Some(GeneratedScript::new(
        Some(ctx.mneo()),
        format!("{}_fk", ctx.entity.table_name()),
        ScriptKind::ForeignKey,
        format!("{}\n", statements.join("\n")),
    )))
}
