//! `{mneo}_lookup`: the description column of one row.

use relforge_core::ProcedureDefinition;

use super::columns::{parameter_block, quote};
use super::{EntityContext, key_filter};
use crate::alias::MAIN_ALIAS;
use crate::errors::GenerationError;
use crate::model::{GeneratedScript, ScriptKind};
use crate::skeletons;
use crate::template::{TemplateValues, render};

pub fn generate_lookup(
    ctx: &EntityContext<'_>,
    procedure: &ProcedureDefinition,
) -> Result<GeneratedScript, GenerationError> {
    if !procedure.is_lookup() {
        return Err(GenerationError::NotALookup {
            procedure: procedure.name().to_string(),
        });
    }
    let description =
        ctx.entity
            .description_column()
            .ok_or_else(|| GenerationError::NoDescriptionColumn {
                entity: ctx.mneo().to_string(),
            })?;
    let pk = ctx.primary_key_parameters(procedure)?;

    let values = TemplateValues::new()
        .with("PROCEDURE", ctx.object(procedure.name()))
        .with("PARAMETERS", parameter_block(procedure.parms(), &[]))
        .with("DESCRIPTION", quote(description.name()))
        .with("TABLE", ctx.table())
        .with("PK_FILTER", key_filter(&pk, Some(MAIN_ALIAS)));

    Ok(GeneratedScript::new(
        Some(ctx.mneo()),
        procedure.name(),
        ScriptKind::Lookup,
        render(skeletons::LOOKUP, &values)?,
    ))
}
