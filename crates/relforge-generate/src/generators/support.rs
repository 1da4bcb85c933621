//! Shared objects every generated entity depends on: the category/status
//! values tables, the numbering service and the phrase splitter.

use relforge_core::{SatelliteDomain, SatelliteKind};

use super::columns::quote;
use crate::errors::GenerationError;
use crate::model::{GenerateOptions, GeneratedScript, ScriptKind};
use crate::skeletons;
use crate::template::{TemplateValues, render};

/// Table backing the numbering procedure.
pub const NUMBERS_TABLE: &str = "relforge_numbers";

/// `schema.name` as written inside `OBJECT_ID(N'...')`.
fn qualified_literal(options: &GenerateOptions, name: &str) -> String {
    format!("{}.{}", options.schema, name).replace('\'', "''")
}

fn object(options: &GenerateOptions, name: &str) -> String {
    format!("{}.{}", quote(&options.schema), quote(name))
}

fn values_table(
    options: &GenerateOptions,
    domain: &SatelliteDomain,
) -> Result<GeneratedScript, GenerationError> {
    let values = TemplateValues::new()
        .with("QUALIFIED", qualified_literal(options, &domain.values_table))
        .with("TABLE", object(options, &domain.values_table))
        .with("ID_COLUMN", quote(&domain.id_column))
        .with("VALUE_COLUMN", quote(&domain.value_column))
        .with("DESCRIPTION_COLUMN", quote(&domain.description_column))
        .with("PK_NAME", quote(&format!("pk_{}", domain.values_table)));
    Ok(GeneratedScript::new(
        None,
        domain.values_table.as_str(),
        ScriptKind::Support,
        render(skeletons::VALUES_TABLE, &values)?,
    ))
}

/// Support scripts in creation order.
pub fn generate_support(
    options: &GenerateOptions,
    domains: &relforge_core::DomainRegistry,
) -> Result<Vec<GeneratedScript>, GenerationError> {
    let mut scripts = Vec::with_capacity(4);
    for kind in [SatelliteKind::Category, SatelliteKind::Status] {
        scripts.push(values_table(options, domains.domain(kind))?);
    }

    let numbering = TemplateValues::new()
        .with("QUALIFIED_TABLE", qualified_literal(options, NUMBERS_TABLE))
        .with("TABLE", object(options, NUMBERS_TABLE))
        .with("TABLE_NAME", NUMBERS_TABLE)
        .with("PROCEDURE", object(options, &options.numbering_procedure));
    scripts.push(GeneratedScript::new(
        None,
        options.numbering_procedure.as_str(),
        ScriptKind::Support,
        render(skeletons::NUMBERING, &numbering)?,
    ));

    let phrases =
        TemplateValues::new().with("FUNCTION", object(options, &options.phrase_function));
    scripts.push(GeneratedScript::new(
        None,
        options.phrase_function.as_str(),
        ScriptKind::Support,
        render(skeletons::PHRASE_FUNCTION, &phrases)?,
    ));

    Ok(scripts)
}
