use std::collections::{BTreeMap, BTreeSet};

use jsonschema::JSONSchema;
use relforge_core::{EntityCatalog, LAST_UPDATE_COLUMN, SqlType};
use serde_json::Value;

use crate::convert::entity_builder;
use crate::errors::{DeclError, ValidationIssue, ValidationReport};
use crate::model::{
    CATALOG_VERSION, CatalogDocument, ColumnDocument, ColumnRole, EntityDocument, FlagName,
};

/// Catalog built from a document, with the warnings collected on the way.
#[derive(Debug, Clone)]
pub struct ValidatedCatalog {
    pub catalog: EntityCatalog,
    pub warnings: Vec<ValidationIssue>,
}

/// Validate a catalog JSON document against the catalog JSON Schema.
pub fn validate_catalog_json(
    catalog_json: &Value,
    catalog_schema: &Value,
) -> crate::Result<ValidationReport> {
    let compiled =
        JSONSchema::compile(catalog_schema).map_err(|err| DeclError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();
    if let Err(errors) = compiled.validate(catalog_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push(ValidationIssue::error(
                "schema_violation",
                path,
                error.to_string(),
            ));
        }
    }
    Ok(report)
}

/// Cross-reference checks a JSON Schema cannot express.
pub fn validate_document(doc: &CatalogDocument) -> ValidationReport {
    let mut report = ValidationReport::default();

    if doc.catalog_version != CATALOG_VERSION {
        report.push(
            ValidationIssue::error(
                "unsupported_version",
                "/catalog_version",
                format!("catalog_version '{}' is not supported", doc.catalog_version),
            )
            .with_hint(format!("set catalog_version to \"{CATALOG_VERSION}\"")),
        );
    }

    if doc.entities.is_empty() {
        report.push(ValidationIssue::error(
            "entities_empty",
            "/entities",
            "catalog declares no entities",
        ));
    }

    let mut index: BTreeMap<&str, &EntityDocument> = BTreeMap::new();
    for (idx, entity) in doc.entities.iter().enumerate() {
        if index.insert(entity.mneo.as_str(), entity).is_some() {
            report.push(ValidationIssue::error(
                "duplicate_entity",
                format!("/entities/{idx}/mneo"),
                format!("entity mnemonic '{}' is declared twice", entity.mneo),
            ));
        }
    }

    for (idx, entity) in doc.entities.iter().enumerate() {
        validate_entity(idx, entity, &index, &mut report);
    }

    report
}

/// Convert a structurally valid document into a catalog.
pub fn build_catalog(doc: &CatalogDocument) -> Result<EntityCatalog, ValidationReport> {
    let mut report = ValidationReport::default();
    let mut entities = Vec::with_capacity(doc.entities.len());

    for (idx, entity) in doc.entities.iter().enumerate() {
        match entity_builder(entity).build() {
            Ok(definition) => entities.push(definition),
            Err(err) => report.push(ValidationIssue::error(
                "invalid_entity",
                format!("/entities/{idx}"),
                err.to_string(),
            )),
        }
    }
    if !report.is_ok() {
        return Err(report);
    }

    EntityCatalog::from_entities(doc.domains.clone(), entities).map_err(|err| {
        ValidationReport::single(ValidationIssue::error(
            "invalid_catalog",
            "/entities",
            err.to_string(),
        ))
    })
}

/// Validate the document end-to-end and build its catalog.
pub fn load_catalog(
    catalog_json: &Value,
    catalog_schema: &Value,
) -> Result<ValidatedCatalog, ValidationReport> {
    let structural = validate_catalog_json(catalog_json, catalog_schema).map_err(|err| {
        ValidationReport::single(ValidationIssue::error(
            "schema_validation_error",
            "/",
            err.to_string(),
        ))
    })?;
    if !structural.is_ok() {
        return Err(structural);
    }

    let doc: CatalogDocument = serde_json::from_value(catalog_json.clone()).map_err(|err| {
        ValidationReport::single(ValidationIssue::error(
            "invalid_catalog_json",
            "/",
            err.to_string(),
        ))
    })?;

    let report = validate_document(&doc);
    if !report.is_ok() {
        return Err(report);
    }

    let catalog = build_catalog(&doc).map_err(|mut errors| {
        errors.warnings.splice(0..0, report.warnings.iter().cloned());
        errors
    })?;

    Ok(ValidatedCatalog {
        catalog,
        warnings: report.warnings,
    })
}

fn validate_entity(
    idx: usize,
    entity: &EntityDocument,
    index: &BTreeMap<&str, &EntityDocument>,
    report: &mut ValidationReport,
) {
    let base = format!("/entities/{idx}");

    if entity.columns.is_empty() && !entity.fake {
        report.push(ValidationIssue::error(
            "columns_empty",
            format!("{base}/columns"),
            format!("entity '{}' declares no columns", entity.mneo),
        ));
    }

    let mut seen = BTreeSet::new();
    for (col_idx, column) in entity.columns.iter().enumerate() {
        let path = format!("{base}/columns/{col_idx}");
        if !seen.insert(column.name.as_str()) {
            report.push(ValidationIssue::error(
                "duplicate_column",
                format!("{path}/name"),
                format!("column '{}' is declared twice", column.name),
            ));
        }
        validate_column(&path, column, report);
    }

    if !entity.fake && !entity.columns.iter().any(is_primary_key) {
        report.push(
            ValidationIssue::error(
                "missing_primary_key",
                format!("{base}/columns"),
                format!("entity '{}' has no primary key column", entity.mneo),
            )
            .with_hint("declare a column with \"role\": \"pk\""),
        );
    }

    let known = |name: &str| name == LAST_UPDATE_COLUMN || seen.contains(name);
    let mut check = |path: String, name: &str, owner: &str| {
        if !known(name) {
            report.push(ValidationIssue::error(
                "unknown_column",
                path,
                format!("{owner} references unknown column '{name}'"),
            ));
        }
    };

    for (fk_idx, fk) in entity.foreign_keys.iter().enumerate() {
        let fk_path = format!("{base}/foreign_keys/{fk_idx}");
        let owner = format!("foreign key '{}'", fk.name);
        for (map_idx, mapping) in fk.mappings.iter().enumerate() {
            check(
                format!("{fk_path}/mappings/{map_idx}/child"),
                &mapping.child,
                &owner,
            );
        }
    }
    for (ix_idx, ix) in entity.indexes.iter().enumerate() {
        let owner = format!("index '{}'", ix.name);
        for (pos, name) in ix.columns.iter().enumerate() {
            check(format!("{base}/indexes/{ix_idx}/columns/{pos}"), name, &owner);
        }
        for (pos, name) in ix.include.iter().enumerate() {
            check(format!("{base}/indexes/{ix_idx}/include/{pos}"), name, &owner);
        }
    }
    for (uq_idx, unique) in entity.unique.iter().enumerate() {
        let owner = format!("unique constraint '{}'", unique.name);
        for (pos, name) in unique.columns.iter().enumerate() {
            check(format!("{base}/unique/{uq_idx}/columns/{pos}"), name, &owner);
        }
    }
    for (pr_idx, procedure) in entity.procedures.iter().enumerate() {
        let owner = format!("procedure '{}'", procedure.name);
        for (pos, parm) in procedure.parms.iter().enumerate() {
            check(
                format!("{base}/procedures/{pr_idx}/parms/{pos}/column"),
                &parm.column,
                &owner,
            );
        }
    }
    for (vw_idx, view) in entity.views.iter().enumerate() {
        let vw_path = format!("{base}/views/{vw_idx}");
        let owner = format!("view '{}'", view.name);
        check(format!("{vw_path}/browsing_key"), &view.browsing_key, &owner);
        for (pos, name) in view.filters.iter().enumerate() {
            check(format!("{vw_path}/filters/{pos}"), name, &owner);
        }
        for (pos, key) in view.compound_keys.iter().enumerate() {
            check(format!("{vw_path}/compound_keys/{pos}/column"), &key.column, &owner);
        }
        for (pos, name) in view.likeable.iter().flatten().enumerate() {
            check(format!("{vw_path}/likeable/{pos}"), name, &owner);
        }
    }

    for (fk_idx, fk) in entity.foreign_keys.iter().enumerate() {
        let fk_path = format!("{base}/foreign_keys/{fk_idx}");
        let Some(parent) = index.get(fk.parent.as_str()) else {
            report.push(ValidationIssue::error(
                "unknown_parent",
                format!("{fk_path}/parent"),
                format!(
                    "foreign key '{}' references unknown entity '{}'",
                    fk.name, fk.parent
                ),
            ));
            continue;
        };
        for (map_idx, mapping) in fk.mappings.iter().enumerate() {
            if !parent.columns.iter().any(|column| column.name == mapping.parent) {
                report.push(ValidationIssue::error(
                    "unknown_column",
                    format!("{fk_path}/mappings/{map_idx}/parent"),
                    format!(
                        "foreign key '{}' references unknown column '{}' of '{}'",
                        fk.name, mapping.parent, parent.mneo
                    ),
                ));
            }
        }
        if !fk.lookups.is_empty() && !has_description_column(parent) {
            report.push(
                ValidationIssue::warning(
                    "no_description_column",
                    format!("{fk_path}/lookups"),
                    format!(
                        "entity '{}' has no description column; its lookups are skipped",
                        parent.mneo
                    ),
                )
                .with_hint("declare a varchar/nvarchar column of size 0 or at least 80"),
            );
        }
    }

    for (pr_idx, procedure) in entity.procedures.iter().enumerate() {
        if procedure.lookup && !has_description_column(entity) {
            report.push(ValidationIssue::warning(
                "no_description_column",
                format!("{base}/procedures/{pr_idx}/lookup"),
                format!(
                    "lookup procedure '{}' is skipped: entity '{}' has no description column",
                    procedure.name, entity.mneo
                ),
            ));
        }
    }
}

fn validate_column(path: &str, column: &ColumnDocument, report: &mut ValidationReport) {
    if column.category.is_some() && column.status.is_some() {
        report.push(ValidationIssue::error(
            "conflicting_domain",
            path.to_string(),
            format!(
                "column '{}' relates to both a category and a status",
                column.name
            ),
        ));
    }

    if column.array && column.category.is_none() && column.status.is_none() {
        report.push(
            ValidationIssue::error(
                "array_without_domain",
                format!("{path}/array"),
                format!("array column '{}' has no category or status", column.name),
            )
            .with_hint("arrays are resolved through a category or status satellite"),
        );
    }

    let prefix = column.sql_type.prefix();
    if !column.name.starts_with(prefix) {
        report.push(ValidationIssue::warning(
            "prefix_mismatch",
            format!("{path}/name"),
            format!(
                "column '{}' of type {} does not start with '{prefix}'",
                column.name, column.sql_type
            ),
        ));
    }

    if column.sql_type.has_size() && column.size.is_none() && !column.array {
        report.push(ValidationIssue::warning(
            "size_defaulted",
            format!("{path}/size"),
            format!("column '{}' has no size and defaults to max", column.name),
        ));
    }
}

fn is_primary_key(column: &ColumnDocument) -> bool {
    match &column.flags {
        Some(flags) => flags.contains(&FlagName::Pk),
        None => column.role == ColumnRole::Pk,
    }
}

fn is_fake_column(column: &ColumnDocument) -> bool {
    column.category.is_some()
        || column.status.is_some()
        || column
            .flags
            .as_ref()
            .is_some_and(|flags| flags.contains(&FlagName::Fake))
}

fn has_description_column(entity: &EntityDocument) -> bool {
    entity.columns.iter().any(|column| {
        !is_fake_column(column)
            && matches!(
                column.sql_type,
                SqlType::VarChar | SqlType::NVarChar | SqlType::Text
            )
            && column.size.is_none_or(|size| size == 0 || size >= 80)
    })
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}
