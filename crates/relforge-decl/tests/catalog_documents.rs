use std::fs;
use std::path::Path;

use relforge_core::{ColumnFlags, ProcedureKind};
use relforge_decl::{catalog_json_schema, load_catalog, validate_catalog_json};
use serde_json::{Value, json};

fn load_json(path: &Path) -> Value {
    let contents =
        fs::read_to_string(path).unwrap_or_else(|_| panic!("missing json at {}", path.display()));
    serde_json::from_str(&contents).expect("parse json")
}

fn schema() -> Value {
    serde_json::to_value(catalog_json_schema()).expect("schema to json")
}

fn sample() -> Value {
    load_json(&Path::new(env!("CARGO_MANIFEST_DIR")).join("../../entities/crm.entities.json"))
}

#[test]
fn sample_catalog_loads_without_warnings() {
    let validated = load_catalog(&sample(), &schema()).expect("catalog should load");
    assert!(validated.warnings.is_empty(), "{:?}", validated.warnings);

    let catalog = validated.catalog;
    assert_eq!(catalog.len(), 2);

    let persona = catalog.get("pers").expect("pers entity");
    assert!(persona.split_update() && persona.split_drop());
    assert_eq!(persona.autonum_column().map(|c| c.name()), Some("c_persona_id"));
    assert!(persona.column("nvc_tags").unwrap().is_array());
    assert!(persona.column("vc_state").unwrap().has(ColumnFlags::FAKE));
    assert_eq!(persona.foreign_keys()[0].lookups().len(), 1);
    assert!(persona.views().iter().any(|view| view.name() == "pers_brwStandard"));

    let empresa = catalog.get("emp").expect("emp entity");
    assert!(empresa.standard_procedure(ProcedureKind::Lookup).is_some());
    assert_eq!(empresa.description_column().map(|c| c.name()), Some("vc_name"));
}

#[test]
fn unknown_fields_are_schema_violations() {
    let mut document = sample();
    document["entities"][0]["columns"][0]["colour"] = json!("red");

    let report = validate_catalog_json(&document, &schema()).unwrap();
    assert!(!report.is_ok());
    assert!(report.errors.iter().all(|issue| issue.code == "schema_violation"));
    assert!(
        report
            .errors
            .iter()
            .any(|issue| issue.path == "/entities/0/columns/0"),
        "{:?}",
        report.errors
    );
}

#[test]
fn dangling_references_stop_loading() {
    let mut document = sample();
    document["entities"][1]["foreign_keys"][0]["parent"] = json!("cli");
    document["entities"][1]["indexes"][0]["columns"] = json!(["vc_surname"]);

    let report = load_catalog(&document, &schema()).unwrap_err();
    let codes: Vec<&str> = report.errors.iter().map(|issue| issue.code.as_str()).collect();
    assert_eq!(codes, ["unknown_column", "unknown_parent"]);
    assert_eq!(report.errors[0].path, "/entities/1/indexes/0/columns/0");
}

#[test]
fn unresolvable_lookup_is_an_invalid_catalog() {
    let mut document = sample();
    document["entities"][1]["foreign_keys"][0]["lookups"][0]["procedure"] = json!("emp_find");

    let report = load_catalog(&document, &schema()).unwrap_err();
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].code, "invalid_catalog");
    assert!(report.errors[0].message.contains("emp_find"));
}
