//! Declarative catalog documents: contracts, JSON Schema and validation.

pub mod convert;
pub mod errors;
pub mod model;
pub mod schema;
pub mod validate;

pub use convert::{column_builder, entity_builder};
pub use errors::{DeclError, IssueSeverity, Result, ValidationIssue, ValidationReport};
pub use model::{
    CATALOG_VERSION, CatalogDocument, ColumnDocument, ColumnMappingDocument, ColumnRole,
    CompoundKeyDocument, EntityDocument, FlagName, ForeignKeyDocument, IndexDocument,
    LookupDocument, ParmDocument, ProcedureDocument, UniqueDocument, ViewDocument,
};
pub use schema::catalog_json_schema;
pub use validate::{
    ValidatedCatalog, build_catalog, load_catalog, validate_catalog_json, validate_document,
};
