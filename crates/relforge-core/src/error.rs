use thiserror::Error;

use crate::types::{SqlType, ValueKind};

/// Metadata construction errors shared across relforge crates.
///
/// Every variant is raised while an entity definition is being built, never
/// while SQL is generated or executed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A write-once field was assigned twice.
    #[error("field '{field}' of '{owner}' can only be set once")]
    ImmutableField { owner: String, field: String },
    /// Two columns of the same entity share a name.
    #[error("duplicate column '{column}' in entity '{entity}'")]
    DuplicateColumn { entity: String, column: String },
    /// A procedure or view registered the same parameter twice.
    #[error("duplicate parameter '{parameter}' in '{procedure}'")]
    DuplicateParameter { procedure: String, parameter: String },
    /// A deferred reference names a column the entity does not have.
    #[error("column '{column}' referenced by '{owner}' does not exist in entity '{entity}'")]
    MissingColumn {
        entity: String,
        owner: String,
        column: String,
    },
    /// No join condition could be derived for a foreign key.
    #[error(
        "cannot resolve foreign key '{name}' from '{child}' to '{parent}': {reason} (you may need to map columns)"
    )]
    UnresolvedForeignKey {
        name: String,
        parent: String,
        child: String,
        reason: String,
    },
    /// A value (or declared CLR kind) is not accepted by the column's SQL type.
    #[error("column '{column}' of type {sql_type} does not accept values of kind {kind}")]
    TypeMismatch {
        column: String,
        sql_type: SqlType,
        kind: ValueKind,
    },
    /// The definition violates a structural invariant.
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),
}

/// Convenience alias for results returned by relforge crates.
pub type Result<T> = std::result::Result<T, Error>;
