use thiserror::Error;

/// Errors emitted while turning entity metadata into SQL text.
///
/// These are generator invariant violations: they name the offending entity
/// or procedure and never depend on runtime data.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("procedure '{procedure}' is not a lookup procedure")]
    NotALookup { procedure: String },
    #[error("entity '{entity}' has no description column for lookups")]
    NoDescriptionColumn { entity: String },
    #[error("template token '{{{token}}}' has no value")]
    UnresolvedToken { token: String },
    #[error("procedure '{procedure}' selects {actual} columns but metadata expects {expected}")]
    ColumnCountMismatch {
        procedure: String,
        expected: usize,
        actual: usize,
    },
    #[error("procedure '{procedure}' of entity '{entity}' does not receive the whole primary key")]
    MissingPrimaryKey { entity: String, procedure: String },
    #[error("procedure '{procedure}' requires parameter '@{parameter}'")]
    MissingParameter { procedure: String, parameter: String },
    #[error("view '{view}': {reason}")]
    InvalidView { view: String, reason: String },
    #[error("template engine: {0}")]
    Template(String),
    #[error(transparent)]
    Metadata(#[from] relforge_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
