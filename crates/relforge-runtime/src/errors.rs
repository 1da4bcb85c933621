use thiserror::Error;

/// Errors raised while preparing or interpreting a procedure call.
///
/// Business outcomes (record changed, validation failures reported by the
/// procedure itself) are not errors; see `ProcedureOutcome`.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("entity '{0}' is not in the catalog")]
    UnknownEntity(String),
    #[error("entity '{entity}' has no procedure or view named '{name}'")]
    UnknownProcedure { entity: String, name: String },
    #[error("'{procedure}' has no parameter for column '{column}'")]
    UnknownParameter { procedure: String, column: String },
    #[error("'{procedure}' uses readonly locks and cannot run inside an open transaction")]
    TransactionActive { procedure: String },
    #[error("parameter '{parameter}' of '{procedure}': {source}")]
    TypeMismatch {
        procedure: String,
        parameter: String,
        #[source]
        source: relforge_core::Error,
    },
    #[error("claim '{claim}' required by '{procedure}' is not available")]
    MissingClaim { procedure: String, claim: String },
    #[error("entity '{entity}' has no description column to look up")]
    NoDescriptionColumn { entity: String },
    #[error("result of '{procedure}' does not match its schema: {reason}")]
    ResultShape { procedure: String, reason: String },
    #[error("executor error: {0}")]
    Executor(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
