//! T-SQL generation for relforge entities.
//!
//! This crate turns an `EntityCatalog` into deterministic SQL Server scripts:
//! tables with their category/status satellites, the `_get`, `_update`,
//! `_drop` and `_lookup` procedures, browsing views, grants and the shared
//! support objects.

pub mod alias;
pub mod engine;
pub mod errors;
pub mod generators;
pub mod model;
pub mod output;
pub mod skeletons;
pub mod template;

pub use alias::AliasAllocator;
pub use engine::{GenerationOutput, SqlGenerator};
pub use errors::GenerationError;
pub use generators::EntityContext;
pub use model::{EntityReport, GenerateOptions, GeneratedScript, GenerationReport, ScriptKind};
pub use output::{ManifestEntry, ScriptManifest, write_scripts};
pub use template::{TemplateValues, remove_empty_lines, render, replace_template};
