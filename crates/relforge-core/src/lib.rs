//! Core metadata contracts for relforge.
//!
//! This crate defines the column, entity, relationship, procedure and view
//! descriptors that the generator reads, together with the category/status
//! domain registry, the entity catalog and catalog validation helpers.

pub mod catalog;
pub mod column;
pub mod domain;
pub mod entity;
pub mod error;
pub mod flags;
pub mod graph;
pub mod procedure;
pub mod relationship;
pub mod types;
pub mod validation;
pub mod value;
pub mod view;

pub use catalog::{EntityCatalog, ForeignKeyJoin};
pub use column::{ClrValue, Column, ColumnBuilder, RelatedDomain};
pub use domain::{DomainRegistry, SatelliteDomain, SatelliteKind};
pub use entity::{
    AUDIT_COLUMNS, EntityBuilder, EntityDefinition, IntoColumn, LAST_UPDATE_COLUMN, ProcedureKind,
    STANDARD_VIEW, WEB_USER_CLAIM, WEB_USER_COLUMN,
};
pub use error::{Error, Result};
pub use flags::ColumnFlags;
pub use graph::{FkGraphReport, FkGraphSummary, build_fk_graph_report, creation_order};
pub use procedure::{ProcedureBuilder, ProcedureDefinition};
pub use relationship::{
    ColumnMapping, EntityForeignKey, EntityIndex, EntityLookup, EntityUniqueConstraint,
    ForeignKeyBuilder,
};
pub use types::{ClrType, SqlType, ValueKind};
pub use validation::validate_catalog;
pub use value::Value;
pub use view::{LIKE_PARAMETER, MODE_PARAMETER, ViewBuilder, ViewDefinition, ViewParm};
