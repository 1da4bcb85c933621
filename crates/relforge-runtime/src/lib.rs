//! Execution-layer interface for generated procedures.
//!
//! The crate prepares calls (parameter binding, claim overrides, the
//! readonly-lock precondition), hands them to a [`SqlExecutor`] and checks
//! what comes back against the shape the generator emitted.

pub mod call;
pub mod client;
pub mod errors;
pub mod executor;
pub mod schema;
pub mod status;

pub use call::{Arguments, prepare_call, qualified_name};
pub use client::{BrowseRequest, Direction, EntityClient, Record};
pub use errors::{Result, RuntimeError};
pub use executor::{
    ClaimsSource, ProcedureCall, ResultSet, SqlExecutor, SqlParameter, StaticClaims,
};
pub use schema::{ResultColumn, ResultSchema};
pub use status::{ProcedureOutcome, StatusCode};
