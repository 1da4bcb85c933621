use std::collections::BTreeMap;

use async_trait::async_trait;
use relforge_core::{SqlType, Value};
use serde::Serialize;

use crate::errors::Result;

/// Bound value of one procedure parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlParameter {
    /// Name including the leading `@`.
    pub name: String,
    pub sql_type: SqlType,
    pub value: Value,
}

/// A fully prepared `EXEC` of a generated procedure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureCall {
    /// Schema-qualified, bracketed name (`[dbo].[pers_get]`).
    pub procedure: String,
    pub parameters: Vec<SqlParameter>,
    pub readonly_locks: bool,
}

impl ProcedureCall {
    pub fn parameter(&self, name: &str) -> Option<&SqlParameter> {
        self.parameters.iter().find(|parm| parm.name == name)
    }
}

/// Rows as returned by the database, columns in select order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }

    /// Rows keyed by column name.
    pub fn records(&self) -> Vec<BTreeMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }
}

/// Runs prepared calls against SQL Server.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Whether the caller currently owns an open transaction.
    fn in_transaction(&self) -> bool;

    /// Execute the call and return its first result set.
    async fn execute(&self, call: &ProcedureCall) -> Result<ResultSet>;
}

/// Supplies the audit values of the current caller (the web user).
pub trait ClaimsSource: Send + Sync {
    fn claim(&self, name: &str) -> Option<Value>;
}

/// Fixed claim set.
#[derive(Debug, Clone, Default)]
pub struct StaticClaims {
    claims: BTreeMap<String, Value>,
}

impl StaticClaims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }
}

impl ClaimsSource for StaticClaims {
    fn claim(&self, name: &str) -> Option<Value> {
        self.claims.get(name).cloned()
    }
}
