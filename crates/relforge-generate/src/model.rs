use std::fmt;

use serde::{Deserialize, Serialize};

/// Options for the SQL generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerateOptions {
    /// SQL schema owning every generated object.
    pub schema: String,
    /// `TOP (n)` applied by browsing views.
    pub view_row_limit: u32,
    /// Procedure allocating the next number for a mnemonic.
    pub numbering_procedure: String,
    /// Table-valued function splitting `@like` into search phrases.
    pub phrase_function: String,
    /// Column encryption key used for encrypted columns.
    pub encryption_key: String,
    /// Roles granted EXECUTE on every generated procedure.
    pub grant_roles: Vec<String>,
    /// Emit `<table>_cat` / `<table>_status` DDL with the entity table.
    pub emit_satellites: bool,
    /// Emit the values tables, numbering objects and phrase function.
    pub emit_support: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            schema: "dbo".to_string(),
            view_row_limit: 500,
            numbering_procedure: "sp_next_number".to_string(),
            phrase_function: "fn_split_phrases".to_string(),
            encryption_key: "CEK_Auto1".to_string(),
            grant_roles: Vec::new(),
            emit_satellites: true,
            emit_support: true,
        }
    }
}

/// Family of a generated script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    Support,
    Table,
    Get,
    InnerUpdate,
    Update,
    InnerDrop,
    Drop,
    Lookup,
    View,
    /// Foreign keys added once every table exists.
    ForeignKey,
    Security,
}

impl ScriptKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScriptKind::Support => "support",
            ScriptKind::Table => "table",
            ScriptKind::Get => "get",
            ScriptKind::InnerUpdate => "inner_update",
            ScriptKind::Update => "update",
            ScriptKind::InnerDrop => "inner_drop",
            ScriptKind::Drop => "drop",
            ScriptKind::Lookup => "lookup",
            ScriptKind::View => "view",
            ScriptKind::ForeignKey => "foreign_key",
            ScriptKind::Security => "security",
        }
    }

    /// Whether the script creates a procedure that receives grants.
    pub fn is_procedure(self) -> bool {
        !matches!(
            self,
            ScriptKind::Support
                | ScriptKind::Table
                | ScriptKind::ForeignKey
                | ScriptKind::Security
        )
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One SQL script, named after the object it creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedScript {
    /// Owning entity mnemonic; `None` for shared support objects.
    pub entity: Option<String>,
    pub object_name: String,
    pub kind: ScriptKind,
    pub sql: String,
}

impl GeneratedScript {
    pub fn new(
        entity: Option<&str>,
        object_name: impl Into<String>,
        kind: ScriptKind,
        sql: String,
    ) -> Self {
        Self {
            entity: entity.map(str::to_string),
            object_name: object_name.into(),
            kind,
            sql,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.sql", self.object_name)
    }
}

/// Per-entity summary of a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityReport {
    pub mneo: String,
    pub table: String,
    pub scripts: usize,
    /// Fake entities produce nothing.
    pub skipped: bool,
}

/// Report for a generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationReport {
    pub entities: Vec<EntityReport>,
    pub scripts_total: usize,
    /// Foreign keys moved out of CREATE TABLE because they close a cycle.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deferred_foreign_keys: Vec<String>,
    pub duration_ms: u64,
}

impl GenerationReport {
    pub fn record_entity(&mut self, report: EntityReport) {
        self.scripts_total += report.scripts;
        self.entities.push(report);
    }

    /// Count the deferred constraint script of `mneo`.
    pub fn record_deferred(&mut self, mneo: &str, foreign_keys: impl IntoIterator<Item = String>) {
        if let Some(entity) = self.entities.iter_mut().find(|entity| entity.mneo == mneo) {
            entity.scripts += 1;
        }
        self.scripts_total += 1;
        self.deferred_foreign_keys.extend(foreign_keys);
    }
}
