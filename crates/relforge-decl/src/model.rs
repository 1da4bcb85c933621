use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use relforge_core::{DomainRegistry, SqlType, ValueKind};

/// Current contract version of catalog documents.
pub const CATALOG_VERSION: &str = "1";

/// A set of entity declarations plus the shared value domains.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CatalogDocument {
    /// Contract version of the document format.
    pub catalog_version: String,
    /// Category/status values tables; defaults apply when omitted.
    #[serde(default)]
    pub domains: DomainRegistry,
    pub entities: Vec<EntityDocument>,
}

/// One entity: table, columns, relationships and extra objects.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EntityDocument {
    /// Short mnemonic prefixing every generated object (`pers`).
    pub mneo: String,
    pub table: String,
    /// Metadata-only entity without a table.
    #[serde(default, skip_serializing_if = "is_false")]
    pub fake: bool,
    /// Emit `_iupdate` plus a transaction-owning `_update` wrapper.
    #[serde(default, skip_serializing_if = "is_false")]
    pub split_update: bool,
    /// Emit `_idrop` plus a transaction-owning `_drop` wrapper.
    #[serde(default, skip_serializing_if = "is_false")]
    pub split_drop: bool,
    pub columns: Vec<ColumnDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKeyDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique: Vec<UniqueDocument>,
    /// Additional procedures; the standard ones are always present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub procedures: Vec<ProcedureDocument>,
    /// Browsing views; `Standard` is added when none is declared.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<ViewDocument>,
}

/// Role presets mirroring the column factories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    /// Get, insert and update.
    #[default]
    Plain,
    /// Get, insert, delete and primary key.
    Pk,
    /// Plain flags plus foreign key.
    Fk,
}

/// Individually selectable column flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlagName {
    Get,
    Insert,
    Update,
    Delete,
    Pk,
    Fk,
    Autonum,
    Fake,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ColumnDocument {
    /// Column name carrying its type prefix (`vc_name`).
    pub name: String,
    pub sql_type: SqlType,
    /// Character/binary length; 0 or omitted means `max`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u8>,
    #[serde(default)]
    pub role: ColumnRole,
    /// Replaces the role's flags entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<Vec<FlagName>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub encrypted: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub autonum: bool,
    /// JSON string array resolved through the satellite table.
    #[serde(default, skip_serializing_if = "is_false")]
    pub array: bool,
    /// Category domain id; makes the column fake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Status domain id; makes the column fake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Host value kind when it differs from the type's canonical one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clr: Option<ValueKind>,
    /// Claim whose value replaces the parameter at execution time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_with: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ColumnMappingDocument {
    pub parent: String,
    pub child: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LookupDocument {
    pub name: String,
    pub view: String,
    pub procedure: String,
    #[serde(default)]
    pub id_column_index: usize,
    #[serde(default = "default_description_index")]
    pub description_column_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_parameter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compound_key_group: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ForeignKeyDocument {
    pub name: String,
    /// Mnemonic of the referenced entity.
    pub parent: String,
    /// Explicit column pairs; empty joins by primary key names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mappings: Vec<ColumnMappingDocument>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub fake: bool,
    #[serde(default = "default_true")]
    pub create_index: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lookups: Vec<LookupDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct IndexDocument {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UniqueDocument {
    pub name: String,
    pub columns: Vec<String>,
}

/// Procedure parameter: an entity column, optionally stripped of its
/// storage flags.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ParmDocument {
    pub column: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strip: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ProcedureDocument {
    pub name: String,
    #[serde(default)]
    pub parms: Vec<ParmDocument>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub readonly_locks: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub lookup: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub import: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CompoundKeyDocument {
    pub column: String,
    pub group: String,
    pub position: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ViewDocument {
    /// Suffix of `{mneo}_brw{name}`.
    pub name: String,
    /// Equality filters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
    pub browsing_key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compound_keys: Vec<CompoundKeyDocument>,
    /// Columns searched by `@like`; derived from the projection when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likeable: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub readonly_locks: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn default_true() -> bool {
    true
}

fn default_description_index() -> usize {
    1
}
