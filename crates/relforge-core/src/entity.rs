use std::collections::BTreeSet;

use serde::Serialize;

use crate::column::{Column, ColumnBuilder, RelatedDomain};
use crate::error::{Error, Result};
use crate::flags::ColumnFlags;
use crate::procedure::{ProcedureBuilder, ProcedureDefinition};
use crate::relationship::{
    EntityForeignKey, EntityIndex, EntityUniqueConstraint, ForeignKeyBuilder,
};
use crate::types::SqlType;
use crate::view::{ViewBuilder, ViewDefinition};

/// Last-update timestamp carried in metadata and used as the concurrency token.
pub const LAST_UPDATE_COLUMN: &str = "dt_lu";
/// Parameter-only column feeding the audit web-user columns.
pub const WEB_USER_COLUMN: &str = "vc_web_user";
/// Claim whose value overrides [`WEB_USER_COLUMN`].
pub const WEB_USER_CLAIM: &str = "web_user";

/// Audit columns stored in every generated table besides [`LAST_UPDATE_COLUMN`].
pub const AUDIT_COLUMNS: [(&str, SqlType, u32); 5] = [
    ("dt_insert", SqlType::DateTime, 0),
    ("vc_insert_web_user", SqlType::VarChar, 50),
    ("vc_insert_login", SqlType::VarChar, 128),
    ("vc_lu_web_user", SqlType::VarChar, 50),
    ("vc_lu_login", SqlType::VarChar, 128),
];

/// Which standard procedure of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureKind {
    Get,
    Update,
    InnerUpdate,
    Drop,
    InnerDrop,
    Lookup,
}

impl ProcedureKind {
    pub fn suffix(self) -> &'static str {
        match self {
            ProcedureKind::Get => "get",
            ProcedureKind::Update => "update",
            ProcedureKind::InnerUpdate => "iupdate",
            ProcedureKind::Drop => "drop",
            ProcedureKind::InnerDrop => "idrop",
            ProcedureKind::Lookup => "lookup",
        }
    }
}

/// Anything that can become a column at build time.
pub trait IntoColumn {
    fn into_column(self) -> Result<Column>;
}

impl IntoColumn for Column {
    fn into_column(self) -> Result<Column> {
        Ok(self)
    }
}

impl IntoColumn for ColumnBuilder {
    fn into_column(self) -> Result<Column> {
        self.build()
    }
}

/// The metadata aggregate of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityDefinition {
    mneo: String,
    table_name: String,
    fake: bool,
    split_update: bool,
    split_drop: bool,
    columns: Vec<Column>,
    procedures: Vec<ProcedureDefinition>,
    views: Vec<ViewDefinition>,
    foreign_keys: Vec<EntityForeignKey>,
    indexes: Vec<EntityIndex>,
    unique_constraints: Vec<EntityUniqueConstraint>,
    related_categories: BTreeSet<String>,
    related_status: BTreeSet<String>,
}

impl EntityDefinition {
    pub fn builder(mneo: impl Into<String>, table_name: impl Into<String>) -> EntityBuilder {
        EntityBuilder {
            mneo: mneo.into(),
            table_name: table_name.into(),
            fake: false,
            split_update: false,
            split_drop: false,
            columns: Vec::new(),
            procedures: Vec::new(),
            views: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            unique_constraints: Vec::new(),
        }
    }

    pub fn mneo(&self) -> &str {
        &self.mneo
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Purely virtual entities produce no SQL.
    pub fn is_fake(&self) -> bool {
        self.fake
    }

    /// Whether `_update` wraps a transaction-composable `_iupdate`.
    pub fn split_update(&self) -> bool {
        self.split_update
    }

    pub fn split_drop(&self) -> bool {
        self.split_drop
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name() == name)
    }

    pub fn primary_key(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|column| column.is_pk())
    }

    /// Columns flagged with `flag`, in declaration order.
    pub fn columns_with(&self, flag: ColumnFlags) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(move |column| column.has(flag))
    }

    /// Columns physically stored in the entity table.
    pub fn stored_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|column| !column.is_fake())
    }

    pub fn fake_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|column| column.is_fake())
    }

    pub fn autonum_column(&self) -> Option<&Column> {
        self.columns.iter().find(|column| column.is_autonum())
    }

    pub fn last_update_column(&self) -> Option<&Column> {
        self.column(LAST_UPDATE_COLUMN)
    }

    pub fn related_categories(&self) -> &BTreeSet<String> {
        &self.related_categories
    }

    pub fn related_status(&self) -> &BTreeSet<String> {
        &self.related_status
    }

    pub fn procedures(&self) -> &[ProcedureDefinition] {
        &self.procedures
    }

    pub fn procedure(&self, name: &str) -> Option<&ProcedureDefinition> {
        self.procedures
            .iter()
            .find(|procedure| procedure.name() == name)
    }

    /// `{mneo}_{suffix}` name of a standard procedure.
    pub fn object_name(&self, kind: ProcedureKind) -> String {
        format!("{}_{}", self.mneo, kind.suffix())
    }

    pub fn standard_procedure(&self, kind: ProcedureKind) -> Option<&ProcedureDefinition> {
        let name = match kind {
            ProcedureKind::InnerUpdate => self.object_name(ProcedureKind::Update),
            ProcedureKind::InnerDrop => self.object_name(ProcedureKind::Drop),
            _ => self.object_name(kind),
        };
        self.procedure(&name)
    }

    pub fn views(&self) -> &[ViewDefinition] {
        &self.views
    }

    pub fn view(&self, name: &str) -> Option<&ViewDefinition> {
        self.views.iter().find(|view| view.name() == name)
    }

    pub fn foreign_keys(&self) -> &[EntityForeignKey] {
        &self.foreign_keys
    }

    pub fn indexes(&self) -> &[EntityIndex] {
        &self.indexes
    }

    pub fn unique_constraints(&self) -> &[EntityUniqueConstraint] {
        &self.unique_constraints
    }

    /// Column rendered by lookups: the first non-fake varchar/nvarchar/text
    /// column declared with size 0 (max) or at least 80.
    pub fn description_column(&self) -> Option<&Column> {
        self.columns.iter().find(|column| {
            !column.is_fake()
                && matches!(
                    column.sql_type(),
                    SqlType::VarChar | SqlType::NVarChar | SqlType::Text
                )
                && (column.size() == 0 || column.size() >= 80)
        })
    }
}

/// Builder collecting an entity's metadata; everything is validated in `build`.
#[derive(Debug)]
pub struct EntityBuilder {
    mneo: String,
    table_name: String,
    fake: bool,
    split_update: bool,
    split_drop: bool,
    columns: Vec<Result<Column>>,
    procedures: Vec<ProcedureBuilder>,
    views: Vec<ViewBuilder>,
    foreign_keys: Vec<ForeignKeyBuilder>,
    indexes: Vec<EntityIndex>,
    unique_constraints: Vec<EntityUniqueConstraint>,
}

impl EntityBuilder {
    pub fn column(mut self, column: impl IntoColumn) -> Self {
        self.columns.push(column.into_column());
        self
    }

    pub fn fake(mut self) -> Self {
        self.fake = true;
        self
    }

    pub fn split_update(mut self) -> Self {
        self.split_update = true;
        self
    }

    pub fn split_drop(mut self) -> Self {
        self.split_drop = true;
        self
    }

    pub fn procedure(mut self, procedure: ProcedureBuilder) -> Self {
        self.procedures.push(procedure);
        self
    }

    pub fn view(mut self, view: ViewBuilder) -> Self {
        self.views.push(view);
        self
    }

    pub fn foreign_key(mut self, foreign_key: ForeignKeyBuilder) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn index(mut self, index: EntityIndex) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn unique(mut self, constraint: EntityUniqueConstraint) -> Self {
        self.unique_constraints.push(constraint);
        self
    }

    pub fn build(self) -> Result<EntityDefinition> {
        validate_identifier("mnemonic", &self.mneo)?;
        validate_identifier("table name", &self.table_name)?;

        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        let mut names = BTreeSet::new();
        for column in self.columns {
            let column = column?;
            if !names.insert(column.name().to_string()) {
                return Err(Error::DuplicateColumn {
                    entity: self.mneo.clone(),
                    column: column.name().to_string(),
                });
            }
            columns.push(column);
        }

        if !self.fake {
            match columns.iter().find(|column| column.name() == LAST_UPDATE_COLUMN) {
                Some(column) if column.sql_type() != SqlType::DateTime => {
                    return Err(Error::InvalidDefinition(format!(
                        "'{LAST_UPDATE_COLUMN}' of entity '{}' must be a datetime",
                        self.mneo
                    )));
                }
                Some(_) => {}
                None => columns.push(last_update_column()?),
            }
        }

        let autonums = columns.iter().filter(|column| column.is_autonum()).count();
        if autonums > 1 {
            return Err(Error::InvalidDefinition(format!(
                "entity '{}' declares {autonums} autonum columns, at most one is allowed",
                self.mneo
            )));
        }

        let mut related_categories = BTreeSet::new();
        let mut related_status = BTreeSet::new();
        for column in columns.iter().filter(|column| column.is_fake()) {
            let inserted = match column.related() {
                Some(RelatedDomain::Category(id)) => related_categories.insert(id.clone()),
                Some(RelatedDomain::Status(id)) => related_status.insert(id.clone()),
                None => true,
            };
            if !inserted {
                return Err(Error::InvalidDefinition(format!(
                    "entity '{}' relates more than one column to '{}'",
                    self.mneo,
                    column.related().map(RelatedDomain::id).unwrap_or_default()
                )));
            }
        }

        let has_pk = columns.iter().any(Column::is_pk);
        if !self.fake && !has_pk {
            return Err(Error::InvalidDefinition(format!(
                "entity '{}' has no primary key",
                self.mneo
            )));
        }

        for index in &self.indexes {
            check_key_columns(&self.mneo, &index.name, &columns, &index.columns)?;
            check_key_columns(&self.mneo, &index.name, &columns, &index.include)?;
        }
        for constraint in &self.unique_constraints {
            check_key_columns(&self.mneo, &constraint.name, &columns, &constraint.columns)?;
        }

        let mut procedure_builders = Vec::new();
        if !self.fake {
            procedure_builders.extend(standard_procedures(&self.mneo, &columns)?);
        }
        procedure_builders.extend(self.procedures);

        let mut procedure_names = BTreeSet::new();
        let mut procedures = Vec::with_capacity(procedure_builders.len());
        for builder in procedure_builders {
            if !procedure_names.insert(builder.name().to_string()) {
                return Err(Error::InvalidDefinition(format!(
                    "duplicate procedure '{}' in entity '{}'",
                    builder.name(),
                    self.mneo
                )));
            }
            procedures.push(builder.resolve(&self.mneo, &columns)?);
        }

        // every stored entity browses through `_brwStandard`, declared or not
        let mut view_builders = Vec::with_capacity(self.views.len() + 1);
        if !self.fake && !self.views.iter().any(|view| view.name() == STANDARD_VIEW) {
            view_builders.push(standard_view(&columns));
        }
        view_builders.extend(self.views);
        let mut views: Vec<ViewDefinition> = Vec::with_capacity(view_builders.len());
        for builder in view_builders {
            let view = builder.resolve(&self.mneo, &columns)?;
            if !procedure_names.insert(view.name().to_string()) {
                return Err(Error::InvalidDefinition(format!(
                    "duplicate view '{}' in entity '{}'",
                    view.name(),
                    self.mneo
                )));
            }
            views.push(view);
        }

        let mut fk_names = BTreeSet::new();
        let mut foreign_keys = Vec::with_capacity(self.foreign_keys.len());
        for builder in self.foreign_keys {
            let fk = builder.attach(&self.mneo, &columns)?;
            if !fk_names.insert(fk.name().to_string()) {
                return Err(Error::InvalidDefinition(format!(
                    "duplicate foreign key '{}' in entity '{}'",
                    fk.name(),
                    self.mneo
                )));
            }
            foreign_keys.push(fk);
        }

        Ok(EntityDefinition {
            mneo: self.mneo,
            table_name: self.table_name,
            fake: self.fake,
            split_update: self.split_update,
            split_drop: self.split_drop,
            columns,
            procedures,
            views,
            foreign_keys,
            indexes: self.indexes,
            unique_constraints: self.unique_constraints,
            related_categories,
            related_status,
        })
    }
}

fn validate_identifier(what: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidDefinition(format!("invalid {what} '{value}'")))
    }
}

fn check_key_columns(
    entity: &str,
    owner: &str,
    columns: &[Column],
    names: &[String],
) -> Result<()> {
    for name in names {
        match columns.iter().find(|column| column.name() == name) {
            Some(column) if column.is_fake() => {
                return Err(Error::InvalidDefinition(format!(
                    "'{owner}' of entity '{entity}' cannot use fake column '{name}'"
                )));
            }
            Some(_) => {}
            None => {
                return Err(Error::MissingColumn {
                    entity: entity.to_string(),
                    owner: owner.to_string(),
                    column: name.clone(),
                });
            }
        }
    }
    Ok(())
}

fn last_update_column() -> Result<Column> {
    Column::builder(LAST_UPDATE_COLUMN, SqlType::DateTime)
        .nullable()
        .flags(ColumnFlags::GET | ColumnFlags::INSERT)
        .build()
}

fn web_user_column() -> Result<Column> {
    Ok(Column::varchar(WEB_USER_COLUMN, 50)
        .nullable()
        .override_with(WEB_USER_CLAIM)
        .build()?
        .stripped())
}

fn standard_procedures(mneo: &str, columns: &[Column]) -> Result<Vec<ProcedureBuilder>> {
    let name = |kind: ProcedureKind| format!("{mneo}_{}", kind.suffix());
    let pk: Vec<&Column> = columns.iter().filter(|column| column.is_pk()).collect();

    let mut get = ProcedureBuilder::new(name(ProcedureKind::Get));
    let mut lookup = ProcedureBuilder::new(name(ProcedureKind::Lookup)).lookup();
    for column in &pk {
        get = get.parm_ref(column.name());
        lookup = lookup.parm_ref(column.name());
    }

    let mut update = ProcedureBuilder::new(name(ProcedureKind::Update));
    for column in columns.iter().filter(|column| column.has(ColumnFlags::INSERT)) {
        update = update.parm_ref(column.name());
    }
    update = update.parm(web_user_column()?);

    let mut drop = ProcedureBuilder::new(name(ProcedureKind::Drop));
    for column in columns.iter().filter(|column| column.has(ColumnFlags::DELETE)) {
        drop = drop.parm_ref(column.name());
    }

    Ok(vec![get, update, drop, lookup])
}

/// Suffix of the browsing view every stored entity exposes.
pub const STANDARD_VIEW: &str = "Standard";

fn standard_view(columns: &[Column]) -> ViewBuilder {
    let pk: Vec<&Column> = columns.iter().filter(|column| column.is_pk()).collect();
    let mut view = ViewBuilder::new(STANDARD_VIEW);
    if let Some((browsing, parents)) = pk.split_last() {
        for column in parents {
            view = view.filter(column.name());
        }
        view = view.browsing_key(browsing.name());
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::EntityForeignKey;

    fn persona() -> EntityBuilder {
        EntityDefinition::builder("pers", "personas")
            .column(Column::pk("c_persona_id", SqlType::Char).size(20).autonum())
            .column(Column::varchar("vc_name", 80))
            .column(Column::category("vc_kind", "CAT1").nullable())
    }

    #[test]
    fn builds_standard_procedures_and_view() {
        let entity = persona().build().unwrap();
        let names: Vec<&str> = entity.procedures().iter().map(|p| p.name()).collect();
        assert_eq!(names, ["pers_get", "pers_update", "pers_drop", "pers_lookup"]);
        assert_eq!(entity.views()[0].name(), "pers_brwStandard");
        assert!(entity.standard_procedure(ProcedureKind::Lookup).unwrap().is_lookup());

        let update = entity.standard_procedure(ProcedureKind::Update).unwrap();
        let parms: Vec<&str> = update.parms().iter().map(|c| c.parameter_name()).collect();
        assert_eq!(parms, ["persona_id", "name", "kind", "lu", "web_user"]);
        assert_eq!(update.parms()[4].override_with(), Some(WEB_USER_CLAIM));
    }

    #[test]
    fn custom_views_keep_the_standard_view() {
        let entity = persona()
            .view(ViewBuilder::new("ByName").browsing_key("vc_name"))
            .build()
            .unwrap();
        let names: Vec<&str> = entity.views().iter().map(|view| view.name()).collect();
        assert_eq!(names, ["pers_brwStandard", "pers_brwByName"]);
    }

    #[test]
    fn declared_standard_view_replaces_the_default() {
        let entity = persona()
            .view(ViewBuilder::new(STANDARD_VIEW).browsing_key("c_persona_id").likeable(["vc_name"]))
            .build()
            .unwrap();
        assert_eq!(entity.views().len(), 1);
        assert_eq!(entity.views()[0].name(), "pers_brwStandard");
    }

    #[test]
    fn tracks_related_categories_and_autonum() {
        let entity = persona().build().unwrap();
        assert!(entity.related_categories().contains("CAT1"));
        assert!(entity.related_status().is_empty());
        assert_eq!(entity.autonum_column().unwrap().name(), "c_persona_id");
        assert_eq!(entity.last_update_column().unwrap().name(), LAST_UPDATE_COLUMN);
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = persona()
            .column(Column::varchar("vc_name", 10))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn { .. }));
    }

    #[test]
    fn rejects_second_autonum() {
        let err = persona()
            .column(Column::builder("i_seq", SqlType::Int).autonum())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDefinition(_)));
    }

    #[test]
    fn description_column_skips_short_and_fake_columns() {
        let entity = EntityDefinition::builder("prod", "productos")
            .column(Column::pk("c_prod_id", SqlType::Char).size(10))
            .column(Column::varchar("vc_code", 20))
            .column(Column::nvarchar("nvc_title", 120))
            .build()
            .unwrap();
        assert_eq!(entity.description_column().unwrap().name(), "nvc_title");
    }

    #[test]
    fn fake_entities_get_no_procedures() {
        let entity = EntityDefinition::builder("calc", "calc")
            .fake()
            .column(Column::varchar("vc_label", 80))
            .build()
            .unwrap();
        assert!(entity.procedures().is_empty());
        assert!(entity.views().is_empty());
        assert!(entity.last_update_column().is_none());
    }

    #[test]
    fn foreign_key_mappings_must_name_child_columns() {
        let err = persona()
            .foreign_key(EntityForeignKey::builder("fk_pers_emp", "emp").map("c_emp_id", "c_missing"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn { .. }));
    }
}
