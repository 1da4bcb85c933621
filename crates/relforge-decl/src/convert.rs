//! Conversion of declaration documents into core builders.

use relforge_core::{
    Column, ColumnBuilder, ColumnFlags, EntityBuilder, EntityDefinition, EntityForeignKey,
    EntityIndex, EntityLookup, EntityUniqueConstraint, ProcedureBuilder, ViewBuilder,
};

use crate::model::{
    ColumnDocument, ColumnRole, EntityDocument, FlagName, ForeignKeyDocument, LookupDocument,
    ProcedureDocument, ViewDocument,
};

impl FlagName {
    pub fn flag(self) -> ColumnFlags {
        match self {
            FlagName::Get => ColumnFlags::GET,
            FlagName::Insert => ColumnFlags::INSERT,
            FlagName::Update => ColumnFlags::UPDATE,
            FlagName::Delete => ColumnFlags::DELETE,
            FlagName::Pk => ColumnFlags::PK,
            FlagName::Fk => ColumnFlags::FK,
            FlagName::Autonum => ColumnFlags::AUTONUM,
            FlagName::Fake => ColumnFlags::FAKE,
        }
    }
}

pub fn column_builder(doc: &ColumnDocument) -> ColumnBuilder {
    let mut builder = match doc.role {
        ColumnRole::Plain => Column::builder(doc.name.as_str(), doc.sql_type),
        ColumnRole::Pk => Column::pk(doc.name.as_str(), doc.sql_type),
        ColumnRole::Fk => Column::fk(doc.name.as_str(), doc.sql_type),
    };
    // explicit flags replace the role preset; the toggles below still apply
    if let Some(flags) = &doc.flags {
        let flags = flags
            .iter()
            .fold(ColumnFlags::empty(), |acc, flag| acc | flag.flag());
        builder = builder.flags(flags);
    }
    if let Some(size) = doc.size {
        builder = builder.size(size);
    }
    match (doc.precision, doc.scale) {
        (Some(precision), scale) => builder = builder.precision(precision, scale.unwrap_or(0)),
        (None, Some(scale)) => builder = builder.scale(scale),
        (None, None) => {}
    }
    if doc.nullable {
        builder = builder.nullable();
    }
    if doc.encrypted {
        builder = builder.encrypted();
    }
    if doc.array {
        builder = builder.array();
    }
    if doc.autonum {
        builder = builder.autonum();
    }
    if let Some(id) = &doc.category {
        builder = builder.category_id(id.as_str());
    }
    if let Some(id) = &doc.status {
        builder = builder.status_id(id.as_str());
    }
    if let Some(kind) = doc.clr {
        builder = builder.clr(kind);
    }
    if let Some(claim) = &doc.override_with {
        builder = builder.override_with(claim.as_str());
    }
    builder
}

fn lookup(doc: &LookupDocument) -> EntityLookup {
    let mut lookup = EntityLookup::new(doc.name.as_str(), doc.view.as_str(), doc.procedure.as_str())
        .columns(doc.id_column_index, doc.description_column_index);
    if let Some(parameter) = &doc.key_parameter {
        lookup = lookup.key_parameter(parameter.as_str());
    }
    if let Some(group) = &doc.compound_key_group {
        lookup = lookup.compound_key_group(group.as_str());
    }
    lookup
}

fn foreign_key(doc: &ForeignKeyDocument) -> relforge_core::ForeignKeyBuilder {
    let mut builder = EntityForeignKey::builder(doc.name.as_str(), doc.parent.as_str());
    for mapping in &doc.mappings {
        builder = builder.map(mapping.parent.as_str(), mapping.child.as_str());
    }
    if doc.fake {
        builder = builder.fake();
    }
    if !doc.create_index {
        builder = builder.do_not_create_index();
    }
    for entry in &doc.lookups {
        builder = builder.lookup(lookup(entry));
    }
    builder
}

fn procedure(doc: &ProcedureDocument) -> ProcedureBuilder {
    let mut builder = ProcedureBuilder::new(doc.name.as_str());
    for parm in &doc.parms {
        builder = if parm.strip {
            builder.parm_ref_stripped(parm.column.as_str())
        } else {
            builder.parm_ref(parm.column.as_str())
        };
    }
    if doc.readonly_locks {
        builder = builder.readonly_locks();
    }
    if doc.lookup {
        builder = builder.lookup();
    }
    if doc.import {
        builder = builder.import();
    }
    builder
}

fn view(doc: &ViewDocument) -> ViewBuilder {
    let mut builder = ViewBuilder::new(doc.name.as_str());
    for filter in &doc.filters {
        builder = builder.filter(filter.as_str());
    }
    for key in &doc.compound_keys {
        builder = builder.compound(key.column.as_str(), key.group.as_str(), key.position);
    }
    builder = builder.browsing_key(doc.browsing_key.as_str());
    if let Some(likeable) = &doc.likeable {
        builder = builder.likeable(likeable.iter().map(String::as_str));
    }
    builder.readonly_locks(doc.readonly_locks)
}

/// Entity builder carrying every declaration of `doc`.
pub fn entity_builder(doc: &EntityDocument) -> EntityBuilder {
    let mut builder = EntityDefinition::builder(doc.mneo.as_str(), doc.table.as_str());
    if doc.fake {
        builder = builder.fake();
    }
    if doc.split_update {
        builder = builder.split_update();
    }
    if doc.split_drop {
        builder = builder.split_drop();
    }
    for column in &doc.columns {
        builder = builder.column(column_builder(column));
    }
    for fk in &doc.foreign_keys {
        builder = builder.foreign_key(foreign_key(fk));
    }
    for index in &doc.indexes {
        builder = builder.index(
            EntityIndex::new(index.name.as_str(), index.columns.iter().map(String::as_str))
                .include(index.include.iter().map(String::as_str)),
        );
    }
    for unique in &doc.unique {
        builder = builder.unique(EntityUniqueConstraint::new(
            unique.name.as_str(),
            unique.columns.iter().map(String::as_str),
        ));
    }
    for entry in &doc.procedures {
        builder = builder.procedure(procedure(entry));
    }
    for entry in &doc.views {
        builder = builder.view(view(entry));
    }
    builder
}
