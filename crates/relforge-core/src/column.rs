use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::flags::ColumnFlags;
use crate::types::{ClrType, SqlType, ValueKind};
use crate::value::Value;

/// Satellite domain a fake column resolves through.
///
/// Category and status ids are mutually exclusive by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "domain", content = "id", rename_all = "snake_case")]
pub enum RelatedDomain {
    Category(String),
    Status(String),
}

impl RelatedDomain {
    pub fn id(&self) -> &str {
        match self {
            RelatedDomain::Category(id) | RelatedDomain::Status(id) => id.as_str(),
        }
    }
}

/// Host types usable with [`Column::typed`].
pub trait ClrValue {
    const KIND: ValueKind;
    const NULLABLE: bool = false;
}

macro_rules! clr_value {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(impl ClrValue for $ty {
            const KIND: ValueKind = ValueKind::$kind;
        })*
    };
}

clr_value! {
    bool => Bool,
    u8 => Byte,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Single,
    f64 => Double,
    String => String,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    NaiveTime => TimeSpan,
    Uuid => Guid,
    Vec<u8> => Bytes,
    Vec<String> => StringArray,
}

impl<T: ClrValue> ClrValue for Option<T> {
    const KIND: ValueKind = T::KIND;
    const NULLABLE: bool = true;
}

/// Immutable description of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    name: String,
    clr: ClrType,
    sql_type: SqlType,
    size: u32,
    precision: u8,
    scale: u8,
    nullable: bool,
    encrypted: bool,
    array: bool,
    flags: ColumnFlags,
    related: Option<RelatedDomain>,
    override_with: Option<String>,
}

impl Column {
    /// Start a column of the given SQL type with default flags.
    pub fn builder(name: impl Into<String>, sql_type: SqlType) -> ColumnBuilder {
        ColumnBuilder::new(name.into(), sql_type)
    }

    /// Column whose SQL type is the canonical mapping of `T`.
    pub fn typed<T: ClrValue>(name: impl Into<String>) -> ColumnBuilder {
        let mut builder = ColumnBuilder::new(name.into(), T::KIND.to_sql_db_type());
        builder.clr = Some(T::KIND);
        builder.nullable = T::NULLABLE;
        if T::KIND == ValueKind::StringArray {
            builder.array = true;
        }
        builder
    }

    pub fn char(name: impl Into<String>, size: u32) -> ColumnBuilder {
        Self::builder(name, SqlType::Char).size(size)
    }

    pub fn varchar(name: impl Into<String>, size: u32) -> ColumnBuilder {
        Self::builder(name, SqlType::VarChar).size(size)
    }

    pub fn nvarchar(name: impl Into<String>, size: u32) -> ColumnBuilder {
        Self::builder(name, SqlType::NVarChar).size(size)
    }

    pub fn text(name: impl Into<String>) -> ColumnBuilder {
        Self::builder(name, SqlType::Text)
    }

    /// Primary-key column (Get, Insert, Delete, PK).
    pub fn pk(name: impl Into<String>, sql_type: SqlType) -> ColumnBuilder {
        Self::builder(name, sql_type).flags(ColumnFlags::PRIMARY_KEY)
    }

    /// Foreign-key column (default flags plus FK).
    pub fn fk(name: impl Into<String>, sql_type: SqlType) -> ColumnBuilder {
        Self::builder(name, sql_type).add_flags(ColumnFlags::FK)
    }

    /// Single-valued fake column resolved through `<table>_cat`.
    pub fn category(name: impl Into<String>, category_id: impl Into<String>) -> ColumnBuilder {
        Self::varchar(name, 20).category_id(category_id)
    }

    /// Multi-valued fake column carried as a JSON string array.
    pub fn category_array(
        name: impl Into<String>,
        category_id: impl Into<String>,
    ) -> ColumnBuilder {
        Self::nvarchar(name, 0).array().category_id(category_id)
    }

    /// Single-valued fake column resolved through `<table>_status`.
    pub fn status(name: impl Into<String>, status_id: impl Into<String>) -> ColumnBuilder {
        Self::varchar(name, 20).status_id(status_id)
    }

    pub fn status_array(name: impl Into<String>, status_id: impl Into<String>) -> ColumnBuilder {
        Self::nvarchar(name, 0).array().status_id(status_id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clr_type(&self) -> ClrType {
        self.clr
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    /// Declared size; 0 means `max` (or not applicable).
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn is_array(&self) -> bool {
        self.array
    }

    pub fn flags(&self) -> ColumnFlags {
        self.flags
    }

    pub fn has(&self, flag: ColumnFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn is_pk(&self) -> bool {
        self.has(ColumnFlags::PK)
    }

    pub fn is_fake(&self) -> bool {
        self.has(ColumnFlags::FAKE)
    }

    pub fn is_autonum(&self) -> bool {
        self.has(ColumnFlags::AUTONUM)
    }

    pub fn related(&self) -> Option<&RelatedDomain> {
        self.related.as_ref()
    }

    pub fn related_category_id(&self) -> Option<&str> {
        match &self.related {
            Some(RelatedDomain::Category(id)) => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn related_status_id(&self) -> Option<&str> {
        match &self.related {
            Some(RelatedDomain::Status(id)) => Some(id.as_str()),
            _ => None,
        }
    }

    /// Claim whose runtime value replaces this column's value before execution.
    pub fn override_with(&self) -> Option<&str> {
        self.override_with.as_deref()
    }

    /// SQL parameter name without the leading `@` (`c_status_id` -> `status_id`).
    pub fn parameter_name(&self) -> &str {
        match self.name.strip_prefix(self.sql_type.prefix()) {
            Some(rest) if !rest.is_empty() => rest,
            _ => &self.name,
        }
    }

    /// Copy of this column with all storage/role flags removed, for use as a
    /// procedure parameter template.
    pub fn stripped(&self) -> Column {
        let mut column = self.clone();
        column.flags = self.flags - ColumnFlags::STORAGE;
        column
    }

    /// Enforce SQL-type compatibility of a runtime value.
    pub fn check_value(&self, value: &Value) -> Result<()> {
        let Some(kind) = value.kind() else {
            return Ok(());
        };
        if kind == self.clr.kind || self.sql_type.is_type_accepted(kind) {
            return Ok(());
        }
        Err(Error::TypeMismatch {
            column: self.name.clone(),
            sql_type: self.sql_type,
            kind,
        })
    }
}

/// Builder for [`Column`]; all checks run in [`ColumnBuilder::build`].
#[derive(Debug, Clone)]
pub struct ColumnBuilder {
    name: String,
    sql_type: SqlType,
    clr: Option<ValueKind>,
    size: u32,
    precision: u8,
    scale: u8,
    nullable: bool,
    encrypted: bool,
    array: bool,
    flags: ColumnFlags,
    related: Option<RelatedDomain>,
    override_with: Option<String>,
    errors: Vec<Error>,
}

impl ColumnBuilder {
    fn new(name: String, sql_type: SqlType) -> Self {
        let (precision, scale) = if sql_type.has_precision() {
            (18, 0)
        } else {
            (0, 0)
        };
        Self {
            name,
            sql_type,
            clr: None,
            size: 0,
            precision,
            scale,
            nullable: false,
            encrypted: false,
            array: false,
            flags: ColumnFlags::DEFAULT,
            related: None,
            override_with: None,
            errors: Vec::new(),
        }
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    /// Fractional-second scale for `datetime2`/`time`/`datetimeoffset`.
    pub fn scale(mut self, scale: u8) -> Self {
        self.scale = scale;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    pub fn array(mut self) -> Self {
        self.array = true;
        self.clr = Some(ValueKind::StringArray);
        self
    }

    pub fn clr(mut self, kind: ValueKind) -> Self {
        self.clr = Some(kind);
        self
    }

    /// Replace the flag set.
    pub fn flags(mut self, flags: ColumnFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn add_flags(mut self, flags: ColumnFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn remove_flags(mut self, flags: ColumnFlags) -> Self {
        self.flags -= flags;
        self
    }

    pub fn autonum(self) -> Self {
        self.add_flags(ColumnFlags::AUTONUM)
    }

    pub fn fake(self) -> Self {
        self.add_flags(ColumnFlags::FAKE)
    }

    pub fn category_id(mut self, id: impl Into<String>) -> Self {
        self.set_related(RelatedDomain::Category(id.into()), "related_category_id");
        self.flags |= ColumnFlags::FAKE;
        self
    }

    pub fn status_id(mut self, id: impl Into<String>) -> Self {
        self.set_related(RelatedDomain::Status(id.into()), "related_status_id");
        self.flags |= ColumnFlags::FAKE;
        self
    }

    pub fn override_with(mut self, claim: impl Into<String>) -> Self {
        if self.override_with.is_some() {
            self.errors.push(Error::ImmutableField {
                owner: self.name.clone(),
                field: "override_with".to_string(),
            });
        } else {
            self.override_with = Some(claim.into());
        }
        self
    }

    fn set_related(&mut self, related: RelatedDomain, field: &str) {
        match &self.related {
            None => self.related = Some(related),
            Some(existing)
                if std::mem::discriminant(existing) == std::mem::discriminant(&related) =>
            {
                self.errors.push(Error::ImmutableField {
                    owner: self.name.clone(),
                    field: field.to_string(),
                });
            }
            Some(_) => self.errors.push(Error::InvalidDefinition(format!(
                "column '{}' cannot relate to both a category and a status",
                self.name
            ))),
        }
    }

    pub fn build(self) -> Result<Column> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }

        if self.name.trim().is_empty() || self.name.chars().any(char::is_whitespace) {
            return Err(Error::InvalidDefinition(format!(
                "invalid column name '{}'",
                self.name
            )));
        }

        let kind = self.clr.unwrap_or_else(|| self.sql_type.to_clr_type());
        if !self.sql_type.is_type_accepted(kind) {
            return Err(Error::TypeMismatch {
                column: self.name,
                sql_type: self.sql_type,
                kind,
            });
        }

        if self.array && (self.sql_type != SqlType::NVarChar || self.related.is_none()) {
            return Err(Error::InvalidDefinition(format!(
                "array column '{}' must be an nvarchar category or status column",
                self.name
            )));
        }

        if self.flags.contains(ColumnFlags::FAKE)
            && self
                .flags
                .intersects(ColumnFlags::PK | ColumnFlags::FK | ColumnFlags::AUTONUM)
        {
            return Err(Error::InvalidDefinition(format!(
                "fake column '{}' cannot be a key or autonum",
                self.name
            )));
        }

        if self.sql_type.has_precision() && self.scale > self.precision {
            return Err(Error::InvalidDefinition(format!(
                "column '{}' has scale {} greater than precision {}",
                self.name, self.scale, self.precision
            )));
        }

        // keys are never nullable
        let nullable = self.nullable && !self.flags.contains(ColumnFlags::PK);

        Ok(Column {
            name: self.name,
            clr: ClrType::new(kind, nullable),
            sql_type: self.sql_type,
            size: self.size,
            precision: self.precision,
            scale: self.scale,
            nullable,
            encrypted: self.encrypted,
            array: self.array,
            flags: self.flags,
            related: self.related,
            override_with: self.override_with,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_name_strips_type_prefix() {
        let column = Column::char("c_status_id", 10).build().unwrap();
        assert_eq!(column.parameter_name(), "status_id");

        let column = Column::builder("dt_lu", SqlType::DateTime).build().unwrap();
        assert_eq!(column.parameter_name(), "lu");

        let column = Column::builder("amount", SqlType::Decimal).build().unwrap();
        assert_eq!(column.parameter_name(), "amount");
    }

    #[test]
    fn char_factory_rejects_non_string_kinds() {
        let err = Column::char("c_code", 4)
            .clr(ValueKind::Int32)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { ref column, .. } if column == "c_code"));
    }

    #[test]
    fn typed_columns_use_canonical_sql_type() {
        let column = Column::typed::<Option<i32>>("i_age").build().unwrap();
        assert_eq!(column.sql_type(), SqlType::Int);
        assert!(column.is_nullable());
        assert_eq!(column.clr_type().kind, ValueKind::Int32);
    }

    #[test]
    fn category_and_status_are_exclusive() {
        let err = Column::category("c_kind", "CAT1")
            .status_id("ST1")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDefinition(_)));

        let err = Column::category("c_kind", "CAT1")
            .category_id("CAT2")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::ImmutableField { .. }));
    }

    #[test]
    fn override_with_is_write_once() {
        let err = Column::varchar("vc_web_user", 50)
            .override_with("web_user")
            .override_with("other")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            Error::ImmutableField {
                owner: "vc_web_user".to_string(),
                field: "override_with".to_string(),
            }
        );
    }

    #[test]
    fn check_value_names_offending_column() {
        let column = Column::builder("i_qty", SqlType::Int).build().unwrap();
        assert!(column.check_value(&Value::Int32(3)).is_ok());
        assert!(column.check_value(&Value::Null).is_ok());
        let err = column.check_value(&Value::from("three")).unwrap_err();
        assert!(err.to_string().contains("i_qty"));
    }

    #[test]
    fn stripped_template_keeps_type_but_drops_roles() {
        let column = Column::pk("c_persona_id", SqlType::Char)
            .size(20)
            .autonum()
            .build()
            .unwrap();
        let template = column.stripped();
        assert!(template.flags().is_empty());
        assert_eq!(template.size(), 20);
        assert_eq!(template.parameter_name(), "persona_id");
    }

    #[test]
    fn primary_keys_are_never_nullable() {
        let column = Column::pk("c_id", SqlType::Char)
            .size(10)
            .nullable()
            .build()
            .unwrap();
        assert!(!column.is_nullable());
    }
}
