use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// SQL Server column types understood by the generator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    BigInt,
    Binary,
    Bit,
    Char,
    Date,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Decimal,
    Float,
    Image,
    Int,
    Money,
    NChar,
    NText,
    NVarChar,
    Real,
    SmallDateTime,
    SmallInt,
    SmallMoney,
    Text,
    Time,
    TinyInt,
    UniqueIdentifier,
    VarBinary,
    VarChar,
    Xml,
}

/// Host-side value kinds (the CLR side of the mapping).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Bool,
    Byte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    String,
    DateTime,
    DateTimeOffset,
    TimeSpan,
    Guid,
    Bytes,
    StringArray,
}

/// A value kind together with its nullability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClrType {
    pub kind: ValueKind,
    pub nullable: bool,
}

impl ClrType {
    pub fn new(kind: ValueKind, nullable: bool) -> Self {
        Self { kind, nullable }
    }
}

impl ValueKind {
    pub const ALL: [ValueKind; 15] = [
        ValueKind::Bool,
        ValueKind::Byte,
        ValueKind::Int16,
        ValueKind::Int32,
        ValueKind::Int64,
        ValueKind::Single,
        ValueKind::Double,
        ValueKind::Decimal,
        ValueKind::String,
        ValueKind::DateTime,
        ValueKind::DateTimeOffset,
        ValueKind::TimeSpan,
        ValueKind::Guid,
        ValueKind::Bytes,
        ValueKind::StringArray,
    ];

    /// SQL types able to store this kind; the first entry is canonical.
    pub fn sql_candidates(self) -> &'static [SqlType] {
        match self {
            ValueKind::Bool => &[SqlType::Bit],
            ValueKind::Byte => &[SqlType::TinyInt],
            ValueKind::Int16 => &[SqlType::SmallInt],
            ValueKind::Int32 => &[SqlType::Int],
            ValueKind::Int64 => &[SqlType::BigInt],
            ValueKind::Single => &[SqlType::Real],
            ValueKind::Double => &[SqlType::Float],
            ValueKind::Decimal => &[SqlType::Decimal, SqlType::Money, SqlType::SmallMoney],
            ValueKind::String => &[
                SqlType::NVarChar,
                SqlType::VarChar,
                SqlType::Char,
                SqlType::NChar,
                SqlType::Text,
                SqlType::NText,
                SqlType::Xml,
            ],
            ValueKind::DateTime => &[
                SqlType::DateTime,
                SqlType::DateTime2,
                SqlType::Date,
                SqlType::SmallDateTime,
            ],
            ValueKind::DateTimeOffset => &[SqlType::DateTimeOffset],
            ValueKind::TimeSpan => &[SqlType::Time],
            ValueKind::Guid => &[SqlType::UniqueIdentifier],
            ValueKind::Bytes => &[SqlType::VarBinary, SqlType::Binary, SqlType::Image],
            ValueKind::StringArray => &[SqlType::NVarChar],
        }
    }

    /// Canonical SQL type for this kind.
    ///
    /// Callers that need a non-canonical type (e.g. `Char` for a string)
    /// must name the SQL type explicitly.
    pub fn to_sql_db_type(self) -> SqlType {
        self.sql_candidates()[0]
    }

    pub fn is_string(self) -> bool {
        matches!(self, ValueKind::String | ValueKind::StringArray)
    }
}

impl SqlType {
    pub const ALL: [SqlType; 27] = [
        SqlType::BigInt,
        SqlType::Binary,
        SqlType::Bit,
        SqlType::Char,
        SqlType::Date,
        SqlType::DateTime,
        SqlType::DateTime2,
        SqlType::DateTimeOffset,
        SqlType::Decimal,
        SqlType::Float,
        SqlType::Image,
        SqlType::Int,
        SqlType::Money,
        SqlType::NChar,
        SqlType::NText,
        SqlType::NVarChar,
        SqlType::Real,
        SqlType::SmallDateTime,
        SqlType::SmallInt,
        SqlType::SmallMoney,
        SqlType::Text,
        SqlType::Time,
        SqlType::TinyInt,
        SqlType::UniqueIdentifier,
        SqlType::VarBinary,
        SqlType::VarChar,
        SqlType::Xml,
    ];

    /// T-SQL keyword for the type, without size arguments.
    pub fn keyword(self) -> &'static str {
        match self {
            SqlType::BigInt => "bigint",
            SqlType::Binary => "binary",
            SqlType::Bit => "bit",
            SqlType::Char => "char",
            SqlType::Date => "date",
            SqlType::DateTime => "datetime",
            SqlType::DateTime2 => "datetime2",
            SqlType::DateTimeOffset => "datetimeoffset",
            SqlType::Decimal => "decimal",
            SqlType::Float => "float",
            SqlType::Image => "image",
            SqlType::Int => "int",
            SqlType::Money => "money",
            SqlType::NChar => "nchar",
            SqlType::NText => "ntext",
            SqlType::NVarChar => "nvarchar",
            SqlType::Real => "real",
            SqlType::SmallDateTime => "smalldatetime",
            SqlType::SmallInt => "smallint",
            SqlType::SmallMoney => "smallmoney",
            SqlType::Text => "text",
            SqlType::Time => "time",
            SqlType::TinyInt => "tinyint",
            SqlType::UniqueIdentifier => "uniqueidentifier",
            SqlType::VarBinary => "varbinary",
            SqlType::VarChar => "varchar",
            SqlType::Xml => "xml",
        }
    }

    /// Naming-convention prefix for columns of this type (`vc_` for VarChar).
    pub fn prefix(self) -> &'static str {
        match self {
            SqlType::BigInt => "bi_",
            SqlType::Binary => "bin_",
            SqlType::Bit => "b_",
            SqlType::Char => "c_",
            SqlType::Date => "d_",
            SqlType::DateTime => "dt_",
            SqlType::DateTime2 => "dt2_",
            SqlType::DateTimeOffset => "dto_",
            SqlType::Decimal => "de_",
            SqlType::Float => "f_",
            SqlType::Image => "img_",
            SqlType::Int => "i_",
            SqlType::Money => "m_",
            SqlType::NChar => "nc_",
            SqlType::NText => "nt_",
            SqlType::NVarChar => "nvc_",
            SqlType::Real => "r_",
            SqlType::SmallDateTime => "sdt_",
            SqlType::SmallInt => "si_",
            SqlType::SmallMoney => "sm_",
            SqlType::Text => "t_",
            SqlType::Time => "tm_",
            SqlType::TinyInt => "ti_",
            SqlType::UniqueIdentifier => "ui_",
            SqlType::VarBinary => "vb_",
            SqlType::VarChar => "vc_",
            SqlType::Xml => "x_",
        }
    }

    /// Whether `kind` may be assigned to a column of this type.
    pub fn is_type_accepted(self, kind: ValueKind) -> bool {
        kind.sql_candidates().contains(&self)
    }

    /// Host kind read back from a column of this type.
    pub fn to_clr_type(self) -> ValueKind {
        ValueKind::ALL
            .into_iter()
            .find(|kind| kind.sql_candidates().contains(&self))
            .unwrap_or(ValueKind::String)
    }

    pub fn to_nullable_clr_type(self) -> ClrType {
        ClrType::new(self.to_clr_type(), true)
    }

    pub fn is_character(self) -> bool {
        matches!(
            self,
            SqlType::Char
                | SqlType::NChar
                | SqlType::VarChar
                | SqlType::NVarChar
                | SqlType::Text
                | SqlType::NText
        )
    }

    pub fn is_unicode(self) -> bool {
        matches!(self, SqlType::NChar | SqlType::NVarChar | SqlType::NText)
    }

    /// Types that take a `(size)` argument; size 0 renders as `max` when allowed.
    pub fn has_size(self) -> bool {
        matches!(
            self,
            SqlType::Char
                | SqlType::NChar
                | SqlType::VarChar
                | SqlType::NVarChar
                | SqlType::Binary
                | SqlType::VarBinary
        )
    }

    pub fn allows_max(self) -> bool {
        matches!(self, SqlType::VarChar | SqlType::NVarChar | SqlType::VarBinary)
    }

    pub fn has_precision(self) -> bool {
        matches!(self, SqlType::Decimal)
    }

    /// Types with fractional-second scale (`datetime2(7)`).
    pub fn has_fractional_scale(self) -> bool {
        matches!(
            self,
            SqlType::DateTime2 | SqlType::DateTimeOffset | SqlType::Time
        )
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_mapping_uses_first_candidate() {
        assert_eq!(ValueKind::String.to_sql_db_type(), SqlType::NVarChar);
        assert_eq!(ValueKind::Int32.to_sql_db_type(), SqlType::Int);
        assert_eq!(ValueKind::DateTime.to_sql_db_type(), SqlType::DateTime);
    }

    #[test]
    fn every_sql_type_maps_back_to_an_accepting_kind() {
        for sql_type in SqlType::ALL {
            let kind = sql_type.to_clr_type();
            assert!(
                sql_type.is_type_accepted(kind),
                "{sql_type} should accept {kind}"
            );
            assert!(sql_type.to_nullable_clr_type().nullable);
        }
    }

    #[test]
    fn string_kinds_are_rejected_by_numeric_types() {
        assert!(!SqlType::Int.is_type_accepted(ValueKind::String));
        assert!(SqlType::Char.is_type_accepted(ValueKind::String));
        assert!(SqlType::NVarChar.is_type_accepted(ValueKind::StringArray));
        assert!(!SqlType::VarChar.is_type_accepted(ValueKind::StringArray));
    }

    #[test]
    fn prefixes_are_unique() {
        let mut seen = std::collections::BTreeSet::new();
        for sql_type in SqlType::ALL {
            assert!(seen.insert(sql_type.prefix()), "{sql_type} prefix reused");
        }
        assert_eq!(SqlType::VarChar.prefix(), "vc_");
    }
}
