//! Column and type rendering shared by every generator.

use relforge_core::{Column, SqlType};

use super::security::encryption_clause;

/// `[name]` with `]` escaped.
pub fn quote(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// `'text'` with quotes doubled.
pub fn string_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// `N'text'` with quotes doubled.
pub fn unicode_literal(text: &str) -> String {
    format!("N{}", string_literal(text))
}

pub fn parameter(column: &Column) -> String {
    format!("@{}", column.parameter_name())
}

/// Type with size, precision or scale arguments.
pub fn type_decl(column: &Column) -> String {
    let sql_type = column.sql_type();
    let keyword = sql_type.keyword();
    if column.is_array() {
        return "nvarchar(max)".to_string();
    }
    if sql_type.has_size() {
        return match column.size() {
            0 if sql_type.allows_max() => format!("{keyword}(max)"),
            0 => format!("{keyword}(1)"),
            size => format!("{keyword}({size})"),
        };
    }
    if sql_type.has_precision() {
        return format!("{keyword}({},{})", column.precision(), column.scale());
    }
    if sql_type.has_fractional_scale() && column.scale() > 0 {
        return format!("{keyword}({})", column.scale());
    }
    keyword.to_string()
}

/// `@name type = NULL`; every parameter is optional so the procedure can
/// report missing values through its status row.
pub fn parameter_decl(column: &Column) -> String {
    format!("{} {} = NULL", parameter(column), type_decl(column))
}

/// Indented, comma separated parameter block.
pub fn parameter_block<'a, I>(columns: I, trailing: &[&str]) -> String
where
    I: IntoIterator<Item = &'a Column>,
{
    columns
        .into_iter()
        .map(parameter_decl)
        .chain(trailing.iter().map(|extra| extra.to_string()))
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join(",\n")
}

/// Column definition for CREATE TABLE.
pub fn column_decl(column: &Column, encryption_key: &str) -> String {
    let mut decl = format!("{} {}", quote(column.name()), type_decl(column));
    if column.is_encrypted() {
        decl.push(' ');
        decl.push_str(&encryption_clause(column, encryption_key));
    }
    decl.push_str(if column.is_nullable() {
        " NULL"
    } else {
        " NOT NULL"
    });
    decl
}

/// Character parameters where `''` counts as missing.
pub fn is_blankable(column: &Column) -> bool {
    matches!(
        column.sql_type(),
        SqlType::Char | SqlType::NChar | SqlType::VarChar | SqlType::NVarChar
    ) && !column.is_encrypted()
        && !column.is_array()
}

/// Expression normalised for case-insensitive search.
pub fn searchable_text(expression: &str) -> String {
    format!("LOWER(LTRIM(RTRIM(ISNULL(CONVERT(nvarchar(max), {expression}), N''))))")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_sizes_precision_and_max() {
        let cases = [
            (Column::varchar("vc_name", 80).build().unwrap(), "varchar(80)"),
            (Column::nvarchar("nvc_notes", 0).build().unwrap(), "nvarchar(max)"),
            (
                Column::builder("de_price", SqlType::Decimal)
                    .precision(12, 2)
                    .build()
                    .unwrap(),
                "decimal(12,2)",
            ),
            (
                Column::builder("dt2_at", SqlType::DateTime2)
                    .scale(3)
                    .build()
                    .unwrap(),
                "datetime2(3)",
            ),
            (Column::builder("i_qty", SqlType::Int).build().unwrap(), "int"),
        ];
        for (column, expected) in cases {
            assert_eq!(type_decl(&column), expected);
        }
    }

    #[test]
    fn literals_double_quotes() {
        assert_eq!(string_literal("O'Neil"), "'O''Neil'");
        assert_eq!(unicode_literal("a"), "N'a'");
        assert_eq!(quote("we]ird"), "[we]]ird]");
    }

    #[test]
    fn parameter_block_appends_outputs() {
        let id = Column::char("c_persona_id", 20).build().unwrap();
        let block = parameter_block([&id], &["@status int OUTPUT"]);
        assert_eq!(block, "    @persona_id char(20) = NULL,\n    @status int OUTPUT");
    }
}
