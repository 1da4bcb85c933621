//! Generator extensions: pure functions from entity metadata to SQL text,
//! one module per procedure family.

pub mod columns;
pub mod drop;
pub mod get;
pub mod join;
pub mod lookup;
pub mod satellite;
pub mod security;
pub mod support;
pub mod table;
pub mod update;
pub mod view;

use relforge_core::{
    Column, DomainRegistry, EntityCatalog, EntityDefinition, ProcedureDefinition, SatelliteKind,
};

use crate::errors::GenerationError;
use crate::model::GenerateOptions;
use crate::template::indent;

use self::columns::{parameter, quote};

/// Everything a generator reads for one entity.
#[derive(Debug, Clone, Copy)]
pub struct EntityContext<'a> {
    pub entity: &'a EntityDefinition,
    pub catalog: &'a EntityCatalog,
    pub options: &'a GenerateOptions,
}

impl<'a> EntityContext<'a> {
    pub fn new(
        entity: &'a EntityDefinition,
        catalog: &'a EntityCatalog,
        options: &'a GenerateOptions,
    ) -> Self {
        Self {
            entity,
            catalog,
            options,
        }
    }

    pub fn mneo(&self) -> &'a str {
        self.entity.mneo()
    }

    /// `[schema].[name]`
    pub fn object(&self, name: &str) -> String {
        format!("{}.{}", quote(&self.options.schema), quote(name))
    }

    pub fn table(&self) -> String {
        self.object(self.entity.table_name())
    }

    pub fn domains(&self) -> &'a DomainRegistry {
        self.catalog.domains()
    }

    pub fn satellite_table(&self, kind: SatelliteKind) -> String {
        self.object(
            &self
                .domains()
                .domain(kind)
                .satellite_table(self.entity.table_name()),
        )
    }

    pub fn primary_key(&self) -> Vec<&'a Column> {
        self.entity.primary_key().collect()
    }

    /// Primary key columns, checked to be parameters of `procedure`.
    pub fn primary_key_parameters(
        &self,
        procedure: &ProcedureDefinition,
    ) -> Result<Vec<&'a Column>, GenerationError> {
        let pk = self.primary_key();
        let complete = !pk.is_empty()
            && pk
                .iter()
                .all(|column| procedure.parm(column.name()).is_some());
        if complete {
            Ok(pk)
        } else {
            Err(GenerationError::MissingPrimaryKey {
                entity: self.mneo().to_string(),
                procedure: procedure.name().to_string(),
            })
        }
    }

    /// `a.[c_id] = @id AND ...`, or unqualified when `alias` is `None`.
    pub fn key_filter(&self, alias: Option<&str>) -> String {
        key_filter(&self.primary_key(), alias)
    }
}

pub fn key_filter(columns: &[&Column], alias: Option<&str>) -> String {
    columns
        .iter()
        .map(|column| {
            let target = match alias {
                Some(alias) => format!("{alias}.{}", quote(column.name())),
                None => quote(column.name()),
            };
            format!("{target} = {}", parameter(column))
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Where a procedure reports its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTarget {
    /// `SELECT <code> AS status, <message> AS message;`
    ResultRow,
    /// `@status` / `@message` OUTPUT parameters of inner procedures.
    Output,
}

impl StatusTarget {
    /// Statement(s) reporting `code`; `message` is a SQL expression.
    pub fn emit(self, code: i32, message: &str) -> String {
        match self {
            StatusTarget::ResultRow => format!("SELECT {code} AS status, {message} AS message;"),
            StatusTarget::Output => {
                format!("SET @status = {code};\nSET @message = {message};")
            }
        }
    }

    /// `emit` wrapped so it can follow an `IF`/`ELSE`.
    pub fn emit_block(self, code: i32, message: &str) -> String {
        format!("BEGIN\n{}\nEND", indent(&self.emit(code, message), 1))
    }

    /// Trailing parameters declared by inner procedures.
    pub fn output_parameters(self) -> &'static [&'static str] {
        match self {
            StatusTarget::ResultRow => &[],
            StatusTarget::Output => &["@status int OUTPUT", "@message nvarchar(200) OUTPUT"],
        }
    }
}

/// Early-return checks for required parameters, reporting status 11.
pub fn required_checks(columns: &[&Column], target: StatusTarget) -> String {
    columns
        .iter()
        .map(|column| {
            let param = parameter(column);
            let condition = if columns::is_blankable(column) {
                format!("{param} IS NULL OR {param} = ''")
            } else {
                format!("{param} IS NULL")
            };
            let message = columns::unicode_literal(&format!("{} is required", column.name()));
            format!(
                "IF {condition}\nBEGIN\n{}\n    RETURN;\nEND",
                indent(&target.emit(11, &message), 1)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use relforge_core::SqlType;

    #[test]
    fn required_checks_blank_test_only_for_plain_character_columns() {
        let name = Column::varchar("vc_name", 80).build().unwrap();
        let qty = Column::builder("i_qty", SqlType::Int).build().unwrap();
        let sql = required_checks(&[&name, &qty], StatusTarget::ResultRow);
        assert!(sql.contains("IF @name IS NULL OR @name = ''"));
        assert!(sql.contains("IF @qty IS NULL\n"));
        assert!(sql.contains("SELECT 11 AS status, N'vc_name is required' AS message;"));
    }

    #[test]
    fn output_target_sets_parameters() {
        assert_eq!(
            StatusTarget::Output.emit(4, "N'Record changed'"),
            "SET @status = 4;\nSET @message = N'Record changed';"
        );
    }
}
