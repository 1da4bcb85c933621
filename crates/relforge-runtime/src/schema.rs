//! Expected result shapes of the generated procedures.
//!
//! The shapes follow the projections the generator emits, so a database
//! running scripts from another metadata revision is detected on the first
//! call instead of silently returning misplaced values.

use relforge_core::{
    Column, ColumnFlags, EntityDefinition, LAST_UPDATE_COLUMN, SqlType, Value, ValueKind,
    ViewDefinition,
};
use serde::Serialize;

use crate::errors::{Result, RuntimeError};
use crate::executor::ResultSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultColumn {
    pub name: String,
    pub sql_type: SqlType,
    pub kind: ValueKind,
    pub nullable: bool,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, sql_type: SqlType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            sql_type,
            kind: sql_type.to_clr_type(),
            nullable,
        }
    }

    /// Satellite-backed and computed columns may come back NULL even when
    /// declared NOT NULL (outer joins, empty aggregates).
    fn of(column: &Column) -> Self {
        Self {
            name: column.name().to_string(),
            sql_type: column.sql_type(),
            kind: column.clr_type().kind,
            nullable: column.is_nullable() || column.is_fake(),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match value.kind() {
            None => self.nullable,
            Some(kind) => kind == self.kind || self.sql_type.is_type_accepted(kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSchema {
    pub procedure: String,
    pub columns: Vec<ResultColumn>,
}

impl ResultSchema {
    /// `(status int, message nvarchar)` row of write procedures.
    pub fn status(procedure: impl Into<String>) -> Self {
        Self {
            procedure: procedure.into(),
            columns: vec![
                ResultColumn::new("status", SqlType::Int, false),
                ResultColumn::new("message", SqlType::NVarChar, true),
            ],
        }
    }

    /// Every GET-flagged column, in declaration order.
    pub fn get(entity: &EntityDefinition, procedure: impl Into<String>) -> Self {
        Self {
            procedure: procedure.into(),
            columns: entity
                .columns_with(ColumnFlags::GET)
                .map(ResultColumn::of)
                .collect(),
        }
    }

    /// The description column alone.
    pub fn lookup(entity: &EntityDefinition, procedure: impl Into<String>) -> Result<Self> {
        let description =
            entity
                .description_column()
                .ok_or_else(|| RuntimeError::NoDescriptionColumn {
                    entity: entity.mneo().to_string(),
                })?;
        Ok(Self {
            procedure: procedure.into(),
            columns: vec![ResultColumn::of(description)],
        })
    }

    /// INSERT-flagged columns without `dt_lu`; the browsing key is the only
    /// primary key column kept.
    pub fn view(entity: &EntityDefinition, view: &ViewDefinition) -> Self {
        let browsing = view.browsing_key().column().name();
        Self {
            procedure: view.name().to_string(),
            columns: entity
                .columns_with(ColumnFlags::INSERT)
                .filter(|column| {
                    column.name() != LAST_UPDATE_COLUMN
                        && (!column.is_pk() || column.name() == browsing)
                })
                .map(ResultColumn::of)
                .collect(),
        }
    }

    /// Compare column names, row widths and value kinds.
    pub fn check(&self, result: &ResultSet) -> Result<()> {
        let expected: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        let actual: Vec<&str> = result.columns.iter().map(String::as_str).collect();
        if !expected.iter().eq(actual.iter()) {
            return Err(self.drift(format!(
                "expected columns [{}], got [{}]",
                expected.join(", "),
                actual.join(", ")
            )));
        }

        for (row_idx, row) in result.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(self.drift(format!(
                    "row {row_idx} has {} values for {} columns",
                    row.len(),
                    self.columns.len()
                )));
            }
            for (column, value) in self.columns.iter().zip(row) {
                if !column.accepts(value) {
                    let found = value
                        .kind()
                        .map_or_else(|| "NULL".to_string(), |kind| kind.to_string());
                    return Err(self.drift(format!(
                        "row {row_idx} column '{}' holds {found}, expected {}",
                        column.name, column.sql_type
                    )));
                }
            }
        }
        Ok(())
    }

    fn drift(&self, reason: String) -> RuntimeError {
        RuntimeError::ResultShape {
            procedure: self.procedure.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relforge_core::ProcedureKind;

    fn persona() -> EntityDefinition {
        EntityDefinition::builder("pers", "personas")
            .column(Column::pk("c_persona_id", SqlType::Char).size(20))
            .column(Column::varchar("vc_name", 40))
            .column(Column::category("vc_kind", "PERK"))
            .build()
            .unwrap()
    }

    #[test]
    fn get_schema_follows_get_flags() {
        let entity = persona();
        let schema = ResultSchema::get(&entity, "pers_get");
        let names: Vec<&str> = schema.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["c_persona_id", "vc_name", "vc_kind", "dt_lu"]);
        assert!(schema.columns[2].nullable);
    }

    #[test]
    fn detects_renamed_and_mistyped_columns() {
        let schema = ResultSchema::status("pers_update");
        let renamed = ResultSet::new(["status", "msg"]).row(vec![Value::Int32(0), Value::Null]);
        let err = schema.check(&renamed).unwrap_err();
        assert!(err.to_string().contains("expected columns [status, message]"));

        let mistyped =
            ResultSet::new(["status", "message"]).row(vec![Value::from("0"), Value::Null]);
        assert!(matches!(
            schema.check(&mistyped),
            Err(RuntimeError::ResultShape { .. })
        ));

        let ok = ResultSet::new(["status", "message"]).row(vec![Value::Int32(0), Value::from("OK")]);
        assert!(schema.check(&ok).is_ok());
    }

    #[test]
    fn view_schema_drops_the_concurrency_token() {
        let entity = persona();
        let view = &entity.views()[0];
        let schema = ResultSchema::view(&entity, view);
        let names: Vec<&str> = schema.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["c_persona_id", "vc_name", "vc_kind"]);
        assert!(entity.standard_procedure(ProcedureKind::Lookup).is_some());
        assert!(matches!(
            ResultSchema::lookup(&entity, "pers_lookup"),
            Err(RuntimeError::NoDescriptionColumn { .. })
        ));
    }
}
