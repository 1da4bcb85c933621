use std::collections::BTreeSet;

use serde::Serialize;

use crate::column::Column;
use crate::error::{Error, Result};

/// Where a procedure parameter comes from before it is attached to an entity.
#[derive(Debug, Clone)]
pub enum ParmSource {
    /// Explicit column template.
    Template(Column),
    /// Name of an entity column, resolved at attach time.
    Reference { column: String, strip: bool },
}

/// Unattached procedure declaration.
#[derive(Debug, Clone)]
pub struct ProcedureBuilder {
    name: String,
    parms: Vec<ParmSource>,
    readonly_locks: bool,
    is_lookup: bool,
    is_import: bool,
}

impl ProcedureBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parms: Vec::new(),
            readonly_locks: false,
            is_lookup: false,
            is_import: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parm(mut self, column: Column) -> Self {
        self.parms.push(ParmSource::Template(column));
        self
    }

    /// Add a template with its storage flags stripped.
    pub fn parm_stripped(mut self, column: &Column) -> Self {
        self.parms.push(ParmSource::Template(column.stripped()));
        self
    }

    pub fn parm_ref(mut self, column: impl Into<String>) -> Self {
        self.parms.push(ParmSource::Reference {
            column: column.into(),
            strip: false,
        });
        self
    }

    pub fn parm_ref_stripped(mut self, column: impl Into<String>) -> Self {
        self.parms.push(ParmSource::Reference {
            column: column.into(),
            strip: true,
        });
        self
    }

    /// Mark the procedure as safe to run under `READ UNCOMMITTED` with a row limit.
    pub fn readonly_locks(mut self) -> Self {
        self.readonly_locks = true;
        self
    }

    pub fn lookup(mut self) -> Self {
        self.is_lookup = true;
        self
    }

    pub fn import(mut self) -> Self {
        self.is_import = true;
        self
    }

    /// Resolve deferred references against the owning entity's columns.
    pub fn resolve(self, entity: &str, columns: &[Column]) -> Result<ProcedureDefinition> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidDefinition(format!(
                "procedure without a name in entity '{entity}'"
            )));
        }

        let mut seen = BTreeSet::new();
        let mut parms = Vec::with_capacity(self.parms.len());

        for source in self.parms {
            let column = match source {
                ParmSource::Template(column) => column,
                ParmSource::Reference { column, strip } => {
                    let found = columns
                        .iter()
                        .find(|candidate| candidate.name() == column)
                        .ok_or_else(|| Error::MissingColumn {
                            entity: entity.to_string(),
                            owner: self.name.clone(),
                            column: column.clone(),
                        })?;
                    if strip { found.stripped() } else { found.clone() }
                }
            };

            if !seen.insert(column.parameter_name().to_string()) {
                return Err(Error::DuplicateParameter {
                    procedure: self.name,
                    parameter: column.parameter_name().to_string(),
                });
            }
            parms.push(column);
        }

        Ok(ProcedureDefinition {
            name: self.name,
            parms,
            readonly_locks: self.readonly_locks,
            is_lookup: self.is_lookup,
            is_import: self.is_import,
        })
    }
}

/// A stored procedure's name and ordered parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcedureDefinition {
    name: String,
    parms: Vec<Column>,
    readonly_locks: bool,
    is_lookup: bool,
    is_import: bool,
}

impl ProcedureDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parms(&self) -> &[Column] {
        &self.parms
    }

    pub fn parm(&self, name: &str) -> Option<&Column> {
        self.parms.iter().find(|column| column.name() == name)
    }

    pub fn readonly_locks(&self) -> bool {
        self.readonly_locks
    }

    pub fn is_lookup(&self) -> bool {
        self.is_lookup
    }

    pub fn is_import(&self) -> bool {
        self.is_import
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlType;

    fn columns() -> Vec<Column> {
        vec![
            Column::pk("c_persona_id", SqlType::Char)
                .size(20)
                .build()
                .unwrap(),
            Column::varchar("vc_name", 80).build().unwrap(),
        ]
    }

    #[test]
    fn resolves_references_in_order() {
        let def = ProcedureBuilder::new("pers_find")
            .parm_ref("vc_name")
            .parm_ref_stripped("c_persona_id")
            .resolve("pers", &columns())
            .unwrap();
        let names: Vec<&str> = def.parms().iter().map(Column::name).collect();
        assert_eq!(names, ["vc_name", "c_persona_id"]);
        assert!(!def.parms()[1].is_pk());
    }

    #[test]
    fn missing_reference_fails_at_attach_time() {
        let err = ProcedureBuilder::new("pers_find")
            .parm_ref("vc_missing")
            .resolve("pers", &columns())
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref column, .. } if column == "vc_missing"));
    }

    #[test]
    fn colliding_parameter_names_are_rejected() {
        let err = ProcedureBuilder::new("pers_find")
            .parm_ref("vc_name")
            .parm(Column::nvarchar("nvc_name", 10).build().unwrap())
            .resolve("pers", &columns())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateParameter { .. }));
    }
}
