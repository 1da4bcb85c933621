use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::column::Column;
use crate::error::{Error, Result};
use crate::flags::ColumnFlags;
use crate::procedure::{ProcedureBuilder, ProcedureDefinition};
use crate::types::ValueKind;

/// Parameter name of the free-text search array.
pub const LIKE_PARAMETER: &str = "like";
/// Parameter name of the single-character paging/mode flag.
pub const MODE_PARAMETER: &str = "d";

/// One view parameter plus its browsing and compound-key roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewParm {
    column: Column,
    compound_key_group: Option<String>,
    compound_key_position: Option<u8>,
    browsing_key: bool,
}

impl ViewParm {
    pub fn column(&self) -> &Column {
        &self.column
    }

    pub fn compound_key_group(&self) -> Option<&str> {
        self.compound_key_group.as_deref()
    }

    pub fn compound_key_position(&self) -> Option<u8> {
        self.compound_key_position
    }

    pub fn is_browsing_key(&self) -> bool {
        self.browsing_key
    }

    /// `like` and `d` are added by the framework.
    pub fn is_system(&self) -> bool {
        matches!(
            self.column.parameter_name(),
            LIKE_PARAMETER | MODE_PARAMETER
        )
    }
}

#[derive(Debug, Clone)]
enum ViewParmSource {
    Reference(String),
    Template(Column),
}

#[derive(Debug, Clone)]
struct PendingParm {
    source: ViewParmSource,
    group: Option<(String, u8)>,
    browsing_key: bool,
}

/// Unattached view declaration.
#[derive(Debug, Clone)]
pub struct ViewBuilder {
    name: String,
    parms: Vec<PendingParm>,
    likeable: Option<Vec<String>>,
    readonly_locks: bool,
}

impl ViewBuilder {
    /// `name` is the view suffix; the procedure is named `{mneo}_brw{name}`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parms: Vec::new(),
            likeable: None,
            readonly_locks: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity column used as an equality filter.
    pub fn filter(mut self, column: impl Into<String>) -> Self {
        self.parms.push(PendingParm {
            source: ViewParmSource::Reference(column.into()),
            group: None,
            browsing_key: false,
        });
        self
    }

    pub fn browsing_key(mut self, column: impl Into<String>) -> Self {
        self.parms.push(PendingParm {
            source: ViewParmSource::Reference(column.into()),
            group: None,
            browsing_key: true,
        });
        self
    }

    /// Filter that is also part of a compound key group.
    pub fn compound(
        mut self,
        column: impl Into<String>,
        group: impl Into<String>,
        position: u8,
    ) -> Self {
        self.parms.push(PendingParm {
            source: ViewParmSource::Reference(column.into()),
            group: Some((group.into(), position)),
            browsing_key: false,
        });
        self
    }

    /// Explicit parameter template (also the way to pre-register `like`/`d`).
    pub fn parm(mut self, column: Column) -> Self {
        self.parms.push(PendingParm {
            source: ViewParmSource::Template(column),
            group: None,
            browsing_key: false,
        });
        self
    }

    /// Override the columns searched by `@like`.
    pub fn likeable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.likeable = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn readonly_locks(mut self, enabled: bool) -> Self {
        self.readonly_locks = enabled;
        self
    }

    pub fn resolve(self, mneo: &str, columns: &[Column]) -> Result<ViewDefinition> {
        let procedure_name = format!("{mneo}_brw{}", self.name);
        let lookup = |name: &str| -> Result<Column> {
            columns
                .iter()
                .find(|column| column.name() == name)
                .cloned()
                .ok_or_else(|| Error::MissingColumn {
                    entity: mneo.to_string(),
                    owner: procedure_name.clone(),
                    column: name.to_string(),
                })
        };

        let mut parms = Vec::with_capacity(self.parms.len() + 2);
        for pending in self.parms {
            let column = match pending.source {
                ViewParmSource::Reference(name) => lookup(&name)?,
                ViewParmSource::Template(column) => column,
            };
            let (group, position) = match pending.group {
                Some((group, position)) => (Some(group), Some(position)),
                None => (None, None),
            };
            parms.push(ViewParm {
                column,
                compound_key_group: group,
                compound_key_position: position,
                browsing_key: pending.browsing_key,
            });
        }

        for (parameter, column) in [
            (LIKE_PARAMETER, like_column()?),
            (MODE_PARAMETER, mode_column()?),
        ] {
            if !parms
                .iter()
                .any(|parm| parm.column.parameter_name() == parameter)
            {
                parms.push(ViewParm {
                    column,
                    compound_key_group: None,
                    compound_key_position: None,
                    browsing_key: false,
                });
            }
        }

        let browsing_keys = parms.iter().filter(|parm| parm.browsing_key).count();
        if browsing_keys != 1 {
            return Err(Error::InvalidDefinition(format!(
                "view '{procedure_name}' must declare exactly one browsing key, found {browsing_keys}"
            )));
        }

        let mut positions: BTreeMap<&str, BTreeSet<u8>> = BTreeMap::new();
        for parm in &parms {
            if let (Some(group), Some(position)) =
                (parm.compound_key_group.as_deref(), parm.compound_key_position)
            {
                if !positions.entry(group).or_default().insert(position) {
                    return Err(Error::InvalidDefinition(format!(
                        "view '{procedure_name}' repeats position {position} in compound key '{group}'"
                    )));
                }
            }
        }

        if let Some(likeable) = &self.likeable {
            for name in likeable {
                let column = lookup(name)?;
                if column.is_fake() {
                    return Err(Error::InvalidDefinition(format!(
                        "view '{procedure_name}' cannot search fake column '{name}'"
                    )));
                }
            }
        }

        let mut procedure = ProcedureBuilder::new(procedure_name.clone());
        for parm in &parms {
            procedure = procedure.parm(parm.column.clone());
        }
        if self.readonly_locks {
            procedure = procedure.readonly_locks();
        }
        let procedure = procedure.resolve(mneo, columns)?;

        Ok(ViewDefinition {
            suffix: self.name,
            procedure,
            parms,
            likeable: self.likeable,
        })
    }
}

fn like_column() -> Result<Column> {
    Column::nvarchar("nvc_like", 0)
        .clr(ValueKind::StringArray)
        .nullable()
        .flags(ColumnFlags::empty())
        .build()
}

fn mode_column() -> Result<Column> {
    Column::char("c_d", 1)
        .nullable()
        .flags(ColumnFlags::empty())
        .build()
}

/// A browsing view: procedure plus view-specific parameter roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewDefinition {
    suffix: String,
    procedure: ProcedureDefinition,
    parms: Vec<ViewParm>,
    likeable: Option<Vec<String>>,
}

impl ViewDefinition {
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn name(&self) -> &str {
        self.procedure.name()
    }

    pub fn procedure(&self) -> &ProcedureDefinition {
        &self.procedure
    }

    pub fn parms(&self) -> &[ViewParm] {
        &self.parms
    }

    pub fn browsing_key(&self) -> &ViewParm {
        // resolve() guarantees exactly one
        self.parms
            .iter()
            .find(|parm| parm.browsing_key)
            .unwrap_or(&self.parms[0])
    }

    /// Non-system, non-browsing parameters applied as equality filters.
    pub fn filters(&self) -> impl Iterator<Item = &ViewParm> {
        self.parms
            .iter()
            .filter(|parm| !parm.browsing_key && !parm.is_system())
    }

    /// Parameters of a compound key group ordered by position.
    pub fn compound_key(&self, group: &str) -> Vec<&ViewParm> {
        let mut members: Vec<&ViewParm> = self
            .parms
            .iter()
            .filter(|parm| parm.compound_key_group.as_deref() == Some(group))
            .collect();
        members.sort_by_key(|parm| parm.compound_key_position);
        members
    }

    pub fn likeable_override(&self) -> Option<&[String]> {
        self.likeable.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlType;

    fn columns() -> Vec<Column> {
        vec![
            Column::pk("c_empresa_id", SqlType::Char)
                .size(10)
                .build()
                .unwrap(),
            Column::pk("c_sucursal_id", SqlType::Char)
                .size(10)
                .build()
                .unwrap(),
            Column::varchar("vc_name", 80).build().unwrap(),
        ]
    }

    #[test]
    fn system_parameters_are_appended() {
        let view = ViewBuilder::new("Standard")
            .filter("c_empresa_id")
            .browsing_key("c_sucursal_id")
            .resolve("suc", &columns())
            .unwrap();
        let names: Vec<&str> = view
            .parms()
            .iter()
            .map(|parm| parm.column().parameter_name())
            .collect();
        assert_eq!(names, ["empresa_id", "sucursal_id", "like", "d"]);
        assert_eq!(view.name(), "suc_brwStandard");
        assert_eq!(view.browsing_key().column().name(), "c_sucursal_id");
        assert_eq!(view.filters().count(), 1);
        assert!(view.procedure().readonly_locks());
    }

    #[test]
    fn pre_registered_system_parameter_is_kept_once() {
        let like = Column::nvarchar("nvc_like", 200).nullable().build().unwrap();
        let view = ViewBuilder::new("Standard")
            .browsing_key("c_sucursal_id")
            .parm(like)
            .resolve("suc", &columns())
            .unwrap();
        let likes = view
            .parms()
            .iter()
            .filter(|parm| parm.column().parameter_name() == LIKE_PARAMETER)
            .count();
        assert_eq!(likes, 1);
    }

    #[test]
    fn duplicate_system_parameter_is_an_error() {
        let like = || Column::nvarchar("nvc_like", 200).build().unwrap();
        let err = ViewBuilder::new("Standard")
            .browsing_key("c_sucursal_id")
            .parm(like())
            .parm(like())
            .resolve("suc", &columns())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateParameter { ref parameter, .. } if parameter == "like"));
    }

    #[test]
    fn requires_exactly_one_browsing_key() {
        let err = ViewBuilder::new("Standard")
            .filter("c_empresa_id")
            .resolve("suc", &columns())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDefinition(_)));
    }

    #[test]
    fn compound_key_members_are_ordered_by_position() {
        let view = ViewBuilder::new("Standard")
            .compound("c_sucursal_id", "parent", 2)
            .compound("c_empresa_id", "parent", 1)
            .browsing_key("vc_name")
            .resolve("suc", &columns())
            .unwrap();
        let members: Vec<&str> = view
            .compound_key("parent")
            .into_iter()
            .map(|parm| parm.column().name())
            .collect();
        assert_eq!(members, ["c_empresa_id", "c_sucursal_id"]);
    }
}
