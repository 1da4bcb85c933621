//! Binding caller values to a procedure's parameters.

use std::collections::BTreeMap;

use relforge_core::{ProcedureDefinition, Value};
use relforge_generate::generators::columns::quote;

use crate::errors::{Result, RuntimeError};
use crate::executor::{ClaimsSource, ProcedureCall, SqlParameter};

/// Caller values keyed by column name (`c_persona_id`).
pub type Arguments = BTreeMap<String, Value>;

/// `[schema].[name]`, quoted the same way the generator names its objects.
pub fn qualified_name(schema: &str, name: &str) -> String {
    format!("{}.{}", quote(schema), quote(name))
}

/// Bind `args` to every parameter of `procedure`.
///
/// Parameters without a value are sent as NULL. Columns carrying an
/// `override_with` claim always take the claim value, whatever the caller
/// passed. Readonly-lock procedures are refused inside a caller-owned
/// transaction.
pub fn prepare_call(
    schema: &str,
    procedure: &ProcedureDefinition,
    args: &Arguments,
    claims: &dyn ClaimsSource,
    in_transaction: bool,
) -> Result<ProcedureCall> {
    if procedure.readonly_locks() && in_transaction {
        return Err(RuntimeError::TransactionActive {
            procedure: procedure.name().to_string(),
        });
    }

    if let Some(column) = args
        .keys()
        .find(|column| procedure.parm(column.as_str()).is_none())
    {
        return Err(RuntimeError::UnknownParameter {
            procedure: procedure.name().to_string(),
            column: column.clone(),
        });
    }

    let mut parameters = Vec::with_capacity(procedure.parms().len());
    for column in procedure.parms() {
        let value = match column.override_with() {
            Some(claim) => claims
                .claim(claim)
                .ok_or_else(|| RuntimeError::MissingClaim {
                    procedure: procedure.name().to_string(),
                    claim: claim.to_string(),
                })?,
            None => args.get(column.name()).cloned().unwrap_or(Value::Null),
        };
        column
            .check_value(&value)
            .map_err(|source| RuntimeError::TypeMismatch {
                procedure: procedure.name().to_string(),
                parameter: column.parameter_name().to_string(),
                source,
            })?;
        parameters.push(SqlParameter {
            name: format!("@{}", column.parameter_name()),
            sql_type: column.sql_type(),
            value,
        });
    }

    Ok(ProcedureCall {
        procedure: qualified_name(schema, procedure.name()),
        parameters,
        readonly_locks: procedure.readonly_locks(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::StaticClaims;
    use relforge_core::{
        Column, EntityDefinition, ProcedureBuilder, ProcedureKind, SqlType, WEB_USER_CLAIM,
    };

    fn persona() -> EntityDefinition {
        EntityDefinition::builder("pers", "personas")
            .column(Column::pk("c_persona_id", SqlType::Char).size(20))
            .column(Column::varchar("vc_name", 80))
            .column(Column::builder("i_age", SqlType::Int).nullable())
            .procedure(ProcedureBuilder::new("pers_report").parm_ref("i_age").readonly_locks())
            .build()
            .unwrap()
    }

    fn args(pairs: &[(&str, Value)]) -> Arguments {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn binds_parameters_by_column_and_fills_nulls() {
        let entity = persona();
        let get = entity.standard_procedure(ProcedureKind::Get).unwrap();
        let call = prepare_call(
            "dbo",
            get,
            &args(&[("c_persona_id", Value::from("P1"))]),
            &StaticClaims::new(),
            false,
        )
        .unwrap();
        assert_eq!(call.procedure, "[dbo].[pers_get]");
        assert_eq!(call.parameters.len(), 1);
        assert_eq!(call.parameters[0].name, "@persona_id");
        assert_eq!(call.parameters[0].value, Value::from("P1"));
    }

    #[test]
    fn web_user_comes_from_the_claim() {
        let entity = persona();
        let update = entity.standard_procedure(ProcedureKind::Update).unwrap();
        let claims = StaticClaims::new().with(WEB_USER_CLAIM, "ana");
        let call = prepare_call(
            "dbo",
            update,
            &args(&[("c_persona_id", Value::from("P1")), ("vc_name", Value::from("Ana"))]),
            &claims,
            true,
        )
        .unwrap();
        let web_user = call.parameters.last().unwrap();
        assert_eq!(web_user.value, Value::from("ana"));
        assert_eq!(call.parameter("@lu").map(|p| &p.value), Some(&Value::Null));

        let err = prepare_call("dbo", update, &Arguments::new(), &StaticClaims::new(), false)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::MissingClaim { .. }));
    }

    #[test]
    fn rejects_unknown_columns_and_wrong_types() {
        let entity = persona();
        let get = entity.standard_procedure(ProcedureKind::Get).unwrap();
        let err = prepare_call(
            "dbo",
            get,
            &args(&[("vc_name", Value::from("Ana"))]),
            &StaticClaims::new(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownParameter { ref column, .. } if column == "vc_name"));

        let err = prepare_call(
            "dbo",
            get,
            &args(&[("c_persona_id", Value::Bool(true))]),
            &StaticClaims::new(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, RuntimeError::TypeMismatch { ref parameter, .. } if parameter == "persona_id"));
    }

    #[test]
    fn readonly_procedures_refuse_open_transactions() {
        let entity = persona();
        let report = entity.procedure("pers_report").unwrap();
        let err = prepare_call("dbo", report, &Arguments::new(), &StaticClaims::new(), true)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::TransactionActive { .. }));
        assert!(prepare_call("dbo", report, &Arguments::new(), &StaticClaims::new(), false).is_ok());
    }

    #[test]
    fn qualified_names_escape_closing_brackets() {
        assert_eq!(qualified_name("dbo", "pers_get"), "[dbo].[pers_get]");
        assert_eq!(qualified_name("crm]x", "pers_get"), "[crm]]x].[pers_get]");
        assert_eq!(
            qualified_name("crm]x", "pers_get"),
            format!("{}.{}", quote("crm]x"), quote("pers_get"))
        );
    }
}
