//! Grants and Always Encrypted column clauses.

use relforge_core::Column;

use super::EntityContext;
use super::columns::quote;
use crate::model::{GeneratedScript, ScriptKind};

/// `ENCRYPTED WITH (...)` clause, preceded by a BIN2 collation for
/// character columns as deterministic encryption requires.
pub fn encryption_clause(column: &Column, key: &str) -> String {
    let collation = if column.sql_type().is_character() {
        "COLLATE Latin1_General_BIN2 "
    } else {
        ""
    };
    format!(
        "{collation}ENCRYPTED WITH (COLUMN_ENCRYPTION_KEY = {}, ENCRYPTION_TYPE = DETERMINISTIC, ALGORITHM = 'AEAD_AES_256_CBC_HMAC_SHA_256')",
        quote(key)
    )
}

/// `GRANT EXECUTE` on every procedure script to every configured role.
pub fn grant_script(ctx: &EntityContext<'_>, scripts: &[GeneratedScript]) -> Option<GeneratedScript> {
    let roles = &ctx.options.grant_roles;
    if roles.is_empty() {
        return None;
    }
    let grants: Vec<String> = scripts
        .iter()
        .filter(|script| script.kind.is_procedure())
        .flat_map(|script| {
            roles.iter().map(move |role| {
                format!(
                    "GRANT EXECUTE ON {} TO {};",
                    ctx.object(&script.object_name),
                    quote(role)
                )
            })
        })
        .collect();
    if grants.is_empty() {
        return None;
    }
    let mut sql = grants.join("\n");
    sql.push('\n');
    Some(GeneratedScript::new(
        Some(ctx.mneo()),
        format!("{}_grants", ctx.mneo()),
        ScriptKind::Security,
        sql,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relforge_core::SqlType;

    #[test]
    fn character_columns_get_bin2_collation() {
        let ssn = Column::varchar("vc_ssn", 11).encrypted().build().unwrap();
        let clause = encryption_clause(&ssn, "CEK_Auto1");
        assert!(clause.starts_with("COLLATE Latin1_General_BIN2 ENCRYPTED WITH"));
        assert!(clause.contains("ENCRYPTION_TYPE = DETERMINISTIC"));

        let salary = Column::builder("i_salary", SqlType::Int)
            .encrypted()
            .build()
            .unwrap();
        assert!(encryption_clause(&salary, "CEK_Auto1").starts_with("ENCRYPTED WITH"));
    }
}
