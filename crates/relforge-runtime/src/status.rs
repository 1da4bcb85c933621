use serde::Serialize;

/// Codes of the `(status, message)` row returned by write procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    RecordHasChanged,
    Error,
    Autonum,
}

impl StatusCode {
    pub fn code(self) -> i32 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::RecordHasChanged => 4,
            StatusCode::Error => 11,
            StatusCode::Autonum => 15,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(StatusCode::Ok),
            4 => Some(StatusCode::RecordHasChanged),
            11 => Some(StatusCode::Error),
            15 => Some(StatusCode::Autonum),
            _ => None,
        }
    }
}

/// Interpreted result of `_update` / `_drop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcedureOutcome {
    Ok,
    /// A row was inserted with a generated key.
    Autonum { key: String },
    /// The row's `dt_lu` moved since the caller read it.
    RecordHasChanged,
    Failed { status: i32, message: String },
}

impl ProcedureOutcome {
    pub fn from_status(status: i32, message: Option<&str>) -> Self {
        let message = message.unwrap_or_default();
        match StatusCode::from_code(status) {
            Some(StatusCode::Ok) => ProcedureOutcome::Ok,
            Some(StatusCode::Autonum) => ProcedureOutcome::Autonum {
                key: message.to_string(),
            },
            Some(StatusCode::RecordHasChanged) => ProcedureOutcome::RecordHasChanged,
            Some(StatusCode::Error) | None => ProcedureOutcome::Failed {
                status,
                message: message.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcedureOutcome::Ok | ProcedureOutcome::Autonum { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autonum_carries_the_new_key() {
        assert_eq!(
            ProcedureOutcome::from_status(15, Some("0000000042")),
            ProcedureOutcome::Autonum {
                key: "0000000042".to_string()
            }
        );
        assert!(ProcedureOutcome::from_status(15, Some("1")).is_success());
    }

    #[test]
    fn unknown_codes_fail_with_their_message() {
        assert_eq!(
            ProcedureOutcome::from_status(99, None),
            ProcedureOutcome::Failed {
                status: 99,
                message: String::new()
            }
        );
        assert_eq!(ProcedureOutcome::from_status(4, Some("x")), ProcedureOutcome::RecordHasChanged);
        assert_eq!(StatusCode::from_code(11).map(StatusCode::code), Some(11));
    }
}
