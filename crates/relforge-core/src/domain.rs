use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which satellite family a related id belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SatelliteKind {
    Category,
    Status,
}

impl SatelliteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SatelliteKind::Category => "category",
            SatelliteKind::Status => "status",
        }
    }
}

/// One global value domain and the shape of the satellite tables pointing at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SatelliteDomain {
    /// Shared values table (`categories_values`, `status_values`).
    pub values_table: String,
    /// Domain id column, present in both the values table and every satellite.
    pub id_column: String,
    pub value_column: String,
    pub description_column: String,
    /// Appended to the entity table name to form the satellite table name.
    pub suffix: String,
}

impl SatelliteDomain {
    pub fn category() -> Self {
        Self {
            values_table: "categories_values".to_string(),
            id_column: "c_category_id".to_string(),
            value_column: "c_value_id".to_string(),
            description_column: "nvc_description".to_string(),
            suffix: "_cat".to_string(),
        }
    }

    pub fn status() -> Self {
        Self {
            values_table: "status_values".to_string(),
            id_column: "c_status_id".to_string(),
            value_column: "c_value_id".to_string(),
            description_column: "nvc_description".to_string(),
            suffix: "_status".to_string(),
        }
    }

    pub fn satellite_table(&self, entity_table: &str) -> String {
        format!("{entity_table}{}", self.suffix)
    }
}

/// Registry of the shared category/status value tables.
///
/// Passed to the generator instead of hardcoding table names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct DomainRegistry {
    pub category: SatelliteDomain,
    pub status: SatelliteDomain,
}

impl Default for DomainRegistry {
    fn default() -> Self {
        Self {
            category: SatelliteDomain::category(),
            status: SatelliteDomain::status(),
        }
    }
}

impl DomainRegistry {
    pub fn domain(&self, kind: SatelliteKind) -> &SatelliteDomain {
        match kind {
            SatelliteKind::Category => &self.category,
            SatelliteKind::Status => &self.status,
        }
    }
}
