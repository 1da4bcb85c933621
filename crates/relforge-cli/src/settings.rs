use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use relforge_generate::GenerateOptions;

/// File looked up in the working directory when `--config` is not given.
pub const SETTINGS_FILE: &str = "relforge.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("toml decode error in {path}: {source}")]
    TomlDecode {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Contents of `relforge.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub generate: GenerateOptions,
}

/// Settings plus the file they came from, if any.
#[derive(Debug, Clone, Default)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub path: Option<PathBuf>,
}

/// Read `explicit` when given, else `relforge.toml` if present, else defaults.
pub fn load_settings(explicit: Option<&Path>) -> Result<LoadedSettings, SettingsError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(SETTINGS_FILE);
            if !fallback.exists() {
                return Ok(LoadedSettings::default());
            }
            fallback
        }
    };

    let content = std::fs::read_to_string(&path).map_err(|source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let settings = parse_settings(&content).map_err(|source| SettingsError::TomlDecode {
        path: path.display().to_string(),
        source,
    })?;
    Ok(LoadedSettings {
        settings,
        path: Some(path),
    })
}

pub fn parse_settings(content: &str) -> Result<Settings, toml::de::Error> {
    toml::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_generate_table_keeps_defaults() {
        let settings = parse_settings(
            r#"
[generate]
schema = "crm"
grant_roles = ["app_role"]
"#,
        )
        .unwrap();
        assert_eq!(settings.generate.schema, "crm");
        assert_eq!(settings.generate.grant_roles, ["app_role"]);
        assert_eq!(settings.generate.view_row_limit, 500);
        assert!(settings.generate.emit_support);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_settings("[generate]\nschemas = \"crm\"\n").is_err());
        assert_eq!(parse_settings("").unwrap(), Settings::default());
    }
}
