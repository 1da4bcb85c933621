use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::GenerationError;
use crate::model::{GeneratedScript, ScriptKind};

pub const MANIFEST_FILE: &str = "manifest.json";
/// Directory (under `sql/`) holding scripts that belong to no entity.
pub const SUPPORT_DIR: &str = "_support";

/// One written script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub entity: Option<String>,
    pub object_name: String,
    pub kind: ScriptKind,
    /// Relative to the output directory, `/`-separated.
    pub path: String,
    pub bytes: u64,
    pub sha256: String,
}

/// Index of a generation run's scripts, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptManifest {
    pub scripts: Vec<ManifestEntry>,
    /// SHA-256 over every script digest in order; equal digests mean
    /// byte-identical output.
    pub digest: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), GenerationError> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(contents)?;
    writer.flush()?;
    Ok(())
}

/// Write every script to `out_dir/sql/<mneo>/<object>.sql` (shared objects
/// under `sql/_support/`) followed by `manifest.json`.
pub fn write_scripts(
    out_dir: &Path,
    scripts: &[GeneratedScript],
) -> Result<ScriptManifest, GenerationError> {
    std::fs::create_dir_all(out_dir)?;
    let mut entries = Vec::with_capacity(scripts.len());
    let mut digest = Sha256::new();

    for script in scripts {
        let folder = script.entity.as_deref().unwrap_or(SUPPORT_DIR);
        let dir = out_dir.join("sql").join(folder);
        std::fs::create_dir_all(&dir)?;
        let bytes = script.sql.as_bytes();
        write_file(&dir.join(script.file_name()), bytes)?;

        let sha256 = sha256_hex(bytes);
        digest.update(sha256.as_bytes());
        entries.push(ManifestEntry {
            entity: script.entity.clone(),
            object_name: script.object_name.clone(),
            kind: script.kind,
            path: format!("sql/{folder}/{}", script.file_name()),
            bytes: bytes.len() as u64,
            sha256,
        });
    }

    let manifest = ScriptManifest {
        scripts: entries,
        digest: hex::encode(digest.finalize()),
    };
    write_file(
        &out_dir.join(MANIFEST_FILE),
        &serde_json::to_vec_pretty(&manifest)?,
    )?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_entity_and_support_folders() {
        let dir = std::env::temp_dir().join(format!("relforge_output_{}", uuid::Uuid::new_v4()));
        let scripts = vec![
            GeneratedScript::new(None, "sp_next_number", ScriptKind::Support, "GO\n".to_string()),
            GeneratedScript::new(Some("pers"), "pers_get", ScriptKind::Get, "SELECT 1;\n".to_string()),
        ];
        let manifest = write_scripts(&dir, &scripts).unwrap();

        assert_eq!(manifest.scripts[0].path, "sql/_support/sp_next_number.sql");
        assert_eq!(manifest.scripts[1].path, "sql/pers/pers_get.sql");
        assert_eq!(manifest.scripts[1].bytes, 10);
        assert_eq!(
            std::fs::read_to_string(dir.join("sql/pers/pers_get.sql")).unwrap(),
            "SELECT 1;\n"
        );
        let written: ScriptManifest =
            serde_json::from_slice(&std::fs::read(dir.join(MANIFEST_FILE)).unwrap()).unwrap();
        assert_eq!(written, manifest);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
