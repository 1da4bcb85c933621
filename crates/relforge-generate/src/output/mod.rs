pub mod sql;

pub use sql::{MANIFEST_FILE, ManifestEntry, ScriptManifest, SUPPORT_DIR, write_scripts};
