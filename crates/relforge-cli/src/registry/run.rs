use std::fs::{OpenOptions, create_dir_all};
use std::path::PathBuf;
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use relforge_decl::ValidationIssue;
use relforge_generate::{GenerateOptions, GenerationReport, ScriptManifest};

use super::{RegistryResult, write_json_atomic};

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub run_dir: PathBuf,
    pub catalog_path: PathBuf,
    pub settings_path: Option<PathBuf>,
    pub options: GenerateOptions,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub cli_version: String,
    pub catalog: String,
    pub settings: Option<String>,
    pub options: GenerateOptions,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub logs_path: PathBuf,
    pub report_path: PathBuf,
}

/// Summary written next to the manifest once generation succeeded.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub generation: &'a GenerationReport,
    pub warnings: &'a [ValidationIssue],
    pub digest: &'a str,
}

/// Create `runs/<timestamp>__run_<id>/` with `config.json` and an empty
/// `logs.ndjson`.
pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx
        .run_dir
        .join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        cli_version: env!("CARGO_PKG_VERSION").to_string(),
        catalog: ctx.catalog_path.display().to_string(),
        settings: ctx
            .settings_path
            .as_ref()
            .map(|path| path.display().to_string()),
        options: ctx.options.clone(),
        git: collect_git_info(),
    };
    write_json_atomic(&root.join("config.json"), &config)?;

    let logs_path = root.join("logs.ndjson");
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&logs_path)?;

    Ok(RunPaths {
        report_path: root.join("report.json"),
        logs_path,
        root,
    })
}

pub fn write_report(
    paths: &RunPaths,
    generation: &GenerationReport,
    warnings: &[ValidationIssue],
    manifest: &ScriptManifest,
) -> RegistryResult<()> {
    write_json_atomic(
        &paths.report_path,
        &RunReport {
            generation,
            warnings,
            digest: &manifest.digest,
        },
    )
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}
