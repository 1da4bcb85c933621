mod registry;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use relforge_core::build_fk_graph_report;
use relforge_decl::{ValidatedCatalog, ValidationReport, catalog_json_schema, load_catalog};
use relforge_generate::{GenerateOptions, GenerationError, SqlGenerator, write_scripts};
use registry::{RunContext, init_run_logging, start_run, write_bytes_atomic, write_report};
use serde_json::Value;
use settings::{SettingsError, load_settings};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog is invalid: {errors} error(s)")]
    InvalidCatalog { errors: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Parser, Debug)]
#[command(name = "relforge", version, about = "Relforge CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a catalog document and print its validation report.
    Validate(ValidateArgs),
    /// Generate SQL scripts for a catalog into a new run directory.
    Generate(GenerateArgs),
    /// Print or write the JSON Schema of catalog documents.
    Schema(SchemaArgs),
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Catalog document (`*.entities.json`).
    #[arg(value_name = "CATALOG")]
    catalog: PathBuf,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Catalog document (`*.entities.json`).
    #[arg(value_name = "CATALOG")]
    catalog: PathBuf,
    /// Settings file; defaults to ./relforge.toml when present.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// Also write the scripts and manifest to this directory.
    #[arg(long)]
    out: Option<PathBuf>,
    /// SQL schema owning the generated objects.
    #[arg(long)]
    schema: Option<String>,
    /// Role granted EXECUTE on every procedure (repeatable).
    #[arg(long = "grant", value_name = "ROLE")]
    grant_roles: Vec<String>,
    /// Row limit of browsing views.
    #[arg(long)]
    view_row_limit: Option<u32>,
    /// Column encryption key for encrypted columns.
    #[arg(long)]
    encryption_key: Option<String>,
    /// Skip the shared support objects.
    #[arg(long, default_value_t = false)]
    no_support: bool,
    /// Skip category/status satellite tables.
    #[arg(long, default_value_t = false)]
    no_satellites: bool,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Write the schema here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Validate(args) => run_validate(args),
        Command::Generate(args) => run_generate(args),
        Command::Schema(args) => run_schema(args),
    }
}

fn run_validate(args: ValidateArgs) -> Result<(), CliError> {
    match load(&args.catalog)? {
        Ok(validated) => {
            let graph = build_fk_graph_report(&validated.catalog);
            let summary = serde_json::json!({
                "status": "ok",
                "entities": validated.catalog.len(),
                "warnings": validated.warnings,
                "fk_graph": graph,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Err(CliError::InvalidCatalog {
                errors: report.errors.len(),
            })
        }
    }
}

fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let loaded = load_settings(args.config.as_deref())?;
    let options = apply_overrides(loaded.settings.generate, &args)?;

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        run_dir: args.run_dir.clone(),
        catalog_path: args.catalog.clone(),
        settings_path: loaded.path,
        options: options.clone(),
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        catalog = %args.catalog.display(),
        schema = %options.schema,
    );
    let timer = Instant::now();

    let validated = match load(&args.catalog)? {
        Ok(validated) => validated,
        Err(report) => {
            for issue in &report.errors {
                tracing::error!(
                    event = "catalog_invalid",
                    code = %issue.code,
                    path = %issue.path,
                    message = %issue.message,
                );
            }
            tracing::info!(event = "run_finished", status = "invalid_catalog");
            return Err(CliError::InvalidCatalog {
                errors: report.errors.len(),
            });
        }
    };
    for issue in &validated.warnings {
        tracing::warn!(
            event = "catalog_warning",
            code = %issue.code,
            path = %issue.path,
            message = %issue.message,
        );
    }

    let output = SqlGenerator::new(options).generate(&validated.catalog)?;

    let manifest = write_scripts(&run_paths.root, &output.scripts)?;
    tracing::info!(
        event = "scripts_written",
        path = %run_paths.root.display(),
        scripts = manifest.scripts.len(),
        digest = %manifest.digest,
    );
    if let Some(out) = &args.out {
        write_scripts(out, &output.scripts)?;
        tracing::info!(event = "scripts_copied", path = %out.display());
    }

    write_report(&run_paths, &output.report, &validated.warnings, &manifest)?;

    let duration_ms = timer.elapsed().as_millis();
    tracing::info!(event = "run_finished", status = "success", duration_ms = duration_ms);

    println!("{}", run_paths.root.display());
    Ok(())
}

fn run_schema(args: SchemaArgs) -> Result<(), CliError> {
    let schema = serde_json::to_string_pretty(&catalog_json_schema())?;
    match args.out {
        Some(path) => write_bytes_atomic(&path, format!("{schema}\n").as_bytes())?,
        None => println!("{schema}"),
    }
    Ok(())
}

/// Read and validate a catalog; structural issues come back as `Ok(Err(_))`.
fn load(path: &Path) -> Result<Result<ValidatedCatalog, ValidationReport>, CliError> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let document: Value = serde_json::from_str(&content)?;
    let schema = serde_json::to_value(catalog_json_schema())?;
    Ok(load_catalog(&document, &schema))
}

/// Command-line flags win over `relforge.toml`.
fn apply_overrides(
    mut options: GenerateOptions,
    args: &GenerateArgs,
) -> Result<GenerateOptions, CliError> {
    if let Some(schema) = &args.schema {
        if schema.trim().is_empty() {
            return Err(CliError::InvalidConfig("--schema cannot be empty".to_string()));
        }
        options.schema = schema.clone();
    }
    if !args.grant_roles.is_empty() {
        options.grant_roles = args.grant_roles.clone();
    }
    if let Some(limit) = args.view_row_limit {
        if limit == 0 {
            return Err(CliError::InvalidConfig(
                "--view-row-limit must be positive".to_string(),
            ));
        }
        options.view_row_limit = limit;
    }
    if let Some(key) = &args.encryption_key {
        options.encryption_key = key.clone();
    }
    if args.no_support {
        options.emit_support = false;
    }
    if args.no_satellites {
        options.emit_satellites = false;
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_args(extra: &[&str]) -> GenerateArgs {
        let mut argv = vec!["relforge", "generate", "entities/crm.entities.json"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Generate(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn flags_override_settings() {
        let args = generate_args(&["--schema", "crm", "--grant", "app", "--grant", "ops", "--no-support"]);
        let base = GenerateOptions {
            grant_roles: vec!["legacy".to_string()],
            ..GenerateOptions::default()
        };
        let options = apply_overrides(base, &args).unwrap();
        assert_eq!(options.schema, "crm");
        assert_eq!(options.grant_roles, ["app", "ops"]);
        assert!(!options.emit_support);
        assert!(options.emit_satellites);
    }

    #[test]
    fn settings_survive_when_flags_are_absent() {
        let args = generate_args(&[]);
        let base = GenerateOptions {
            schema: "crm".to_string(),
            view_row_limit: 50,
            ..GenerateOptions::default()
        };
        let options = apply_overrides(base.clone(), &args).unwrap();
        assert_eq!(options, base);
        assert_eq!(args.run_dir, PathBuf::from("runs"));
    }

    #[test]
    fn rejects_zero_row_limit() {
        let args = generate_args(&["--view-row-limit", "0"]);
        assert!(matches!(
            apply_overrides(GenerateOptions::default(), &args),
            Err(CliError::InvalidConfig(_))
        ));
    }
}
