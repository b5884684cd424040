//! bonnie-blocks command line
//!
//! Usage:
//!   bonnie-blocks load assets/samples/datablocks      # load a directory
//!   bonnie-blocks load a.ron b.ron --two-phase        # explicit files
//!   bonnie-blocks check assets/samples/datablocks/*   # classify paths
//!   bonnie-blocks manifest assets/samples/datablocks  # regenerate manifest

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bonnie_blocks::{
    load_with_config, BatchReport, DeclarationFile, Diagnostic, DiagnosticSink, FileBatch, FsHost,
    LoadStrategy, LoaderConfig, LogSink,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bonnie-blocks")]
#[command(version, about = "Load BONNIE-32 datablock declarations")]
struct Cli {
    /// Loader config (defaults to <config dir>/bonnie-blocks/loader.ron)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load declaration files and directories as one batch
    Load {
        /// Files or directories (directories use their manifest when present)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Single pass, no retries
        #[arg(long)]
        no_retry: bool,
        /// Resolve references before instantiating instead of retrying
        #[arg(long)]
        two_phase: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Write every loaded record to this file
        #[arg(long)]
        export: Option<PathBuf>,
        /// Compress the exported file
        #[arg(long, requires = "export")]
        compress: bool,
    },
    /// Show whether each path is a loadable declaration file
    Check {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Regenerate a directory's manifest from its declaration files
    Manifest { dir: PathBuf },
}

fn main() -> Result<()> {
    crashlog::setup!(crashlog::cargo_metadata!().capitalized(), false);

    let cli = Cli::parse();
    let mut config = LoaderConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load loader config")?;

    init_logging(&config);

    match cli.command {
        Commands::Load {
            paths,
            no_retry,
            two_phase,
            json,
            export,
            compress,
        } => {
            if no_retry {
                config.recurse = false;
            }
            if two_phase {
                config.strategy = LoadStrategy::TwoPhase;
            }
            load(&config, &paths, json, export.as_deref(), compress)
        }
        Commands::Check { paths } => {
            check(&config, &paths);
            Ok(())
        }
        Commands::Manifest { dir } => manifest(&config, &dir),
    }
}

/// `RUST_LOG` overrides the configured filter
fn init_logging(config: &LoaderConfig) {
    env_logger::Builder::new()
        .parse_filters(&config.log_filter)
        .parse_env("RUST_LOG")
        .init();
}

/// Expand directories into their files, keeping argument order
fn collect_batch(config: &LoaderConfig, paths: &[PathBuf]) -> Result<FileBatch> {
    let mut batch = FileBatch::new();
    for path in paths {
        if path.is_dir() {
            let files = FileBatch::load_dir(path, config)
                .with_context(|| format!("Failed to read directory {}", path.display()))?;
            batch.extend(files);
        } else {
            batch.push(path.clone());
        }
    }
    Ok(batch)
}

fn load(
    config: &LoaderConfig,
    paths: &[PathBuf],
    json: bool,
    export: Option<&Path>,
    compress: bool,
) -> Result<()> {
    let batch = collect_batch(config, paths)?;
    let mut host = FsHost::new(config.extensions.clone());

    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let report = load_with_config(&mut host, batch, config, &mut diagnostics);

    if json {
        let output = serde_json::json!({
            "report": report,
            "diagnostics": diagnostics,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let mut sink = LogSink;
        for diagnostic in diagnostics {
            sink.emit(diagnostic);
        }
        print_summary(&report, host.registry().len());
    }

    if let Some(out) = export {
        host.registry()
            .export()
            .save(out, compress)
            .with_context(|| format!("Failed to export records to {}", out.display()))?;
        log::info!("Exported {} record(s) to {:?}", host.registry().len(), out);
    }

    if !report.is_success() {
        anyhow::bail!(
            "{} file(s) failed to load ({} unresolved record(s))",
            report.failed.len(),
            report.unresolved_count()
        );
    }
    Ok(())
}

fn print_summary(report: &BatchReport, records: usize) {
    for pass in &report.passes {
        println!(
            "pass {}{}: {} file(s), {} unresolved",
            pass.pass,
            if pass.forced { " (final)" } else { "" },
            pass.files,
            pass.failures
        );
    }
    for skipped in &report.skipped {
        println!("skipped ({}): {}", skipped.kind, skipped.path.display());
    }
    for failed in &report.failed {
        println!("failed: {}", failed.path.display());
        for unresolved in &failed.unresolved {
            println!("  {} -> missing '{}'", unresolved.record, unresolved.missing);
        }
    }
    println!("{} record(s) loaded", records);
}

fn check(config: &LoaderConfig, paths: &[PathBuf]) {
    for path in paths {
        let kind = DeclarationFile::new(path.clone()).classify(&config.extensions);
        println!("{:<12} {}", kind.label(), path.display());
    }
}

fn manifest(config: &LoaderConfig, dir: &Path) -> Result<()> {
    let batch = FileBatch::discover(dir, &config.extensions)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;
    batch
        .write_manifest(dir, &config.manifest)
        .with_context(|| format!("Failed to write manifest in {}", dir.display()))?;
    println!("Wrote {} entries to {}", batch.len(), dir.join(&config.manifest).display());
    Ok(())
}
