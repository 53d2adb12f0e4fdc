//! dupfu - concurrent duplicate file finder.
//!
//! A scan runs as a pipeline: a single walker feeds regular files through a
//! bounded queue to a pool of BLAKE3 fingerprint workers, whose results go
//! through a second bounded queue to one aggregator that owns the duplicate
//! registry. A stats reporter samples the registry on an interval. Once the
//! scan completes, duplicates can be deleted, moved, or exported.
//!
//! ```no_run
//! use dupfu::actions::{ActionConfig, ActionExecutor, AutoConfirm};
//! use dupfu::pipeline::{DuplicateFinder, ScanConfig};
//! use std::path::{Path, PathBuf};
//!
//! let outcome = DuplicateFinder::new(ScanConfig::default())
//!     .scan(Path::new("/data"))
//!     .unwrap();
//! let report = ActionExecutor::new(&outcome.duplicates, ActionConfig::default())
//!     .export(Path::new("/data/.dup-fu"), &AutoConfirm)
//!     .unwrap();
//! println!("{}", report.summary());
//! ```

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::actions::{ActionExecutor, ActionKind, ActionReport, AutoConfirm, Confirm};
use crate::cli::{ActionArg, Cli, PromptConfirm};
use crate::config::Config;
use crate::error::ExitCode;
use crate::output::OutputFormat;
use crate::pipeline::{DuplicateFinder, ScanOutcome};
use crate::progress::Progress;

/// Run the command-line application.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the scan fails
/// fatally or is interrupted, or an action cannot be set up.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color || !std::io::stdout().is_terminal() {
        yansi::disable();
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_from(Some(path.as_path()))
            .with_context(|| format!("Invalid configuration file {}", path.display()))?,
        None => Config::load(),
    };
    cli.apply_to(&mut config);

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(ExitCode::Success);
    }
    if cli.save_config {
        let path = save_config(&cli, &config)?;
        println!("Configuration written to {}", path.display());
        return Ok(ExitCode::Success);
    }

    let root = std::fs::canonicalize(&cli.path)
        .with_context(|| format!("Cannot open scan root {}", cli.path.display()))?;
    let destination = match &cli.dest {
        Some(dest) => scanner::resolve_path(dest)
            .with_context(|| format!("Invalid destination {}", dest.display()))?,
        None => config.default_destination(&root),
    };

    let shutdown = signal::install_handler().unwrap_or_else(|e| {
        log::warn!("{}; Ctrl+C will terminate immediately", e);
        signal::ShutdownHandler::new()
    });

    let quiet = cli.quiet || cli.output == OutputFormat::Json;
    let progress = Arc::new(Progress::new(quiet));
    let finder = DuplicateFinder::new(config.scan_config(Some(destination.as_path())))
        .with_observer(progress)
        .with_cancel_token(shutdown.scan_token());

    let outcome = finder
        .scan(&root)
        .with_context(|| format!("Scan of {} failed", root.display()))?;

    let action = run_action(&cli, &config, &outcome, &destination)?;
    let exit_code = exit_code_for(&outcome, action.as_ref());

    match cli.output {
        OutputFormat::Text => print!("{}", output::render_text(&outcome, action.as_ref())),
        OutputFormat::Json => println!(
            "{}",
            output::json::render(&outcome, action.as_ref(), exit_code)?
        ),
    }

    Ok(exit_code)
}

/// Write `config` to `--config FILE`, or to the platform config file.
fn save_config(cli: &Cli, config: &Config) -> Result<PathBuf> {
    let path = cli
        .config
        .clone()
        .or_else(Config::config_path)
        .context("No configuration directory on this platform; pass --config FILE")?;
    config.save_to(&path)?;
    log::info!("Saved configuration to {}", path.display());
    Ok(path)
}

fn run_action(
    cli: &Cli,
    config: &Config,
    outcome: &ScanOutcome,
    destination: &Path,
) -> Result<Option<ActionReport>> {
    let kind = match cli.action {
        ActionArg::None => return Ok(None),
        ActionArg::Delete => ActionKind::Delete,
        ActionArg::Move => ActionKind::Move,
        ActionArg::Export => ActionKind::Export,
    };
    if outcome.duplicates.is_empty() {
        log::info!("No duplicates; skipping {}", kind);
        return Ok(None);
    }

    let confirm: &dyn Confirm = if cli.yes || !kind.is_destructive() {
        &AutoConfirm
    } else {
        &PromptConfirm
    };
    let executor = ActionExecutor::new(
        &outcome.duplicates,
        config.action_config(cli.permanent),
    );

    let report = match kind {
        ActionKind::Delete => executor.delete(confirm),
        ActionKind::Move => executor.relocate(destination, confirm),
        ActionKind::Export => executor.export(destination, confirm),
    }
    .with_context(|| format!("{kind} failed"))?;

    Ok(Some(report))
}

/// Exit code for a completed run.
#[must_use]
pub fn exit_code_for(outcome: &ScanOutcome, action: Option<&ActionReport>) -> ExitCode {
    let action_failed = action.is_some_and(|a| !a.all_succeeded());
    if outcome.report.has_errors() || action_failed {
        ExitCode::PartialSuccess
    } else if outcome.duplicates.is_empty() {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    }
}
