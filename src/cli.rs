//! Command-line interface definitions.
//!
//! ```bash
//! # Report duplicates under ~/Pictures
//! dupfu ~/Pictures
//!
//! # Move duplicates into ~/dupes without prompting
//! dupfu ~/Pictures ~/dupes --action move --yes
//!
//! # JSON report for scripting
//! dupfu ~/Pictures --output json
//! ```

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::actions::{ActionPlan, Confirm};
use crate::config::Config;
use crate::output::OutputFormat;

/// Concurrent duplicate file finder.
///
/// Walks PATH, fingerprints every regular file with BLAKE3 on a pool of
/// workers, and groups identical files. The oldest file of each group is
/// kept; the others can be deleted, moved to DEST, or listed in a manifest.
#[derive(Debug, Parser)]
#[command(name = "dupfu")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to scan
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Destination for moved files and the manifest [default: PATH/.dup-fu]
    #[arg(value_name = "DEST")]
    pub dest: Option<PathBuf>,

    /// What to do with the duplicates once the scan completes
    #[arg(short, long, value_enum, default_value = "none")]
    pub action: ActionArg,

    /// Skip confirmation prompts
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Delete permanently instead of moving to the trash
    #[arg(long)]
    pub permanent: bool,

    /// Do not re-check and byte-compare duplicates before deleting or moving
    #[arg(long)]
    pub no_verify: bool,

    /// Number of fingerprint workers [default: available parallelism]
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Glob pattern to ignore (can be given multiple times)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Configuration file [default: platform config dir]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Write the effective configuration to the configuration file and exit
    #[arg(long, conflicts_with = "print_config")]
    pub save_config: bool,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress and all log output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,
}

/// Action selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ActionArg {
    /// Report only
    #[default]
    None,
    /// Delete duplicates (trash unless --permanent)
    Delete,
    /// Move duplicates into DEST
    Move,
    /// Write DEST/<manifest_name> listing the duplicates
    Export,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.skip_hidden {
            config.skip_hidden = true;
        }
        config
            .ignore_patterns
            .extend(self.ignore_patterns.iter().cloned());
        if self.no_verify {
            config.verify_before_action = false;
        }
    }
}

/// Asks on the terminal before an action runs.
///
/// Anything other than `y`/`yes` (including end of input) declines.
#[derive(Debug, Default)]
pub struct PromptConfirm;

impl Confirm for PromptConfirm {
    fn confirm(&self, plan: &ActionPlan) -> bool {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            log::warn!("Not a terminal; pass --yes to run actions non-interactively");
        }
        let mut stderr = io::stderr();
        let _ = write!(stderr, "{}? [y/N] ", plan.describe());
        let _ = stderr.flush();

        let mut answer = String::new();
        match stdin.lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(e) => {
                log::warn!("Failed to read confirmation: {}", e);
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
