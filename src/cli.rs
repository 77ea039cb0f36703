//! # Command-Line Interface Module
//!
//! This module defines the command-line interface for Shufflr using Clap derive macros.
//!
//! ## Commands
//!
//! - `import`: Load a JSON catalog snapshot into the local catalog
//! - `list`: Display all catalogued tracks
//! - `shuffle`: Sequence tracks so that neighbours sound alike
//! - `completion`: Generate shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! shufflr import ~/Downloads/library.json
//! shufflr shuffle --timeout 20 --weight genre=4
//! shufflr shuffle 4uLU6hMCjMI75M1A2tKUQC 7GhIk7Il098yCjg4BQjzvb --json
//! ```

use crate::config::{ShuffleConfig, Weights};
use crate::error;
use crate::track::Feature;
use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "shufflr")]
#[command(about = "Shufflr: sequence tracks so that consecutive songs sound alike")]
#[command(version)]
pub struct Args {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Catalog database to use instead of the one in the data directory
    #[arg(long, global = true, env = "SHUFFLR_CATALOG", value_hint = ValueHint::FilePath)]
    pub catalog: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a catalog snapshot
    ///
    /// The snapshot is a JSON document `{"artists": [...], "tracks": [...]}`.
    /// Audio features are given on a 0-100 scale. Existing records with the
    /// same id are replaced.
    Import {
        /// Path to the snapshot file
        #[arg(value_hint = ValueHint::FilePath)]
        snapshot: PathBuf,
    },

    /// List all tracks in the catalog
    List,

    /// Sequence tracks so that consecutive tracks are similar
    ///
    /// Without track ids the whole catalog is sequenced. The search stops at the
    /// timeout, or earlier once the last improvement window contributed less than
    /// the improvement size to the total gain.
    Shuffle(ShuffleArgs),

    /// Generate shell completions
    ///
    /// Usage: shufflr completion bash > ~/.local/share/bash-completion/completions/shufflr
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct ShuffleArgs {
    /// Track ids to sequence (defaults to the whole catalog)
    pub track_ids: Vec<String>,

    /// Genre table snapshot
    #[arg(long, env = "SHUFFLR_GENRES", value_hint = ValueHint::FilePath)]
    pub genres: Option<PathBuf>,

    /// Configuration file
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Override a feature weight, e.g. `--weight genre=4` (repeatable)
    #[arg(long = "weight", value_name = "FEATURE=WEIGHT", value_parser = parse_weight)]
    pub weights: Vec<(Feature, f64)>,

    /// Search deadline in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// Minimum share of the total improvement the last window must contribute
    #[arg(long, value_name = "FRACTION")]
    pub improvement_size: Option<f64>,

    /// Length of the improvement window in seconds
    #[arg(long, value_name = "SECONDS")]
    pub improvement_timeout: Option<f64>,

    /// Keep only the first N sequenced tracks
    #[arg(long, value_name = "N")]
    pub max_songs: Option<usize>,

    /// Seed for reproducible searches
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

impl ShuffleArgs {
    /// Applies the command-line overrides on top of a loaded configuration.
    ///
    /// # Errors
    ///
    /// Rejects negative or non-finite weights.
    pub fn apply(&self, config: &mut ShuffleConfig) -> error::Result<()> {
        for &(feature, weight) in &self.weights {
            config.weights.set(feature, weight)?;
        }
        if let Some(timeout) = self.timeout {
            config.search.timeout_secs = timeout;
        }
        if let Some(size) = self.improvement_size {
            config.search.improvement_size = size;
        }
        if let Some(window) = self.improvement_timeout {
            config.search.improvement_timeout_secs = window;
        }
        if let Some(maximum) = self.max_songs {
            config.maximum_number_of_songs = Some(maximum);
        }
        if self.seed.is_some() {
            config.search.seed = self.seed;
        }
        Ok(())
    }
}

/// Parses `FEATURE=WEIGHT`.
fn parse_weight(s: &str) -> Result<(Feature, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FEATURE=WEIGHT, got `{s}`"))?;
    let feature: Feature = name.trim().parse().map_err(|e: error::ShuffleError| e.to_string())?;
    let weight: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid weight `{value}` for {feature}"))?;

    // Reuse the configuration-time check so the CLI rejects what a config file would.
    Weights::default().set(feature, weight).map_err(|e| e.to_string())?;
    Ok((feature, weight))
}
