//! Command-line arguments
//!
//! Global flags come first and override the configuration file; the
//! subcommand picks the loader operation to run.

use std::path::PathBuf;

use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};

use crate::record::api::RefineFlags;

#[derive(Parser, Debug, Clone)]
#[command(name = "softcenter")]
#[command(about = "Software center backend: search, update and manage applications")]
#[command(version)]
#[command(after_help = " * can be specified multiple times or as a comma-separated list")]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Plugins to exclude from discovery*
    #[arg(
        long = "exclude-plugin",
        value_name = "NAMES",
        action = ArgAction::Append,
        value_delimiter = ',',
        global = true
    )]
    pub plugin_exclusions: Vec<String>,

    /// Force coloured output on or off (default: only on a terminal)
    #[arg(short = 'g', long = "color", value_name = "BOOL", global = true)]
    pub color: Option<bool>,

    /// Log level
    #[arg(
        short = 'l',
        long = "log-level",
        value_name = "LEVEL",
        value_parser = ["trace", "debug", "info", "warn", "error", "off"],
        global = true
    )]
    pub log_level: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(
        short = 'o',
        long = "log-format",
        value_name = "FORMAT",
        value_parser = ["text", "simple", "ext", "extended", "json"],
        global = true
    )]
    pub log_format: Option<String>,

    /// Print results as JSON
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Refine requirements shared by the record-returning commands
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct RefineArgs {
    /// Fields to populate, e.g. licence,url,size*
    #[arg(
        short = 'r',
        long = "refine",
        value_name = "FLAGS",
        value_parser = RefineFlags::from_names,
        action = ArgAction::Append
    )]
    pub refine: Vec<RefineFlags>,
}

impl RefineArgs {
    pub fn flags(&self) -> RefineFlags {
        self.refine
            .iter()
            .fold(RefineFlags::DEFAULT, |acc, flags| acc | *flags)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Search every source for matching applications
    Search {
        /// Search terms
        #[arg(required = true, num_args = 1..)]
        terms: Vec<String>,
        #[command(flatten)]
        refine: RefineArgs,
    },
    /// List pending updates
    Updates {
        #[command(flatten)]
        refine: RefineArgs,
    },
    /// List available distribution upgrades
    DistroUpgrades {
        #[command(flatten)]
        refine: RefineArgs,
    },
    /// Refresh plugin metadata caches
    Refresh {
        /// Maximum cache age in seconds before a source is refetched
        #[arg(long = "cache-age", value_name = "SECONDS")]
        cache_age: Option<u64>,
    },
    /// Show everything known about one application
    Details {
        /// Application id, e.g. gimp.desktop
        id: String,
        #[command(flatten)]
        refine: RefineArgs,
    },
    /// Resolve a local file to an application
    File {
        path: PathBuf,
        #[command(flatten)]
        refine: RefineArgs,
    },
    /// Install an application
    Install { id: String },
    /// Remove an installed application
    Remove { id: String },
    /// Launch an installed application
    Launch { id: String },
    /// List loaded plugins in execution order
    Plugins,
}

impl Command {
    /// Subcommand name, used as log and error context
    pub fn name(&self) -> &'static str {
        match self {
            Command::Search { .. } => "search",
            Command::Updates { .. } => "updates",
            Command::DistroUpgrades { .. } => "distro-upgrades",
            Command::Refresh { .. } => "refresh",
            Command::Details { .. } => "details",
            Command::File { .. } => "file",
            Command::Install { .. } => "install",
            Command::Remove { .. } => "remove",
            Command::Launch { .. } => "launch",
            Command::Plugins => "plugins",
        }
    }
}

impl Args {
    /// Log file to use, with the magic values `none` and `-` disabling it
    pub fn effective_log_file(&self) -> Option<PathBuf> {
        self.log_file.clone().filter(|path| {
            let text = path.to_string_lossy();
            !(text.eq_ignore_ascii_case("none") || text == "-")
        })
    }
}
