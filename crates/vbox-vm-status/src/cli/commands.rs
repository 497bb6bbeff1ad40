//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueHint};

use crate::completions::{Shell, VM_VALUE_NAME};
use crate::config::Config;
use crate::report::{OutputFormat, RenderOptions};
use crate::status::{StateFilter, StatusQuery};

/// Status command arguments.
#[derive(Debug, Default, Args)]
pub struct StatusCommand {
    /// Only show these VMs (exact name, or a substring if nothing matches exactly)
    #[arg(value_name = VM_VALUE_NAME)]
    pub names: Vec<String>,

    /// Only show running VMs
    #[arg(short, long, conflicts_with = "stopped")]
    pub running: bool,

    /// Only show VMs that are not running
    #[arg(short, long)]
    pub stopped: bool,

    /// Show OS type, memory, CPUs and when the state last changed
    #[arg(short, long)]
    pub details: bool,

    /// Show VM UUIDs
    #[arg(short, long)]
    pub uuid: bool,

    /// Output format [default: from config, else plain]
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

impl StatusCommand {
    /// The run-state filter selected by `--running` / `--stopped`.
    #[must_use]
    pub fn state_filter(&self) -> StateFilter {
        if self.running {
            StateFilter::Running
        } else if self.stopped {
            StateFilter::Stopped
        } else {
            StateFilter::All
        }
    }

    /// Merge these flags over `config`.
    ///
    /// Flags only ever switch display options on or pick a format; anything
    /// left unset falls back to the configuration.
    #[must_use]
    pub fn resolve(&self, config: &Config) -> (StatusQuery, OutputFormat, RenderOptions) {
        let mut options = config.render_options();
        options.details |= self.details;
        options.show_uuid |= self.uuid;
        let format = self.format.unwrap_or(config.display.format);

        let query = StatusQuery {
            names: self.names.clone(),
            filter: self.state_filter(),
            details: options.details,
            max_concurrent: config.vboxmanage.max_concurrent_queries,
        };
        (query, format, options)
    }
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only list running VMs
    #[arg(short, long)]
    pub running: bool,
}

/// Completions command arguments.
#[derive(Debug, Args)]
pub struct CompletionsCommand {
    /// Shell to generate the script for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
    },
}
