//! Command-line interface for vbox-vm-status.
//!
//! This module provides the CLI structure for the `vbox-vm-status` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

pub use commands::{CompletionsCommand, ConfigCommand, ListCommand, StatusCommand};

use crate::logging::Verbosity;

/// vbox-vm-status - Show the status of all VirtualBox VMs
///
/// Lists every registered virtual machine and whether it is running, using
/// VirtualBox's `VBoxManage` tool. Without a command, runs `status`.
#[derive(Debug, Parser)]
#[command(name = "vbox-vm-status")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show VM status (the default)
    Status(StatusCommand),

    /// List VM names, one per line
    List(ListCommand),

    /// Print a shell completion script
    Completions(CompletionsCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }

    /// The command to run, defaulting to `status`.
    #[must_use]
    pub fn command_or_default(self) -> Command {
        self.command
            .unwrap_or_else(|| Command::Status(StatusCommand::default()))
    }
}

/// Exit status for a failed parse: 0 for `--help` / `--version`, 1 otherwise.
#[must_use]
pub fn parse_exit_code(err: &clap::Error) -> i32 {
    i32::from(err.use_stderr())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::OutputFormat;
    use crate::status::StateFilter;
    use clap::CommandFactory;

    fn cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: None,
        }
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "vbox-vm-status");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli(3, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_no_command_defaults_to_status() {
        let cli = Cli::try_parse_from(["vbox-vm-status"]).unwrap();
        assert!(cli.command.is_none());
        match cli.command_or_default() {
            Command::Status(status) => {
                assert!(status.names.is_empty());
                assert_eq!(status.state_filter(), StateFilter::All);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_status_with_names_and_flags() {
        let cli = Cli::try_parse_from([
            "vbox-vm-status",
            "status",
            "web",
            "db server",
            "--running",
            "-d",
            "--format",
            "table",
        ])
        .unwrap();
        let Some(Command::Status(status)) = cli.command else {
            panic!("expected status command");
        };
        assert_eq!(status.names, vec!["web".to_string(), "db server".to_string()]);
        assert_eq!(status.state_filter(), StateFilter::Running);
        assert!(status.details);
        assert_eq!(status.format, Some(OutputFormat::Table));
    }

    #[test]
    fn test_parse_running_conflicts_with_stopped() {
        let result = Cli::try_parse_from(["vbox-vm-status", "status", "--running", "--stopped"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_unknown_format_rejected() {
        let result = Cli::try_parse_from(["vbox-vm-status", "status", "-f", "yaml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_list() {
        let cli = Cli::try_parse_from(["vbox-vm-status", "list", "--running"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::List(ListCommand { running: true }))
        ));
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["vbox-vm-status", "completions", "bash"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Completions(_))));

        assert!(Cli::try_parse_from(["vbox-vm-status", "completions", "tcsh"]).is_err());
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = Cli::try_parse_from([
            "vbox-vm-status",
            "config",
            "validate",
            "--file",
            "/tmp/config.toml",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Config(ConfigCommand::Validate { file: Some(_) }))
        ));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["vbox-vm-status", "list", "-c", "/custom/config.toml", "-vv"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_exit_code() {
        let err = Cli::try_parse_from(["vbox-vm-status", "web"]).unwrap_err();
        assert_eq!(parse_exit_code(&err), 1);

        let err = Cli::try_parse_from(["vbox-vm-status", "--running"]).unwrap_err();
        assert_eq!(parse_exit_code(&err), 1);

        let err = Cli::try_parse_from(["vbox-vm-status", "--help"]).unwrap_err();
        assert_eq!(parse_exit_code(&err), 0);

        let err = Cli::try_parse_from(["vbox-vm-status", "--version"]).unwrap_err();
        assert_eq!(parse_exit_code(&err), 0);
    }

    #[test]
    fn test_completion_script_covers_cli() {
        let script = crate::completions::bash_completion(&Cli::command());
        assert!(script.contains("complete -F _vbox_vm_status vbox-vm-status"));
        assert!(script.contains("\":status\") path=\"status\" ;;"));
        assert!(script.contains("\"config:validate\") path=\"config validate\" ;;"));
        assert!(script.contains("compgen -W \"plain table json\""));
        assert!(script.contains("_vbox_vm_status_vms \"$cur\""));
    }
}
