//! `vbox-vm-status` - CLI for showing VirtualBox VM status
//!
//! This binary provides the command-line interface: it loads configuration,
//! queries `VBoxManage`, and prints the report to stdout.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing::debug;

use vbox_vm_status::cli::{
    parse_exit_code, Cli, Command, ConfigCommand, ListCommand, StatusCommand,
};
use vbox_vm_status::report::render_names;
use vbox_vm_status::{
    collect_status, completions, init_logging, platform, render, Config, Hypervisor,
    StateFilter, StatusQuery, VBoxManage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::try_parse().unwrap_or_else(|err| {
        let _ = err.print();
        std::process::exit(parse_exit_code(&err));
    });

    init_logging(cli.verbosity());

    let config_path = cli.config.clone();

    // Only commands that need configuration load it
    match cli.command_or_default() {
        Command::Status(status_cmd) => handle_status(&load_config(config_path)?, status_cmd).await,
        Command::List(list_cmd) => handle_list(&load_config(config_path)?, &list_cmd).await,
        Command::Completions(cmd) => {
            print!("{}", completions::generate(cmd.shell, &Cli::command()));
            Ok(())
        }
        Command::Config(config_cmd) => handle_config(config_path, config_cmd).await,
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let config = Config::load_from(path).context("loading configuration")?;
    debug!(?config, "Loaded configuration");
    Ok(config)
}

fn hypervisor(config: &Config) -> Arc<dyn Hypervisor> {
    let vbox = VBoxManage::new(config.vboxmanage_path(), config.timeout());
    debug!(
        program = %vbox.program().display(),
        timeout = ?vbox.timeout(),
        platform = platform::platform_name(),
        "Using VBoxManage"
    );
    Arc::new(vbox)
}

async fn handle_status(config: &Config, cmd: StatusCommand) -> anyhow::Result<()> {
    let (query, format, options) = cmd.resolve(config);

    let report = collect_status(hypervisor(config), &query)
        .await
        .context("collecting VM status")?;
    print!("{}", render(&report, format, &options)?);
    Ok(())
}

async fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let query = StatusQuery {
        filter: if cmd.running {
            StateFilter::Running
        } else {
            StateFilter::All
        },
        ..StatusQuery::default()
    };

    let report = collect_status(hypervisor(config), &query)
        .await
        .context("listing VMs")?;
    print!("{}", render_names(&report.vms));
    Ok(())
}

async fn handle_config(config_path: Option<PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = load_config(config_path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[vboxmanage]");
                println!("  Path:               {}", config.vboxmanage_path().display());
                println!("  Timeout (secs):     {}", config.vboxmanage.timeout_secs);
                println!(
                    "  Max queries:        {}",
                    config.vboxmanage.max_concurrent_queries
                );
                println!();
                println!("[display]");
                println!("  Format:             {}", config.display.format);
                println!("  Details:            {}", config.display.details);
                println!("  Show UUID:          {}", config.display.show_uuid);
            }
        }
        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            let config = Config::load_from(Some(path)).context("configuration is invalid")?;
            println!("Configuration is valid.");

            let program = config.vboxmanage_path();
            let version = hypervisor(&config)
                .version()
                .await
                .with_context(|| format!("checking {}", program.display()))?;
            println!("VBoxManage {version} at {}", program.display());
        }
    }
    Ok(())
}
