mod cli;
mod commands;
mod config;
mod engine;
mod manifest;
mod paths;
mod state;
mod store;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use reconcile::ProviderDefaults;
use std::io;

use config::{Overrides, ProviderConfig};
use state::StateFile;
use store::ConsulStore;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    config: Option<String>,
    state: Option<String>,
    overrides: Overrides,
}

impl Context {
    /// Provider settings from the config file, environment and flags
    pub fn provider(&self) -> Result<ProviderConfig> {
        let path = paths::config_file(self.config.as_deref())?;
        ProviderConfig::load(&path, &self.overrides)
    }

    pub fn state_file(&self) -> Result<StateFile> {
        StateFile::load(&paths::state_file(self.state.as_deref())?)
    }

    /// Store handle for the configured agent, with the defaults used for
    /// scope resolution
    pub fn connect(&self) -> Result<(ConsulStore, ProviderDefaults)> {
        let provider = self.provider()?;
        log::debug!(
            "Using Consul agent at {}",
            provider.client_config().base_url()
        );
        Ok((ConsulStore::new(provider.client()), provider.defaults()))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        state: cli.state,
        overrides: Overrides {
            address: cli.address,
            token: cli.token,
            datacenter: cli.datacenter,
        },
    };
    log::trace!("Verbosity {}", ctx.verbose);

    match cli.command {
        Command::Plan(args) => commands::plan::run(&ctx, &args),
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Refresh(args) => commands::refresh::run(&ctx, &args),
        Command::Destroy(args) => commands::destroy::run(&ctx, &args),
        Command::Show(args) => commands::show::run(&ctx, &args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "consul-keys", &mut io::stdout());
            Ok(())
        }
    }
}
