use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::paths::DEFAULT_MANIFEST;

#[derive(Parser)]
#[command(name = "consul-keys")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declaratively manage Consul key/value entries", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Provider config file [default: <config dir>/config.toml]
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<String>,

    /// State file [default: <state dir>/state.json]
    #[arg(long, global = true, value_name = "PATH")]
    pub state: Option<String>,

    /// Consul agent address (host:port or URL)
    #[arg(long, global = true, value_name = "ADDR")]
    pub address: Option<String>,

    /// ACL token
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Datacenter used when the agent refuses to report its own
    #[arg(long, global = true, value_name = "DC")]
    pub datacenter: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(PlanArgs),

    /// Make the store match the manifest
    Apply(ApplyArgs),

    /// Re-read tracked keys and report drift
    Refresh(RefreshArgs),

    /// Stop managing resources, deleting keys marked for deletion
    Destroy(DestroyArgs),

    /// Show tracked keys and their values
    Show(ShowArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Arguments
// ============================================================================

#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Only act on this resource
    #[arg(short, long, value_name = "NAME")]
    pub resource: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Manifest file
    #[arg(short, long, default_value = DEFAULT_MANIFEST, value_name = "FILE")]
    pub file: String,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    /// Manifest file
    #[arg(short, long, default_value = DEFAULT_MANIFEST, value_name = "FILE")]
    pub file: String,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Show the plan without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RefreshArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Manifest file, consulted for per-resource tokens
    #[arg(short, long, default_value = DEFAULT_MANIFEST, value_name = "FILE")]
    pub file: String,
}

#[derive(Args, Debug, Clone)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Manifest file, consulted for per-resource tokens
    #[arg(short, long, default_value = DEFAULT_MANIFEST, value_name = "FILE")]
    pub file: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}
