//! CLI definitions.
//!
//! Uses clap v4 with derive macros for argument parsing. The CLI layer
//! only parses input and builds an [`InstallContext`]; all behaviour lives
//! in the core modules.

use clap::{Args, Parser, Subcommand};

pub mod commands;

use crate::config::InstallContext;

/// pspm - project-scoped package manager for agent skills
#[derive(Parser, Debug)]
#[command(name = "pspm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Registry URL (overrides PSPM_REGISTRY_URL)
    #[arg(long, global = true)]
    pub registry: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add dependencies and install them
    Add(AddArgs),
    /// Install everything the manifest declares
    Install(InstallArgs),
    /// Remove dependencies
    Remove(RemoveArgs),
    /// Rebuild agent links from the lockfile
    Link(LinkArgs),
    /// List installed skills from the lockfile
    List,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Specifiers: @user/<username>/<name>[@range], github:<owner>/<repo>[/path][@ref], file:<path>
    #[arg(required = true)]
    pub specifiers: Vec<String>,

    /// Agents to link skills into (repeatable; `none` disables linking)
    #[arg(long)]
    pub agent: Vec<String>,
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Optional specifiers; when present this behaves exactly like `add`
    pub specifiers: Vec<String>,

    /// Agents to link skills into (repeatable; `none` disables linking)
    #[arg(long)]
    pub agent: Vec<String>,

    /// Refuse any fetch not already pinned by the lockfile
    #[arg(long)]
    pub frozen_lockfile: bool,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Dependency keys or specifiers to remove
    #[arg(required = true)]
    pub names: Vec<String>,
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Agents to link skills into (repeatable)
    #[arg(long)]
    pub agent: Vec<String>,
}

/// Build the install context from flags and environment. Agent selection
/// is headless: an explicit `--agent` wins, otherwise every built-in agent
/// is linked.
pub fn build_context(cli: &Cli, agents: &[String], frozen: bool) -> InstallContext {
    let project_root = std::env::current_dir().unwrap_or_else(|_| ".".into());
    let registry_url = cli
        .registry
        .clone()
        .or_else(|| std::env::var("PSPM_REGISTRY_URL").ok())
        .unwrap_or_else(|| crate::config::DEFAULT_REGISTRY_URL.to_string());

    let mut ctx = InstallContext::new(project_root)
        .with_registry_url(registry_url)
        .with_token(std::env::var("PSPM_API_KEY").ok().filter(|t| !t.is_empty()))
        .with_frozen(frozen);
    if !agents.is_empty() {
        ctx = ctx.with_agents(agents.to_vec());
    }
    ctx
}
