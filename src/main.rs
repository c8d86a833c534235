//! pspm - project-scoped package manager for agent skills.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pspm::cli::{commands, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match commands::run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            if let Some(remedy) = e.remedy() {
                eprintln!("  {remedy}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,pspm=info",
        1 => "info,pspm=debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
