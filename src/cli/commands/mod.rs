//! CLI command implementations.

use crate::cli::{build_context, Cli, Commands};
use crate::error::Result;
use crate::installer::{InstallReport, Installer};

pub mod list;

/// Dispatch a command. Returns whether the run was fully successful; a
/// partially failed install reports per-package errors and exits non-zero
/// without an extra top-level error.
pub fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Commands::Add(args) => {
            let ctx = build_context(cli, &args.agent, false);
            let report = Installer::new(&ctx)?.add(&args.specifiers)?;
            print_report(&report, cli.quiet);
            Ok(report.success())
        }
        Commands::Install(args) => {
            let ctx = build_context(cli, &args.agent, args.frozen_lockfile);
            let installer = Installer::new(&ctx)?;
            // `install` with explicit specifiers is `add`.
            let report = if args.specifiers.is_empty() {
                installer.install()?
            } else {
                installer.add(&args.specifiers)?
            };
            print_report(&report, cli.quiet);
            Ok(report.success())
        }
        Commands::Remove(args) => {
            let ctx = build_context(cli, &[], false);
            let report = Installer::new(&ctx)?.remove(&args.names)?;
            print_report(&report, cli.quiet);
            Ok(report.success())
        }
        Commands::Link(args) => {
            let ctx = build_context(cli, &args.agent, false);
            let report = Installer::new(&ctx)?.link()?;
            print_report(&report, cli.quiet);
            Ok(report.success())
        }
        Commands::List => {
            let ctx = build_context(cli, &[], false);
            list::run(&ctx)?;
            Ok(true)
        }
    }
}

fn print_report(report: &InstallReport, quiet: bool) {
    if !quiet {
        for package in &report.installed {
            if package.version == "removed" {
                println!("- {}", package.key);
            } else {
                println!("+ {}@{}", package.key, package.version);
            }
        }
        for warning in &report.warnings {
            eprintln!("warning: {warning}");
        }
    }
    for failure in &report.failures {
        eprintln!("error: {}: {}", failure.key, failure.error);
    }
}
