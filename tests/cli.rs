//! CLI argument parsing tests.

use clap::Parser;
use pspm::cli::{Cli, Commands};

#[test]
fn add_requires_at_least_one_specifier() {
    assert!(Cli::try_parse_from(["pspm", "add"]).is_err());
}

#[test]
fn add_parses_specifiers_and_agents() {
    let cli = Cli::try_parse_from([
        "pspm",
        "add",
        "@user/alice/review@^1.0.0",
        "github:acme/prompts@v2",
        "--agent",
        "claude-code",
        "--agent",
        "cursor",
    ])
    .unwrap();
    match cli.command {
        Commands::Add(args) => {
            assert_eq!(args.specifiers.len(), 2);
            assert_eq!(args.agent, vec!["claude-code", "cursor"]);
        }
        other => panic!("expected add, got {other:?}"),
    }
}

#[test]
fn install_accepts_frozen_lockfile_flag() {
    let cli = Cli::try_parse_from(["pspm", "install", "--frozen-lockfile"]).unwrap();
    match cli.command {
        Commands::Install(args) => {
            assert!(args.frozen_lockfile);
            assert!(args.specifiers.is_empty());
        }
        other => panic!("expected install, got {other:?}"),
    }
}

#[test]
fn install_with_specifiers_keeps_them() {
    let cli = Cli::try_parse_from(["pspm", "install", "file:../my-skill"]).unwrap();
    match cli.command {
        Commands::Install(args) => {
            assert_eq!(args.specifiers, vec!["file:../my-skill"]);
        }
        other => panic!("expected install, got {other:?}"),
    }
}

#[test]
fn global_registry_flag_is_accepted_after_subcommand() {
    let cli = Cli::try_parse_from([
        "pspm",
        "install",
        "--registry",
        "https://registry.example",
    ])
    .unwrap();
    assert_eq!(cli.registry.as_deref(), Some("https://registry.example"));
}

#[test]
fn verbosity_counts_occurrences() {
    let cli = Cli::try_parse_from(["pspm", "-vv", "list"]).unwrap();
    assert_eq!(cli.verbose, 2);
}
