//! Command-line interface for groundlink.
//!
//! This module provides the CLI structure and command handlers for the
//! `gndctl` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    parse_time, ConfigCommand, JournalCommand, KindArg, OutputFormat, SeverityArg,
    SimulateCommand, TransitionsCommand,
};

/// gndctl - Drone fleet state and telemetry controls
///
/// Operates the fleet state core from the command line: flies simulated
/// sorties through it, prints the status transition reference, and inspects
/// the persisted event journal.
#[derive(Debug, Parser)]
#[command(name = "gndctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fly simulated sorties through the fleet core
    Simulate(SimulateCommand),

    /// Print the status transition table
    Transitions(TransitionsCommand),

    /// Inspect the persisted event journal
    #[command(subcommand)]
    Journal(JournalCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn transitions_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Transitions(TransitionsCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "gndctl");
    }

    #[test]
    fn test_verbosity_quiet() {
        let cli = transitions_cli(0, true);
        assert_eq!(cli.verbosity(), crate::logging::Verbosity::Quiet);
    }

    #[test]
    fn test_verbosity_normal() {
        let cli = transitions_cli(0, false);
        assert_eq!(cli.verbosity(), crate::logging::Verbosity::Normal);
    }

    #[test]
    fn test_verbosity_verbose() {
        let cli = transitions_cli(1, false);
        assert_eq!(cli.verbosity(), crate::logging::Verbosity::Verbose);
    }

    #[test]
    fn test_verbosity_trace() {
        let cli = transitions_cli(2, false);
        assert_eq!(cli.verbosity(), crate::logging::Verbosity::Trace);
    }

    #[test]
    fn test_cli_verify() {
        // Verify the CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_simulate() {
        let args = vec!["gndctl", "simulate", "--drones", "3"];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Simulate(cmd) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(cmd.drones, 3);
    }

    #[test]
    fn test_parse_transitions() {
        let args = vec!["gndctl", "transitions"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(cli.command, Command::Transitions(_)));
    }

    #[test]
    fn test_parse_journal_recent() {
        let args = vec![
            "gndctl",
            "journal",
            "recent",
            "--drone",
            "scout-1",
            "--min-severity",
            "warning",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Journal(JournalCommand::Recent {
            drone,
            min_severity,
            limit,
            ..
        }) = cli.command
        else {
            panic!("expected journal recent");
        };
        assert_eq!(drone.as_deref(), Some("scout-1"));
        assert_eq!(min_severity, Some(SeverityArg::Warning));
        assert_eq!(limit, 20);
    }

    #[test]
    fn test_parse_journal_prune() {
        let args = vec!["gndctl", "journal", "prune", "--keep", "1000", "--yes"];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Journal(JournalCommand::Prune { keep, yes, .. }) = cli.command else {
            panic!("expected journal prune");
        };
        assert_eq!(keep, Some(1000));
        assert!(yes);
    }

    #[test]
    fn test_parse_config_path() {
        let args = vec!["gndctl", "config", "path"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(cli.command, Command::Config(ConfigCommand::Path)));
    }

    #[test]
    fn test_parse_with_config() {
        let args = vec!["gndctl", "-c", "/custom/config.toml", "transitions"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_with_verbose() {
        let args = vec!["gndctl", "-v", "transitions"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_parse_with_quiet() {
        let args = vec!["gndctl", "-q", "transitions"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.quiet);
    }
}
