//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand, ValueEnum};

use crate::events::Severity;

/// Simulate command arguments.
#[derive(Debug, Args)]
pub struct SimulateCommand {
    /// Number of drones to fly
    #[arg(short, long, default_value = "2")]
    pub drones: usize,

    /// Seconds spent cruising at altitude
    #[arg(long, default_value = "3")]
    pub cruise_secs: u64,

    /// Milliseconds between telemetry samples
    #[arg(long, default_value = "200")]
    pub sample_interval_ms: u64,

    /// Record the sortie into the configured journal file
    /// instead of an in-memory one
    #[arg(long)]
    pub record: bool,
}

/// Transitions command arguments.
#[derive(Debug, Args)]
pub struct TransitionsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Journal inspection commands.
#[derive(Debug, Subcommand)]
pub enum JournalCommand {
    /// Show recent journal events
    Recent {
        /// Filter by drone id
        #[arg(short, long)]
        drone: Option<String>,

        /// Filter by change kind
        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,

        /// Only show events at or above this severity
        #[arg(short = 's', long, value_enum)]
        min_severity: Option<SeverityArg>,

        /// Show events since this time (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Show events until this time
        #[arg(long)]
        until: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show journal statistics
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Prune the journal down to the configured limits
    Prune {
        /// Override the maximum event age in days (0 disables the age limit)
        #[arg(long)]
        max_age_days: Option<u32>,

        /// Override the number of events to keep (0 keeps everything)
        #[arg(long)]
        keep: Option<usize>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
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
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Change-kind argument for filtering journal events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Drone registrations
    Registered,
    /// Drone deregistrations
    Deregistered,
    /// Status transitions
    StatusChanged,
    /// Flight mode changes
    ModeChanged,
    /// Accepted telemetry snapshots
    SnapshotIngested,
    /// Payload releases
    PayloadReleased,
}

impl KindArg {
    /// The machine tag this argument selects, as stored in the journal.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            KindArg::Registered => "registered",
            KindArg::Deregistered => "deregistered",
            KindArg::StatusChanged => "status_changed",
            KindArg::ModeChanged => "mode_changed",
            KindArg::SnapshotIngested => "snapshot_ingested",
            KindArg::PayloadReleased => "payload_released",
        }
    }
}

/// Severity argument for filtering journal events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SeverityArg {
    /// Routine bookkeeping
    Info,
    /// Deliberate, successful operations
    Notice,
    /// Off-nominal but not urgent
    Warning,
    /// Contact lost in a dangerous situation
    Critical,
    /// Safety triggers
    Emergency,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Info => Self::Info,
            SeverityArg::Notice => Self::Notice,
            SeverityArg::Warning => Self::Warning,
            SeverityArg::Critical => Self::Critical,
            SeverityArg::Emergency => Self::Emergency,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

/// Parse a user-supplied time bound.
///
/// Accepts a full RFC 3339 timestamp or a bare `YYYY-MM-DD` date, which is
/// taken as midnight UTC.
///
/// # Errors
///
/// Returns a description of the expected formats when the input matches
/// neither.
pub fn parse_time(input: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    Err(format!(
        "cannot parse {input:?} as a time; use RFC 3339 or YYYY-MM-DD"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Timelike;

    use crate::events::ChangeKind;

    #[test]
    fn test_kind_arg_tags_match_stored_tags() {
        assert_eq!(KindArg::Registered.tag(), ChangeKind::Registered.tag());
        assert_eq!(KindArg::Deregistered.tag(), ChangeKind::Deregistered.tag());
        assert_eq!(
            KindArg::SnapshotIngested.tag(),
            ChangeKind::SnapshotIngested { sequence_number: 0 }.tag()
        );
        assert_eq!(
            KindArg::PayloadReleased.tag(),
            ChangeKind::PayloadReleased.tag()
        );
    }

    #[test]
    fn test_severity_arg_conversion() {
        assert_eq!(Severity::from(SeverityArg::Info), Severity::Info);
        assert_eq!(Severity::from(SeverityArg::Notice), Severity::Notice);
        assert_eq!(Severity::from(SeverityArg::Warning), Severity::Warning);
        assert_eq!(Severity::from(SeverityArg::Critical), Severity::Critical);
        assert_eq!(Severity::from(SeverityArg::Emergency), Severity::Emergency);
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }

    #[test]
    fn test_parse_time_rfc3339() {
        let at = parse_time("2026-03-14T09:26:53Z").unwrap();
        assert_eq!(at.hour(), 9);
        assert_eq!(at.minute(), 26);
    }

    #[test]
    fn test_parse_time_date_only() {
        let at = parse_time("2026-03-14").unwrap();
        assert_eq!(at.hour(), 0);
        assert_eq!(at.minute(), 0);
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        assert!(parse_time("three days ago").is_err());
        assert!(parse_time("").is_err());
    }

    #[test]
    fn test_simulate_command_debug() {
        let cmd = SimulateCommand {
            drones: 2,
            cruise_secs: 3,
            sample_interval_ms: 200,
            record: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("drones"));
    }

    #[test]
    fn test_journal_command_debug() {
        let cmd = JournalCommand::Stats { json: true };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Stats"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }

    #[test]
    fn test_kind_arg_clone() {
        let arg = KindArg::StatusChanged;
        let cloned = arg;
        assert_eq!(arg, cloned);
    }

    #[test]
    fn test_output_format_clone() {
        let format = OutputFormat::Table;
        let cloned = format;
        assert_eq!(format, cloned);
    }
}
