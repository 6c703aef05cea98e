//! `gndctl` - CLI for groundlink
//!
//! This binary operates the fleet state core from the command line: it flies
//! simulated sorties, prints the status transition reference, and inspects
//! the persisted event journal.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use tokio::sync::{broadcast, mpsc};

use groundlink::cli::{
    parse_time, Cli, Command, ConfigCommand, JournalCommand, OutputFormat, SimulateCommand,
    TransitionsCommand,
};
use groundlink::journal::{self, Journal, JournalRecord};
use groundlink::source::{pump, PumpStats};
use groundlink::status::{transition, StatusEvent};
use groundlink::telemetry::RawSample;
use groundlink::{
    init_logging, Capability, Config, DroneId, DroneSpec, Fleet, FlightMode, Severity, Status,
};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Simulate(cmd) => handle_simulate(&config, &cmd).await,
        Command::Transitions(cmd) => handle_transitions(&cmd),
        Command::Journal(cmd) => handle_journal(&config, cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

/// Fly one scripted sortie per drone and stream the published changes to the
/// console while a recorder drains them into the journal.
async fn handle_simulate(config: &Config, cmd: &SimulateCommand) -> CliResult {
    let fleet = Fleet::new(config)?;

    let journal = if cmd.record {
        Journal::open(config.journal_path())?
    } else {
        Journal::open_in_memory()?
    };
    let recorder = tokio::spawn(journal::recorder(
        journal,
        fleet.subscribe(),
        config.clone(),
    ));

    let mut events = fleet.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(change) => println!(
                    "{} [{:<9}] {:<10} {}",
                    change.at.format("%H:%M:%S%.3f"),
                    change.severity,
                    change.drone_id,
                    change.kind
                ),
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let interval = Duration::from_millis(cmd.sample_interval_ms.max(1));
    let cruise_ticks = (cmd.cruise_secs * 1000 / cmd.sample_interval_ms.max(1)).max(1);

    let mut sorties = Vec::new();
    for n in 1..=cmd.drones.max(1) {
        let id = DroneId::new(format!("sim-{n}"))?;
        let spec = DroneSpec::new(id.clone())
            .with_capability(Capability::Video)
            .with_capability(Capability::PayloadBay);
        fleet.register(spec).await?;
        sorties.push(tokio::spawn(fly_sortie(
            fleet.clone(),
            id,
            cruise_ticks,
            interval,
        )));
    }

    let mut accepted = 0;
    for sortie in sorties {
        let stats = sortie.await??;
        accepted += stats.accepted;
    }

    // Wind down so the recorder and printer see the stream end.
    for id in fleet.list().await {
        fleet.deregister(&id).await?;
    }
    drop(fleet);
    printer.await?;

    let journal = recorder.await?;
    let stats = journal.stats()?;
    println!();
    println!(
        "Sorties complete: {} drones, {} samples accepted, {} events journaled.",
        cmd.drones.max(1),
        accepted,
        stats.total_events
    );
    if cmd.record {
        println!("Journal: {}", journal.path().display());
    }
    Ok(())
}

/// One full sortie: connect, arm, climb out, cruise with a mode change and a
/// payload drop, then land and reset for the next crew.
async fn fly_sortie(
    fleet: Fleet,
    id: DroneId,
    cruise_ticks: u64,
    interval: Duration,
) -> groundlink::Result<PumpStats> {
    let (tx, rx) = mpsc::channel(32);
    let pump_task = tokio::spawn(pump(fleet.clone(), id.clone(), rx));

    let mut battery = 100.0;
    let mut sample = |altitude: f64, sink_rate: f64| {
        battery -= 0.05;
        let mut sample = RawSample::new(Utc::now());
        sample.latitude = 59.93;
        sample.longitude = 30.31;
        sample.absolute_altitude = 20.0 + altitude;
        sample.relative_altitude = altitude;
        sample.velocity_z = sink_rate;
        sample.battery_percent = battery;
        sample
    };

    fleet
        .request_transition(&id, StatusEvent::ConnectionEstablished)
        .await?;
    let _ = tx.send(sample(0.0, 0.0)).await;
    fleet.request_transition(&id, StatusEvent::Arm).await?;
    fleet.request_transition(&id, StatusEvent::Takeoff).await?;

    // Climb out; ingestion flips to InFlight at the takeoff threshold.
    for step in 0..=5 {
        let _ = tx.send(sample(f64::from(step) * 6.0, 0.0)).await;
        tokio::time::sleep(interval).await;
    }

    fleet.set_mode(&id, FlightMode::Auto).await?;
    for tick in 0..cruise_ticks {
        if tick == cruise_ticks / 2 {
            fleet.command_payload_drop(&id).await?;
        }
        let _ = tx.send(sample(30.0, 0.0)).await;
        tokio::time::sleep(interval).await;
    }

    // Descend; ingestion reports touchdown at the ground threshold.
    fleet.request_transition(&id, StatusEvent::Land).await?;
    for step in (0..=5).rev() {
        let _ = tx.send(sample(f64::from(step) * 6.0, 2.0)).await;
        tokio::time::sleep(interval).await;
    }

    fleet.request_transition(&id, StatusEvent::Reset).await?;

    drop(tx);
    pump_task
        .await
        .map_err(|err| groundlink::Error::Internal(err.to_string()))
}

/// Print every legal edge of the status machine, grouped by source status.
fn handle_transitions(cmd: &TransitionsCommand) -> CliResult {
    if cmd.json {
        let mut edges = Vec::new();
        for from in Status::ALL {
            for event in StatusEvent::ALL {
                if let Ok(to) = transition(from, None, event) {
                    edges.push(serde_json::json!({
                        "from": from,
                        "event": event,
                        "to": to,
                    }));
                }
            }
        }
        println!("{}", serde_json::to_string_pretty(&edges)?);
    } else {
        for from in Status::ALL {
            println!("{from}:");
            for event in StatusEvent::ALL {
                if let Ok(to) = transition(from, None, event) {
                    println!("  {:<22} -> {}", event.to_string(), to);
                }
            }
            println!();
        }
        println!("Safety triggers preempt ordinary requests; connection loss");
        println!("forces Offline from every status.");
    }
    Ok(())
}

fn handle_journal(config: &Config, cmd: JournalCommand) -> CliResult {
    let journal = Journal::open(config.journal_path())?;

    match cmd {
        JournalCommand::Recent {
            drone,
            kind,
            min_severity,
            since,
            until,
            limit,
            format,
        } => {
            let since = since.as_deref().map(parse_time).transpose()?;
            let until = until.as_deref().map(parse_time).transpose()?;

            // One filter narrows in SQL; the rest narrow the result. Only
            // cap in SQL when nothing has to be narrowed afterwards.
            let filters = usize::from(drone.is_some())
                + usize::from(kind.is_some())
                + usize::from(min_severity.is_some())
                + usize::from(since.is_some() || until.is_some());
            let fetch_limit = if filters > 1 { usize::MAX } else { limit };

            let mut records = if let Some(ref drone) = drone {
                let id = DroneId::new(drone.clone())?;
                journal.by_drone(&id, fetch_limit)?
            } else if let Some(kind) = kind {
                journal.by_kind(kind.tag(), fetch_limit)?
            } else if let Some(min) = min_severity {
                journal.by_min_severity(min.into(), fetch_limit)?
            } else if since.is_some() || until.is_some() {
                journal.by_time_range(
                    since.unwrap_or(DateTime::UNIX_EPOCH),
                    until.unwrap_or_else(Utc::now),
                    fetch_limit,
                )?
            } else {
                journal.recent(limit)?
            };

            if let Some(kind) = kind {
                records.retain(|r| r.kind.tag() == kind.tag());
            }
            if let Some(min) = min_severity {
                let min = Severity::from(min);
                records.retain(|r| r.severity >= min);
            }
            if let Some(since) = since {
                records.retain(|r| r.at >= since);
            }
            if let Some(until) = until {
                records.retain(|r| r.at <= until);
            }
            records.truncate(limit);

            print_records(&records, format)?;
        }

        JournalCommand::Stats { json } => {
            let stats = journal.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Journal: {}", journal.path().display());
                println!("Events:  {}", stats.total_events);
                println!("Oldest:  {}", format_optional_time(stats.oldest_event));
                println!("Newest:  {}", format_optional_time(stats.newest_event));
                println!("Size:    {} bytes", stats.db_size_bytes);
            }
        }

        JournalCommand::Prune {
            max_age_days,
            keep,
            yes,
        } => {
            let mut limits = config.clone();
            if let Some(days) = max_age_days {
                limits.journal.max_age_days = days;
            }
            if let Some(keep) = keep {
                limits.journal.max_events = keep;
            }

            if !yes {
                println!("This will permanently delete journal events:");
                match limits.journal_max_age() {
                    Some(age) => println!("  older than {} days", age.num_days()),
                    None => println!("  no age limit"),
                }
                if limits.journal.max_events > 0 {
                    println!("  beyond the newest {}", limits.journal.max_events);
                } else {
                    println!("  no count limit");
                }
                println!("Use --yes to confirm.");
                return Ok(());
            }

            let removed = journal.prune(&limits)?;
            println!("Pruned {} events, {} remain.", removed, journal.count()?);
        }
    }
    Ok(())
}

fn print_records(records: &[JournalRecord], format: OutputFormat) -> CliResult {
    if records.is_empty() && format != OutputFormat::Json {
        println!("No events.");
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(records)?);
        }
        OutputFormat::Plain => {
            for r in records {
                println!(
                    "{} {} {} [{}] {}",
                    r.id,
                    r.at.to_rfc3339(),
                    r.drone_id,
                    r.severity,
                    r.kind
                );
            }
        }
        OutputFormat::Table => {
            println!(
                "{:>6}  {:<19}  {:<12}  {:<9}  {:<11}  {:<14}  CHANGE",
                "ID", "AT", "DRONE", "SEVERITY", "STATUS", "MODE"
            );
            for r in records {
                println!(
                    "{:>6}  {}  {:<12}  {:<9}  {:<11}  {:<14}  {}",
                    r.id,
                    r.at.format("%Y-%m-%d %H:%M:%S"),
                    r.drone_id.to_string(),
                    r.severity.to_string(),
                    r.status.to_string(),
                    r.mode.to_string(),
                    r.kind
                );
            }
        }
    }
    Ok(())
}

fn format_optional_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), |at| at.to_rfc3339())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> CliResult {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Fleet]");
                println!("  Max drones:        {}", config.fleet.max_drones);
                println!("  Id pattern:        {}", config.fleet.id_pattern);
                println!("  Events buffer:     {}", config.fleet.events_buffer);
                println!();
                println!("[Telemetry]");
                println!(
                    "  Staleness timeout: {} ms",
                    config.telemetry.staleness_timeout_ms
                );
                println!(
                    "  Takeoff altitude:  {} m",
                    config.telemetry.takeoff_altitude_m
                );
                println!(
                    "  Ground altitude:   {} m",
                    config.telemetry.ground_altitude_m
                );
                println!(
                    "  Max descent rate:  {} m/s",
                    config.telemetry.max_descent_mps
                );
                println!(
                    "  Battery critical:  {} %",
                    config.telemetry.battery_critical_pct
                );
                println!();
                println!("[Journal]");
                println!("  Database path:     {}", config.journal_path().display());
                println!("  Max events:        {}", config.journal.max_events);
                println!("  Max age (days):    {}", config.journal.max_age_days);
                println!(
                    "  Prune interval:    {} h",
                    config.journal.prune_interval_hours
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
