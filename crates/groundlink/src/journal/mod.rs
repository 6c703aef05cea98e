//! Persistent event journal.
//!
//! Every [`StateChange`] a fleet publishes can be appended here, giving
//! operators a flight log that survives restarts: what each drone did, when,
//! and how urgent it was. Storage is `SQLite`; the structured change payload
//! is kept as JSON in the `detail` column while the envelope fields are
//! broken out into columns so queries can filter without parsing.
//!
//! [`recorder`] is the bridge: spawn it with a subscription and it drains
//! the event stream into the journal until the fleet goes away, pruning on
//! the configured interval.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::drone::DroneId;
use crate::error::{Error, Result};
use crate::events::{ChangeKind, Severity, StateChange};
use crate::mode::FlightMode;
use crate::status::Status;

/// Append-only journal of fleet state changes.
///
/// Backed by `SQLite` with support for:
/// - Appending published changes
/// - Filtering by drone, kind, severity, and time range
/// - Automatic pruning by age and by count
#[derive(Debug)]
pub struct Journal {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Journal {
    /// Open or create a journal database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema
    /// initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!(path = %path.display(), "opening journal");
        let conn = Connection::open(&path).map_err(|source| Error::JournalOpen {
            path: path.clone(),
            source,
        })?;

        // WAL keeps readers unblocked while the recorder appends.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!(path = %path.display(), "journal opened");
        Ok(Self { path, conn })
    }

    /// Create an in-memory journal for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::JournalOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a published change to the journal.
    ///
    /// Returns the assigned row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized or the database
    /// operation fails.
    pub fn record(&self, change: &StateChange) -> Result<i64> {
        let detail = serde_json::to_string(&change.kind)?;

        self.conn.execute(
            r"
            INSERT INTO events (at, drone_id, kind, severity, status, mode, detail)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                change.at.to_rfc3339(),
                change.drone_id.as_str(),
                change.kind.tag(),
                i64::from(change.severity.rank()),
                change.status.to_string(),
                change.mode.to_string(),
                detail,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!(id, drone = %change.drone_id, kind = change.kind.tag(), "journaled");
        Ok(id)
    }

    /// Get the most recent events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent(&self, limit: usize) -> Result<Vec<JournalRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, at, drone_id, severity, status, mode, detail
            FROM events ORDER BY at DESC, id DESC LIMIT ?1
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map([limit_i64], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Get events for a specific drone, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn by_drone(&self, id: &DroneId, limit: usize) -> Result<Vec<JournalRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, at, drone_id, severity, status, mode, detail
            FROM events WHERE drone_id = ?1
            ORDER BY at DESC, id DESC LIMIT ?2
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(params![id.as_str(), limit_i64], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Get events of a specific kind, newest first.
    ///
    /// `kind` is a machine tag as returned by [`ChangeKind::tag`], for
    /// example `status_changed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn by_kind(&self, kind: &str, limit: usize) -> Result<Vec<JournalRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, at, drone_id, severity, status, mode, detail
            FROM events WHERE kind = ?1
            ORDER BY at DESC, id DESC LIMIT ?2
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(params![kind, limit_i64], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Get events at or above a severity, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn by_min_severity(&self, min: Severity, limit: usize) -> Result<Vec<JournalRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, at, drone_id, severity, status, mode, detail
            FROM events WHERE severity >= ?1
            ORDER BY at DESC, id DESC LIMIT ?2
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(params![i64::from(min.rank()), limit_i64], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Get events within a time range, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn by_time_range(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<JournalRecord>> {
        let since_str = since.to_rfc3339();
        let until_str = until.to_rfc3339();

        let mut stmt = self.conn.prepare(
            r"
            SELECT id, at, drone_id, severity, status, mode, detail
            FROM events WHERE at >= ?1 AND at <= ?2
            ORDER BY at DESC, id DESC LIMIT ?3
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(
                params![since_str, until_str, limit_i64],
                Self::row_to_record,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Count total events in the journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Prune events older than the given duration.
    ///
    /// Returns the number of events deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_older_than(&self, max_age: Duration) -> Result<usize> {
        let cutoff = Utc::now() - max_age;
        let cutoff_str = cutoff.to_rfc3339();

        let affected = self
            .conn
            .execute("DELETE FROM events WHERE at < ?1", [cutoff_str])?;

        if affected > 0 {
            info!(pruned = affected, "dropped events past the age limit");
        }
        Ok(affected)
    }

    /// Prune events to keep only the most recent N entries.
    ///
    /// Returns the number of events deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_keep_recent(&self, keep_count: usize) -> Result<usize> {
        let keep_i64 = i64::try_from(keep_count).unwrap_or(i64::MAX);
        let affected = self.conn.execute(
            r"
            DELETE FROM events WHERE id NOT IN (
                SELECT id FROM events ORDER BY at DESC, id DESC LIMIT ?1
            )
            ",
            [keep_i64],
        )?;

        if affected > 0 {
            info!(pruned = affected, kept = keep_count, "dropped events past the count limit");
        }
        Ok(affected)
    }

    /// Run one prune pass with the configured limits.
    ///
    /// Applies the age limit when age-based pruning is on, then the count
    /// limit when one is set. Returns the total number of events removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails.
    pub fn prune(&self, config: &Config) -> Result<usize> {
        let mut removed = 0;
        if let Some(max_age) = config.journal_max_age() {
            removed += self.prune_older_than(max_age)?;
        }
        if config.journal.max_events > 0 {
            removed += self.prune_keep_recent(config.journal.max_events)?;
        }
        Ok(removed)
    }

    /// Get journal statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<JournalStats> {
        let total_events = self.count()?;

        let oldest: Option<String> = self
            .conn
            .query_row(
                "SELECT at FROM events ORDER BY at ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let newest: Option<String> = self
            .conn
            .query_row(
                "SELECT at FROM events ORDER BY at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let oldest_event = oldest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let newest_event = newest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(JournalStats {
            total_events,
            oldest_event,
            newest_event,
            db_size_bytes,
        })
    }

    /// Convert a database row to a [`JournalRecord`].
    ///
    /// The envelope columns tolerate text this build no longer knows, falling
    /// back with a warning; the `detail` payload and the drone id must parse.
    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<JournalRecord> {
        let id: i64 = row.get(0)?;
        let at_str: String = row.get(1)?;
        let drone_id_str: String = row.get(2)?;
        let severity_rank: i64 = row.get(3)?;
        let status_str: String = row.get(4)?;
        let mode_str: String = row.get(5)?;
        let detail: String = row.get(6)?;

        let at = DateTime::parse_from_rfc3339(&at_str)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

        let drone_id = DroneId::new(drone_id_str).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(err))
        })?;

        let severity = match severity_rank {
            0 => Severity::Info,
            1 => Severity::Notice,
            2 => Severity::Warning,
            3 => Severity::Critical,
            4 => Severity::Emergency,
            other => {
                warn!(rank = other, "unknown severity rank, defaulting to info");
                Severity::Info
            }
        };

        let status = Status::ALL
            .into_iter()
            .find(|s| s.to_string() == status_str)
            .unwrap_or_else(|| {
                warn!(status = %status_str, "unknown status in journal, defaulting to Offline");
                Status::Offline
            });

        let mode = FlightMode::ALL
            .into_iter()
            .find(|m| m.to_string() == mode_str)
            .unwrap_or_else(|| {
                warn!(mode = %mode_str, "unknown mode in journal, defaulting to Guided");
                FlightMode::Guided
            });

        let kind: ChangeKind = serde_json::from_str(&detail).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(err))
        })?;

        Ok(JournalRecord {
            id,
            at,
            drone_id,
            severity,
            status,
            mode,
            kind,
        })
    }
}

/// One persisted state change, as read back from the journal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalRecord {
    /// Row id, ascending in insertion order.
    pub id: i64,
    /// When the core applied the change.
    pub at: DateTime<Utc>,
    /// The drone that changed.
    pub drone_id: DroneId,
    /// Severity recorded at publication time.
    pub severity: Severity,
    /// Authoritative status after the change.
    pub status: Status,
    /// Authoritative flight mode after the change.
    pub mode: FlightMode,
    /// What changed.
    #[serde(flatten)]
    pub kind: ChangeKind,
}

/// Statistics about the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalStats {
    /// Total number of events stored.
    pub total_events: i64,
    /// Timestamp of the oldest event.
    pub oldest_event: Option<DateTime<Utc>>,
    /// Timestamp of the newest event.
    pub newest_event: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Drain a fleet's event stream into the journal.
///
/// Runs until the event channel closes (the fleet and all its clones are
/// gone), then hands the journal back. A write failure is logged and the
/// next event is tried; one bad row must not stop the record. Pruning runs
/// on the configured interval, including once at startup so a restart
/// enforces the limits immediately.
pub async fn recorder(
    journal: Journal,
    mut events: broadcast::Receiver<StateChange>,
    config: Config,
) -> Journal {
    let mut prune_tick = tokio::time::interval(config.journal_prune_interval());
    prune_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Biased so a due prune runs before the next append.
            biased;

            _ = prune_tick.tick() => {
                if let Err(err) = journal.prune(&config) {
                    warn!(%err, "journal prune failed");
                }
            }
            received = events.recv() => match received {
                Ok(change) => {
                    if let Err(err) = journal.record(&change) {
                        warn!(%err, drone = %change.drone_id, "failed to journal a state change");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "journal fell behind the event stream");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    debug!("journal recorder stopped");
    journal
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    use crate::status::StatusEvent;

    fn id(s: &str) -> DroneId {
        DroneId::new(s).unwrap()
    }

    fn change_for(drone: &str, kind: ChangeKind) -> StateChange {
        StateChange::new(id(drone), Status::Idle, FlightMode::Guided, kind, None)
    }

    fn change(kind: ChangeKind) -> StateChange {
        change_for("unit-7", kind)
    }

    fn backdated(kind: ChangeKind, days_ago: i64) -> StateChange {
        let mut change = change(kind);
        change.at = Utc::now() - Duration::days(days_ago);
        change
    }

    #[test]
    fn test_open_in_memory() {
        let journal = Journal::open_in_memory().unwrap();
        assert_eq!(journal.count().unwrap(), 0);
        assert_eq!(journal.path(), Path::new(":memory:"));
    }

    #[test]
    fn test_open_file_based() {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("groundlink_test_{}.db", std::process::id()));

        let journal = Journal::open(&db_path).unwrap();
        journal.record(&change(ChangeKind::Registered)).unwrap();
        assert_eq!(journal.count().unwrap(), 1);
        assert_eq!(journal.path(), db_path);

        drop(journal);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp_dir = std::env::temp_dir();
        let nested_path = temp_dir.join(format!(
            "groundlink_test_{}/nested/journal.db",
            std::process::id()
        ));

        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }

        let journal = Journal::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(journal);
        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent.parent().unwrap());
        }
    }

    #[test]
    fn test_record_assigns_increasing_ids() {
        let journal = Journal::open_in_memory().unwrap();

        let first = journal.record(&change(ChangeKind::Registered)).unwrap();
        let second = journal.record(&change(ChangeKind::PayloadReleased)).unwrap();

        assert!(second > first);
        assert_eq!(journal.count().unwrap(), 2);
    }

    #[test]
    fn test_recent_newest_first() {
        let journal = Journal::open_in_memory().unwrap();

        journal.record(&backdated(ChangeKind::Registered, 2)).unwrap();
        journal.record(&backdated(ChangeKind::PayloadReleased, 1)).unwrap();
        journal.record(&change(ChangeKind::Deregistered)).unwrap();

        let records = journal.recent(10).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].kind, ChangeKind::Deregistered);
        assert_eq!(records[1].kind, ChangeKind::PayloadReleased);
        assert_eq!(records[2].kind, ChangeKind::Registered);
    }

    #[test]
    fn test_recent_breaks_timestamp_ties_by_id() {
        let journal = Journal::open_in_memory().unwrap();

        let mut first = change(ChangeKind::Registered);
        let mut second = change(ChangeKind::PayloadReleased);
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        first.at = at;
        second.at = at;

        journal.record(&first).unwrap();
        journal.record(&second).unwrap();

        let records = journal.recent(10).unwrap();
        assert_eq!(records[0].kind, ChangeKind::PayloadReleased);
        assert_eq!(records[1].kind, ChangeKind::Registered);
    }

    #[test]
    fn test_recent_respects_limit() {
        let journal = Journal::open_in_memory().unwrap();

        for _ in 0..5 {
            journal.record(&change(ChangeKind::Registered)).unwrap();
        }

        assert_eq!(journal.recent(3).unwrap().len(), 3);
        assert_eq!(journal.recent(0).unwrap().len(), 0);
        assert_eq!(journal.recent(100).unwrap().len(), 5);
    }

    #[test]
    fn test_by_drone() {
        let journal = Journal::open_in_memory().unwrap();

        journal
            .record(&change_for("unit-1", ChangeKind::Registered))
            .unwrap();
        journal
            .record(&change_for("unit-2", ChangeKind::Registered))
            .unwrap();
        journal
            .record(&change_for("unit-1", ChangeKind::Deregistered))
            .unwrap();

        let records = journal.by_drone(&id("unit-1"), 10).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.drone_id == id("unit-1")));

        let records = journal.by_drone(&id("unit-3"), 10).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_by_kind() {
        let journal = Journal::open_in_memory().unwrap();

        journal.record(&change(ChangeKind::Registered)).unwrap();
        journal
            .record(&change(ChangeKind::SnapshotIngested { sequence_number: 0 }))
            .unwrap();
        journal
            .record(&change(ChangeKind::SnapshotIngested { sequence_number: 1 }))
            .unwrap();

        let records = journal.by_kind("snapshot_ingested", 10).unwrap();
        assert_eq!(records.len(), 2);

        let records = journal.by_kind("payload_released", 10).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_by_min_severity() {
        let journal = Journal::open_in_memory().unwrap();

        // Info, Notice, Emergency respectively.
        journal.record(&change(ChangeKind::Registered)).unwrap();
        journal.record(&change(ChangeKind::PayloadReleased)).unwrap();
        journal
            .record(&change(ChangeKind::StatusChanged {
                from: Status::InFlight,
                to: Status::Emergency,
                event: StatusEvent::TelemetryTimeout,
            }))
            .unwrap();

        assert_eq!(journal.by_min_severity(Severity::Info, 10).unwrap().len(), 3);
        assert_eq!(
            journal.by_min_severity(Severity::Notice, 10).unwrap().len(),
            2
        );
        let emergencies = journal.by_min_severity(Severity::Emergency, 10).unwrap();
        assert_eq!(emergencies.len(), 1);
        assert_eq!(emergencies[0].severity, Severity::Emergency);
    }

    #[test]
    fn test_by_time_range() {
        let journal = Journal::open_in_memory().unwrap();

        let base = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        for minutes in [0, 10, 20] {
            let mut entry = change(ChangeKind::Registered);
            entry.at = base + Duration::minutes(minutes);
            journal.record(&entry).unwrap();
        }

        let records = journal
            .by_time_range(
                base + Duration::minutes(5),
                base + Duration::minutes(15),
                10,
            )
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].at, base + Duration::minutes(10));

        let records = journal
            .by_time_range(base, base + Duration::minutes(20), 10)
            .unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_detail_round_trips() {
        let journal = Journal::open_in_memory().unwrap();

        let kind = ChangeKind::StatusChanged {
            from: Status::Armed,
            to: Status::TakingOff,
            event: StatusEvent::Takeoff,
        };
        let mut sent = change(kind.clone());
        sent.status = Status::TakingOff;
        sent.mode = FlightMode::Auto;
        journal.record(&sent).unwrap();

        let records = journal.recent(1).unwrap();
        assert_eq!(records[0].kind, kind);
        assert_eq!(records[0].status, Status::TakingOff);
        assert_eq!(records[0].mode, FlightMode::Auto);
        assert_eq!(records[0].severity, Severity::Notice);
        assert_eq!(records[0].drone_id, id("unit-7"));
    }

    #[test]
    fn test_unknown_envelope_text_falls_back() {
        let journal = Journal::open_in_memory().unwrap();

        journal
            .conn
            .execute(
                r"
                INSERT INTO events (at, drone_id, kind, severity, status, mode, detail)
                VALUES (?1, 'unit-7', 'registered', 99, 'Hovering', 'Sport', ?2)
                ",
                params![Utc::now().to_rfc3339(), r#"{"kind":"registered"}"#],
            )
            .unwrap();

        let records = journal.recent(1).unwrap();
        assert_eq!(records[0].severity, Severity::Info);
        assert_eq!(records[0].status, Status::Offline);
        assert_eq!(records[0].mode, FlightMode::Guided);
        assert_eq!(records[0].kind, ChangeKind::Registered);
    }

    #[test]
    fn test_prune_older_than() {
        let journal = Journal::open_in_memory().unwrap();

        journal.record(&backdated(ChangeKind::Registered, 40)).unwrap();
        journal.record(&backdated(ChangeKind::Registered, 10)).unwrap();
        journal.record(&change(ChangeKind::Registered)).unwrap();

        let pruned = journal.prune_older_than(Duration::days(30)).unwrap();
        assert_eq!(pruned, 1);
        assert_eq!(journal.count().unwrap(), 2);

        let pruned = journal.prune_older_than(Duration::days(365)).unwrap();
        assert_eq!(pruned, 0);
    }

    #[test]
    fn test_prune_keep_recent() {
        let journal = Journal::open_in_memory().unwrap();

        for days_ago in 0..10 {
            journal
                .record(&backdated(ChangeKind::Registered, days_ago))
                .unwrap();
        }

        let pruned = journal.prune_keep_recent(4).unwrap();
        assert_eq!(pruned, 6);
        assert_eq!(journal.count().unwrap(), 4);

        // The survivors are the newest four.
        let records = journal.recent(10).unwrap();
        assert!(records.iter().all(|r| r.at > Utc::now() - Duration::days(5)));
    }

    #[test]
    fn test_prune_keep_recent_no_pruning_needed() {
        let journal = Journal::open_in_memory().unwrap();

        journal.record(&change(ChangeKind::Registered)).unwrap();
        journal.record(&change(ChangeKind::Deregistered)).unwrap();

        let pruned = journal.prune_keep_recent(10).unwrap();
        assert_eq!(pruned, 0);
        assert_eq!(journal.count().unwrap(), 2);
    }

    #[test]
    fn test_prune_with_config_limits() {
        let journal = Journal::open_in_memory().unwrap();

        journal.record(&backdated(ChangeKind::Registered, 40)).unwrap();
        for _ in 0..6 {
            journal.record(&change(ChangeKind::Registered)).unwrap();
        }

        let mut config = Config::default();
        config.journal.max_age_days = 30;
        config.journal.max_events = 5;

        let removed = journal.prune(&config).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(journal.count().unwrap(), 5);
    }

    #[test]
    fn test_prune_with_config_unlimited() {
        let journal = Journal::open_in_memory().unwrap();

        journal.record(&backdated(ChangeKind::Registered, 400)).unwrap();
        journal.record(&change(ChangeKind::Registered)).unwrap();

        let mut config = Config::default();
        config.journal.max_age_days = 0;
        config.journal.max_events = 0;

        assert_eq!(journal.prune(&config).unwrap(), 0);
        assert_eq!(journal.count().unwrap(), 2);
    }

    #[test]
    fn test_stats_empty() {
        let journal = Journal::open_in_memory().unwrap();

        let stats = journal.stats().unwrap();
        assert_eq!(stats.total_events, 0);
        assert!(stats.oldest_event.is_none());
        assert!(stats.newest_event.is_none());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_stats_with_events() {
        let journal = Journal::open_in_memory().unwrap();

        journal.record(&backdated(ChangeKind::Registered, 3)).unwrap();
        journal.record(&change(ChangeKind::Deregistered)).unwrap();

        let stats = journal.stats().unwrap();
        assert_eq!(stats.total_events, 2);
        let oldest = stats.oldest_event.unwrap();
        let newest = stats.newest_event.unwrap();
        assert!(oldest < newest);
    }

    #[test]
    fn test_stats_db_size() {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("groundlink_size_test_{}.db", std::process::id()));

        let journal = Journal::open(&db_path).unwrap();
        journal.record(&change(ChangeKind::Registered)).unwrap();

        let stats = journal.stats().unwrap();
        assert!(stats.db_size_bytes > 0);

        drop(journal);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[tokio::test]
    async fn test_recorder_persists_stream() {
        let journal = Journal::open_in_memory().unwrap();
        let (tx, rx) = broadcast::channel(16);
        let task = tokio::spawn(recorder(journal, rx, Config::default()));

        tx.send(change(ChangeKind::Registered)).unwrap();
        tx.send(change(ChangeKind::PayloadReleased)).unwrap();
        drop(tx);

        let journal = task.await.unwrap();
        assert_eq!(journal.count().unwrap(), 2);
        let records = journal.recent(10).unwrap();
        assert_eq!(records[0].kind, ChangeKind::PayloadReleased);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recorder_prunes_at_startup() {
        let journal = Journal::open_in_memory().unwrap();
        for days_ago in 0..10 {
            journal
                .record(&backdated(ChangeKind::Registered, days_ago))
                .unwrap();
        }

        let mut config = Config::default();
        config.journal.max_age_days = 0;
        config.journal.max_events = 4;

        let (tx, rx) = broadcast::channel::<StateChange>(16);
        let task = tokio::spawn(recorder(journal, rx, config));
        drop(tx);

        // The first prune tick fires before the closed stream is observed.
        let journal = task.await.unwrap();
        assert_eq!(journal.count().unwrap(), 4);
    }
}
