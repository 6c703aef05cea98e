//! `SQLite` schema for the event journal.

/// SQL statement to create the events table.
///
/// `detail` holds the serialized change payload; the other columns exist so
/// queries can filter without parsing it.
pub const CREATE_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    at TEXT NOT NULL,
    drone_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    severity INTEGER NOT NULL,
    status TEXT NOT NULL,
    mode TEXT NOT NULL,
    detail TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create an index on `at` for time-ordered queries.
pub const CREATE_AT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_events_at ON events(at DESC)
";

/// SQL statement to create an index on `drone_id` for per-drone queries.
pub const CREATE_DRONE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_events_drone ON events(drone_id)
";

/// SQL statement to create an index on `kind` for filtering.
pub const CREATE_KIND_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_events_kind ON events(kind)
";

/// SQL statement to create an index on `severity` for threshold queries.
pub const CREATE_SEVERITY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_events_severity ON events(severity)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_EVENTS_TABLE,
    CREATE_AT_INDEX,
    CREATE_DRONE_INDEX,
    CREATE_KIND_INDEX,
    CREATE_SEVERITY_INDEX,
    CREATE_METADATA_TABLE,
];
