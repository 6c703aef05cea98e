//! State-change notifications pushed to subscribers.
//!
//! Every successful mutation of a drone publishes one [`StateChange`] through
//! the fleet's broadcast channel. The payload carries the new authoritative
//! status and mode plus the latest snapshot, so a presentation layer never
//! has to poll or re-read the aggregate after a notification.
//!
//! Failed requests publish nothing.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::drone::DroneId;
use crate::mode::FlightMode;
use crate::status::{Status, StatusEvent};
use crate::telemetry::TelemetrySnapshot;

/// How urgently a subscriber should surface an event.
///
/// Ordered: `Info < Notice < Warning < Critical < Emergency`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Routine bookkeeping.
    Info,
    /// A deliberate, successful operation.
    Notice,
    /// Something off-nominal that needs no immediate action.
    Warning,
    /// Vehicle contact lost in a dangerous situation.
    Critical,
    /// A safety trigger forced the vehicle into Emergency.
    Emergency,
}

impl Severity {
    /// Numeric rank, matching the `Ord` ordering. Stable across releases, so
    /// it is safe to persist and compare.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Notice => 1,
            Severity::Warning => 2,
            Severity::Critical => 3,
            Severity::Emergency => 4,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
            Severity::Emergency => "emergency",
        };
        write!(f, "{name}")
    }
}

/// What changed about a drone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeKind {
    /// The drone was added to the fleet.
    Registered,
    /// The drone was removed from the fleet.
    Deregistered,
    /// A status transition was applied.
    StatusChanged {
        /// Status before the event.
        from: Status,
        /// Status after the event.
        to: Status,
        /// The event that drove the transition.
        event: StatusEvent,
    },
    /// The flight mode changed.
    ModeChanged {
        /// Mode before the request.
        from: FlightMode,
        /// Mode after the request.
        to: FlightMode,
    },
    /// A telemetry sample was accepted and installed as the latest snapshot.
    SnapshotIngested {
        /// Sequence number of the accepted snapshot.
        sequence_number: u64,
    },
    /// The payload bay was commanded to release.
    PayloadReleased,
}

impl ChangeKind {
    /// Stable machine name for this kind of change, identical to the tag the
    /// serialized form carries.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            ChangeKind::Registered => "registered",
            ChangeKind::Deregistered => "deregistered",
            ChangeKind::StatusChanged { .. } => "status_changed",
            ChangeKind::ModeChanged { .. } => "mode_changed",
            ChangeKind::SnapshotIngested { .. } => "snapshot_ingested",
            ChangeKind::PayloadReleased => "payload_released",
        }
    }

    /// The severity a subscriber should rank this change at.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            ChangeKind::Registered | ChangeKind::Deregistered | ChangeKind::SnapshotIngested { .. } => {
                Severity::Info
            }
            ChangeKind::ModeChanged { .. } | ChangeKind::PayloadReleased => Severity::Notice,
            ChangeKind::StatusChanged { from, to, event } => match to {
                Status::Emergency => Severity::Emergency,
                // Losing the link mid-air is worse than a shutdown on the pad.
                Status::Offline if *event == StatusEvent::ConnectionLost && from.is_airborne() => {
                    Severity::Critical
                }
                Status::Offline if *event == StatusEvent::ConnectionLost => Severity::Warning,
                _ => Severity::Notice,
            },
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Registered => write!(f, "registered"),
            ChangeKind::Deregistered => write!(f, "deregistered"),
            ChangeKind::StatusChanged { from, to, event } => {
                write!(f, "status {from} -> {to} ({event})")
            }
            ChangeKind::ModeChanged { from, to } => write!(f, "mode {from} -> {to}"),
            ChangeKind::SnapshotIngested { sequence_number } => {
                write!(f, "snapshot #{sequence_number}")
            }
            ChangeKind::PayloadReleased => write!(f, "payload released"),
        }
    }
}

/// One successful mutation of one drone, as pushed to subscribers.
///
/// The snapshot field is the drone's latest at publication time; it is absent
/// when nothing has been ingested yet. Snapshots ride along by `Arc`, so the
/// event is cheap to fan out and is skipped when the event itself is
/// serialized.
#[derive(Debug, Clone, Serialize)]
pub struct StateChange {
    /// The drone that changed.
    pub drone_id: DroneId,
    /// When the core applied the change.
    pub at: DateTime<Utc>,
    /// Authoritative status after the change.
    pub status: Status,
    /// Authoritative flight mode after the change.
    pub mode: FlightMode,
    /// What changed.
    #[serde(flatten)]
    pub kind: ChangeKind,
    /// Severity derived from the kind, serialized for subscribers that only
    /// parse the envelope.
    pub severity: Severity,
    /// Latest snapshot at publication time.
    #[serde(skip)]
    pub snapshot: Option<Arc<TelemetrySnapshot>>,
}

impl StateChange {
    /// Build a change record, stamping the current time and derived
    /// severity.
    #[must_use]
    pub fn new(
        drone_id: DroneId,
        status: Status,
        mode: FlightMode,
        kind: ChangeKind,
        snapshot: Option<Arc<TelemetrySnapshot>>,
    ) -> Self {
        let severity = kind.severity();
        Self {
            drone_id,
            at: Utc::now(),
            status,
            mode,
            kind,
            severity,
            snapshot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(kind: ChangeKind) -> StateChange {
        StateChange::new(
            DroneId::new("unit-7").unwrap(),
            Status::Idle,
            FlightMode::Guided,
            kind,
            None,
        )
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Notice);
        assert!(Severity::Notice < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        assert!(Severity::Critical < Severity::Emergency);
    }

    #[test]
    fn test_severity_rank_follows_ordering() {
        let ranked = [
            Severity::Info,
            Severity::Notice,
            Severity::Warning,
            Severity::Critical,
            Severity::Emergency,
        ];
        for pair in ranked.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_kind_tag_matches_serialized_tag() {
        let kinds = [
            ChangeKind::Registered,
            ChangeKind::Deregistered,
            ChangeKind::StatusChanged {
                from: Status::Offline,
                to: Status::Idle,
                event: StatusEvent::ConnectionEstablished,
            },
            ChangeKind::ModeChanged {
                from: FlightMode::Guided,
                to: FlightMode::Auto,
            },
            ChangeKind::SnapshotIngested { sequence_number: 0 },
            ChangeKind::PayloadReleased,
        ];
        for kind in kinds {
            let json = serde_json::to_value(&kind).unwrap();
            assert_eq!(json["kind"], kind.tag());
        }
    }

    #[test]
    fn test_emergency_status_ranks_emergency() {
        let kind = ChangeKind::StatusChanged {
            from: Status::InFlight,
            to: Status::Emergency,
            event: StatusEvent::BatteryCritical,
        };
        assert_eq!(kind.severity(), Severity::Emergency);
    }

    #[test]
    fn test_connection_lost_severity_depends_on_altitude() {
        let airborne = ChangeKind::StatusChanged {
            from: Status::InFlight,
            to: Status::Offline,
            event: StatusEvent::ConnectionLost,
        };
        assert_eq!(airborne.severity(), Severity::Critical);

        let grounded = ChangeKind::StatusChanged {
            from: Status::Idle,
            to: Status::Offline,
            event: StatusEvent::ConnectionLost,
        };
        assert_eq!(grounded.severity(), Severity::Warning);
    }

    #[test]
    fn test_routine_changes_rank_low() {
        assert_eq!(ChangeKind::Registered.severity(), Severity::Info);
        assert_eq!(
            ChangeKind::SnapshotIngested { sequence_number: 3 }.severity(),
            Severity::Info
        );
        assert_eq!(
            ChangeKind::ModeChanged {
                from: FlightMode::Guided,
                to: FlightMode::Auto,
            }
            .severity(),
            Severity::Notice
        );
        let takeoff = ChangeKind::StatusChanged {
            from: Status::Armed,
            to: Status::TakingOff,
            event: StatusEvent::Takeoff,
        };
        assert_eq!(takeoff.severity(), Severity::Notice);
    }

    #[test]
    fn test_state_change_serializes_without_snapshot() {
        let event = change(ChangeKind::PayloadReleased);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"payload_released\""));
        assert!(json.contains("\"severity\":\"notice\""));
        assert!(!json.contains("snapshot"));
    }

    #[test]
    fn test_kind_display() {
        let kind = ChangeKind::StatusChanged {
            from: Status::Offline,
            to: Status::Idle,
            event: StatusEvent::ConnectionEstablished,
        };
        assert_eq!(
            kind.to_string(),
            "status Offline -> Idle (connection established)"
        );
        assert_eq!(
            ChangeKind::SnapshotIngested { sequence_number: 12 }.to_string(),
            "snapshot #12"
        );
    }
}
