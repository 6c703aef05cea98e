//! Telemetry samples and validated snapshots.
//!
//! A transport delivers [`RawSample`]s: plain numbers straight off the wire,
//! trusted for nothing. [`RawSample::validate`] turns one into a
//! [`ValidatedSample`] of proper value types, and ingestion finishes the job
//! by stamping the drone's authoritative status, mode and sequence number
//! into an immutable [`TelemetrySnapshot`].
//!
//! Snapshots are shared behind `Arc` and never mutated after construction;
//! the drone keeps only the latest one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mode::FlightMode;
use crate::status::Status;
use crate::units::{Orientation, Position, ValidationError, Velocity};

/// Errors returned when a sample cannot be ingested.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    /// The sample failed validation and was discarded whole.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Samples are not accepted while the drone is Offline; the transport
    /// must deliver connection-established first.
    #[error("sample rejected: the vehicle is offline")]
    LinkDown,
}

/// An unvalidated telemetry sample as delivered by a transport or simulator.
///
/// The optional hints carry what the vehicle believes its own status and
/// mode to be. The core never applies them; they are compared against the
/// authoritative state and logged when they diverge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// When the vehicle produced this sample.
    pub timestamp: DateTime<Utc>,

    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters above mean sea level.
    pub absolute_altitude: f64,
    /// Altitude in meters above the takeoff point.
    pub relative_altitude: f64,

    /// Roll in radians, positive = right side down.
    pub roll: f64,
    /// Pitch in radians, positive = nose up.
    pub pitch: f64,
    /// Yaw in radians, positive = clockwise.
    pub yaw: f64,

    /// Body-frame velocity, +x forward, in m/s.
    pub velocity_x: f64,
    /// Body-frame velocity, +y right, in m/s.
    pub velocity_y: f64,
    /// Body-frame velocity, +z down, in m/s.
    pub velocity_z: f64,

    /// Remaining battery charge, percent.
    pub battery_percent: f64,

    /// What the vehicle reports its status as, if the transport carries it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_hint: Option<Status>,

    /// What the vehicle reports its mode as, if the transport carries it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode_hint: Option<FlightMode>,
}

impl RawSample {
    /// A sample at the origin with a full battery, everything else zeroed.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            latitude: 0.0,
            longitude: 0.0,
            absolute_altitude: 0.0,
            relative_altitude: 0.0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            velocity_x: 0.0,
            velocity_y: 0.0,
            velocity_z: 0.0,
            battery_percent: 100.0,
            status_hint: None,
            mode_hint: None,
        }
    }

    /// Validate every field against the units-and-frames invariants.
    ///
    /// On success the returned [`ValidatedSample`] owns proper value types
    /// (with yaw normalized). On failure the sample is unusable and must be
    /// discarded whole; no partial result is produced.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered, naming the field.
    pub fn validate(&self) -> Result<ValidatedSample, ValidationError> {
        let position = Position::new(
            self.latitude,
            self.longitude,
            self.absolute_altitude,
            self.relative_altitude,
        )?;
        let orientation = Orientation::new(self.roll, self.pitch, self.yaw)?;
        let velocity = Velocity::new(self.velocity_x, self.velocity_y, self.velocity_z)?;
        let battery_percent = validate_battery(self.battery_percent)?;

        Ok(ValidatedSample {
            timestamp: self.timestamp,
            position,
            orientation,
            velocity,
            battery_percent,
        })
    }
}

fn validate_battery(value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite {
            field: "battery_percent",
        });
    }
    if !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: "battery_percent",
            value,
            min: 0.0,
            max: 100.0,
        });
    }
    Ok(value)
}

/// A sample whose fields all passed validation, before the drone's
/// authoritative state is stamped in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedSample {
    /// When the vehicle produced this sample.
    pub timestamp: DateTime<Utc>,
    /// Validated geodetic position.
    pub position: Position,
    /// Validated orientation, yaw normalized.
    pub orientation: Orientation,
    /// Validated body-frame velocity.
    pub velocity: Velocity,
    /// Battery charge in `[0, 100]`.
    pub battery_percent: f64,
}

impl ValidatedSample {
    /// Finish the sample into an immutable snapshot.
    ///
    /// `status` and `mode` are the drone's authoritative values after any
    /// transitions this sample itself triggered; `sequence_number` is the
    /// drone's next per-session sequence value.
    #[must_use]
    pub fn into_snapshot(
        self,
        status: Status,
        mode: FlightMode,
        sequence_number: u64,
    ) -> TelemetrySnapshot {
        TelemetrySnapshot {
            timestamp: self.timestamp,
            position: self.position,
            orientation: self.orientation,
            velocity: self.velocity,
            battery_percent: self.battery_percent,
            status,
            mode,
            sequence_number,
        }
    }
}

/// A point-in-time, fully validated telemetry record.
///
/// Immutable once constructed. Consumers read whichever snapshot is current;
/// replacement is atomic and never exposes a partially written record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    /// When the vehicle produced the underlying sample.
    pub timestamp: DateTime<Utc>,
    /// Geodetic position.
    pub position: Position,
    /// Body-frame orientation.
    pub orientation: Orientation,
    /// Body-frame velocity.
    pub velocity: Velocity,
    /// Battery charge in `[0, 100]`.
    pub battery_percent: f64,
    /// Authoritative status at the time of the snapshot.
    pub status: Status,
    /// Authoritative flight mode at the time of the snapshot.
    pub mode: FlightMode,
    /// Per-drone sequence number, starting at 0 and incrementing by 1 for
    /// every accepted sample.
    pub sequence_number: u64,
}
