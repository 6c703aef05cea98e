//! Geodetic and body-frame value types.
//!
//! This module defines the validated value types every telemetry sample is
//! built from: [`Position`], [`Orientation`] and [`Velocity`]. Units and sign
//! conventions follow ISO 80000-3 and ISO 1151 with ZYX Euler angles, and are
//! documented on each field accessor.
//!
//! Validation policy: constructors reject out-of-range or non-finite values
//! with a [`ValidationError`]; values are never clamped. The single exception
//! is yaw, which accepts any finite angle and normalizes it into `[-PI, PI)`.

use std::f64::consts::PI;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Errors produced when validating telemetry values and identifiers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A field was outside its documented range.
    #[error("{field} out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
        /// Lower bound of the legal range.
        min: f64,
        /// Upper bound of the legal range.
        max: f64,
    },

    /// A field was NaN or infinite.
    #[error("{field} is not a finite number")]
    NonFinite {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A drone identifier failed structural validation.
    #[error("invalid drone id {id:?}: {reason}")]
    InvalidDroneId {
        /// The rejected identifier.
        id: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A sample's timestamp regressed behind the previous accepted snapshot.
    #[error("out-of-order sample: {received} is earlier than {previous}")]
    OutOfOrderSample {
        /// Timestamp of the previously accepted snapshot.
        previous: DateTime<Utc>,
        /// Timestamp of the rejected sample.
        received: DateTime<Utc>,
    },
}

/// Check that a value is finite, naming the field in the error.
fn require_finite(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NonFinite { field })
    }
}

/// Check that a finite value lies within `[min, max]`.
fn require_in_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<f64, ValidationError> {
    let value = require_finite(field, value)?;
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Geodetic position with dual altitude references.
///
/// Latitude and longitude are in degrees, altitudes in meters. Absolute
/// altitude is referenced to mean sea level, relative altitude to the
/// takeoff point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    latitude: f64,
    longitude: f64,
    absolute_altitude: f64,
    relative_altitude: f64,
}

impl Position {
    /// Create a validated position.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::OutOfRange`] when latitude is outside
    /// `[-90, 90]` or longitude outside `[-180, 180]`, and
    /// [`ValidationError::NonFinite`] when any field is NaN or infinite.
    pub fn new(
        latitude: f64,
        longitude: f64,
        absolute_altitude: f64,
        relative_altitude: f64,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            latitude: require_in_range("latitude", latitude, -90.0, 90.0)?,
            longitude: require_in_range("longitude", longitude, -180.0, 180.0)?,
            absolute_altitude: require_finite("absolute_altitude", absolute_altitude)?,
            relative_altitude: require_finite("relative_altitude", relative_altitude)?,
        })
    }

    /// Latitude in degrees, north positive.
    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees, east positive.
    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Altitude in meters above mean sea level.
    #[must_use]
    pub fn absolute_altitude(&self) -> f64 {
        self.absolute_altitude
    }

    /// Altitude in meters above the takeoff point.
    #[must_use]
    pub fn relative_altitude(&self) -> f64 {
        self.relative_altitude
    }
}

/// Body-fixed rotational orientation in radians, ZYX Euler.
///
/// Sign conventions:
/// - roll: positive = right side down
/// - pitch: positive = nose up
/// - yaw: positive = clockwise
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Orientation {
    roll: f64,
    pitch: f64,
    yaw: f64,
}

impl Orientation {
    /// Create a validated orientation.
    ///
    /// Roll and pitch must already lie in `[-PI, PI]`. Yaw accepts any finite
    /// angle and is normalized into the canonical `[-PI, PI)` range, so an
    /// incoming `3 * PI` becomes `-PI` and in-range values pass through
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::OutOfRange`] for roll or pitch outside
    /// `[-PI, PI]`, and [`ValidationError::NonFinite`] for NaN or infinite
    /// inputs (including yaw).
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Result<Self, ValidationError> {
        Ok(Self {
            roll: require_in_range("roll", roll, -PI, PI)?,
            pitch: require_in_range("pitch", pitch, -PI, PI)?,
            yaw: normalize_yaw(require_finite("yaw", yaw)?),
        })
    }

    /// Rotation about the x-axis in radians, positive = right side down.
    #[must_use]
    pub fn roll(&self) -> f64 {
        self.roll
    }

    /// Rotation about the y-axis in radians, positive = nose up.
    #[must_use]
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Rotation about the z-axis in radians, positive = clockwise,
    /// normalized into `[-PI, PI)`.
    #[must_use]
    pub fn yaw(&self) -> f64 {
        self.yaw
    }
}

/// Wrap a finite angle into `[-PI, PI)`.
#[must_use]
pub fn normalize_yaw(yaw: f64) -> f64 {
    let wrapped = (yaw + PI).rem_euclid(2.0 * PI) - PI;
    // rem_euclid can land exactly on 2*PI through rounding; fold it back.
    if wrapped >= PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

/// Body-fixed translation velocity in meters per second.
///
/// Axes: +x forward, +y right, +z down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Velocity {
    x: f64,
    y: f64,
    z: f64,
}

impl Velocity {
    /// Create a validated velocity.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NonFinite`] when any component is NaN or
    /// infinite.
    pub fn new(x: f64, y: f64, z: f64) -> Result<Self, ValidationError> {
        Ok(Self {
            x: require_finite("velocity.x", x)?,
            y: require_finite("velocity.y", y)?,
            z: require_finite("velocity.z", z)?,
        })
    }

    /// Velocity along the x-axis, positive = forward.
    #[must_use]
    pub fn x(&self) -> f64 {
        self.x
    }

    /// Velocity along the y-axis, positive = right.
    #[must_use]
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Velocity along the z-axis, positive = down.
    #[must_use]
    pub fn z(&self) -> f64 {
        self.z
    }

    /// Magnitude of the velocity vector.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.x.hypot(self.y).hypot(self.z)
    }
}
