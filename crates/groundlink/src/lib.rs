//! `groundlink` - Drone fleet state and telemetry core
//!
//! This library provides the authoritative state model a ground control
//! station is built on: validated telemetry ingestion, per-drone status and
//! flight-mode machines, push notifications for every change, and a
//! persistent event journal.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod capability;
pub mod cli;
pub mod config;
pub mod drone;
pub mod error;
pub mod events;
pub mod fleet;
pub mod journal;
pub mod logging;
pub mod mode;
pub mod source;
pub mod status;
pub mod telemetry;
pub mod units;

mod watchdog;

pub use capability::{Capability, CapabilitySet};
pub use config::Config;
pub use drone::{DroneId, DroneSpec, DroneState};
pub use error::{Error, Result};
pub use events::{ChangeKind, Severity, StateChange};
pub use fleet::Fleet;
pub use journal::Journal;
pub use logging::init_logging;
pub use mode::FlightMode;
pub use status::Status;
pub use telemetry::{RawSample, TelemetrySnapshot};
pub use units::{Orientation, Position, ValidationError, Velocity};
