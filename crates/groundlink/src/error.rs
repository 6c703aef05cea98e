//! Error types for groundlink.
//!
//! The domain errors (validation, transition, mode, telemetry) are defined
//! next to the components that produce them and folded into [`Error`] here,
//! so fleet-level callers handle one type. Every error is returned as a
//! value; nothing in the core panics across a component boundary, and a
//! failed operation never leaves a drone partially mutated.

use std::path::PathBuf;

use thiserror::Error;

use crate::drone::DroneId;
use crate::mode::ModeError;
use crate::status::{Status, TransitionError};
use crate::telemetry::TelemetryError;
use crate::units::ValidationError;

/// The main error type for groundlink operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Domain Errors ===
    /// A value failed units-and-frames or identifier validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A status transition was rejected.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A mode change or capability-gated command was rejected.
    #[error(transparent)]
    Mode(#[from] ModeError),

    /// A telemetry sample was rejected.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    // === Fleet Errors ===
    /// No drone is registered under the given id.
    #[error("unknown drone: {id}")]
    UnknownDrone {
        /// The id that was looked up.
        id: DroneId,
    },

    /// A drone with the given id is already registered.
    #[error("drone {id} is already registered")]
    DuplicateDrone {
        /// The id that collided.
        id: DroneId,
    },

    /// Registration would exceed the configured fleet size.
    #[error("fleet is at capacity ({limit} drones)")]
    FleetAtCapacity {
        /// The configured limit.
        limit: usize,
    },

    /// Capability sets cannot change after registration.
    #[error("capability set of {id} is immutable after registration")]
    ImmutableCapabilitySet {
        /// The drone whose capabilities were to be changed.
        id: DroneId,
    },

    /// A vehicle command was issued in a status that does not accept it.
    #[error("{command} not permitted while {status}")]
    CommandNotPermitted {
        /// Name of the refused command.
        command: &'static str,
        /// Status the drone was in.
        status: Status,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Journal Errors ===
    /// Failed to open or create the journal database.
    #[error("failed to open journal at {path}: {source}")]
    JournalOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A journal query failed.
    #[error("journal query failed: {0}")]
    JournalQuery(#[from] rusqlite::Error),

    /// Failed to run journal migrations.
    #[error("journal migration failed: {message}")]
    JournalMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for groundlink operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an unknown-drone error for the given id.
    #[must_use]
    pub fn unknown_drone(id: &DroneId) -> Self {
        Self::UnknownDrone { id: id.clone() }
    }

    /// Create a duplicate-drone error for the given id.
    #[must_use]
    pub fn duplicate_drone(id: &DroneId) -> Self {
        Self::DuplicateDrone { id: id.clone() }
    }

    /// Check if this error means the drone id is not registered.
    #[must_use]
    pub fn is_unknown_drone(&self) -> bool {
        matches!(self, Self::UnknownDrone { .. })
    }

    /// Check if this error came from sample or identifier validation.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Telemetry(TelemetryError::Invalid(_))
        )
    }
}
