//! The drone aggregate: identifier, capability set, authoritative state and
//! the latest telemetry snapshot.
//!
//! Every mutation funnels through the state machines via [`Drone::apply_event`],
//! [`Drone::set_mode`] and [`Drone::ingest`]; there is no direct field
//! assignment, so transition legality can never be bypassed. A failed request
//! leaves the aggregate exactly as it was.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::capability::{Capability, CapabilitySet};
use crate::mode::{self, FlightMode, ModeError};
use crate::status::{self, Fault, Status, StatusEvent, TransitionError};
use crate::telemetry::{RawSample, TelemetryError, TelemetrySnapshot, ValidatedSample};
use crate::units::ValidationError;

/// Longest accepted drone identifier, in bytes.
pub const MAX_ID_LEN: usize = 64;

/// A validated drone identifier.
///
/// Structurally safe for logs, file names and wire protocols: starts with an
/// alphanumeric character, continues with alphanumerics or `.`, `_`, `-`, at
/// most [`MAX_ID_LEN`] bytes. Deployments can narrow this further through the
/// configured id pattern, checked at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DroneId(String);

impl DroneId {
    /// Validate and wrap an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDroneId`] naming the violated rule.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        let invalid = |reason: &'static str| ValidationError::InvalidDroneId {
            id: id.clone(),
            reason,
        };

        let Some(first) = id.chars().next() else {
            return Err(invalid("must not be empty"));
        };
        if id.len() > MAX_ID_LEN {
            return Err(invalid("longer than 64 bytes"));
        }
        if !first.is_ascii_alphanumeric() {
            return Err(invalid("must start with an alphanumeric character"));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(invalid("contains characters outside [A-Za-z0-9._-]"));
        }
        Ok(Self(id))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DroneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DroneId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DroneId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DroneId> for String {
    fn from(id: DroneId) -> Self {
        id.0
    }
}

/// Registration-time description of a drone: its identifier and the
/// capability set it will advertise for the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroneSpec {
    /// The identifier to register under.
    pub id: DroneId,
    /// Capabilities, immutable after registration.
    #[serde(default)]
    pub capabilities: CapabilitySet,
}

impl DroneSpec {
    /// A spec with an empty capability set.
    #[must_use]
    pub fn new(id: DroneId) -> Self {
        Self {
            id,
            capabilities: CapabilitySet::EMPTY,
        }
    }

    /// Add a capability to the spec.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities = self.capabilities.with(capability);
        self
    }
}

/// Thresholds consulted by ingestion when deriving automatic status events
/// from a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Relative altitude at which a takeoff counts as complete, meters.
    pub takeoff_altitude_m: f64,
    /// Relative altitude at or below which a landing vehicle has touched
    /// down, meters.
    pub ground_altitude_m: f64,
    /// Descent rate above which a landing is abnormal, m/s (+z is down).
    pub max_descent_mps: f64,
    /// Battery percentage at or below which an airborne vehicle is in
    /// emergency.
    pub battery_critical_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            takeoff_altitude_m: 2.5,
            ground_altitude_m: 0.5,
            max_descent_mps: 4.0,
            battery_critical_pct: 10.0,
        }
    }
}

/// A status transition that ingestion applied on the drone's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedTransition {
    /// Status before the event.
    pub from: Status,
    /// Status after the event.
    pub to: Status,
    /// The derived event.
    pub event: StatusEvent,
}

/// What a successful ingestion produced.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The accepted snapshot, already installed as the drone's latest.
    pub snapshot: Arc<TelemetrySnapshot>,
    /// Status transitions this sample triggered, in application order.
    pub transitions: Vec<AppliedTransition>,
}

/// Read-only view of a drone's full state, for display and serialization.
#[derive(Debug, Clone, Serialize)]
pub struct DroneState {
    /// The drone's identifier.
    pub id: DroneId,
    /// Advertised capabilities.
    pub capabilities: CapabilitySet,
    /// Authoritative status.
    pub status: Status,
    /// Authoritative flight mode.
    pub mode: FlightMode,
    /// Unresolved fault, if an emergency has not been signed off yet.
    pub fault: Option<Fault>,
    /// Latest accepted snapshot, if any sample has been ingested.
    pub latest: Option<TelemetrySnapshot>,
}

/// Aggregate root for one physical or simulated vehicle.
///
/// Created at registration, dropped at deregistration. Holds only the latest
/// snapshot; history is a collaborator's concern.
#[derive(Debug)]
pub struct Drone {
    id: DroneId,
    capabilities: CapabilitySet,
    status: Status,
    mode: FlightMode,
    fault: Option<Fault>,
    latest: Option<Arc<TelemetrySnapshot>>,
    next_sequence: u64,
}

impl Drone {
    /// Create a drone in the initial [`Status::Offline`] state.
    #[must_use]
    pub fn new(id: DroneId, capabilities: CapabilitySet) -> Self {
        Self {
            id,
            capabilities,
            status: Status::default(),
            mode: FlightMode::default(),
            fault: None,
            latest: None,
            next_sequence: 0,
        }
    }

    /// The drone's identifier.
    #[must_use]
    pub fn id(&self) -> &DroneId {
        &self.id
    }

    /// The capability set fixed at registration.
    #[must_use]
    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    /// Whether the drone advertises `capability`.
    #[must_use]
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Current authoritative status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Current flight mode. Only meaningful while
    /// [`Status::allows_mode_changes`] holds.
    #[must_use]
    pub fn mode(&self) -> FlightMode {
        self.mode
    }

    /// The unresolved fault, if any.
    #[must_use]
    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    /// The latest accepted snapshot, if any.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.latest.clone()
    }

    /// A serializable view of the full state.
    #[must_use]
    pub fn state(&self) -> DroneState {
        DroneState {
            id: self.id.clone(),
            capabilities: self.capabilities,
            status: self.status,
            mode: self.mode,
            fault: self.fault,
            latest: self.latest.as_deref().cloned(),
        }
    }

    /// Feed a status event through the transition table.
    ///
    /// On success the new status is installed and returned, the fault record
    /// is updated (set when a safety event forces Emergency, cleared by a
    /// completed maintenance), and the flight mode is reset to the
    /// ground-station default when the drone becomes Armed.
    ///
    /// # Errors
    ///
    /// Any [`TransitionError`]; the aggregate is unchanged on error.
    pub fn apply_event(&mut self, event: StatusEvent) -> Result<Status, TransitionError> {
        let from = self.status;
        let to = status::transition(from, self.fault, event)?;

        self.status = to;
        if to == Status::Emergency {
            if let Some(fault) = event.fault() {
                self.fault = Some(fault);
            }
        }
        if event == StatusEvent::MaintenanceComplete {
            self.fault = None;
        }
        // Each arming starts from the ground-station default so autonomous
        // modes are one legal hop away.
        if from == Status::Idle && to == Status::Armed {
            self.mode = FlightMode::Guided;
        }

        debug!(id = %self.id, %event, %from, %to, "status transition");
        Ok(to)
    }

    /// Request a flight-mode change.
    ///
    /// Re-requesting the active mode succeeds without any effect.
    ///
    /// # Errors
    ///
    /// Any [`ModeError`]; the aggregate is unchanged on error.
    pub fn set_mode(&mut self, to: FlightMode) -> Result<FlightMode, ModeError> {
        mode::check(self.status, self.capabilities, self.mode, to)?;
        let from = self.mode;
        self.mode = to;
        if from != to {
            debug!(id = %self.id, %from, %to, "flight mode changed");
        }
        Ok(to)
    }

    /// Ingest one raw telemetry sample.
    ///
    /// The pipeline: reject while Offline; validate every field; enforce
    /// non-decreasing timestamps; apply any status events the sample itself
    /// implies (battery, descent, touchdown, ascent, in that safety order);
    /// then stamp and atomically install the snapshot with the
    /// post-transition status and mode. Sequence numbers start at 0 and
    /// increase by exactly 1 per accepted sample.
    ///
    /// Status or mode hints carried by the sample are compared against the
    /// authoritative values and logged when they diverge; they are never
    /// applied.
    ///
    /// # Errors
    ///
    /// [`TelemetryError::LinkDown`] while Offline, otherwise a
    /// [`ValidationError`] wrapped in [`TelemetryError::Invalid`]. The
    /// previous snapshot is retained on every error path.
    pub fn ingest(
        &mut self,
        sample: &RawSample,
        thresholds: &Thresholds,
    ) -> Result<IngestOutcome, TelemetryError> {
        if self.status == Status::Offline {
            return Err(TelemetryError::LinkDown);
        }

        let validated = sample.validate()?;

        if let Some(previous) = &self.latest {
            if validated.timestamp < previous.timestamp {
                return Err(ValidationError::OutOfOrderSample {
                    previous: previous.timestamp,
                    received: validated.timestamp,
                }
                .into());
            }
        }

        let mut transitions = Vec::new();
        while let Some(event) = self.pending_auto_event(&validated, thresholds) {
            let from = self.status;
            match self.apply_event(event) {
                Ok(to) => transitions.push(AppliedTransition { from, to, event }),
                Err(err) => {
                    error!(id = %self.id, %event, %err, "derived event refused");
                    break;
                }
            }
        }

        let sequence_number = self.next_sequence;
        let snapshot = Arc::new(validated.into_snapshot(self.status, self.mode, sequence_number));
        self.next_sequence += 1;
        self.latest = Some(Arc::clone(&snapshot));

        if let Some(hint) = sample.status_hint {
            if hint != self.status {
                warn!(
                    id = %self.id,
                    reported = %hint,
                    authoritative = %self.status,
                    "vehicle status report diverges from authoritative state"
                );
            }
        }
        if let Some(hint) = sample.mode_hint {
            if hint != self.mode {
                warn!(
                    id = %self.id,
                    reported = %hint,
                    authoritative = %self.mode,
                    "vehicle mode report diverges from authoritative state"
                );
            }
        }

        Ok(IngestOutcome {
            snapshot,
            transitions,
        })
    }

    /// The next status event this sample implies, if any, evaluated against
    /// the current status.
    ///
    /// Checked in safety order: a critical battery outranks a normal
    /// touchdown, and an abnormal descent outranks ground contact.
    fn pending_auto_event(
        &self,
        validated: &ValidatedSample,
        thresholds: &Thresholds,
    ) -> Option<StatusEvent> {
        let altitude = validated.position.relative_altitude();
        let sink_rate = validated.velocity.z();

        match self.status {
            s if s.is_airborne() && validated.battery_percent <= thresholds.battery_critical_pct => {
                Some(StatusEvent::BatteryCritical)
            }
            Status::Landing if sink_rate > thresholds.max_descent_mps => {
                Some(StatusEvent::AbnormalDescent)
            }
            Status::Landing if altitude <= thresholds.ground_altitude_m => {
                Some(StatusEvent::Touchdown)
            }
            Status::TakingOff if altitude >= thresholds.takeoff_altitude_m => {
                Some(StatusEvent::AscentComplete)
            }
            _ => None,
        }
    }
}
