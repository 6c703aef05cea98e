//! Drone lifecycle status and the rules governing its transitions.
//!
//! [`Status`] is the single authoritative lifecycle value for a drone. It is
//! only ever changed by feeding a [`StatusEvent`] through [`transition`],
//! which encodes the full legal-edge table. Everything off the table is
//! rejected and leaves the caller's state untouched.
//!
//! Safety events are special: `ConnectionLost` is accepted from every state,
//! and the emergency triggers are accepted from every airborne state. When a
//! safety event and an ordinary request race, the safety event wins; the
//! ordinary request then fails against the new state.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a drone. Exactly one value is active per drone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    /// No link to the vehicle. Initial state.
    #[default]
    Offline,
    /// Link up, motors disarmed.
    Idle,
    /// Motors armed, on the ground.
    Armed,
    /// Ascending to the working altitude.
    TakingOff,
    /// Airborne under an active flight mode.
    InFlight,
    /// Descending toward touchdown.
    Landing,
    /// On the ground after a flight, motors still armed.
    Landed,
    /// A safety trigger fired; the vehicle needs operator attention.
    Emergency,
    /// Grounded for inspection; requires explicit operator exit.
    Maintenance,
}

impl Status {
    /// Every status value, in lifecycle order.
    pub const ALL: [Status; 9] = [
        Status::Offline,
        Status::Idle,
        Status::Armed,
        Status::TakingOff,
        Status::InFlight,
        Status::Landing,
        Status::Landed,
        Status::Emergency,
        Status::Maintenance,
    ];

    /// Whether the vehicle is in the air in this state.
    #[must_use]
    pub fn is_airborne(self) -> bool {
        matches!(self, Status::TakingOff | Status::InFlight | Status::Landing)
    }

    /// Whether flight-mode changes are accepted in this state.
    ///
    /// The flight mode is only meaningful while the vehicle is armed or
    /// airborne; requests in any other state are rejected.
    #[must_use]
    pub fn allows_mode_changes(self) -> bool {
        matches!(
            self,
            Status::Armed | Status::TakingOff | Status::InFlight | Status::Landing
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Offline => "Offline",
            Status::Idle => "Idle",
            Status::Armed => "Armed",
            Status::TakingOff => "TakingOff",
            Status::InFlight => "InFlight",
            Status::Landing => "Landing",
            Status::Landed => "Landed",
            Status::Emergency => "Emergency",
            Status::Maintenance => "Maintenance",
        };
        write!(f, "{name}")
    }
}

/// A trigger that may move a drone from one [`Status`] to another.
///
/// Operator commands and telemetry-derived events share this one enum so the
/// transition table stays in a single place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusEvent {
    /// Transport reports the link is up.
    ConnectionEstablished,
    /// Operator arms the motors.
    Arm,
    /// Operator disarms the motors.
    Disarm,
    /// Operator grounds the vehicle for inspection.
    EnterMaintenance,
    /// Operator commands takeoff.
    Takeoff,
    /// Telemetry reports the takeoff altitude threshold was reached.
    AscentComplete,
    /// Operator commands a landing.
    Land,
    /// Telemetry reports ground contact.
    Touchdown,
    /// Operator resets a landed vehicle for the next sortie.
    Reset,
    /// Operator signs off the inspection.
    MaintenanceComplete,
    /// Operator acknowledges an emergency and grounds the vehicle.
    AcknowledgeEmergency,
    /// No valid telemetry inside the configured staleness window.
    TelemetryTimeout,
    /// Battery at or below the critical threshold.
    BatteryCritical,
    /// Operator hit the emergency stop.
    EmergencyStop,
    /// Telemetry reports a descent rate beyond the safe limit.
    AbnormalDescent,
    /// Transport reports the link is gone.
    ConnectionLost,
}

impl StatusEvent {
    /// Every event the transition table knows.
    pub const ALL: [StatusEvent; 16] = [
        StatusEvent::ConnectionEstablished,
        StatusEvent::Arm,
        StatusEvent::Disarm,
        StatusEvent::EnterMaintenance,
        StatusEvent::Takeoff,
        StatusEvent::AscentComplete,
        StatusEvent::Land,
        StatusEvent::Touchdown,
        StatusEvent::Reset,
        StatusEvent::MaintenanceComplete,
        StatusEvent::AcknowledgeEmergency,
        StatusEvent::TelemetryTimeout,
        StatusEvent::BatteryCritical,
        StatusEvent::EmergencyStop,
        StatusEvent::AbnormalDescent,
        StatusEvent::ConnectionLost,
    ];

    /// Whether this event is a safety trigger that preempts ordinary
    /// requests.
    #[must_use]
    pub fn is_safety(self) -> bool {
        matches!(
            self,
            StatusEvent::TelemetryTimeout
                | StatusEvent::BatteryCritical
                | StatusEvent::EmergencyStop
                | StatusEvent::AbnormalDescent
                | StatusEvent::ConnectionLost
        )
    }

    /// The fault recorded when this event forces an emergency.
    #[must_use]
    pub fn fault(self) -> Option<Fault> {
        match self {
            StatusEvent::TelemetryTimeout => Some(Fault::TelemetryLoss),
            StatusEvent::BatteryCritical => Some(Fault::CriticalBattery),
            StatusEvent::EmergencyStop => Some(Fault::OperatorEmergency),
            StatusEvent::AbnormalDescent => Some(Fault::AbnormalDescent),
            _ => None,
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusEvent::ConnectionEstablished => "connection established",
            StatusEvent::Arm => "arm",
            StatusEvent::Disarm => "disarm",
            StatusEvent::EnterMaintenance => "enter maintenance",
            StatusEvent::Takeoff => "takeoff",
            StatusEvent::AscentComplete => "ascent complete",
            StatusEvent::Land => "land",
            StatusEvent::Touchdown => "touchdown",
            StatusEvent::Reset => "reset",
            StatusEvent::MaintenanceComplete => "maintenance complete",
            StatusEvent::AcknowledgeEmergency => "acknowledge emergency",
            StatusEvent::TelemetryTimeout => "telemetry timeout",
            StatusEvent::BatteryCritical => "battery critical",
            StatusEvent::EmergencyStop => "emergency stop",
            StatusEvent::AbnormalDescent => "abnormal descent",
            StatusEvent::ConnectionLost => "connection lost",
        };
        write!(f, "{name}")
    }
}

/// Why a drone was forced into [`Status::Emergency`].
///
/// Recorded when the emergency is entered and cleared only by a completed
/// maintenance sign-off, so the cause survives reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fault {
    /// Telemetry went stale while airborne.
    TelemetryLoss,
    /// Battery reached the critical threshold.
    CriticalBattery,
    /// Descent rate exceeded the safe limit.
    AbnormalDescent,
    /// Operator emergency stop.
    OperatorEmergency,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Fault::TelemetryLoss => "telemetry loss",
            Fault::CriticalBattery => "critical battery",
            Fault::AbnormalDescent => "abnormal descent",
            Fault::OperatorEmergency => "operator emergency stop",
        };
        write!(f, "{name}")
    }
}

/// Errors returned by [`transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The event has no legal edge from the current status.
    #[error("illegal transition: {event} is not valid from {from}")]
    IllegalTransition {
        /// Status the drone was in.
        from: Status,
        /// The rejected event.
        event: StatusEvent,
    },

    /// An ordinary request arrived after a safety trigger forced Emergency.
    #[error("{event} rejected: emergency in effect ({fault})")]
    PreemptedBySafety {
        /// The fault that forced the emergency.
        fault: Fault,
        /// The rejected event.
        event: StatusEvent,
    },

    /// Arming was refused because a fault from a previous emergency is still
    /// recorded.
    #[error("cannot arm: unresolved fault ({fault}), maintenance required")]
    FaultActive {
        /// The unresolved fault.
        fault: Fault,
    },
}

/// Apply `event` to `current`, returning the next status.
///
/// This is the entire legal-edge table. The function is pure: on error the
/// caller's state is untouched, and fault bookkeeping (recording on emergency
/// entry, clearing on maintenance sign-off) is the caller's job via
/// [`StatusEvent::fault`].
///
/// `fault` is the drone's currently recorded fault, consulted for the arm
/// gate and for reporting preemption.
///
/// # Errors
///
/// [`TransitionError::IllegalTransition`] for any off-table edge,
/// [`TransitionError::PreemptedBySafety`] for ordinary requests made while an
/// emergency is in effect, and [`TransitionError::FaultActive`] when arming
/// with an unresolved fault.
pub fn transition(
    current: Status,
    fault: Option<Fault>,
    event: StatusEvent,
) -> Result<Status, TransitionError> {
    use Status as S;
    use StatusEvent as E;

    match (current, event) {
        // Unconditional override: the link is gone, whatever else was
        // happening.
        (_, E::ConnectionLost) => Ok(S::Offline),

        // Emergency triggers from any airborne state.
        (s, E::TelemetryTimeout | E::BatteryCritical | E::EmergencyStop) if s.is_airborne() => {
            Ok(S::Emergency)
        }
        (S::Landing, E::AbnormalDescent) => Ok(S::Emergency),

        (S::Offline, E::ConnectionEstablished) => Ok(S::Idle),
        (S::Idle, E::Arm) => match fault {
            None => Ok(S::Armed),
            Some(fault) => Err(TransitionError::FaultActive { fault }),
        },
        (S::Idle, E::EnterMaintenance) => Ok(S::Maintenance),
        (S::Armed, E::Takeoff) => Ok(S::TakingOff),
        (S::Armed, E::Disarm) => Ok(S::Idle),
        (S::TakingOff, E::AscentComplete) => Ok(S::InFlight),
        (S::InFlight, E::Land) => Ok(S::Landing),
        (S::Landing, E::Touchdown) => Ok(S::Landed),
        (S::Landed, E::Reset) => Ok(S::Idle),
        (S::Emergency, E::AcknowledgeEmergency) => Ok(S::Maintenance),
        (S::Maintenance, E::MaintenanceComplete) => Ok(S::Idle),

        // An Emergency entered through a safety trigger swallows ordinary
        // requests until the operator acknowledges it.
        (S::Emergency, event) => match fault {
            Some(fault) => Err(TransitionError::PreemptedBySafety { fault, event }),
            None => Err(TransitionError::IllegalTransition {
                from: current,
                event,
            }),
        },

        (from, event) => Err(TransitionError::IllegalTransition { from, event }),
    }
}
