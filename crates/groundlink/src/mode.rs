//! Flight modes and mode-switch legality.
//!
//! The flight mode selects who is steering: the pilot (Manual through
//! PositionHold), the ground station (Guided), or an onboard program (Auto,
//! Follow, Circle, the recovery modes). Mode is only meaningful while the
//! drone is armed or airborne.
//!
//! Switch legality is a compatibility relation over mode pairs rather than a
//! full table:
//!
//! - `Land` and `ReturnToLaunch` are always legal targets; recovery must
//!   never be refused on adjacency grounds.
//! - `Guided` and `PositionHold` are staging hubs: every edge into or out of
//!   a hub is legal. Entering an autonomous program (Auto, Follow, Circle) or
//!   leaving one therefore passes through a hub.
//! - The pilot family `Manual`/`Stabilize`/`AltitudeHold`/`PositionHold`
//!   interchanges freely.
//! - Requesting the active mode again is accepted as a no-op.
//!
//! Everything else is rejected: `Auto` cannot jump straight to `Follow`, a
//! vehicle returning to launch cannot be thrown back into a mission without
//! re-staging, and so on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::{Capability, CapabilitySet};
use crate::status::Status;

/// Active control mode of a drone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FlightMode {
    /// Direct stick input, no stabilization.
    Manual,
    /// Attitude stabilization, pilot steers.
    Stabilize,
    /// Stabilized with altitude held.
    AltitudeHold,
    /// Holds position and altitude, pilot nudges. Staging hub.
    PositionHold,
    /// Ground-station commanded. Staging hub and the post-arm default.
    #[default]
    Guided,
    /// Onboard mission execution.
    Auto,
    /// Autonomous return to the launch point. Always-legal recovery target.
    ReturnToLaunch,
    /// Autonomous descent and touchdown. Always-legal recovery target.
    Land,
    /// Tracks a moving target.
    Follow,
    /// Orbits a point of interest.
    Circle,
}

impl FlightMode {
    /// Every flight mode.
    pub const ALL: [FlightMode; 10] = [
        FlightMode::Manual,
        FlightMode::Stabilize,
        FlightMode::AltitudeHold,
        FlightMode::PositionHold,
        FlightMode::Guided,
        FlightMode::Auto,
        FlightMode::ReturnToLaunch,
        FlightMode::Land,
        FlightMode::Follow,
        FlightMode::Circle,
    ];

    /// Whether this mode is a staging hub every other mode may pass through.
    #[must_use]
    pub fn is_hub(self) -> bool {
        matches!(self, FlightMode::Guided | FlightMode::PositionHold)
    }

    /// Whether this mode is an always-legal recovery target.
    #[must_use]
    pub fn is_recovery(self) -> bool {
        matches!(self, FlightMode::Land | FlightMode::ReturnToLaunch)
    }

    /// Whether this mode belongs to the pilot-flown family.
    #[must_use]
    pub fn is_pilot_family(self) -> bool {
        matches!(
            self,
            FlightMode::Manual
                | FlightMode::Stabilize
                | FlightMode::AltitudeHold
                | FlightMode::PositionHold
        )
    }

    /// Capability a drone must advertise before this mode may be selected.
    ///
    /// None of the shipped modes is capability-gated; the hook exists for
    /// payload-class commands and vendor mode packs.
    #[must_use]
    pub fn required_capability(self) -> Option<Capability> {
        None
    }
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlightMode::Manual => "Manual",
            FlightMode::Stabilize => "Stabilize",
            FlightMode::AltitudeHold => "AltitudeHold",
            FlightMode::PositionHold => "PositionHold",
            FlightMode::Guided => "Guided",
            FlightMode::Auto => "Auto",
            FlightMode::ReturnToLaunch => "ReturnToLaunch",
            FlightMode::Land => "Land",
            FlightMode::Follow => "Follow",
            FlightMode::Circle => "Circle",
        };
        write!(f, "{name}")
    }
}

impl FromStr for FlightMode {
    type Err = String;

    /// Parse a mode name, case-insensitively, with `_`/`-` ignored.
    /// `rtl` is accepted for `ReturnToLaunch`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "manual" => Ok(FlightMode::Manual),
            "stabilize" => Ok(FlightMode::Stabilize),
            "altitudehold" | "althold" => Ok(FlightMode::AltitudeHold),
            "positionhold" | "poshold" => Ok(FlightMode::PositionHold),
            "guided" => Ok(FlightMode::Guided),
            "auto" => Ok(FlightMode::Auto),
            "returntolaunch" | "rtl" => Ok(FlightMode::ReturnToLaunch),
            "land" => Ok(FlightMode::Land),
            "follow" => Ok(FlightMode::Follow),
            "circle" => Ok(FlightMode::Circle),
            _ => Err(format!("unknown flight mode {s:?}")),
        }
    }
}

/// Errors returned when a mode change is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ModeError {
    /// The drone's status does not accept mode changes at all.
    #[error("mode change not permitted while {status}")]
    NotPermitted {
        /// Status the drone was in.
        status: Status,
    },

    /// The requested mode is not adjacent to the active one.
    #[error("cannot switch from {from} to {to} directly; stage through Guided or PositionHold")]
    Incompatible {
        /// The active mode.
        from: FlightMode,
        /// The rejected target.
        to: FlightMode,
    },

    /// The drone does not advertise a capability the request depends on.
    #[error("requires the {required} capability, which this drone does not advertise")]
    MissingCapability {
        /// The capability the request depends on.
        required: Capability,
    },
}

/// Whether a direct switch from `from` to `to` is legal, ignoring status and
/// capability gates.
#[must_use]
pub fn is_compatible(from: FlightMode, to: FlightMode) -> bool {
    from == to
        || to.is_recovery()
        || from.is_hub()
        || to.is_hub()
        || (from.is_pilot_family() && to.is_pilot_family())
}

/// Check a mode-change request in full: status gate, capability gate, then
/// adjacency.
///
/// # Errors
///
/// [`ModeError::NotPermitted`] unless `status` is Armed, TakingOff, InFlight
/// or Landing; [`ModeError::MissingCapability`] when the target mode is
/// capability-gated and `capabilities` lacks it;
/// [`ModeError::Incompatible`] when the pair fails [`is_compatible`].
pub fn check(
    status: Status,
    capabilities: CapabilitySet,
    from: FlightMode,
    to: FlightMode,
) -> Result<(), ModeError> {
    if !status.allows_mode_changes() {
        return Err(ModeError::NotPermitted { status });
    }
    if let Some(required) = to.required_capability() {
        if !capabilities.contains(required) {
            return Err(ModeError::MissingCapability { required });
        }
    }
    if !is_compatible(from, to) {
        return Err(ModeError::Incompatible { from, to });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERMITTED: [Status; 4] = [
        Status::Armed,
        Status::TakingOff,
        Status::InFlight,
        Status::Landing,
    ];

    #[test]
    fn test_mode_changes_gated_by_status() {
        for status in Status::ALL {
            let result = check(
                status,
                CapabilitySet::EMPTY,
                FlightMode::Guided,
                FlightMode::Auto,
            );
            if PERMITTED.contains(&status) {
                assert_eq!(result, Ok(()), "refused while {status}");
            } else {
                assert_eq!(result, Err(ModeError::NotPermitted { status }), "{status}");
            }
        }
    }

    #[test]
    fn test_recovery_modes_always_legal_targets() {
        for status in PERMITTED {
            for from in FlightMode::ALL {
                for to in [FlightMode::Land, FlightMode::ReturnToLaunch] {
                    assert_eq!(
                        check(status, CapabilitySet::EMPTY, from, to),
                        Ok(()),
                        "{from} -> {to} while {status}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_hubs_reach_everything() {
        for hub in [FlightMode::Guided, FlightMode::PositionHold] {
            for to in FlightMode::ALL {
                assert!(is_compatible(hub, to), "{hub} -> {to}");
                assert!(is_compatible(to, hub), "{to} -> {hub}");
            }
        }
    }

    #[test]
    fn test_autonomous_modes_do_not_chain_directly() {
        assert!(!is_compatible(FlightMode::Auto, FlightMode::Follow));
        assert!(!is_compatible(FlightMode::Follow, FlightMode::Circle));
        assert!(!is_compatible(FlightMode::Circle, FlightMode::Auto));
    }

    #[test]
    fn test_recovery_modes_exit_through_hubs_only() {
        assert!(is_compatible(FlightMode::ReturnToLaunch, FlightMode::Guided));
        assert!(is_compatible(FlightMode::Land, FlightMode::PositionHold));
        assert!(!is_compatible(FlightMode::ReturnToLaunch, FlightMode::Auto));
        assert!(!is_compatible(FlightMode::Land, FlightMode::Manual));
        // Swapping one recovery mode for the other stays legal.
        assert!(is_compatible(FlightMode::ReturnToLaunch, FlightMode::Land));
    }

    #[test]
    fn test_pilot_family_interchanges_freely() {
        let family = [
            FlightMode::Manual,
            FlightMode::Stabilize,
            FlightMode::AltitudeHold,
            FlightMode::PositionHold,
        ];
        for from in family {
            for to in family {
                assert!(is_compatible(from, to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_pilot_modes_do_not_jump_into_autonomy() {
        assert!(!is_compatible(FlightMode::Manual, FlightMode::Auto));
        assert!(!is_compatible(FlightMode::Stabilize, FlightMode::Follow));
        assert!(!is_compatible(FlightMode::AltitudeHold, FlightMode::Circle));
    }

    #[test]
    fn test_same_mode_is_a_no_op() {
        for mode in FlightMode::ALL {
            assert!(is_compatible(mode, mode), "{mode} -> {mode}");
        }
    }

    #[test]
    fn test_incompatible_error_reports_pair() {
        let err = check(
            Status::InFlight,
            CapabilitySet::EMPTY,
            FlightMode::Auto,
            FlightMode::Follow,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ModeError::Incompatible {
                from: FlightMode::Auto,
                to: FlightMode::Follow,
            }
        );
        assert!(err.to_string().contains("stage through"));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("rtl".parse::<FlightMode>(), Ok(FlightMode::ReturnToLaunch));
        assert_eq!(
            "position-hold".parse::<FlightMode>(),
            Ok(FlightMode::PositionHold)
        );
        assert_eq!("GUIDED".parse::<FlightMode>(), Ok(FlightMode::Guided));
        assert!("warp".parse::<FlightMode>().is_err());
    }

    #[test]
    fn test_no_shipped_mode_is_capability_gated() {
        for mode in FlightMode::ALL {
            assert_eq!(mode.required_capability(), None, "{mode}");
        }
    }
}
