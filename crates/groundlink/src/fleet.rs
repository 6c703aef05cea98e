//! The fleet registry and its concurrency envelope.
//!
//! A [`Fleet`] owns every registered drone and funnels all mutation through
//! one per-drone lock, so events, mode changes and telemetry for a single
//! vehicle are applied strictly one at a time while different vehicles
//! proceed in parallel. Reads go through [`watch`] channels and never wait
//! on a writer.
//!
//! Successful mutations are pushed to subscribers over a bounded
//! [`broadcast`] channel. A subscriber that falls behind loses the oldest
//! changes and is told so through `Lagged`; the fleet itself never blocks
//! on a slow consumer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::capability::{Capability, CapabilitySet};
use crate::config::Config;
use crate::drone::{
    AppliedTransition, Drone, DroneId, DroneSpec, DroneState, IngestOutcome, Thresholds,
};
use crate::error::{Error, Result};
use crate::events::{ChangeKind, StateChange};
use crate::mode::{FlightMode, ModeError};
use crate::status::{Status, StatusEvent};
use crate::telemetry::{RawSample, TelemetrySnapshot};
use crate::units::ValidationError;
use crate::watchdog;

/// Per-drone cell: the aggregate behind its mutation lock plus the channels
/// readers and the staleness watchdog hang off.
#[derive(Debug)]
struct Slot {
    drone: Mutex<Drone>,
    snapshot: watch::Sender<Option<Arc<TelemetrySnapshot>>>,
    feed: watch::Sender<Instant>,
}

#[derive(Debug)]
struct FleetInner {
    drones: RwLock<HashMap<DroneId, Arc<Slot>>>,
    events: broadcast::Sender<StateChange>,
    thresholds: Thresholds,
    staleness_timeout: Duration,
    max_drones: usize,
    id_pattern: regex::Regex,
}

/// Handle to the drone registry.
///
/// Cheap to clone; clones share the same fleet. All operations address
/// drones by id and return [`Error::UnknownDrone`] once a drone has been
/// deregistered, which is how long-running feeds learn to stop.
#[derive(Debug, Clone)]
pub struct Fleet {
    inner: Arc<FleetInner>,
}

impl Fleet {
    /// Build an empty fleet from a configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `config` fails validation.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let id_pattern = config.compiled_id_pattern()?;
        let (events, _) = broadcast::channel(config.fleet.events_buffer);

        Ok(Self {
            inner: Arc::new(FleetInner {
                drones: RwLock::new(HashMap::new()),
                events,
                thresholds: config.thresholds(),
                staleness_timeout: config.staleness_timeout(),
                max_drones: config.fleet.max_drones,
                id_pattern,
            }),
        })
    }

    /// Register a new drone in the [`Status::Offline`] state and start its
    /// staleness watchdog.
    ///
    /// # Errors
    ///
    /// The id must match the configured pattern, must not collide with a
    /// registered drone, and the fleet must be below its capacity limit.
    pub async fn register(&self, spec: DroneSpec) -> Result<()> {
        if !self.inner.id_pattern.is_match(spec.id.as_str()) {
            return Err(ValidationError::InvalidDroneId {
                id: spec.id.to_string(),
                reason: "rejected by the configured id pattern",
            }
            .into());
        }

        {
            let mut drones = self.inner.drones.write().await;
            if drones.contains_key(&spec.id) {
                return Err(Error::duplicate_drone(&spec.id));
            }
            if drones.len() >= self.inner.max_drones {
                return Err(Error::FleetAtCapacity {
                    limit: self.inner.max_drones,
                });
            }

            let (snapshot, _) = watch::channel(None);
            let (feed, feed_rx) = watch::channel(Instant::now());
            let slot = Arc::new(Slot {
                drone: Mutex::new(Drone::new(spec.id.clone(), spec.capabilities)),
                snapshot,
                feed,
            });
            drones.insert(spec.id.clone(), slot);

            tokio::spawn(watchdog::run(
                self.clone(),
                spec.id.clone(),
                feed_rx,
                self.inner.staleness_timeout,
            ));
        }

        info!(id = %spec.id, capabilities = %spec.capabilities, "drone registered");
        self.publish(StateChange::new(
            spec.id,
            Status::default(),
            FlightMode::default(),
            ChangeKind::Registered,
            None,
        ));
        Ok(())
    }

    /// Remove a drone and return its final state.
    ///
    /// The watchdog and any pumps feeding this drone wind down on their own:
    /// the watchdog when its feed channel closes, pumps on the next
    /// [`Error::UnknownDrone`]. An operation already holding the drone when
    /// it is removed still completes.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownDrone`] when no such drone is registered.
    pub async fn deregister(&self, id: &DroneId) -> Result<DroneState> {
        let slot = {
            let mut drones = self.inner.drones.write().await;
            drones.remove(id).ok_or_else(|| Error::unknown_drone(id))?
        };

        let state = slot.drone.lock().await.state();
        info!(id = %id, status = %state.status, "drone deregistered");
        self.publish(StateChange::new(
            id.clone(),
            state.status,
            state.mode,
            ChangeKind::Deregistered,
            slot.snapshot.borrow().clone(),
        ));
        Ok(state)
    }

    /// Apply one status event to one drone.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownDrone`], or the [`TransitionError`] the state machine
    /// refused the event with; the drone is unchanged in that case.
    ///
    /// [`TransitionError`]: crate::status::TransitionError
    pub async fn request_transition(
        &self,
        id: &DroneId,
        event: StatusEvent,
    ) -> Result<AppliedTransition> {
        let slot = self.slot(id).await?;
        let mut drone = slot.drone.lock().await;

        let from = drone.status();
        let to = drone.apply_event(event)?;

        // Published before the drone lock is released, so subscribers see
        // one drone's changes in application order.
        self.publish(StateChange::new(
            id.clone(),
            to,
            drone.mode(),
            ChangeKind::StatusChanged { from, to, event },
            drone.latest(),
        ));
        Ok(AppliedTransition { from, to, event })
    }

    /// Request a flight-mode change.
    ///
    /// Re-requesting the active mode succeeds silently; no change is
    /// published.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownDrone`], or the [`ModeError`] the mode machine
    /// refused the request with.
    pub async fn set_mode(&self, id: &DroneId, to: FlightMode) -> Result<FlightMode> {
        let slot = self.slot(id).await?;
        let mut drone = slot.drone.lock().await;

        let from = drone.mode();
        drone.set_mode(to)?;
        if from != to {
            self.publish(StateChange::new(
                id.clone(),
                drone.status(),
                to,
                ChangeKind::ModeChanged { from, to },
                drone.latest(),
            ));
        }
        Ok(to)
    }

    /// Ingest one raw telemetry sample for one drone.
    ///
    /// On success the snapshot becomes visible to [`latest`] and every
    /// snapshot watcher, the staleness watchdog is re-armed, and one
    /// [`ChangeKind::StatusChanged`] per derived transition is published
    /// followed by a [`ChangeKind::SnapshotIngested`].
    ///
    /// # Errors
    ///
    /// [`Error::UnknownDrone`], or the [`TelemetryError`] that discarded the
    /// sample. A discarded sample leaves the drone, its snapshot and its
    /// watchdog untouched.
    ///
    /// [`latest`]: Fleet::latest
    /// [`TelemetryError`]: crate::telemetry::TelemetryError
    pub async fn ingest(&self, id: &DroneId, sample: RawSample) -> Result<IngestOutcome> {
        let slot = self.slot(id).await?;
        let mut drone = slot.drone.lock().await;

        let outcome = drone.ingest(&sample, &self.inner.thresholds)?;

        slot.snapshot
            .send_replace(Some(Arc::clone(&outcome.snapshot)));
        slot.feed.send_replace(Instant::now());

        for applied in &outcome.transitions {
            self.publish(StateChange::new(
                id.clone(),
                applied.to,
                drone.mode(),
                ChangeKind::StatusChanged {
                    from: applied.from,
                    to: applied.to,
                    event: applied.event,
                },
                Some(Arc::clone(&outcome.snapshot)),
            ));
        }
        self.publish(StateChange::new(
            id.clone(),
            drone.status(),
            drone.mode(),
            ChangeKind::SnapshotIngested {
                sequence_number: outcome.snapshot.sequence_number,
            },
            Some(Arc::clone(&outcome.snapshot)),
        ));

        Ok(outcome)
    }

    /// Command the payload bay to release.
    ///
    /// # Errors
    ///
    /// [`ModeError::MissingCapability`] when the drone does not advertise
    /// [`Capability::PayloadBay`]; [`Error::CommandNotPermitted`] unless the
    /// drone is in flight.
    pub async fn command_payload_drop(&self, id: &DroneId) -> Result<()> {
        let slot = self.slot(id).await?;
        let drone = slot.drone.lock().await;

        if !drone.has_capability(Capability::PayloadBay) {
            return Err(ModeError::MissingCapability {
                required: Capability::PayloadBay,
            }
            .into());
        }
        if drone.status() != Status::InFlight {
            return Err(Error::CommandNotPermitted {
                command: "payload drop",
                status: drone.status(),
            });
        }

        info!(id = %id, "payload release commanded");
        self.publish(StateChange::new(
            id.clone(),
            drone.status(),
            drone.mode(),
            ChangeKind::PayloadReleased,
            drone.latest(),
        ));
        Ok(())
    }

    /// Change a drone's capability set.
    ///
    /// Capability sets are fixed at registration, so for a registered drone
    /// this always fails; it exists to give the request a first-class
    /// refusal.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownDrone`] or [`Error::ImmutableCapabilitySet`].
    pub async fn amend_capabilities(
        &self,
        id: &DroneId,
        _capabilities: CapabilitySet,
    ) -> Result<()> {
        let _ = self.slot(id).await?;
        Err(Error::ImmutableCapabilitySet { id: id.clone() })
    }

    /// The latest accepted snapshot, or [`None`] before the first sample.
    ///
    /// Reads the snapshot channel, so it returns without waiting even while
    /// the drone is mid-mutation.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownDrone`] when no such drone is registered.
    pub async fn latest(&self, id: &DroneId) -> Result<Option<Arc<TelemetrySnapshot>>> {
        let slot = self.slot(id).await?;
        let snapshot = slot.snapshot.borrow().clone();
        Ok(snapshot)
    }

    /// Subscribe to a drone's snapshot stream.
    ///
    /// The receiver always holds the most recent snapshot; intermediate
    /// values may be skipped under load. It reports closed once the drone
    /// is deregistered.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownDrone`] when no such drone is registered.
    pub async fn watch_snapshots(
        &self,
        id: &DroneId,
    ) -> Result<watch::Receiver<Option<Arc<TelemetrySnapshot>>>> {
        Ok(self.slot(id).await?.snapshot.subscribe())
    }

    /// Subscribe to every successful mutation in the fleet.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.inner.events.subscribe()
    }

    /// A serializable view of one drone's full state.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownDrone`] when no such drone is registered.
    pub async fn describe(&self, id: &DroneId) -> Result<DroneState> {
        let slot = self.slot(id).await?;
        let state = slot.drone.lock().await.state();
        Ok(state)
    }

    /// Registered drone ids, sorted.
    pub async fn list(&self) -> Vec<DroneId> {
        let drones = self.inner.drones.read().await;
        let mut ids: Vec<DroneId> = drones.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered drones.
    pub async fn len(&self) -> usize {
        self.inner.drones.read().await.len()
    }

    /// Whether the fleet has no registered drones.
    pub async fn is_empty(&self) -> bool {
        self.inner.drones.read().await.is_empty()
    }

    /// Whether `id` is currently registered.
    pub async fn contains(&self, id: &DroneId) -> bool {
        self.inner.drones.read().await.contains_key(id)
    }

    async fn slot(&self, id: &DroneId) -> Result<Arc<Slot>> {
        let drones = self.inner.drones.read().await;
        drones
            .get(id)
            .cloned()
            .ok_or_else(|| Error::unknown_drone(id))
    }

    fn publish(&self, change: StateChange) {
        debug!(id = %change.drone_id, kind = %change.kind, "state change");
        // Err only means nobody is subscribed right now.
        let _ = self.inner.events.send(change);
    }
}
