//! Simulated drones for exercising the groundlink fleet core.
//!
//! [`SimulatedDrone`] is a [`TelemetrySource`] that flies a scripted sortie:
//! a few preflight samples on the ground, a climb to cruise altitude, a hold,
//! then a descent back to the takeoff point. Every sample carries a little
//! sensor jitter, seeded from the drone id so runs are reproducible.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use groundlink::source::{Result, SourceError, SourceHandle, SourceStatus, TelemetrySource};
use groundlink::{DroneId, RawSample};

/// Launch point for simulated drones (a field near Zurich).
const HOME_LATITUDE: f64 = 47.397_742;
const HOME_LONGITUDE: f64 = 8.545_594;
const HOME_ELEVATION_M: f64 = 488.0;

/// Forward speed while holding at cruise altitude, m/s.
const CRUISE_SPEED_MPS: f64 = 8.0;
/// Forward speed during the climb and descent legs, m/s.
const TRANSITION_SPEED_MPS: f64 = 0.5;

const POSITION_JITTER_DEG: f64 = 0.000_02;
const VELOCITY_JITTER_MPS: f64 = 0.3;
const ATTITUDE_JITTER_RAD: f64 = 0.02;

/// Shape of the scripted sortie a [`SimulatedDrone`] flies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortieProfile {
    /// Samples emitted on the ground before the climb begins.
    pub preflight_samples: usize,

    /// Altitude to climb to and hold, meters above the takeoff point.
    pub cruise_altitude_m: f64,

    /// Climb and descent rate, m/s.
    pub vertical_rate_mps: f64,

    /// How long to hold at cruise altitude.
    pub cruise_duration: Duration,

    /// Spacing between consecutive samples. Must be non-zero.
    pub sample_interval: Duration,

    /// Battery drained per emitted sample, percentage points.
    pub battery_drain_pct: f64,
}

impl Default for SortieProfile {
    fn default() -> Self {
        Self {
            preflight_samples: 3,
            cruise_altitude_m: 30.0,
            vertical_rate_mps: 3.0,
            cruise_duration: Duration::from_secs(5),
            sample_interval: Duration::from_millis(200),
            battery_drain_pct: 0.05,
        }
    }
}

/// One planned sample: altitude above the takeoff point plus the body-frame
/// speeds flown at that instant. Vertical speed is +z down, so a climb
/// carries a negative value.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PathStep {
    altitude_m: f64,
    vertical_mps: f64,
    forward_mps: f64,
}

/// Lay out the whole sortie as one step per sample tick.
fn flight_path(profile: &SortieProfile) -> Vec<PathStep> {
    let dt = profile.sample_interval.as_secs_f64();
    let step = profile.vertical_rate_mps * dt;
    let mut path = Vec::new();

    for _ in 0..profile.preflight_samples {
        path.push(PathStep {
            altitude_m: 0.0,
            vertical_mps: 0.0,
            forward_mps: 0.0,
        });
    }

    // A zero rate never reaches altitude; skip straight to the hold.
    let mut altitude = 0.0;
    if step > 0.0 {
        while altitude < profile.cruise_altitude_m {
            altitude = (altitude + step).min(profile.cruise_altitude_m);
            path.push(PathStep {
                altitude_m: altitude,
                vertical_mps: -profile.vertical_rate_mps,
                forward_mps: TRANSITION_SPEED_MPS,
            });
        }
    }

    let hold = profile.cruise_duration.as_millis() / profile.sample_interval.as_millis().max(1);
    for _ in 0..usize::try_from(hold).unwrap_or(usize::MAX) {
        path.push(PathStep {
            altitude_m: altitude,
            vertical_mps: 0.0,
            forward_mps: CRUISE_SPEED_MPS,
        });
    }

    if step > 0.0 {
        while altitude > 0.0 {
            altitude = (altitude - step).max(0.0);
            path.push(PathStep {
                altitude_m: altitude,
                vertical_mps: profile.vertical_rate_mps,
                forward_mps: TRANSITION_SPEED_MPS,
            });
        }
    }

    path
}

/// A telemetry source that flies a scripted sortie for one drone.
///
/// # Examples
///
/// ```no_run
/// use groundlink::source::TelemetrySource;
/// use groundlink_sim::SimulatedDrone;
/// use tokio::sync::mpsc;
///
/// # async fn demo() -> groundlink::source::Result<()> {
/// let mut drone = SimulatedDrone::new("scout-1".parse().unwrap());
/// let (tx, mut rx) = mpsc::channel::<groundlink::telemetry::RawSample>(32);
///
/// tokio::spawn(async move {
///     while let Some(sample) = rx.recv().await {
///         println!("altitude {:.1} m", sample.relative_altitude);
///     }
/// });
///
/// drone.start(tx).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SimulatedDrone {
    handle: SourceHandle,
    profile: SortieProfile,
    heading_rad: f64,
    battery_pct: f64,
    samples_sent: u64,
    running: Arc<AtomicBool>,
    rng: fastrand::Rng,
}

impl SimulatedDrone {
    /// Create a simulator for `id` flying the default profile.
    #[must_use]
    pub fn new(id: DroneId) -> Self {
        Self::with_profile(id, SortieProfile::default())
    }

    /// Create a simulator for `id` flying `profile`.
    #[must_use]
    pub fn with_profile(id: DroneId, profile: SortieProfile) -> Self {
        let seed = id
            .as_str()
            .bytes()
            .fold(0x9E37_79B9_7F4A_7C15_u64, |acc, byte| {
                acc.rotate_left(5) ^ u64::from(byte)
            });

        Self {
            handle: SourceHandle::new(id),
            profile,
            heading_rad: 0.0,
            battery_pct: 100.0,
            samples_sent: 0,
            running: Arc::new(AtomicBool::new(false)),
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// The profile this drone flies.
    #[must_use]
    pub fn profile(&self) -> &SortieProfile {
        &self.profile
    }

    /// Cloneable handle for stopping the sortie from another task.
    #[must_use]
    pub fn handle(&self) -> SourceHandle {
        self.handle.clone()
    }

    fn jitter(&mut self, scale: f64) -> f64 {
        (self.rng.f64() - 0.5) * 2.0 * scale
    }

    fn next_sample(&mut self, step: PathStep) -> RawSample {
        self.battery_pct = (self.battery_pct - self.profile.battery_drain_pct).max(0.0);
        self.heading_rad += self.jitter(ATTITUDE_JITTER_RAD);

        let mut sample = RawSample::new(Utc::now());
        sample.latitude = HOME_LATITUDE + self.jitter(POSITION_JITTER_DEG);
        sample.longitude = HOME_LONGITUDE + self.jitter(POSITION_JITTER_DEG);
        sample.absolute_altitude = HOME_ELEVATION_M + step.altitude_m;
        sample.relative_altitude = step.altitude_m;
        sample.roll = self.jitter(ATTITUDE_JITTER_RAD);
        sample.pitch = self.jitter(ATTITUDE_JITTER_RAD);
        sample.yaw = self.heading_rad;
        sample.velocity_x = step.forward_mps + self.jitter(VELOCITY_JITTER_MPS);
        sample.velocity_y = self.jitter(VELOCITY_JITTER_MPS);
        sample.velocity_z = step.vertical_mps + self.jitter(VELOCITY_JITTER_MPS);
        sample.battery_percent = self.battery_pct;
        sample
    }
}

#[async_trait::async_trait]
impl TelemetrySource for SimulatedDrone {
    fn drone(&self) -> &DroneId {
        self.handle.drone()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn status(&self) -> SourceStatus {
        if self.is_running() {
            SourceStatus::running(self.handle.drone().clone(), self.samples_sent)
        } else {
            SourceStatus::stopped(self.handle.drone().clone())
        }
    }

    async fn start(&mut self, tx: mpsc::Sender<RawSample>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SourceError::AlreadyRunning);
        }
        self.handle.reset();
        self.battery_pct = 100.0;

        debug!(drone = %self.handle.drone(), "simulated sortie starting");

        let path = flight_path(&self.profile);
        // tokio panics on a zero interval.
        let period = self.profile.sample_interval.max(Duration::from_millis(1));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for step in path {
            ticker.tick().await;

            if self.handle.should_stop() {
                debug!(drone = %self.handle.drone(), "simulated sortie stopped early");
                break;
            }

            let sample = self.next_sample(step);
            if tx.send(sample).await.is_err() {
                self.running.store(false, Ordering::SeqCst);
                return Err(SourceError::ChannelClosed);
            }
            self.samples_sent += 1;
        }

        self.running.store(false, Ordering::SeqCst);
        debug!(
            drone = %self.handle.drone(),
            samples = self.samples_sent,
            "simulated sortie complete"
        );
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.handle.stop();
        Ok(())
    }
}
