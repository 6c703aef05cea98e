//! Link-agnostic telemetry source abstraction.
//!
//! This module defines the core traits and types that telemetry providers
//! (radio links, serial bridges, simulators) must fulfill to feed samples
//! into a [`Fleet`](crate::fleet::Fleet).

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::drone::DroneId;
use crate::fleet::Fleet;
use crate::telemetry::RawSample;

/// Errors that can occur while operating a telemetry source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source failed to start.
    #[error("failed to start source: {0}")]
    StartFailed(String),

    /// The source failed to stop.
    #[error("failed to stop source: {0}")]
    StopFailed(String),

    /// The source is already running.
    #[error("source already running")]
    AlreadyRunning,

    /// The source is not running.
    #[error("source not running")]
    NotRunning,

    /// The sample channel was closed while the source was still producing.
    #[error("sample channel closed")]
    ChannelClosed,

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Status of a telemetry source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    /// The drone this source reports for.
    pub drone_id: DroneId,

    /// Whether the source is currently producing samples.
    pub is_running: bool,

    /// Number of samples emitted since startup.
    pub sample_count: u64,

    /// Human-readable status message.
    pub message: String,
}

impl SourceStatus {
    /// Create a new status for a stopped source.
    #[must_use]
    pub fn stopped(drone_id: DroneId) -> Self {
        Self {
            drone_id,
            is_running: false,
            sample_count: 0,
            message: "Source stopped".to_string(),
        }
    }

    /// Create a new status for a running source.
    #[must_use]
    pub fn running(drone_id: DroneId, sample_count: u64) -> Self {
        Self {
            drone_id,
            is_running: true,
            sample_count,
            message: "Source running".to_string(),
        }
    }
}

/// A trait for telemetry providers.
///
/// Implementors produce the actual sample stream for one drone over a
/// specific link (radio, serial, simulation).
#[async_trait::async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Get the drone this source reports for.
    fn drone(&self) -> &DroneId;

    /// Check if the source is currently producing samples.
    fn is_running(&self) -> bool;

    /// Get the current status of the source.
    fn status(&self) -> SourceStatus;

    /// Start the source and begin sending samples.
    ///
    /// Runs until the source is exhausted, signaled to stop, or the
    /// receiving side goes away.
    ///
    /// # Arguments
    ///
    /// * `tx` - Channel to send raw samples through
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails to start or the channel closes
    /// mid-stream.
    async fn start(&mut self, tx: mpsc::Sender<RawSample>) -> Result<()>;

    /// Stop the source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails to stop cleanly.
    fn stop(&self) -> Result<()>;
}

/// A handle to control telemetry sources.
///
/// This is a lightweight, cloneable handle that can be used to signal
/// sources from multiple tasks.
#[derive(Debug, Clone)]
pub struct SourceHandle {
    drone_id: DroneId,
    stop_signal: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl SourceHandle {
    /// Create a new source handle.
    #[must_use]
    pub fn new(drone_id: DroneId) -> Self {
        Self {
            drone_id,
            stop_signal: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Get the drone this handle controls the source for.
    #[must_use]
    pub fn drone(&self) -> &DroneId {
        &self.drone_id
    }

    /// Signal the source to stop.
    pub fn stop(&self) {
        self.stop_signal
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop_signal.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Reset the stop signal.
    pub fn reset(&self) {
        self.stop_signal
            .store(false, std::sync::atomic::Ordering::SeqCst);
    }
}

/// A collection of telemetry sources that can be signaled together.
#[derive(Debug, Default)]
pub struct SourceManager {
    handles: Vec<SourceHandle>,
}

impl SourceManager {
    /// Create a new source manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source handle to manage.
    pub fn add(&mut self, handle: SourceHandle) {
        self.handles.push(handle);
    }

    /// Stop all sources.
    pub fn stop_all(&self) {
        for handle in &self.handles {
            handle.stop();
        }
    }

    /// Get the number of managed sources.
    #[must_use]
    pub fn count(&self) -> usize {
        self.handles.len()
    }

    /// Check if any sources are still running (haven't been signaled to stop).
    #[must_use]
    pub fn any_running(&self) -> bool {
        self.handles.iter().any(|h| !h.should_stop())
    }
}

/// Counters for one pump run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Samples that passed validation and were applied.
    pub accepted: u64,

    /// Samples discarded by validation, ordering, or link state.
    pub rejected: u64,
}

/// Drain a sample channel into the fleet.
///
/// Runs until the channel closes or the drone is deregistered. Discarded
/// samples are logged and counted but never interrupt the stream.
pub async fn pump(fleet: Fleet, id: DroneId, mut rx: mpsc::Receiver<RawSample>) -> PumpStats {
    let mut stats = PumpStats::default();

    while let Some(sample) = rx.recv().await {
        match fleet.ingest(&id, sample).await {
            Ok(_) => stats.accepted += 1,
            Err(err) if err.is_unknown_drone() => {
                warn!(drone = %id, "stopping pump for deregistered drone");
                break;
            }
            Err(err) => {
                stats.rejected += 1;
                debug!(drone = %id, error = %err, "discarded telemetry sample");
            }
        }
    }

    debug!(
        drone = %id,
        accepted = stats.accepted,
        rejected = stats.rejected,
        "pump finished"
    );
    stats
}
