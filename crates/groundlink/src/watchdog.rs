//! Per-drone telemetry staleness watchdog.
//!
//! Each registered drone gets one watchdog task. Every accepted sample
//! re-arms it through the slot's feed channel; when the configured timeout
//! passes without a feed, the watchdog delivers
//! [`StatusEvent::TelemetryTimeout`] through the ordinary transition path
//! and the state machine decides what that means. An airborne drone drops
//! to Emergency; on the ground the event is refused and nothing changes.
//!
//! The task exits when its feed channel closes, which happens when the
//! drone is deregistered.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::drone::DroneId;
use crate::fleet::Fleet;
use crate::status::StatusEvent;

/// Watch one drone's feed until the feed channel closes.
///
/// Armed by the first feed instant, re-armed by every later one, disarmed
/// after firing so a silent link raises at most one timeout per gap.
pub(crate) async fn run(
    fleet: Fleet,
    id: DroneId,
    mut feed: watch::Receiver<Instant>,
    timeout: Duration,
) {
    let mut deadline = Instant::now() + timeout;
    let mut armed = false;

    loop {
        tokio::select! {
            changed = feed.changed() => match changed {
                Ok(()) => {
                    deadline = *feed.borrow_and_update() + timeout;
                    armed = true;
                }
                Err(_) => break,
            },
            () = sleep_until(deadline), if armed => {
                armed = false;
                match fleet
                    .request_transition(&id, StatusEvent::TelemetryTimeout)
                    .await
                {
                    Ok(applied) => warn!(
                        id = %id,
                        from = %applied.from,
                        ?timeout,
                        "telemetry went stale in flight, drone is in emergency"
                    ),
                    // Not airborne: a quiet link is not an emergency.
                    Err(err) => debug!(id = %id, %err, "stale feed ignored"),
                }
            }
        }
    }

    debug!(id = %id, "watchdog stopped");
}
