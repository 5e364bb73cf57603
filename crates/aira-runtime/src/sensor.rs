//! Sensor loop: face tracking into the shared gaze field.
//!
//! Polls the vision sensor at a fixed interval while a session is open.
//! Outside a session the gaze is cleared and the camera is left alone.
//! Tracking runs on the blocking pool; a failed or panicked read degrades to
//! "no target" rather than stopping the loop.

use std::sync::Arc;
use std::time::Duration;

use aira_hal::VisionSensor;
use aira_types::GazeOffset;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::state::SharedState;

pub async fn run_sensor_loop(
    vision: Arc<dyn VisionSensor>,
    state: Arc<SharedState>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !state.is_connected() {
            if state.gaze().is_some() {
                state.set_gaze(None);
            }
            continue;
        }

        let gaze = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            g = track(Arc::clone(&vision)) => g,
        };

        // The session may have closed while the camera was busy.
        if state.is_connected() {
            state.set_gaze(gaze);
        } else {
            state.set_gaze(None);
        }
    }
    state.set_gaze(None);
    debug!("sensor loop stopped");
}

async fn track(vision: Arc<dyn VisionSensor>) -> Option<GazeOffset> {
    match tokio::task::spawn_blocking(move || vision.track_face()).await {
        Ok(Ok(gaze)) => gaze,
        Ok(Err(e)) => {
            debug!(error = %e, "face tracking failed");
            None
        }
        Err(e) => {
            warn!(error = %e, "face tracking task aborted");
            None
        }
    }
}
