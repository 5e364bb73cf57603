//! [`SideEffects`] – fire-and-forget gestures and sound cues.
//!
//! Gestures run on Tokio's blocking pool because servo moves block for the
//! length of the motion.  At most `max_in_flight` gestures run at once;
//! requests beyond that are dropped and logged.  Nothing here is awaited by
//! the caller and no failure propagates: a jammed servo or a missing cue
//! file only produces a warning.

use std::sync::Arc;

use aira_hal::Peripherals;
use aira_middleware::EventBus;
use aira_types::{ActionMarker, Cue, Event, EventPayload, Gesture};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

const SOURCE: &str = "aira-runtime::dispatch";

#[derive(Clone)]
pub struct SideEffects {
    peripherals: Peripherals,
    bus: EventBus,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl SideEffects {
    pub fn new(peripherals: Peripherals, bus: EventBus, max_in_flight: usize) -> Self {
        let capacity = max_in_flight.max(1);
        Self {
            peripherals,
            bus,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Start `gesture` in the background.  Returns `false` if it was dropped
    /// because too many gestures are already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn gesture(&self, gesture: Gesture) -> bool {
        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            warn!(?gesture, "side-effect budget exhausted; gesture dropped");
            return false;
        };
        let body = Arc::clone(&self.peripherals.body);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            match body.perform(gesture) {
                Ok(()) => debug!(?gesture, body = body.id(), "gesture complete"),
                Err(e) => warn!(?gesture, error = %e, "gesture failed"),
            }
        });
        true
    }

    /// Announce `marker` on the bus and start its gesture.
    pub fn action(&self, marker: ActionMarker) -> bool {
        let _ = self
            .bus
            .publish(Event::new(SOURCE, EventPayload::ActionTriggered(marker)));
        self.gesture(marker.gesture())
    }

    /// Play a local cue.  Drivers return immediately, so this runs inline.
    pub fn cue(&self, cue: Cue) {
        if let Err(e) = self.peripherals.audio.play_cue(cue) {
            warn!(cue = cue.asset_name(), error = %e, "cue playback failed");
        }
        let _ = self.bus.publish(Event::new(SOURCE, EventPayload::CuePlayed(cue)));
    }

    /// Gestures currently running.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// Wait until no gesture is running.  New gestures are refused while
    /// this waits.
    pub async fn drain(&self) {
        let want = u32::try_from(self.capacity).unwrap_or(u32::MAX);
        match self.permits.acquire_many(want).await {
            Ok(all) => drop(all),
            Err(_) => debug!("gesture budget closed"),
        }
    }
}
