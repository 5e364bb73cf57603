//! Render loop: one face frame per tick at a fixed target rate.
//!
//! Each tick drains surface events, samples the [`SharedState`], resolves the
//! displayed sub-state, steps the [`FaceEngine`] and draws.  Nothing in the
//! tick awaits the network or a device, so a stalled backend can never
//! freeze the face.  Missed ticks are skipped rather than replayed, and `dt`
//! is capped so a long stall does not make the face jump.
//!
//! Surfaces are not `Send`; the loop runs on the orchestrator's own task.

use std::sync::Arc;
use std::time::Duration;

use aira_face::{FaceEngine, FaceInputs};
use aira_hal::RenderSurface;
use aira_types::AnimationFrame;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::overlay::DisplayOverlay;
use crate::state::SharedState;

/// Largest `dt` fed to the engine in one tick, in seconds.
const MAX_DT: f32 = 0.1;

pub struct RenderLoop {
    state: Arc<SharedState>,
    engine: FaceEngine,
    overlay: DisplayOverlay,
    period: Duration,
    log_every: u64,
}

impl RenderLoop {
    pub fn new(
        state: Arc<SharedState>,
        engine: FaceEngine,
        overlay: DisplayOverlay,
        period: Duration,
    ) -> Self {
        Self {
            state,
            engine,
            overlay,
            period: period.max(Duration::from_millis(1)),
            log_every: 0,
        }
    }

    /// Log a frame summary every `n` frames (0 disables).
    pub fn log_every(mut self, n: u64) -> Self {
        self.log_every = n;
        self
    }

    /// Draw until `stop` is cancelled.  A quit request from the surface
    /// cancels `shutdown`; drawing continues until `stop` so the shutdown
    /// sequence stays visible.  Returns the number of frames drawn.
    pub async fn run(
        mut self,
        surface: &mut dyn RenderSurface,
        shutdown: CancellationToken,
        stop: CancellationToken,
    ) -> u64 {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = Instant::now();
        let mut frames: u64 = 0;
        let mut draw_failures: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if surface.pump_events().quit_requested && !shutdown.is_cancelled() {
                info!("quit requested by render surface");
                shutdown.cancel();
            }

            let now = Instant::now();
            let dt = now.saturating_duration_since(last).as_secs_f32().min(MAX_DT);
            last = now;

            let frame = self.tick(dt, now);
            match surface.draw(&frame) {
                Ok(()) => draw_failures = 0,
                Err(e) => {
                    draw_failures += 1;
                    if draw_failures == 1 {
                        warn!(error = %e, "draw failed");
                    } else {
                        debug!(error = %e, streak = draw_failures, "draw failed");
                    }
                }
            }

            frames += 1;
            if self.log_every > 0 && frames % self.log_every == 0 {
                debug!(
                    frames,
                    state = %frame.state,
                    eyelid = frame.eyelid,
                    mouth = frame.mouth_height,
                    "render heartbeat"
                );
            }
        }
        frames
    }

    fn tick(&mut self, dt: f32, now: Instant) -> AnimationFrame {
        let snap = self.state.snapshot();
        let shown = self.overlay.resolve(
            snap.lifecycle,
            snap.input_envelope,
            snap.output_envelope,
            now,
        );
        self.engine.step(
            dt,
            &FaceInputs {
                state: shown,
                emotion: snap.emotion,
                output_envelope: snap.output_envelope,
                gaze: snap.gaze,
            },
        )
    }
}
