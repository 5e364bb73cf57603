//! [`RuntimeConfig`] – timing, thresholds and face tuning for one run.
//!
//! The CLI builds this from `~/.aira/config.toml` and environment
//! overrides; tests build it directly, usually with shortened delays.

use std::time::Duration;

use aira_face::FaceTuning;
use aira_middleware::LiveConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Session parameters passed to the backend.
    pub live: LiveConfig,

    /// Render loop target rate.
    pub fps: u32,
    /// `SLEEPING` → `WAKING` delay at startup.
    pub boot_delay: Duration,
    /// Pause after the wake cue before the first connect attempt.
    pub wake_settle: Duration,
    /// Fixed backoff between entering `ERROR` and moving to `RETRYING`.
    pub retry_delay: Duration,
    /// Upper bound on one session open.
    pub open_timeout: Duration,

    pub sensor_interval: Duration,
    pub mic_poll_interval: Duration,
    /// Minimum spacing between uplinked camera frames.
    pub camera_interval: Duration,

    /// Output envelope above which the face shows `TALKING`.
    pub talk_threshold: f32,
    /// Input envelope above which the face shows `LISTENING`.
    pub listen_threshold: f32,
    /// How long after the user was last heard the face shows `THINKING`.
    pub thinking_window: Duration,

    /// Maximum number of gesture tasks in flight; extra requests are dropped.
    pub max_side_effects: usize,
    /// Emit a debug log every N rendered frames (0 disables).
    pub frame_log_every: u64,

    pub face: FaceTuning,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            live: LiveConfig::default(),
            fps: 60,
            boot_delay: Duration::from_secs(1),
            wake_settle: Duration::from_secs(2),
            retry_delay: Duration::from_secs(5),
            open_timeout: Duration::from_secs(15),
            sensor_interval: Duration::from_millis(100),
            mic_poll_interval: Duration::from_millis(10),
            camera_interval: Duration::from_secs(1),
            talk_threshold: 0.02,
            listen_threshold: 0.03,
            thinking_window: Duration::from_millis(1500),
            max_side_effects: 4,
            frame_log_every: 0,
            face: FaceTuning::default(),
        }
    }
}

impl RuntimeConfig {
    /// Render tick period derived from [`fps`][Self::fps] (at least 1 fps).
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }
}
