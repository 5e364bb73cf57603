//! [`FaceTuning`] – every constant the animation engine uses.
//!
//! All fields have defaults, so a config file only needs to list what it
//! overrides:
//!
//! ```toml
//! [face]
//! blink_interval_max = 8.0
//!
//! [face.palette]
//! love = [255, 80, 160]
//! ```

use serde::{Deserialize, Serialize};

use crate::palette::Palette;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceTuning {
    // ── smoothing gains (1/s) ──
    pub lid_gain: f32,
    pub color_gain: f32,
    pub pupil_gain: f32,
    pub mouth_gain: f32,

    // ── blinking (seconds) ──
    pub first_blink_delay: f32,
    pub blink_interval_min: f32,
    pub blink_interval_max: f32,
    pub blink_duration: f32,

    // ── mouth (canvas pixels, rad/s) ──
    pub mouth_rest: f32,
    pub mouth_rest_happy: f32,
    pub talk_rate: f32,
    pub talk_base: f32,
    pub talk_amplitude: f32,
    /// Per-tick chance of snapping the talking target to `talk_base`.
    pub stammer_probability: f32,
    /// Output envelope below which a talking mouth closes to `talk_base`.
    pub quiet_envelope: f32,

    // ── gaze (canvas pixels) ──
    pub gaze_scale_x: f32,
    pub gaze_scale_y: f32,
    pub sleep_look_down: f32,
    pub pupil_limit: f32,
    /// Per-tick chance of an idle glance when no face is tracked.
    pub glance_probability: f32,
    pub glance_range_x: f32,
    pub glance_range_y: f32,
    /// Seconds a glance target is held.
    pub glance_hold: f32,

    // ── breathing ──
    pub pupil_radius: f32,
    pub breath_rate: f32,
    pub breath_depth: f32,

    pub palette: Palette,
}

impl Default for FaceTuning {
    fn default() -> Self {
        Self {
            lid_gain: 15.0,
            color_gain: 5.0,
            pupil_gain: 8.0,
            mouth_gain: 20.0,

            first_blink_delay: 2.0,
            blink_interval_min: 2.0,
            blink_interval_max: 6.0,
            blink_duration: 0.15,

            mouth_rest: 8.0,
            mouth_rest_happy: 20.0,
            talk_rate: 15.0,
            talk_base: 10.0,
            talk_amplitude: 40.0,
            stammer_probability: 0.1,
            quiet_envelope: 0.0,

            gaze_scale_x: 60.0,
            gaze_scale_y: 40.0,
            sleep_look_down: 30.0,
            pupil_limit: 30.0,
            glance_probability: 0.01,
            glance_range_x: 20.0,
            glance_range_y: 10.0,
            glance_hold: 0.5,

            pupil_radius: 45.0,
            breath_rate: 2.0,
            breath_depth: 2.0,

            palette: Palette::default(),
        }
    }
}

impl FaceTuning {
    /// Inclusive `(lo, hi)` bounds for the mouth height while talking.
    pub fn talk_bounds(&self) -> (f32, f32) {
        let lo = self.talk_base.min(self.talk_base + self.talk_amplitude);
        let hi = self.talk_base.max(self.talk_base + self.talk_amplitude);
        (lo, hi)
    }

    /// Inclusive `(lo, hi)` bounds for the mouth height in any state.
    pub fn mouth_bounds(&self) -> (f32, f32) {
        let (tlo, thi) = self.talk_bounds();
        let lo = tlo.min(self.mouth_rest).min(self.mouth_rest_happy).max(0.0);
        let hi = thi.max(self.mouth_rest).max(self.mouth_rest_happy);
        (lo, hi)
    }

    /// Blink interval bounds in ascending order.
    pub fn blink_interval(&self) -> (f32, f32) {
        let a = self.blink_interval_min.max(0.0);
        let b = self.blink_interval_max.max(0.0);
        (a.min(b), a.max(b))
    }
}
