//! [`FaceEngine`] – turns the shared state into one [`AnimationFrame`] per
//! render tick.
//!
//! Every animated value moves toward a per-tick target under
//! [`approach`](crate::smoothing::approach):
//!
//! | Value        | Target                                                       |
//! |--------------|--------------------------------------------------------------|
//! | eyelid       | `1` asleep or mid-blink, else `0`                            |
//! | colour       | [`Palette::target`](crate::palette::Palette::target)        |
//! | pupil offset | look-down asleep, scaled face offset, idle glance, or centre |
//! | mouth        | talking wave, happy rest, or rest                            |
//!
//! The pupil radius is not smoothed; it breathes on a slow sine.
//!
//! # Example
//!
//! ```rust
//! use aira_face::{FaceEngine, FaceInputs, FaceTuning};
//! use aira_types::{Emotion, LifecycleState};
//!
//! let mut face = FaceEngine::with_seed(FaceTuning::default(), 42);
//! let inputs = FaceInputs {
//!     state: LifecycleState::Talking,
//!     emotion: Emotion::Neutral,
//!     output_envelope: 0.4,
//!     gaze: None,
//! };
//! let frame = face.step(1.0 / 60.0, &inputs);
//! assert!(frame.mouth_height >= 8.0 && frame.mouth_height <= 50.0);
//! ```

use std::f32::consts::TAU;

use aira_types::{AnimationFrame, Emotion, GazeOffset, LifecycleState, Rgb};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::blink::BlinkScheduler;
use crate::smoothing::{approach, approach_rgb};
use crate::tuning::FaceTuning;

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

/// Snapshot of everything the face reacts to on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceInputs {
    /// Displayed state (after the listening/talking overlay).
    pub state: LifecycleState,
    pub emotion: Emotion,
    /// Playback loudness in `[0, 1]`.
    pub output_envelope: f32,
    pub gaze: Option<GazeOffset>,
}

impl Default for FaceInputs {
    fn default() -> Self {
        Self {
            state: LifecycleState::Sleeping,
            emotion: Emotion::Neutral,
            output_envelope: 0.0,
            gaze: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Glance {
    x: f32,
    y: f32,
    /// Seconds left before the glance is released.
    remaining: f32,
}

// ────────────────────────────────────────────────────────────────────────────
// FaceEngine
// ────────────────────────────────────────────────────────────────────────────

/// Stateful animation integrator.  Owned by the render loop; not shared.
#[derive(Debug)]
pub struct FaceEngine {
    tuning: FaceTuning,
    rng: StdRng,
    clock: f64,

    eyelid: f32,
    pupil_x: f32,
    pupil_y: f32,
    mouth: f32,
    color: Rgb,

    talk_phase: f64,
    breath_phase: f32,
    blink: BlinkScheduler,
    glance: Option<Glance>,
    pupil_target: (f32, f32),
    mouth_target: f32,
}

impl FaceEngine {
    /// Engine seeded from OS entropy.
    pub fn new(tuning: FaceTuning) -> Self {
        Self::with_rng(tuning, StdRng::from_entropy())
    }

    /// Deterministic engine for tests and replays.
    pub fn with_seed(tuning: FaceTuning, seed: u64) -> Self {
        Self::with_rng(tuning, StdRng::seed_from_u64(seed))
    }

    fn with_rng(tuning: FaceTuning, rng: StdRng) -> Self {
        let color = tuning.palette.target(LifecycleState::Sleeping, Emotion::Neutral);
        let blink = BlinkScheduler::new(tuning.first_blink_delay);
        let mouth = tuning.mouth_rest;
        Self {
            tuning,
            rng,
            clock: 0.0,
            eyelid: 1.0,
            pupil_x: 0.0,
            pupil_y: 0.0,
            mouth,
            color,
            talk_phase: 0.0,
            breath_phase: 0.0,
            blink,
            glance: None,
            pupil_target: (0.0, 0.0),
            mouth_target: mouth,
        }
    }

    pub fn tuning(&self) -> &FaceTuning {
        &self.tuning
    }

    /// Seconds of animation integrated so far.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Accumulated talking phase in radians.  Reset to zero on every tick
    /// spent outside `TALKING`.
    pub fn talk_phase(&self) -> f64 {
        self.talk_phase
    }

    /// Pupil target chosen on the most recent tick.
    pub fn pupil_target(&self) -> (f32, f32) {
        self.pupil_target
    }

    /// Mouth target chosen on the most recent tick.
    pub fn mouth_target(&self) -> f32 {
        self.mouth_target
    }

    pub fn is_blinking(&self) -> bool {
        self.blink.is_blinking()
    }

    /// Integrate one tick of `dt` seconds and return the frame to draw.
    ///
    /// Negative or non-finite `dt` is treated as zero.
    pub fn step(&mut self, dt: f32, inputs: &FaceInputs) -> AnimationFrame {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.clock += f64::from(dt);
        let state = inputs.state;

        // Mouth.
        let target_mouth = self.mouth_target_for(dt, inputs);
        self.mouth_target = target_mouth;
        self.mouth = approach(self.mouth, target_mouth, self.tuning.mouth_gain, dt);

        // Gaze.
        let (tx, ty) = self.gaze_target_for(dt, state, inputs.gaze);
        self.pupil_target = (tx, ty);
        self.pupil_x = approach(self.pupil_x, tx, self.tuning.pupil_gain, dt);
        self.pupil_y = approach(self.pupil_y, ty, self.tuning.pupil_gain, dt);

        // Colour.
        let target_color = self.tuning.palette.target(state, inputs.emotion);
        self.color = approach_rgb(self.color, target_color, self.tuning.color_gain, dt);

        // Eyelid.
        let eligible = !matches!(state, LifecycleState::Sleeping | LifecycleState::Error);
        let blinking = self.blink.update(
            dt,
            eligible,
            self.tuning.blink_interval(),
            self.tuning.blink_duration,
            &mut self.rng,
        );
        let target_lid = if state == LifecycleState::Sleeping || blinking {
            1.0
        } else {
            0.0
        };
        self.eyelid = approach(self.eyelid, target_lid, self.tuning.lid_gain, dt);

        // Breathing.
        self.breath_phase = (self.breath_phase + self.tuning.breath_rate * dt).rem_euclid(TAU);
        let pupil_radius =
            self.tuning.pupil_radius + self.breath_phase.sin() * self.tuning.breath_depth;

        self.frame(state, pupil_radius)
    }

    fn mouth_target_for(&mut self, dt: f32, inputs: &FaceInputs) -> f32 {
        let t = &self.tuning;
        if inputs.state != LifecycleState::Talking {
            self.talk_phase = 0.0;
            return if inputs.emotion == Emotion::Happy {
                t.mouth_rest_happy
            } else {
                t.mouth_rest
            };
        }

        self.talk_phase += f64::from(t.talk_rate.abs() * dt);
        let wave = ((self.talk_phase.sin() + 1.0) * 0.5) as f32;
        let stammer = self.rng.gen_bool(chance(t.stammer_probability));
        if stammer || inputs.output_envelope < t.quiet_envelope {
            t.talk_base
        } else {
            t.talk_base + t.talk_amplitude * wave
        }
    }

    fn gaze_target_for(
        &mut self,
        dt: f32,
        state: LifecycleState,
        gaze: Option<GazeOffset>,
    ) -> (f32, f32) {
        if state == LifecycleState::Sleeping {
            self.glance = None;
            return (0.0, self.tuning.sleep_look_down);
        }
        if let Some(g) = gaze {
            self.glance = None;
            return (g.x * self.tuning.gaze_scale_x, g.y * self.tuning.gaze_scale_y);
        }
        if state != LifecycleState::Idle {
            self.glance = None;
            return (0.0, 0.0);
        }

        if let Some(g) = self.glance.as_mut() {
            g.remaining -= dt;
            if g.remaining > 0.0 {
                return (g.x, g.y);
            }
            self.glance = None;
        }

        if self.rng.gen_bool(chance(self.tuning.glance_probability)) {
            let rx = self.tuning.glance_range_x.abs();
            let ry = self.tuning.glance_range_y.abs();
            let x = if rx > 0.0 { self.rng.gen_range(-rx..=rx) } else { 0.0 };
            let y = if ry > 0.0 { self.rng.gen_range(-ry..=ry) } else { 0.0 };
            self.glance = Some(Glance {
                x,
                y,
                remaining: self.tuning.glance_hold.max(0.0),
            });
            return (x, y);
        }
        (0.0, 0.0)
    }

    fn frame(&self, state: LifecycleState, pupil_radius: f32) -> AnimationFrame {
        let limit = self.tuning.pupil_limit.abs();
        let (mlo, mhi) = self.tuning.mouth_bounds();
        AnimationFrame {
            state,
            eyelid: self.eyelid.clamp(0.0, 1.0),
            pupil_x: self.pupil_x.clamp(-limit, limit),
            pupil_y: self.pupil_y.clamp(-limit, limit),
            pupil_radius,
            mouth_height: self.mouth.clamp(mlo, mhi),
            color: self.color,
            background: self.tuning.palette.background(),
        }
    }
}

/// Probability usable by `gen_bool`; anything outside `[0, 1]` is clamped
/// and NaN counts as never.
fn chance(p: f32) -> f64 {
    if p.is_nan() { 0.0 } else { f64::from(p.clamp(0.0, 1.0)) }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn inputs(state: LifecycleState) -> FaceInputs {
        FaceInputs {
            state,
            output_envelope: 0.5,
            ..FaceInputs::default()
        }
    }

    fn run(face: &mut FaceEngine, seconds: f32, inputs: &FaceInputs) -> AnimationFrame {
        let ticks = (seconds / DT).round() as usize;
        let mut last = face.step(0.0, inputs);
        for _ in 0..ticks {
            last = face.step(DT, inputs);
        }
        last
    }

    #[test]
    fn starts_asleep_with_closed_lids() {
        let mut face = FaceEngine::with_seed(FaceTuning::default(), 1);
        let frame = face.step(0.0, &FaceInputs::default());
        assert_eq!(frame.eyelid, 1.0);
        assert_eq!(frame.color.to_u8(), [20, 30, 50]);
    }

    #[test]
    fn sleeping_converges_to_closed_lids_and_downward_gaze() {
        let mut face = FaceEngine::with_seed(FaceTuning::default(), 2);
        // Wake up and look hard right first.
        let mut awake = inputs(LifecycleState::Idle);
        awake.gaze = Some(GazeOffset::new(1.0, -1.0));
        run(&mut face, 2.0, &awake);

        let mut asleep = inputs(LifecycleState::Sleeping);
        asleep.gaze = Some(GazeOffset::new(1.0, -1.0));
        let frame = run(&mut face, 3.0, &asleep);

        assert!((frame.eyelid - 1.0).abs() < 1e-3, "eyelid {}", frame.eyelid);
        assert!(frame.pupil_x.abs() < 0.1, "pupil_x {}", frame.pupil_x);
        assert!((frame.pupil_y - 30.0).abs() < 0.1, "pupil_y {}", frame.pupil_y);
        assert_eq!(face.pupil_target(), (0.0, 30.0));
    }

    #[test]
    fn talking_mouth_stays_in_bounds_and_phase_grows() {
        let mut face = FaceEngine::with_seed(FaceTuning::default(), 3);
        let talk = inputs(LifecycleState::Talking);
        let mut prev_phase = 0.0;
        let mut seen_open = false;
        for _ in 0..600 {
            let f = face.step(DT, &talk);
            assert!(f.mouth_height >= 8.0 && f.mouth_height <= 50.0);
            let target = face.mouth_target();
            assert!((10.0..=50.0).contains(&target), "target {target}");
            assert!(face.talk_phase() >= prev_phase);
            prev_phase = face.talk_phase();
            seen_open |= f.mouth_height > 30.0;
        }
        assert!(seen_open, "mouth never opened wide");
    }

    #[test]
    fn talk_phase_resets_outside_talking() {
        let mut face = FaceEngine::with_seed(FaceTuning::default(), 4);
        run(&mut face, 0.5, &inputs(LifecycleState::Talking));
        assert!(face.talk_phase() > 0.0);
        face.step(DT, &inputs(LifecycleState::Idle));
        assert_eq!(face.talk_phase(), 0.0);
    }

    #[test]
    fn happy_rest_mouth_is_wider() {
        let mut face = FaceEngine::with_seed(FaceTuning::default(), 5);
        let mut happy = inputs(LifecycleState::Idle);
        happy.emotion = Emotion::Happy;
        let frame = run(&mut face, 2.0, &happy);
        assert!((frame.mouth_height - 20.0).abs() < 0.05);
        let frame = run(&mut face, 2.0, &inputs(LifecycleState::Idle));
        assert!((frame.mouth_height - 8.0).abs() < 0.05);
    }

    #[test]
    fn quiet_playback_closes_talking_mouth() {
        let tuning = FaceTuning {
            stammer_probability: 0.0,
            quiet_envelope: 0.05,
            ..FaceTuning::default()
        };
        let mut face = FaceEngine::with_seed(tuning, 6);
        let mut talk = inputs(LifecycleState::Talking);
        talk.output_envelope = 0.0;
        for _ in 0..60 {
            face.step(DT, &talk);
            assert_eq!(face.mouth_target(), 10.0);
        }
    }

    #[test]
    fn stammer_always_snaps_to_base() {
        let tuning = FaceTuning {
            stammer_probability: 1.0,
            ..FaceTuning::default()
        };
        let mut face = FaceEngine::with_seed(tuning, 7);
        let frame = run(&mut face, 2.0, &inputs(LifecycleState::Talking));
        assert!((frame.mouth_height - 10.0).abs() < 0.05);
    }

    #[test]
    fn face_offset_is_scaled_and_clamped() {
        let mut face = FaceEngine::with_seed(FaceTuning::default(), 8);
        let mut idle = inputs(LifecycleState::Listening);
        idle.gaze = Some(GazeOffset::new(0.25, -0.5));
        let frame = run(&mut face, 3.0, &idle);
        assert!((frame.pupil_x - 15.0).abs() < 0.1);
        assert!((frame.pupil_y + 20.0).abs() < 0.1);

        idle.gaze = Some(GazeOffset::new(1.0, 1.0));
        for _ in 0..600 {
            let f = face.step(DT, &idle);
            assert!(f.pupil_x.abs() <= 30.0 && f.pupil_y.abs() <= 30.0);
        }
    }

    #[test]
    fn absent_gaze_is_centre_or_bounded_glance() {
        let tuning = FaceTuning {
            glance_probability: 0.2,
            ..FaceTuning::default()
        };
        let mut face = FaceEngine::with_seed(tuning, 9);
        let idle = inputs(LifecycleState::Idle);
        let mut glanced = false;
        for _ in 0..600 {
            face.step(DT, &idle);
            let (tx, ty) = face.pupil_target();
            assert!(tx.abs() <= 20.0 && ty.abs() <= 10.0);
            glanced |= tx != 0.0 || ty != 0.0;
        }
        assert!(glanced);
    }

    #[test]
    fn lost_face_does_not_leave_pupils_on_stale_offset() {
        let mut face = FaceEngine::with_seed(FaceTuning::default(), 16);
        let mut listening = inputs(LifecycleState::Listening);
        listening.gaze = Some(GazeOffset::new(1.0, 1.0));
        run(&mut face, 2.0, &listening);
        assert_ne!(face.pupil_target(), (0.0, 0.0));

        listening.gaze = None;
        face.step(DT, &listening);
        assert_eq!(face.pupil_target(), (0.0, 0.0));
        let frame = run(&mut face, 3.0, &listening);
        assert!(frame.pupil_x.abs() < 0.1 && frame.pupil_y.abs() < 0.1);
    }

    #[test]
    fn absent_gaze_outside_idle_centres() {
        let tuning = FaceTuning {
            glance_probability: 1.0,
            ..FaceTuning::default()
        };
        let mut face = FaceEngine::with_seed(tuning, 10);
        for _ in 0..60 {
            face.step(DT, &inputs(LifecycleState::Talking));
            assert_eq!(face.pupil_target(), (0.0, 0.0));
        }
    }

    #[test]
    fn idle_face_blinks_but_sleeping_and_error_do_not() {
        let mut face = FaceEngine::with_seed(FaceTuning::default(), 11);
        let idle = inputs(LifecycleState::Idle);
        let mut blinked = false;
        for _ in 0..(60 * 8) {
            face.step(DT, &idle);
            blinked |= face.is_blinking();
        }
        assert!(blinked);

        for state in [LifecycleState::Sleeping, LifecycleState::Error] {
            let mut face = FaceEngine::with_seed(FaceTuning::default(), 12);
            for _ in 0..(60 * 8) {
                face.step(DT, &inputs(state));
                assert!(!face.is_blinking());
            }
        }
    }

    #[test]
    fn colour_drifts_to_emotion() {
        let mut face = FaceEngine::with_seed(FaceTuning::default(), 13);
        let mut love = inputs(LifecycleState::Idle);
        love.emotion = Emotion::Love;
        let frame = run(&mut face, 4.0, &love);
        assert_eq!(frame.color.to_u8(), [255, 105, 180]);
    }

    #[test]
    fn breathing_modulates_radius() {
        let mut face = FaceEngine::with_seed(FaceTuning::default(), 14);
        let idle = inputs(LifecycleState::Idle);
        let mut lo = f32::MAX;
        let mut hi = f32::MIN;
        for _ in 0..(60 * 4) {
            let f = face.step(DT, &idle);
            lo = lo.min(f.pupil_radius);
            hi = hi.max(f.pupil_radius);
        }
        assert!(lo >= 43.0 - 1e-3 && hi <= 47.0 + 1e-3);
        assert!(hi - lo > 3.0);
    }

    #[test]
    fn keeps_animating_after_a_week_of_uptime() {
        let mut face = FaceEngine::with_seed(FaceTuning::default(), 17);
        face.clock = 7.0 * 24.0 * 3600.0;
        face.blink = BlinkScheduler::new(1.0);
        let idle = inputs(LifecycleState::Idle);

        let before = face.clock();
        let mut blinked = false;
        let mut lo = f32::MAX;
        let mut hi = f32::MIN;
        for _ in 0..(60 * 30) {
            let f = face.step(DT, &idle);
            blinked |= face.is_blinking();
            lo = lo.min(f.pupil_radius);
            hi = hi.max(f.pupil_radius);
        }
        assert!(face.clock() - before > 29.0, "clock stalled at {}", face.clock());
        assert!(blinked, "no blink in 30 s");
        assert!(hi - lo > 3.0, "breathing stalled");
    }

    #[test]
    fn glance_is_released_after_its_hold() {
        let tuning = FaceTuning {
            glance_probability: 1.0,
            glance_hold: 0.5,
            ..FaceTuning::default()
        };
        let mut face = FaceEngine::with_seed(tuning, 18);
        face.clock = 1.0e9;
        let idle = inputs(LifecycleState::Idle);
        face.step(DT, &idle);
        let first = face.pupil_target();
        // Held for the whole window, then a fresh glance is drawn.
        for _ in 0..25 {
            face.step(DT, &idle);
            assert_eq!(face.pupil_target(), first);
        }
        let mut changed = false;
        for _ in 0..60 {
            face.step(DT, &idle);
            changed |= face.pupil_target() != first;
        }
        assert!(changed, "glance held forever");
    }

    #[test]
    fn frame_carries_palette_background() {
        let mut face = FaceEngine::with_seed(FaceTuning::default(), 19);
        let frame = face.step(DT, &inputs(LifecycleState::Idle));
        assert_eq!(frame.background.to_u8(), [10, 12, 18]);
    }

    #[test]
    fn bad_dt_is_ignored() {
        let mut face = FaceEngine::with_seed(FaceTuning::default(), 15);
        let before = face.step(0.0, &inputs(LifecycleState::Idle));
        let after = face.step(f32::NAN, &inputs(LifecycleState::Idle));
        assert_eq!(before.eyelid, after.eyelid);
        assert_eq!(face.clock(), 0.0);
    }
}
