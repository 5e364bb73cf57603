//! Exponential smoothing: the single motion law every animated value obeys.
//!
//! ```text
//! value += (target - value) * gain * dt
//! ```
//!
//! The step factor `gain * dt` is clamped to `[0, 1]`, so a long frame can
//! at most land on the target and never overshoot it.
//!
//! # Example
//!
//! ```rust
//! use aira_face::smoothing::approach;
//!
//! let mut lid = 0.0;
//! for _ in 0..600 {
//!     lid = approach(lid, 1.0, 15.0, 1.0 / 60.0);
//! }
//! assert!((lid - 1.0).abs() < 1e-4);
//! ```

use aira_types::Rgb;

/// Move `value` toward `target` by the fraction `gain * dt` of the remaining
/// distance.
pub fn approach(value: f32, target: f32, gain: f32, dt: f32) -> f32 {
    let k = (gain * dt).clamp(0.0, 1.0);
    if !k.is_finite() {
        return value;
    }
    value + (target - value) * k
}

/// Channel-wise [`approach`] for colours.
pub fn approach_rgb(value: Rgb, target: Rgb, gain: f32, dt: f32) -> Rgb {
    Rgb::new(
        approach(value.r, target.r, gain, dt),
        approach(value.g, target.g, gain, dt),
        approach(value.b, target.b, gain, dt),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_monotonically_for_fractional_steps() {
        for &(start, target, gain, dt) in &[
            (0.0_f32, 1.0_f32, 15.0_f32, 1.0 / 60.0),
            (30.0, -12.0, 8.0, 1.0 / 30.0),
            (-5.0, 5.0, 0.5, 0.1),
            (255.0, 20.0, 5.0, 1.0 / 144.0),
        ] {
            assert!(gain * dt > 0.0 && gain * dt < 1.0);
            let mut v = start;
            let mut prev_dist = (target - v).abs();
            for _ in 0..10_000 {
                let next = approach(v, target, gain, dt);
                let dist = (target - next).abs();
                assert!(dist <= prev_dist, "distance grew: {prev_dist} -> {dist}");
                // Never crosses to the other side of the target.
                assert!((target - next) * (target - start) >= 0.0);
                prev_dist = dist;
                v = next;
            }
            assert!((v - target).abs() < 1e-3, "did not converge: {v} vs {target}");
        }
    }

    #[test]
    fn zero_dt_is_a_no_op() {
        assert_eq!(approach(3.0, 10.0, 15.0, 0.0), 3.0);
    }

    #[test]
    fn oversized_step_lands_on_target_without_overshoot() {
        assert_eq!(approach(0.0, 10.0, 20.0, 1.0), 10.0);
    }

    #[test]
    fn negative_dt_does_not_move_backwards() {
        assert_eq!(approach(2.0, 4.0, 10.0, -1.0), 2.0);
    }

    #[test]
    fn non_finite_step_keeps_value() {
        assert_eq!(approach(1.0, 2.0, f32::NAN, 0.1), 1.0);
    }

    #[test]
    fn rgb_channels_move_independently() {
        let c = approach_rgb(Rgb::new(0.0, 100.0, 200.0), Rgb::new(100.0, 100.0, 0.0), 5.0, 0.1);
        assert!((c.r - 50.0).abs() < 1e-4);
        assert!((c.g - 100.0).abs() < 1e-4);
        assert!((c.b - 100.0).abs() < 1e-4);
    }
}
