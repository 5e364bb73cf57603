//! Blink scheduling.
//!
//! A blink is a short window during which the eyelid target is forced
//! closed.  The scheduler counts down to the next blink by each tick's `dt`;
//! each start draws the next wait uniformly from the configured interval.
//! Only relative times are kept, so the schedule behaves the same after a
//! minute or a month of uptime.  Blinks are suppressed (and any blink in
//! progress is cancelled) while the face is not eligible, e.g. asleep.

use rand::Rng;

#[derive(Debug, Clone)]
pub struct BlinkScheduler {
    until_next: f32,
    remaining: f32,
}

impl BlinkScheduler {
    /// First blink fires once `first_delay` seconds of ticks have elapsed.
    pub fn new(first_delay: f32) -> Self {
        Self {
            until_next: first_delay.max(0.0),
            remaining: 0.0,
        }
    }

    /// Advance the scheduler by a tick of `dt` seconds.
    ///
    /// Returns `true` when the eyelid should be closed for this tick.  Every
    /// blink that starts is visible for at least one tick, however large
    /// `dt` is.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        eligible: bool,
        interval: (f32, f32),
        duration: f32,
        rng: &mut R,
    ) -> bool {
        self.until_next = (self.until_next - dt).max(0.0);
        if !eligible {
            self.remaining = 0.0;
            return false;
        }

        if self.until_next <= 0.0 {
            self.remaining = duration.max(0.0);
            let (lo, hi) = interval;
            let wait = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
            self.until_next = wait.max(0.0);
        }

        let closed = self.remaining > 0.0;
        self.remaining = (self.remaining - dt).max(0.0);
        closed
    }

    pub fn is_blinking(&self) -> bool {
        self.remaining > 0.0
    }

    /// Seconds until the next scheduled blink.
    pub fn next_blink_in(&self) -> f32 {
        self.until_next
    }
}
