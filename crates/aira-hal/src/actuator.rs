//! Generic `Actuator` trait for the robot body.
//!
//! The core never waits on a gesture: callers run [`Actuator::perform`] on a
//! blocking worker and only log its outcome.

use aira_types::{AiraError, Gesture};

/// Servo-driven body able to play canned gestures.
pub trait Actuator: Send + Sync {
    /// Stable identifier for this body, e.g. `"servo_kit"`.
    fn id(&self) -> &str;

    /// Execute `gesture` to completion.  May block for the duration of the
    /// physical motion.
    ///
    /// # Errors
    ///
    /// Returns [`AiraError::HardwareFault`] if the motion cannot be executed.
    fn perform(&self, gesture: Gesture) -> Result<(), AiraError>;
}
