//! `aira-face` – the animation state engine behind the robot's face.
//!
//! Pure and synchronous: the render loop feeds a [`FaceInputs`] snapshot and
//! the elapsed time into [`FaceEngine::step`] and draws the returned
//! [`AnimationFrame`][aira_types::AnimationFrame].  Nothing here touches a
//! clock, a device or the network, so every behaviour is testable with a
//! seeded random source.
//!
//! # Modules
//!
//! - [`smoothing`] – the exponential approach law shared by every value.
//! - [`blink`] – [`BlinkScheduler`][blink::BlinkScheduler]: random blink
//!   deadlines and blink windows.
//! - [`palette`] – [`Palette`]: state and mood colours with their
//!   precedence rules.
//! - [`tuning`] – [`FaceTuning`]: gains, timings and geometry constants.
//! - [`engine`] – [`FaceEngine`]: the per-tick integrator.

pub mod blink;
pub mod engine;
pub mod palette;
pub mod smoothing;
pub mod tuning;

pub use engine::{FaceEngine, FaceInputs};
pub use palette::Palette;
pub use tuning::FaceTuning;
