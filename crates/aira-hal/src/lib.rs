//! `aira-hal` – Device seams for the embodied agent.
//!
//! The runtime only ever talks to the traits defined here, so drivers for
//! real microphones, cameras, servo kits and displays can be swapped
//! without touching orchestration or animation logic.
//!
//! # Modules
//!
//! - [`audio`] – [`AudioDevice`]: microphone capture, blocking playback and
//!   fire-and-forget cues, plus [`rms_envelope`] loudness measurement.
//! - [`vision`] – [`VisionSensor`]: face tracking and still capture.
//! - [`actuator`] – [`Actuator`]: canned body gestures.
//! - [`surface`] – [`RenderSurface`]: the display the face is drawn on.
//! - [`peripherals`] – [`Peripherals`]: the shared driver bundle.
//! - [`sim`] – simulated drivers for headless runs and tests.

pub mod actuator;
pub mod audio;
pub mod peripherals;
pub mod sim;
pub mod surface;
pub mod vision;

pub use actuator::Actuator;
pub use audio::{AudioDevice, rms_envelope, sine_pcm};
pub use peripherals::Peripherals;
pub use surface::{CANVAS_HEIGHT, CANVAS_WIDTH, RenderSurface, SurfaceEvents};
pub use vision::VisionSensor;
