//! [`Peripherals`] – the bundle of device drivers handed to the runtime.
//!
//! Every loop receives the drivers it needs by cloning this bundle; the
//! drivers themselves are shared behind `Arc` trait objects so real and
//! simulated hardware can be swapped without touching orchestration code.

use std::sync::Arc;

use crate::actuator::Actuator;
use crate::audio::AudioDevice;
use crate::vision::VisionSensor;

/// Shared handles to the audio, vision and body drivers.
#[derive(Clone)]
pub struct Peripherals {
    pub audio: Arc<dyn AudioDevice>,
    pub vision: Arc<dyn VisionSensor>,
    pub body: Arc<dyn Actuator>,
}

impl Peripherals {
    pub fn new(
        audio: Arc<dyn AudioDevice>,
        vision: Arc<dyn VisionSensor>,
        body: Arc<dyn Actuator>,
    ) -> Self {
        Self {
            audio,
            vision,
            body,
        }
    }
}

impl std::fmt::Debug for Peripherals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peripherals")
            .field("body", &self.body.id())
            .finish_non_exhaustive()
    }
}
