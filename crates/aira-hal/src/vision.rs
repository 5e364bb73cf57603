//! Generic `VisionSensor` trait for the camera and its face tracker.

use aira_types::{AiraError, GazeOffset};

/// A camera with an attached face detector.
pub trait VisionSensor: Send + Sync {
    /// Offset of the most prominent face from the image centre, or `None`
    /// when no face is visible.  Drivers rate-limit detection internally and
    /// may return a cached result.
    ///
    /// # Errors
    ///
    /// Returns [`AiraError::HardwareFault`] if the camera cannot be read.
    fn track_face(&self) -> Result<Option<GazeOffset>, AiraError>;

    /// Capture one JPEG still for the uplink, or `None` if no frame is
    /// available right now.
    fn frame_bytes(&self) -> Result<Option<Vec<u8>>, AiraError>;
}
