//! `RenderSurface` trait: where animation frames are drawn.

use aira_types::{AiraError, AnimationFrame};

/// Logical canvas size shared by every surface.
pub const CANVAS_WIDTH: u32 = 800;
pub const CANVAS_HEIGHT: u32 = 480;

/// UI events drained from the surface once per render tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceEvents {
    /// The user closed the window (or equivalent).
    pub quit_requested: bool,
}

/// A display the face is drawn onto.
///
/// Surfaces are driven exclusively by the render loop and are not required
/// to be `Send`; window toolkits usually are not.
pub trait RenderSurface {
    /// Logical `(width, height)` of the canvas in pixels.
    fn canvas(&self) -> (u32, u32) {
        (CANVAS_WIDTH, CANVAS_HEIGHT)
    }

    /// Drain pending UI events.  Must not block.
    fn pump_events(&mut self) -> SurfaceEvents;

    /// Draw one frame and present it.
    fn draw(&mut self, frame: &AnimationFrame) -> Result<(), AiraError>;

    /// Release the surface.  Called once after all loops have stopped.
    fn close(&mut self) {}
}
