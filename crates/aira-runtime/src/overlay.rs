//! Display overlay: which connected sub-state the face shows.
//!
//! The connection state machine only knows "connected".  While connected,
//! the face picks a sub-state from the audio envelopes each render tick:
//!
//! 1. output above the talk threshold → `TALKING`
//! 2. input above the listen threshold → `LISTENING`
//! 3. within the thinking window after the user was last heard → `THINKING`
//! 4. otherwise the lifecycle value (normally `IDLE`)
//!
//! Outside a session the lifecycle value is shown unchanged.

use std::time::Duration;

use aira_types::LifecycleState;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct DisplayOverlay {
    talk_threshold: f32,
    listen_threshold: f32,
    thinking_window: Duration,
    last_heard: Option<Instant>,
}

impl DisplayOverlay {
    pub fn new(talk_threshold: f32, listen_threshold: f32, thinking_window: Duration) -> Self {
        Self {
            talk_threshold,
            listen_threshold,
            thinking_window,
            last_heard: None,
        }
    }

    /// Sub-state to display at `now`.
    pub fn resolve(
        &mut self,
        lifecycle: LifecycleState,
        input_envelope: f32,
        output_envelope: f32,
        now: Instant,
    ) -> LifecycleState {
        if !lifecycle.is_connected() {
            self.last_heard = None;
            return lifecycle;
        }
        if output_envelope > self.talk_threshold {
            // The reply has started; the user's turn is over.
            self.last_heard = None;
            return LifecycleState::Talking;
        }
        if input_envelope > self.listen_threshold {
            self.last_heard = Some(now);
            return LifecycleState::Listening;
        }
        if let Some(heard) = self.last_heard {
            if now.saturating_duration_since(heard) < self.thinking_window {
                return LifecycleState::Thinking;
            }
            self.last_heard = None;
        }
        lifecycle
    }
}
