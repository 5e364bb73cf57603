//! [`SharedState`] – the only structure more than one loop touches.
//!
//! Every field has exactly one writer role and many readers:
//!
//! | Field | Writer |
//! |---|---|
//! | lifecycle | connection state machine |
//! | emotion | downlink |
//! | output envelope | playback worker |
//! | input envelope | uplink (on behalf of the microphone) |
//! | gaze | sensor loop |
//! | active session | connection state machine |
//!
//! With one writer per field, plain atomics are enough.  Readers sample once
//! per tick and tolerate coalesced writes, so all accesses are `Relaxed`
//! apart from the lifecycle, which uses acquire/release so a loop that sees a
//! connected state also sees the session id published before it.
//!
//! # Example
//!
//! ```rust
//! use aira_runtime::state::SharedState;
//! use aira_types::{AudioChannel, GazeOffset};
//!
//! let state = SharedState::new();
//! assert_eq!(state.gaze(), None);
//! state.set_gaze(Some(GazeOffset::new(0.0, 0.0)));
//! assert_eq!(state.gaze(), Some(GazeOffset::new(0.0, 0.0)));
//! state.set_envelope(AudioChannel::Output, 0.3);
//! assert!((state.envelope(AudioChannel::Output) - 0.3).abs() < 1e-6);
//! ```

use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};

use aira_types::{AudioChannel, Emotion, GazeOffset, LifecycleState, SessionId};
use parking_lot::Mutex;

/// Packed gaze value meaning "no target".  Never produced by a real offset:
/// [`GazeOffset::new`] sanitises NaN components to `0.0`.
const GAZE_ABSENT: u64 = u64::MAX;

#[derive(Debug)]
pub struct SharedState {
    lifecycle: AtomicU8,
    emotion: AtomicU8,
    input_envelope: AtomicU32,
    output_envelope: AtomicU32,
    gaze: AtomicU64,
    session: Mutex<Option<SessionId>>,
}

/// Values of every field sampled at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    pub lifecycle: LifecycleState,
    pub emotion: Emotion,
    pub input_envelope: f32,
    pub output_envelope: f32,
    pub gaze: Option<GazeOffset>,
    pub session: Option<SessionId>,
}

impl SharedState {
    /// `SLEEPING`, neutral, silent, no gaze, no session.
    pub fn new() -> Self {
        Self {
            lifecycle: AtomicU8::new(LifecycleState::Sleeping.as_u8()),
            emotion: AtomicU8::new(Emotion::Neutral.as_u8()),
            input_envelope: AtomicU32::new(0.0_f32.to_bits()),
            output_envelope: AtomicU32::new(0.0_f32.to_bits()),
            gaze: AtomicU64::new(GAZE_ABSENT),
            session: Mutex::new(None),
        }
    }

    // ── lifecycle ──

    pub fn lifecycle(&self) -> LifecycleState {
        LifecycleState::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    /// Store `next` and return the value it replaced.
    pub fn set_lifecycle(&self, next: LifecycleState) -> LifecycleState {
        LifecycleState::from_u8(self.lifecycle.swap(next.as_u8(), Ordering::AcqRel))
    }

    pub fn is_connected(&self) -> bool {
        self.lifecycle().is_connected()
    }

    // ── emotion ──

    pub fn emotion(&self) -> Emotion {
        Emotion::from_u8(self.emotion.load(Ordering::Relaxed))
    }

    /// Store `emotion` and return the value it replaced.
    pub fn set_emotion(&self, emotion: Emotion) -> Emotion {
        Emotion::from_u8(self.emotion.swap(emotion.as_u8(), Ordering::Relaxed))
    }

    // ── envelopes ──

    /// Loudness of `channel` in `[0, 1]`.
    pub fn envelope(&self, channel: AudioChannel) -> f32 {
        f32::from_bits(self.envelope_cell(channel).load(Ordering::Relaxed))
    }

    /// Store a loudness reading.  Clamped into `[0, 1]`; NaN becomes `0`.
    pub fn set_envelope(&self, channel: AudioChannel, value: f32) {
        let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        self.envelope_cell(channel).store(v.to_bits(), Ordering::Relaxed);
    }

    fn envelope_cell(&self, channel: AudioChannel) -> &AtomicU32 {
        match channel {
            AudioChannel::Input => &self.input_envelope,
            AudioChannel::Output => &self.output_envelope,
        }
    }

    // ── gaze ──

    pub fn gaze(&self) -> Option<GazeOffset> {
        unpack_gaze(self.gaze.load(Ordering::Relaxed))
    }

    /// `None` means "no target acquired", distinct from a centred target.
    pub fn set_gaze(&self, gaze: Option<GazeOffset>) {
        self.gaze.store(pack_gaze(gaze), Ordering::Relaxed);
    }

    // ── session ──

    pub fn active_session(&self) -> Option<SessionId> {
        *self.session.lock()
    }

    pub fn set_active_session(&self, session: Option<SessionId>) {
        *self.session.lock() = session;
    }

    /// Sample every field.  Fields are read one after another, so writes
    /// landing mid-snapshot may be partially visible.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            lifecycle: self.lifecycle(),
            emotion: self.emotion(),
            input_envelope: self.envelope(AudioChannel::Input),
            output_envelope: self.envelope(AudioChannel::Output),
            gaze: self.gaze(),
            session: self.active_session(),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

fn pack_gaze(gaze: Option<GazeOffset>) -> u64 {
    match gaze {
        None => GAZE_ABSENT,
        Some(g) => {
            let g = GazeOffset::new(g.x, g.y);
            (u64::from(g.x.to_bits()) << 32) | u64::from(g.y.to_bits())
        }
    }
}

fn unpack_gaze(bits: u64) -> Option<GazeOffset> {
    if bits == GAZE_ABSENT {
        return None;
    }
    let x = f32::from_bits((bits >> 32) as u32);
    let y = f32::from_bits(bits as u32);
    Some(GazeOffset { x, y })
}
