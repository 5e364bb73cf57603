use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of one open duplex session with the remote backend.
pub type SessionId = Uuid;

/// Lifecycle of the conversational agent.
///
/// Exactly one value is current at any instant.  The connection state
/// machine is the only writer; every loop reads it.  `Idle`, `Listening`,
/// `Talking` and `Thinking` are the "connected" sub-states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    #[default]
    Sleeping,
    Waking,
    Idle,
    Listening,
    Talking,
    Thinking,
    Error,
    Retrying,
}

impl LifecycleState {
    const ALL: [LifecycleState; 8] = [
        LifecycleState::Sleeping,
        LifecycleState::Waking,
        LifecycleState::Idle,
        LifecycleState::Listening,
        LifecycleState::Talking,
        LifecycleState::Thinking,
        LifecycleState::Error,
        LifecycleState::Retrying,
    ];

    /// `true` while a session is open (`Idle ∪ Listening ∪ Talking ∪ Thinking`).
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            LifecycleState::Idle
                | LifecycleState::Listening
                | LifecycleState::Talking
                | LifecycleState::Thinking
        )
    }

    /// Compact encoding used by the lock-free state store.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Inverse of [`as_u8`][Self::as_u8]; unknown codes decode as `Sleeping`.
    pub fn from_u8(code: u8) -> Self {
        Self::ALL
            .get(code as usize)
            .copied()
            .unwrap_or(LifecycleState::Sleeping)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Sleeping => "SLEEPING",
            LifecycleState::Waking => "WAKING",
            LifecycleState::Idle => "IDLE",
            LifecycleState::Listening => "LISTENING",
            LifecycleState::Talking => "TALKING",
            LifecycleState::Thinking => "THINKING",
            LifecycleState::Error => "ERROR",
            LifecycleState::Retrying => "RETRYING",
        };
        f.write_str(name)
    }
}

/// Discrete mood parsed from inbound text.  Persists until overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Sad,
    Surprised,
    Angry,
    Love,
}

impl Emotion {
    const ALL: [Emotion; 6] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprised,
        Emotion::Angry,
        Emotion::Love,
    ];

    /// Look up the emotion for a bracketed tag body such as `"HAPPY"`.
    ///
    /// Matching is exact: the tag vocabulary is uppercase.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.tag() == tag)
    }

    /// Uppercase tag used in inbound text, e.g. `"LOVE"`.
    pub fn tag(self) -> &'static str {
        match self {
            Emotion::Neutral => "NEUTRAL",
            Emotion::Happy => "HAPPY",
            Emotion::Sad => "SAD",
            Emotion::Surprised => "SURPRISED",
            Emotion::Angry => "ANGRY",
            Emotion::Love => "LOVE",
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Inverse of [`as_u8`][Self::as_u8]; unknown codes decode as `Neutral`.
    pub fn from_u8(code: u8) -> Self {
        Self::ALL.get(code as usize).copied().unwrap_or(Emotion::Neutral)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Normalised direction from screen centre toward a detected face.
///
/// `x` is left/right, `y` is up/down, both in `[-1.0, 1.0]`.  "No target"
/// is expressed as `Option::<GazeOffset>::None`, never as `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GazeOffset {
    pub x: f32,
    pub y: f32,
}

impl GazeOffset {
    /// Build an offset, clamping each axis into `[-1, 1]`.  Non-finite
    /// components collapse to `0.0`.
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: sanitize_unit(x),
            y: sanitize_unit(y),
        }
    }
}

fn sanitize_unit(v: f32) -> f32 {
    if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 }
}

/// Which loudness envelope a reading belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioChannel {
    /// Microphone loudness.
    Input,
    /// Playback loudness.
    Output,
}

/// RGB colour with floating-point channels in `0.0..=255.0` so it can be
/// blended smoothly.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Quantise to 8-bit channels for drawing.
    pub fn to_u8(self) -> [u8; 3] {
        [
            self.r.round().clamp(0.0, 255.0) as u8,
            self.g.round().clamp(0.0, 255.0) as u8,
            self.b.round().clamp(0.0, 255.0) as u8,
        ]
    }
}

/// Visual parameters for one render tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimationFrame {
    /// Sub-state the frame was computed for (after the display overlay).
    pub state: LifecycleState,
    /// 0.0 = open, 1.0 = closed.
    pub eyelid: f32,
    /// Pupil offset from the eye centre in canvas pixels.
    pub pupil_x: f32,
    pub pupil_y: f32,
    /// Pupil radius in canvas pixels (breathing modulated).
    pub pupil_radius: f32,
    /// Mouth height in canvas pixels.
    pub mouth_height: f32,
    pub color: Rgb,
    /// Canvas fill behind the face.
    pub background: Rgb,
}

/// MIME types accepted by the realtime uplink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MimeType {
    /// 16-bit little-endian mono PCM at 16 kHz.
    Pcm16k,
    Jpeg,
}

impl MimeType {
    pub fn as_str(self) -> &'static str {
        match self {
            MimeType::Pcm16k => "audio/pcm;rate=16000",
            MimeType::Jpeg => "image/jpeg",
        }
    }
}

/// One media frame sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaChunk {
    pub mime: MimeType,
    pub data: Vec<u8>,
}

impl MediaChunk {
    pub fn audio(data: Vec<u8>) -> Self {
        Self {
            mime: MimeType::Pcm16k,
            data,
        }
    }

    pub fn image(data: Vec<u8>) -> Self {
        Self {
            mime: MimeType::Jpeg,
            data,
        }
    }
}

/// One inbound message from the backend stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerMessage {
    /// Raw PCM audio to play, if any.
    pub audio: Option<Vec<u8>>,
    /// Text fragment (reply text or output transcription), if any.
    pub text: Option<String>,
    /// The model finished its turn.
    pub turn_complete: bool,
}

impl ServerMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn audio(pcm: Vec<u8>) -> Self {
        Self {
            audio: Some(pcm),
            ..Self::default()
        }
    }
}

/// Physical movement the body can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    WakeUp,
    Sleep,
    GiveObject,
    MoveForward,
}

/// Inbound textual marker that triggers a physical side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMarker {
    GiveObject,
    MoveForward,
}

impl ActionMarker {
    pub fn gesture(self) -> Gesture {
        match self {
            ActionMarker::GiveObject => Gesture::GiveObject,
            ActionMarker::MoveForward => Gesture::MoveForward,
        }
    }
}

/// Short local sound effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cue {
    Wake,
    Sleep,
    Error,
}

impl Cue {
    /// Asset base name, e.g. `"wakeup"` for `wakeup.wav`.
    pub fn asset_name(self) -> &'static str {
        match self {
            Cue::Wake => "wakeup",
            Cue::Sleep => "sleep",
            Cue::Error => "error",
        }
    }
}

/// Event published on the in-process bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"aira-runtime::connection"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    LifecycleChanged {
        from: LifecycleState,
        to: LifecycleState,
    },
    EmotionChanged(Emotion),
    ActionTriggered(ActionMarker),
    CuePlayed(Cue),
    SessionOpened {
        session_id: SessionId,
    },
    SessionClosed {
        session_id: SessionId,
        reason: String,
    },
}

/// Crate-spanning error type.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum AiraError {
    #[error("Backend Error: {0}")]
    Backend(String),

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Channel Error: {0}")]
    Channel(String),
}

impl AiraError {
    pub fn hardware(component: impl Into<String>, details: impl Into<String>) -> Self {
        AiraError::HardwareFault {
            component: component.into(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_set_is_the_four_session_substates() {
        let connected: Vec<_> = LifecycleState::ALL
            .iter()
            .copied()
            .filter(|s| s.is_connected())
            .collect();
        assert_eq!(
            connected,
            vec![
                LifecycleState::Idle,
                LifecycleState::Listening,
                LifecycleState::Talking,
                LifecycleState::Thinking
            ]
        );
    }

    #[test]
    fn lifecycle_code_roundtrip_covers_every_variant() {
        for state in LifecycleState::ALL {
            assert_eq!(LifecycleState::from_u8(state.as_u8()), state);
        }
        assert_eq!(LifecycleState::from_u8(200), LifecycleState::Sleeping);
    }

    #[test]
    fn emotion_tags_resolve() {
        assert_eq!(Emotion::from_tag("LOVE"), Some(Emotion::Love));
        assert_eq!(Emotion::from_tag("SURPRISED"), Some(Emotion::Surprised));
        assert_eq!(Emotion::from_tag("happy"), None);
        assert_eq!(Emotion::from_tag("CONFUSED"), None);
    }

    #[test]
    fn gaze_offset_is_clamped_and_sanitised() {
        let g = GazeOffset::new(3.0, -7.5);
        assert_eq!(g, GazeOffset { x: 1.0, y: -1.0 });
        let n = GazeOffset::new(f32::NAN, 0.25);
        assert_eq!(n, GazeOffset { x: 0.0, y: 0.25 });
    }

    #[test]
    fn rgb_quantises_with_saturation() {
        assert_eq!(Rgb::new(-4.0, 127.6, 300.0).to_u8(), [0, 128, 255]);
    }

    #[test]
    fn mime_strings_match_backend_contract() {
        assert_eq!(MediaChunk::audio(vec![]).mime.as_str(), "audio/pcm;rate=16000");
        assert_eq!(MediaChunk::image(vec![]).mime.as_str(), "image/jpeg");
    }

    #[test]
    fn lifecycle_serializes_as_screaming_case() {
        let json = serde_json::to_string(&LifecycleState::Retrying).unwrap();
        assert_eq!(json, "\"RETRYING\"");
    }

    #[test]
    fn aira_error_display() {
        let err = AiraError::hardware("camera", "device unplugged");
        assert!(err.to_string().contains("camera"));
        assert!(err.to_string().contains("unplugged"));
    }
}
