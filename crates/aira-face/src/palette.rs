//! Colour palette and the precedence rules that pick a target colour.
//!
//! Precedence, highest first:
//!
//! 1. `SLEEPING` and `ERROR` use their fixed colours, whatever the mood.
//! 2. A non-neutral [`Emotion`] tints the face.
//! 3. `LISTENING`, `TALKING` and `THINKING` use their state colours.
//! 4. Everything else falls back to the idle colour.

use aira_types::{Emotion, LifecycleState, Rgb};
use serde::{Deserialize, Serialize};

/// 8-bit colours keyed by state and mood.  Stored as `[r, g, b]` arrays so
/// config files stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub background: [u8; 3],
    pub idle: [u8; 3],
    pub listening: [u8; 3],
    pub talking: [u8; 3],
    pub thinking: [u8; 3],
    pub sleeping: [u8; 3],
    pub error: [u8; 3],
    pub happy: [u8; 3],
    pub sad: [u8; 3],
    pub surprised: [u8; 3],
    pub angry: [u8; 3],
    pub love: [u8; 3],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: [10, 12, 18],
            idle: [0, 255, 255],
            listening: [0, 255, 100],
            talking: [0, 200, 255],
            thinking: [150, 120, 255],
            sleeping: [20, 30, 50],
            error: [255, 50, 50],
            happy: [255, 223, 0],
            sad: [70, 110, 255],
            surprised: [235, 240, 255],
            angry: [255, 120, 0],
            love: [255, 105, 180],
        }
    }
}

impl Palette {
    /// Colour the face should drift toward for `state` and `emotion`.
    pub fn target(&self, state: LifecycleState, emotion: Emotion) -> Rgb {
        let rgb = match state {
            LifecycleState::Sleeping => self.sleeping,
            LifecycleState::Error => self.error,
            _ => match self.emotion_colour(emotion) {
                Some(c) => c,
                None => match state {
                    LifecycleState::Listening => self.listening,
                    LifecycleState::Talking => self.talking,
                    LifecycleState::Thinking => self.thinking,
                    _ => self.idle,
                },
            },
        };
        to_rgb(rgb)
    }

    pub fn background(&self) -> Rgb {
        to_rgb(self.background)
    }

    fn emotion_colour(&self, emotion: Emotion) -> Option<[u8; 3]> {
        match emotion {
            Emotion::Neutral => None,
            Emotion::Happy => Some(self.happy),
            Emotion::Sad => Some(self.sad),
            Emotion::Surprised => Some(self.surprised),
            Emotion::Angry => Some(self.angry),
            Emotion::Love => Some(self.love),
        }
    }
}

fn to_rgb([r, g, b]: [u8; 3]) -> Rgb {
    Rgb::new(f32::from(r), f32::from(g), f32::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleeping_and_error_ignore_emotion() {
        let p = Palette::default();
        assert_eq!(
            p.target(LifecycleState::Sleeping, Emotion::Love).to_u8(),
            p.sleeping
        );
        assert_eq!(
            p.target(LifecycleState::Error, Emotion::Happy).to_u8(),
            p.error
        );
    }

    #[test]
    fn emotion_beats_state_colour() {
        let p = Palette::default();
        assert_eq!(
            p.target(LifecycleState::Talking, Emotion::Happy).to_u8(),
            p.happy
        );
        assert_eq!(
            p.target(LifecycleState::Idle, Emotion::Angry).to_u8(),
            p.angry
        );
    }

    #[test]
    fn neutral_uses_state_colour_then_idle() {
        let p = Palette::default();
        let n = Emotion::Neutral;
        assert_eq!(p.target(LifecycleState::Listening, n).to_u8(), p.listening);
        assert_eq!(p.target(LifecycleState::Talking, n).to_u8(), p.talking);
        assert_eq!(p.target(LifecycleState::Thinking, n).to_u8(), p.thinking);
        assert_eq!(p.target(LifecycleState::Idle, n).to_u8(), p.idle);
        assert_eq!(p.target(LifecycleState::Waking, n).to_u8(), p.idle);
        assert_eq!(p.target(LifecycleState::Retrying, n).to_u8(), p.idle);
    }

    #[test]
    fn partial_palette_keeps_defaults() {
        let p: Palette = serde_json::from_str(r#"{ "love": [1, 2, 3] }"#).unwrap();
        assert_eq!(p.love, [1, 2, 3]);
        assert_eq!(p.idle, Palette::default().idle);
    }
}
