//! Emotion and action extraction from inbound text fragments.
//!
//! - **Emotion tags** are bracketed uppercase words from a fixed vocabulary,
//!   e.g. `[HAPPY]`.  The fragment is uppercased first, so `[happy]` counts.
//!   When several tags appear the **last** one wins; unknown tags such as
//!   `[WINK]` are skipped.
//! - **Action markers** are phrases like `give object` or `move forward`
//!   (spaces or underscores, any case).  Every occurrence yields one marker.
//!
//! # Example
//!
//! ```rust
//! use aira_runtime::parser::TextParser;
//! use aira_types::{ActionMarker, Emotion};
//!
//! let parser = TextParser::new()?;
//! let out = parser.parse("[SAD] ok [HAPPY] bye, let me give object");
//! assert_eq!(out.emotion, Some(Emotion::Happy));
//! assert_eq!(out.actions, vec![ActionMarker::GiveObject]);
//! # Ok::<(), aira_types::AiraError>(())
//! ```

use aira_types::{ActionMarker, AiraError, Emotion};
use regex::Regex;

const TAG_PATTERN: &str = r"\[([A-Z]+)\]";
const ACTION_PATTERN: &str = r"(?i)\b(give[\s_]+object|move[\s_]+forward)\b";

/// What one fragment asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFragment {
    /// Last recognised emotion tag, if any.
    pub emotion: Option<Emotion>,
    /// Action markers in order of appearance.
    pub actions: Vec<ActionMarker>,
}

/// Compiled patterns.  Build once per downlink and reuse.
#[derive(Debug, Clone)]
pub struct TextParser {
    tag: Regex,
    action: Regex,
}

impl TextParser {
    /// # Errors
    ///
    /// [`AiraError::Config`] if a pattern fails to compile.
    pub fn new() -> Result<Self, AiraError> {
        let compile = |p: &str| {
            Regex::new(p).map_err(|e| AiraError::Config(format!("text pattern {p:?}: {e}")))
        };
        Ok(Self {
            tag: compile(TAG_PATTERN)?,
            action: compile(ACTION_PATTERN)?,
        })
    }

    pub fn parse(&self, fragment: &str) -> ParsedFragment {
        ParsedFragment {
            emotion: self.last_emotion(fragment),
            actions: self.actions(fragment),
        }
    }

    /// Last emotion tag in `fragment`, or `None` when there is none.
    pub fn last_emotion(&self, fragment: &str) -> Option<Emotion> {
        let upper = fragment.to_uppercase();
        self.tag
            .captures_iter(&upper)
            .filter_map(|c| c.get(1).and_then(|m| Emotion::from_tag(m.as_str())))
            .last()
    }

    pub fn actions(&self, fragment: &str) -> Vec<ActionMarker> {
        self.action
            .captures_iter(fragment)
            .filter_map(|c| {
                let phrase = c.get(1)?.as_str().to_ascii_lowercase();
                if phrase.starts_with("give") {
                    Some(ActionMarker::GiveObject)
                } else if phrase.starts_with("move") {
                    Some(ActionMarker::MoveForward)
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_tag_wins() {
        let p = TextParser::new().unwrap();
        assert_eq!(p.last_emotion("[SAD] ok [HAPPY] bye"), Some(Emotion::Happy));
    }

    #[test]
    fn no_tags_leaves_emotion_unset() {
        let p = TextParser::new().unwrap();
        assert_eq!(p.parse("no tags here"), ParsedFragment::default());
    }

    #[test]
    fn lowercase_tags_are_recognised() {
        let p = TextParser::new().unwrap();
        assert_eq!(p.last_emotion("well [love] you"), Some(Emotion::Love));
    }

    #[test]
    fn unknown_tags_are_skipped() {
        let p = TextParser::new().unwrap();
        assert_eq!(p.last_emotion("[ANGRY] then [WINK]"), Some(Emotion::Angry));
        assert_eq!(p.last_emotion("[WINK] [123] [ ]"), None);
    }

    #[test]
    fn neutral_tag_is_a_real_emotion() {
        let p = TextParser::new().unwrap();
        assert_eq!(p.last_emotion("[LOVE] [NEUTRAL]"), Some(Emotion::Neutral));
    }

    #[test]
    fn one_action_per_occurrence() {
        let p = TextParser::new().unwrap();
        let acts = p.actions("Give Object now, then move_forward and give   object again");
        assert_eq!(
            acts,
            vec![
                ActionMarker::GiveObject,
                ActionMarker::MoveForward,
                ActionMarker::GiveObject
            ]
        );
    }

    #[test]
    fn actions_need_word_boundaries() {
        let p = TextParser::new().unwrap();
        assert!(p.actions("forgive objections").is_empty());
        assert!(p.actions("remove forwarding").is_empty());
    }

    #[test]
    fn tags_and_actions_together() {
        let p = TextParser::new().unwrap();
        let out = p.parse("[SURPRISED] oh! I'll move forward [HAPPY]");
        assert_eq!(out.emotion, Some(Emotion::Happy));
        assert_eq!(out.actions, vec![ActionMarker::MoveForward]);
    }
}
