//! The live-backend seam.
//!
//! The runtime never speaks a wire protocol directly.  It asks a
//! [`LiveBackend`] to open a [`LiveSession`], pushes [`MediaChunk`]s into the
//! session's [`MediaSink`] and drains [`ServerMessage`]s from its inbound
//! stream.  Dropping the session releases the connection.
//!
//! - [`GeminiLive`][crate::gemini::GeminiLive] – the real duplex client.
//! - [`ScriptedBackend`][crate::sim_backend::ScriptedBackend] – deterministic
//!   stand-in for tests and offline demos.

use std::sync::Arc;

use aira_types::{AiraError, MediaChunk, ServerMessage, SessionId};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default model for the Gemini Live endpoint.
pub const DEFAULT_MODEL_ID: &str = "gemini-2.5-flash-native-audio-preview-12-2025";

/// Persona prompt, including the emotion-tag protocol the face reacts to.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
You are AIRA, a small desktop robot with an expressive animated face. \
You can see through a camera and hear through a microphone. \
Keep answers short, warm and conversational.\n\
Start every reply with exactly one emotion tag chosen from \
[HAPPY], [SAD], [NEUTRAL], [SURPRISED], [ANGRY] or [LOVE]; \
the tag changes the colour of your eyes and is never read aloud.\n\
If you decide to hand the user something, say \"give object\". \
If you decide to approach the user, say \"move forward\".";

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Parameters of one duplex session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub model_id: String,
    /// e.g. `["AUDIO"]`.
    pub response_modalities: Vec<String>,
    pub system_instruction: String,
    /// Ask the backend to stream a transcript of its spoken output so emotion
    /// tags and action markers reach the parser.
    pub output_transcription: bool,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            response_modalities: vec!["AUDIO".to_string()],
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            output_transcription: true,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Failure of a backend connection.  Every variant is fatal to the session
/// it occurred on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("setup handshake failed: {0}")]
    Handshake(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("session closed: {0}")]
    Closed(String),

    #[error("timed out: {0}")]
    Timeout(String),
}

impl From<BackendError> for AiraError {
    fn from(e: BackendError) -> Self {
        AiraError::Backend(e.to_string())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

/// Outbound half of a session.  Safe to share between the microphone and
/// camera senders.
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Deliver one chunk.
    async fn send(&self, chunk: MediaChunk) -> Result<(), BackendError>;

    /// Politely close the outbound half.  Best effort.
    async fn close(&self) {}
}

/// Inbound half of a session.
pub type ServerStream = BoxStream<'static, Result<ServerMessage, BackendError>>;

/// An open duplex session.
pub struct LiveSession {
    pub id: SessionId,
    pub sink: Arc<dyn MediaSink>,
    pub inbound: ServerStream,
}

impl LiveSession {
    pub fn new(id: SessionId, sink: Arc<dyn MediaSink>, inbound: ServerStream) -> Self {
        Self { id, sink, inbound }
    }

    /// Split into `(id, sink, inbound)` so the halves can live in different
    /// loops.
    pub fn into_parts(self) -> (SessionId, Arc<dyn MediaSink>, ServerStream) {
        (self.id, self.sink, self.inbound)
    }
}

impl std::fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSession")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Something that can open duplex sessions.
#[async_trait]
pub trait LiveBackend: Send + Sync {
    /// Short name for logs, e.g. `"gemini"`.
    fn name(&self) -> &str;

    /// Open a new session.  Resolves once the backend has acknowledged the
    /// session setup.
    async fn open(&self, config: &LiveConfig) -> Result<LiveSession, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_native_audio() {
        let cfg = LiveConfig::default();
        assert_eq!(cfg.model_id, DEFAULT_MODEL_ID);
        assert_eq!(cfg.response_modalities, vec!["AUDIO".to_string()]);
        for tag in ["[HAPPY]", "[SAD]", "[NEUTRAL]", "[SURPRISED]", "[ANGRY]", "[LOVE]"] {
            assert!(cfg.system_instruction.contains(tag), "missing {tag}");
        }
    }

    #[test]
    fn backend_error_converts_to_aira_error() {
        let e: AiraError = BackendError::Connect("refused".into()).into();
        assert!(matches!(e, AiraError::Backend(ref m) if m.contains("refused")));
    }
}
