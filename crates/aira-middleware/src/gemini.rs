//! Gemini Live duplex client over a WebSocket.
//!
//! One [`LiveBackend::open`] call performs:
//!
//! 1. `connect_async` to the `BidiGenerateContent` endpoint.
//! 2. Sends the `setup` frame built by [`encode_setup`].
//! 3. Waits for `setupComplete`.
//!
//! The socket is then split: the write half becomes the session's
//! [`MediaSink`] (chunks go out as `realtimeInput.mediaChunks`), the read
//! half is decoded by [`decode_server_frame`] into [`ServerMessage`]s.
//! `goAway`, a close frame or a transport error ends the inbound stream.
//!
//! The wire helpers are pure functions so the protocol can be tested without
//! a network.

use std::sync::Arc;

use aira_types::{MediaChunk, ServerMessage};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures_util::stream::{self, SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{BackendError, LiveBackend, LiveConfig, LiveSession, MediaSink, ServerStream};

/// Public Gemini Live endpoint (API version `v1alpha`).
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/\
google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ────────────────────────────────────────────────────────────────────────────
// Wire format
// ────────────────────────────────────────────────────────────────────────────

/// Build the first frame of a session.
pub fn encode_setup(config: &LiveConfig) -> String {
    let model = if config.model_id.starts_with("models/") {
        config.model_id.clone()
    } else {
        format!("models/{}", config.model_id)
    };
    let mut setup = json!({
        "model": model,
        "generationConfig": {
            "responseModalities": config.response_modalities,
        },
        "systemInstruction": {
            "parts": [{ "text": config.system_instruction }]
        }
    });
    if config.output_transcription {
        setup["outputAudioTranscription"] = json!({});
    }
    json!({ "setup": setup }).to_string()
}

/// Encode one outbound media chunk.
pub fn encode_media(chunk: &MediaChunk) -> String {
    json!({
        "realtimeInput": {
            "mediaChunks": [{
                "mimeType": chunk.mime.as_str(),
                "data": STANDARD.encode(&chunk.data),
            }]
        }
    })
    .to_string()
}

/// What one inbound frame means to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    SetupComplete,
    Content(ServerMessage),
    /// The server is about to drop the connection.
    GoAway,
    /// Valid JSON the session has no use for (usage metadata, tool calls, …).
    Ignored,
}

/// Decode one inbound JSON frame.
///
/// # Errors
///
/// [`BackendError::Protocol`] for malformed JSON, undecodable inline audio,
/// or a server-side `error` object.
pub fn decode_server_frame(text: &str) -> Result<ServerFrame, BackendError> {
    let json: Value = serde_json::from_str(text)
        .map_err(|e| BackendError::Protocol(format!("invalid server frame: {e}")))?;

    if json.get("setupComplete").is_some() {
        return Ok(ServerFrame::SetupComplete);
    }
    if json.get("goAway").is_some() {
        return Ok(ServerFrame::GoAway);
    }
    if let Some(err) = json.get("error") {
        let msg = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unspecified server error");
        return Err(BackendError::Protocol(msg.to_string()));
    }

    let Some(content) = json.get("serverContent") else {
        return Ok(ServerFrame::Ignored);
    };

    let mut audio: Vec<u8> = Vec::new();
    let mut text = String::new();

    let parts = content
        .get("modelTurn")
        .and_then(|t| t.get("parts"))
        .and_then(|p| p.as_array());
    for part in parts.into_iter().flatten() {
        if let Some(inline) = part.get("inlineData") {
            let mime = inline.get("mimeType").and_then(|m| m.as_str()).unwrap_or("");
            if !mime.starts_with("audio/") {
                continue;
            }
            if let Some(data) = inline.get("data").and_then(|d| d.as_str()) {
                let bytes = STANDARD
                    .decode(data)
                    .map_err(|e| BackendError::Protocol(format!("bad inline audio: {e}")))?;
                audio.extend_from_slice(&bytes);
            }
        }
        if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
            text.push_str(t);
        }
    }
    if let Some(t) = content
        .get("outputTranscription")
        .and_then(|o| o.get("text"))
        .and_then(|t| t.as_str())
    {
        text.push_str(t);
    }

    let turn_complete = content
        .get("turnComplete")
        .and_then(|t| t.as_bool())
        .unwrap_or(false);

    if audio.is_empty() && text.is_empty() && !turn_complete {
        return Ok(ServerFrame::Ignored);
    }
    Ok(ServerFrame::Content(ServerMessage {
        audio: (!audio.is_empty()).then_some(audio),
        text: (!text.is_empty()).then_some(text),
        turn_complete,
    }))
}

/// Extract the JSON text carried by a WebSocket frame.  The service sends
/// JSON in both text and binary frames.
fn frame_text(msg: Message) -> Result<Option<String>, BackendError> {
    match msg {
        Message::Text(t) => Ok(Some(t.as_str().to_owned())),
        Message::Binary(b) => String::from_utf8(b.to_vec())
            .map(Some)
            .map_err(|e| BackendError::Protocol(format!("non-utf8 binary frame: {e}"))),
        Message::Close(frame) => {
            let reason = frame
                .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                .unwrap_or_else(|| "no close frame".to_string());
            Err(BackendError::Closed(reason))
        }
        _ => Ok(None),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// Gemini Live backend.
pub struct GeminiLive {
    endpoint: String,
    api_key: String,
}

impl GeminiLive {
    /// # Errors
    ///
    /// [`BackendError::Connect`] when the key is empty, oversized or contains
    /// control characters, or the endpoint is not a `ws(s)://` URL.
    pub fn new(api_key: impl Into<String>) -> Result<Self, BackendError> {
        Self::with_endpoint(DEFAULT_ENDPOINT, api_key)
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let endpoint = endpoint.into();
        let api_key = api_key.into();
        if api_key.is_empty() || api_key.len() > 512 {
            return Err(BackendError::Connect("invalid API key length".into()));
        }
        if api_key.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(BackendError::Connect("API key contains invalid characters".into()));
        }
        if !endpoint.starts_with("wss://") && !endpoint.starts_with("ws://") {
            return Err(BackendError::Connect("endpoint must be a ws:// or wss:// URL".into()));
        }
        Ok(Self { endpoint, api_key })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self) -> String {
        format!("{}?key={}", self.endpoint, self.api_key)
    }
}

impl std::fmt::Debug for GeminiLive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiLive")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

#[async_trait]
impl LiveBackend for GeminiLive {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn open(&self, config: &LiveConfig) -> Result<LiveSession, BackendError> {
        let (ws, _) = connect_async(self.url())
            .await
            .map_err(|e| BackendError::Connect(e.to_string()))?;
        let (mut tx, mut rx) = ws.split();

        tx.send(Message::Text(encode_setup(config).into()))
            .await
            .map_err(|e| BackendError::Handshake(e.to_string()))?;
        await_setup_complete(&mut rx).await?;

        let id = Uuid::new_v4();
        info!(session_id = %id, model = %config.model_id, "gemini live session established");
        let sink = Arc::new(WsSink { tx: Mutex::new(tx) });
        Ok(LiveSession::new(id, sink, inbound_stream(rx)))
    }
}

async fn await_setup_complete(rx: &mut SplitStream<WsStream>) -> Result<(), BackendError> {
    while let Some(frame) = rx.next().await {
        let frame = frame.map_err(|e| BackendError::Handshake(e.to_string()))?;
        let Some(text) = frame_text(frame).map_err(|e| BackendError::Handshake(e.to_string()))?
        else {
            continue;
        };
        match decode_server_frame(&text)? {
            ServerFrame::SetupComplete => return Ok(()),
            ServerFrame::GoAway => {
                return Err(BackendError::Handshake("server sent goAway during setup".into()));
            }
            other => debug!(?other, "frame before setupComplete ignored"),
        }
    }
    Err(BackendError::Handshake("socket closed before setupComplete".into()))
}

fn inbound_stream(rx: SplitStream<WsStream>) -> ServerStream {
    Box::pin(stream::unfold(Some(rx), |state| async move {
        let Some(mut rx) = state else {
            return None;
        };
        loop {
            let frame = match rx.next().await {
                None => return None,
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Some((Err(BackendError::Closed(e.to_string())), None)),
            };
            let text = match frame_text(frame) {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(e) => return Some((Err(e), None)),
            };
            match decode_server_frame(&text) {
                Ok(ServerFrame::Content(msg)) => return Some((Ok(msg), Some(rx))),
                Ok(ServerFrame::GoAway) => {
                    warn!("gemini live server sent goAway");
                    return Some((Err(BackendError::Closed("server sent goAway".into())), None));
                }
                Ok(ServerFrame::SetupComplete | ServerFrame::Ignored) => continue,
                Err(e) => return Some((Err(e), None)),
            }
        }
    }))
}

struct WsSink {
    tx: Mutex<SplitSink<WsStream, Message>>,
}

#[async_trait]
impl MediaSink for WsSink {
    async fn send(&self, chunk: MediaChunk) -> Result<(), BackendError> {
        let frame = Message::Text(encode_media(&chunk).into());
        self.tx
            .lock()
            .await
            .send(frame)
            .await
            .map_err(|e| BackendError::Send(e.to_string()))
    }

    async fn close(&self) {
        if let Err(e) = self.tx.lock().await.close().await {
            debug!(error = %e, "websocket close failed");
        }
    }
}
