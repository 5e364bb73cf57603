//! [`ScriptedBackend`] – a deterministic [`LiveBackend`] for tests and
//! offline demos.
//!
//! Each `open` call pops the next [`OpenOutcome`] from a queue.  A session
//! outcome carries a [`SessionScript`]: inbound messages, pauses and faults
//! that are replayed on the session's inbound stream.  Pauses use
//! `tokio::time`, so scripts run instantly under a paused test clock.
//!
//! Outbound chunks are counted per MIME type; only the most recent
//! [`DEFAULT_RECORD_LIMIT`] are kept for inspection, so a long demo run does
//! not accumulate every camera frame.
//!
//! # Example
//!
//! ```rust
//! use aira_middleware::sim_backend::{OpenOutcome, ScriptedBackend, SessionScript};
//! use aira_middleware::BackendError;
//! use std::time::Duration;
//!
//! let backend = ScriptedBackend::new([
//!     OpenOutcome::Fail(BackendError::Connect("offline".into())),
//!     OpenOutcome::Session(
//!         SessionScript::new()
//!             .delay(Duration::from_millis(200))
//!             .text("[HAPPY] hi!")
//!             .hold_open(),
//!     ),
//! ]);
//! assert_eq!(backend.open_attempts(), 0);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use aira_types::{MediaChunk, MimeType, ServerMessage};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::backend::{BackendError, LiveBackend, LiveConfig, LiveSession, MediaSink, ServerStream};

/// Outbound chunks kept by default for [`ScriptedBackend::sent`].
pub const DEFAULT_RECORD_LIMIT: usize = 256;

/// One step of an inbound script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Message(ServerMessage),
    Delay(Duration),
    /// Yield this error and end the stream.
    Fail(BackendError),
}

/// Inbound behaviour of one scripted session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionScript {
    steps: Vec<ScriptStep>,
    hold_open: bool,
    reject_sends: bool,
    stall_close: bool,
}

impl SessionScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, msg: ServerMessage) -> Self {
        self.steps.push(ScriptStep::Message(msg));
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.message(ServerMessage::text(text))
    }

    pub fn audio(self, pcm: Vec<u8>) -> Self {
        self.message(ServerMessage::audio(pcm))
    }

    pub fn delay(mut self, d: Duration) -> Self {
        self.steps.push(ScriptStep::Delay(d));
        self
    }

    pub fn fail(mut self, e: BackendError) -> Self {
        self.steps.push(ScriptStep::Fail(e));
        self
    }

    /// Keep the stream open forever after the last step instead of ending.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Make every outbound send fail.
    pub fn reject_sends(mut self) -> Self {
        self.reject_sends = true;
        self
    }

    /// Make the sink's `close` never resolve, like a peer that stopped
    /// answering.
    pub fn stall_close(mut self) -> Self {
        self.stall_close = true;
        self
    }
}

/// Result of one `open` call.
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    Fail(BackendError),
    /// Never resolve; exercises the caller's open timeout.
    Hang,
    Session(SessionScript),
}

/// Scripted backend.  All counters are shared by every session it opens.
#[derive(Debug)]
pub struct ScriptedBackend {
    queue: Mutex<VecDeque<OpenOutcome>>,
    fallback: OpenOutcome,
    open_attempts: AtomicUsize,
    sent: Arc<Mutex<SentLog>>,
}

/// Per-type send counters plus a ring of the latest chunks.
#[derive(Debug)]
struct SentLog {
    recent: VecDeque<MediaChunk>,
    limit: usize,
    audio: usize,
    images: usize,
}

impl SentLog {
    fn record(&mut self, chunk: MediaChunk) {
        match chunk.mime {
            MimeType::Pcm16k => self.audio += 1,
            MimeType::Jpeg => self.images += 1,
        }
        if self.limit == 0 {
            return;
        }
        if self.recent.len() == self.limit {
            self.recent.pop_front();
        }
        self.recent.push_back(chunk);
    }
}

impl ScriptedBackend {
    /// Play `outcomes` in order; once exhausted every open fails.
    pub fn new(outcomes: impl IntoIterator<Item = OpenOutcome>) -> Self {
        Self {
            queue: Mutex::new(outcomes.into_iter().collect()),
            fallback: OpenOutcome::Fail(BackendError::Connect("script exhausted".into())),
            open_attempts: AtomicUsize::new(0),
            sent: Arc::new(Mutex::new(SentLog {
                recent: VecDeque::new(),
                limit: DEFAULT_RECORD_LIMIT,
                audio: 0,
                images: 0,
            })),
        }
    }

    /// Keep at most `limit` recent chunks for [`sent`](Self::sent); zero
    /// keeps only the counters.
    pub fn with_record_limit(self, limit: usize) -> Self {
        {
            let mut log = self.sent.lock();
            log.limit = limit;
            while log.recent.len() > limit {
                log.recent.pop_front();
            }
        }
        self
    }

    /// Outcome used once the queue is exhausted.
    pub fn with_fallback(mut self, outcome: OpenOutcome) -> Self {
        self.fallback = outcome;
        self
    }

    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    /// The most recent chunks accepted by any session's sink, in send
    /// order.
    pub fn sent(&self) -> Vec<MediaChunk> {
        self.sent.lock().recent.iter().cloned().collect()
    }

    /// Chunks of `mime` accepted so far, including ones no longer kept.
    pub fn sent_count(&self, mime: MimeType) -> usize {
        let log = self.sent.lock();
        match mime {
            MimeType::Pcm16k => log.audio,
            MimeType::Jpeg => log.images,
        }
    }
}

#[async_trait]
impl LiveBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "sim"
    }

    async fn open(&self, _config: &LiveConfig) -> Result<LiveSession, BackendError> {
        let attempt = self.open_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self
            .queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        debug!(attempt, ?outcome, "scripted open");

        match outcome {
            OpenOutcome::Fail(e) => Err(e),
            OpenOutcome::Hang => std::future::pending().await,
            OpenOutcome::Session(script) => {
                let sink = Arc::new(ScriptedSink {
                    sent: Arc::clone(&self.sent),
                    reject: script.reject_sends,
                    stall_close: script.stall_close,
                });
                Ok(LiveSession::new(Uuid::new_v4(), sink, script_stream(script)))
            }
        }
    }
}

fn script_stream(script: SessionScript) -> ServerStream {
    let steps: VecDeque<ScriptStep> = script.steps.into();
    let replay = stream::unfold(Some(steps), |state| async move {
        let Some(mut steps) = state else {
            return None;
        };
        loop {
            let Some(step) = steps.pop_front() else {
                return None;
            };
            match step {
                ScriptStep::Delay(d) => tokio::time::sleep(d).await,
                ScriptStep::Message(m) => return Some((Ok(m), Some(steps))),
                ScriptStep::Fail(e) => return Some((Err(e), None)),
            }
        }
    });
    if script.hold_open {
        Box::pin(replay.chain(stream::pending()))
    } else {
        Box::pin(replay)
    }
}

struct ScriptedSink {
    sent: Arc<Mutex<SentLog>>,
    reject: bool,
    stall_close: bool,
}

#[async_trait]
impl MediaSink for ScriptedSink {
    async fn send(&self, chunk: MediaChunk) -> Result<(), BackendError> {
        if self.reject {
            return Err(BackendError::Send("scripted send failure".into()));
        }
        self.sent.lock().record(chunk);
        Ok(())
    }

    async fn close(&self) {
        if self.stall_close {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outcomes_play_in_order_then_fallback() {
        let backend = ScriptedBackend::new([
            OpenOutcome::Fail(BackendError::Connect("a".into())),
            OpenOutcome::Session(SessionScript::new()),
        ]);
        let cfg = LiveConfig::default();
        assert!(matches!(backend.open(&cfg).await, Err(BackendError::Connect(m)) if m == "a"));
        assert!(backend.open(&cfg).await.is_ok());
        assert!(backend.open(&cfg).await.is_err());
        assert_eq!(backend.open_attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn script_replays_messages_delays_and_faults() {
        let backend = ScriptedBackend::new([OpenOutcome::Session(
            SessionScript::new()
                .text("[SAD]")
                .delay(Duration::from_secs(5))
                .audio(vec![0, 1])
                .fail(BackendError::Closed("bye".into()))
                .text("never"),
        )]);
        let (_, _, mut inbound) = backend.open(&LiveConfig::default()).await.unwrap().into_parts();

        let start = tokio::time::Instant::now();
        assert_eq!(inbound.next().await, Some(Ok(ServerMessage::text("[SAD]"))));
        assert_eq!(inbound.next().await, Some(Ok(ServerMessage::audio(vec![0, 1]))));
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(matches!(inbound.next().await, Some(Err(BackendError::Closed(_)))));
        assert_eq!(inbound.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn held_session_stays_open() {
        let backend =
            ScriptedBackend::new([OpenOutcome::Session(SessionScript::new().text("hi").hold_open())]);
        let (_, _, mut inbound) = backend.open(&LiveConfig::default()).await.unwrap().into_parts();
        assert!(inbound.next().await.is_some());
        let r = tokio::time::timeout(Duration::from_secs(3600), inbound.next()).await;
        assert!(r.is_err(), "held stream must not end");
    }

    #[tokio::test(start_paused = true)]
    async fn hang_never_resolves() {
        let backend = ScriptedBackend::new([OpenOutcome::Hang]);
        let r = tokio::time::timeout(Duration::from_secs(60), backend.open(&LiveConfig::default())).await;
        assert!(r.is_err());
        assert_eq!(backend.open_attempts(), 1);
    }

    #[tokio::test]
    async fn sink_records_or_rejects() {
        let backend = ScriptedBackend::new([
            OpenOutcome::Session(SessionScript::new()),
            OpenOutcome::Session(SessionScript::new().reject_sends()),
        ]);
        let cfg = LiveConfig::default();
        let ok = backend.open(&cfg).await.unwrap();
        ok.sink.send(MediaChunk::audio(vec![1])).await.unwrap();
        ok.sink.send(MediaChunk::image(vec![2])).await.unwrap();
        let bad = backend.open(&cfg).await.unwrap();
        assert!(bad.sink.send(MediaChunk::audio(vec![3])).await.is_err());

        assert_eq!(backend.sent().len(), 2);
        assert_eq!(backend.sent_count(MimeType::Pcm16k), 1);
        assert_eq!(backend.sent_count(MimeType::Jpeg), 1);
    }

    #[tokio::test]
    async fn sent_log_is_bounded_but_counts_everything() {
        let backend =
            ScriptedBackend::new([OpenOutcome::Session(SessionScript::new())]).with_record_limit(3);
        let session = backend.open(&LiveConfig::default()).await.unwrap();
        for i in 0..10u8 {
            session.sink.send(MediaChunk::audio(vec![i])).await.unwrap();
        }
        session.sink.send(MediaChunk::image(vec![99])).await.unwrap();

        let kept: Vec<u8> = backend.sent().iter().map(|c| c.data[0]).collect();
        assert_eq!(kept, vec![8, 9, 99]);
        assert_eq!(backend.sent_count(MimeType::Pcm16k), 10);
        assert_eq!(backend.sent_count(MimeType::Jpeg), 1);
    }

    #[tokio::test]
    async fn zero_limit_keeps_only_counters() {
        let backend =
            ScriptedBackend::new([OpenOutcome::Session(SessionScript::new())]).with_record_limit(0);
        let session = backend.open(&LiveConfig::default()).await.unwrap();
        session.sink.send(MediaChunk::image(vec![1])).await.unwrap();
        assert!(backend.sent().is_empty());
        assert_eq!(backend.sent_count(MimeType::Jpeg), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_close_never_resolves() {
        let backend =
            ScriptedBackend::new([OpenOutcome::Session(SessionScript::new().stall_close())]);
        let session = backend.open(&LiveConfig::default()).await.unwrap();
        let r = tokio::time::timeout(Duration::from_secs(60), session.sink.close()).await;
        assert!(r.is_err());
    }
}
