//! Per-session audio playback worker.
//!
//! The downlink hands decoded PCM to [`Playback::enqueue`] and moves on; a
//! dedicated blocking thread writes chunks to the speaker in arrival order.
//! While a chunk plays the output envelope holds that chunk's RMS, and it
//! drops to zero as soon as the queue runs dry, so the face stops talking
//! when the speaker does.
//!
//! [`Playback::stop`] discards anything still queued.  The chunk being
//! written finishes, since driver writes cannot be interrupted.

use std::sync::Arc;

use aira_hal::{AudioDevice, rms_envelope};
use aira_types::AudioChannel;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::state::SharedState;

pub struct Playback {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl Playback {
    /// Spawn the worker.  Must be called from within a Tokio runtime.
    pub fn start(audio: Arc<dyn AudioDevice>, state: Arc<SharedState>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let worker = {
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || play_queue(rx, audio, state, cancel))
        };
        Self { tx, cancel, worker }
    }

    /// Queue `pcm` behind whatever is already playing.
    pub fn enqueue(&self, pcm: Vec<u8>) {
        if pcm.is_empty() {
            return;
        }
        if self.tx.send(pcm).is_err() {
            debug!("playback worker gone; chunk dropped");
        }
    }

    /// Discard queued audio and wait for the worker to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        drop(self.tx);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "playback worker panicked");
        }
    }
}

fn play_queue(
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    audio: Arc<dyn AudioDevice>,
    state: Arc<SharedState>,
    cancel: CancellationToken,
) {
    while let Some(chunk) = rx.blocking_recv() {
        if cancel.is_cancelled() {
            break;
        }
        state.set_envelope(AudioChannel::Output, rms_envelope(&chunk));
        if let Err(e) = audio.write_audio(&chunk) {
            debug!(error = %e, bytes = chunk.len(), "playback write failed");
            state.set_envelope(AudioChannel::Output, 0.0);
        }
        if rx.is_empty() {
            state.set_envelope(AudioChannel::Output, 0.0);
        }
    }
    state.set_envelope(AudioChannel::Output, 0.0);
}
