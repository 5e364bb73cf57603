//! Uplink: microphone and camera into the live session.
//!
//! Runs only inside a session and ends only when its future is dropped by
//! the connection machine.  Two pumps share the session sink:
//!
//! * **mic** – polls the driver every `mic_poll_interval`, publishes the
//!   chunk's RMS as the input envelope, then sends it as 16 kHz PCM.
//! * **camera** – grabs a JPEG at most once per `camera_interval`, paced by
//!   a `governor` rate limiter, on the blocking pool.
//!
//! Send failures are logged and the chunk is dropped; a dead socket is
//! noticed by the downlink, which owns session teardown.

use std::sync::Arc;
use std::time::Duration;

use aira_hal::{AudioDevice, VisionSensor, rms_envelope};
use aira_middleware::MediaSink;
use aira_types::{AudioChannel, MediaChunk};
use governor::{Quota, RateLimiter};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, trace};

use crate::state::SharedState;

pub struct Uplink {
    audio: Arc<dyn AudioDevice>,
    vision: Arc<dyn VisionSensor>,
    state: Arc<SharedState>,
    mic_poll: Duration,
    camera_interval: Duration,
}

/// Zeroes the input envelope when the uplink is dropped mid-session.
struct InputEnvelopeReset(Arc<SharedState>);

impl Drop for InputEnvelopeReset {
    fn drop(&mut self) {
        self.0.set_envelope(AudioChannel::Input, 0.0);
    }
}

impl Uplink {
    pub fn new(
        audio: Arc<dyn AudioDevice>,
        vision: Arc<dyn VisionSensor>,
        state: Arc<SharedState>,
        mic_poll: Duration,
        camera_interval: Duration,
    ) -> Self {
        Self {
            audio,
            vision,
            state,
            mic_poll: mic_poll.max(Duration::from_millis(1)),
            camera_interval,
        }
    }

    /// Stream media into `sink` until dropped.
    pub async fn run(self, sink: Arc<dyn MediaSink>) {
        let _reset = InputEnvelopeReset(Arc::clone(&self.state));
        tokio::join!(self.mic_pump(&sink), self.camera_pump(&sink));
    }

    async fn mic_pump(&self, sink: &Arc<dyn MediaSink>) {
        let mut ticker = interval(self.mic_poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let pcm = match self.audio.read_mic() {
                Ok(Some(pcm)) if !pcm.is_empty() => pcm,
                Ok(_) => continue,
                Err(e) => {
                    debug!(error = %e, "mic read failed");
                    self.state.set_envelope(AudioChannel::Input, 0.0);
                    continue;
                }
            };
            self.state
                .set_envelope(AudioChannel::Input, rms_envelope(&pcm));
            if let Err(e) = sink.send(MediaChunk::audio(pcm)).await {
                debug!(error = %e, "mic chunk dropped");
            }
        }
    }

    async fn camera_pump(&self, sink: &Arc<dyn MediaSink>) {
        let Some(quota) = Quota::with_period(self.camera_interval) else {
            debug!("camera uplink disabled");
            return std::future::pending().await;
        };
        let limiter = RateLimiter::direct(quota);
        let mut ticker = interval(self.mic_poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if limiter.check().is_err() {
                continue;
            }
            let vision = Arc::clone(&self.vision);
            let jpeg = match tokio::task::spawn_blocking(move || vision.frame_bytes()).await {
                Ok(Ok(Some(jpeg))) => jpeg,
                Ok(Ok(None)) => continue,
                Ok(Err(e)) => {
                    debug!(error = %e, "camera frame unavailable");
                    continue;
                }
                Err(e) => {
                    debug!(error = %e, "camera task aborted");
                    continue;
                }
            };
            trace!(bytes = jpeg.len(), "camera frame");
            if let Err(e) = sink.send(MediaChunk::image(jpeg)).await {
                debug!(error = %e, "camera frame dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aira_hal::sim::SimPeripherals;
    use aira_hal::sine_pcm;
    use aira_middleware::sim_backend::{OpenOutcome, ScriptedBackend, SessionScript};
    use aira_middleware::{LiveBackend, LiveConfig};
    use aira_types::MimeType;

    fn uplink(sim: &SimPeripherals, state: Arc<SharedState>) -> Uplink {
        Uplink::new(
            Arc::clone(&sim.audio) as Arc<dyn AudioDevice>,
            Arc::clone(&sim.vision) as Arc<dyn VisionSensor>,
            state,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
    }

    async fn sink_for(script: SessionScript) -> (ScriptedBackend, Arc<dyn MediaSink>) {
        let backend = ScriptedBackend::new([OpenOutcome::Session(script)]);
        let (_, sink, _) = backend
            .open(&LiveConfig::default())
            .await
            .unwrap()
            .into_parts();
        (backend, sink)
    }

    #[tokio::test]
    async fn streams_mic_and_camera_then_resets_envelope_on_drop() {
        let sim = SimPeripherals::new().with_continuous_mic(sine_pcm(440.0, 0.5, 16_000, 160));
        let state = Arc::new(SharedState::new());
        let (backend, sink) = sink_for(SessionScript::new()).await;

        let up = uplink(&sim, Arc::clone(&state)).run(sink);
        let _ = tokio::time::timeout(Duration::from_millis(200), up).await;

        assert!(backend.sent_count(MimeType::Pcm16k) >= 5);
        assert!(backend.sent_count(MimeType::Jpeg) >= 1);
        assert_eq!(state.envelope(AudioChannel::Input), 0.0);
    }

    #[tokio::test]
    async fn envelope_tracks_mic_level_while_running() {
        let sim = SimPeripherals::new().with_continuous_mic(sine_pcm(440.0, 0.5, 16_000, 160));
        let state = Arc::new(SharedState::new());
        let (_backend, sink) = sink_for(SessionScript::new()).await;

        let up = uplink(&sim, Arc::clone(&state)).run(sink);
        let probe = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            state.envelope(AudioChannel::Input)
        };
        let level = tokio::select! {
            _ = up => unreachable!("uplink never finishes"),
            level = probe => level,
        };
        assert!(level > 0.3 && level < 0.4, "level {level}");
    }

    #[tokio::test]
    async fn send_failures_do_not_stop_the_pump() {
        let sim = SimPeripherals::new().with_continuous_mic(vec![0x10, 0x00]);
        let state = Arc::new(SharedState::new());
        let (backend, sink) = sink_for(SessionScript::new().reject_sends()).await;

        let up = uplink(&sim, Arc::clone(&state)).run(sink);
        let _ = tokio::time::timeout(Duration::from_millis(100), up).await;

        assert!(sim.audio.mic_reads() >= 5);
        assert!(backend.sent().is_empty());
    }

    #[tokio::test]
    async fn mic_fault_zeroes_input_envelope() {
        let sim = SimPeripherals::new();
        sim.audio.set_mic_failing(true);
        let state = Arc::new(SharedState::new());
        state.set_envelope(AudioChannel::Input, 0.8);
        let (backend, sink) = sink_for(SessionScript::new()).await;

        let up = uplink(&sim, Arc::clone(&state)).run(sink);
        let probe = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            state.envelope(AudioChannel::Input)
        };
        let level = tokio::select! {
            _ = up => unreachable!("uplink never finishes"),
            level = probe => level,
        };
        assert_eq!(level, 0.0);
        assert_eq!(backend.sent_count(MimeType::Pcm16k), 0);
    }
}
