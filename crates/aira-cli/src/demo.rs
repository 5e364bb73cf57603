//! Offline demo wiring for `backend = "sim"`.
//!
//! A short scripted conversation exercises every face state without a
//! network: a failed first connect, a greeting, a hand-over gesture and a
//! dropped session that forces a retry.

use std::time::Duration;

use aira_hal::sim::SimPeripherals;
use aira_hal::sine_pcm;
use aira_middleware::BackendError;
use aira_middleware::sim_backend::{OpenOutcome, ScriptedBackend, SessionScript};
use aira_types::GazeOffset;

/// Playback rate of reply audio, for the demo script and the live model.
pub const REPLY_RATE: u32 = 24_000;
/// Capture rate of the simulated microphone.
const MIC_RATE: u32 = 16_000;

/// One reply chunk of `secs` seconds of tone.
fn reply_tone(freq_hz: f32, secs: f32) -> Vec<u8> {
    sine_pcm(freq_hz, 0.4, REPLY_RATE, (REPLY_RATE as f32 * secs) as usize)
}

pub fn backend() -> ScriptedBackend {
    let greeting = SessionScript::new()
        .delay(Duration::from_secs(2))
        .text("[HAPPY] Hi! I'm awake.")
        .audio(reply_tone(220.0, 1.5))
        .delay(Duration::from_secs(4))
        .text("[SURPRISED] Oh, is that for me? Let me give object.")
        .audio(reply_tone(260.0, 1.0))
        .delay(Duration::from_secs(4))
        .text("[LOVE] Thank you!")
        .audio(reply_tone(300.0, 1.0))
        .delay(Duration::from_secs(6))
        .fail(BackendError::Closed("demo connection dropped".into()));

    let steady = SessionScript::new()
        .delay(Duration::from_secs(1))
        .text("[NEUTRAL] I'm back. I'll move forward a little.")
        .audio(reply_tone(240.0, 1.0))
        .hold_open();

    ScriptedBackend::new([
        OpenOutcome::Fail(BackendError::Connect("demo: network not ready".into())),
        OpenOutcome::Session(greeting),
        OpenOutcome::Session(steady),
    ])
    .with_fallback(OpenOutcome::Session(SessionScript::new().hold_open()))
    .with_record_limit(0)
}

/// Simulated drivers: a face slightly left of centre, a user who speaks
/// once right after the greeting, and a speaker that plays replies in real
/// time so the face is seen talking.
pub fn peripherals() -> SimPeripherals {
    let sim = SimPeripherals::new()
        .with_face(GazeOffset::new(-0.3, 0.1))
        .with_realtime_playback(REPLY_RATE)
        .with_history_limit(0);
    let utterance = sine_pcm(180.0, 0.3, MIC_RATE, (MIC_RATE / 100) as usize);
    for _ in 0..150 {
        sim.audio.push_mic_chunk(utterance.clone());
    }
    sim
}
