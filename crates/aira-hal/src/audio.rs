//! Generic `AudioDevice` trait for the microphone, the speaker and local
//! sound cues, plus the loudness helpers shared by every driver.

use aira_types::{AiraError, Cue};

/// Microphone capture, streamed playback and local cue playback.
///
/// Drivers are shared between loops (`&self` receivers) and must be
/// internally synchronised.
pub trait AudioDevice: Send + Sync {
    /// Return the next captured PCM chunk (16-bit LE mono, 16 kHz) if one is
    /// ready.  Never blocks waiting for audio.
    ///
    /// # Errors
    ///
    /// Returns [`AiraError::HardwareFault`] if the capture stream is broken.
    fn read_mic(&self) -> Result<Option<Vec<u8>>, AiraError>;

    /// Play one PCM chunk (16-bit LE mono, 24 kHz).  Blocks until the chunk
    /// has been handed to the output device.
    ///
    /// # Errors
    ///
    /// Returns [`AiraError::HardwareFault`] if the output stream is broken.
    fn write_audio(&self, pcm: &[u8]) -> Result<(), AiraError>;

    /// Start playing a local cue without waiting for it to finish.
    fn play_cue(&self, cue: Cue) -> Result<(), AiraError>;
}

/// Root-mean-square loudness of a 16-bit little-endian PCM chunk, normalised
/// to `0.0..=1.0` of full scale.
///
/// A trailing odd byte is ignored; an empty chunk is silent.
pub fn rms_envelope(pcm: &[u8]) -> f32 {
    let samples = pcm.len() / 2;
    if samples == 0 {
        return 0.0;
    }
    let sum_sq: f64 = pcm
        .chunks_exact(2)
        .map(|b| {
            let s = f64::from(i16::from_le_bytes([b[0], b[1]]));
            s * s
        })
        .sum();
    let rms = (sum_sq / samples as f64).sqrt() / f64::from(i16::MAX);
    rms.min(1.0) as f32
}

/// Synthesise a sine tone as 16-bit LE PCM.
///
/// `amplitude` is a fraction of full scale.  Used by the simulated drivers
/// and the scripted backend to produce audible, measurable audio.
pub fn sine_pcm(freq_hz: f32, amplitude: f32, sample_rate: u32, samples: usize) -> Vec<u8> {
    let amp = amplitude.clamp(0.0, 1.0) * f32::from(i16::MAX);
    let mut out = Vec::with_capacity(samples * 2);
    for n in 0..samples {
        let t = n as f32 / sample_rate as f32;
        let s = (amp * (std::f32::consts::TAU * freq_hz * t).sin()) as i16;
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}
