//! In-process simulated drivers for headless runs and tests.
//!
//! [`SimPeripherals`] builds a [`Peripherals`] bundle whose every slot is a
//! stub that records what it was asked to do and returns plausible data,
//! so the whole runtime can run without a microphone, camera, servos or a
//! display.
//!
//! # Stub behaviour
//!
//! | Driver | Behaviour |
//! |---|---|
//! | [`SimAudio`] | Serves queued (or looping) mic chunks; records played chunks and cues; can pace playback in real time. |
//! | [`SimVision`] | Reports a settable face offset and a fixed JPEG-like frame. |
//! | [`SimActuator`] | Records gestures, optionally sleeping to mimic motion time. |
//! | [`SimSurface`] | Counts and optionally records frames; can request quit after N frames. |
//!
//! Recordings keep a running total but only the latest
//! [`DEFAULT_HISTORY`] entries, so the drivers can back a long headless run.
//!
//! # Example
//!
//! ```rust
//! use aira_hal::sim::SimPeripherals;
//! use aira_types::{Cue, GazeOffset};
//!
//! let sim = SimPeripherals::new();
//! sim.vision.set_face(Some(GazeOffset::new(0.3, 0.0)));
//!
//! let peripherals = sim.peripherals();
//! peripherals.audio.play_cue(Cue::Wake).unwrap();
//! assert_eq!(sim.audio.cues(), vec![Cue::Wake]);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use aira_types::{AiraError, AnimationFrame, Cue, GazeOffset, Gesture};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::actuator::Actuator;
use crate::audio::AudioDevice;
use crate::peripherals::Peripherals;
use crate::surface::{RenderSurface, SurfaceEvents};
use crate::vision::VisionSensor;

/// Entries each recording keeps by default.
pub const DEFAULT_HISTORY: usize = 256;

// ────────────────────────────────────────────────────────────────────────────
// History
// ────────────────────────────────────────────────────────────────────────────

/// The latest `limit` recorded items plus a total of everything recorded.
struct History<T> {
    items: VecDeque<T>,
    limit: usize,
    total: usize,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            limit: DEFAULT_HISTORY,
            total: 0,
        }
    }
}

impl<T: Clone> History<T> {
    fn push(&mut self, item: T) {
        self.total += 1;
        if self.limit == 0 {
            return;
        }
        if self.items.len() == self.limit {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
        while self.items.len() > limit {
            self.items.pop_front();
        }
    }

    fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Audio
// ────────────────────────────────────────────────────────────────────────────

/// Simulated microphone + speaker.
#[derive(Default)]
pub struct SimAudio {
    mic_queue: Mutex<VecDeque<Vec<u8>>>,
    /// Served whenever the queue is empty, emulating an always-on mic.
    mic_loop: Mutex<Option<Vec<u8>>>,
    mic_reads: AtomicUsize,
    mic_failing: AtomicBool,
    played: Mutex<History<Vec<u8>>>,
    playback_failing: AtomicBool,
    playback_delay: Mutex<Duration>,
    /// Sample rate of 16-bit mono output; non-zero makes each write block
    /// for the chunk's duration.
    realtime_rate: AtomicU32,
    cues: Mutex<History<Cue>>,
}

impl SimAudio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue chunks to be returned by successive `read_mic` calls.
    pub fn push_mic_chunk(&self, pcm: Vec<u8>) {
        self.mic_queue.lock().push_back(pcm);
    }

    /// Serve `pcm` on every `read_mic` call once the queue is drained.
    pub fn set_continuous_mic(&self, pcm: Option<Vec<u8>>) {
        *self.mic_loop.lock() = pcm;
    }

    /// Simulate the time the output device needs per chunk.
    pub fn set_playback_delay(&self, delay: Duration) {
        *self.playback_delay.lock() = delay;
    }

    /// Block each write for as long as the chunk would take to play as
    /// 16-bit mono PCM at `sample_rate`.  Zero turns pacing off.
    pub fn set_realtime_playback(&self, sample_rate: u32) {
        self.realtime_rate.store(sample_rate, Ordering::Release);
    }

    /// Entries kept by `played` and `cues`; zero keeps only the totals.
    pub fn set_history_limit(&self, limit: usize) {
        self.played.lock().set_limit(limit);
        self.cues.lock().set_limit(limit);
    }

    pub fn set_mic_failing(&self, failing: bool) {
        self.mic_failing.store(failing, Ordering::Release);
    }

    pub fn set_playback_failing(&self, failing: bool) {
        self.playback_failing.store(failing, Ordering::Release);
    }

    /// Number of `read_mic` calls so far (including empty reads).
    pub fn mic_reads(&self) -> usize {
        self.mic_reads.load(Ordering::Acquire)
    }

    /// Most recent chunks handed to `write_audio`, in order.
    pub fn played(&self) -> Vec<Vec<u8>> {
        self.played.lock().snapshot()
    }

    /// Chunks played so far, including ones no longer kept.
    pub fn played_count(&self) -> usize {
        self.played.lock().total
    }

    /// Most recent cues played, in order.
    pub fn cues(&self) -> Vec<Cue> {
        self.cues.lock().snapshot()
    }

    fn write_time(&self, pcm: &[u8]) -> Duration {
        let fixed = *self.playback_delay.lock();
        match self.realtime_rate.load(Ordering::Acquire) {
            0 => fixed,
            rate => fixed + Duration::from_secs_f64((pcm.len() / 2) as f64 / f64::from(rate)),
        }
    }
}

impl AudioDevice for SimAudio {
    fn read_mic(&self) -> Result<Option<Vec<u8>>, AiraError> {
        self.mic_reads.fetch_add(1, Ordering::AcqRel);
        if self.mic_failing.load(Ordering::Acquire) {
            return Err(AiraError::hardware("sim_mic", "capture stream overflowed"));
        }
        if let Some(chunk) = self.mic_queue.lock().pop_front() {
            return Ok(Some(chunk));
        }
        Ok(self.mic_loop.lock().clone())
    }

    fn write_audio(&self, pcm: &[u8]) -> Result<(), AiraError> {
        if self.playback_failing.load(Ordering::Acquire) {
            return Err(AiraError::hardware("sim_speaker", "output stream closed"));
        }
        let delay = self.write_time(pcm);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.played.lock().push(pcm.to_vec());
        Ok(())
    }

    fn play_cue(&self, cue: Cue) -> Result<(), AiraError> {
        debug!(cue = cue.asset_name(), "sim cue");
        self.cues.lock().push(cue);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Vision
// ────────────────────────────────────────────────────────────────────────────

/// Simulated camera with a settable face position.
pub struct SimVision {
    face: Mutex<Option<GazeOffset>>,
    frame: Mutex<Option<Vec<u8>>>,
    failing: AtomicBool,
    track_calls: AtomicUsize,
    frame_calls: AtomicUsize,
}

/// JPEG start/end-of-image markers around an empty payload.
const STUB_JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];

impl Default for SimVision {
    fn default() -> Self {
        Self {
            face: Mutex::new(None),
            frame: Mutex::new(Some(STUB_JPEG.to_vec())),
            failing: AtomicBool::new(false),
            track_calls: AtomicUsize::new(0),
            frame_calls: AtomicUsize::new(0),
        }
    }
}

impl SimVision {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_face(&self, face: Option<GazeOffset>) {
        *self.face.lock() = face;
    }

    pub fn set_frame(&self, frame: Option<Vec<u8>>) {
        *self.frame.lock() = frame;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    pub fn track_calls(&self) -> usize {
        self.track_calls.load(Ordering::Acquire)
    }

    pub fn frame_calls(&self) -> usize {
        self.frame_calls.load(Ordering::Acquire)
    }
}

impl VisionSensor for SimVision {
    fn track_face(&self) -> Result<Option<GazeOffset>, AiraError> {
        self.track_calls.fetch_add(1, Ordering::AcqRel);
        if self.failing.load(Ordering::Acquire) {
            return Err(AiraError::hardware("sim_camera", "frame grab failed"));
        }
        Ok(*self.face.lock())
    }

    fn frame_bytes(&self) -> Result<Option<Vec<u8>>, AiraError> {
        self.frame_calls.fetch_add(1, Ordering::AcqRel);
        if self.failing.load(Ordering::Acquire) {
            return Err(AiraError::hardware("sim_camera", "frame grab failed"));
        }
        Ok(self.frame.lock().clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Body
// ────────────────────────────────────────────────────────────────────────────

/// Simulated servo body.  Records every gesture; always succeeds unless
/// told to fail.
#[derive(Default)]
pub struct SimActuator {
    performed: Mutex<History<Gesture>>,
    motion_time: Mutex<Duration>,
    failing: AtomicBool,
}

impl SimActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make each gesture block for `duration`, like a real servo move.
    pub fn set_motion_time(&self, duration: Duration) {
        *self.motion_time.lock() = duration;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    /// Most recent gestures completed, in completion order.
    pub fn performed(&self) -> Vec<Gesture> {
        self.performed.lock().snapshot()
    }

    /// Entries kept by `performed`; zero keeps only the total.
    pub fn set_history_limit(&self, limit: usize) {
        self.performed.lock().set_limit(limit);
    }
}

impl Actuator for SimActuator {
    fn id(&self) -> &str {
        "sim_body"
    }

    fn perform(&self, gesture: Gesture) -> Result<(), AiraError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(AiraError::hardware(self.id(), format!("{gesture:?} jammed")));
        }
        let motion = *self.motion_time.lock();
        if !motion.is_zero() {
            std::thread::sleep(motion);
        }
        debug!(?gesture, "sim gesture complete");
        self.performed.lock().push(gesture);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Surface
// ────────────────────────────────────────────────────────────────────────────

/// Headless render surface.
///
/// Frames are counted and, when recording, kept in a shared buffer that the
/// caller can inspect after the surface has been moved into the render loop.
pub struct SimSurface {
    frames: Arc<Mutex<Vec<AnimationFrame>>>,
    drawn: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
    record: bool,
    quit_after: Option<usize>,
    log_every: usize,
}

impl SimSurface {
    /// A surface that only logs a summary every `log_every` frames.
    pub fn headless(log_every: usize) -> Self {
        Self {
            frames: Arc::new(Mutex::new(Vec::new())),
            drawn: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
            record: false,
            quit_after: None,
            log_every: log_every.max(1),
        }
    }

    /// A surface that keeps every drawn frame.
    pub fn recording() -> Self {
        Self {
            record: true,
            ..Self::headless(usize::MAX)
        }
    }

    /// Report `quit_requested` once `frames` frames have been drawn.
    pub fn quit_after(mut self, frames: usize) -> Self {
        self.quit_after = Some(frames);
        self
    }

    /// Shared handle to the recorded frames.
    pub fn frames(&self) -> Arc<Mutex<Vec<AnimationFrame>>> {
        Arc::clone(&self.frames)
    }

    /// Shared counter of drawn frames.
    pub fn drawn(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.drawn)
    }

    /// Shared flag set by [`RenderSurface::close`].
    pub fn closed(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl RenderSurface for SimSurface {
    fn pump_events(&mut self) -> SurfaceEvents {
        let drawn = self.drawn.load(Ordering::Acquire);
        SurfaceEvents {
            quit_requested: self.quit_after.is_some_and(|n| drawn >= n),
        }
    }

    fn draw(&mut self, frame: &AnimationFrame) -> Result<(), AiraError> {
        let n = self.drawn.fetch_add(1, Ordering::AcqRel) + 1;
        if self.record {
            self.frames.lock().push(*frame);
        }
        if n % self.log_every == 0 {
            let [r, g, b] = frame.color.to_u8();
            let [br, bg, bb] = frame.background.to_u8();
            debug!(
                frame = n,
                state = %frame.state,
                eyelid = frame.eyelid,
                pupil_x = frame.pupil_x,
                pupil_y = frame.pupil_y,
                mouth = frame.mouth_height,
                color = format!("#{r:02x}{g:02x}{b:02x}"),
                background = format!("#{br:02x}{bg:02x}{bb:02x}"),
                "face"
            );
        } else {
            trace!(frame = n, "face");
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimPeripherals builder
// ────────────────────────────────────────────────────────────────────────────

/// Concrete simulated drivers plus a [`Peripherals`] view of them.
///
/// The concrete handles stay accessible so tests can script inputs and
/// inspect what the runtime did.
#[derive(Clone, Default)]
pub struct SimPeripherals {
    pub audio: Arc<SimAudio>,
    pub vision: Arc<SimVision>,
    pub body: Arc<SimActuator>,
}

impl SimPeripherals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the simulated mic streaming `pcm` forever.
    pub fn with_continuous_mic(self, pcm: Vec<u8>) -> Self {
        self.audio.set_continuous_mic(Some(pcm));
        self
    }

    /// Place a simulated face in front of the camera.
    pub fn with_face(self, face: GazeOffset) -> Self {
        self.vision.set_face(Some(face));
        self
    }

    /// Play reply audio at the speed of a real 16-bit mono speaker.
    pub fn with_realtime_playback(self, sample_rate: u32) -> Self {
        self.audio.set_realtime_playback(sample_rate);
        self
    }

    /// Cap every recording at `limit` entries.
    pub fn with_history_limit(self, limit: usize) -> Self {
        self.audio.set_history_limit(limit);
        self.body.set_history_limit(limit);
        self
    }

    /// Trait-object view handed to the runtime.
    pub fn peripherals(&self) -> Peripherals {
        Peripherals::new(
            Arc::clone(&self.audio) as Arc<dyn AudioDevice>,
            Arc::clone(&self.vision) as Arc<dyn VisionSensor>,
            Arc::clone(&self.body) as Arc<dyn Actuator>,
        )
    }
}
