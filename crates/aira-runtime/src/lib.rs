//! `aira-runtime` – lifecycle, loops and orchestration for the AIRA agent.
//!
//! Everything between the drivers in `aira-hal`, the live backend in
//! `aira-middleware` and the face in `aira-face` lives here.
//!
//! # Modules
//!
//! - [`state`] – [`SharedState`]: lock-free store read by the render loop
//!   and written by the network and sensor loops.
//! - [`connection`] – [`ConnectionMachine`]: the lifecycle state machine
//!   (`SLEEPING` → `WAKING` → `IDLE` … `ERROR` → `RETRYING`).  It opens
//!   sessions, runs the [`uplink`] and [`downlink`] for each one and tears
//!   both down together.
//! - [`render`] – [`RenderLoop`]: fixed-rate face animation.
//! - [`overlay`] – [`DisplayOverlay`]: picks `LISTENING`, `THINKING` or
//!   `TALKING` from the audio envelopes while a session is open.
//! - [`sensor`] – face tracking into the shared gaze field.
//! - [`playback`] – per-session speaker queue driving the output envelope.
//! - [`parser`] – [`TextParser`]: emotion tags and action phrases.
//! - [`dispatch`] – [`SideEffects`]: bounded fire-and-forget gestures and
//!   sound cues.
//! - [`orchestrator`] – [`Orchestrator`]: starts every loop under one
//!   cancellation token and shuts them down in order.
//! - [`config`] – [`RuntimeConfig`].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   subscriber with optional OTLP span export.

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod downlink;
pub mod orchestrator;
pub mod overlay;
pub mod parser;
pub mod playback;
pub mod render;
pub mod sensor;
pub mod state;
pub mod telemetry;
pub mod uplink;

pub use config::RuntimeConfig;
pub use connection::ConnectionMachine;
pub use dispatch::SideEffects;
pub use orchestrator::{Orchestrator, RunSummary};
pub use overlay::DisplayOverlay;
pub use parser::{ParsedFragment, TextParser};
pub use render::RenderLoop;
pub use state::{SharedState, StateSnapshot};
