//! `aira-middleware` – the agent's connections to the outside world.
//!
//! # Modules
//!
//! - [`bus`] – in-process broadcast bus for lifecycle and expression events.
//! - [`backend`] – the [`LiveBackend`] seam: open a duplex session, push
//!   media, stream replies.
//! - [`gemini`] – [`GeminiLive`]: the Gemini Live WebSocket client.
//! - [`sim_backend`] – [`ScriptedBackend`]: scripted sessions for tests and
//!   offline demos.

pub mod backend;
pub mod bus;
pub mod gemini;
pub mod sim_backend;

pub use backend::{BackendError, LiveBackend, LiveConfig, LiveSession, MediaSink, ServerStream};
pub use bus::{EventBus, Topic};
pub use gemini::GeminiLive;
pub use sim_backend::{OpenOutcome, ScriptedBackend, SessionScript};
