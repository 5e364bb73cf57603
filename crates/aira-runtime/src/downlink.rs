//! Downlink: the session's inbound stream into playback, face and body.
//!
//! Messages are handled strictly in order.  Audio goes to the playback
//! queue without waiting for the speaker.  Text is scanned for emotion tags
//! and action markers; the emotion is written to [`SharedState`] before the
//! next message is read, and actions are handed to [`SideEffects`], which
//! never blocks this loop.
//!
//! The stream ending, cleanly or with an error, ends the session.

use std::sync::Arc;

use aira_middleware::{BackendError, EventBus, ServerStream};
use aira_types::{Event, EventPayload, ServerMessage};
use futures_util::StreamExt;
use tracing::{debug, info};

use crate::dispatch::SideEffects;
use crate::parser::TextParser;
use crate::playback::Playback;
use crate::state::SharedState;

const SOURCE: &str = "aira-runtime::downlink";

pub struct Downlink {
    state: Arc<SharedState>,
    parser: TextParser,
    effects: SideEffects,
    bus: EventBus,
}

impl Downlink {
    pub fn new(
        state: Arc<SharedState>,
        parser: TextParser,
        effects: SideEffects,
        bus: EventBus,
    ) -> Self {
        Self {
            state,
            parser,
            effects,
            bus,
        }
    }

    /// Consume `inbound` until it ends.  `Ok(())` means the server closed
    /// the stream without an error.
    pub async fn run(
        &self,
        mut inbound: ServerStream,
        playback: &Playback,
    ) -> Result<(), BackendError> {
        while let Some(item) = inbound.next().await {
            self.handle(item?, playback);
        }
        Ok(())
    }

    fn handle(&self, msg: ServerMessage, playback: &Playback) {
        if let Some(pcm) = msg.audio {
            playback.enqueue(pcm);
        }
        if let Some(text) = msg.text.as_deref() {
            self.handle_text(text);
        }
        if msg.turn_complete {
            debug!("turn complete");
        }
    }

    fn handle_text(&self, text: &str) {
        let parsed = self.parser.parse(text);
        if let Some(emotion) = parsed.emotion {
            let previous = self.state.set_emotion(emotion);
            if previous != emotion {
                info!(from = ?previous, to = ?emotion, "emotion");
                let _ = self
                    .bus
                    .publish(Event::new(SOURCE, EventPayload::EmotionChanged(emotion)));
            }
        }
        for marker in parsed.actions {
            info!(?marker, "action requested");
            self.effects.action(marker);
        }
    }
}
