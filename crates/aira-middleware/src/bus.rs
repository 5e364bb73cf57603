//! In-process publish/subscribe bus for lifecycle and expression events.
//!
//! Uses [`tokio::sync::broadcast`] channels so every subscriber receives
//! every message and a slow subscriber never blocks a publisher.  Events are
//! observational: the loops that publish them never wait on a reader, and
//! publishing with nobody listening is reported but harmless.
//!
//! # Topics
//!
//! Every event is routed to the global channel and to the lane derived from
//! its payload:
//!
//! | Topic | Traffic |
//! |---|---|
//! | [`Topic::Lifecycle`] | `LifecycleChanged` |
//! | [`Topic::Expression`] | `EmotionChanged`, `ActionTriggered`, `CuePlayed` |
//! | [`Topic::Session`] | `SessionOpened`, `SessionClosed` |

use aira_types::{AiraError, Event, EventPayload};
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Connection state machine transitions.
    Lifecycle,
    /// Mood changes, physical actions and sound cues.
    Expression,
    /// Backend sessions opening and closing.
    Session,
}

impl Topic {
    /// Lane an event payload belongs to.
    pub fn of(payload: &EventPayload) -> Topic {
        match payload {
            EventPayload::LifecycleChanged { .. } => Topic::Lifecycle,
            EventPayload::EmotionChanged(_)
            | EventPayload::ActionTriggered(_)
            | EventPayload::CuePlayed(_) => Topic::Expression,
            EventPayload::SessionOpened { .. } | EventPayload::SessionClosed { .. } => {
                Topic::Session
            }
        }
    }
}

/// Shared event bus.  Clone it cheaply – all clones share the same
/// underlying broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    lifecycle: broadcast::Sender<Event>,
    expression: broadcast::Sender<Event>,
    session: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given per-channel capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        let (lifecycle, _) = broadcast::channel(capacity);
        let (expression, _) = broadcast::channel(capacity);
        let (session, _) = broadcast::channel(capacity);
        Self {
            sender,
            lifecycle,
            expression,
            session,
        }
    }

    /// Publish `event` to the global channel and to its topic lane.
    ///
    /// Returns the total number of receivers handed the event.
    ///
    /// # Errors
    ///
    /// [`AiraError::Channel`] when nobody is subscribed to either channel.
    /// Callers treat this as informational.
    pub fn publish(&self, event: Event) -> Result<usize, AiraError> {
        let lane = self.topic_sender(Topic::of(&event.payload));
        let on_lane = lane.send(event.clone()).unwrap_or(0);
        let global = self.sender.send(event).unwrap_or(0);
        match on_lane + global {
            0 => Err(AiraError::Channel("event bus has no subscribers".into())),
            n => Ok(n),
        }
    }

    /// Subscribe to every event.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Subscribe to a single [`Topic`] lane.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Lifecycle => &self.lifecycle,
            Topic::Expression => &self.expression,
            Topic::Session => &self.session,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Receivers
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] lane.
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this lane.
    ///
    /// `Err(Lagged(n))` means `n` events were dropped because this receiver
    /// fell behind; `Err(Closed)` means every bus handle is gone.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}
