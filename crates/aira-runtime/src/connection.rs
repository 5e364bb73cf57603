//! [`ConnectionMachine`] – the lifecycle state machine.
//!
//! ```text
//! SLEEPING ──boot──▶ WAKING ──open ok──▶ IDLE (session running)
//!                      ▲  │                 │
//!                      │  └──open fails──┐  └──stream ends / fails──┐
//!                      │                 ▼                          ▼
//!                  RETRYING ◀──retry delay── ERROR ◀────────────────┘
//! ```
//!
//! Only this machine writes the lifecycle field.  Every transition is
//! logged and published as [`EventPayload::LifecycleChanged`].
//!
//! A session's uplink and downlink are polled by one `select!`, so when
//! either side ends both are dropped together and the uplink can never run
//! outside a session.  Entering `ERROR` plays exactly one error cue, and
//! `RETRYING` is reached no sooner than `retry_delay` later.  Shutdown is
//! honoured from every state and always ends in `SLEEPING` with the sleep
//! cue and gesture.

use std::sync::Arc;
use std::time::Duration;

use aira_hal::Peripherals;
use aira_middleware::{BackendError, EventBus, LiveBackend, MediaSink};
use aira_types::{Cue, Event, EventPayload, Gesture, LifecycleState};
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RuntimeConfig;
use crate::dispatch::SideEffects;
use crate::downlink::Downlink;
use crate::parser::TextParser;
use crate::playback::Playback;
use crate::state::SharedState;
use crate::uplink::Uplink;

const SOURCE: &str = "aira-runtime::connection";

/// How long a closing sink may take before it is abandoned.
const CLOSE_GRACE: Duration = Duration::from_secs(2);
/// How long the playback worker may take to finish its current chunk.
const PLAYBACK_GRACE: Duration = Duration::from_secs(2);

/// Why a session (or an attempt to open one) ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    /// The machine entered `ERROR` at `at`.
    Failed { reason: String, at: Instant },
}

pub struct ConnectionMachine {
    config: RuntimeConfig,
    backend: Arc<dyn LiveBackend>,
    peripherals: Peripherals,
    state: Arc<SharedState>,
    effects: SideEffects,
    bus: EventBus,
    downlink: Downlink,
}

impl ConnectionMachine {
    pub fn new(
        config: RuntimeConfig,
        backend: Arc<dyn LiveBackend>,
        peripherals: Peripherals,
        state: Arc<SharedState>,
        effects: SideEffects,
        bus: EventBus,
        parser: TextParser,
    ) -> Self {
        let downlink = Downlink::new(Arc::clone(&state), parser, effects.clone(), bus.clone());
        Self {
            config,
            backend,
            peripherals,
            state,
            effects,
            bus,
            downlink,
        }
    }

    /// Drive the lifecycle until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(backend = self.backend.name(), "connection machine started");
        self.cycle(&shutdown).await;
        self.go_to_sleep();
        info!("connection machine stopped");
    }

    async fn cycle(&self, shutdown: &CancellationToken) {
        if !pause(self.config.boot_delay, shutdown).await {
            return;
        }
        self.transition(LifecycleState::Waking);
        self.effects.cue(Cue::Wake);
        self.effects.gesture(Gesture::WakeUp);
        if !pause(self.config.wake_settle, shutdown).await {
            return;
        }

        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            debug!(attempt, "opening session");
            match self.serve_once(shutdown).await {
                SessionEnd::Shutdown => return,
                SessionEnd::Failed { reason, at } => {
                    debug!(attempt, %reason, delay = ?self.config.retry_delay, "backing off");
                    if !pause_until(at + self.config.retry_delay, shutdown).await {
                        return;
                    }
                    self.transition(LifecycleState::Retrying);
                    self.transition(LifecycleState::Waking);
                }
            }
        }
    }

    /// Open one session and serve it until it ends.  On failure the machine
    /// is already in `ERROR` when this returns.
    async fn serve_once(&self, shutdown: &CancellationToken) -> SessionEnd {
        let opened = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return SessionEnd::Shutdown,
            r = timeout(self.config.open_timeout, self.backend.open(&self.config.live)) => r,
        };
        let session = match opened.unwrap_or_else(|_| {
            Err(BackendError::Timeout(format!(
                "no session after {:?}",
                self.config.open_timeout
            )))
        }) {
            Ok(session) => session,
            Err(e) => return self.fail(format!("open failed: {e}")),
        };

        let (session_id, sink, inbound) = session.into_parts();
        self.state.set_active_session(Some(session_id));
        self.transition(LifecycleState::Idle);
        info!(session = %session_id, backend = self.backend.name(), "session opened");
        let _ = self
            .bus
            .publish(Event::new(SOURCE, EventPayload::SessionOpened { session_id }));

        let playback = Playback::start(
            Arc::clone(&self.peripherals.audio),
            Arc::clone(&self.state),
        );
        let uplink = Uplink::new(
            Arc::clone(&self.peripherals.audio),
            Arc::clone(&self.peripherals.vision),
            Arc::clone(&self.state),
            self.config.mic_poll_interval,
            self.config.camera_interval,
        );

        let failure = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            r = self.downlink.run(inbound, &playback) => Some(match r {
                Ok(()) => "server closed the stream".to_string(),
                Err(e) => e.to_string(),
            }),
            () = uplink.run(Arc::clone(&sink)) => Some("uplink stopped".to_string()),
        };

        // Both pumps are gone; enter ERROR before the slow teardown so the
        // backoff is measured from here.
        let (end, reason) = match failure {
            None => (SessionEnd::Shutdown, "shutdown".to_string()),
            Some(reason) => (self.fail(reason.clone()), reason),
        };

        if timeout(PLAYBACK_GRACE, playback.stop()).await.is_err() {
            warn!(session = %session_id, "playback worker did not stop in time; abandoning it");
        }
        close_sink(sink.as_ref()).await;
        self.state.set_active_session(None);
        self.state.set_gaze(None);
        info!(session = %session_id, %reason, "session closed");
        let _ = self.bus.publish(Event::new(
            SOURCE,
            EventPayload::SessionClosed { session_id, reason },
        ));
        end
    }

    fn fail(&self, reason: String) -> SessionEnd {
        error!(%reason, "connection failed");
        if self.transition(LifecycleState::Error) {
            self.effects.cue(Cue::Error);
        }
        SessionEnd::Failed {
            reason,
            at: Instant::now(),
        }
    }

    fn go_to_sleep(&self) {
        self.transition(LifecycleState::Sleeping);
        self.effects.cue(Cue::Sleep);
        self.effects.gesture(Gesture::Sleep);
    }

    /// Returns `false` if already in `next`.
    fn transition(&self, next: LifecycleState) -> bool {
        let from = self.state.set_lifecycle(next);
        if from == next {
            return false;
        }
        info!(%from, to = %next, "lifecycle");
        let _ = self.bus.publish(Event::new(
            SOURCE,
            EventPayload::LifecycleChanged { from, to: next },
        ));
        true
    }
}

/// Sleep for `d`; `false` if shutdown came first.
async fn pause(d: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        _ = sleep(d) => true,
    }
}

/// Sleep until `deadline`; `false` if shutdown came first.
async fn pause_until(deadline: Instant, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        _ = sleep_until(deadline) => true,
    }
}

async fn close_sink(sink: &dyn MediaSink) {
    if timeout(CLOSE_GRACE, sink.close()).await.is_err() {
        debug!("session sink close timed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aira_hal::sim::SimPeripherals;
    use aira_middleware::sim_backend::{OpenOutcome, ScriptedBackend, SessionScript};
    use aira_middleware::Topic;
    use aira_types::Emotion;
    use tokio::time::Instant;

    struct Rig {
        sim: SimPeripherals,
        backend: Arc<ScriptedBackend>,
        state: Arc<SharedState>,
        bus: EventBus,
        shutdown: CancellationToken,
    }

    fn rig(backend: ScriptedBackend) -> Rig {
        Rig {
            sim: SimPeripherals::new().with_continuous_mic(vec![0x00, 0x10]),
            backend: Arc::new(backend),
            state: Arc::new(SharedState::new()),
            bus: EventBus::default(),
            shutdown: CancellationToken::new(),
        }
    }

    fn spawn(rig: &Rig) -> tokio::task::JoinHandle<()> {
        let effects = SideEffects::new(rig.sim.peripherals(), rig.bus.clone(), 4);
        let machine = ConnectionMachine::new(
            RuntimeConfig::default(),
            Arc::clone(&rig.backend) as Arc<dyn LiveBackend>,
            rig.sim.peripherals(),
            Arc::clone(&rig.state),
            effects,
            rig.bus.clone(),
            TextParser::new().unwrap(),
        );
        tokio::spawn(machine.run(rig.shutdown.clone()))
    }

    /// Collect `n` lifecycle targets with their arrival time.
    async fn transitions(
        rx: &mut aira_middleware::bus::TopicReceiver,
        n: usize,
    ) -> Vec<(LifecycleState, Instant)> {
        let mut out = Vec::new();
        while out.len() < n {
            let ev = rx.recv().await.unwrap();
            if let EventPayload::LifecycleChanged { to, .. } = ev.payload {
                out.push((to, Instant::now()));
            }
        }
        out
    }

    /// Spin on real time until `cond` holds; blocking-pool work does not
    /// advance the paused clock.
    async fn eventually(mut cond: impl FnMut() -> bool) {
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while !cond() && std::time::Instant::now() < deadline {
            tokio::task::yield_now().await;
        }
        assert!(cond(), "condition not reached");
    }

    fn error_cues(sim: &SimPeripherals) -> usize {
        sim.audio.cues().iter().filter(|c| **c == Cue::Error).count()
    }

    #[tokio::test(start_paused = true)]
    async fn failed_opens_cycle_through_error_and_retrying() {
        let rig = rig(
            ScriptedBackend::new([
                OpenOutcome::Fail(BackendError::Connect("refused".into())),
                OpenOutcome::Fail(BackendError::Handshake("rejected".into())),
            ])
            .with_fallback(OpenOutcome::Hang),
        );
        let mut rx = rig.bus.subscribe_to(Topic::Lifecycle);
        let handle = spawn(&rig);

        let seen = transitions(&mut rx, 6).await;
        let states: Vec<_> = seen.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            states,
            vec![
                LifecycleState::Waking,
                LifecycleState::Error,
                LifecycleState::Retrying,
                LifecycleState::Waking,
                LifecycleState::Error,
                LifecycleState::Retrying,
            ]
        );
        assert!(seen[2].1 - seen[1].1 >= Duration::from_secs(5));
        assert!(seen[5].1 - seen[4].1 >= Duration::from_secs(5));

        assert_eq!(error_cues(&rig.sim), 2);
        assert_eq!(rig.sim.audio.mic_reads(), 0);
        assert_eq!(rig.backend.sent().len(), 0);

        rig.shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(rig.state.lifecycle(), LifecycleState::Sleeping);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_open_times_out_into_error() {
        let rig = rig(ScriptedBackend::new([OpenOutcome::Hang]).with_fallback(OpenOutcome::Hang));
        let mut rx = rig.bus.subscribe_to(Topic::Lifecycle);
        let handle = spawn(&rig);

        let seen = transitions(&mut rx, 2).await;
        assert_eq!(seen[1].0, LifecycleState::Error);
        assert!(seen[1].1 - seen[0].1 >= Duration::from_secs(15));
        assert_eq!(error_cues(&rig.sim), 1);

        rig.shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn session_runs_uplink_and_applies_text() {
        let rig = rig(ScriptedBackend::new([OpenOutcome::Session(
            SessionScript::new()
                .delay(Duration::from_millis(500))
                .text("[HAPPY] sure, move forward")
                .hold_open(),
        )]));
        let mut rx = rig.bus.subscribe_to(Topic::Lifecycle);
        let handle = spawn(&rig);

        let seen = transitions(&mut rx, 2).await;
        assert_eq!(seen[1].0, LifecycleState::Idle);
        assert!(rig.state.active_session().is_some());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(rig.state.emotion(), Emotion::Happy);
        assert!(rig.sim.audio.mic_reads() > 0);
        eventually(|| rig.sim.body.performed().contains(&Gesture::MoveForward)).await;

        rig.shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(rig.state.lifecycle(), LifecycleState::Sleeping);
        assert_eq!(rig.state.active_session(), None);
        assert_eq!(rig.sim.audio.cues(), vec![Cue::Wake, Cue::Sleep]);
        eventually(|| rig.sim.body.performed().contains(&Gesture::Sleep)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn stream_fault_tears_down_session_once() {
        let rig = rig(
            ScriptedBackend::new([OpenOutcome::Session(
                SessionScript::new()
                    .delay(Duration::from_secs(2))
                    .fail(BackendError::Closed("reset by peer".into())),
            )])
            .with_fallback(OpenOutcome::Hang),
        );
        let mut session_rx = rig.bus.subscribe_to(Topic::Session);
        let mut rx = rig.bus.subscribe_to(Topic::Lifecycle);
        let handle = spawn(&rig);

        let seen = transitions(&mut rx, 3).await;
        assert_eq!(
            seen.iter().map(|(s, _)| *s).collect::<Vec<_>>(),
            vec![
                LifecycleState::Waking,
                LifecycleState::Idle,
                LifecycleState::Error
            ]
        );

        let opened = session_rx.recv().await.unwrap();
        let closed = session_rx.recv().await.unwrap();
        let EventPayload::SessionOpened { session_id } = opened.payload else {
            panic!("expected SessionOpened, got {:?}", opened.payload);
        };
        match closed.payload {
            EventPayload::SessionClosed {
                session_id: id,
                reason,
            } => {
                assert_eq!(id, session_id);
                assert!(reason.contains("reset by peer"), "{reason}");
            }
            other => panic!("expected SessionClosed, got {other:?}"),
        }

        // The uplink stopped with the session.
        let reads = rig.sim.audio.mic_reads();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(rig.sim.audio.mic_reads(), reads);
        assert_eq!(rig.state.lifecycle(), LifecycleState::Error);
        assert_eq!(error_cues(&rig.sim), 1);
        assert_eq!(rig.state.active_session(), None);

        rig.shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_runs_from_error_entry_not_from_teardown() {
        let rig = rig(
            ScriptedBackend::new([OpenOutcome::Session(
                SessionScript::new()
                    .stall_close()
                    .fail(BackendError::Closed("reset by peer".into())),
            )])
            .with_fallback(OpenOutcome::Hang),
        );
        let mut rx = rig.bus.subscribe_to(Topic::Lifecycle);
        let handle = spawn(&rig);

        let seen = transitions(&mut rx, 4).await;
        assert_eq!(seen[2].0, LifecycleState::Error);
        assert_eq!(seen[3].0, LifecycleState::Retrying);
        let backoff = seen[3].1 - seen[2].1;
        let retry_delay = RuntimeConfig::default().retry_delay;
        assert!(backoff >= retry_delay, "backoff {backoff:?}");
        assert!(backoff < retry_delay + Duration::from_secs(1), "backoff {backoff:?}");

        rig.shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn clean_stream_end_also_retries() {
        let rig = rig(
            ScriptedBackend::new([
                OpenOutcome::Session(SessionScript::new().text("bye")),
                OpenOutcome::Session(SessionScript::new().hold_open()),
            ])
            .with_fallback(OpenOutcome::Hang),
        );
        let mut rx = rig.bus.subscribe_to(Topic::Lifecycle);
        let handle = spawn(&rig);

        let seen = transitions(&mut rx, 6).await;
        assert_eq!(
            seen.iter().map(|(s, _)| *s).collect::<Vec<_>>(),
            vec![
                LifecycleState::Waking,
                LifecycleState::Idle,
                LifecycleState::Error,
                LifecycleState::Retrying,
                LifecycleState::Waking,
                LifecycleState::Idle,
            ]
        );
        assert_eq!(rig.backend.open_attempts(), 2);

        rig.shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_boot_goes_straight_to_sleep() {
        let rig = rig(ScriptedBackend::new([]));
        let handle = spawn(&rig);
        tokio::time::sleep(Duration::from_millis(100)).await;
        rig.shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(rig.backend.open_attempts(), 0);
        assert_eq!(rig.state.lifecycle(), LifecycleState::Sleeping);
        assert_eq!(rig.sim.audio.cues(), vec![Cue::Sleep]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_backoff_skips_retrying() {
        let rig = rig(ScriptedBackend::new([]));
        let mut rx = rig.bus.subscribe_to(Topic::Lifecycle);
        let handle = spawn(&rig);

        let seen = transitions(&mut rx, 2).await;
        assert_eq!(seen[1].0, LifecycleState::Error);
        rig.shutdown.cancel();
        handle.await.unwrap();

        let last = transitions(&mut rx, 1).await;
        assert_eq!(last[0].0, LifecycleState::Sleeping);
        assert_eq!(rig.backend.open_attempts(), 1);
    }
}
