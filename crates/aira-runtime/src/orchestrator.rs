//! [`Orchestrator`] – wires the loops together and owns their lifetime.
//!
//! One root [`CancellationToken`] stops everything.  The sensor loop and
//! the connection machine run as Tokio tasks; the render loop runs on the
//! caller's task because surfaces are not `Send`.  Shutdown order:
//!
//! 1. the token is cancelled (signal handler or the surface's quit event)
//! 2. the machine tears down any session and enters `SLEEPING`
//! 3. rendering stops once the machine and sensor have exited
//! 4. in-flight gestures are given a grace period, then the surface closes
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use aira_hal::sim::{SimPeripherals, SimSurface};
//! use aira_middleware::sim_backend::{OpenOutcome, ScriptedBackend, SessionScript};
//! use aira_runtime::{Orchestrator, RuntimeConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), aira_types::AiraError> {
//! let sim = SimPeripherals::new();
//! let backend = ScriptedBackend::new([OpenOutcome::Session(SessionScript::new().hold_open())]);
//! let orchestrator = Orchestrator::new(RuntimeConfig::default(), sim.peripherals(), Arc::new(backend));
//! let mut surface = SimSurface::headless(60);
//! let summary = orchestrator.run(&mut surface, CancellationToken::new()).await?;
//! println!("drew {} frames", summary.frames);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use aira_face::FaceEngine;
use aira_hal::{Peripherals, RenderSurface};
use aira_middleware::{EventBus, LiveBackend};
use aira_types::{AiraError, LifecycleState};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::connection::ConnectionMachine;
use crate::dispatch::SideEffects;
use crate::overlay::DisplayOverlay;
use crate::parser::TextParser;
use crate::render::RenderLoop;
use crate::sensor::run_sensor_loop;
use crate::state::SharedState;

/// Upper bound on waiting for running gestures at shutdown.
const GESTURE_GRACE: Duration = Duration::from_secs(3);

/// Outcome of one [`Orchestrator::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub final_state: LifecycleState,
}

pub struct Orchestrator {
    config: RuntimeConfig,
    peripherals: Peripherals,
    backend: Arc<dyn LiveBackend>,
    state: Arc<SharedState>,
    bus: EventBus,
}

impl Orchestrator {
    pub fn new(
        config: RuntimeConfig,
        peripherals: Peripherals,
        backend: Arc<dyn LiveBackend>,
    ) -> Self {
        Self {
            config,
            peripherals,
            backend,
            state: Arc::new(SharedState::new()),
            bus: EventBus::default(),
        }
    }

    /// Publish on `bus` instead of a private one.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn state(&self) -> Arc<SharedState> {
        Arc::clone(&self.state)
    }

    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }

    /// Run until `shutdown` is cancelled or the surface asks to quit.
    ///
    /// # Errors
    ///
    /// [`AiraError::Config`] if the text patterns cannot be compiled.
    pub async fn run(
        self,
        surface: &mut dyn RenderSurface,
        shutdown: CancellationToken,
    ) -> Result<RunSummary, AiraError> {
        let parser = TextParser::new()?;
        let effects = SideEffects::new(
            self.peripherals.clone(),
            self.bus.clone(),
            self.config.max_side_effects,
        );

        info!(
            backend = self.backend.name(),
            fps = self.config.fps,
            model = %self.config.live.model_id,
            "orchestrator starting"
        );

        let machine = ConnectionMachine::new(
            self.config.clone(),
            Arc::clone(&self.backend),
            self.peripherals.clone(),
            Arc::clone(&self.state),
            effects.clone(),
            self.bus.clone(),
            parser,
        );
        let machine_task = tokio::spawn(machine.run(shutdown.clone()));
        let sensor_task = tokio::spawn(run_sensor_loop(
            Arc::clone(&self.peripherals.vision),
            Arc::clone(&self.state),
            self.config.sensor_interval,
            shutdown.clone(),
        ));

        let render = RenderLoop::new(
            Arc::clone(&self.state),
            FaceEngine::new(self.config.face.clone()),
            DisplayOverlay::new(
                self.config.talk_threshold,
                self.config.listen_threshold,
                self.config.thinking_window,
            ),
            self.config.frame_period(),
        )
        .log_every(self.config.frame_log_every);

        let render_stop = CancellationToken::new();
        let supervisor = {
            let render_stop = render_stop.clone();
            async move {
                if let Err(e) = machine_task.await {
                    warn!(error = %e, "connection machine task failed");
                }
                if let Err(e) = sensor_task.await {
                    warn!(error = %e, "sensor task failed");
                }
                render_stop.cancel();
            }
        };
        let (frames, ()) = tokio::join!(
            render.run(surface, shutdown.clone(), render_stop),
            supervisor
        );

        if tokio::time::timeout(GESTURE_GRACE, effects.drain())
            .await
            .is_err()
        {
            warn!("gestures still running at shutdown");
        }
        surface.close();

        let summary = RunSummary {
            frames,
            final_state: self.state.lifecycle(),
        };
        info!(frames = summary.frames, state = %summary.final_state, "orchestrator stopped");
        Ok(summary)
    }
}
