//! `aira` – launcher for the AIRA embodied agent.
//!
//! 1. Installs structured logging (and OTLP export when configured).
//! 2. Loads `~/.aira/config.toml`, writing a default file on first run, and
//!    applies `AIRA_*` environment overrides.
//! 3. Builds the live backend (`gemini` or the offline `sim` demo).
//! 4. Runs the orchestrator on a multi-threaded Tokio runtime until Ctrl-C.

mod config;
mod demo;

use std::process::ExitCode;
use std::sync::Arc;

use aira_hal::sim::{SimPeripherals, SimSurface};
use aira_middleware::gemini::GeminiLive;
use aira_middleware::LiveBackend;
use aira_runtime::Orchestrator;
use aira_types::AiraError;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{BackendKind, Config};

fn main() -> ExitCode {
    // Must come before the runtime exists: the OTLP exporter is synchronous.
    let _telemetry = aira_runtime::telemetry::init_tracing("aira");

    print_banner();

    let mut cfg = load_config();
    config::apply_env_overrides(&mut cfg);
    println!(
        "  Backend {}  model {}  {} fps",
        cfg.backend.to_string().bold(),
        cfg.model.dimmed(),
        cfg.timing.fps
    );

    let (backend, sim) = match build_backend(&cfg) {
        Ok(parts) => parts,
        Err(e) => {
            println!("{}: {e}", "Backend error".red());
            println!(
                "  Set {} (or {}) or run with {}.",
                "AIRA_API_KEY".bold(),
                "GOOGLE_API_KEY".bold(),
                "AIRA_BACKEND=sim".bold()
            );
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("aira-worker")
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    // ── Ctrl-C ───────────────────────────────────────────────────────────
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            println!();
            println!("{}", "⚠  Ctrl-C received – putting AIRA to sleep …".yellow().bold());
            shutdown.cancel();
        }) {
            warn!(error = %e, "failed to install Ctrl-C handler; stop the process to exit");
        }
    }

    let orchestrator = Orchestrator::new(cfg.runtime(), sim.peripherals(), backend);
    let mut surface = SimSurface::headless(cfg.timing.fps.max(1) as usize * 5);

    println!("  Press {} to stop.\n", "Ctrl-C".bold().cyan());
    match runtime.block_on(orchestrator.run(&mut surface, shutdown)) {
        Ok(summary) => {
            info!(frames = summary.frames, state = %summary.final_state, "exited");
            println!("  {} AIRA is asleep.", "✓".green().bold());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "orchestrator failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Wrote default config to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {e}", "Error saving config".red()),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {e}", "Config error".red());
            println!("  Using default configuration.");
            Config::default()
        }
    }
}

/// The backend plus the drivers to run it with.  Only simulated drivers
/// ship with this binary.
fn build_backend(cfg: &Config) -> Result<(Arc<dyn LiveBackend>, SimPeripherals), AiraError> {
    match cfg.backend {
        BackendKind::Gemini => {
            let client = GeminiLive::with_endpoint(cfg.endpoint.clone(), cfg.api_key.expose())?;
            let sim = SimPeripherals::new()
                .with_realtime_playback(demo::REPLY_RATE)
                .with_history_limit(0);
            Ok((Arc::new(client), sim))
        }
        BackendKind::Sim => Ok((Arc::new(demo::backend()), demo::peripherals())),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ___    ________  ___ "#.bold().cyan());
    println!("{}", r#"   /   |  /  _/ __ \/   |"#.bold().cyan());
    println!("{}", r#"  / /| |  / // /_/ / /| |"#.bold().cyan());
    println!("{}", r#" / ___ |_/ // _, _/ ___ |"#.bold().cyan());
    println!("{}", r#"/_/  |_/___/_/ |_/_/  |_|"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "AIRA".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Embodied conversational agent");
    println!();
}
