//! Configuration vault – reads/writes `~/.aira/config.toml`.
//!
//! Every field has a default, so a partial file (or none at all) is fine.
//! `AIRA_*` environment variables are applied on top of whatever was loaded.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use aira_face::FaceTuning;
use aira_middleware::gemini::DEFAULT_ENDPOINT;
use aira_middleware::LiveConfig;
use aira_runtime::RuntimeConfig;
use aira_types::AiraError;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Which live backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Gemini,
    /// Scripted offline conversation.
    Sim,
}

impl BackendKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Some(BackendKind::Gemini),
            "sim" => Some(BackendKind::Sim),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Gemini => write!(f, "gemini"),
            BackendKind::Sim => write!(f, "sim"),
        }
    }
}

/// API key, wiped from memory on drop and never printed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("<not set>")
        } else {
            f.write_str("<redacted>")
        }
    }
}

/// `[timing]` – loop rates and lifecycle delays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub fps: u32,
    pub boot_delay_ms: u64,
    pub wake_settle_ms: u64,
    pub retry_delay_secs: u64,
    pub open_timeout_secs: u64,
    pub sensor_interval_ms: u64,
    pub mic_poll_interval_ms: u64,
    pub camera_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            boot_delay_ms: 1_000,
            wake_settle_ms: 2_000,
            retry_delay_secs: 5,
            open_timeout_secs: 15,
            sensor_interval_ms: 100,
            mic_poll_interval_ms: 10,
            camera_interval_ms: 1_000,
        }
    }
}

/// `[display]` – how envelopes map to the shown sub-state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub talk_threshold: f32,
    pub listen_threshold: f32,
    pub thinking_window_ms: u64,
    /// Log a frame summary every N frames (0 = never).
    pub frame_log_every: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            talk_threshold: 0.02,
            listen_threshold: 0.03,
            thinking_window_ms: 1_500,
            frame_log_every: 0,
        }
    }
}

/// Persisted user configuration stored in `~/.aira/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendKind,
    pub endpoint: String,
    /// Stored as plain text; the file is written owner-only.
    #[serde(skip_serializing_if = "ApiKey::is_empty")]
    pub api_key: ApiKey,
    pub model: String,
    pub system_instruction: String,
    pub response_modalities: Vec<String>,
    pub output_transcription: bool,
    /// Gestures allowed to run at once.
    pub max_gestures: usize,

    pub timing: TimingConfig,
    pub display: DisplayConfig,
    pub face: FaceTuning,
}

impl Default for Config {
    fn default() -> Self {
        let live = LiveConfig::default();
        Self {
            backend: BackendKind::default(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: ApiKey::default(),
            model: live.model_id,
            system_instruction: live.system_instruction,
            response_modalities: live.response_modalities,
            output_transcription: live.output_transcription,
            max_gestures: 4,
            timing: TimingConfig::default(),
            display: DisplayConfig::default(),
            face: FaceTuning::default(),
        }
    }
}

impl Config {
    /// Typed form consumed by the runtime.
    pub fn runtime(&self) -> RuntimeConfig {
        let t = &self.timing;
        let d = &self.display;
        RuntimeConfig {
            live: self.live(),
            fps: t.fps,
            boot_delay: Duration::from_millis(t.boot_delay_ms),
            wake_settle: Duration::from_millis(t.wake_settle_ms),
            retry_delay: Duration::from_secs(t.retry_delay_secs),
            open_timeout: Duration::from_secs(t.open_timeout_secs.max(1)),
            sensor_interval: Duration::from_millis(t.sensor_interval_ms),
            mic_poll_interval: Duration::from_millis(t.mic_poll_interval_ms),
            camera_interval: Duration::from_millis(t.camera_interval_ms),
            talk_threshold: d.talk_threshold,
            listen_threshold: d.listen_threshold,
            thinking_window: Duration::from_millis(d.thinking_window_ms),
            max_side_effects: self.max_gestures,
            frame_log_every: d.frame_log_every,
            face: self.face.clone(),
        }
    }

    pub fn live(&self) -> LiveConfig {
        LiveConfig {
            model_id: self.model.clone(),
            response_modalities: self.response_modalities.clone(),
            system_instruction: self.system_instruction.clone(),
            output_transcription: self.output_transcription,
        }
    }
}

/// Return the path to `~/.aira/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".aira").join("config.toml")
}

/// Load the config from disk.  `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, AiraError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, AiraError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        AiraError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| AiraError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `AIRA_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `AIRA_BACKEND` | `backend` (`gemini` or `sim`) |
/// | `AIRA_MODEL` | `model` |
/// | `AIRA_API_KEY` | `api_key` |
/// | `GOOGLE_API_KEY` | `api_key`, if still unset |
/// | `AIRA_RETRY_DELAY_SECS` | `timing.retry_delay_secs` |
/// | `AIRA_FPS` | `timing.fps` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("AIRA_BACKEND")
        && let Some(kind) = BackendKind::parse(&v)
    {
        cfg.backend = kind;
    }
    if let Ok(v) = std::env::var("AIRA_MODEL")
        && !v.trim().is_empty()
    {
        cfg.model = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("AIRA_API_KEY")
        && !v.is_empty()
    {
        cfg.api_key = ApiKey::new(v);
    }
    if cfg.api_key.is_empty()
        && let Ok(v) = std::env::var("GOOGLE_API_KEY")
    {
        cfg.api_key = ApiKey::new(v);
    }
    if let Ok(v) = std::env::var("AIRA_RETRY_DELAY_SECS")
        && let Ok(secs) = v.trim().parse::<u64>()
    {
        cfg.timing.retry_delay_secs = secs;
    }
    if let Ok(v) = std::env::var("AIRA_FPS")
        && let Ok(fps) = v.trim().parse::<u32>()
        && fps > 0
    {
        cfg.timing.fps = fps;
    }
}

/// Save the config to disk, creating `~/.aira/` if necessary.
pub fn save(cfg: &Config) -> Result<(), AiraError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), AiraError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AiraError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                AiraError::Config(format!("failed to set config directory permissions: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| AiraError::Config(format!("failed to serialize config: {e}")))?;
    let write_err =
        |e: std::io::Error| AiraError::Config(format!("failed to write {}: {e}", path.display()));
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}
