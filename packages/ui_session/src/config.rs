use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// File config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
//   config.toml:     [timing]
//                    reconnect_delay_ms = 3000
//
//   env var:         UI_SESSION_TIMING__RECONNECT_DELAY_MS=3000
//
//   (double underscore = nesting; single underscore stays within field names)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub auth: AuthFileConfig,
    #[serde(default)]
    pub timing: TimingFileConfig,
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            server: ServerFileConfig::default(),
            auth: AuthFileConfig::default(),
            timing: TimingFileConfig::default(),
            capabilities: default_capabilities(),
        }
    }
}

/// Lives under `[server]` in config.toml.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_url")]
    pub url: String,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self { url: default_url() }
    }
}

/// Lives under `[auth]` in config.toml.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthFileConfig {
    /// Bearer token sent in the registration frame.
    #[serde(default)]
    pub token: Option<String>,
}

/// Lives under `[timing]` in config.toml. All values in milliseconds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimingFileConfig {
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Gap between registration and the resume `load_chat`.
    #[serde(default = "default_resume_delay_ms")]
    pub resume_delay_ms: u64,
    #[serde(default = "default_save_timeout_ms")]
    pub save_timeout_ms: u64,
    /// How long save/combine error text stays visible.
    #[serde(default = "default_error_ttl_ms")]
    pub error_ttl_ms: u64,
}

impl Default for TimingFileConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            resume_delay_ms: default_resume_delay_ms(),
            save_timeout_ms: default_save_timeout_ms(),
            error_ttl_ms: default_error_ttl_ms(),
        }
    }
}

fn default_url() -> String {
    "ws://127.0.0.1:8000/ws/ui".to_string()
}
fn default_capabilities() -> Vec<String> {
    ["ui_render", "ui_update", "saved_components", "combine_components"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_reconnect_delay_ms() -> u64 {
    3000
}
fn default_resume_delay_ms() -> u64 {
    500
}
fn default_save_timeout_ms() -> u64 {
    10_000
}
fn default_error_ttl_ms() -> u64 {
    5000
}

/// Build a figment that layers: defaults → config.toml → UI_SESSION_* env vars.
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("UI_SESSION_").split("__"))
}

// =============================================================================
// Runtime config (derived from FileConfig)
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct Timings {
    pub reconnect_delay: Duration,
    pub resume_delay: Duration,
    pub save_timeout: Duration,
    pub error_ttl: Duration,
}

impl Timings {
    pub fn from_file(fc: &TimingFileConfig) -> Self {
        Self {
            reconnect_delay: Duration::from_millis(fc.reconnect_delay_ms),
            resume_delay: Duration::from_millis(fc.resume_delay_ms),
            save_timeout: Duration::from_millis(fc.save_timeout_ms),
            error_ttl: Duration::from_millis(fc.error_ttl_ms),
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self::from_file(&TimingFileConfig::default())
    }
}

/// Everything the session client needs at runtime.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub url: String,
    pub capabilities: Vec<String>,
    pub timings: Timings,
}

impl ClientConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            url: fc.server.url.clone(),
            capabilities: fc.capabilities.clone(),
            timings: Timings::from_file(&fc.timing),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_file(&FileConfig::default())
    }
}

/// Resolve the data directory: explicit path, else `<config dir>/ui-session`.
pub fn data_dir(custom: Option<PathBuf>) -> Result<PathBuf> {
    match custom {
        Some(dir) => Ok(dir),
        None => Ok(dirs::config_dir()
            .context("could not determine config directory")?
            .join("ui-session")),
    }
}
