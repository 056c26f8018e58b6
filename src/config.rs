//! # Agent Configuration
//!
//! The agent reads a single TOML file at start-up. Every key is optional.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 17305
//!
//! [queue]
//! queue_max = 50
//! max_copies = 10
//! print_wait_ms = 90000
//!
//! [renderer]
//! path = 'C:\Program Files\Microsoft\Edge\Application\msedge.exe'
//! profile_dir = "renderer-profile"
//!
//! [printer_aliases]
//! caixa = "EPSON TM-T20"
//! cozinha = "Bematech MP-4200"
//! ```
//!
//! Environment variables (`PDV_AGENT_HOST`, `PDV_AGENT_PORT`,
//! `PDV_AGENT_RENDERER_PATH`, `PDV_AGENT_PRINT_WAIT_MS`,
//! `PDV_AGENT_MAX_COPIES`, `PDV_AGENT_PROFILE_DIR`) override the file.
//! Numeric settings outside their allowed range are clamped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::aliases::PrinterAliases;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid printer alias: {0}")]
    InvalidAlias(String),
}

pub const DEFAULT_CONFIG_PATH: &str = "print-agent.toml";

/// Main configuration struct for the agent.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub printer_aliases: HashMap<String, String>,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Admission and scheduling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_max")]
    pub queue_max: usize,
    #[serde(default = "default_max_copies")]
    pub max_copies: u32,
    #[serde(default = "default_max_tracked")]
    pub max_tracked: usize,
    #[serde(default = "default_print_wait_ms")]
    pub print_wait_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_max: default_queue_max(),
            max_copies: default_max_copies(),
            max_tracked: default_max_tracked(),
            print_wait_ms: default_print_wait_ms(),
        }
    }
}

impl QueueConfig {
    pub fn print_wait(&self) -> Duration {
        Duration::from_millis(self.print_wait_ms)
    }
}

/// External renderer settings.
///
/// `args` may contain the placeholders `{url}` (file URL of the job document),
/// `{file}` (plain path of the job document) and `{profile}` (the profile dir).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RendererConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,
    #[serde(default = "default_renderer_args")]
    pub args: Vec<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            path: None,
            profile_dir: default_profile_dir(),
            args: default_renderer_args(),
        }
    }
}

// Default value functions
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 17305 }
fn default_max_body_bytes() -> usize { 10 * 1024 * 1024 }
fn default_queue_max() -> usize { 50 }
fn default_max_copies() -> u32 { 10 }
fn default_max_tracked() -> usize { 200 }
fn default_print_wait_ms() -> u64 { 90_000 }
fn default_profile_dir() -> PathBuf { PathBuf::from("renderer-profile") }

pub fn default_renderer_args() -> Vec<String> {
    [
        "--kiosk-printing",
        "--disable-print-preview",
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-extensions",
        "--disable-gpu",
        "--disable-background-timer-throttling",
        "--disable-backgrounding-occluded-windows",
        "--disable-renderer-backgrounding",
        "--disable-features=CalculateNativeWinOcclusion",
        "--user-data-dir={profile}",
        "--app={url}",
        "--window-position=-32000,-32000",
        "--window-size=800,600",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

const MAX_BODY_RANGE: (usize, usize) = (1024, 50 * 1024 * 1024);
const QUEUE_MAX_RANGE: (usize, usize) = (1, 500);
const MAX_COPIES_RANGE: (u32, u32) = (1, 50);
const MAX_TRACKED_RANGE: (usize, usize) = (1, 10_000);
const PRINT_WAIT_RANGE: (u64, u64) = (2_000, 120_000);

impl Config {
    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(host) = get("PDV_AGENT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PDV_AGENT_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(path) = get("PDV_AGENT_RENDERER_PATH") {
            self.renderer.path = Some(PathBuf::from(path));
        }
        if let Some(wait) = get("PDV_AGENT_PRINT_WAIT_MS").and_then(|v| v.parse().ok()) {
            self.queue.print_wait_ms = wait;
        }
        if let Some(copies) = get("PDV_AGENT_MAX_COPIES").and_then(|v| v.parse().ok()) {
            self.queue.max_copies = copies;
        }
        if let Some(dir) = get("PDV_AGENT_PROFILE_DIR") {
            self.renderer.profile_dir = PathBuf::from(dir);
        }
    }

    /// Clamp numeric settings into their allowed ranges and anchor a relative
    /// profile directory at `base_dir`.
    pub fn normalize(&mut self, base_dir: &Path) {
        self.server.max_body_bytes = self.server.max_body_bytes.clamp(MAX_BODY_RANGE.0, MAX_BODY_RANGE.1);
        self.queue.queue_max = self.queue.queue_max.clamp(QUEUE_MAX_RANGE.0, QUEUE_MAX_RANGE.1);
        self.queue.max_copies = self.queue.max_copies.clamp(MAX_COPIES_RANGE.0, MAX_COPIES_RANGE.1);
        self.queue.max_tracked = self.queue.max_tracked.clamp(MAX_TRACKED_RANGE.0, MAX_TRACKED_RANGE.1);
        self.queue.print_wait_ms = self.queue.print_wait_ms.clamp(PRINT_WAIT_RANGE.0, PRINT_WAIT_RANGE.1);

        if self.renderer.profile_dir.as_os_str().is_empty() {
            self.renderer.profile_dir = default_profile_dir();
        }
        if self.renderer.profile_dir.is_relative() {
            self.renderer.profile_dir = base_dir.join(&self.renderer.profile_dir);
        }
        if self.renderer.path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            self.renderer.path = None;
        }
        if self.renderer.args.is_empty() {
            self.renderer.args = default_renderer_args();
        }
    }

    /// Build the validated alias table.
    pub fn aliases(&self) -> Result<PrinterAliases, ConfigError> {
        PrinterAliases::from_entries(&self.printer_aliases)
    }
}

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            Err(ConfigError::Io(e))
        }
    }
}

/// Load, override from the environment and normalize.
///
/// A missing file is only tolerated when `explicit` is false, i.e. the
/// default path was used; the agent then runs on built-in defaults.
pub fn load_agent_config(path: &str, explicit: bool) -> Result<Config, ConfigError> {
    let file = Path::new(path);
    let mut config = if !explicit && !file.exists() {
        tracing::info!("No config file at '{}', using defaults", path);
        Config::default()
    } else {
        load_config(path)?
    };
    config.apply_env(|key| std::env::var(key).ok());
    let base_dir = file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    config.normalize(&base_dir);
    // Fail at load time rather than on the first print.
    config.aliases()?;
    Ok(config)
}
