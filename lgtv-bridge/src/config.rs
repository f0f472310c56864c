//! Configuration for the bridge service.

use std::path::Path;
use std::time::Duration;

use lgtv_core::{Catalog, LgtvError, ReconnectPolicy, SessionSettings};
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Where the TV is.
    pub tv: TvConfig,
    /// Poll, burst and reconnect timing.
    pub timing: TimingConfig,
    /// Command table.
    pub catalog: CatalogConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TvConfig {
    /// TV (or serial adapter) address.
    pub host: String,
    pub port: u16,
    /// Set ID the TV is configured with; 0 addresses every set.
    pub set_id: u8,
}

/// Timing settings. Sub-second values are in milliseconds, reconnect
/// delays in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_interval_ms: u64,
    pub burst_spacing_ms: u64,
    pub burst_margin_ms: u64,
    pub command_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Wait after the TV closed the connection.
    pub reconnect_after_close_secs: u64,
    /// Wait after a socket error or refused connection.
    pub reconnect_after_error_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON command table. Empty uses the built-in table.
    pub path: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for TvConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.56".into(),
            port: lgtv_core::session::DEFAULT_PORT,
            set_id: 0,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            burst_spacing_ms: 5_000,
            burst_margin_ms: 2_000,
            command_timeout_ms: 3_000,
            connect_timeout_ms: 10_000,
            reconnect_after_close_secs: 60,
            reconnect_after_error_secs: 15,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

/// Where a loaded configuration came from. Reported after tracing is up,
/// since the log level itself comes from the file.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File,
    Missing,
    /// The file did not parse; defaults were used instead.
    Invalid(String),
}

impl ConfigSource {
    pub fn log(&self, path: &Path) {
        match self {
            Self::File => tracing::info!("config loaded from {}", path.display()),
            Self::Missing => tracing::info!("no config at {}; using defaults", path.display()),
            Self::Invalid(e) => {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display())
            }
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> (Self, ConfigSource) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, ConfigSource::File),
                Err(e) => (Self::default(), ConfigSource::Invalid(e.to_string())),
            },
            Err(_) => (Self::default(), ConfigSource::Missing),
        }
    }

    /// The configured command table, or the built-in one.
    pub fn load_catalog(&self) -> Result<Catalog, LgtvError> {
        if self.catalog.path.is_empty() {
            Catalog::builtin()
        } else {
            Catalog::from_path(Path::new(&self.catalog.path))
        }
    }

    /// Convert to session settings. Zero intervals are raised to one
    /// millisecond; a zero poll interval would spin.
    pub fn to_session_settings(&self) -> SessionSettings {
        let ms = |v: u64| Duration::from_millis(v.max(1));
        let t = &self.timing;
        SessionSettings {
            host: self.tv.host.clone(),
            port: self.tv.port,
            set_id: self.tv.set_id,
            poll_interval: ms(t.poll_interval_ms),
            burst_spacing: ms(t.burst_spacing_ms),
            burst_margin: Duration::from_millis(t.burst_margin_ms),
            command_timeout: ms(t.command_timeout_ms),
            connect_timeout: ms(t.connect_timeout_ms),
            reconnect: ReconnectPolicy {
                after_close: Duration::from_secs(t.reconnect_after_close_secs),
                after_error: Duration::from_secs(t.reconnect_after_error_secs),
            },
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&BridgeConfig::default()).unwrap();
        assert!(text.contains("host"));
        assert!(text.contains("poll_interval_ms"));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&BridgeConfig::default()).unwrap();
        let parsed: BridgeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.tv.port, 23);
        assert_eq!(parsed.timing.reconnect_after_close_secs, 60);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: BridgeConfig = toml::from_str("[tv]\nhost = \"10.0.0.7\"\n").unwrap();
        assert_eq!(parsed.tv.host, "10.0.0.7");
        assert_eq!(parsed.tv.port, 23);
        assert_eq!(parsed.logging.level, "info");
    }

    fn scratch_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("lgtv-bridge-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_reads_file() {
        let path = scratch_file("good.toml", "[tv]\nhost = \"10.0.0.9\"\n[logging]\nlevel = \"debug\"\n");
        let (cfg, source) = BridgeConfig::load(&path);
        std::fs::remove_file(&path).ok();
        assert_eq!(source, ConfigSource::File);
        assert_eq!(cfg.tv.host, "10.0.0.9");
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn load_reports_invalid_file() {
        let path = scratch_file("bad.toml", "[tv\nhost = 7\n");
        let (cfg, source) = BridgeConfig::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(source, ConfigSource::Invalid(ref e) if !e.is_empty()));
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.tv.port, 23);
    }

    #[test]
    fn load_reports_missing_file() {
        let (cfg, source) = BridgeConfig::load(Path::new("/nonexistent/lgtv-bridge.toml"));
        assert_eq!(source, ConfigSource::Missing);
        assert_eq!(cfg.tv.host, "192.168.1.56");
    }

    #[test]
    fn to_session_settings_clamps() {
        let mut cfg = BridgeConfig::default();
        cfg.timing.poll_interval_ms = 0;
        let settings = cfg.to_session_settings();
        assert_eq!(settings.poll_interval, Duration::from_millis(1));
        assert_eq!(settings.reconnect.after_error, Duration::from_secs(15));
        assert_eq!(settings.host, "192.168.1.56");
    }

    #[test]
    fn empty_catalog_path_uses_builtin() {
        let cfg = BridgeConfig::default();
        let catalog = cfg.load_catalog().unwrap();
        assert!(catalog.lookup_by_name("power").is_ok());
    }

    #[test]
    fn missing_catalog_file_is_an_error() {
        let mut cfg = BridgeConfig::default();
        cfg.catalog.path = "/nonexistent/commands.json".into();
        assert!(cfg.load_catalog().is_err());
    }
}
