//! TOML configuration for netdiag.
//!
//! Describes where the settings file, results and logs live, and which
//! targets and endpoints the probes talk to. Resolution order: an explicit
//! path, the `NETDIAG_CONFIG` environment variable, `netdiag.toml` in the
//! working directory, then compiled-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Environment variable naming an alternate config file.
pub const CONFIG_ENV: &str = "NETDIAG_CONFIG";

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "netdiag.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the netdiag process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub probes: ProbesConfig,
    #[serde(default)]
    pub speedtest: SpeedtestConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded netdiag configuration");
        Ok(config)
    }

    /// Resolve configuration from, in order:
    /// 1. `explicit` (the `--config` flag). A failure here is an error.
    /// 2. The path in `NETDIAG_CONFIG`.
    /// 3. `netdiag.toml` in the working directory.
    /// 4. Compiled-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "NETDIAG_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %local.display(),
                        error = %e,
                        "local config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Filesystem locations used by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// JSON settings document edited through the settings menu.
    pub settings_file: PathBuf,
    /// Directory receiving one `Results_*.txt` file per saved run.
    pub results_dir: PathBuf,
    /// Directory receiving per-session log files.
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            settings_file: PathBuf::from("settings.json"),
            results_dir: PathBuf::from("Results"),
            log_dir: PathBuf::from("Logs"),
        }
    }
}

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

/// Targets for the command probes and the public IP lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbesConfig {
    /// Host pinged and traced.
    pub ping_target: String,
    /// Name resolved by the lookup probe.
    pub lookup_host: String,
    /// Endpoint echoing the caller's public address as plain text.
    pub public_ip_url: String,
    /// Progress tick interval in milliseconds.
    pub tick_interval_ms: u64,
    /// Timeout for the public IP request, in seconds.
    pub http_timeout_secs: u64,
}

impl Default for ProbesConfig {
    fn default() -> Self {
        Self {
            ping_target: "8.8.8.8".to_string(),
            lookup_host: "google.com".to_string(),
            public_ip_url: "https://api.ipify.org".to_string(),
            tick_interval_ms: 500,
            http_timeout_secs: 10,
        }
    }
}

impl ProbesConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// Speedtest
// ---------------------------------------------------------------------------

/// Endpoints and transfer sizes for the bandwidth probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedtestConfig {
    /// Zero-byte download used to pick the server and measure latency.
    pub latency_url: String,
    /// Download endpoint; the byte count is passed as `?bytes=N`.
    pub download_url: String,
    /// Upload endpoint receiving a POST body.
    pub upload_url: String,
    pub download_bytes: u64,
    pub upload_bytes: usize,
    pub latency_samples: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SpeedtestConfig {
    fn default() -> Self {
        Self {
            latency_url: "https://speed.cloudflare.com/__down?bytes=0".to_string(),
            download_url: "https://speed.cloudflare.com/__down".to_string(),
            upload_url: "https://speed.cloudflare.com/__up".to_string(),
            download_bytes: 25_000_000,
            upload_bytes: 10_000_000,
            latency_samples: 5,
            timeout_secs: 60,
        }
    }
}

impl SpeedtestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_targets() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.probes.ping_target, "8.8.8.8");
        assert_eq!(cfg.probes.lookup_host, "google.com");
        assert_eq!(cfg.probes.tick_interval(), Duration::from_millis(500));
        assert_eq!(cfg.paths.settings_file, PathBuf::from("settings.json"));
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [probes]
            ping_target = "1.1.1.1"
            tick_interval_ms = 100

            [paths]
            results_dir = "/tmp/netdiag-results"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.probes.ping_target, "1.1.1.1");
        assert_eq!(cfg.probes.lookup_host, "google.com");
        assert_eq!(cfg.probes.tick_interval(), Duration::from_millis(100));
        assert_eq!(cfg.paths.results_dir, PathBuf::from("/tmp/netdiag-results"));
        assert_eq!(cfg.paths.log_dir, PathBuf::from("Logs"));
        assert_eq!(cfg.speedtest, SpeedtestConfig::default());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[probes]\nlookup_host = \"example.org\"\n").unwrap();

        let cfg = AppConfig::resolve(Some(&path)).unwrap();
        assert_eq!(cfg.probes.lookup_host, "example.org");
    }

    #[test]
    fn test_zero_tick_interval_is_clamped() {
        let probes = ProbesConfig {
            tick_interval_ms: 0,
            ..ProbesConfig::default()
        };
        assert_eq!(probes.tick_interval(), Duration::from_millis(1));
    }
}
