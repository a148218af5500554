//! User settings persisted as a small JSON document.
//!
//! ```json
//! {
//!   "test_preferences": { "Ping": "Enabled", "Speedtest": "Disabled" },
//!   "notification_settings": { "enabled": false },
//!   "save_summaries": { "enabled": false },
//!   "logging_settings": { "enabled": true }
//! }
//! ```
//!
//! Probes absent from `test_preferences`, or set to anything but
//! `"Enabled"`, are disabled. Unknown keys and values inside
//! `test_preferences` are kept so they survive a save.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::StoreError;
use crate::probes::ProbeKind;

/// Stored state of one probe. Only `"Enabled"` turns a probe on; any other
/// value reads as disabled and is written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Toggle {
    Enabled,
    #[default]
    Disabled,
    Unrecognized(serde_json::Value),
}

impl Toggle {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Toggle::Enabled)
    }
}

impl From<serde_json::Value> for Toggle {
    fn from(value: serde_json::Value) -> Self {
        match value.as_str() {
            Some("Enabled") => Toggle::Enabled,
            Some("Disabled") => Toggle::Disabled,
            _ => Toggle::Unrecognized(value),
        }
    }
}

impl From<Toggle> for serde_json::Value {
    fn from(toggle: Toggle) -> Self {
        match toggle {
            Toggle::Enabled => "Enabled".into(),
            Toggle::Disabled => "Disabled".into(),
            Toggle::Unrecognized(value) => value,
        }
    }
}

impl From<bool> for Toggle {
    fn from(on: bool) -> Self {
        if on {
            Toggle::Enabled
        } else {
            Toggle::Disabled
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Switch {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub test_preferences: BTreeMap<String, Toggle>,
    pub notification_settings: Switch,
    pub save_summaries: Switch,
    pub logging_settings: Switch,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            test_preferences: BTreeMap::new(),
            notification_settings: Switch { enabled: false },
            save_summaries: Switch { enabled: false },
            logging_settings: Switch { enabled: true },
        }
    }
}

impl Settings {
    /// Read settings from `path`. A missing file yields the defaults.
    pub fn try_load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`Settings::try_load`], but a broken file degrades to defaults.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(settings) => {
                info!(path = %path.display(), "settings loaded");
                settings
            }
            Err(e) => {
                error!(error = %e, "error loading settings, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, json).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "settings saved");
        Ok(())
    }

    pub fn is_enabled(&self, kind: ProbeKind) -> bool {
        self.test_preferences
            .get(kind.settings_key())
            .is_some_and(Toggle::is_enabled)
    }

    pub fn set_enabled(&mut self, kind: ProbeKind, on: bool) {
        self.test_preferences
            .insert(kind.settings_key().to_string(), Toggle::from(on));
    }

    /// Flip a probe's enablement and return the new state.
    pub fn toggle(&mut self, kind: ProbeKind) -> bool {
        let next = !self.is_enabled(kind);
        self.set_enabled(kind, next);
        next
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notification_settings.enabled
    }

    pub fn set_notifications(&mut self, on: bool) {
        self.notification_settings.enabled = on;
    }

    pub fn save_summaries_enabled(&self) -> bool {
        self.save_summaries.enabled
    }

    pub fn set_save_summaries(&mut self, on: bool) {
        self.save_summaries.enabled = on;
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging_settings.enabled
    }

    pub fn set_logging(&mut self, on: bool) {
        self.logging_settings.enabled = on;
    }

    pub fn enabled_probes(&self) -> Vec<ProbeKind> {
        ProbeKind::ALL
            .into_iter()
            .filter(|k| self.is_enabled(*k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.enabled_probes().is_empty());
        assert!(!s.notifications_enabled());
        assert!(!s.save_summaries_enabled());
        assert!(s.logging_enabled());
    }

    #[test]
    fn test_parses_settings_document() {
        let json = r#"{
            "test_preferences": {
                "Ping": "Enabled",
                "Traceroute": "Disabled",
                "Nslookup": "Enabled"
            },
            "notification_settings": { "enabled": true },
            "save_summaries": { "enabled": false },
            "logging_settings": { "enabled": true }
        }"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.enabled_probes(), vec![ProbeKind::Ping, ProbeKind::Nslookup]);
        assert!(s.notifications_enabled());
    }

    #[test]
    fn test_missing_sections_take_defaults() {
        let s: Settings = serde_json::from_str(r#"{"test_preferences": {"Speedtest": "Enabled"}}"#).unwrap();
        assert!(s.is_enabled(ProbeKind::Speedtest));
        assert!(s.logging_enabled());
        assert!(!s.notifications_enabled());
    }

    #[test]
    fn test_round_trip_preserves_enabled_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut s = Settings::default();
        s.set_enabled(ProbeKind::Ping, true);
        s.set_enabled(ProbeKind::DnsFlush, false);
        s.toggle(ProbeKind::Speedtest);
        s.set_notifications(true);
        s.set_save_summaries(true);
        s.set_logging(false);
        s.test_preferences
            .insert("Legacy Probe".to_string(), Toggle::Enabled);

        s.save(&path).unwrap();
        let reloaded = Settings::try_load(&path).unwrap();

        assert_eq!(reloaded, s);
        assert_eq!(reloaded.test_preferences.get("Legacy Probe"), Some(&Toggle::Enabled));
    }

    #[test]
    fn test_file_uses_enabled_disabled_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut s = Settings::default();
        s.set_enabled(ProbeKind::Netstat, true);
        s.set_enabled(ProbeKind::Ping, false);
        s.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["test_preferences"]["Netstat"], "Enabled");
        assert_eq!(raw["test_preferences"]["Ping"], "Disabled");
        assert_eq!(raw["logging_settings"]["enabled"], true);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::try_load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_corrupt_file_degrades_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Settings::try_load(&path), Err(StoreError::Parse { .. })));
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn test_unexpected_preference_value_only_disables_that_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{
                "test_preferences": { "Ping": "Enabled", "Netstat": "enabled", "Nslookup": true },
                "notification_settings": { "enabled": true },
                "save_summaries": { "enabled": true },
                "logging_settings": { "enabled": true }
            }"#,
        )
        .unwrap();

        let s = Settings::load(&path);
        assert_eq!(s.enabled_probes(), vec![ProbeKind::Ping]);
        assert!(s.notifications_enabled());
        assert!(s.save_summaries_enabled());

        // Odd values survive a save untouched.
        s.save(&path).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["test_preferences"]["Netstat"], "enabled");
        assert_eq!(raw["test_preferences"]["Nslookup"], true);
    }

    #[test]
    fn test_toggling_unrecognized_value_enables() {
        let mut s: Settings =
            serde_json::from_str(r#"{"test_preferences": {"Traceroute": "On"}}"#).unwrap();
        assert!(!s.is_enabled(ProbeKind::Traceroute));
        assert!(s.toggle(ProbeKind::Traceroute));
        assert_eq!(s.test_preferences["Traceroute"], Toggle::Enabled);
    }

    #[test]
    fn test_toggle_flips_state() {
        let mut s = Settings::default();
        assert!(s.toggle(ProbeKind::Traceroute));
        assert!(s.is_enabled(ProbeKind::Traceroute));
        assert!(!s.toggle(ProbeKind::Traceroute));
        assert!(!s.is_enabled(ProbeKind::Traceroute));
    }
}
