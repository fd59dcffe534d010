// src/config.rs
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use serde::Deserialize;
use crate::alarm::{AlarmPolicy, Tone};
use crate::drivers::serial::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
use crate::drivers::WINDOW_LEN;

/// Runtime settings. Every key is optional in the TOML file.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub tick_interval_ms: u64,
    pub window_len: usize,
    pub bpm_low: f64,
    pub bpm_high: f64,
    pub alarm_interval_secs: f64,
    pub tone_hz: u32,
    pub tone_ms: u64,
    pub export_dir: PathBuf,
    /// Samples per second produced by `--simulate`.
    pub simulate_rate_hz: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
            tick_interval_ms: 10,
            window_len: WINDOW_LEN,
            bpm_low: 40.0,
            bpm_high: 120.0,
            alarm_interval_secs: 3.0,
            tone_hz: 1000,
            tone_ms: 500,
            export_dir: PathBuf::from("."),
            simulate_rate_hz: 100.0,
        }
    }
}

impl MonitorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.window_len > 0, "window_len must be greater than zero");
        anyhow::ensure!(
            self.bpm_low < self.bpm_high,
            "bpm_low ({}) must be below bpm_high ({})",
            self.bpm_low,
            self.bpm_high
        );
        anyhow::ensure!(self.alarm_interval_secs >= 0.0, "alarm_interval_secs must not be negative");
        anyhow::ensure!(self.tick_interval_ms > 0, "tick_interval_ms must be greater than zero");
        Ok(())
    }

    pub fn alarm_policy(&self) -> AlarmPolicy {
        AlarmPolicy {
            bpm_low: self.bpm_low,
            bpm_high: self.bpm_high,
            interval_secs: self.alarm_interval_secs,
        }
    }

    pub fn tone(&self) -> Tone {
        Tone { freq_hz: self.tone_hz, duration: Duration::from_millis(self.tone_ms) }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = MonitorConfig::from_toml("").unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.window_len, 500);
    }

    #[test]
    fn overrides_selected_keys() {
        let config = MonitorConfig::from_toml(
            r#"
            port = "COM4"
            bpm_high = 150.0
            tone_ms = 200
            "#,
        )
        .unwrap();
        assert_eq!(config.port.as_deref(), Some("COM4"));
        assert_eq!(config.alarm_policy().bpm_high, 150.0);
        assert_eq!(config.alarm_policy().bpm_low, 40.0);
        assert_eq!(config.tone().duration, Duration::from_millis(200));
    }

    #[test]
    fn rejects_inverted_band() {
        assert!(MonitorConfig::from_toml("bpm_low = 130.0").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MonitorConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
