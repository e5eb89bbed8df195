//! Configuration for the VNA middle layer.
//!
//! Settings are loaded from a TOML file with environment-variable overrides
//! via [`figment`], following the same layered-configuration approach the
//! teacher crate uses for its `Settings::load_v5`: struct defaults as the
//! base layer, a TOML file on top, environment variables (`VNA_*`) on top
//! of that. [`Settings::validate`] then checks the loaded values before the
//! binary wires up the switch driver, RPC client, and dispatcher.
//!
//! ## Schema
//!
//! - `log_level`: logging verbosity (`error`/`warn`/`info`/`debug`/`trace`).
//! - `switch`: serial port path, baud rate, and the switch protocol's two
//!   drain timeouts.
//! - `rpc`: the calibration gRPC endpoint address.
//! - `relay`: the WebSocket relay topic URL (stored for the external relay
//!   adapter to read; this crate does not open the socket itself).
//! - `timeouts`: `timeout_usb` (per-read on the serial port) and
//!   `timeout_request` (per dispatched request, per spec §5).

use crate::validation::{is_in_range, is_not_empty, is_valid_port};
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment, Provider,
};
use serde::{Deserialize, Serialize};

impl Provider for Settings {
    fn metadata(&self) -> figment::Metadata {
        figment::Metadata::named("VNA Middle Layer Defaults")
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        Serialized::defaults(Settings::default()).data()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    pub switch: SwitchSettings,
    pub rpc: RpcSettings,
    pub relay: RelaySettings,
    pub timeouts: TimeoutSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            switch: SwitchSettings::default(),
            rpc: RpcSettings::default(),
            relay: RelaySettings::default(),
            timeouts: TimeoutSettings::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SwitchSettings {
    /// Serial device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    pub baud: u32,
    /// Pre-send drain timeout (spec §4.1 step 1), milliseconds.
    pub drain_timeout_ms: u64,
    /// Post-reply drain timeout (spec §4.1 step 4), milliseconds.
    pub reply_drain_timeout_ms: u64,
}

impl Default for SwitchSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: 57_600,
            drain_timeout_ms: 10,
            reply_drain_timeout_ms: 100,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RpcSettings {
    /// Address of the calibration gRPC server, e.g. `http://127.0.0.1:50061`.
    pub endpoint: String,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:50061".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RelaySettings {
    /// WebSocket relay topic URL. Read by the external relay adapter; not
    /// opened by this crate (spec §1 non-goals).
    pub topic_url: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            topic_url: "ws://127.0.0.1:8080/vna".to_string(),
        }
    }
}

/// Timeout configuration for the middle layer (spec §5).
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Per-read timeout on the serial port outside the drain phases
    /// (milliseconds).
    pub timeout_usb_ms: u64,
    /// Per-request deadline enforced by the dispatcher (milliseconds).
    pub timeout_request_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            timeout_usb_ms: 500,
            timeout_request_ms: 5_000,
        }
    }
}

impl TimeoutSettings {
    pub fn validate(&self) -> Result<()> {
        validate_timeout_range(self.timeout_usb_ms, 10, 30_000, "timeout_usb_ms")?;
        validate_timeout_range(self.timeout_request_ms, 10, 120_000, "timeout_request_ms")?;
        Ok(())
    }

    pub fn timeout_usb(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_usb_ms)
    }

    pub fn timeout_request(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_request_ms)
    }
}

fn validate_timeout_range(value: u64, min: u64, max: u64, name: &str) -> Result<()> {
    if value < min || value > max {
        anyhow::bail!(
            "timeout '{}' = {}ms is out of valid range ({}ms - {}ms)",
            name,
            value,
            min,
            max
        );
    }
    Ok(())
}

impl Settings {
    /// Load settings from `path` (if given) layered over defaults, with
    /// `VNA_`-prefixed environment variables taking final precedence.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut figment = Figment::from(Settings::default());
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("VNA_").split("_"));

        let settings: Settings = figment
            .extract()
            .context("failed to assemble configuration from defaults/file/environment")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        is_not_empty(&self.log_level)
            .map_err(anyhow::Error::msg)
            .context("log_level cannot be empty")?;
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            anyhow::bail!("invalid log level: {}", self.log_level);
        }

        is_not_empty(&self.switch.port)
            .map_err(anyhow::Error::msg)
            .context("switch.port cannot be empty")?;
        is_in_range(self.switch.baud, 300..=4_000_000)
            .map_err(anyhow::Error::msg)
            .context("switch.baud out of range")?;

        is_not_empty(&self.rpc.endpoint)
            .map_err(anyhow::Error::msg)
            .context("rpc.endpoint cannot be empty")?;

        if let Some(port) = parse_port_from_endpoint(&self.rpc.endpoint) {
            is_valid_port(port)
                .map_err(anyhow::Error::msg)
                .context("rpc.endpoint has an invalid port")?;
        }

        self.timeouts.validate().context("invalid timeouts")?;

        Ok(())
    }
}

fn parse_port_from_endpoint(endpoint: &str) -> Option<u16> {
    endpoint.rsplit(':').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn empty_log_level_fails() {
        let mut settings = Settings::default();
        settings.log_level = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn invalid_log_level_fails() {
        let mut settings = Settings::default();
        settings.log_level = "verbose".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn drain_timeout_defaults_match_spec() {
        let settings = SwitchSettings::default();
        assert_eq!(settings.drain_timeout_ms, 10);
        assert_eq!(settings.reply_drain_timeout_ms, 100);
    }

    #[test]
    fn timeout_out_of_range_fails() {
        let mut timeouts = TimeoutSettings::default();
        timeouts.timeout_usb_ms = 1;
        assert!(timeouts.validate().is_err());
    }

    #[test]
    fn load_with_toml_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vna.toml");
        std::fs::write(
            &path,
            r#"
            log_level = "debug"

            [switch]
            port = "/dev/ttyUSB3"
            baud = 115200

            [timeouts]
            timeout_request_ms = 50
            "#,
        )
        .unwrap();

        let settings = Settings::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.switch.port, "/dev/ttyUSB3");
        assert_eq!(settings.switch.baud, 115200);
        assert_eq!(settings.timeouts.timeout_request_ms, 50);
        // untouched fields keep their defaults
        assert_eq!(settings.rpc.endpoint, RpcSettings::default().endpoint);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.log_level, "info");
    }
}
