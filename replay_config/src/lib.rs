#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the flow replay system.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section is optional; defaults reproduce the bench setup
//!   (two SFC5xxx MFCs at 115200 baud, lookahead 1, threshold 500 sccm,
//!   factor 1.1, 20000 sccm ceiling).
use serde::Deserialize;
use std::path::Path;

/// Default flow-rate column written by the flow-meter recorder.
pub const DEFAULT_RATE_COLUMN: &str = "Measured_Flow_Rate_FM(sccm)";
/// Default timestamp column written by the flow-meter recorder.
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "Timestamp";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Devices {
    pub mfc1_port: String,
    pub mfc2_port: String,
    pub baud_rate: u32,
    /// SHDLC slave address of each MFC.
    pub slave_address: u8,
    /// Max wait for an SHDLC response frame (ms).
    pub read_timeout_ms: u64,
    /// Attempts to open and configure both MFCs before giving up.
    pub init_retries: u32,
    /// Pause between initialisation attempts (ms).
    pub init_retry_delay_ms: u64,
}

impl Default for Devices {
    fn default() -> Self {
        Self {
            mfc1_port: "/dev/ttyUSB0".to_string(),
            mfc2_port: "/dev/ttyUSB1".to_string(),
            baud_rate: 115_200,
            slave_address: 0,
            read_timeout_ms: 200,
            init_retries: 3,
            init_retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReplayCfg {
    /// How many samples ahead the compensator looks (0 disables lookahead).
    pub lookahead_steps: usize,
    /// Step size (sccm) above which the setpoint is overdriven.
    pub overshoot_threshold: f64,
    /// Multiplier applied to the predicted rate on a large step.
    pub overshoot_factor: f64,
    /// Ceiling (sccm) applied to the current target rate.
    pub max_rate: f64,
    /// Longest uninterrupted slice of a pacing wait (ms); bounds abort latency.
    pub abort_poll_ms: u64,
}

impl Default for ReplayCfg {
    fn default() -> Self {
        Self {
            lookahead_steps: 1,
            overshoot_threshold: 500.0,
            overshoot_factor: 1.1,
            max_rate: 20_000.0,
            abort_poll_ms: 20,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProfileCfg {
    pub rate_column: String,
    pub timestamp_column: String,
}

impl Default for ProfileCfg {
    fn default() -> Self {
        Self {
            rate_column: DEFAULT_RATE_COLUMN.to_string(),
            timestamp_column: DEFAULT_TIMESTAMP_COLUMN.to_string(),
        }
    }
}

/// Parameters of the simulated MFC backend (used when built without `hardware`).
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationCfg {
    /// First-order response time constant (ms); 0 means the flow follows instantly.
    pub time_constant_ms: u64,
    /// Peak amplitude of deterministic measurement ripple (sccm).
    pub noise_sccm: f64,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            time_constant_ms: 150,
            noise_sccm: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub devices: Devices,
    pub replay: ReplayCfg,
    pub profile: ProfileCfg,
    pub simulation: SimulationCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse, and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration: {e}"))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Devices
        if self.devices.mfc1_port.trim().is_empty() || self.devices.mfc2_port.trim().is_empty() {
            eyre::bail!("devices.mfc1_port and devices.mfc2_port must be set");
        }
        if self.devices.mfc1_port == self.devices.mfc2_port {
            eyre::bail!("devices.mfc1_port and devices.mfc2_port must differ");
        }
        if self.devices.baud_rate == 0 {
            eyre::bail!("devices.baud_rate must be > 0");
        }
        if self.devices.read_timeout_ms == 0 {
            eyre::bail!("devices.read_timeout_ms must be >= 1");
        }
        if self.devices.init_retries == 0 {
            eyre::bail!("devices.init_retries must be >= 1");
        }

        // Replay
        if !self.replay.overshoot_threshold.is_finite() || self.replay.overshoot_threshold < 0.0 {
            eyre::bail!("replay.overshoot_threshold must be a finite value >= 0");
        }
        if !self.replay.overshoot_factor.is_finite() || self.replay.overshoot_factor <= 0.0 {
            eyre::bail!("replay.overshoot_factor must be a finite value > 0");
        }
        if !self.replay.max_rate.is_finite() || self.replay.max_rate <= 0.0 {
            eyre::bail!("replay.max_rate must be a finite value > 0");
        }
        if self.replay.abort_poll_ms == 0 {
            eyre::bail!("replay.abort_poll_ms must be >= 1");
        }

        // Profile
        if self.profile.rate_column.trim().is_empty() {
            eyre::bail!("profile.rate_column must not be empty");
        }
        if self.profile.timestamp_column.trim().is_empty() {
            eyre::bail!("profile.timestamp_column must not be empty");
        }
        if self.profile.rate_column == self.profile.timestamp_column {
            eyre::bail!("profile.rate_column and profile.timestamp_column must differ");
        }

        // Simulation
        if !self.simulation.noise_sccm.is_finite() || self.simulation.noise_sccm < 0.0 {
            eyre::bail!("simulation.noise_sccm must be a finite value >= 0");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot:?}");
        }

        Ok(())
    }
}
