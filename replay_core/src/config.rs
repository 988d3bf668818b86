//! Runtime configuration for the replay loop.
//!
//! Separate from the TOML-deserialized config in `replay_config`; see
//! `conversions` for the bridge.

use std::time::Duration;

use crate::error::BuildError;

pub const DEFAULT_LOOKAHEAD_STEPS: usize = 1;
pub const DEFAULT_OVERSHOOT_THRESHOLD: f64 = 500.0;
pub const DEFAULT_OVERSHOOT_FACTOR: f64 = 1.1;
/// Full scale of one SFC5xxx in sccm.
pub const DEFAULT_MAX_RATE: f64 = 20_000.0;
pub const DEFAULT_ABORT_POLL: Duration = Duration::from_millis(20);

/// Setpoint compensation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompensatorCfg {
    /// Samples to look ahead; 0 disables prediction.
    pub lookahead_steps: usize,
    /// A jump strictly larger than this (sccm) triggers compensation.
    pub overshoot_threshold: f64,
    /// Multiplier applied to the predicted rate on a large jump.
    pub overshoot_factor: f64,
    /// Current rates are clamped into `[0, max_rate]`.
    pub max_rate: f64,
}

impl Default for CompensatorCfg {
    fn default() -> Self {
        Self {
            lookahead_steps: DEFAULT_LOOKAHEAD_STEPS,
            overshoot_threshold: DEFAULT_OVERSHOOT_THRESHOLD,
            overshoot_factor: DEFAULT_OVERSHOOT_FACTOR,
            max_rate: DEFAULT_MAX_RATE,
        }
    }
}

impl CompensatorCfg {
    pub fn validate(&self) -> Result<(), BuildError> {
        if !self.overshoot_threshold.is_finite() || self.overshoot_threshold < 0.0 {
            return Err(BuildError::InvalidConfig(
                "overshoot_threshold must be finite and >= 0",
            ));
        }
        if !self.overshoot_factor.is_finite() || self.overshoot_factor <= 0.0 {
            return Err(BuildError::InvalidConfig(
                "overshoot_factor must be finite and > 0",
            ));
        }
        if !self.max_rate.is_finite() || self.max_rate <= 0.0 {
            return Err(BuildError::InvalidConfig("max_rate must be finite and > 0"));
        }
        Ok(())
    }
}

/// Pacing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingCfg {
    /// Longest uninterrupted sleep; bounds cancellation latency.
    pub abort_poll: Duration,
}

impl Default for PacingCfg {
    fn default() -> Self {
        Self {
            abort_poll: DEFAULT_ABORT_POLL,
        }
    }
}

impl PacingCfg {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.abort_poll.is_zero() {
            return Err(BuildError::InvalidConfig("abort_poll must be > 0"));
        }
        Ok(())
    }
}
