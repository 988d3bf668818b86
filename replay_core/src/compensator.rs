//! Lookahead setpoint compensation.
//!
//! Each tick commands the rate `lookahead_steps` samples ahead instead of the
//! current one, to cover the MFC response delay. When the upcoming step is
//! large the command is boosted by `overshoot_factor`. The combined command
//! is split evenly across the two MFCs.

use crate::config::CompensatorCfg;

/// Clamp a requested rate into the physical range of one MFC.
#[inline]
pub fn clamp_rate(rate: f64, max_rate: f64) -> f64 {
    rate.clamp(0.0, max_rate)
}

/// Output of the compensator for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Setpoint {
    /// Profile rate as recorded, before clamping.
    pub raw_rate: f64,
    /// `raw_rate` clamped to `[0, max_rate]`.
    pub current_rate: f64,
    pub predicted_rate: f64,
    pub compensated: bool,
    pub total: f64,
    pub mfc1: f64,
    pub mfc2: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Compensator {
    cfg: CompensatorCfg,
}

impl Compensator {
    pub fn new(cfg: CompensatorCfg) -> Self {
        Self { cfg }
    }

    pub fn cfg(&self) -> &CompensatorCfg {
        &self.cfg
    }

    /// Combine the current rate with an optional lookahead sample.
    ///
    /// Without a lookahead sample the predicted rate is the clamped current
    /// rate, so the final ticks of a profile are never boosted. A lookahead
    /// sample is taken as recorded.
    pub fn setpoint(&self, raw_rate: f64, lookahead: Option<f64>) -> Setpoint {
        let current_rate = clamp_rate(raw_rate, self.cfg.max_rate);
        let predicted_rate = lookahead.unwrap_or(current_rate);
        let compensated = (predicted_rate - current_rate).abs() > self.cfg.overshoot_threshold;
        let total = if compensated {
            predicted_rate * self.cfg.overshoot_factor
        } else {
            predicted_rate
        };
        let half = total / 2.0;
        Setpoint {
            raw_rate,
            current_rate,
            predicted_rate,
            compensated,
            total,
            mfc1: half,
            mfc2: half,
        }
    }

    /// Setpoint for tick `i` of `rates`; `None` past the end.
    pub fn setpoint_at(&self, rates: &[f64], i: usize) -> Option<Setpoint> {
        let raw = *rates.get(i)?;
        let lookahead = match self.cfg.lookahead_steps {
            0 => None,
            l => i.checked_add(l).and_then(|j| rates.get(j)).copied(),
        };
        Some(self.setpoint(raw, lookahead))
    }

    /// Setpoints for a whole series.
    pub fn plan(&self, rates: &[f64]) -> Vec<Setpoint> {
        (0..rates.len())
            .filter_map(|i| self.setpoint_at(rates, i))
            .collect()
    }
}
