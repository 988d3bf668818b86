//! `From` implementations bridging `replay_config` types to `replay_core` types.

use std::time::Duration;

use crate::config::{CompensatorCfg, PacingCfg};
use crate::profile::ProfileSchema;

impl From<&replay_config::ReplayCfg> for CompensatorCfg {
    fn from(c: &replay_config::ReplayCfg) -> Self {
        Self {
            lookahead_steps: c.lookahead_steps,
            overshoot_threshold: c.overshoot_threshold,
            overshoot_factor: c.overshoot_factor,
            max_rate: c.max_rate,
        }
    }
}

impl From<&replay_config::ReplayCfg> for PacingCfg {
    fn from(c: &replay_config::ReplayCfg) -> Self {
        Self {
            abort_poll: Duration::from_millis(c.abort_poll_ms),
        }
    }
}

impl From<&replay_config::ProfileCfg> for ProfileSchema {
    fn from(c: &replay_config::ProfileCfg) -> Self {
        Self {
            rate_column: c.rate_column.clone(),
            timestamp_column: c.timestamp_column.clone(),
        }
    }
}
