//! Type-state builder for a replay session.
//!
//! `build()` exists only once both MFCs and the profile are set;
//! `try_build()` is available in any state and reports what is missing.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use replay_traits::{Actuator, Clock};

use crate::actuator_pair::ActuatorPair;
use crate::config::{CompensatorCfg, PacingCfg};
use crate::error::{BuildError, Result};
use crate::profile::Profile;
use crate::runner::{self, ReplayOutcome, ReplayParams};

pub type BoxedPair = ActuatorPair<Box<dyn Actuator>, Box<dyn Actuator>>;

/// A profile bound to two MFCs, ready to run once.
pub struct ReplaySession {
    profile: Profile,
    pair: BoxedPair,
    params: ReplayParams,
}

impl core::fmt::Debug for ReplaySession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReplaySession")
            .field("ticks", &self.profile.len())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl ReplaySession {
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn params(&self) -> &ReplayParams {
        &self.params
    }

    /// Replay and release the MFCs; nothing is written to disk.
    pub fn run(self) -> Result<ReplayOutcome> {
        runner::run(&self.profile, self.pair, &self.params)
    }

    /// Replay, release the MFCs, then write the log to `output`.
    pub fn run_and_persist(self, output: &Path) -> Result<ReplayOutcome> {
        let outcome = self.run()?;
        outcome.log.persist(output)?;
        Ok(outcome)
    }
}

pub struct Replay;

impl Replay {
    pub fn builder() -> ReplayBuilder<Missing, Missing, Missing> {
        ReplayBuilder::default()
    }
}

pub struct Missing;
pub struct Set;

pub struct ReplayBuilder<M1, M2, P> {
    mfc1: Option<Box<dyn Actuator>>,
    mfc2: Option<Box<dyn Actuator>>,
    profile: Option<Profile>,
    compensator: CompensatorCfg,
    pacing: PacingCfg,
    cancel: Option<Arc<AtomicBool>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    _state: PhantomData<(M1, M2, P)>,
}

impl Default for ReplayBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            mfc1: None,
            mfc2: None,
            profile: None,
            compensator: CompensatorCfg::default(),
            pacing: PacingCfg::default(),
            cancel: None,
            clock: None,
            _state: PhantomData,
        }
    }
}

impl<M1, M2, P> ReplayBuilder<M1, M2, P> {
    fn retype<N1, N2, Q>(self) -> ReplayBuilder<N1, N2, Q> {
        ReplayBuilder {
            mfc1: self.mfc1,
            mfc2: self.mfc2,
            profile: self.profile,
            compensator: self.compensator,
            pacing: self.pacing,
            cancel: self.cancel,
            clock: self.clock,
            _state: PhantomData,
        }
    }

    pub fn with_compensator(mut self, cfg: CompensatorCfg) -> Self {
        self.compensator = cfg;
        self
    }

    pub fn with_lookahead(mut self, steps: usize) -> Self {
        self.compensator.lookahead_steps = steps;
        self
    }

    pub fn with_overshoot(mut self, threshold: f64, factor: f64) -> Self {
        self.compensator.overshoot_threshold = threshold;
        self.compensator.overshoot_factor = factor;
        self
    }

    pub fn with_max_rate(mut self, max_rate: f64) -> Self {
        self.compensator.max_rate = max_rate;
        self
    }

    pub fn with_abort_poll(mut self, poll: Duration) -> Self {
        self.pacing.abort_poll = poll;
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Fallible build available in any type-state. Once both MFCs are
    /// present, a failed build still zeroes and closes them.
    pub fn try_build(self) -> Result<ReplaySession> {
        let pair = match (self.mfc1, self.mfc2) {
            (Some(mfc1), Some(mfc2)) => ActuatorPair::new(mfc1, mfc2),
            (None, _) => return Err(eyre::Report::new(BuildError::MissingMfc1)),
            (_, None) => return Err(eyre::Report::new(BuildError::MissingMfc2)),
        };
        let checked = self
            .compensator
            .validate()
            .and_then(|()| self.pacing.validate())
            .and_then(|()| self.profile.ok_or(BuildError::MissingProfile));
        let profile = match checked {
            Ok(p) => p,
            Err(e) => {
                let _ = pair.shutdown();
                return Err(eyre::Report::new(e));
            }
        };

        let mut params = ReplayParams {
            compensator: self.compensator,
            pacing: self.pacing,
            cancel: self.cancel,
            ..ReplayParams::default()
        };
        if let Some(clock) = self.clock {
            params.clock = Arc::from(clock);
        }
        Ok(ReplaySession {
            profile,
            pair,
            params,
        })
    }
}

impl<M2, P> ReplayBuilder<Missing, M2, P> {
    pub fn with_mfc1(mut self, mfc: impl Actuator + 'static) -> ReplayBuilder<Set, M2, P> {
        self.mfc1 = Some(Box::new(mfc));
        self.retype()
    }
}

impl<M1, P> ReplayBuilder<M1, Missing, P> {
    pub fn with_mfc2(mut self, mfc: impl Actuator + 'static) -> ReplayBuilder<M1, Set, P> {
        self.mfc2 = Some(Box::new(mfc));
        self.retype()
    }
}

impl<M1, M2> ReplayBuilder<M1, M2, Missing> {
    pub fn with_profile(mut self, profile: Profile) -> ReplayBuilder<M1, M2, Set> {
        self.profile = Some(profile);
        self.retype()
    }
}

impl ReplayBuilder<Set, Set, Set> {
    pub fn build(self) -> Result<ReplaySession> {
        self.try_build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::SpyActuator;

    #[test]
    fn try_build_reports_missing_mfc2() {
        let (a, _log) = SpyActuator::new("MFC1");
        let err = Replay::builder()
            .with_mfc1(a)
            .with_profile(Profile::default())
            .try_build()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::MissingMfc2)
        ));
    }

    #[test]
    fn rejected_config_releases_mfcs_without_flow() {
        let (a, log) = SpyActuator::new("MFC1");
        let b = SpyActuator::sharing("MFC2", &log);
        let err = Replay::builder()
            .with_mfc1(a)
            .with_mfc2(b)
            .with_profile(Profile::default())
            .with_overshoot(500.0, -1.0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("overshoot_factor"));
        assert_eq!(log.setpoints("MFC1"), vec![0.0]);
        assert_eq!(log.setpoints("MFC2"), vec![0.0]);
        assert_eq!(log.closed("MFC1"), 1);
        assert_eq!(log.closed("MFC2"), 1);
    }

    #[test]
    fn unused_session_still_releases_mfcs() {
        let (a, log) = SpyActuator::new("MFC1");
        let b = SpyActuator::sharing("MFC2", &log);
        let session = Replay::builder()
            .with_mfc1(a)
            .with_mfc2(b)
            .with_profile(Profile::default())
            .build()
            .unwrap();
        drop(session);
        assert_eq!(log.zeroed("MFC1"), 1);
        assert_eq!(log.closed("MFC2"), 1);
    }
}
