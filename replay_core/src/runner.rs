use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Local};
use replay_traits::{Actuator, Clock, MonotonicClock};

use crate::actuator_pair::{ActuatorPair, ShutdownFault};
use crate::compensator::Compensator;
use crate::config::{CompensatorCfg, PacingCfg};
use crate::error::{ReplayError, Result as CoreResult};
use crate::profile::{Profile, ProfileSchema};
use crate::replay_log::{ReplayLog, ReplayTick};
use crate::scheduler::{Pace, Pacer};

/// Everything the loop needs besides the profile and the MFCs.
#[derive(Clone)]
pub struct ReplayParams {
    pub compensator: CompensatorCfg,
    pub pacing: PacingCfg,
    pub schema: ProfileSchema,
    /// Raised by the operator (Ctrl-C) to stop before the next tick.
    pub cancel: Option<Arc<AtomicBool>>,
    pub clock: Arc<dyn Clock + Send + Sync>,
}

impl Default for ReplayParams {
    fn default() -> Self {
        Self {
            compensator: CompensatorCfg::default(),
            pacing: PacingCfg::default(),
            schema: ProfileSchema::default(),
            cancel: None,
            clock: Arc::new(MonotonicClock::new()),
        }
    }
}

impl std::fmt::Debug for ReplayParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayParams")
            .field("compensator", &self.compensator)
            .field("pacing", &self.pacing)
            .field("schema", &self.schema)
            .field("cancel", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub log: ReplayLog,
    /// Faults while zeroing/closing the MFCs after a successful run.
    pub shutdown_faults: Vec<ShutdownFault>,
}

/// Load `profile_source`, replay it on the two MFCs, release them, then
/// write the log to `output`.
///
/// Both MFCs are zeroed and closed exactly once on every exit path before
/// this returns, including a profile that cannot be loaded (no flow is
/// commanded in that case). The log is only written after a run that
/// completed.
pub fn replay<A1, A2>(
    profile_source: &Path,
    output: &Path,
    mfc1: A1,
    mfc2: A2,
    params: ReplayParams,
) -> CoreResult<ReplayOutcome>
where
    A1: Actuator,
    A2: Actuator,
{
    let pair = ActuatorPair::new(mfc1, mfc2);
    let profile = match Profile::from_path(profile_source, &params.schema) {
        Ok(p) => p,
        Err(e) => {
            let faults = pair.shutdown();
            tracing::error!(error = %e, shutdown_faults = faults.len(), "profile rejected");
            return Err(crate::error::Report::new(ReplayError::from(e)));
        }
    };
    let outcome = run(&profile, pair, &params)?;
    outcome.log.persist(output)?;
    Ok(outcome)
}

/// Drive `pair` through `profile`, then shut it down. Nothing is written to
/// disk.
pub fn run<A1, A2>(
    profile: &Profile,
    mut pair: ActuatorPair<A1, A2>,
    params: &ReplayParams,
) -> CoreResult<ReplayOutcome>
where
    A1: Actuator,
    A2: Actuator,
{
    let result = drive(profile, &mut pair, params);
    let shutdown_faults = pair.shutdown();
    match result {
        Ok(log) => {
            tracing::info!(
                ticks = log.len(),
                shutdown_faults = shutdown_faults.len(),
                "replay complete"
            );
            Ok(ReplayOutcome {
                log,
                shutdown_faults,
            })
        }
        Err(e) => {
            tracing::error!(error = %e, "replay aborted");
            Err(crate::error::Report::new(e))
        }
    }
}

fn drive<A1, A2>(
    profile: &Profile,
    pair: &mut ActuatorPair<A1, A2>,
    params: &ReplayParams,
) -> Result<ReplayLog, ReplayError>
where
    A1: Actuator,
    A2: Actuator,
{
    params
        .compensator
        .validate()
        .and_then(|()| params.pacing.validate())
        .map_err(|e| ReplayError::Config(e.to_string()))?;

    let rates = profile.rates();
    let compensator = Compensator::new(params.compensator);
    let pacer = Pacer::start(
        params.clock.clone(),
        params.pacing.abort_poll,
        params.cancel.clone(),
    );
    let mut log = ReplayLog::with_capacity(profile.len());

    tracing::info!(
        ticks = profile.len(),
        duration_s = profile.duration().as_secs_f64(),
        lookahead = params.compensator.lookahead_steps,
        "replay start"
    );

    for (i, sample) in profile.samples().iter().enumerate() {
        let Some(sp) = compensator.setpoint_at(&rates, i) else {
            break;
        };
        match pacer.wait_until(sample.elapsed) {
            Pace::Cancelled => return Err(ReplayError::Cancelled { tick: i }),
            Pace::Behind { lag } if !lag.is_zero() => {
                tracing::debug!(tick = i, lag_ms = lag.as_millis() as u64, "behind profile");
            }
            _ => {}
        }
        // Sampled at emission, after the wait and before the MFCs are commanded.
        let real_elapsed = pacer.real_elapsed();
        let timestamp = DateTime::<Local>::from(params.clock.wall_now());

        pair.apply(sp.mfc1, sp.mfc2)
            .map_err(|fault| ReplayError::Actuator { tick: i, fault })?;
        let (measured_mfc1, measured_mfc2) = pair
            .measure()
            .map_err(|fault| ReplayError::Actuator { tick: i, fault })?;

        tracing::debug!(
            tick = i,
            input = sp.raw_rate,
            predicted = sp.predicted_rate,
            compensated = sp.compensated,
            setpoint = sp.mfc1,
            measured = measured_mfc1 + measured_mfc2,
            "tick"
        );
        log.push(ReplayTick {
            index: i,
            timestamp,
            real_elapsed,
            profile_elapsed: sample.elapsed,
            input_rate: sp.raw_rate,
            compensated: sp.compensated,
            mfc1_setpoint: sp.mfc1,
            mfc2_setpoint: sp.mfc2,
            measured_mfc1,
            measured_mfc2,
        });
    }
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elapsed::ProfileElapsed;
    use crate::mocks::SpyActuator;
    use crate::profile::FlowSample;
    use replay_traits::clock::test_clock::TestClock;
    use std::time::Duration;

    fn profile(points: &[(u64, f64)]) -> Profile {
        Profile::from_samples(
            points
                .iter()
                .map(|&(ms, rate)| FlowSample {
                    elapsed: ProfileElapsed::new(Duration::from_millis(ms)),
                    rate,
                })
                .collect(),
        )
        .unwrap()
    }

    fn params(clock: &TestClock) -> ReplayParams {
        ReplayParams {
            clock: Arc::new(clock.clone()),
            ..ReplayParams::default()
        }
    }

    #[test]
    fn ticks_follow_profile_timeline() {
        let clock = TestClock::new();
        let (a, log) = SpyActuator::new("MFC1");
        let b = SpyActuator::sharing("MFC2", &log);
        let p = profile(&[(0, 100.0), (100, 100.0), (200, 4000.0)]);
        let out = run(&p, ActuatorPair::new(a, b), &params(&clock)).unwrap();

        assert_eq!(out.log.len(), 3);
        let real: Vec<Duration> = out.log.ticks().iter().map(|t| t.real_elapsed.as_duration()).collect();
        assert_eq!(real, vec![Duration::ZERO, Duration::from_millis(100), Duration::from_millis(200)]);
        let sent = log.setpoints("MFC1");
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0], 50.0);
        assert!((sent[1] - 2200.0).abs() < 1e-9);
        assert_eq!(&sent[2..], [2000.0, 0.0]);
        assert_eq!(log.closed("MFC2"), 1);
    }

    #[test]
    fn invalid_config_still_releases() {
        let clock = TestClock::new();
        let (a, log) = SpyActuator::new("MFC1");
        let b = SpyActuator::sharing("MFC2", &log);
        let mut params = params(&clock);
        params.compensator.max_rate = -1.0;
        let err = run(&profile(&[(0, 1.0)]), ActuatorPair::new(a, b), &params).unwrap_err();
        assert!(matches!(err.downcast_ref::<ReplayError>(), Some(ReplayError::Config(_))));
        assert_eq!(log.closed("MFC1"), 1);
        assert_eq!(log.setpoints("MFC1"), vec![0.0]);
    }
}
