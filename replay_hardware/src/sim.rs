//! Simulated MFC with first-order flow response.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use replay_traits::{Actuator, Clock, MonotonicClock};
use tracing::debug;

use crate::error::HwError;

/// Shared view of a simulated MFC that stays readable after the MFC itself
/// has been moved into the replay loop.
#[derive(Debug, Clone, Default)]
pub struct SimProbe {
    setpoint: Rc<Cell<f64>>,
    writes: Rc<Cell<usize>>,
    closed: Rc<Cell<bool>>,
}

impl SimProbe {
    pub fn setpoint(&self) -> f64 {
        self.setpoint.get()
    }
    pub fn writes(&self) -> usize {
        self.writes.get()
    }
    pub fn closed(&self) -> bool {
        self.closed.get()
    }
}

/// Simulated MFC: measured flow relaxes toward the setpoint with time
/// constant `tau`.
pub struct SimulatedMfc<C: Clock = MonotonicClock> {
    label: String,
    clock: C,
    tau: Duration,
    ripple_sccm: f64,
    measured: f64,
    last_update: Instant,
    reads: u64,
    fail_at_write: Option<usize>,
    probe: SimProbe,
}

impl SimulatedMfc<MonotonicClock> {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_clock(label, MonotonicClock::new())
    }
}

impl<C: Clock> SimulatedMfc<C> {
    pub fn with_clock(label: impl Into<String>, clock: C) -> Self {
        let last_update = clock.now();
        Self {
            label: label.into(),
            clock,
            tau: Duration::ZERO,
            ripple_sccm: 0.0,
            measured: 0.0,
            last_update,
            reads: 0,
            fail_at_write: None,
            probe: SimProbe::default(),
        }
    }

    /// Response time constant; zero makes the flow follow the setpoint instantly.
    pub fn time_constant(mut self, tau: Duration) -> Self {
        self.tau = tau;
        self
    }

    /// Deterministic measurement ripple amplitude (sccm).
    pub fn ripple(mut self, sccm: f64) -> Self {
        self.ripple_sccm = sccm.max(0.0);
        self
    }

    /// Fail the `n`th `set_setpoint` call (0-based).
    pub fn fail_at_write(mut self, n: usize) -> Self {
        self.fail_at_write = Some(n);
        self
    }

    pub fn probe(&self) -> SimProbe {
        self.probe.clone()
    }

    fn settle(&mut self) {
        let now = self.clock.now();
        let dt = now.saturating_duration_since(self.last_update);
        self.last_update = now;
        let target = self.probe.setpoint.get();
        if self.tau.is_zero() {
            self.measured = target;
        } else {
            let alpha = 1.0 - (-dt.as_secs_f64() / self.tau.as_secs_f64()).exp();
            self.measured += (target - self.measured) * alpha;
        }
    }
}

impl<C: Clock> Actuator for SimulatedMfc<C> {
    fn set_setpoint(&mut self, value: f64) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.probe.closed.get() {
            return Err(Box::new(HwError::Closed));
        }
        let n = self.probe.writes.get();
        self.probe.writes.set(n + 1);
        if self.fail_at_write == Some(n) {
            return Err(Box::new(HwError::Injected(format!(
                "{} rejected write #{n}",
                self.label
            ))));
        }
        self.settle();
        self.probe.setpoint.set(value);
        debug!(mfc = %self.label, value, "simulated setpoint");
        Ok(())
    }

    fn read_measured_value(&mut self) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        if self.probe.closed.get() {
            return Err(Box::new(HwError::Closed));
        }
        self.settle();
        self.reads = self.reads.wrapping_add(1);
        let ripple = self.ripple_sccm * (self.reads as f64 * 0.7).sin();
        Ok((self.measured + ripple).max(0.0))
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.probe.closed.replace(true) {
            return Err(Box::new(HwError::Closed));
        }
        Ok(())
    }
}
