//! Test and helper mocks for replay_core.

use std::cell::RefCell;
use std::rc::Rc;

use replay_traits::Actuator;

#[derive(Debug, Clone, PartialEq)]
pub enum SpyCall {
    Set(&'static str, f64),
    Read(&'static str),
    Close(&'static str),
}

/// Call journal shared by any number of spies, in call order.
#[derive(Debug, Clone, Default)]
pub struct SpyLog(Rc<RefCell<Vec<SpyCall>>>);

impl SpyLog {
    pub fn calls(&self) -> Vec<SpyCall> {
        self.0.borrow().clone()
    }

    fn push(&self, c: SpyCall) {
        self.0.borrow_mut().push(c);
    }

    fn count(&self, f: impl Fn(&SpyCall) -> bool) -> usize {
        self.0.borrow().iter().filter(|c| f(c)).count()
    }

    /// Setpoints written to `label`, zeroing included.
    pub fn setpoints(&self, label: &str) -> Vec<f64> {
        self.0
            .borrow()
            .iter()
            .filter_map(|c| match c {
                SpyCall::Set(l, v) if *l == label => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn zeroed(&self, label: &str) -> usize {
        self.count(|c| matches!(c, SpyCall::Set(l, v) if *l == label && *v == 0.0))
    }

    pub fn closed(&self, label: &str) -> usize {
        self.count(|c| matches!(c, SpyCall::Close(l) if *l == label))
    }

    pub fn reads(&self, label: &str) -> usize {
        self.count(|c| matches!(c, SpyCall::Read(l) if *l == label))
    }
}

/// Records every call and echoes the last setpoint back as the measured
/// flow. Failures can be scripted per call.
#[derive(Debug)]
pub struct SpyActuator {
    label: &'static str,
    log: SpyLog,
    setpoint: f64,
    sets: usize,
    reads: usize,
    fail_set_at: Option<usize>,
    fail_on_set: Option<f64>,
    fail_read_at: Option<usize>,
    fail_close: bool,
}

impl SpyActuator {
    pub fn new(label: &'static str) -> (Self, SpyLog) {
        let log = SpyLog::default();
        (Self::sharing(label, &log), log)
    }

    pub fn sharing(label: &'static str, log: &SpyLog) -> Self {
        Self {
            label,
            log: log.clone(),
            setpoint: 0.0,
            sets: 0,
            reads: 0,
            fail_set_at: None,
            fail_on_set: None,
            fail_read_at: None,
            fail_close: false,
        }
    }

    /// Fail the `n`th `set_setpoint` (0-based).
    pub fn fail_set_at(mut self, n: usize) -> Self {
        self.fail_set_at = Some(n);
        self
    }

    /// Fail every `set_setpoint(value)`.
    pub fn fail_on_set(mut self, value: f64) -> Self {
        self.fail_on_set = Some(value);
        self
    }

    /// Fail the `n`th `read_measured_value` (0-based) with a timeout.
    pub fn fail_read_at(mut self, n: usize) -> Self {
        self.fail_read_at = Some(n);
        self
    }

    pub fn fail_on_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl Actuator for SpyActuator {
    fn set_setpoint(&mut self, value: f64) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.log.push(SpyCall::Set(self.label, value));
        let n = self.sets;
        self.sets += 1;
        if self.fail_set_at == Some(n) || self.fail_on_set == Some(value) {
            return Err(Box::new(std::io::Error::other(format!(
                "{} refused setpoint {value}",
                self.label
            ))));
        }
        self.setpoint = value;
        Ok(())
    }

    fn read_measured_value(&mut self) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        self.log.push(SpyCall::Read(self.label));
        let n = self.reads;
        self.reads += 1;
        if self.fail_read_at == Some(n) {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "read timeout",
            )));
        }
        Ok(self.setpoint)
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.log.push(SpyCall::Close(self.label));
        if self.fail_close {
            return Err(Box::new(std::io::Error::other("port busy")));
        }
        Ok(())
    }
}
