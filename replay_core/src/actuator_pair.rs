//! The two MFCs driven in lockstep, with guaranteed release.

use std::fmt;

use replay_traits::Actuator;
use thiserror::Error;
use tracing::{debug, warn};

use crate::hw_error::map_hw_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorId {
    Mfc1,
    Mfc2,
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActuatorId::Mfc1 => "MFC1",
            ActuatorId::Mfc2 => "MFC2",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorOp {
    SetSetpoint,
    ReadMeasured,
    Zero,
    Close,
}

impl fmt::Display for ActuatorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActuatorOp::SetSetpoint => "set setpoint",
            ActuatorOp::ReadMeasured => "read measured value",
            ActuatorOp::Zero => "zero setpoint",
            ActuatorOp::Close => "close",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Timeout,
    /// The device answered with an error state.
    Device,
    Io,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{actuator} {op} failed: {message}")]
pub struct ActuatorFault {
    pub actuator: ActuatorId,
    pub op: ActuatorOp,
    pub kind: FaultKind,
    pub message: String,
}

/// A fault raised while zeroing or closing; reported, never propagated.
pub type ShutdownFault = ActuatorFault;

/// Owns both MFCs for the duration of a replay.
///
/// `shutdown` zeroes then closes each MFC and consumes the pair, so it can
/// run only once. A pair dropped without `shutdown` (early return, panic
/// unwind) performs the same release from `Drop`.
pub struct ActuatorPair<A1: Actuator, A2: Actuator> {
    mfc1: A1,
    mfc2: A2,
    released: bool,
}

fn call<T>(
    id: ActuatorId,
    op: ActuatorOp,
    r: Result<T, Box<dyn std::error::Error + Send + Sync>>,
) -> Result<T, ActuatorFault> {
    r.map_err(|e| map_hw_error(id, op, &*e))
}

impl<A1: Actuator, A2: Actuator> ActuatorPair<A1, A2> {
    pub fn new(mfc1: A1, mfc2: A2) -> Self {
        Self {
            mfc1,
            mfc2,
            released: false,
        }
    }

    /// Command both setpoints, MFC1 first.
    pub fn apply(&mut self, mfc1: f64, mfc2: f64) -> Result<(), ActuatorFault> {
        call(ActuatorId::Mfc1, ActuatorOp::SetSetpoint, self.mfc1.set_setpoint(mfc1))?;
        call(ActuatorId::Mfc2, ActuatorOp::SetSetpoint, self.mfc2.set_setpoint(mfc2))
    }

    /// Read both measured flows, MFC1 first.
    pub fn measure(&mut self) -> Result<(f64, f64), ActuatorFault> {
        let m1 = call(
            ActuatorId::Mfc1,
            ActuatorOp::ReadMeasured,
            self.mfc1.read_measured_value(),
        )?;
        let m2 = call(
            ActuatorId::Mfc2,
            ActuatorOp::ReadMeasured,
            self.mfc2.read_measured_value(),
        )?;
        Ok((m1, m2))
    }

    pub fn shutdown(mut self) -> Vec<ShutdownFault> {
        self.release()
    }

    fn release(&mut self) -> Vec<ShutdownFault> {
        if self.released {
            return Vec::new();
        }
        self.released = true;
        let mut faults = Vec::new();
        release_one(ActuatorId::Mfc1, &mut self.mfc1, &mut faults);
        release_one(ActuatorId::Mfc2, &mut self.mfc2, &mut faults);
        for f in &faults {
            warn!(error = %f, "fault during MFC shutdown");
        }
        debug!(faults = faults.len(), "MFCs released");
        faults
    }
}

/// Zero and close one MFC. A failed zero does not skip the close.
fn release_one<A: Actuator>(id: ActuatorId, mfc: &mut A, faults: &mut Vec<ShutdownFault>) {
    if let Err(f) = call(id, ActuatorOp::Zero, mfc.set_setpoint(0.0)) {
        faults.push(f);
    }
    if let Err(f) = call(id, ActuatorOp::Close, mfc.close()) {
        faults.push(f);
    }
}

impl<A1: Actuator, A2: Actuator> Drop for ActuatorPair<A1, A2> {
    fn drop(&mut self) {
        if !self.released {
            warn!("actuator pair dropped without shutdown; zeroing MFCs");
            let _ = self.release();
        }
    }
}
