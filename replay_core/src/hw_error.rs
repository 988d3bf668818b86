//! Maps `Box<dyn Error>` from the `Actuator` boundary to a typed fault.
//!
//! With the `hardware-errors` feature, `replay_hardware::HwError` is
//! downcast for precise classification; anything else falls back to a
//! string heuristic.

use crate::actuator_pair::{ActuatorFault, ActuatorId, ActuatorOp, FaultKind};

fn classify(e: &(dyn std::error::Error + 'static)) -> FaultKind {
    #[cfg(feature = "hardware-errors")]
    {
        use replay_hardware::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => FaultKind::Timeout,
                HwError::Device { .. } => FaultKind::Device,
                _ => FaultKind::Io,
            };
        }
    }

    if e.to_string().to_lowercase().contains("timeout") {
        FaultKind::Timeout
    } else {
        FaultKind::Io
    }
}

pub fn map_hw_error(
    actuator: ActuatorId,
    op: ActuatorOp,
    e: &(dyn std::error::Error + 'static),
) -> ActuatorFault {
    ActuatorFault {
        actuator,
        op,
        kind: classify(e),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_text_is_classified() {
        let e = std::io::Error::other("read timeout after 200ms");
        let f = map_hw_error(ActuatorId::Mfc2, ActuatorOp::ReadMeasured, &e);
        assert_eq!(f.kind, FaultKind::Timeout);
        assert_eq!(f.actuator, ActuatorId::Mfc2);
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hw_error_is_downcast() {
        let e = replay_hardware::HwError::Device { cmd: 0x00, code: 0x03 };
        let f = map_hw_error(ActuatorId::Mfc1, ActuatorOp::SetSetpoint, &e);
        assert_eq!(f.kind, FaultKind::Device);
        let f = map_hw_error(ActuatorId::Mfc1, ActuatorOp::SetSetpoint, &replay_hardware::HwError::Timeout);
        assert_eq!(f.kind, FaultKind::Timeout);
    }
}
