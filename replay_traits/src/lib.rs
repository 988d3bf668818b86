pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// One mass-flow actuator (MFC) as seen by the replay loop.
///
/// Setpoints and measured values are in the device's configured flow unit
/// (sccm for the Sensirion SFC5xxx setup used by the CLI).
pub trait Actuator {
    fn set_setpoint(&mut self, value: f64) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn read_measured_value(&mut self) -> Result<f64, Box<dyn std::error::Error + Send + Sync>>;
    /// Release the underlying transport. Called once, after the setpoint was zeroed.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn set_setpoint(&mut self, value: f64) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_setpoint(value)
    }
    fn read_measured_value(&mut self) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_measured_value()
    }
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).close()
    }
}
