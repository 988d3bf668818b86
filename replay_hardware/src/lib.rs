//! MFC backends for the replay loop.
//!
//! - `SimulatedMfc`: first-order flow model, always available.
//! - `Sfc5xxx`: Sensirion SFC5xxx over SHDLC on any byte transport.
//! - `connect_sfc5xxx` (feature `hardware`): opens a serial TTY and configures
//!   the device for sccm.
pub mod error;
pub mod sfc5xxx;
pub mod shdlc;
pub mod sim;
#[cfg(feature = "hardware")]
pub mod tty;

pub use error::HwError;
pub use sfc5xxx::{DeviceInfo, MediumUnit, Scaling, Sfc5xxx};
pub use sim::{SimProbe, SimulatedMfc};

/// A real MFC attached to a serial TTY.
#[cfg(feature = "hardware")]
pub type HardwareMfc = Sfc5xxx<std::fs::File>;

/// Open `port`, configure sccm units, and log the device identity.
///
/// A device that fails configuration is dropped (its port closed) before the
/// error is returned.
#[cfg(feature = "hardware")]
pub fn connect_sfc5xxx(
    label: &str,
    port: &std::path::Path,
    baud_rate: u32,
    address: u8,
    read_timeout: std::time::Duration,
) -> error::Result<HardwareMfc> {
    tracing::info!(mfc = label, port = %port.display(), baud_rate, "connecting MFC");
    let file = tty::open_tty(port, baud_rate, read_timeout)?;
    let mut mfc = Sfc5xxx::new(label, file, address);
    mfc.configure_sccm()?;
    Ok(mfc)
}
