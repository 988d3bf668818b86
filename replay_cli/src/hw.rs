//! MFC assembly: real SFC5xxx devices with `hardware`, simulated otherwise.

use replay_traits::Actuator;

pub type Mfc = Box<dyn Actuator>;

#[cfg(feature = "hardware")]
pub fn make_mfcs(cfg: &replay_config::Config) -> eyre::Result<(Mfc, Mfc)> {
    let mfc1 = connect_with_retry("MFC1", &cfg.devices.mfc1_port, &cfg.devices)?;
    // MFC1 is dropped (port closed) if MFC2 cannot be brought up.
    let mfc2 = connect_with_retry("MFC2", &cfg.devices.mfc2_port, &cfg.devices)?;
    Ok((Box::new(mfc1), Box::new(mfc2)))
}

#[cfg(feature = "hardware")]
fn connect_with_retry(
    label: &str,
    port: &str,
    dev: &replay_config::Devices,
) -> eyre::Result<replay_hardware::HardwareMfc> {
    use eyre::WrapErr;
    use std::time::Duration;

    let attempts = dev.init_retries.max(1);
    let mut last = None;
    for attempt in 1..=attempts {
        match replay_hardware::connect_sfc5xxx(
            label,
            std::path::Path::new(port),
            dev.baud_rate,
            dev.slave_address,
            Duration::from_millis(dev.read_timeout_ms),
        ) {
            Ok(mfc) => return Ok(mfc),
            Err(e) => {
                tracing::warn!(mfc = label, port, attempt, attempts, error = %e, "MFC init failed");
                last = Some(e);
                if attempt < attempts {
                    std::thread::sleep(Duration::from_millis(dev.init_retry_delay_ms));
                }
            }
        }
    }
    let err = last.unwrap_or(replay_hardware::HwError::Timeout);
    Err(eyre::Report::new(err))
        .wrap_err_with(|| format!("open {label} on {port}: gave up after {attempts} attempts"))
}

#[cfg(not(feature = "hardware"))]
pub fn make_mfcs(cfg: &replay_config::Config) -> eyre::Result<(Mfc, Mfc)> {
    use replay_hardware::SimulatedMfc;
    use std::time::Duration;

    let tau = Duration::from_millis(cfg.simulation.time_constant_ms);
    let mut mfc1 = SimulatedMfc::new("MFC1")
        .time_constant(tau)
        .ripple(cfg.simulation.noise_sccm);
    let mfc2 = SimulatedMfc::new("MFC2")
        .time_constant(tau)
        .ripple(cfg.simulation.noise_sccm);
    // Test hook: make MFC1 reject its nth write.
    if let Some(n) = std::env::var("FLOWREPLAY_TEST_FAIL_AT")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
    {
        mfc1 = mfc1.fail_at_write(n);
    }
    tracing::info!(tau_ms = cfg.simulation.time_constant_ms, "using simulated MFCs");
    Ok((Box::new(mfc1), Box::new(mfc2)))
}
