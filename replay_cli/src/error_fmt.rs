//! Human-readable error descriptions and structured JSON error formatting.

use replay_core::error::{BuildError, ProfileError, ReplayError};
use replay_core::{ActuatorId, FaultKind};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(re) = err.downcast_ref::<ReplayError>() {
        return match re {
            ReplayError::Profile(pe) => humanize_profile(pe),
            ReplayError::Actuator { tick, fault } => {
                let hint = match fault.kind {
                    FaultKind::Timeout => "Check the serial cable and power of the MFC, and consider raising devices.read_timeout_ms.",
                    FaultKind::Device => "Check the MFC status (gas supply, error LED) and that the setpoint is within its range.",
                    FaultKind::Io => "Check that the serial port is still present and not used by another process.",
                };
                let port = match fault.actuator {
                    ActuatorId::Mfc1 => "devices.mfc1_port",
                    ActuatorId::Mfc2 => "devices.mfc2_port",
                };
                format!(
                    "What happened: {} failed to {} at tick {tick} ({}). Both MFCs were set to zero.\nLikely causes: Loose cable, device fault, or wrong {port}.\nHow to fix: {hint}",
                    fault.actuator, fault.op, fault.message
                )
            }
            ReplayError::Persistence { path, message } => format!(
                "What happened: The replay finished but the log could not be written to {} ({message}).\nLikely causes: Missing directory, read-only filesystem, or full disk.\nHow to fix: Pass a writable --output path and rerun.",
                path.display()
            ),
            ReplayError::Cancelled { tick } => format!(
                "What happened: Replay cancelled by operator before tick {tick}. Both MFCs were set to zero and no log was written.\nLikely causes: Ctrl-C.\nHow to fix: Rerun when ready."
            ),
            ReplayError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML or on the command line.\nHow to fix: Edit the config file or flags, then rerun."
            ),
        };
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return format!(
            "What happened: Replay could not be assembled ({be}).\nLikely causes: An MFC failed to initialize or a parameter is out of range.\nHow to fix: Check the log output above and the [replay] section of the config."
        );
    }

    // String-based heuristics for errors coming from device init
    let msg = err.to_string();
    let lower = format!("{err:#}").to_ascii_lowercase();

    if lower.contains("serial port error") || lower.contains("gave up after") {
        return format!(
            "What happened: Could not open or configure an MFC ({msg}).\nLikely causes: Wrong port in [devices], missing permissions on the TTY, or the device is unpowered.\nHow to fix: Check devices.mfc1_port / devices.mfc2_port, add your user to the 'dialout' group, and power-cycle the MFCs."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn humanize_profile(pe: &ProfileError) -> String {
    match pe {
        ProfileError::MissingColumns { missing, found } => format!(
            "What happened: The profile is missing column(s) {}.\nLikely causes: Wrong file, or a recorder with different column names (found: {}).\nHow to fix: Point at a flow-meter recording, or set [profile] rate_column / timestamp_column in the config.",
            missing.join(", "),
            found.join(", ")
        ),
        ProfileError::NonMonotonic { row } => format!(
            "What happened: Timestamps in the profile go backwards at row {row}.\nLikely causes: Concatenated recordings or a clock change during capture.\nHow to fix: Split or sort the recording so timestamps never decrease."
        ),
        ProfileError::Csv(m) => format!(
            "What happened: The profile is not readable CSV ({m}).\nLikely causes: Wrong file type or a truncated file.\nHow to fix: Open it in a text editor and check the header and delimiters."
        ),
        ProfileError::Io { path, message } => format!(
            "What happened: Could not open the profile {} ({message}).\nLikely causes: Typo in the path or missing permissions.\nHow to fix: Check the PROFILE argument.",
            path.display()
        ),
    }
}

/// Stable exit codes per error class.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(re) = err.downcast_ref::<ReplayError>() {
        return match re {
            ReplayError::Cancelled { .. } => 2,
            ReplayError::Actuator { .. } => 3,
            ReplayError::Profile(_) => 4,
            ReplayError::Persistence { .. } => 5,
            ReplayError::Config(_) => 6,
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return 6;
    }
    if err.downcast_ref::<replay_hardware::HwError>().is_some() {
        return 3;
    }
    1
}

pub fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<ReplayError>() {
        Some(ReplayError::Cancelled { .. }) => "Cancelled",
        Some(ReplayError::Actuator { .. }) => "ActuatorIo",
        Some(ReplayError::Profile(_)) => "Profile",
        Some(ReplayError::Persistence { .. }) => "Persistence",
        Some(ReplayError::Config(_)) => "Config",
        None if exit_code_for_error(err) == 3 => "ActuatorIo",
        None if exit_code_for_error(err) == 6 => "Config",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let details = match err.downcast_ref::<ReplayError>() {
        Some(ReplayError::Actuator { tick, fault }) => Some(json!({
            "tick": tick,
            "actuator": fault.actuator.to_string(),
            "op": fault.op.to_string(),
        })),
        Some(ReplayError::Cancelled { tick }) => Some(json!({ "tick": tick })),
        Some(ReplayError::Persistence { path, .. }) => {
            Some(json!({ "path": path.display().to_string() }))
        }
        Some(ReplayError::Profile(ProfileError::NonMonotonic { row })) => Some(json!({ "row": row })),
        _ => None,
    };

    let mut obj = json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    });
    if let (Some(d), Some(map)) = (details, obj.as_object_mut()) {
        map.insert("details".to_string(), d);
    }
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core::{ActuatorFault, ActuatorOp};

    #[test]
    fn actuator_fault_maps_to_code_3_with_details() {
        let err = eyre::Report::new(ReplayError::Actuator {
            tick: 4,
            fault: ActuatorFault {
                actuator: ActuatorId::Mfc2,
                op: ActuatorOp::ReadMeasured,
                kind: FaultKind::Timeout,
                message: "shdlc response timeout".into(),
            },
        });
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("MFC2 failed to read measured value at tick 4"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "ActuatorIo");
        assert_eq!(v["details"]["actuator"], "MFC2");
    }

    #[test]
    fn cancel_maps_to_code_2() {
        let err = eyre::Report::new(ReplayError::Cancelled { tick: 0 });
        assert_eq!(exit_code_for_error(&err), 2);
    }

    #[test]
    fn unknown_error_is_generic() {
        let err = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).starts_with("Something went wrong."));
    }
}
