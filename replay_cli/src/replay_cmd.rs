//! The `replay` and `check-profile` subcommands.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use eyre::WrapErr;
use replay_core::error::{ReplayError, Result as CoreResult};
use replay_core::{CompensatorCfg, PacingCfg, Profile, ProfileSchema, Replay, ReplaySummary};
use serde_json::json;

use crate::cli::{ReplayArgs, RtLock};
use crate::hw::make_mfcs;
use crate::rt::setup_rt_once;

fn compensator_from(cfg: &replay_config::Config, args: &ReplayArgs) -> CoreResult<CompensatorCfg> {
    let mut c = CompensatorCfg::from(&cfg.replay);
    if let Some(l) = args.lookahead {
        c.lookahead_steps = l;
    }
    if let Some(t) = args.threshold {
        c.overshoot_threshold = t;
    }
    if let Some(f) = args.factor {
        c.overshoot_factor = f;
    }
    if let Some(m) = args.max_rate {
        c.max_rate = m;
    }
    c.validate()
        .map_err(|e| ReplayError::Config(e.to_string()))?;
    Ok(c)
}

fn load_profile(path: &Path, schema: &ProfileSchema) -> CoreResult<Profile> {
    let profile = Profile::from_path(path, schema).map_err(ReplayError::from)?;
    for skip in profile.skipped_rows() {
        tracing::debug!(error = %skip, "row skipped");
    }
    if !profile.skipped_rows().is_empty() {
        tracing::warn!(
            skipped = profile.skipped_rows().len(),
            kept = profile.len(),
            "profile rows skipped"
        );
    }
    Ok(profile)
}

pub fn run_replay(
    cfg: &replay_config::Config,
    args: &ReplayArgs,
    shutdown: Arc<AtomicBool>,
) -> CoreResult<()> {
    setup_rt_once(
        args.rt,
        args.rt_prio,
        args.rt_lock.unwrap_or_else(RtLock::os_default),
    );

    let compensator = compensator_from(cfg, args)?;
    let pacing = PacingCfg::from(&cfg.replay);
    let schema = ProfileSchema::from(&cfg.profile);

    let mut profile = load_profile(&args.profile, &schema)?;
    if let Some(secs) = args.max_duration_s {
        let limit = Duration::try_from_secs_f64(secs)
            .map_err(|_| ReplayError::Config(format!("--max-duration-s {secs} is not a valid duration")))?;
        profile = profile.truncated(limit);
    }

    // Hardware is only touched once the profile is known to be usable.
    let (mfc1, mfc2) = make_mfcs(cfg)?;
    let session = Replay::builder()
        .with_mfc1(mfc1)
        .with_mfc2(mfc2)
        .with_profile(profile)
        .with_compensator(compensator)
        .with_abort_poll(pacing.abort_poll)
        .with_cancel_flag(shutdown)
        .build()?;

    let t0 = Instant::now();
    let outcome = session
        .run_and_persist(&args.output)
        .wrap_err("replay failed")?;
    let duration_ms = t0.elapsed().as_millis() as u64;

    for fault in &outcome.shutdown_faults {
        tracing::warn!(error = %fault, "MFC did not shut down cleanly");
    }

    let summary = outcome.log.summary();
    let json_mode = crate::cli::JSON_MODE.get().copied().unwrap_or(false);
    if json_mode {
        println!(
            "{}",
            result_json(args, Some(&summary), duration_ms, outcome.shutdown_faults.len(), None)
        );
    } else {
        println!(
            "replay complete: {} ticks written to {}",
            summary.ticks,
            args.output.display()
        );
        if args.stats {
            print_stats(&summary);
        }
    }
    Ok(())
}

/// One JSON line describing the run; on failure `abort_reason` is set.
pub fn result_json(
    args: &ReplayArgs,
    summary: Option<&ReplaySummary>,
    duration_ms: u64,
    shutdown_faults: usize,
    abort_reason: Option<&str>,
) -> String {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64);
    let mut v = json!({
        "timestamp": ts,
        "profile": args.profile.display().to_string(),
        "output": args.output.display().to_string(),
        "duration_ms": duration_ms,
        "ticks": summary.map(|s| s.ticks),
        "shutdown_faults": shutdown_faults,
        "abort_reason": abort_reason,
    });
    if args.stats
        && let (Some(s), Some(map)) = (summary, v.as_object_mut())
    {
        map.insert("compensated".into(), json!(s.compensated));
        map.insert("max_lag_ms".into(), json!(s.max_lag.as_secs_f64() * 1000.0));
        map.insert("mean_abs_error_sccm".into(), json!(s.mean_abs_error));
    }
    v.to_string()
}

/// Print run stats to stderr.
fn print_stats(s: &ReplaySummary) {
    eprintln!("\n--- Replay Stats ---");
    eprintln!("Ticks: {}", s.ticks);
    eprintln!("Compensated ticks: {}", s.compensated);
    eprintln!("Max lag behind profile (ms): {:.1}", s.max_lag.as_secs_f64() * 1000.0);
    match s.mean_abs_error {
        Some(e) => eprintln!("Mean |target - measured| (sccm): {e:.1}"),
        None => eprintln!("Mean |target - measured| (sccm): n/a"),
    }
    eprintln!("--------------------\n");
}

pub fn check_profile(cfg: &replay_config::Config, file: &Path) -> CoreResult<()> {
    let schema = ProfileSchema::from(&cfg.profile);
    let profile = load_profile(file, &schema)?;
    let range = profile.rate_range();
    let json_mode = crate::cli::JSON_MODE.get().copied().unwrap_or(false);

    if json_mode {
        let skipped: Vec<_> = profile
            .skipped_rows()
            .iter()
            .map(|s| json!({ "row": s.row, "reason": s.reason }))
            .collect();
        println!(
            "{}",
            json!({
                "profile": file.display().to_string(),
                "rows": profile.rows_read(),
                "samples": profile.len(),
                "skipped": skipped,
                "duration_s": profile.duration().as_secs_f64(),
                "min_rate": range.map(|r| r.0),
                "max_rate": range.map(|r| r.1),
            })
        );
        return Ok(());
    }

    println!("profile: {}", file.display());
    println!("samples: {} of {} rows", profile.len(), profile.rows_read());
    println!("duration: {:.2} s", profile.duration().as_secs_f64());
    if let Some((lo, hi)) = range {
        println!("rate: {lo} .. {hi} sccm");
    }
    let skipped = profile.skipped_rows();
    if !skipped.is_empty() {
        println!("skipped: {}", skipped.len());
        for s in skipped.iter().take(10) {
            println!("  {s}");
        }
        if skipped.len() > 10 {
            println!("  ...");
        }
    }
    Ok(())
}
