//! Real-time scheduling helpers (Linux SCHED_FIFO + mlockall; macOS mlockall).
//!
//! Failures are logged and the replay continues with normal scheduling.

use crate::cli::RtLock;
use std::sync::OnceLock;

static RT_ONCE: OnceLock<()> = OnceLock::new();

#[cfg(unix)]
fn apply_mem_lock(lock: RtLock) -> std::io::Result<()> {
    let flags = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => libc::MCL_CURRENT,
        RtLock::All => libc::MCL_CURRENT | libc::MCL_FUTURE,
    };
    // SAFETY: mlockall takes no pointers and only affects this process.
    let rc = unsafe { libc::mlockall(flags) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(target_os = "linux")]
fn apply_fifo(prio: Option<i32>) -> std::io::Result<i32> {
    // SAFETY: plain queries on the scheduler policy table.
    let (min, max) = unsafe {
        (
            libc::sched_get_priority_min(libc::SCHED_FIFO),
            libc::sched_get_priority_max(libc::SCHED_FIFO),
        )
    };
    if min < 0 || max < 0 {
        return Err(std::io::Error::last_os_error());
    }
    let p = prio.unwrap_or(max / 2).clamp(min, max);
    let param = libc::sched_param { sched_priority: p };
    // SAFETY: pid 0 is the calling process; `param` outlives the call.
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if rc == 0 {
        Ok(p)
    } else {
        Err(std::io::Error::last_os_error())
    }
}

pub fn setup_rt_once(rt: bool, prio: Option<i32>, lock: RtLock) {
    if !rt || RT_ONCE.set(()).is_err() {
        return;
    }

    #[cfg(unix)]
    {
        match apply_mem_lock(lock) {
            Ok(()) => tracing::info!(?lock, "memory locked"),
            Err(e) => tracing::warn!(
                error = %e,
                ?lock,
                "mlockall failed; needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'"
            ),
        }
    }

    #[cfg(target_os = "linux")]
    {
        match apply_fifo(prio) {
            Ok(p) => tracing::info!(prio = p, "SCHED_FIFO enabled"),
            Err(e) => tracing::warn!(
                error = %e,
                "SCHED_FIFO unavailable; needs CAP_SYS_NICE or root"
            ),
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = prio;
        #[cfg(not(unix))]
        let _ = lock;
        tracing::info!("real-time priority not supported on this OS");
    }
}
