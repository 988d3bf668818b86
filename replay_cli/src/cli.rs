//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Config file used when `--config` is not given; absent means built-in defaults.
pub const DEFAULT_CONFIG: &str = "etc/flowreplay.toml";
pub const DEFAULT_OUTPUT: &str = "2MFCs_breath_sample_output.csv";

#[derive(Parser, Debug)]
#[command(
    name = "flowreplay",
    version,
    about = "Replay a recorded breath flow profile through two mass-flow controllers"
)]
pub struct Cli {
    /// Path to config TOML (defaults to etc/flowreplay.toml when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides logging.level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Recorded profile CSV (flow-meter output)
    #[arg(value_name = "PROFILE")]
    pub profile: PathBuf,

    /// Where to write the replay log
    #[arg(long, short, value_name = "FILE", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Override replay.lookahead_steps
    #[arg(long, value_name = "STEPS")]
    pub lookahead: Option<usize>,

    /// Override replay.overshoot_threshold (sccm)
    #[arg(long, value_name = "SCCM")]
    pub threshold: Option<f64>,

    /// Override replay.overshoot_factor
    #[arg(long, value_name = "FACTOR")]
    pub factor: Option<f64>,

    /// Override replay.max_rate (sccm)
    #[arg(long, value_name = "SCCM")]
    pub max_rate: Option<f64>,

    /// Replay only the first SECS seconds of the profile
    #[arg(long = "max-duration-s", value_name = "SECS")]
    pub max_duration_s: Option<f64>,

    /// Print run statistics on completion
    #[arg(long, action = ArgAction::SetTrue)]
    pub stats: bool,

    /// Enable real-time mode (SCHED_FIFO, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode on supported OSes.\n\nLinux: attempts SCHED_FIFO priority and mlockall to keep pacing jitter low. May require CAP_SYS_NICE / CAP_IPC_LOCK or root.\n\nmacOS: only mlockall is applied."
    )]
    pub rt: bool,

    /// SCHED_FIFO priority for --rt (Linux only)
    #[arg(long, value_name = "PRIO")]
    pub rt_prio: Option<i32>,

    /// Memory locking mode for --rt: none, current, or all
    #[arg(long, value_enum, value_name = "MODE")]
    pub rt_lock: Option<RtLock>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a profile through both MFCs and write the replay log
    Replay(ReplayArgs),
    /// Load and validate a profile without touching hardware
    CheckProfile {
        /// Profile CSV to inspect
        #[arg(value_name = "PROFILE")]
        file: PathBuf,
    },
}
