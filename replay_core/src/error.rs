use std::path::PathBuf;

use thiserror::Error;

use crate::actuator_pair::ActuatorFault;

/// Failures of the replay call as a whole.
#[derive(Debug, Error, Clone)]
pub enum ReplayError {
    /// The profile could not be turned into a time series; no flow was commanded.
    #[error(transparent)]
    Profile(#[from] ProfileError),
    /// A hardware call failed mid-loop; both MFCs were zeroed before this surfaced.
    #[error("tick {tick}: {fault}")]
    Actuator { tick: usize, fault: ActuatorFault },
    #[error("persisting replay log to {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },
    #[error("replay cancelled by operator before tick {tick}")]
    Cancelled { tick: usize },
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProfileError {
    #[error("required column(s) missing: {} (found: {})", missing.join(", "), found.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },
    #[error("timestamps go backwards at row {row}")]
    NonMonotonic { row: u64 },
    #[error("reading profile: {0}")]
    Csv(String),
    #[error("open profile {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

/// A single profile row that was skipped; never fails the load.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("row {row}: {reason}")]
pub struct DataRowError {
    /// 1-based line in the source, header included.
    pub row: u64,
    pub reason: String,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing MFC1")]
    MissingMfc1,
    #[error("missing MFC2")]
    MissingMfc2,
    #[error("missing profile")]
    MissingProfile,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
