//! Per-tick record of a replay and its CSV form.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::atomic::write_atomic;
use crate::elapsed::{Drift, ProfileElapsed, RealElapsed};
use crate::error::ReplayError;
use crate::util::fmt_secs2;

pub const LOG_HEADER: [&str; 7] = [
    "timestamp",
    "elapsed_time_from_MFC",
    "elapsed_time_from_FM",
    "input_breath_flow",
    "measured_combined_flow_rate",
    "measure_flow_rate_MFC1",
    "measured_flow_rate_MFC2",
];

pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayTick {
    pub index: usize,
    /// Wall clock when the setpoints went out.
    pub timestamp: DateTime<Local>,
    pub real_elapsed: RealElapsed,
    pub profile_elapsed: ProfileElapsed,
    /// Profile rate as recorded, before clamping.
    pub input_rate: f64,
    pub compensated: bool,
    pub mfc1_setpoint: f64,
    pub mfc2_setpoint: f64,
    pub measured_mfc1: f64,
    pub measured_mfc2: f64,
}

impl ReplayTick {
    pub fn measured_combined(&self) -> f64 {
        self.measured_mfc1 + self.measured_mfc2
    }

    pub fn drift(&self) -> Drift {
        Drift::between(self.profile_elapsed, self.real_elapsed)
    }

    fn record(&self) -> [String; 7] {
        [
            self.timestamp.format(LOG_TIMESTAMP_FORMAT).to_string(),
            fmt_secs2(self.real_elapsed.as_duration()),
            fmt_secs2(self.profile_elapsed.as_duration()),
            self.input_rate.to_string(),
            self.measured_combined().to_string(),
            self.measured_mfc1.to_string(),
            self.measured_mfc2.to_string(),
        ]
    }
}

/// Aggregate figures for a finished replay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplaySummary {
    pub ticks: usize,
    pub compensated: usize,
    /// Worst lateness of any tick behind the profile timeline.
    pub max_lag: Duration,
    /// Mean of `|input - measured_combined|` in sccm; `None` for an empty run.
    pub mean_abs_error: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayLog {
    ticks: Vec<ReplayTick>,
}

impl ReplayLog {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            ticks: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, tick: ReplayTick) {
        self.ticks.push(tick);
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn ticks(&self) -> &[ReplayTick] {
        &self.ticks
    }

    /// Header row always, then one row per tick.
    pub fn write_csv<W: Write>(&self, w: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(w);
        wtr.write_record(LOG_HEADER)?;
        for t in &self.ticks {
            wtr.write_record(t.record())?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write the CSV to `path` atomically.
    pub fn persist(&self, path: &Path) -> Result<(), ReplayError> {
        let fail = |message: String| ReplayError::Persistence {
            path: path.to_path_buf(),
            message,
        };
        let mut buf = Vec::new();
        self.write_csv(&mut buf).map_err(|e| fail(e.to_string()))?;
        write_atomic(path, &buf).map_err(|e| fail(e.to_string()))?;
        tracing::info!(path = %path.display(), rows = self.len(), "replay log written");
        Ok(())
    }

    pub fn summary(&self) -> ReplaySummary {
        let compensated = self.ticks.iter().filter(|t| t.compensated).count();
        let max_lag = self
            .ticks
            .iter()
            .map(|t| t.drift().lag())
            .max()
            .unwrap_or(Duration::ZERO);
        let mean_abs_error = (!self.ticks.is_empty()).then(|| {
            let sum: f64 = self
                .ticks
                .iter()
                .map(|t| (t.input_rate - t.measured_combined()).abs())
                .sum();
            sum / self.ticks.len() as f64
        });
        ReplaySummary {
            ticks: self.ticks.len(),
            compensated,
            max_lag,
            mean_abs_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(index: usize, real_ms: u64, profile_ms: u64, input: f64, m: f64) -> ReplayTick {
        ReplayTick {
            index,
            timestamp: Local::now(),
            real_elapsed: RealElapsed::new(Duration::from_millis(real_ms)),
            profile_elapsed: ProfileElapsed::new(Duration::from_millis(profile_ms)),
            input_rate: input,
            compensated: index == 0,
            mfc1_setpoint: input / 2.0,
            mfc2_setpoint: input / 2.0,
            measured_mfc1: m,
            measured_mfc2: m,
        }
    }

    #[test]
    fn empty_log_writes_header_only() {
        let mut buf = Vec::new();
        ReplayLog::default().write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert_eq!(text.trim_end(), LOG_HEADER.join(","));
    }

    #[test]
    fn row_layout() {
        let mut log = ReplayLog::default();
        log.push(tick(0, 1004, 1000, 4000.0, 1999.5));
        let mut buf = Vec::new();
        log.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let row: Vec<&str> = text.lines().nth(1).unwrap().split(',').collect();
        assert_eq!(&row[1..], ["1.00", "1.00", "4000", "3999", "1999.5", "1999.5"]);
        assert!(chrono::NaiveDateTime::parse_from_str(row[0], LOG_TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn summary_reports_lag_and_error() {
        let mut log = ReplayLog::default();
        log.push(tick(0, 0, 0, 100.0, 50.0));
        log.push(tick(1, 650, 500, 200.0, 90.0));
        let s = log.summary();
        assert_eq!(s.ticks, 2);
        assert_eq!(s.compensated, 1);
        assert_eq!(s.max_lag, Duration::from_millis(150));
        assert!((s.mean_abs_error.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(ReplayLog::default().summary().mean_abs_error, None);
    }

    #[test]
    fn persist_into_missing_dir_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReplayLog::default()
            .persist(&dir.path().join("missing").join("out.csv"))
            .unwrap_err();
        assert!(matches!(err, ReplayError::Persistence { .. }));
    }
}
