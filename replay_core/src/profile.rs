//! Recorded flow profile: a CSV of timestamped flow-meter readings turned
//! into `(elapsed, rate)` samples.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::elapsed::ProfileElapsed;
use crate::error::{DataRowError, ProfileError};

/// Timestamp layout written by the flow-meter recorder.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Column names to read the profile from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSchema {
    pub rate_column: String,
    pub timestamp_column: String,
}

impl Default for ProfileSchema {
    fn default() -> Self {
        Self {
            rate_column: replay_config::DEFAULT_RATE_COLUMN.to_string(),
            timestamp_column: replay_config::DEFAULT_TIMESTAMP_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSample {
    pub elapsed: ProfileElapsed,
    /// As recorded, sccm; may fall outside the MFC range.
    pub rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    samples: Vec<FlowSample>,
    rows_read: u64,
    skipped: Vec<DataRowError>,
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()
}

fn parse_rate(s: &str) -> Result<f64, String> {
    let v: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("rate {s:?} is not a number"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("rate {s:?} is not finite"))
    }
}

impl Profile {
    /// Build from samples already in profile time. Elapsed values must not
    /// decrease.
    pub fn from_samples(samples: Vec<FlowSample>) -> Result<Self, ProfileError> {
        if let Some(i) = samples.windows(2).position(|w| w[1].elapsed < w[0].elapsed) {
            return Err(ProfileError::NonMonotonic { row: i as u64 + 1 });
        }
        Ok(Self {
            rows_read: samples.len() as u64,
            samples,
            skipped: Vec::new(),
        })
    }

    pub fn from_path(path: &Path, schema: &ProfileSchema) -> Result<Self, ProfileError> {
        let file = File::open(path).map_err(|e| ProfileError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let profile = Self::from_reader(file, schema)?;
        debug!(
            path = %path.display(),
            samples = profile.len(),
            skipped = profile.skipped.len(),
            "profile loaded"
        );
        Ok(profile)
    }

    /// Parse a headed CSV. Rows with an empty or unparseable rate or
    /// timestamp are dropped (and remembered in `skipped_rows`); a missing
    /// column fails the whole load.
    pub fn from_reader<R: Read>(reader: R, schema: &ProfileSchema) -> Result<Self, ProfileError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| ProfileError::Csv(e.to_string()))?
            .clone();
        let find = |name: &str| headers.iter().position(|h| h == name);
        let (rate_idx, ts_idx) = match (find(&schema.rate_column), find(&schema.timestamp_column)) {
            (Some(r), Some(t)) => (r, t),
            (r, t) => {
                let mut missing = Vec::new();
                if r.is_none() {
                    missing.push(schema.rate_column.clone());
                }
                if t.is_none() {
                    missing.push(schema.timestamp_column.clone());
                }
                return Err(ProfileError::MissingColumns {
                    missing,
                    found: headers.iter().map(str::to_string).collect(),
                });
            }
        };

        let mut samples = Vec::new();
        let mut skipped = Vec::new();
        let mut rows_read = 0u64;
        let mut origin: Option<NaiveDateTime> = None;
        let mut last = ProfileElapsed::ZERO;

        for (idx, record) in rdr.byte_records().enumerate() {
            // header is row 1
            let row = idx as u64 + 2;
            rows_read += 1;
            let record = record.map_err(|e| ProfileError::Csv(e.to_string()))?;
            // Only the two used columns have to be text; other columns are opaque.
            let field = |i: usize| std::str::from_utf8(record.get(i).unwrap_or_default());
            let (rate_s, ts_s) = match (field(rate_idx), field(ts_idx)) {
                (Ok(r), Ok(t)) => (r, t),
                (Err(e), _) | (_, Err(e)) => {
                    let skip = DataRowError {
                        row,
                        reason: format!("invalid UTF-8: {e}"),
                    };
                    warn!(error = %skip, "skipping profile row");
                    skipped.push(skip);
                    continue;
                }
            };

            if rate_s.is_empty() || ts_s.is_empty() {
                let field = if rate_s.is_empty() { "rate" } else { "timestamp" };
                let skip = DataRowError {
                    row,
                    reason: format!("empty {field}"),
                };
                debug!(error = %skip, "skipping profile row");
                skipped.push(skip);
                continue;
            }

            let parsed = parse_rate(rate_s).and_then(|rate| {
                parse_timestamp(ts_s)
                    .map(|ts| (rate, ts))
                    .ok_or_else(|| format!("timestamp {ts_s:?} does not match {TIMESTAMP_FORMAT}"))
            });
            let (rate, ts) = match parsed {
                Ok(v) => v,
                Err(reason) => {
                    let skip = DataRowError { row, reason };
                    warn!(error = %skip, "skipping profile row");
                    skipped.push(skip);
                    continue;
                }
            };

            let t0 = *origin.get_or_insert(ts);
            let elapsed = (ts - t0)
                .to_std()
                .map(ProfileElapsed::new)
                .map_err(|_| ProfileError::NonMonotonic { row })?;
            if elapsed < last {
                return Err(ProfileError::NonMonotonic { row });
            }
            last = elapsed;
            samples.push(FlowSample { elapsed, rate });
        }

        Ok(Self {
            samples,
            rows_read,
            skipped,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[FlowSample] {
        &self.samples
    }

    pub fn rates(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.rate).collect()
    }

    /// Data rows seen in the source, kept or not. `truncated` leaves this
    /// (and `skipped_rows`) describing the whole source.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn skipped_rows(&self) -> &[DataRowError] {
        &self.skipped
    }

    /// Elapsed time of the last sample.
    pub fn duration(&self) -> Duration {
        self.samples
            .last()
            .map_or(Duration::ZERO, |s| s.elapsed.as_duration())
    }

    /// `(min, max)` of the recorded rates.
    pub fn rate_range(&self) -> Option<(f64, f64)> {
        let mut it = self.samples.iter().map(|s| s.rate);
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), r| (lo.min(r), hi.max(r))))
    }

    /// Keep only samples with `elapsed <= limit`.
    pub fn truncated(mut self, limit: Duration) -> Self {
        self.samples.retain(|s| s.elapsed.as_duration() <= limit);
        self
    }
}
