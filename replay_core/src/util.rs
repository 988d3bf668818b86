//! Small numeric helpers shared by the log writer and summaries.

use std::time::Duration;

/// Round to two decimal places, half away from zero.
#[inline]
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Seconds with two decimals, as written to the replay log.
pub fn fmt_secs2(d: Duration) -> String {
    format!("{:.2}", round2(d.as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_centiseconds() {
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(1.235_1), 1.24);
        assert_eq!(fmt_secs2(Duration::from_millis(1500)), "1.50");
        assert_eq!(fmt_secs2(Duration::ZERO), "0.00");
    }
}
