//! Two clocks run side by side during a replay: the recorded profile's
//! elapsed time and the wall time since the loop started. They are kept in
//! distinct types; `Drift::between` is the only place they meet.

use std::fmt;
use std::time::Duration;

/// Offset of a profile sample from the first retained sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProfileElapsed(Duration);

/// Wall time since the replay loop started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RealElapsed(Duration);

macro_rules! elapsed_impl {
    ($t:ident) => {
        impl $t {
            pub const ZERO: Self = Self(Duration::ZERO);

            pub const fn new(d: Duration) -> Self {
                Self(d)
            }

            /// Negative or non-finite input saturates to zero.
            pub fn from_secs_f64(secs: f64) -> Self {
                Self(Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO))
            }

            pub const fn as_duration(self) -> Duration {
                self.0
            }

            pub fn as_secs_f64(self) -> f64 {
                self.0.as_secs_f64()
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:.3}s", self.0.as_secs_f64())
            }
        }
    };
}

elapsed_impl!(ProfileElapsed);
elapsed_impl!(RealElapsed);

/// Signed difference `profile - real`, split by sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    /// The profile is ahead of the wall clock by this much: wait it out.
    Early(Duration),
    /// The wall clock has caught up or overtaken the profile by this much.
    Late(Duration),
}

impl Drift {
    pub fn between(profile: ProfileElapsed, real: RealElapsed) -> Self {
        if profile.0 > real.0 {
            Drift::Early(profile.0 - real.0)
        } else {
            Drift::Late(real.0 - profile.0)
        }
    }

    /// Time to suspend before emitting; never negative.
    pub fn wait(self) -> Duration {
        match self {
            Drift::Early(d) => d,
            Drift::Late(_) => Duration::ZERO,
        }
    }

    pub fn lag(self) -> Duration {
        match self {
            Drift::Early(_) => Duration::ZERO,
            Drift::Late(d) => d,
        }
    }

    pub fn as_secs_f64(self) -> f64 {
        match self {
            Drift::Early(d) => d.as_secs_f64(),
            Drift::Late(d) => -d.as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(100, 40, Drift::Early(Duration::from_millis(60)))]
    #[case(40, 100, Drift::Late(Duration::from_millis(60)))]
    #[case(50, 50, Drift::Late(Duration::ZERO))]
    fn drift_sign(#[case] profile_ms: u64, #[case] real_ms: u64, #[case] expect: Drift) {
        let d = Drift::between(
            ProfileElapsed::new(Duration::from_millis(profile_ms)),
            RealElapsed::new(Duration::from_millis(real_ms)),
        );
        assert_eq!(d, expect);
    }

    #[test]
    fn late_drift_never_waits() {
        let d = Drift::between(ProfileElapsed::ZERO, RealElapsed::from_secs_f64(3.0));
        assert_eq!(d.wait(), Duration::ZERO);
        assert_eq!(d.lag(), Duration::from_secs(3));
        assert!(d.as_secs_f64() < 0.0);
    }

    #[test]
    fn negative_seconds_saturate() {
        assert_eq!(ProfileElapsed::from_secs_f64(-1.0), ProfileElapsed::ZERO);
        assert_eq!(RealElapsed::from_secs_f64(f64::NAN), RealElapsed::ZERO);
    }
}
