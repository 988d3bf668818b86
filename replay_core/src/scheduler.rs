//! Paces ticks against the profile's own timeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use replay_traits::Clock;

use crate::elapsed::{Drift, ProfileElapsed, RealElapsed};

/// Result of waiting for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// The profile was ahead; slept exactly the drift.
    OnTime { waited: Duration },
    /// The wall clock was already past the sample; emitted without waiting.
    Behind { lag: Duration },
    Cancelled,
}

pub struct Pacer {
    clock: Arc<dyn Clock + Send + Sync>,
    start: Instant,
    poll: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

impl Pacer {
    /// Start the real-time origin now.
    pub fn start(
        clock: Arc<dyn Clock + Send + Sync>,
        poll: Duration,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Self {
        let start = clock.now();
        Self {
            clock,
            start,
            poll: poll.max(Duration::from_millis(1)),
            cancel,
        }
    }

    pub fn real_elapsed(&self) -> RealElapsed {
        RealElapsed::new(self.clock.since(self.start))
    }

    pub fn drift(&self, target: ProfileElapsed) -> Drift {
        Drift::between(target, self.real_elapsed())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// Block until `target` on the profile timeline. Sleeps in slices of at
    /// most `poll` so a raised cancel flag is seen promptly.
    pub fn wait_until(&self, target: ProfileElapsed) -> Pace {
        if self.is_cancelled() {
            return Pace::Cancelled;
        }
        let waited = match self.drift(target) {
            Drift::Late(lag) => return Pace::Behind { lag },
            Drift::Early(d) => d,
        };
        let mut remaining = waited;
        while !remaining.is_zero() {
            let slice = remaining.min(self.poll);
            self.clock.sleep(slice);
            remaining -= slice;
            if self.is_cancelled() {
                return Pace::Cancelled;
            }
        }
        Pace::OnTime { waited }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_traits::clock::test_clock::TestClock;

    fn pacer(clock: &TestClock, cancel: Option<Arc<AtomicBool>>) -> Pacer {
        Pacer::start(Arc::new(clock.clone()), Duration::from_millis(20), cancel)
    }

    #[test]
    fn sleeps_exactly_the_drift_in_slices() {
        let clock = TestClock::new();
        let p = pacer(&clock, None);
        let pace = p.wait_until(ProfileElapsed::new(Duration::from_millis(50)));
        assert_eq!(
            pace,
            Pace::OnTime {
                waited: Duration::from_millis(50)
            }
        );
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_millis(20),
                Duration::from_millis(20),
                Duration::from_millis(10)
            ]
        );
        assert_eq!(p.real_elapsed().as_duration(), Duration::from_millis(50));
    }

    #[test]
    fn behind_schedule_never_sleeps() {
        let clock = TestClock::new();
        let p = pacer(&clock, None);
        clock.advance(Duration::from_millis(300));
        let pace = p.wait_until(ProfileElapsed::new(Duration::from_millis(100)));
        assert_eq!(
            pace,
            Pace::Behind {
                lag: Duration::from_millis(200)
            }
        );
        assert!(clock.sleeps().is_empty());
    }

    /// Raises the cancel flag from inside the first sleep, as Ctrl-C would
    /// while the pacer is blocked.
    struct CancelOnSleep {
        inner: TestClock,
        flag: Arc<AtomicBool>,
    }

    impl Clock for CancelOnSleep {
        fn now(&self) -> Instant {
            self.inner.now()
        }
        fn wall_now(&self) -> std::time::SystemTime {
            self.inner.wall_now()
        }
        fn sleep(&self, d: Duration) {
            self.inner.sleep(d);
            self.flag.store(true, Ordering::Relaxed);
        }
    }

    #[test]
    fn cancel_mid_wait_stops_after_one_slice() {
        let clock = TestClock::new();
        let flag = Arc::new(AtomicBool::new(false));
        let p = Pacer::start(
            Arc::new(CancelOnSleep {
                inner: clock.clone(),
                flag: flag.clone(),
            }),
            Duration::from_millis(20),
            Some(flag),
        );
        assert_eq!(p.wait_until(ProfileElapsed::new(Duration::from_secs(10))), Pace::Cancelled);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(20)]);
    }

    #[test]
    fn cancel_before_wait_skips_sleeping() {
        let clock = TestClock::new();
        let flag = Arc::new(AtomicBool::new(false));
        let p = pacer(&clock, Some(flag.clone()));
        flag.store(true, Ordering::Relaxed);
        assert_eq!(p.wait_until(ProfileElapsed::new(Duration::from_secs(10))), Pace::Cancelled);
        assert!(clock.sleeps().is_empty());
    }
}
