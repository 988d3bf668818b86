use proptest::prelude::*;
use replay_core::{Compensator, CompensatorCfg};

prop_compose! {
    fn cfg_strategy()(
        lookahead_steps in 0usize..6,
        overshoot_threshold in 0.0f64..2000.0,
        overshoot_factor in 0.5f64..2.0,
        max_rate in 100.0f64..30_000.0,
    ) -> CompensatorCfg {
        CompensatorCfg { lookahead_steps, overshoot_threshold, overshoot_factor, max_rate }
    }
}

fn rates_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-500.0f64..25_000.0, 1..200)
}

proptest! {
    #[test]
    fn split_is_always_even(cfg in cfg_strategy(), rates in rates_strategy()) {
        for s in Compensator::new(cfg).plan(&rates) {
            prop_assert_eq!(s.mfc1, s.mfc2);
            prop_assert!((s.mfc1 + s.mfc2 - s.total).abs() <= 1e-9 * s.total.abs().max(1.0));
        }
    }

    #[test]
    fn current_rate_stays_in_range(cfg in cfg_strategy(), rates in rates_strategy()) {
        for s in Compensator::new(cfg).plan(&rates) {
            prop_assert!(s.current_rate >= 0.0 && s.current_rate <= cfg.max_rate);
        }
    }

    #[test]
    fn boost_only_on_large_jumps(cfg in cfg_strategy(), rates in rates_strategy()) {
        for s in Compensator::new(cfg).plan(&rates) {
            let jump = (s.predicted_rate - s.current_rate).abs();
            if s.compensated {
                prop_assert!(jump > cfg.overshoot_threshold);
                prop_assert_eq!(s.total, s.predicted_rate * cfg.overshoot_factor);
            } else {
                prop_assert!(jump <= cfg.overshoot_threshold);
                prop_assert_eq!(s.total, s.predicted_rate);
            }
        }
    }

    #[test]
    fn tail_ticks_are_never_boosted(cfg in cfg_strategy(), rates in rates_strategy()) {
        let plan = Compensator::new(cfg).plan(&rates);
        let tail = cfg.lookahead_steps.max(1).min(plan.len());
        for s in &plan[plan.len() - tail..] {
            prop_assert!(!s.compensated);
            prop_assert_eq!(s.predicted_rate, s.current_rate);
        }
    }
}
