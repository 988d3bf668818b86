#![no_main]
use libfuzzer_sys::fuzz_target;
use replay_core::{Profile, ProfileSchema};

fuzz_target!(|data: &[u8]| {
    let Ok(profile) = Profile::from_reader(data, &ProfileSchema::default()) else {
        return;
    };
    // A loaded profile is never out of order and every rate is finite.
    assert!(
        profile
            .samples()
            .windows(2)
            .all(|w| w[0].elapsed <= w[1].elapsed)
    );
    assert!(profile.rates().iter().all(|r| r.is_finite()));
    assert!(profile.len() as u64 + profile.skipped_rows().len() as u64 <= profile.rows_read());
});
