use replay_config::{load_file, load_toml};
use rstest::rstest;
use std::fs;
use tempfile::tempdir;

const BENCH: &str = r#"
[devices]
mfc1_port = "/dev/ttyUSB0"
mfc2_port = "/dev/ttyUSB1"
baud_rate = 115200
slave_address = 0

[replay]
lookahead_steps = 1
overshoot_threshold = 500.0
overshoot_factor = 1.1
max_rate = 20000.0

[profile]
rate_column = "Measured_Flow_Rate_FM(sccm)"
timestamp_column = "Timestamp"

[logging]
level = "info"
rotation = "daily"
"#;

#[test]
fn accepts_bench_config() {
    let cfg = load_toml(BENCH).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.devices.mfc2_port, "/dev/ttyUSB1");
}

#[rstest]
#[case("[replay]\novershoot_threshold = -1.0\n", "overshoot_threshold")]
#[case("[replay]\novershoot_factor = 0.0\n", "overshoot_factor")]
#[case("[replay]\nmax_rate = 0.0\n", "max_rate")]
#[case("[replay]\nabort_poll_ms = 0\n", "abort_poll_ms")]
#[case("[devices]\nbaud_rate = 0\n", "baud_rate")]
#[case("[devices]\ninit_retries = 0\n", "init_retries")]
#[case(
    "[devices]\nmfc1_port = \"/dev/ttyUSB0\"\nmfc2_port = \"/dev/ttyUSB0\"\n",
    "must differ"
)]
#[case("[profile]\nrate_column = \"\"\n", "rate_column")]
#[case("[profile]\nrate_column = \"Timestamp\"\n", "must differ")]
#[case("[simulation]\nnoise_sccm = -2.0\n", "noise_sccm")]
#[case("[logging]\nrotation = \"weekly\"\n", "rotation")]
fn rejects_out_of_range_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    let msg = format!("{err}");
    assert!(msg.contains(needle), "message {msg:?} lacks {needle:?}");
}

#[test]
fn rejects_unknown_types() {
    assert!(load_toml("[replay]\nlookahead_steps = \"two\"\n").is_err());
}

#[test]
fn load_file_parses_and_validates() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.toml");
    fs::write(&good, BENCH).unwrap();
    let cfg = load_file(&good).expect("load good config");
    assert_eq!(cfg.replay.lookahead_steps, 1);

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[replay]\novershoot_factor = -3.0\n").unwrap();
    let err = load_file(&bad).expect_err("invalid config");
    assert!(format!("{err}").contains("overshoot_factor"));

    let missing = dir.path().join("missing.toml");
    let err = load_file(&missing).expect_err("missing file");
    assert!(format!("{err}").contains("read config"));
}
