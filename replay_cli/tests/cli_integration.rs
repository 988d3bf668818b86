use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::{TempDir, tempdir};

// Sim backend settles instantly so runs are deterministic.
fn write_config(dir: &TempDir, replay_extra: &str) -> PathBuf {
    let toml = format!(
        r#"
[replay]
lookahead_steps = 1
overshoot_threshold = 500.0
overshoot_factor = 1.1
abort_poll_ms = 5
{replay_extra}

[simulation]
time_constant_ms = 0
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn write_profile(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("breath.csv");
    fs::write(
        &path,
        "Timestamp,Measured_Flow_Rate_FM(sccm)\n\
         2024-03-01 10:00:00.000,100\n\
         2024-03-01 10:00:00.020,100\n\
         2024-03-01 10:00:00.040,\n\
         2024-03-01 10:00:00.060,4000\n",
    )
    .unwrap();
    path
}

fn flowreplay(dir: &TempDir, cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("flowreplay").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("FLOWREPLAY_TEST_FAIL_AT")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(cfg)
        .arg("--log-level")
        .arg("error");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["replay", "--help"], 0, "--max-duration-s", "stdout")]
#[case(&["replay"], 2, "required", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let mut cmd = Command::cargo_bin("flowreplay").unwrap();
    cmd.args(args);
    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn replay_writes_log_in_sim() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let profile = write_profile(&dir);
    let out = dir.path().join("run.csv");

    flowreplay(&dir, &cfg)
        .arg("replay")
        .arg(&profile)
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("replay complete: 3 ticks"));

    let text = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[0],
        "timestamp,elapsed_time_from_MFC,elapsed_time_from_FM,input_breath_flow,\
         measured_combined_flow_rate,measure_flow_rate_MFC1,measured_flow_rate_MFC2"
    );
    // tick 1 looks ahead to the 4000 sccm step and is boosted by 1.1
    let row: Vec<&str> = lines[2].split(',').collect();
    assert_eq!(row[3], "100");
    let combined: f64 = row[4].parse().unwrap();
    assert!((combined - 4400.0).abs() < 1e-6, "{combined}");
}

#[test]
fn default_output_name_in_working_dir() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let profile = write_profile(&dir);

    flowreplay(&dir, &cfg).arg("replay").arg(&profile).assert().success();
    assert!(dir.path().join("2MFCs_breath_sample_output.csv").exists());
}

#[test]
fn injected_mfc_fault_exits_3_without_log() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let profile = write_profile(&dir);
    let out = dir.path().join("run.csv");

    flowreplay(&dir, &cfg)
        .env("FLOWREPLAY_TEST_FAIL_AT", "1")
        .arg("replay")
        .arg(&profile)
        .arg("-o")
        .arg(&out)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("What happened: MFC1 failed to set setpoint at tick 1"));
    assert!(!out.exists());
}

#[test]
fn missing_column_exits_4() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let bad = dir.path().join("bad.csv");
    fs::write(&bad, "time,flow\n2024-03-01 10:00:00.000,1\n").unwrap();

    flowreplay(&dir, &cfg)
        .arg("replay")
        .arg(&bad)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("missing column(s)"));
}

#[test]
fn unwritable_output_exits_5() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let profile = write_profile(&dir);

    flowreplay(&dir, &cfg)
        .arg("replay")
        .arg(&profile)
        .arg("--output")
        .arg(dir.path().join("nope").join("run.csv"))
        .assert()
        .code(5);
}

#[rstest]
#[case("overshoot_factor = 0.0")]
#[case("max_rate = -5.0")]
fn invalid_config_exits_6(#[case] line: &str) {
    let dir = tempdir().unwrap();
    let cfg = fs::read_to_string(write_config(&dir, "")).unwrap();
    let cfg = cfg.replace("abort_poll_ms = 5", &format!("abort_poll_ms = 5\n{line}"));
    let path = dir.path().join("bad.toml");
    fs::write(&path, cfg).unwrap();
    let profile = write_profile(&dir);

    flowreplay(&dir, &path)
        .arg("replay")
        .arg(&profile)
        .assert()
        .code(6)
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn flag_override_is_validated() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let profile = write_profile(&dir);

    flowreplay(&dir, &cfg)
        .arg("replay")
        .arg(&profile)
        .arg("--threshold=-1")
        .assert()
        .code(6);
}

#[test]
fn check_profile_reports_skipped_rows() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let profile = write_profile(&dir);

    flowreplay(&dir, &cfg)
        .arg("check-profile")
        .arg(&profile)
        .assert()
        .success()
        .stdout(predicate::str::contains("samples: 3 of 4 rows"))
        .stdout(predicate::str::contains("row 4: empty rate"));
}

#[test]
fn unusable_log_file_exits_6() {
    let dir = tempdir().unwrap();
    // a regular file where the log directory should be
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "").unwrap();
    let cfg = fs::read_to_string(write_config(&dir, "")).unwrap();
    let cfg = format!(
        "{cfg}\n[logging]\nfile = \"{}\"\n",
        blocker.join("x.log").display()
    );
    let path = dir.path().join("log.toml");
    fs::write(&path, cfg).unwrap();
    let profile = write_profile(&dir);

    flowreplay(&dir, &path)
        .arg("check-profile")
        .arg(&profile)
        .assert()
        .code(6)
        .stderr(predicate::str::contains("Invalid configuration"))
        .stderr(predicate::str::contains("panicked").not());
}
