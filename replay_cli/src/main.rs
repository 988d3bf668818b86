#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod hw;
mod logging;
mod replay_cmd;
mod rt;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use cli::{Cli, Commands, DEFAULT_CONFIG, JSON_MODE};
use replay_core::ReplayError;

fn load_config(explicit: Option<&Path>) -> eyre::Result<replay_config::Config> {
    let to_config_err = |e: eyre::Report| eyre::Report::new(ReplayError::Config(format!("{e:#}")));
    match explicit {
        Some(path) => replay_config::load_file(path).map_err(to_config_err),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            replay_config::load_file(Path::new(DEFAULT_CONFIG)).map_err(to_config_err)
        }
        None => {
            let cfg = replay_config::Config::default();
            cfg.validate().map_err(to_config_err)?;
            Ok(cfg)
        }
    }
}

fn real_main(cli: &Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    let level = cli
        .log_level
        .as_deref()
        .or(cfg.logging.level.as_deref())
        .unwrap_or("info");
    logging::init_tracing(cli.json, level, &cfg.logging)?;

    match &cli.cmd {
        Commands::Replay(args) => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
                tracing::warn!(error = %e, "could not install Ctrl-C handler");
            }
            replay_cmd::run_replay(&cfg, args, shutdown)
        }
        Commands::CheckProfile { file } => replay_cmd::check_profile(&cfg, file),
    }
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = real_main(&cli) {
        tracing::error!(error = %format!("{err:#}"), "flowreplay failed");
        if cli.json {
            if let Commands::Replay(args) = &cli.cmd {
                println!(
                    "{}",
                    replay_cmd::result_json(args, None, 0, 0, Some(error_fmt::reason_name(&err)))
                );
            }
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}
