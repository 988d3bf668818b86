//! Tracing subscriber setup: console (pretty or JSON) plus an optional
//! JSON-lines file.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use replay_core::ReplayError;

use crate::cli::FILE_GUARD;

fn rotation(name: Option<&str>) -> Rotation {
    match name {
        Some("daily") => Rotation::DAILY,
        Some("hourly") => Rotation::HOURLY,
        _ => Rotation::NEVER,
    }
}

fn config_err(msg: String) -> eyre::Report {
    eyre::Report::new(ReplayError::Config(msg))
}

/// `RUST_LOG` wins over `level`.
pub fn init_tracing(json: bool, level: &str, logging: &replay_config::Logging) -> eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| eyre::eyre!("invalid log level {level:?}: {e}"))?;

    let (pretty, json_layer) = if json {
        (
            None,
            Some(fmt::layer().json().with_writer(std::io::stderr)),
        )
    } else {
        (
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr)),
            None,
        )
    };

    let file_layer = match logging.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| config_err(format!("logging.file {file:?} has no file name")))?;
            let appender = RollingFileAppender::builder()
                .rotation(rotation(logging.rotation.as_deref()))
                .filename_prefix(name.to_string_lossy())
                .build(dir)
                .map_err(|e| config_err(format!("logging.file {file:?}: {e}")))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| eyre::eyre!("tracing init: {e}"))
}
