use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::shared::config::{CONFIG, LoggingConfig};
use tracing::info;

pub fn init() -> anyhow::Result<()> {
    init_with(&CONFIG.logging)
}

pub fn init_with(cfg: &LoggingConfig) -> anyhow::Result<()> {
    let stdout_filter = snapflow_targets(&cfg.stdout_level)?;
    let file_filter = snapflow_targets(&cfg.file_level)?;

    let stdout_layer = fmt::layer().with_ansi(true).with_filter(stdout_filter);

    let file_appender = tracing_appender::rolling::daily(&cfg.log_dir, "snapflow.log");
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(file_appender)
        .with_filter(file_filter);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    info!(target: "snapflow::logging", log_dir = %cfg.log_dir, "Logging initialized");
    Ok(())
}

/// `level` for every `snapflow::*` target; other crates only report warnings.
pub fn snapflow_targets(level: &str) -> anyhow::Result<Targets> {
    let level = level.parse::<LevelFilter>()?;
    Ok(Targets::new()
        .with_target("snapflow", level)
        .with_default(LevelFilter::WARN.min(level)))
}

#[cfg(test)]
pub fn init_for_tests() {
    use std::sync::Once;
    use tracing_subscriber::EnvFilter;

    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env()
            .add_directive("snapflow=debug".parse().expect("valid directive"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
#[path = "logging_test.rs"]
mod logging_test;
