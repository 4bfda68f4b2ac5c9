//! Logging setup
//!
//! Console output always goes to stderr so stdout stays free for resources. File output is
//! optional and written through a non-blocking rolling appender; keep the returned guard alive
//! for as long as logs should be flushed.

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = build_filter(&config.level)?;

    let mut guards = Vec::new();
    let mut layers: Vec<BoxedLayer> = vec![build_console_layer(config.json)];

    if config.file_enabled {
        let dir = Path::new(&config.file_directory);
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::Config(format!(
                "Failed to create log directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        let (layer, guard) = build_file_layer(config, dir)?;
        layers.push(layer);
        guards.push(guard);
    }

    layers.push(Box::new(filter));

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install logging subscriber: {}", e)))?;

    Ok(LoggingGuard { _guards: guards })
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level)
        .map_err(|e| Error::Config(format!("Invalid logging.level '{}': {}", level, e)))
}

fn build_console_layer(json: bool) -> BoxedLayer {
    if json {
        Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true),
        )
    } else {
        Box::new(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
    }
}

fn build_file_layer(config: &LoggingConfig, dir: &Path) -> Result<(BoxedLayer, WorkerGuard)> {
    let appender = RollingFileAppender::new(
        parse_rotation(&config.file_rotation)?,
        dir,
        &config.file_prefix,
    );
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer: BoxedLayer = if config.json {
        Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
    } else {
        Box::new(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
    };

    Ok((layer, guard))
}

fn parse_rotation(rotation: &str) -> Result<Rotation> {
    match rotation {
        "daily" => Ok(Rotation::DAILY),
        "hourly" => Ok(Rotation::HOURLY),
        "minutely" => Ok(Rotation::MINUTELY),
        "never" => Ok(Rotation::NEVER),
        other => Err(Error::Config(format!(
            "Unknown logging.file_rotation '{}'",
            other
        ))),
    }
}
