//! Tracing set-up driven by [`Settings`]

use crate::domain::settings::{LogSettings, Settings};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// Keeps the file writer flushing; hold it until exit
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn rotation_for(name: &str) -> Rotation {
    match name.to_lowercase().as_str() {
        "hourly" => Rotation::HOURLY,
        "minutely" => Rotation::MINUTELY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

/// `RUST_LOG` when set and valid, else the verbosity level, else info
fn level_filter(verbosity_level: &str, rust_log: Option<String>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(verbosity_level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn console_layer(log: &LogSettings) -> BoxedLayer {
    fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(log.ansi_colors)
        .with_target(log.show_target)
        .with_thread_ids(log.show_thread_ids)
        .with_file(log.show_file_line)
        .with_line_number(log.show_file_line)
        .boxed()
}

fn file_layer(log: &LogSettings) -> (BoxedLayer, WorkerGuard) {
    let appender = RollingFileAppender::new(
        rotation_for(&log.rotation),
        &log.log_dir,
        &log.file_name_prefix,
    );
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(log.show_target)
        .with_thread_ids(log.show_thread_ids)
        .with_file(log.show_file_line)
        .with_line_number(log.show_file_line)
        .boxed();
    (layer, guard)
}

/// Install the global subscriber for the wand's settings
pub fn init_logger(settings: &Settings) -> anyhow::Result<LoggingGuard> {
    let log = &settings.log_settings;
    let level = settings.log_level();

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if log.console_logging_enabled {
        layers.push(console_layer(log));
    }
    let file_guard = if log.file_logging_enabled {
        let (layer, guard) = file_layer(log);
        layers.push(layer);
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(level_filter(level, std::env::var("RUST_LOG").ok()))
        .try_init()?;

    tracing::info!(
        verbosity = settings.verbosity,
        level,
        log_dir = %log.log_dir,
        "Logging initialized"
    );

    Ok(LoggingGuard { _file: file_guard })
}
