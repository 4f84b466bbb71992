//! Tracing subscriber setup.
//!
//! One stdout layer (optional) and one file layer, both filtered by the
//! configured level unless `RUST_LOG` is set.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggerConfig};
use crate::errors::AppError;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber described by `config`.
///
/// `log_sql` raises sqlx statement events to the configured output.
pub fn init(config: &LoggerConfig, log_sql: bool) -> Result<(), AppError> {
    tracing_subscriber::registry()
        .with(build_layers(config)?)
        .with(env_filter(config, log_sql))
        .try_init()
        .map_err(|e| AppError::Internal(format!("Failed to install logger: {}", e)))?;

    tracing::debug!("Logging to {}", config.file.display());
    Ok(())
}

/// Stdout layer when enabled, then the file layer. Creates the log directory.
fn build_layers(config: &LoggerConfig) -> Result<Vec<BoxedLayer>, AppError> {
    std::fs::create_dir_all(&config.absolute_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)?;

    let setup = &config.config;
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if setup.use_stdout {
        layers.push(output_layer(
            setup.log_format,
            &setup.timestamp_format,
            setup.coloring,
            std::io::stdout,
        ));
    }
    layers.push(output_layer(
        setup.log_format,
        &setup.timestamp_format,
        false,
        Mutex::new(file),
    ));
    Ok(layers)
}

fn env_filter(config: &LoggerConfig, log_sql: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(config, log_sql)))
}

fn directives(config: &LoggerConfig, log_sql: bool) -> String {
    let mut directives = config.config.level.as_directive().to_string();
    if log_sql {
        directives.push_str(",sqlx::query=debug");
    }
    directives
}

fn output_layer<W>(format: LogFormat, timestamp_format: &str, ansi: bool, writer: W) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let timer = ChronoLocal::new(timestamp_format.to_string());
    let layer = tracing_subscriber::fmt::layer()
        .with_timer(timer)
        .with_target(true)
        .with_ansi(ansi)
        .with_writer(writer);

    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Text => layer.boxed(),
    }
}
