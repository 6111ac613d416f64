//! Tracing setup: console layer on stderr plus an optional JSON log file.

use std::path::Path;

use barbot_config::Logging;
use eyre::{Result, WrapErr};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber.
///
/// Level precedence: `RUST_LOG`, then `--log-level`, then `[logging].level`,
/// then `info`. Console output goes to stderr so stdout stays machine-readable.
/// The returned guard flushes the log file when dropped.
pub fn init(json: bool, cli_level: Option<&str>, cfg: &Logging) -> Result<Option<WorkerGuard>> {
    let level = cli_level.or(cfg.level.as_deref()).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level '{level}'"))?;

    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);
    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);
    layers.push(if json {
        console.json().boxed()
    } else {
        console.compact().boxed()
    });

    let mut guard = None;
    if let Some(path) = cfg.file.as_deref() {
        let (layer, g) = file_layer(Path::new(path), cfg.rotation.as_deref())?;
        layers.push(layer);
        guard = Some(g);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .wrap_err("installing the tracing subscriber")?;
    Ok(guard)
}

fn file_layer(path: &Path, rotation: Option<&str>) -> Result<(BoxedLayer, WorkerGuard)> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .ok_or_else(|| eyre::eyre!("logging.file '{}' has no file name", path.display()))?;
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("creating log directory {}", dir.display()))?;

    let appender = match rotation.unwrap_or("never") {
        "daily" => rolling::daily(dir, name),
        "hourly" => rolling::hourly(dir, name),
        _ => rolling::never(dir, name),
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(writer)
        .boxed();
    Ok((layer, guard))
}
