use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "courtside=info";

/// Sets up logging for the binary.
///
/// Logs go to stderr so stdout stays clean for JSON output. With `log_file`
/// set, they are also written to a daily-rotated file next to it; keep the
/// returned guard alive until exit so buffered lines get flushed.
///
/// `RUST_LOG` overrides the default `courtside=info` filter.
pub fn init(log_file: Option<&Path>, verbose: bool) -> Result<Option<WorkerGuard>> {
  let filter = match std::env::var("RUST_LOG") {
    Ok(directives) => EnvFilter::new(directives),
    Err(_) if verbose => EnvFilter::new("courtside=debug"),
    Err(_) => EnvFilter::new(DEFAULT_DIRECTIVE),
  };

  let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

  let (file_layer, guard) = match log_file {
    Some(path) => {
      let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Log file path has no file name: {}", path.display()))?;

      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

      let appender = tracing_appender::rolling::daily(dir, file_name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let layer = fmt::layer().with_writer(writer).with_ansi(false);
      (Some(layer), Some(guard))
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(stderr_layer)
    .with(file_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
