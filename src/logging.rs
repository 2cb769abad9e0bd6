use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Configuration for the logging system
pub struct LogConfig {
    /// Directory where log files will be stored
    pub log_dir: PathBuf,
    /// Prefix for log file names
    pub file_prefix: String,
    /// Maximum number of log files to keep (rotation)
    pub max_files: usize,
    /// Whether to write logs to file
    pub log_to_file: bool,
    /// Log level filter string
    pub log_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        let log_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chunkdrop")
            .join("logs");

        Self {
            log_dir,
            file_prefix: "chunkdrop".to_string(),
            max_files: 5,
            log_to_file: true,
            log_level: "info".to_string(),
        }
    }
}

/// Initialize the logging system with rotating file output plus stdout.
///
/// Component targets (`uploader::machine`, `uploader::transport`,
/// `uploader::reader`, `dropzone`, `server`, `main`) can be filtered
/// individually through `RUST_LOG`, e.g.
/// `RUST_LOG=uploader::machine=debug,server=info`.
pub fn init_logging(config: LogConfig) -> Result<LogGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let worker_guard = if config.log_to_file {
        std::fs::create_dir_all(&config.log_dir).context("Failed to create log directory")?;

        let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix(&config.file_prefix)
            .filename_suffix("log")
            .max_log_files(config.max_files)
            .build(&config.log_dir)
            .context("Failed to create file appender")?;

        let (non_blocking_file, worker_guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = fmt::layer()
            .compact()
            .with_writer(non_blocking_file)
            .with_target(true)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

        let stdout_layer = fmt::layer()
            .compact()
            .with_target(true)
            .with_line_number(true)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stdout_layer)
            .init();

        worker_guard
    } else {
        // dummy non-blocking writer, kept only for the guard
        let (non_blocking_sink, worker_guard) = tracing_appender::non_blocking(std::io::sink());
        drop(non_blocking_sink);

        let stdout_layer = fmt::layer()
            .compact()
            .with_target(true)
            .with_line_number(true)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .init();

        worker_guard
    };

    tracing::info!(
        target: "main",
        log_dir = %config.log_dir.display(),
        log_to_file = config.log_to_file,
        log_level = %config.log_level,
        "Logging system initialized"
    );

    Ok(LogGuard {
        _worker_guard: worker_guard,
    })
}

/// Keeps the non-blocking log writer alive; dropping it flushes any
/// remaining log lines
pub struct LogGuard {
    _worker_guard: tracing_appender::non_blocking::WorkerGuard,
}
