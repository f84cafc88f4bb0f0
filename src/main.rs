//! kitd - Supervise a single command.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::Instrument;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kitd::config::{ConfigError, RawConfig, SupervisorConfig};
use kitd::daemon;
use kitd::output::TracingSink;
use kitd::supervisor::{OsSignals, Supervisor, SupervisorError};

#[derive(Parser)]
#[command(
    name = "kitd",
    about = "Supervise a command: restart it with backoff, log its output, relay signals",
    version
)]
struct Cli {
    /// Stay in the foreground and log to stderr.
    #[arg(short = 'd', long)]
    foreground: bool,

    /// Name to log under (default: base name of COMMAND).
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Initial restart interval; bare numbers are milliseconds.
    #[arg(short = 't', long, value_name = "INTERVAL")]
    interval: Option<String>,

    /// Uptime after which the restart interval is reset.
    #[arg(short = 'c', long, value_name = "COOLOFF")]
    cooloff: Option<String>,

    /// Upper bound for the restart interval.
    #[arg(short = 'm', long, value_name = "MAX")]
    max_interval: Option<String>,

    /// TOML file with default settings.
    #[arg(short = 'f', long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Append log records to this file.
    #[arg(short = 'l', long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Command to supervise.
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<OsString>,
}

impl Cli {
    fn load_config(self) -> Result<SupervisorConfig, ConfigError> {
        let file = match &self.config {
            Some(path) => RawConfig::load(path)?,
            None => RawConfig::default(),
        };
        let flags = RawConfig {
            name: self.name,
            interval: self.interval,
            cooloff: self.cooloff,
            max_interval: self.max_interval,
            foreground: self.foreground.then_some(true),
            log_file: self.log_file,
        };
        let mut config = file.overlay(flags).resolve(self.command)?;

        // Detaching changes directory to `/`.
        if let Some(path) = config.log_file.take() {
            let path = std::path::absolute(&path).map_err(|source| ConfigError::LogFile {
                path: path.clone(),
                source,
            })?;
            config = config.log_file(path);
        }
        Ok(config)
    }
}

/// Open the log file before detaching so that failures still reach the
/// terminal.
fn open_log_file(config: &SupervisorConfig) -> Result<Option<RollingFileAppender>, String> {
    let Some(path) = config.log_file.as_deref() else {
        return Ok(None);
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("/"));
    let file_name = path
        .file_name()
        .ok_or_else(|| format!("{}: not a file name", path.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .map(Some)
        .map_err(|e| format!("{}: {e}", path.display()))
}

/// Set up `tracing`: stderr when in the foreground or without a log file,
/// plus the log file when one is open.
///
/// The returned guard flushes the file writer when dropped.
fn init_tracing(
    verbosity: u8,
    foreground: bool,
    log_file: Option<RollingFileAppender>,
) -> Option<WorkerGuard> {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer =
        (foreground || log_file.is_none()).then(|| fmt::layer().with_writer(std::io::stderr));

    let (file_layer, guard) = match log_file {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

async fn supervise(config: SupervisorConfig) -> Result<u8, SupervisorError> {
    tracing::debug!(
        command = %config.command_line(),
        interval = ?config.interval,
        cooloff = ?config.cooloff,
        max_interval = ?config.max_interval,
        "Starting supervisor"
    );
    let signals = OsSignals::new().map_err(SupervisorError::Signals)?;
    let mut supervisor = Supervisor::new(config, signals, TracingSink)?;
    let outcome = supervisor.run().await?;
    Ok(outcome.exit_code())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = cli.verbose;

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("kitd: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_file = match open_log_file(&config) {
        Ok(log_file) => log_file,
        Err(e) => {
            eprintln!("kitd: {e}");
            return ExitCode::FAILURE;
        }
    };

    if !config.foreground {
        if let Err(e) = daemon::detach(log_file.is_none()) {
            eprintln!("kitd: {e}");
            return ExitCode::FAILURE;
        }
    }

    let _guard = init_tracing(verbosity, config.foreground, log_file);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    let span = tracing::info_span!("kitd", name = %config.name);
    match runtime.block_on(supervise(config).instrument(span)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
