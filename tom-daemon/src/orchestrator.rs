//! Daemon assembly and lifecycle management.
//!
//! The [`Daemon`] is the central coordinator of the tom daemon.
//! It validates configuration, registers target subnets, prepares the
//! host record directory, and runs the blocking accounting session on a
//! dedicated thread while the async runtime waits for shutdown signals.
//!
//! # Lifecycle
//!
//! 1. Validate config, register targets, open the record directory
//! 2. Write the PID file (if configured)
//! 3. Open the capture source
//! 4. Run the session until SIGTERM/SIGINT or a fatal capture error
//! 5. Remove the PID file

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use tom_accounting::{
    AccountingEngine, AccountingSession, FileHostLogger, SessionConfig, SessionSummary,
};
use tom_core::config::TomConfig;
use tom_core::pipeline::PacketSource;

use crate::capture::PcapSource;

/// The assembled daemon.
///
/// Holds everything the accounting session needs except the packet
/// source, which is opened only when the daemon runs.
pub struct Daemon {
    /// Loaded and validated configuration.
    config: TomConfig,
    /// Engine with all targets registered.
    engine: AccountingEngine,
    /// Host record writer.
    logger: FileHostLogger,
}

impl Daemon {
    /// Load configuration and build the daemon.
    ///
    /// Applies environment overrides and validates the result.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = TomConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - Any target is malformed or exceeds the allowed prefix length
    /// - The record directory cannot be created
    pub fn build_from_config(config: TomConfig) -> Result<Self> {
        let engine = Self::validate_config(&config)?;
        tracing::info!(targets = engine.targets().len(), "targets registered");

        let logger = FileHostLogger::open(&config.accounting.log_dir)
            .map_err(|e| anyhow::anyhow!("failed to prepare record directory: {}", e))?;
        tracing::info!(log_dir = %logger.log_dir().display(), "record directory ready");

        Ok(Self {
            config,
            engine,
            logger,
        })
    }

    /// Check a configuration without touching the filesystem.
    ///
    /// Runs field validation and then registers every target, so a
    /// configuration accepted here is only rejected at startup for
    /// I/O reasons. Returns the engine with the targets registered.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is invalid or a target is malformed
    /// or exceeds the allowed prefix length.
    pub fn validate_config(config: &TomConfig) -> Result<AccountingEngine> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        AccountingEngine::from_targets(&config.accounting.targets)
            .map_err(|e| anyhow::anyhow!("failed to register targets: {}", e))
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &TomConfig {
        &self.config
    }

    /// Open the configured interface and run until a shutdown signal.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    /// - A fatal capture error (returned as an error)
    pub async fn run(self) -> Result<SessionSummary> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let signals = spawn_signal_watcher(Arc::clone(&shutdown))?;

        let capture_config = self.config.capture.clone();
        let result = self
            .run_with(shutdown, move || PcapSource::open(&capture_config))
            .await;

        signals.abort();
        result
    }

    /// Run the accounting session with a caller-supplied packet source.
    ///
    /// `open_source` is called on the blocking thread after the PID file
    /// is written. The session stops once `shutdown` is set.
    pub async fn run_with<S, F>(
        self,
        shutdown: Arc<AtomicBool>,
        open_source: F,
    ) -> Result<SessionSummary>
    where
        S: PacketSource + 'static,
        F: FnOnce() -> Result<S, tom_core::TomError> + Send + 'static,
    {
        let pid_file = pid_file_path(&self.config);
        if let Some(path) = &pid_file {
            write_pid_file(path)?;
        }

        let session_config = SessionConfig::from_core(&self.config.accounting);
        let Self { engine, logger, .. } = self;

        let task = tokio::task::spawn_blocking(move || -> Result<SessionSummary> {
            let source =
                open_source().map_err(|e| anyhow::anyhow!("failed to open capture: {}", e))?;
            let session = AccountingSession::builder()
                .source(source)
                .sink(logger)
                .engine(engine)
                .config(session_config)
                .build()?;
            session
                .run(&shutdown)
                .map_err(|e| anyhow::anyhow!("capture stopped: {}", e))
        });

        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(anyhow::anyhow!("accounting task failed: {}", e)),
        };

        match &result {
            Ok(summary) => tracing::info!(summary = %summary, "accounting finished"),
            Err(e) => tracing::error!(error = %e, "accounting finished with error"),
        }

        if let Some(path) = &pid_file {
            remove_pid_file(path);
        }
        result
    }
}

fn pid_file_path(config: &TomConfig) -> Option<PathBuf> {
    if config.general.pid_file.is_empty() {
        None
    } else {
        Some(PathBuf::from(&config.general.pid_file))
    }
}

/// Install SIGTERM/SIGINT handlers and set `shutdown` when either arrives.
///
/// Handlers are installed before returning so a failure is reported
/// before capture starts.
fn spawn_signal_watcher(shutdown: Arc<AtomicBool>) -> Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::spawn(async move {
        let signal = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        tracing::info!(signal = signal, "shutdown signal received");
        shutdown.store(true, Ordering::SeqCst);
    }))
}

/// Claim the PID file for this process.
///
/// A file left behind by a process that is no longer running is
/// replaced; a file naming a live process (or one that cannot be read)
/// refuses the start.
///
/// # Security
///
/// - The file is created with `create_new(true)` and mode 0o600
/// - Symlinks and other non-regular files are never followed or replaced
/// - The parent directory is created with mode 0o700
///
/// # Errors
///
/// Returns an error if another instance holds the file or it cannot be
/// written.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        create_private_dir(parent)?;
    }

    let mut file = match create_owner_only(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            reclaim_stale_pid_file(path)?;
            create_owner_only(path)?
        }
        Err(e) => return Err(e.into()),
    };

    let pid = std::process::id();
    writeln!(file, "{}", pid)?;
    file.sync_all()?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new()
            .mode(0o700)
            .recursive(true)
            .create(dir)
    }
    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(dir)
    }
}

fn create_owner_only(path: &Path) -> std::io::Result<std::fs::File> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Remove an existing PID file whose process has exited.
fn reclaim_stale_pid_file(path: &Path) -> Result<()> {
    let metadata = std::fs::symlink_metadata(path)?;
    if !metadata.file_type().is_file() {
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    let content = std::fs::read_to_string(path)?;
    let holder = content.trim();
    match holder.parse::<u32>() {
        Ok(pid) if !process_running(pid) => {
            tracing::warn!(
                path = %path.display(),
                stale_pid = pid,
                "replacing PID file left by an exited process"
            );
            std::fs::remove_file(path)?;
            Ok(())
        }
        _ => Err(anyhow::anyhow!(
            "PID file {} already exists with PID: {}. Is another instance running?",
            path.display(),
            holder
        )),
    }
}

/// Whether `pid` names a running process.
///
/// Without procfs every PID is treated as running.
fn process_running(pid: u32) -> bool {
    let proc_root = Path::new("/proc");
    if !proc_root.join("self").exists() {
        return true;
    }
    pid == std::process::id() || proc_root.join(pid.to_string()).exists()
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to remove PID file"
        );
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}
