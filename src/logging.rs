//! Logging initialisation for coremeter.
//!
//! When the `COREMETER_LOG` environment variable is set to `1`, structured
//! logs are also written to the OS log directory under `coremeter/coremeter.log`.
//! Stderr output (filtered by `RUST_LOG`) is always installed, but is muted
//! while the dashboard owns the screen.
//!
//! Returns a guard that must be kept alive for the duration of the process
//! so that buffered log lines are flushed on exit.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const APP_NAME: &str = "coremeter";

pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    stderr_muted: Arc<AtomicBool>,
}

impl LogGuard {
    /// Drop stderr log lines until `unmute_stderr`. Panic messages bypass
    /// tracing; `screen::install_panic_hook` covers those.
    pub fn mute_stderr(&self) {
        self.stderr_muted.store(true, Ordering::SeqCst);
    }

    pub fn unmute_stderr(&self) {
        self.stderr_muted.store(false, Ordering::SeqCst);
    }
}

/// Initialise the global tracing subscriber.
///
/// Call once from `main`, store the returned `LogGuard` in a local variable
/// for the duration of the process.
pub fn init() -> LogGuard {
    let stderr_muted = Arc::new(AtomicBool::new(false));
    let gate = Arc::clone(&stderr_muted);
    let stderr = move || -> Box<dyn Write> {
        if gate.load(Ordering::SeqCst) {
            Box::new(io::sink())
        } else {
            Box::new(io::stderr())
        }
    };

    let file_guard = if std::env::var("COREMETER_LOG").as_deref() == Ok("1") {
        let dir = log_dir(
            std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
            std::env::var_os("HOME").map(PathBuf::from),
        )
        .unwrap_or_else(|| PathBuf::from("/tmp"));
        let _ = std::fs::create_dir_all(&dir);
        let file_appender = tracing_appender::rolling::never(dir, "coremeter.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with(fmt::layer().with_writer(stderr))
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with(fmt::layer().with_writer(stderr))
            .init();

        None
    };

    LogGuard {
        _file_guard: file_guard,
        stderr_muted,
    }
}

/// Directory for the log file, from `$XDG_DATA_HOME` or the home directory.
fn log_dir(xdg_data_home: Option<PathBuf>, home: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(mut p) = xdg_data_home {
        p.push(APP_NAME);
        return Some(p);
    }
    let mut p = home?;
    #[cfg(target_os = "macos")]
    {
        p.push("Library");
        p.push("Logs");
    }
    #[cfg(not(target_os = "macos"))]
    {
        p.push(".local");
        p.push("share");
    }
    p.push(APP_NAME);
    Some(p)
}
