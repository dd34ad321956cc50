use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt};

// The non-blocking writer stops flushing once its guard drops; parking it
// here keeps the log alive for the process lifetime and doubles as the
// "already initialized" flag.
static WRITER_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Route this process's tracing output to an append-only file.
///
/// `default_filter` is a directive string scoped to this crate (for the
/// engine binary, `"sable=info"`); a parseable `RUST_LOG` takes precedence.
/// Returns an error when the log file cannot be created or another
/// subscriber already claimed the process. Calling again after a success is
/// a no-op.
pub fn init_logging<P: AsRef<Path>>(path: P, default_filter: &str) -> Result<(), String> {
    if WRITER_GUARD.get().is_some() {
        return Ok(());
    }

    let path = path.as_ref();
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)
            .map_err(|e| format!("cannot create log directory {}: {}", dir.display(), e))?;
    }

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("cannot open log file {}: {}", path.display(), e))?;

    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("a tracing subscriber is already installed: {}", e))?;

    let _ = WRITER_GUARD.set(guard);
    Ok(())
}
