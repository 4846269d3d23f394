use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "./logs/archive-renamer.log";

/// Console plus file logging. `TRACING_LEVEL` sets the filter, `LOG_FILE_PATH`
/// the diagnostic log. The file layer is left off when the log would land
/// inside `run_root`, so the tree being renamed stays untouched by it.
///
/// Keep the returned guard alive until exit.
pub fn init_logger(run_root: Option<&Path>) -> Option<WorkerGuard> {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let log_file_path = cwd.join(
        env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string()),
    );
    let file_target = file_log_target(&log_file_path, run_root, &cwd);

    let (file_layer, guard) = match &file_target {
        Some(path) => {
            let dir = path.parent().unwrap_or(&cwd);
            let name = path.file_name().unwrap_or_else(|| "archive-renamer.log".as_ref());
            let (non_blocking, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(fmt::layer().with_writer(non_blocking).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .without_time()
                .with_ansi(true),
        )
        .with(file_layer)
        .with(filter_layer)
        .init();

    match file_target {
        Some(path) => debug!("Diagnostic log at {}", path.display()),
        None => debug!(
            "Diagnostic log {} is inside the run root, file logging is off",
            log_file_path.display()
        ),
    }

    guard
}

/// The diagnostic log path, or `None` when it falls under `run_root`.
fn file_log_target(log_file: &Path, run_root: Option<&Path>, cwd: &Path) -> Option<PathBuf> {
    let Some(root) = run_root else {
        return Some(log_file.to_path_buf());
    };
    let root = resolve(&cwd.join(root));
    if resolve(log_file).starts_with(&root) {
        None
    } else {
        Some(log_file.to_path_buf())
    }
}

/// Canonicalize the longest existing prefix of `path` and append the rest.
/// Log directories usually do not exist yet.
fn resolve(path: &Path) -> PathBuf {
    let path: PathBuf = path.components().collect();
    let mut existing = path.clone();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return rest.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name);
                existing = parent.to_path_buf();
            }
            _ => return path,
        }
    }
}
