//! Startup logging: non-blocking file appender with env-filter control.

use std::path::Path;
use std::sync::Once;

use tracing_appender::non_blocking::WorkerGuard;

/// Keeps the non-blocking writer's worker thread alive; drop to flush and
/// shut it down.
pub struct LogGuard {
    _guard: Option<WorkerGuard>,
}

/// Install the global subscriber writing `tether.log` under `dir`. Filtering
/// comes from `RUST_LOG`. If a subscriber is already installed (embedding
/// application set one up), this is a no-op and the returned guard holds
/// nothing.
pub fn init_logging(dir: &Path) -> LogGuard {
    let log_path = dir.join("tether.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(dir, "tether.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let installed = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .try_init()
        .is_ok();
    LogGuard {
        _guard: installed.then_some(guard),
    }
}

/// Route panics through tracing before the default hook runs.
pub fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}
