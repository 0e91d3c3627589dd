//! Subscriber construction

use crate::reload::{ReloadHandle, level_filter};
use protogen_core::LogLevel;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::reload;

/// Initialize logging at `level`, writing to stderr
///
/// When `RUST_LOG` is set, its directives further restrict what `level`
/// lets through. Calling this again after a successful initialization only
/// changes the level.
pub fn init_logging(level: LogLevel) {
    let handle = ReloadHandle::global();
    if handle.is_initialized() {
        if let Err(e) = handle.reload_level(level) {
            tracing::warn!(error = %e, "log level unchanged");
        }
        return;
    }

    let (filter, reload_handle) = reload::Layer::new(level_filter(level));
    let env_filter = EnvFilter::try_from_default_env().ok();

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        );

    // Another subscriber may already own the process (tests, embedding hosts)
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        handle.install(reload_handle, level);
    }
}
