//! Runtime level changes for an installed subscriber
//!
//! The CLI installs one subscriber per process. [`ReloadHandle::global`]
//! keeps the reload side of its level filter together with the level that is
//! currently active, so a later `init_logging` (or a caller that wants more
//! detail for one run) only swaps the filter.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use protogen_core::LogLevel;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{Registry, reload};

type FilterHandle = reload::Handle<LevelFilter, Registry>;

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("logging has not been initialized")]
    NotInitialized,

    #[error("cannot change log level: {0}")]
    Subscriber(#[from] reload::Error),
}

struct Installed {
    filter: FilterHandle,
    level: LogLevel,
}

/// Level control for the process-wide subscriber
#[derive(Default)]
pub struct ReloadHandle {
    installed: Mutex<Option<Installed>>,
}

impl ReloadHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static ReloadHandle {
        static GLOBAL: OnceCell<ReloadHandle> = OnceCell::new();
        GLOBAL.get_or_init(ReloadHandle::new)
    }

    /// Attach the filter handle of a subscriber installed at `level`
    pub fn install(&self, filter: FilterHandle, level: LogLevel) {
        *self.installed.lock() = Some(Installed { filter, level });
    }

    pub fn is_initialized(&self) -> bool {
        self.installed.lock().is_some()
    }

    /// Level currently applied, if a subscriber is attached
    pub fn current_level(&self) -> Option<LogLevel> {
        self.installed.lock().as_ref().map(|installed| installed.level)
    }

    /// Swap the active level; a no-op when it is already `level`
    pub fn reload_level(&self, level: LogLevel) -> Result<(), ReloadError> {
        let mut guard = self.installed.lock();
        let installed = guard.as_mut().ok_or(ReloadError::NotInitialized)?;
        if installed.level == level {
            return Ok(());
        }
        installed.filter.reload(level_filter(level))?;
        installed.level = level;
        Ok(())
    }
}

pub(crate) fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Trace => LevelFilter::TRACE,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Off => LevelFilter::OFF,
    }
}
