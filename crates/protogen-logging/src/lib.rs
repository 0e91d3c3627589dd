//! protogen-logging - Tracing subscriber setup
//!
//! This crate provides:
//! - [`init_logging`] installing a stderr `fmt` subscriber
//! - [`ReloadHandle`] for changing the level after initialization
//! - `RUST_LOG` support through `EnvFilter`

mod layer;
mod reload;

pub use layer::init_logging;
pub use protogen_core::LogLevel;
pub use reload::{ReloadError, ReloadHandle};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{LogLevel, ReloadHandle, init_logging};
}
