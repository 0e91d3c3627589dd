//! protogen-core - Schema model and dissector generation pipeline
//!
//! This crate turns a directory of JSON protocol descriptions into Spicy
//! source files, one per scope, containing only the types reachable from the
//! configured entry point:
//! - [`Configuration`] for the top-level `config.json`
//! - [`loader`] for reading scope directories into a [`Schema`]
//! - [`TypeGraph`] and [`reachable_from`] for pruning
//! - [`resolve_imports`] for cross-scope imports
//! - [`codegen`] for rendering
//! - [`generate`] for the whole run
//!
//! ```text
//! config.json ──> Configuration
//!                     │
//! <scope>/*.json ──> Schema ──> TypeGraph ──> reachable set ──> ImportMap
//!                                                   │               │
//!                                                   └──> codegen <──┘ ──> <scope>.spicy
//! ```

mod config;
mod error;
mod generate;
mod output;

pub mod codegen;
pub mod graph;
pub mod key;
pub mod loader;
pub mod reach;
pub mod resolve;
pub mod schema;

pub use config::{CONFIG_FILE, Configuration, EntryPoint, PaddingPolicy, Transport};
pub use error::{ConfigError, Error, ErrorKind, GenResult, GraphError, IoError, SchemaError};
pub use generate::{GenerationResult, generate, render, run, schema_root};
pub use graph::{SwitchUse, TypeGraph};
pub use key::{DEFAULT_SCOPE, Kind, TypeKey, normalize_scope};
pub use output::write_atomic;
pub use reach::reachable_from;
pub use resolve::{ImportMap, resolve_imports};
pub use schema::{Primitive, Schema};

/// Log levels understood by the CLI and the logging crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" => Ok(LogLevel::Off),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Off => write!(f, "OFF"),
        }
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Configuration, Error, ErrorKind, GenResult, GenerationResult, Kind, LogLevel, Schema,
        TypeGraph, TypeKey, generate,
    };
}
