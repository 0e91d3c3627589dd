//! Error types for the generation pipeline
//!
//! Each phase has its own error enum; [`Error`] wraps them so callers can use
//! `?` across phases and still ask which phase failed.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type GenResult<T> = Result<T, Error>;

/// Configuration loading failures
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist
    #[error("{} is a required file", .0.display())]
    MissingFile(PathBuf),

    /// Required fields are absent or mistyped
    #[error("malformed configuration: {0}")]
    Malformed(String),

    /// The entry point is not `<scope>.<name>`
    #[error("entry point '{0}' must have scope and object name")]
    InvalidEntryPoint(String),
}

/// Schema loading and validation failures
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Entity record with an unrecognized `kind` discriminant
    #[error("unknown entity kind '{kind}' in {origin}")]
    UnknownKind { origin: String, kind: String },

    /// Entity record that does not decode into its declared kind
    #[error("malformed entity in {origin}: {detail}")]
    Malformed { origin: String, detail: String },

    /// Type reference that is neither a primitive, a custom alias, nor an entity
    #[error("unresolved type '{reference}' in {entity}{}", hint(.detail))]
    UnresolvedType {
        entity: String,
        reference: String,
        detail: Option<String>,
    },

    /// Two definitions normalize to the same key, or a name repeats inside one entity
    #[error("duplicate definition of {key}: {detail}")]
    DuplicateDefinition { key: String, detail: String },

    /// Bitfield sub-fields use more bits than the declared width
    #[error("bitfield {entity}: sub-fields use {used} bits but width is {width}")]
    BitfieldWidthOverflow { entity: String, used: u32, width: u32 },

    /// Bitfield leaves bits unassigned while padding must be declared
    #[error("bitfield {entity}: sub-fields use {used} of {width} bits and padding is not declared")]
    BitfieldPaddingUndeclared { entity: String, used: u32, width: u32 },

    /// Bitfield width not in {8, 16, 32, 64}, or an empty sub-field
    #[error("bitfield {entity}: {detail}")]
    InvalidBitfieldWidth { entity: String, detail: String },

    /// Enum with a repeated label or value
    #[error("enum {entity}: {detail}")]
    DuplicateEnumValueOrLabel { entity: String, detail: String },

    /// Switch with more than one default case
    #[error("switch {entity} has more than one default case")]
    DuplicateDefaultCase { entity: String },
}

fn hint(detail: &Option<String>) -> String {
    detail
        .as_ref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

/// Type graph failures
#[derive(Error, Debug)]
pub enum GraphError {
    /// The entry point names no loaded object
    #[error("entry point {0} not found in any loaded scope")]
    EntryPointNotFound(String),

    /// Reachable objects drive one switch with differently typed control fields
    #[error("switch {switch} has conflicting selectors: {detail}")]
    ConflictingSelector { switch: String, detail: String },
}

/// File system failures at either end of the pipeline
#[derive(Error, Debug)]
pub enum IoError {
    #[error("failed to read {}: {source}", .path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Any pipeline failure
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Io(#[from] IoError),

    /// A panic caught at the `generate` boundary
    #[error("internal error: {0}")]
    Internal(String),
}

/// Flat error classification, suitable for logs and exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingFile,
    Malformed,
    InvalidEntryPoint,
    UnknownKind,
    MalformedEntity,
    UnresolvedType,
    DuplicateDefinition,
    BitfieldWidthOverflow,
    BitfieldPaddingUndeclared,
    InvalidBitfieldWidth,
    DuplicateEnumValueOrLabel,
    DuplicateDefaultCase,
    EntryPointNotFound,
    ConflictingSelector,
    ReadFailure,
    WriteFailure,
    Internal,
}

impl ErrorKind {
    /// Process exit code for the batch CLI
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::MissingFile => 1,
            ErrorKind::InvalidEntryPoint => 2,
            _ => 3,
        }
    }
}

impl Error {
    /// Returns the flat classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(e) => match e {
                ConfigError::MissingFile(_) => ErrorKind::MissingFile,
                ConfigError::Malformed(_) => ErrorKind::Malformed,
                ConfigError::InvalidEntryPoint(_) => ErrorKind::InvalidEntryPoint,
            },
            Error::Schema(e) => match e {
                SchemaError::UnknownKind { .. } => ErrorKind::UnknownKind,
                SchemaError::Malformed { .. } => ErrorKind::MalformedEntity,
                SchemaError::UnresolvedType { .. } => ErrorKind::UnresolvedType,
                SchemaError::DuplicateDefinition { .. } => ErrorKind::DuplicateDefinition,
                SchemaError::BitfieldWidthOverflow { .. } => ErrorKind::BitfieldWidthOverflow,
                SchemaError::BitfieldPaddingUndeclared { .. } => {
                    ErrorKind::BitfieldPaddingUndeclared
                }
                SchemaError::InvalidBitfieldWidth { .. } => ErrorKind::InvalidBitfieldWidth,
                SchemaError::DuplicateEnumValueOrLabel { .. } => {
                    ErrorKind::DuplicateEnumValueOrLabel
                }
                SchemaError::DuplicateDefaultCase { .. } => ErrorKind::DuplicateDefaultCase,
            },
            Error::Graph(e) => match e {
                GraphError::EntryPointNotFound(_) => ErrorKind::EntryPointNotFound,
                GraphError::ConflictingSelector { .. } => ErrorKind::ConflictingSelector,
            },
            Error::Io(IoError::ReadFailure { .. }) => ErrorKind::ReadFailure,
            Error::Io(IoError::WriteFailure { .. }) => ErrorKind::WriteFailure,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Name of the pipeline phase that produced this error
    pub fn phase(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Schema(_) => "schema",
            Error::Graph(_) => "graph",
            Error::Io(_) => "io",
            Error::Internal(_) => "internal",
        }
    }
}
