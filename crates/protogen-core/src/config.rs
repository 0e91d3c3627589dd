//! Top-level generation configuration
//!
//! `config.json` names the protocol, the scopes to load, custom primitive
//! aliases, and the entry point. It is parsed once into an immutable
//! [`Configuration`] that every later phase receives by reference.

use crate::error::{ConfigError, GenResult, IoError};
use crate::key::{Kind, TypeKey, normalize_scope};
use crate::schema::Primitive;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// File name of the configuration inside an input root
pub const CONFIG_FILE: &str = "config.json";

/// How bitfields treat bits not claimed by any sub-field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingPolicy {
    /// Unclaimed trailing bits are padding
    #[default]
    Implicit,
    /// Sub-field widths must add up to the declared width; padding is
    /// declared with `_`-prefixed sub-fields
    Explicit,
}

/// Transport the generated analyzer attaches to (non layer-2 protocols)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Tcp,
    Udp,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Tcp => "TCP",
            Transport::Udp => "UDP",
        }
    }
}

/// Parsed `<scope>.<name>` entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub scope: String,
    pub name: String,
}

impl EntryPoint {
    /// Split on `.`; exactly two non-empty parts are required
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let parts: Vec<&str> = raw.split('.').map(str::trim).collect();
        match parts.as_slice() {
            [scope, name] if !scope.is_empty() && !name.is_empty() => Ok(Self {
                scope: normalize_scope(scope),
                name: (*name).to_string(),
            }),
            _ => Err(ConfigError::InvalidEntryPoint(raw.to_string())),
        }
    }

    /// Key of the entry object
    pub fn key(&self) -> TypeKey {
        TypeKey::normalize(&self.scope, Kind::Object, &self.name)
    }
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.scope, self.name)
    }
}

/// `config.json` as written on disk
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfiguration {
    protocol: String,

    #[serde(default)]
    uses_layer2: bool,

    #[serde(default)]
    custom_field_types: BTreeMap<String, Primitive>,

    scopes: Vec<String>,

    entry_point: String,

    #[serde(default)]
    bitfield_padding: PaddingPolicy,

    #[serde(default)]
    transport: Transport,
}

/// Validated configuration for one generation run
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// Protocol name, used for the analyzer and driver file
    pub protocol: String,

    /// Attach as a packet analyzer instead of over a transport
    pub uses_layer2: bool,

    /// Named primitive aliases, living in the default scope as `custom` entities
    pub custom_field_types: BTreeMap<String, Primitive>,

    /// Scope directory names, in configured order
    pub scopes: Vec<String>,

    pub entry_point: EntryPoint,

    pub bitfield_padding: PaddingPolicy,

    pub transport: Transport,
}

impl Configuration {
    /// Load and validate a configuration file
    ///
    /// A file that exists but cannot be read is an I/O failure, not a
    /// configuration problem.
    pub fn load(path: impl AsRef<Path>) -> GenResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::MissingFile(path.to_path_buf()).into());
        }
        let content = std::fs::read_to_string(path).map_err(|source| IoError::ReadFailure {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::from_json(&content)?)
    }

    /// Parse and validate configuration JSON
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfiguration =
            serde_json::from_str(content).map_err(|e| ConfigError::Malformed(e.to_string()))?;

        let protocol = raw.protocol.trim().to_string();
        if protocol.is_empty() {
            return Err(ConfigError::Malformed("protocol cannot be empty".to_string()));
        }
        if !is_valid_protocol_name(&protocol) {
            return Err(ConfigError::Malformed(format!(
                "invalid protocol name '{protocol}': use letters, digits, '_' and '-'"
            )));
        }

        if raw.scopes.is_empty() {
            return Err(ConfigError::Malformed(
                "at least one scope is required".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        let mut scopes = Vec::with_capacity(raw.scopes.len());
        for scope in raw.scopes {
            let scope = scope.trim().to_string();
            if !is_valid_scope_name(&scope) {
                return Err(ConfigError::Malformed(format!(
                    "invalid scope name '{scope}'"
                )));
            }
            if !seen.insert(normalize_scope(&scope)) {
                return Err(ConfigError::Malformed(format!("duplicate scope '{scope}'")));
            }
            scopes.push(scope);
        }

        for alias in raw.custom_field_types.keys() {
            if alias.trim().is_empty() || alias.contains('.') {
                return Err(ConfigError::Malformed(format!(
                    "invalid custom field type name '{alias}'"
                )));
            }
            if Primitive::parse(alias).is_some() {
                return Err(ConfigError::Malformed(format!(
                    "custom field type '{alias}' shadows a primitive"
                )));
            }
        }

        let entry_point = EntryPoint::parse(&raw.entry_point)?;

        Ok(Self {
            protocol,
            uses_layer2: raw.uses_layer2,
            custom_field_types: raw.custom_field_types,
            scopes,
            entry_point,
            bitfield_padding: raw.bitfield_padding,
            transport: raw.transport,
        })
    }

    /// Key of the entry object
    pub fn entry_key(&self) -> TypeKey {
        self.entry_point.key()
    }
}

/// Scope names double as directory and module names
fn is_valid_scope_name(scope: &str) -> bool {
    let mut chars = scope.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// The protocol name becomes the driver file name, so it may not carry path
/// separators or dots
fn is_valid_protocol_name(protocol: &str) -> bool {
    protocol
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_alphanumeric() || first == '_')
        && protocol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
