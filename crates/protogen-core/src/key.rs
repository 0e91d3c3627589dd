//! Canonical entity identifiers
//!
//! Every entity is addressed by a [`TypeKey`] built from `(scope, kind, name)`.
//! Scope tokens are case-normalized, and an empty or `default` token maps to
//! [`DEFAULT_SCOPE`], so `Header`, `default.Header` and `DEFAULT.Header` all
//! address the same entity when looked up from the default scope.

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Scope used for unqualified custom aliases and the `default` token
pub const DEFAULT_SCOPE: &str = "default";

/// Entity kind
///
/// Variants are declared alphabetically so the derived ordering sorts kinds
/// by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Bitfield,
    Custom,
    Enum,
    Object,
    Switch,
}

impl Kind {
    /// All kinds, in sort order
    pub const ALL: [Kind; 5] = [
        Kind::Bitfield,
        Kind::Custom,
        Kind::Enum,
        Kind::Object,
        Kind::Switch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Bitfield => "bitfield",
            Kind::Custom => "custom",
            Kind::Enum => "enum",
            Kind::Object => "object",
            Kind::Switch => "switch",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical `(scope, kind, name)` identifier
///
/// Field order matters: the derived `Ord` sorts by scope, then kind, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey {
    scope: String,
    kind: Kind,
    name: String,
}

impl TypeKey {
    /// Build a key, normalizing the scope token
    pub fn normalize(scope: &str, kind: Kind, name: &str) -> Self {
        Self {
            scope: normalize_scope(scope),
            kind,
            name: name.trim().to_string(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.scope, self.kind, self.name)
    }
}

/// Lowercase and trim a scope token, mapping an empty or `default` token to
/// [`DEFAULT_SCOPE`]
pub fn normalize_scope(scope: &str) -> String {
    let scope = scope.trim().to_ascii_lowercase();
    if scope.is_empty() {
        DEFAULT_SCOPE.to_string()
    } else {
        scope
    }
}

/// Registry of every key handed out during one load
///
/// Registration fails when a second source entity normalizes to a key that is
/// already taken, naming both origins.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    origins: BTreeMap<TypeKey, String>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and claim a key for an entity defined at `origin`
    pub fn register(
        &mut self,
        scope: &str,
        kind: Kind,
        name: &str,
        origin: impl Into<String>,
    ) -> Result<TypeKey, SchemaError> {
        let key = TypeKey::normalize(scope, kind, name);
        let origin = origin.into();
        if let Some(existing) = self.origins.get(&key) {
            return Err(SchemaError::DuplicateDefinition {
                key: key.to_string(),
                detail: format!("defined in {existing} and {origin}"),
            });
        }
        self.origins.insert(key.clone(), origin);
        Ok(key)
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.origins.contains_key(key)
    }

    /// Every registered key named `name` in `scope`, restricted to `kinds`
    pub fn lookup(&self, scope: &str, name: &str, kinds: &[Kind]) -> Vec<TypeKey> {
        kinds
            .iter()
            .map(|kind| TypeKey::normalize(scope, *kind, name))
            .filter(|key| self.contains(key))
            .collect()
    }
}
