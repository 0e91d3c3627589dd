//! Cross-scope import resolution
//!
//! For every scope that owns a reachable entity, records which entities of
//! which other scopes it refers to. The emitter turns each inner map into an
//! `import` line plus a listing of the names used.

use crate::graph::TypeGraph;
use crate::key::{Kind, TypeKey};
use std::collections::{BTreeMap, BTreeSet};

/// `importing scope -> imported scope -> kind -> names`
pub type ImportMap = BTreeMap<String, BTreeMap<String, BTreeMap<Kind, BTreeSet<String>>>>;

/// Collect cross-scope references between reachable entities
///
/// Self-scope references are not imports. Every scope with a reachable entity
/// gets an entry, even when it imports nothing.
pub fn resolve_imports(graph: &TypeGraph, reachable: &BTreeSet<TypeKey>) -> ImportMap {
    let mut imports = ImportMap::new();

    for key in reachable {
        let scope_imports = imports.entry(key.scope().to_string()).or_default();

        // A switch names its selector enum in its parameter list
        let selector = match key.kind() {
            Kind::Switch => graph.selector_enum(key, reachable).ok().flatten(),
            _ => None,
        };

        for target in graph.successors(key).chain(selector) {
            if target.scope() == key.scope() {
                continue;
            }
            scope_imports
                .entry(target.scope().to_string())
                .or_default()
                .entry(target.kind())
                .or_default()
                .insert(target.name().to_string());
        }
    }

    imports
}

/// Whether any scope other than the owner imports `key`
pub fn is_imported(imports: &ImportMap, key: &TypeKey) -> bool {
    imports.iter().any(|(scope, from)| {
        scope != key.scope()
            && from
                .get(key.scope())
                .and_then(|kinds| kinds.get(&key.kind()))
                .is_some_and(|names| names.contains(key.name()))
    })
}
