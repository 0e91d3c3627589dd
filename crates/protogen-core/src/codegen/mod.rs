//! Source generation from the pruned schema.
//!
//! Rendering is split in two stages:
//!
//! ```text
//! Schema + reachable set + ImportMap
//!     ↓
//!  [EmitContext]   naming, visibility, per-scope declaration order
//!     ↓
//!  [TargetGrammar] → <scope>.<ext> per scope, plus an optional driver file
//! ```
//!
//! The grammar only decides how each construct is spelled. Which entities
//! appear, in what order, and under which names is fixed by the context, so
//! every grammar sees the same pruned and ordered view.
//!
//! Emission is pure: the same inputs always produce byte-identical output.
//! Nothing here touches the file system.

pub mod naming;
pub mod spicy;

pub use spicy::SpicyGrammar;

use crate::config::Configuration;
use crate::graph::TypeGraph;
use crate::key::TypeKey;
use crate::resolve::{ImportMap, is_imported};
use crate::schema::{Entity, Schema};
use std::collections::BTreeSet;

/// One rendered output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// File name relative to the output root
    pub file_name: String,
    pub contents: String,
}

/// Everything a grammar needs to render one run
#[derive(Debug, Clone, Copy)]
pub struct EmitContext<'a> {
    pub config: &'a Configuration,
    pub schema: &'a Schema,
    pub graph: &'a TypeGraph,
    pub reachable: &'a BTreeSet<TypeKey>,
    pub imports: &'a ImportMap,
}

impl<'a> EmitContext<'a> {
    /// Scopes with at least one reachable entity, sorted
    pub fn scopes(&self) -> BTreeSet<&'a str> {
        self.reachable.iter().map(TypeKey::scope).collect()
    }

    /// Reachable entities of `scope` in declaration order
    pub fn declarations(&self, scope: &str) -> Vec<&'a Entity> {
        let reachable = self.reachable;
        self.schema
            .scope_entities(scope)
            .filter(|entity| reachable.contains(&entity.key))
            .collect()
    }

    pub fn is_entry(&self, key: &TypeKey) -> bool {
        *key == self.config.entry_key()
    }

    pub fn is_entry_scope(&self, scope: &str) -> bool {
        self.config.entry_point.scope == scope
    }

    /// Declarations used from another scope, and the entry object, are exported
    pub fn is_public(&self, key: &TypeKey) -> bool {
        self.is_entry(key) || is_imported(self.imports, key)
    }

    /// Generated type name for `key` inside its own scope
    ///
    /// Names are sanitized; when the same name exists under several kinds in
    /// one scope, each gets a `_<kind>` suffix so declarations stay distinct.
    pub fn type_name(&self, key: &TypeKey) -> String {
        naming::type_identifier(
            key.name(),
            key.kind(),
            self.schema.shares_name_across_kinds(key),
        )
    }

    /// Name of `key` as written from code in scope `from`
    pub fn reference(&self, from: &str, key: &TypeKey) -> String {
        naming::qualify(from, key.scope(), &self.type_name(key))
    }
}

/// A target grammar for generated dissector source
///
/// Implementors spell individual constructs; the provided
/// [`emit_scope`](TargetGrammar::emit_scope) lays out a whole file.
pub trait TargetGrammar {
    /// Extension of per-scope files, without the dot
    fn extension(&self) -> &'static str;

    /// Banner and module declaration
    fn header(&self, ctx: &EmitContext<'_>, scope: &str) -> String;

    /// Import lines for the scopes `scope` depends on
    fn imports(&self, ctx: &EmitContext<'_>, scope: &str) -> String;

    /// One entity declaration
    fn declaration(&self, ctx: &EmitContext<'_>, entity: &Entity) -> String;

    /// Hooks binding the entry declaration to the host; only in the entry scope
    fn host_binding(&self, ctx: &EmitContext<'_>) -> String;

    /// Extra file wiring the generated modules into the host
    fn driver(&self, ctx: &EmitContext<'_>) -> Option<GeneratedFile>;

    /// Render one scope file
    fn emit_scope(&self, ctx: &EmitContext<'_>, scope: &str) -> String {
        let mut code = self.header(ctx, scope);

        let imports = self.imports(ctx, scope);
        if !imports.is_empty() {
            code.push_str(&imports);
            code.push('\n');
        }

        for entity in ctx.declarations(scope) {
            code.push_str(&self.declaration(ctx, entity));
            code.push('\n');
        }

        if ctx.is_entry_scope(scope) {
            code.push_str(&self.host_binding(ctx));
        }

        code
    }
}

/// Render every scope with a reachable entity, then the driver file
pub fn emit_all(grammar: &dyn TargetGrammar, ctx: &EmitContext<'_>) -> Vec<GeneratedFile> {
    let mut files: Vec<GeneratedFile> = ctx
        .scopes()
        .into_iter()
        .map(|scope| GeneratedFile {
            file_name: format!("{scope}.{}", grammar.extension()),
            contents: grammar.emit_scope(ctx, scope),
        })
        .collect();

    files.extend(grammar.driver(ctx));
    files
}
