//! Directed type graph
//!
//! One node per loaded entity, one edge per entity reference. Every node is
//! present even when it has no outgoing edges, and targets are always nodes
//! (the loader has already rejected unresolved references).

use crate::error::GraphError;
use crate::key::{Kind, TypeKey};
use crate::schema::{EntityBody, Schema};
use std::collections::{BTreeMap, BTreeSet};

/// An object field typed as a switch, and the sibling that selects the case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchUse {
    pub object: TypeKey,
    pub field: String,
    pub control: String,
    /// Enum type of the control field; `None` when it is an integer
    pub selector: Option<TypeKey>,
}

#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    edges: BTreeMap<TypeKey, BTreeSet<TypeKey>>,
    switch_uses: BTreeMap<TypeKey, Vec<SwitchUse>>,
}

impl TypeGraph {
    /// Build the graph for every entity in `schema`
    pub fn build(schema: &Schema) -> Self {
        let mut graph = TypeGraph::default();

        for entity in schema.entities() {
            let targets = graph.edges.entry(entity.key.clone()).or_default();
            targets.extend(entity.references().into_iter().cloned());

            let EntityBody::Object(object) = &entity.body else {
                continue;
            };
            for field in &object.fields {
                let Some(switch_key) = field.ty.key().filter(|k| k.kind() == Kind::Switch) else {
                    continue;
                };
                let Some(switch) = schema.switch(switch_key) else {
                    continue;
                };
                let selector = object
                    .fields
                    .iter()
                    .find(|f| f.name == switch.on)
                    .and_then(|control| control.ty.key())
                    .filter(|k| k.kind() == Kind::Enum)
                    .cloned();
                graph
                    .switch_uses
                    .entry(switch_key.clone())
                    .or_default()
                    .push(SwitchUse {
                        object: entity.key.clone(),
                        field: field.name.clone(),
                        control: switch.on.clone(),
                        selector,
                    });
            }
        }

        graph
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.edges.contains_key(key)
    }

    /// Direct dependencies of `key`, sorted
    pub fn successors(&self, key: &TypeKey) -> impl Iterator<Item = &TypeKey> {
        self.edges.get(key).into_iter().flatten()
    }

    /// Every node, sorted
    pub fn nodes(&self) -> impl Iterator<Item = &TypeKey> {
        self.edges.keys()
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Objects that embed the switch `key`
    pub fn switch_uses(&self, key: &TypeKey) -> &[SwitchUse] {
        self.switch_uses.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Enum the switch `key` selects on, judged only by uses in `reachable`
    ///
    /// Unreachable objects never influence the result. Reachable uses whose
    /// control fields disagree (two enums, or an enum and an integer) are a
    /// [`GraphError::ConflictingSelector`].
    pub fn selector_enum(
        &self,
        key: &TypeKey,
        reachable: &BTreeSet<TypeKey>,
    ) -> Result<Option<&TypeKey>, GraphError> {
        let mut live = self
            .switch_uses(key)
            .iter()
            .filter(|switch_use| reachable.contains(&switch_use.object));

        let Some(first) = live.next() else {
            return Ok(None);
        };
        if let Some(other) = live.find(|switch_use| switch_use.selector != first.selector) {
            return Err(GraphError::ConflictingSelector {
                switch: key.to_string(),
                detail: format!(
                    "{}.{} selects on {} but {}.{} selects on {}",
                    first.object,
                    first.control,
                    describe(first.selector.as_ref()),
                    other.object,
                    other.control,
                    describe(other.selector.as_ref()),
                ),
            });
        }
        Ok(first.selector.as_ref())
    }
}

fn describe(selector: Option<&TypeKey>) -> String {
    selector.map_or_else(|| "an integer".to_string(), |key| key.to_string())
}
