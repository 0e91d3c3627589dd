//! Resolved entity model
//!
//! The loader decodes raw JSON records, resolves their type references, and
//! produces a [`Schema`]. Nothing in a `Schema` changes after load; the type
//! graph and everything downstream only read it.

use crate::key::{Kind, TypeKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Built-in wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Bytes,
}

impl Primitive {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "uint8" => Some(Primitive::Uint8),
            "uint16" => Some(Primitive::Uint16),
            "uint32" => Some(Primitive::Uint32),
            "uint64" => Some(Primitive::Uint64),
            "int8" => Some(Primitive::Int8),
            "int16" => Some(Primitive::Int16),
            "int32" => Some(Primitive::Int32),
            "int64" => Some(Primitive::Int64),
            "bytes" => Some(Primitive::Bytes),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Primitive::Uint8 => "uint8",
            Primitive::Uint16 => "uint16",
            Primitive::Uint32 => "uint32",
            Primitive::Uint64 => "uint64",
            Primitive::Int8 => "int8",
            Primitive::Int16 => "int16",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::Bytes => "bytes",
        }
    }

    /// Integer width in bits; `None` for `bytes`
    pub fn bits(self) -> Option<u32> {
        match self {
            Primitive::Uint8 | Primitive::Int8 => Some(8),
            Primitive::Uint16 | Primitive::Int16 => Some(16),
            Primitive::Uint32 | Primitive::Int32 => Some(32),
            Primitive::Uint64 | Primitive::Int64 => Some(64),
            Primitive::Bytes => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved type reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Primitive(Primitive),
    /// Another entity, including custom aliases (`Kind::Custom`)
    Entity(TypeKey),
}

impl TypeRef {
    pub fn key(&self) -> Option<&TypeKey> {
        match self {
            TypeRef::Primitive(_) => None,
            TypeRef::Entity(key) => Some(key),
        }
    }
}

/// Repetition marker on a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Repeat {
    /// Fixed element count
    Count(u64),
    /// Element count read from an earlier sibling field
    CountField(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    pub repeat: Option<Repeat>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub fields: Vec<Field>,
}

/// One arm of a switch; `value: None` is the default arm
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub value: Option<i64>,
    pub name: Option<String>,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    /// Sibling field in the containing object whose value selects a case
    pub on: String,
    pub cases: Vec<Case>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitRange {
    pub name: String,
    pub bits: u32,
    pub ty: Option<TypeRef>,
}

impl BitRange {
    /// Sub-fields whose name starts with `_` declare padding
    pub fn is_padding(&self) -> bool {
        self.name.starts_with('_')
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bitfield {
    pub width: u32,
    pub fields: Vec<BitRange>,
}

impl Bitfield {
    /// Bits claimed by declared sub-fields, padding included
    pub fn used_bits(&self) -> u32 {
        self.fields.iter().map(|f| f.bits).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub label: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enumeration {
    /// Width of the backing unsigned integer on the wire
    pub width: u32,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityBody {
    Object(Object),
    Switch(Switch),
    Bitfield(Bitfield),
    Enum(Enumeration),
    Custom(Primitive),
}

/// A loaded entity
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub key: TypeKey,
    /// File (or config section) the entity came from, for diagnostics
    pub origin: String,
    pub body: EntityBody,
}

impl Entity {
    /// Every entity key this entity refers to, in declaration order
    pub fn references(&self) -> Vec<&TypeKey> {
        match &self.body {
            EntityBody::Object(object) => object
                .fields
                .iter()
                .filter_map(|field| field.ty.key())
                .collect(),
            EntityBody::Switch(switch) => switch
                .cases
                .iter()
                .filter_map(|case| case.ty.key())
                .collect(),
            EntityBody::Bitfield(bitfield) => bitfield
                .fields
                .iter()
                .filter_map(|range| range.ty.as_ref().and_then(TypeRef::key))
                .collect(),
            EntityBody::Enum(_) | EntityBody::Custom(_) => Vec::new(),
        }
    }
}

/// All entities of one run, indexed by key and ordered per scope
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: BTreeMap<TypeKey, Entity>,
    declaration_order: BTreeMap<String, Vec<TypeKey>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity; callers guarantee key uniqueness (see `KeyRegistry`)
    pub(crate) fn insert(&mut self, entity: Entity) {
        self.declaration_order
            .entry(entity.key.scope().to_string())
            .or_default()
            .push(entity.key.clone());
        self.entities.insert(entity.key.clone(), entity);
    }

    pub fn get(&self, key: &TypeKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.entities.contains_key(key)
    }

    /// All entities in key order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Scopes that own at least one entity, sorted
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.declaration_order.keys().map(String::as_str)
    }

    /// Entities of one scope in the order they were declared
    pub fn scope_entities<'a>(&'a self, scope: &str) -> impl Iterator<Item = &'a Entity> + 'a {
        self.declaration_order
            .get(scope)
            .into_iter()
            .flatten()
            .filter_map(|key| self.entities.get(key))
    }

    /// Whether the name of `key` is also declared under another kind in its scope
    pub fn shares_name_across_kinds(&self, key: &TypeKey) -> bool {
        Kind::ALL
            .iter()
            .filter(|kind| **kind != key.kind())
            .any(|kind| self.contains(&TypeKey::normalize(key.scope(), *kind, key.name())))
    }

    /// Look up a switch body
    pub fn switch(&self, key: &TypeKey) -> Option<&Switch> {
        match self.get(key).map(|e| &e.body) {
            Some(EntityBody::Switch(switch)) if key.kind() == Kind::Switch => Some(switch),
            _ => None,
        }
    }

    /// Look up an enum body
    pub fn enumeration(&self, key: &TypeKey) -> Option<&Enumeration> {
        match self.get(key).map(|e| &e.body) {
            Some(EntityBody::Enum(enumeration)) => Some(enumeration),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
