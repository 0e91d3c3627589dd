//! Scope loading and type resolution
//!
//! Every configured scope is a directory of `*.json` entity files. Each file
//! holds one record or an array of records, and every record names its kind
//! explicitly:
//!
//! ```json
//! { "kind": "object", "name": "Packet", "fields": [
//!     { "name": "hdr", "type": "common.Header" },
//!     { "name": "n", "type": "uint8" },
//!     { "name": "items", "type": "Item", "repeat": { "countField": "n" } } ] }
//! ```
//!
//! Loading happens in two passes. The first decodes records and claims their
//! keys, so forward and cross-scope references work regardless of file order.
//! The second resolves type references and validates each entity.

use crate::codegen::naming::{identifier, type_identifier};
use crate::config::{CONFIG_FILE, Configuration, PaddingPolicy};
use crate::error::{GenResult, IoError, SchemaError};
use crate::key::{DEFAULT_SCOPE, KeyRegistry, Kind, TypeKey};
use crate::schema::{
    BitRange, Bitfield, Case, Entity, EntityBody, EnumValue, Enumeration, Field, Object,
    Primitive, Repeat, Schema, Switch, TypeRef,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

const KNOWN_KINDS: [&str; 4] = ["object", "switch", "bitfield", "enum"];
const VALID_WIDTHS: [u32; 4] = [8, 16, 32, 64];

fn default_enum_width() -> u32 {
    8
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum RawEntity {
    Object(RawObject),
    Switch(RawSwitch),
    Bitfield(RawBitfield),
    Enum(RawEnum),
}

impl RawEntity {
    fn name(&self) -> &str {
        match self {
            RawEntity::Object(o) => &o.name,
            RawEntity::Switch(s) => &s.name,
            RawEntity::Bitfield(b) => &b.name,
            RawEntity::Enum(e) => &e.name,
        }
    }

    fn kind(&self) -> Kind {
        match self {
            RawEntity::Object(_) => Kind::Object,
            RawEntity::Switch(_) => Kind::Switch,
            RawEntity::Bitfield(_) => Kind::Bitfield,
            RawEntity::Enum(_) => Kind::Enum,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawObject {
    name: String,
    #[serde(default)]
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    type_kind: Option<Kind>,
    #[serde(default)]
    repeat: Option<Repeat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSwitch {
    name: String,
    on: String,
    cases: Vec<RawCase>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCase {
    #[serde(default)]
    value: Option<i64>,
    #[serde(default)]
    default: bool,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    type_kind: Option<Kind>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBitfield {
    name: String,
    width: u32,
    fields: Vec<RawBitRange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBitRange {
    name: String,
    bits: u32,
    #[serde(default, rename = "type")]
    ty: Option<String>,
    #[serde(default)]
    type_kind: Option<Kind>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnum {
    name: String,
    #[serde(default = "default_enum_width")]
    width: u32,
    values: Vec<RawEnumValue>,
}

#[derive(Debug, Deserialize)]
struct RawEnumValue {
    label: String,
    value: i64,
}

#[derive(Debug)]
struct Pending {
    key: TypeKey,
    origin: String,
    raw: RawEntity,
}

/// Two-pass schema builder
///
/// Feed it documents with [`add_document`](Self::add_document), then call
/// [`finish`](Self::finish) to resolve references and validate.
#[derive(Debug)]
pub struct SchemaLoader<'a> {
    config: &'a Configuration,
    registry: KeyRegistry,
    pending: Vec<Pending>,
}

impl<'a> SchemaLoader<'a> {
    /// Create a loader; custom aliases from the configuration are registered
    /// in the default scope up front
    pub fn new(config: &'a Configuration) -> Result<Self, SchemaError> {
        let mut registry = KeyRegistry::new();
        for alias in config.custom_field_types.keys() {
            registry.register(
                DEFAULT_SCOPE,
                Kind::Custom,
                alias,
                format!("{CONFIG_FILE} customFieldTypes"),
            )?;
        }

        Ok(Self {
            config,
            registry,
            pending: Vec::new(),
        })
    }

    /// Add the contents of one entity file; returns the number of records
    pub fn add_document(
        &mut self,
        scope: &str,
        origin: &str,
        content: &str,
    ) -> Result<usize, SchemaError> {
        let value: Value = serde_json::from_str(content).map_err(|e| SchemaError::Malformed {
            origin: origin.to_string(),
            detail: e.to_string(),
        })?;

        match value {
            Value::Array(records) => {
                let count = records.len();
                for (index, record) in records.into_iter().enumerate() {
                    self.add_record(scope, &format!("{origin}#{index}"), record)?;
                }
                Ok(count)
            }
            record => {
                self.add_record(scope, origin, record)?;
                Ok(1)
            }
        }
    }

    fn add_record(&mut self, scope: &str, origin: &str, record: Value) -> Result<(), SchemaError> {
        let raw = decode(origin, record)?;
        if raw.name().trim().is_empty() {
            return Err(SchemaError::Malformed {
                origin: origin.to_string(),
                detail: "entity name cannot be empty".to_string(),
            });
        }
        let key = self
            .registry
            .register(scope, raw.kind(), raw.name(), origin)?;
        trace!(key = %key, origin, "registered entity");
        self.pending.push(Pending {
            key,
            origin: origin.to_string(),
            raw,
        });
        Ok(())
    }

    /// Resolve every reference, validate every entity, and build the schema
    pub fn finish(self) -> Result<Schema, SchemaError> {
        let mut schema = Schema::new();

        for pending in &self.pending {
            let body = match &pending.raw {
                RawEntity::Object(raw) => EntityBody::Object(self.build_object(pending, raw)?),
                RawEntity::Switch(raw) => EntityBody::Switch(self.build_switch(pending, raw)?),
                RawEntity::Bitfield(raw) => {
                    EntityBody::Bitfield(self.build_bitfield(pending, raw)?)
                }
                RawEntity::Enum(raw) => EntityBody::Enum(build_enum(pending, raw)?),
            };
            schema.insert(Entity {
                key: pending.key.clone(),
                origin: pending.origin.clone(),
                body,
            });
        }

        for (alias, primitive) in &self.config.custom_field_types {
            schema.insert(Entity {
                key: TypeKey::normalize(DEFAULT_SCOPE, Kind::Custom, alias),
                origin: format!("{CONFIG_FILE} customFieldTypes"),
                body: EntityBody::Custom(*primitive),
            });
        }

        check_switch_controls(&schema)?;
        check_rendered_names(&schema)?;

        Ok(schema)
    }

    /// Resolve a type reference written inside `entity`
    ///
    /// Lookup order: primitive, then an entity in the referencing scope, then
    /// the default scope (where custom aliases live). `scope.Name` skips the
    /// fallback. `hint` restricts the kinds considered.
    fn resolve_type(
        &self,
        entity: &TypeKey,
        reference: &str,
        hint: Option<Kind>,
    ) -> Result<TypeRef, SchemaError> {
        let reference = reference.trim();
        if hint.is_none() {
            if let Some(primitive) = Primitive::parse(reference) {
                return Ok(TypeRef::Primitive(primitive));
            }
        }

        let kinds: Vec<Kind> = match hint {
            Some(kind) => vec![kind],
            None => Kind::ALL.to_vec(),
        };

        let parts: Vec<&str> = reference.split('.').collect();
        let mut candidates = match parts.as_slice() {
            [name] => {
                let local = self.registry.lookup(entity.scope(), name, &kinds);
                if local.is_empty() {
                    self.registry.lookup(DEFAULT_SCOPE, name, &kinds)
                } else {
                    local
                }
            }
            [scope, name] => self.registry.lookup(scope, name, &kinds),
            _ => Vec::new(),
        };

        match candidates.len() {
            1 => Ok(TypeRef::Entity(candidates.remove(0))),
            0 => Err(SchemaError::UnresolvedType {
                entity: entity.to_string(),
                reference: reference.to_string(),
                detail: None,
            }),
            _ => Err(SchemaError::UnresolvedType {
                entity: entity.to_string(),
                reference: reference.to_string(),
                detail: Some(format!(
                    "ambiguous between {}; add a typeKind",
                    candidates
                        .iter()
                        .map(|k| k.kind().as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )),
            }),
        }
    }

    fn build_object(&self, pending: &Pending, raw: &RawObject) -> Result<Object, SchemaError> {
        let mut fields: Vec<Field> = Vec::with_capacity(raw.fields.len());

        for raw_field in &raw.fields {
            let name = raw_field.name.trim();
            check_member_name(pending, name)?;
            if fields.iter().any(|f| f.name == name) {
                return Err(duplicate_member(pending, name));
            }

            if let Some(Repeat::CountField(counter)) = &raw_field.repeat {
                if !fields.iter().any(|f| f.name == counter.as_str()) {
                    return Err(SchemaError::Malformed {
                        origin: pending.origin.clone(),
                        detail: format!(
                            "field '{name}' is counted by '{counter}', which is not an earlier field"
                        ),
                    });
                }
            }

            let ty = self.resolve_type(&pending.key, &raw_field.ty, raw_field.type_kind)?;
            fields.push(Field {
                name: name.to_string(),
                ty,
                repeat: raw_field.repeat.clone(),
            });
        }

        Ok(Object { fields })
    }

    fn build_switch(&self, pending: &Pending, raw: &RawSwitch) -> Result<Switch, SchemaError> {
        if raw.on.trim().is_empty() {
            return Err(SchemaError::Malformed {
                origin: pending.origin.clone(),
                detail: "switch needs a controlling field in \"on\"".to_string(),
            });
        }
        if raw.cases.is_empty() {
            return Err(SchemaError::Malformed {
                origin: pending.origin.clone(),
                detail: "switch has no cases".to_string(),
            });
        }

        let mut cases = Vec::with_capacity(raw.cases.len());
        let mut values = BTreeSet::new();
        let mut has_default = false;

        for raw_case in &raw.cases {
            let value = match (raw_case.value, raw_case.default) {
                (Some(value), false) => {
                    if !values.insert(value) {
                        return Err(SchemaError::DuplicateDefinition {
                            key: pending.key.to_string(),
                            detail: format!("case {value} declared twice"),
                        });
                    }
                    Some(value)
                }
                (None, true) => {
                    if has_default {
                        return Err(SchemaError::DuplicateDefaultCase {
                            entity: pending.key.to_string(),
                        });
                    }
                    has_default = true;
                    None
                }
                _ => {
                    return Err(SchemaError::Malformed {
                        origin: pending.origin.clone(),
                        detail: "each case needs exactly one of \"value\" or \"default\""
                            .to_string(),
                    });
                }
            };

            let ty = self.resolve_type(&pending.key, &raw_case.ty, raw_case.type_kind)?;
            if ty.key().is_some_and(|k| k.kind() == Kind::Switch) {
                return Err(SchemaError::Malformed {
                    origin: pending.origin.clone(),
                    detail: format!("case type '{}' cannot be another switch", raw_case.ty),
                });
            }

            cases.push(Case {
                value,
                name: raw_case
                    .name
                    .as_ref()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
                ty,
            });
        }

        Ok(Switch {
            on: raw.on.trim().to_string(),
            cases,
        })
    }

    fn build_bitfield(
        &self,
        pending: &Pending,
        raw: &RawBitfield,
    ) -> Result<Bitfield, SchemaError> {
        let entity = pending.key.to_string();
        if !VALID_WIDTHS.contains(&raw.width) {
            return Err(SchemaError::InvalidBitfieldWidth {
                entity,
                detail: format!("width {} is not one of 8, 16, 32, 64", raw.width),
            });
        }

        let mut fields: Vec<BitRange> = Vec::with_capacity(raw.fields.len());
        let mut used: u64 = 0;

        for raw_range in &raw.fields {
            let name = raw_range.name.trim();
            check_member_name(pending, name)?;
            if fields.iter().any(|f| f.name == name) {
                return Err(duplicate_member(pending, name));
            }
            if raw_range.bits == 0 {
                return Err(SchemaError::InvalidBitfieldWidth {
                    entity,
                    detail: format!("sub-field '{name}' has zero bits"),
                });
            }
            used += u64::from(raw_range.bits);

            let ty = match &raw_range.ty {
                Some(reference) => {
                    let ty = self.resolve_type(&pending.key, reference, raw_range.type_kind)?;
                    self.check_bit_range_type(pending, name, &ty)?;
                    Some(ty)
                }
                None => None,
            };

            fields.push(BitRange {
                name: name.to_string(),
                bits: raw_range.bits,
                ty,
            });
        }

        let width = raw.width;
        if used > u64::from(width) {
            return Err(SchemaError::BitfieldWidthOverflow {
                entity,
                used: u32::try_from(used).unwrap_or(u32::MAX),
                width,
            });
        }
        let used = u32::try_from(used).unwrap_or(u32::MAX);
        if used < width && self.config.bitfield_padding == PaddingPolicy::Explicit {
            return Err(SchemaError::BitfieldPaddingUndeclared {
                entity,
                used,
                width,
            });
        }

        Ok(Bitfield { width, fields })
    }

    /// Bit ranges decode to integers, so only enums and integer types fit
    fn check_bit_range_type(
        &self,
        pending: &Pending,
        name: &str,
        ty: &TypeRef,
    ) -> Result<(), SchemaError> {
        let integer = match ty {
            TypeRef::Primitive(primitive) => primitive.bits().is_some(),
            TypeRef::Entity(key) => match key.kind() {
                Kind::Enum => true,
                Kind::Custom => self
                    .config
                    .custom_field_types
                    .get(key.name())
                    .is_some_and(|p| p.bits().is_some()),
                _ => false,
            },
        };

        if integer {
            Ok(())
        } else {
            Err(SchemaError::Malformed {
                origin: pending.origin.clone(),
                detail: format!(
                    "bitfield sub-field '{name}' may only use an enum or integer type"
                ),
            })
        }
    }
}

fn build_enum(pending: &Pending, raw: &RawEnum) -> Result<Enumeration, SchemaError> {
    if !VALID_WIDTHS.contains(&raw.width) {
        return Err(SchemaError::Malformed {
            origin: pending.origin.clone(),
            detail: format!("enum width {} is not one of 8, 16, 32, 64", raw.width),
        });
    }
    if raw.values.is_empty() {
        return Err(SchemaError::Malformed {
            origin: pending.origin.clone(),
            detail: "enum has no values".to_string(),
        });
    }

    let mut labels = BTreeSet::new();
    let mut numbers = BTreeSet::new();
    let mut values = Vec::with_capacity(raw.values.len());

    for raw_value in &raw.values {
        let label = raw_value.label.trim();
        check_member_name(pending, label)?;
        if !labels.insert(label) {
            return Err(SchemaError::DuplicateEnumValueOrLabel {
                entity: pending.key.to_string(),
                detail: format!("label '{label}' declared twice"),
            });
        }
        if !fits_unsigned(raw_value.value, raw.width) {
            return Err(SchemaError::Malformed {
                origin: pending.origin.clone(),
                detail: format!(
                    "enum {}: value {} of '{label}' does not fit the unsigned {}-bit backing type",
                    pending.key, raw_value.value, raw.width
                ),
            });
        }
        if !numbers.insert(raw_value.value) {
            return Err(SchemaError::DuplicateEnumValueOrLabel {
                entity: pending.key.to_string(),
                detail: format!("value {} used by more than one label", raw_value.value),
            });
        }
        values.push(EnumValue {
            label: label.to_string(),
            value: raw_value.value,
        });
    }

    Ok(Enumeration {
        width: raw.width,
        values,
    })
}

/// Enum values are read as `uint<width>` on the wire
fn fits_unsigned(value: i64, width: u32) -> bool {
    value >= 0 && (width >= 64 || value < (1_i64 << width))
}

/// Decode one record by its explicit `kind` discriminant
fn decode(origin: &str, record: Value) -> Result<RawEntity, SchemaError> {
    let kind = match record.get("kind") {
        Some(Value::String(kind)) => kind.clone(),
        Some(_) => {
            return Err(SchemaError::Malformed {
                origin: origin.to_string(),
                detail: "\"kind\" must be a string".to_string(),
            });
        }
        None => {
            return Err(SchemaError::Malformed {
                origin: origin.to_string(),
                detail: "missing \"kind\" discriminant".to_string(),
            });
        }
    };

    if !KNOWN_KINDS.contains(&kind.as_str()) {
        return Err(SchemaError::UnknownKind {
            origin: origin.to_string(),
            kind,
        });
    }

    serde_json::from_value(record).map_err(|e| SchemaError::Malformed {
        origin: origin.to_string(),
        detail: e.to_string(),
    })
}

fn check_member_name(pending: &Pending, name: &str) -> Result<(), SchemaError> {
    if name.is_empty() {
        Err(SchemaError::Malformed {
            origin: pending.origin.clone(),
            detail: format!("{} has a member with an empty name", pending.key),
        })
    } else {
        Ok(())
    }
}

fn duplicate_member(pending: &Pending, name: &str) -> SchemaError {
    SchemaError::DuplicateDefinition {
        key: format!("{}.{name}", pending.key),
        detail: format!("member declared twice in {}", pending.origin),
    }
}

/// A switch is dispatched on a field the containing object has already read
fn check_switch_controls(schema: &Schema) -> Result<(), SchemaError> {
    for entity in schema.entities() {
        let EntityBody::Object(object) = &entity.body else {
            continue;
        };
        for (index, field) in object.fields.iter().enumerate() {
            let Some(switch_key) = field.ty.key().filter(|k| k.kind() == Kind::Switch) else {
                continue;
            };
            let Some(switch) = schema.switch(switch_key) else {
                continue;
            };
            if !object.fields[..index].iter().any(|f| f.name == switch.on) {
                return Err(SchemaError::Malformed {
                    origin: entity.origin.clone(),
                    detail: format!(
                        "field '{}' uses {switch_key}, which switches on '{}', but {} has no earlier field of that name",
                        field.name, switch.on, entity.key
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Distinct names must stay distinct once sanitized into identifiers
fn check_rendered_names(schema: &Schema) -> Result<(), SchemaError> {
    for scope in schema.scopes() {
        let mut types: BTreeMap<String, &TypeKey> = BTreeMap::new();

        for entity in schema.scope_entities(scope) {
            let key = &entity.key;
            let rendered = type_identifier(
                key.name(),
                key.kind(),
                schema.shares_name_across_kinds(key),
            );
            if let Some(first) = types.insert(rendered.clone(), key) {
                return Err(SchemaError::DuplicateDefinition {
                    key: key.to_string(),
                    detail: format!("{first} and {key} both render as '{rendered}'"),
                });
            }

            let members: Vec<&str> = match &entity.body {
                EntityBody::Object(object) => {
                    object.fields.iter().map(|f| f.name.as_str()).collect()
                }
                EntityBody::Switch(switch) => switch
                    .cases
                    .iter()
                    .filter_map(|c| c.name.as_deref())
                    .collect(),
                EntityBody::Bitfield(bitfield) => bitfield
                    .fields
                    .iter()
                    .filter(|r| !r.is_padding())
                    .map(|r| r.name.as_str())
                    .collect(),
                EntityBody::Enum(enumeration) => {
                    enumeration.values.iter().map(|v| v.label.as_str()).collect()
                }
                EntityBody::Custom(_) => Vec::new(),
            };

            let mut seen: BTreeMap<String, &str> = BTreeMap::new();
            for member in members {
                let rendered = identifier(member);
                match seen.insert(rendered.clone(), member) {
                    Some(first) if first != member => {
                        return Err(SchemaError::DuplicateDefinition {
                            key: format!("{key}.{rendered}"),
                            detail: format!("'{first}' and '{member}' both render as '{rendered}'"),
                        });
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

/// Load every configured scope beneath `root`
pub fn load_scopes(root: &Path, config: &Configuration) -> GenResult<Schema> {
    let mut loader = SchemaLoader::new(config)?;

    for scope in &config.scopes {
        let files = entity_files(&root.join(scope))?;
        debug!(scope = %scope, files = files.len(), "loading scope");

        for file in files {
            let content = fs::read_to_string(&file).map_err(|source| IoError::ReadFailure {
                path: file.clone(),
                source,
            })?;
            let origin = file.strip_prefix(root).unwrap_or(&file).display().to_string();
            loader.add_document(scope, &origin, &content)?;
        }
    }

    let schema = loader.finish()?;
    debug!(entities = schema.len(), "schema loaded");
    Ok(schema)
}

/// All `*.json` files beneath `dir` except the configuration, sorted by path
///
/// Symbolic links are not followed, so a link back into the tree cannot load
/// the same entities twice.
fn entity_files(dir: &Path) -> Result<Vec<PathBuf>, IoError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| IoError::ReadFailure {
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if path.extension().is_some_and(|ext| ext == "json")
            && path.file_name().is_some_and(|name| name != CONFIG_FILE)
        {
            files.push(path);
        }
    }

    Ok(files)
}

#[cfg(test)]
#[path = "loader/loader_tests.rs"]
mod loader_tests;
