#![allow(non_snake_case)]

use super::*;
use crate::error::Error;
use tempfile::TempDir;
use test_case::test_case;

fn config(extra: &str) -> Configuration {
    let json = format!(
        r#"{{
            "protocol": "demo",
            "scopes": ["main", "common"],
            "entryPoint": "main.Packet",
            "customFieldTypes": {{ "MacAddr": "bytes", "Port": "uint16" }}
            {extra}
        }}"#
    );
    Configuration::from_json(&json).unwrap()
}

fn load(config: &Configuration, docs: &[(&str, &str)]) -> Result<Schema, SchemaError> {
    let mut loader = SchemaLoader::new(config)?;
    for (index, (scope, content)) in docs.iter().enumerate() {
        loader.add_document(scope, &format!("{scope}/doc{index}.json"), content)?;
    }
    loader.finish()
}

#[test]
fn SchemaLoader___finish___resolves_primitives_aliases_and_entities() {
    let config = config("");
    let schema = load(
        &config,
        &[
            (
                "main",
                r#"{ "kind": "object", "name": "Packet", "fields": [
                    { "name": "len", "type": "uint8" },
                    { "name": "src", "type": "MacAddr" },
                    { "name": "hdr", "type": "common.Header" } ] }"#,
            ),
            (
                "common",
                r#"{ "kind": "object", "name": "Header", "fields": [ { "name": "v", "type": "uint8" } ] }"#,
            ),
        ],
    )
    .unwrap();

    let packet = schema
        .get(&TypeKey::normalize("main", Kind::Object, "Packet"))
        .unwrap();
    let EntityBody::Object(object) = &packet.body else {
        panic!("expected object");
    };
    assert_eq!(object.fields[0].ty, TypeRef::Primitive(Primitive::Uint8));
    assert_eq!(
        object.fields[1].ty,
        TypeRef::Entity(TypeKey::normalize(DEFAULT_SCOPE, Kind::Custom, "MacAddr"))
    );
    assert_eq!(
        object.fields[2].ty,
        TypeRef::Entity(TypeKey::normalize("common", Kind::Object, "Header"))
    );
}

#[test]
fn SchemaLoader___finish___forward_references_resolve() {
    let config = config("");
    let schema = load(
        &config,
        &[(
            "main",
            r#"[
                { "kind": "object", "name": "Packet", "fields": [ { "name": "k", "type": "Kind" } ] },
                { "kind": "enum", "name": "Kind", "values": [ { "label": "A", "value": 1 } ] }
            ]"#,
        )],
    )
    .unwrap();

    assert!(schema.contains(&TypeKey::normalize("main", Kind::Enum, "Kind")));
}

#[test]
fn SchemaLoader___finish___array_documents_keep_declaration_order() {
    let config = config("");
    let schema = load(
        &config,
        &[(
            "main",
            r#"[
                { "kind": "object", "name": "Zed", "fields": [] },
                { "kind": "object", "name": "Alpha", "fields": [] }
            ]"#,
        )],
    )
    .unwrap();

    let names: Vec<&str> = schema.scope_entities("main").map(|e| e.key.name()).collect();
    assert_eq!(names, vec!["Zed", "Alpha"]);
}

#[test]
fn SchemaLoader___finish___custom_aliases_live_in_default_scope() {
    let config = config("");
    let schema = load(&config, &[]).unwrap();

    let key = TypeKey::normalize(DEFAULT_SCOPE, Kind::Custom, "Port");
    let alias = schema.get(&key).unwrap();
    assert_eq!(alias.body, EntityBody::Custom(Primitive::Uint16));
    assert!(alias.origin.contains(CONFIG_FILE));
}

#[test]
fn SchemaLoader___add_document___unknown_kind___fails() {
    let config = config("");
    let err = load(&config, &[("main", r#"{ "kind": "union", "name": "U" }"#)]).unwrap_err();

    match err {
        SchemaError::UnknownKind { origin, kind } => {
            assert_eq!(kind, "union");
            assert_eq!(origin, "main/doc0.json");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn SchemaLoader___add_document___missing_kind___is_malformed() {
    let config = config("");
    let err = load(&config, &[("main", r#"{ "name": "Packet", "fields": [] }"#)]).unwrap_err();

    assert!(matches!(err, SchemaError::Malformed { .. }));
}

#[test]
fn SchemaLoader___add_document___invalid_json___is_malformed() {
    let config = config("");
    let err = load(&config, &[("main", "{ not json")]).unwrap_err();

    assert!(matches!(err, SchemaError::Malformed { .. }));
}

#[test]
fn SchemaLoader___add_document___array_records_carry_index_in_origin() {
    let config = config("");
    let err = load(
        &config,
        &[(
            "main",
            r#"[ { "kind": "object", "name": "A", "fields": [] }, { "kind": "nope", "name": "B" } ]"#,
        )],
    )
    .unwrap_err();

    match err {
        SchemaError::UnknownKind { origin, .. } => assert_eq!(origin, "main/doc0.json#1"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn SchemaLoader___add_document___duplicate_across_files___names_both_origins() {
    let config = config("");
    let err = load(
        &config,
        &[
            ("main", r#"{ "kind": "object", "name": "Packet", "fields": [] }"#),
            ("Main", r#"{ "kind": "object", "name": "Packet", "fields": [] }"#),
        ],
    )
    .unwrap_err();

    match err {
        SchemaError::DuplicateDefinition { key, detail } => {
            assert_eq!(key, "main.object.Packet");
            assert!(detail.contains("main/doc0.json"));
            assert!(detail.contains("Main/doc1.json"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn SchemaLoader___finish___unresolved_reference___names_entity_and_reference() {
    let config = config("");
    let err = load(
        &config,
        &[(
            "main",
            r#"{ "kind": "object", "name": "Packet", "fields": [ { "name": "x", "type": "Missing" } ] }"#,
        )],
    )
    .unwrap_err();

    match err {
        SchemaError::UnresolvedType {
            entity, reference, ..
        } => {
            assert_eq!(entity, "main.object.Packet");
            assert_eq!(reference, "Missing");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn SchemaLoader___finish___unqualified_reference_does_not_reach_sibling_scope() {
    let config = config("");
    let err = load(
        &config,
        &[
            (
                "main",
                r#"{ "kind": "object", "name": "Packet", "fields": [ { "name": "h", "type": "Header" } ] }"#,
            ),
            ("common", r#"{ "kind": "object", "name": "Header", "fields": [] }"#),
        ],
    )
    .unwrap_err();

    assert!(matches!(err, SchemaError::UnresolvedType { .. }));
}

#[test]
fn SchemaLoader___finish___ambiguous_name___needs_type_kind() {
    let config = config("");
    let docs = [
        (
            "main",
            r#"[
                { "kind": "object", "name": "Kind", "fields": [] },
                { "kind": "enum", "name": "Kind", "values": [ { "label": "A", "value": 1 } ] },
                { "kind": "object", "name": "Packet", "fields": [ { "name": "k", "type": "Kind" } ] }
            ]"#,
        ),
    ];
    let err = load(&config, &docs).unwrap_err();
    match err {
        SchemaError::UnresolvedType { detail, .. } => {
            assert!(detail.unwrap().contains("ambiguous"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let hinted = [(
        "main",
        r#"[
            { "kind": "object", "name": "Kind", "fields": [] },
            { "kind": "enum", "name": "Kind", "values": [ { "label": "A", "value": 1 } ] },
            { "kind": "object", "name": "Packet", "fields": [ { "name": "k", "type": "Kind", "typeKind": "enum" } ] }
        ]"#,
    )];
    assert!(load(&config, &hinted).is_ok());
}

#[test]
fn SchemaLoader___finish___count_field_must_precede() {
    let config = config("");
    let err = load(
        &config,
        &[(
            "main",
            r#"{ "kind": "object", "name": "Packet", "fields": [
                { "name": "items", "type": "uint8", "repeat": { "countField": "n" } },
                { "name": "n", "type": "uint8" } ] }"#,
        )],
    )
    .unwrap_err();

    assert!(matches!(err, SchemaError::Malformed { .. }));
}

#[test]
fn SchemaLoader___finish___duplicate_field_name___fails() {
    let config = config("");
    let err = load(
        &config,
        &[(
            "main",
            r#"{ "kind": "object", "name": "Packet", "fields": [
                { "name": "a", "type": "uint8" }, { "name": "a", "type": "uint16" } ] }"#,
        )],
    )
    .unwrap_err();

    match err {
        SchemaError::DuplicateDefinition { key, .. } => assert_eq!(key, "main.object.Packet.a"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn SchemaLoader___finish___switch_control_must_be_earlier_sibling() {
    let config = config("");
    let err = load(
        &config,
        &[(
            "main",
            r#"[
                { "kind": "switch", "name": "Body", "on": "kind", "cases": [ { "value": 1, "type": "uint8" } ] },
                { "kind": "object", "name": "Packet", "fields": [
                    { "name": "body", "type": "Body" },
                    { "name": "kind", "type": "uint8" } ] }
            ]"#,
        )],
    )
    .unwrap_err();

    match err {
        SchemaError::Malformed { detail, .. } => assert!(detail.contains("switches on 'kind'")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn SchemaLoader___finish___two_default_cases___fails() {
    let config = config("");
    let err = load(
        &config,
        &[(
            "main",
            r#"{ "kind": "switch", "name": "Body", "on": "k", "cases": [
                { "default": true, "type": "uint8" }, { "default": true, "type": "uint16" } ] }"#,
        )],
    )
    .unwrap_err();

    assert!(matches!(err, SchemaError::DuplicateDefaultCase { .. }));
}

#[test]
fn SchemaLoader___finish___repeated_case_value___fails() {
    let config = config("");
    let err = load(
        &config,
        &[(
            "main",
            r#"{ "kind": "switch", "name": "Body", "on": "k", "cases": [
                { "value": 1, "type": "uint8" }, { "value": 1, "type": "uint16" } ] }"#,
        )],
    )
    .unwrap_err();

    assert!(matches!(err, SchemaError::DuplicateDefinition { .. }));
}

#[test]
fn SchemaLoader___finish___case_with_value_and_default___is_malformed() {
    let config = config("");
    let err = load(
        &config,
        &[(
            "main",
            r#"{ "kind": "switch", "name": "Body", "on": "k", "cases": [
                { "value": 1, "default": true, "type": "uint8" } ] }"#,
        )],
    )
    .unwrap_err();

    assert!(matches!(err, SchemaError::Malformed { .. }));
}

#[test]
fn SchemaLoader___finish___bitfield_overflow___reports_used_and_width() {
    let config = config("");
    let err = load(
        &config,
        &[(
            "main",
            r#"{ "kind": "bitfield", "name": "Flags", "width": 8, "fields": [
                { "name": "a", "bits": 5 }, { "name": "b", "bits": 4 } ] }"#,
        )],
    )
    .unwrap_err();

    match err {
        SchemaError::BitfieldWidthOverflow { used, width, .. } => {
            assert_eq!(used, 9);
            assert_eq!(width, 8);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn SchemaLoader___finish___bitfield_underfill___implicit_padding_ok() {
    let config = config("");
    let schema = load(
        &config,
        &[(
            "main",
            r#"{ "kind": "bitfield", "name": "Flags", "width": 8, "fields": [ { "name": "a", "bits": 3 } ] }"#,
        )],
    )
    .unwrap();

    assert_eq!(schema.len(), 3);
}

#[test]
fn SchemaLoader___finish___bitfield_underfill___explicit_padding_fails() {
    let config = config(r#", "bitfieldPadding": "explicit""#);
    let err = load(
        &config,
        &[(
            "main",
            r#"{ "kind": "bitfield", "name": "Flags", "width": 8, "fields": [ { "name": "a", "bits": 3 } ] }"#,
        )],
    )
    .unwrap_err();

    assert!(matches!(
        err,
        SchemaError::BitfieldPaddingUndeclared {
            used: 3,
            width: 8,
            ..
        }
    ));
}

#[test]
fn SchemaLoader___finish___bitfield_declared_padding_satisfies_explicit_policy() {
    let config = config(r#", "bitfieldPadding": "explicit""#);
    let result = load(
        &config,
        &[(
            "main",
            r#"{ "kind": "bitfield", "name": "Flags", "width": 8, "fields": [
                { "name": "a", "bits": 3 }, { "name": "_reserved", "bits": 5 } ] }"#,
        )],
    );

    assert!(result.is_ok());
}

#[test]
fn SchemaLoader___finish___bitfield_odd_width___fails() {
    let config = config("");
    let err = load(
        &config,
        &[(
            "main",
            r#"{ "kind": "bitfield", "name": "Flags", "width": 12, "fields": [ { "name": "a", "bits": 3 } ] }"#,
        )],
    )
    .unwrap_err();

    assert!(matches!(err, SchemaError::InvalidBitfieldWidth { .. }));
}

#[test]
fn SchemaLoader___finish___bitfield_sub_field_may_not_be_object() {
    let config = config("");
    let err = load(
        &config,
        &[(
            "main",
            r#"[
                { "kind": "object", "name": "Inner", "fields": [] },
                { "kind": "bitfield", "name": "Flags", "width": 8, "fields": [ { "name": "a", "bits": 3, "type": "Inner" } ] }
            ]"#,
        )],
    )
    .unwrap_err();

    assert!(matches!(err, SchemaError::Malformed { .. }));
}

#[test]
fn SchemaLoader___finish___enum_repeated_value___fails() {
    let config = config("");
    let err = load(
        &config,
        &[(
            "main",
            r#"{ "kind": "enum", "name": "Op", "values": [
                { "label": "Read", "value": 1 }, { "label": "Write", "value": 1 } ] }"#,
        )],
    )
    .unwrap_err();

    assert!(matches!(err, SchemaError::DuplicateEnumValueOrLabel { .. }));
}

#[test]
fn SchemaLoader___finish___enum_repeated_label___fails() {
    let config = config("");
    let err = load(
        &config,
        &[(
            "main",
            r#"{ "kind": "enum", "name": "Op", "values": [
                { "label": "Read", "value": 1 }, { "label": "Read", "value": 2 } ] }"#,
        )],
    )
    .unwrap_err();

    assert!(matches!(err, SchemaError::DuplicateEnumValueOrLabel { .. }));
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn load_scopes___walks_nested_directories_and_skips_config() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "config.json", "{}");
    write(
        root,
        "main/packet.json",
        r#"{ "kind": "object", "name": "Packet", "fields": [ { "name": "h", "type": "common.Header" } ] }"#,
    );
    write(
        root,
        "common/nested/header.json",
        r#"{ "kind": "object", "name": "Header", "fields": [] }"#,
    );
    write(root, "common/README.txt", "not an entity");

    let schema = load_scopes(root, &config("")).unwrap();

    let header = schema
        .get(&TypeKey::normalize("common", Kind::Object, "Header"))
        .unwrap();
    assert!(header.origin.ends_with("header.json"));
    assert!(schema.contains(&TypeKey::normalize("main", Kind::Object, "Packet")));
}

#[test]
fn load_scopes___missing_scope_directory___is_read_failure() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "main/packet.json",
        r#"{ "kind": "object", "name": "Packet", "fields": [] }"#,
    );

    let err = load_scopes(temp.path(), &config("")).unwrap_err();

    assert!(matches!(err, Error::Io(IoError::ReadFailure { .. })));
}

#[test]
fn entity_files___sorted_by_path() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "b.json", "{}");
    write(temp.path(), "a/z.json", "{}");
    write(temp.path(), "a.json", "{}");

    let files = entity_files(temp.path()).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.strip_prefix(temp.path()).unwrap().display().to_string())
        .collect();

    // components compare individually, so the directory `a` sorts before `a.json`
    assert_eq!(names, vec!["a/z.json", "a.json", "b.json"]);
}

#[cfg(unix)]
#[test]
fn load_scopes___symlink_back_into_scope___not_followed() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(
        root,
        "main/a.json",
        r#"{ "kind": "object", "name": "Packet", "fields": [] }"#,
    );
    fs::create_dir_all(root.join("common")).unwrap();
    std::os::unix::fs::symlink(root.join("main"), root.join("main/loop")).unwrap();

    let schema = load_scopes(root, &config("")).unwrap();

    assert_eq!(schema.scope_entities("main").count(), 1);
    assert_eq!(entity_files(&root.join("main")).unwrap().len(), 1);
}

#[test]
fn SchemaLoader___finish___type_names_colliding_after_sanitizing___fail() {
    let config = config("");

    let err = load(
        &config,
        &[(
            "main",
            r#"[
                { "kind": "object", "name": "a-b", "fields": [ { "name": "x", "type": "uint8" } ] },
                { "kind": "object", "name": "a_b", "fields": [ { "name": "x", "type": "uint8" } ] }
            ]"#,
        )],
    )
    .unwrap_err();

    match err {
        SchemaError::DuplicateDefinition { key, detail } => {
            assert_eq!(key, "main.object.a_b");
            assert!(detail.contains("both render as 'a_b'"), "{detail}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn SchemaLoader___finish___kind_suffix_colliding_with_plain_name___fails() {
    let config = config("");

    let err = load(
        &config,
        &[(
            "main",
            r#"[
                { "kind": "enum", "name": "Mode", "values": [ { "label": "A", "value": 1 } ] },
                { "kind": "object", "name": "Mode", "fields": [] },
                { "kind": "object", "name": "Mode_enum", "fields": [] }
            ]"#,
        )],
    )
    .unwrap_err();

    assert!(matches!(err, SchemaError::DuplicateDefinition { .. }));
}

#[test]
fn SchemaLoader___finish___field_names_colliding_after_sanitizing___fail() {
    let config = config("");

    let err = load(
        &config,
        &[(
            "main",
            r#"{ "kind": "object", "name": "Packet", "fields": [
                { "name": "msg-id", "type": "uint8" },
                { "name": "msg_id", "type": "uint8" } ] }"#,
        )],
    )
    .unwrap_err();

    match err {
        SchemaError::DuplicateDefinition { key, detail } => {
            assert_eq!(key, "main.object.Packet.msg_id");
            assert!(detail.contains("'msg-id' and 'msg_id'"), "{detail}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn SchemaLoader___finish___enum_labels_colliding_after_sanitizing___fail() {
    let config = config("");

    let err = load(
        &config,
        &[(
            "main",
            r#"{ "kind": "enum", "name": "Op", "values": [
                { "label": "read only", "value": 1 },
                { "label": "read-only", "value": 2 } ] }"#,
        )],
    )
    .unwrap_err();

    assert!(matches!(err, SchemaError::DuplicateDefinition { .. }));
}

#[test]
fn SchemaLoader___finish___same_case_name_in_several_cases___allowed() {
    let config = config("");

    let schema = load(
        &config,
        &[(
            "main",
            r#"[
                { "kind": "switch", "name": "Body", "on": "op", "cases": [
                    { "value": 1, "type": "uint8", "name": "v" },
                    { "value": 2, "type": "uint8", "name": "v" } ] },
                { "kind": "object", "name": "Packet", "fields": [
                    { "name": "op", "type": "uint8" },
                    { "name": "body", "type": "Body" } ] }
            ]"#,
        )],
    );

    assert!(schema.is_ok());
}

#[test_case(8, 300)]
#[test_case(8, 256)]
#[test_case(8, -1)]
#[test_case(16, 65536)]
fn SchemaLoader___finish___enum_value_outside_backing_width___fails(width: u32, value: i64) {
    let config = config("");
    let doc = format!(
        r#"{{ "kind": "enum", "name": "Op", "width": {width}, "values": [ {{ "label": "A", "value": {value} }} ] }}"#
    );

    let err = load(&config, &[("main", &doc)]).unwrap_err();

    assert!(
        matches!(&err, SchemaError::Malformed { detail, .. } if detail.contains("does not fit")),
        "{err}"
    );
}

#[test_case(8, 255)]
#[test_case(16, 65535)]
#[test_case(64, i64::MAX)]
fn SchemaLoader___finish___enum_value_at_width_limit___loads(width: u32, value: i64) {
    let config = config("");
    let doc = format!(
        r#"{{ "kind": "enum", "name": "Op", "width": {width}, "values": [ {{ "label": "A", "value": {value} }} ] }}"#
    );

    assert!(load(&config, &[("main", &doc)]).is_ok());
}
