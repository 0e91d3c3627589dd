#![allow(non_snake_case)]

use super::*;
use crate::config::Configuration;
use crate::key::Kind;
use crate::loader::SchemaLoader;

fn graph(content: &str) -> TypeGraph {
    let config = Configuration::from_json(
        r#"{ "protocol": "demo", "scopes": ["main"], "entryPoint": "main.A" }"#,
    )
    .unwrap();
    let mut loader = SchemaLoader::new(&config).unwrap();
    loader.add_document("main", "main.json", content).unwrap();
    TypeGraph::build(&loader.finish().unwrap())
}

fn object(name: &str) -> TypeKey {
    TypeKey::normalize("main", Kind::Object, name)
}

fn names(set: &BTreeSet<TypeKey>) -> Vec<&str> {
    set.iter().map(TypeKey::name).collect()
}

#[test]
fn reachable_from___excludes_unreferenced_entities() {
    let graph = graph(
        r#"[
            { "kind": "object", "name": "A", "fields": [ { "name": "b", "type": "B" } ] },
            { "kind": "object", "name": "B", "fields": [] },
            { "kind": "object", "name": "Unused", "fields": [ { "name": "b", "type": "B" } ] }
        ]"#,
    );

    let reachable = reachable_from(&graph, &object("A")).unwrap();

    assert_eq!(names(&reachable), vec!["A", "B"]);
}

#[test]
fn reachable_from___two_node_cycle___terminates_with_both() {
    let graph = graph(
        r#"[
            { "kind": "object", "name": "A", "fields": [ { "name": "b", "type": "B" } ] },
            { "kind": "object", "name": "B", "fields": [ { "name": "a", "type": "A" } ] }
        ]"#,
    );

    let reachable = reachable_from(&graph, &object("A")).unwrap();

    assert_eq!(names(&reachable), vec!["A", "B"]);
}

#[test]
fn reachable_from___self_reference___terminates() {
    let graph = graph(
        r#"{ "kind": "object", "name": "A", "fields": [
            { "name": "n", "type": "uint8" },
            { "name": "next", "type": "A", "repeat": { "countField": "n" } } ] }"#,
    );

    let reachable = reachable_from(&graph, &object("A")).unwrap();

    assert_eq!(reachable.len(), 1);
}

#[test]
fn reachable_from___follows_switch_cases_and_bitfield_enums() {
    let graph = graph(
        r#"[
            { "kind": "object", "name": "A", "fields": [
                { "name": "op", "type": "uint8" },
                { "name": "flags", "type": "Flags" },
                { "name": "body", "type": "Body" } ] },
            { "kind": "bitfield", "name": "Flags", "width": 8, "fields": [ { "name": "m", "bits": 2, "type": "Mode" } ] },
            { "kind": "enum", "name": "Mode", "values": [ { "label": "X", "value": 0 } ] },
            { "kind": "switch", "name": "Body", "on": "op", "cases": [ { "value": 1, "type": "Login" } ] },
            { "kind": "object", "name": "Login", "fields": [] }
        ]"#,
    );

    let reachable = reachable_from(&graph, &object("A")).unwrap();

    assert_eq!(reachable.len(), 5);
}

#[test]
fn reachable_from___missing_entry___is_entry_point_not_found() {
    let graph = graph(r#"{ "kind": "object", "name": "A", "fields": [] }"#);

    let err = reachable_from(&graph, &object("Missing")).unwrap_err();

    let GraphError::EntryPointNotFound(key) = err else {
        panic!("expected EntryPointNotFound, got {err:?}");
    };
    assert_eq!(key, "main.object.Missing");
}

#[test]
fn reachable_from___entry_must_be_object_kind() {
    let graph = graph(r#"{ "kind": "enum", "name": "A", "values": [ { "label": "X", "value": 0 } ] }"#);

    assert!(reachable_from(&graph, &object("A")).is_err());
}

const SHARED_SWITCH: &str = r#"
    { "kind": "enum", "name": "Op", "values": [ { "label": "X", "value": 1 } ] },
    { "kind": "enum", "name": "Other", "values": [ { "label": "Y", "value": 1 } ] },
    { "kind": "switch", "name": "Body", "on": "op", "cases": [ { "value": 1, "type": "uint8", "name": "r" } ] },"#;

#[test]
fn reachable_from___conflicting_selectors_on_reachable_uses___rejected() {
    let graph = graph(&format!(
        r#"[{SHARED_SWITCH}
            {{ "kind": "object", "name": "A", "fields": [
                {{ "name": "b", "type": "B" }},
                {{ "name": "op", "type": "uint8" }},
                {{ "name": "body", "type": "Body" }} ] }},
            {{ "kind": "object", "name": "B", "fields": [
                {{ "name": "op", "type": "Op" }},
                {{ "name": "body", "type": "Body" }} ] }}
        ]"#
    ));

    let err = reachable_from(&graph, &object("A")).unwrap_err();

    assert!(matches!(err, GraphError::ConflictingSelector { .. }));
    assert!(err.to_string().contains("main.switch.Body"));
}

#[test]
fn reachable_from___conflicting_selector_on_unreachable_use___ignored() {
    let graph = graph(&format!(
        r#"[{SHARED_SWITCH}
            {{ "kind": "object", "name": "Decoy", "fields": [
                {{ "name": "op", "type": "Other" }},
                {{ "name": "body", "type": "Body" }} ] }},
            {{ "kind": "object", "name": "A", "fields": [
                {{ "name": "op", "type": "Op" }},
                {{ "name": "body", "type": "Body" }} ] }}
        ]"#
    ));

    let reachable = reachable_from(&graph, &object("A")).unwrap();

    assert_eq!(names(&reachable), vec!["Op", "A", "Body"]);
    let body = TypeKey::normalize("main", Kind::Switch, "Body");
    assert_eq!(
        graph.selector_enum(&body, &reachable).unwrap(),
        Some(&TypeKey::normalize("main", Kind::Enum, "Op"))
    );
}
