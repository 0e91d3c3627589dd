//! Identifier conventions for generated source
//!
//! | Input | Function | Output |
//! |-------|----------|--------|
//! | `snake_case` / `kebab-case` | [`to_pascal_case`] | `PascalCase` |
//! | any schema name | [`identifier`] | a valid, non-reserved identifier |
//! | type name + kind | [`type_identifier`] | declared type name |
//! | scope + name | [`qualify`] | `scope::Name` when crossing scopes |

use crate::key::Kind;

/// Words the target grammar reserves; schema names that collide get a `_` suffix
const RESERVED: &[&str] = &[
    "addr", "any", "assert", "bitfield", "bool", "break", "bytes", "cast", "const", "continue",
    "else", "enum", "exception", "export", "False", "for", "function", "global", "hook", "if",
    "import", "in", "inout", "int8", "int16", "int32", "int64", "interval", "iterator", "list",
    "local", "map", "module", "new", "Null", "on", "optional", "port", "print", "private",
    "property", "public", "real", "regexp", "return", "self", "set", "sink", "stop", "string",
    "struct", "switch", "time", "True", "try", "tuple", "type", "uint8", "uint16", "uint32",
    "uint64", "unit", "var", "vector", "view", "void", "while",
];

/// Convert a string to PascalCase.
///
/// Handles snake_case, kebab-case, and already-capitalized input.
///
/// # Examples
///
/// ```
/// use protogen_core::codegen::naming::to_pascal_case;
///
/// assert_eq!(to_pascal_case("hello_world"), "HelloWorld");
/// assert_eq!(to_pascal_case("hello-world"), "HelloWorld");
/// assert_eq!(to_pascal_case("hello"), "Hello");
/// ```
pub fn to_pascal_case(s: &str) -> String {
    s.split(['-', '_', ' ', '.'])
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}

/// Make `name` usable as an identifier in generated source.
///
/// Characters outside `[A-Za-z0-9_]` become `_`, a leading digit gets a `_`
/// prefix, and reserved words get a `_` suffix.
///
/// # Examples
///
/// ```
/// use protogen_core::codegen::naming::identifier;
///
/// assert_eq!(identifier("length"), "length");
/// assert_eq!(identifier("type"), "type_");
/// assert_eq!(identifier("msg-id"), "msg_id");
/// ```
pub fn identifier(name: &str) -> String {
    let mut ident: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if RESERVED.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

/// Declared name of a type; `shared` names (one name under several kinds in
/// one scope) get a `_<kind>` suffix
pub fn type_identifier(name: &str, kind: Kind, shared: bool) -> String {
    if shared {
        identifier(&format!("{name}_{kind}"))
    } else {
        identifier(name)
    }
}

/// Refer to `name` declared in `owner` from code in `from`
pub fn qualify(from: &str, owner: &str, name: &str) -> String {
    if from == owner {
        name.to_string()
    } else {
        format!("{owner}::{name}")
    }
}
