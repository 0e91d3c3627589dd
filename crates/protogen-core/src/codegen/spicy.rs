//! Spicy source generation for Zeek.

use super::naming::{identifier, to_pascal_case};
use super::{EmitContext, GeneratedFile, TargetGrammar};
use crate::key::{Kind, TypeKey};
use crate::schema::{
    Bitfield, EntityBody, Entity, Enumeration, Object, Primitive, Repeat, Switch, TypeRef,
};

/// Renders scopes as Spicy modules and the driver as a Zeek `.evt` file
#[derive(Debug, Clone, Copy, Default)]
pub struct SpicyGrammar;

impl TargetGrammar for SpicyGrammar {
    fn extension(&self) -> &'static str {
        "spicy"
    }

    fn header(&self, ctx: &EmitContext<'_>, scope: &str) -> String {
        format!(
            "# Generated by protogen for protocol '{}', scope '{scope}'. Do not edit.\n\nmodule {scope};\n\n",
            ctx.config.protocol
        )
    }

    fn imports(&self, ctx: &EmitContext<'_>, scope: &str) -> String {
        let mut code = String::new();

        if ctx.is_entry_scope(scope) && !ctx.config.uses_layer2 {
            code.push_str("import zeek;\n");
        }

        if let Some(foreign) = ctx.imports.get(scope) {
            for (owner, kinds) in foreign {
                let listing: Vec<String> = kinds
                    .iter()
                    .map(|(kind, names)| {
                        format!(
                            "{kind} {}",
                            names.iter().cloned().collect::<Vec<_>>().join(", ")
                        )
                    })
                    .collect();
                code.push_str(&format!("import {owner}; # {}\n", listing.join("; ")));
            }
        }

        code
    }

    fn declaration(&self, ctx: &EmitContext<'_>, entity: &Entity) -> String {
        let visibility = if ctx.is_public(&entity.key) {
            "public "
        } else {
            ""
        };
        let name = ctx.type_name(&entity.key);
        let scope = entity.key.scope();

        match &entity.body {
            EntityBody::Object(object) => render_object(ctx, scope, visibility, &name, object),
            EntityBody::Switch(switch) => {
                render_switch(ctx, &entity.key, visibility, &name, switch)
            }
            EntityBody::Bitfield(bitfield) => {
                render_bitfield(ctx, scope, visibility, &name, bitfield)
            }
            EntityBody::Enum(enumeration) => render_enum(visibility, &name, enumeration),
            EntityBody::Custom(primitive) => format!("{visibility}type {name} = {primitive};\n"),
        }
    }

    fn host_binding(&self, ctx: &EmitContext<'_>) -> String {
        if ctx.config.uses_layer2 {
            return String::new();
        }
        let entry = ctx.type_name(&ctx.config.entry_key());
        format!("on {entry}::%done {{\n    zeek::confirm_protocol();\n}}\n")
    }

    fn driver(&self, ctx: &EmitContext<'_>) -> Option<GeneratedFile> {
        let config = ctx.config;
        let entry_key = config.entry_key();
        let entry = ctx.reference("", &entry_key);
        let analyzer = to_pascal_case(&config.protocol);

        let mut code = format!(
            "# Generated by protogen for protocol '{}'. Do not edit.\n\nimport {};\n\n",
            config.protocol,
            entry_key.scope()
        );

        if config.uses_layer2 {
            code.push_str(&format!("packet analyzer spicy::{analyzer}:\n"));
        } else {
            code.push_str(&format!(
                "protocol analyzer spicy::{analyzer} over {}:\n",
                config.transport.as_str()
            ));
        }
        code.push_str(&format!("    parse with {entry};\n"));

        Some(GeneratedFile {
            file_name: format!("{}.evt", config.protocol),
            contents: code,
        })
    }
}

fn render_object(
    ctx: &EmitContext<'_>,
    scope: &str,
    visibility: &str,
    name: &str,
    object: &Object,
) -> String {
    let mut code = format!("{visibility}type {name} = unit {{\n");
    for field in &object.fields {
        code.push_str(&format!(
            "    {}\n",
            render_field(ctx, scope, &identifier(&field.name), &field.ty, field.repeat.as_ref())
        ));
    }
    code.push_str("};\n");
    code
}

/// Integer or enum type a switch selects on
enum Selector {
    Integer(&'static str),
    Enum(TypeKey),
}

/// The selector type follows the control fields of the reachable objects
/// using the switch; reachability has already rejected conflicting uses
fn selector(ctx: &EmitContext<'_>, key: &TypeKey, switch: &Switch) -> Selector {
    if let Ok(Some(enum_key)) = ctx.graph.selector_enum(key, ctx.reachable) {
        return Selector::Enum(enum_key.clone());
    }

    if switch.cases.iter().any(|c| c.value.is_some_and(|v| v < 0)) {
        Selector::Integer("int64")
    } else {
        Selector::Integer("uint64")
    }
}

fn render_switch(
    ctx: &EmitContext<'_>,
    key: &TypeKey,
    visibility: &str,
    name: &str,
    switch: &Switch,
) -> String {
    let scope = key.scope();
    let selector = selector(ctx, key, switch);
    let parameter = match &selector {
        Selector::Integer(ty) => (*ty).to_string(),
        Selector::Enum(enum_key) => ctx.reference(scope, enum_key),
    };

    let mut code = format!("{visibility}type {name} = unit(selector: {parameter}) {{\n");
    code.push_str("    switch ( selector ) {\n");

    for case in &switch.cases {
        let label = match (case.value, &selector) {
            (None, _) => "*".to_string(),
            (Some(value), Selector::Integer(_)) => value.to_string(),
            (Some(value), Selector::Enum(enum_key)) => {
                let enum_name = ctx.reference(scope, enum_key);
                ctx.schema
                    .enumeration(enum_key)
                    .and_then(|e| e.values.iter().find(|v| v.value == value))
                    .map(|v| format!("{enum_name}::{}", identifier(&v.label)))
                    .unwrap_or_else(|| format!("{enum_name}({value})"))
            }
        };
        let field_name = case.name.as_deref().map(identifier).unwrap_or_default();
        code.push_str(&format!(
            "        {label} -> {}\n",
            render_field(ctx, scope, &field_name, &case.ty, None)
        ));
    }

    code.push_str("    };\n};\n");
    code
}

fn render_bitfield(
    ctx: &EmitContext<'_>,
    scope: &str,
    visibility: &str,
    name: &str,
    bitfield: &Bitfield,
) -> String {
    let mut code = format!("{visibility}type {name} = bitfield({}) {{\n", bitfield.width);

    // First declared sub-field occupies the most significant bits
    let mut top = bitfield.width;
    for range in &bitfield.fields {
        let low = top - range.bits;
        let high = top - 1;
        top = low;

        if range.is_padding() {
            code.push_str(&format!("    # {}: {low}..{high} (padding)\n", range.name));
            continue;
        }

        let convert = match range.ty.as_ref().and_then(TypeRef::key) {
            Some(key) if key.kind() == Kind::Enum => {
                format!(" &convert={}($$)", ctx.reference(scope, key))
            }
            _ => String::new(),
        };
        code.push_str(&format!(
            "    {}: {low}..{high}{convert};\n",
            identifier(&range.name)
        ));
    }

    if top > 0 {
        code.push_str(&format!("    # 0..{} unused\n", top - 1));
    }

    code.push_str("};\n");
    code
}

fn render_enum(visibility: &str, name: &str, enumeration: &Enumeration) -> String {
    let labels: Vec<String> = enumeration
        .values
        .iter()
        .map(|v| format!("    {} = {}", identifier(&v.label), v.value))
        .collect();
    format!(
        "{visibility}type {name} = enum {{\n{}\n}};\n",
        labels.join(",\n")
    )
}

/// Primitive behind a type reference, looking through custom aliases
fn underlying_primitive(ctx: &EmitContext<'_>, ty: &TypeRef) -> Option<Primitive> {
    match ty {
        TypeRef::Primitive(primitive) => Some(*primitive),
        TypeRef::Entity(key) => match ctx.schema.get(key).map(|e| &e.body) {
            Some(EntityBody::Custom(primitive)) => Some(*primitive),
            _ => None,
        },
    }
}

/// One unit item: `name: Type attributes;`; an empty `name` renders anonymously
fn render_field(
    ctx: &EmitContext<'_>,
    scope: &str,
    name: &str,
    ty: &TypeRef,
    repeat: Option<&Repeat>,
) -> String {
    let count = repeat.map(|r| match r {
        Repeat::Count(n) => n.to_string(),
        Repeat::CountField(field) => format!("self.{}", identifier(field)),
    });

    let base = match ty {
        TypeRef::Primitive(primitive) => primitive.to_string(),
        TypeRef::Entity(key) => ctx.reference(scope, key),
    };

    let rendered = match ty.key() {
        Some(key) if key.kind() == Kind::Enum => {
            let width = ctx.schema.enumeration(key).map_or(8, |e| e.width);
            match count {
                Some(count) => format!("uint{width}[{count}] &convert=[{base}(x) for x in $$]"),
                None => format!("uint{width} &convert={base}($$)"),
            }
        }
        Some(key) if key.kind() == Kind::Switch => {
            let control = ctx
                .schema
                .switch(key)
                .map(|s| identifier(&s.on))
                .unwrap_or_default();
            match count {
                Some(count) => format!("{base}(self.{control})[{count}]"),
                None => format!("{base}(self.{control})"),
            }
        }
        _ if underlying_primitive(ctx, ty) == Some(Primitive::Bytes) => match count {
            Some(count) => format!("{base} &size={count}"),
            None => format!("{base} &eod"),
        },
        _ => match count {
            Some(count) => format!("{base}[{count}]"),
            None => base,
        },
    };

    format!("{name}: {rendered};")
}
