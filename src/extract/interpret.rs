//! Interpretation of the literal shapes that carry schema content:
//! `internalSpec` field sets, `internalDefaults` maps and enum literals.
//!
//! A field set looks like
//!
//! ```text
//! {
//!     name: [1, r.TYPES.STRING],
//!     kind: [2, r.TYPES.ENUM, a],
//!     ids: [3, r.TYPES.UINT32 | r.FLAGS.REPEATED | r.FLAGS.PACKED],
//!     text: [4, r.TYPES.STRING],
//!     __oneofs__: { content: ["text"] }
//! }
//! ```

use std::collections::HashMap;

use tracing::warn;
use tree_sitter::Node;

use crate::extract::ast::{identifier_name, Entry, Expr, Key};
use crate::extract::common::{
    format_number, get_node_text, integer_literal, line_of, parse_number, string_literal_value,
};
use crate::extract::demangle::{demangle, DemangledPath};
use crate::extract::error::{ExtractError, ExtractResult};
use crate::extract::schema::{EnumValue, FieldKind, FieldSet, OneofVariant, Property, SchemaRoot};

// ============ Constants ============

pub const ONEOFS_KEY: &str = "__oneofs__";

const TYPES_QUALIFIER: &str = "TYPES";
const FLAGS_QUALIFIER: &str = "FLAGS";

/// Type constants whose concrete type comes from the reference element
const REFERENCE_TYPES: &[&str] = &["MESSAGE", "ENUM"];

// ============ Field Sets ============

/// Type and label information decoded from a flags expression
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FieldFlags {
    pub scalar: Option<String>,
    pub kind: FieldKind,
    pub packed: bool,
}

/// A field referencing another definition, kept for the final resolution check
#[derive(Debug, Clone, PartialEq)]
pub struct FieldReference {
    pub field: String,
    /// Message declaring the field
    pub owner: DemangledPath,
    pub target: DemangledPath,
}

#[derive(Debug, Default)]
pub struct InterpretedFieldSet {
    pub fields: FieldSet,
    pub references: Vec<FieldReference>,
}

/// Interpret the entries of an `internalSpec` object literal.
///
/// `owner` is the path of the message receiving the fields; type references
/// are shortened relative to it. `bound` maps local names to the paths they
/// were exported as.
pub fn interpret_field_set(
    entries: &[Node],
    source: &[u8],
    owner: &DemangledPath,
    bound: &HashMap<String, DemangledPath>,
    context: &str,
) -> ExtractResult<InterpretedFieldSet> {
    let mut result = InterpretedFieldSet::default();
    let oneof_of = collect_oneofs(entries, source, &mut result.fields, context)?;

    for &entry in entries {
        let (key, value) = match Entry::of(entry) {
            Entry::Pair { key: Key::Identifier(key), value } => (key, value),
            Entry::Pair { key, .. } => {
                warn!(context, line = line_of(entry), "ignoring non-identifier key {:?} in field set", key);
                continue;
            }
            Entry::Other(node) => {
                warn!(context, line = line_of(node), "ignoring {} in field set", node.kind());
                continue;
            }
        };
        let name = get_node_text(key, source);
        let field_context = format!("{}, field `{}`", context, name);

        let elements = match Expr::of(value) {
            Expr::Array(elements) => elements,
            _ if name == ONEOFS_KEY => continue,
            other => {
                return Err(ExtractError::mismatch(field_context, "field descriptor array", other.shape()));
            }
        };

        let (Some(&id_node), Some(&flags_node)) = (elements.first(), elements.get(1)) else {
            return Err(ExtractError::mismatch(
                field_context,
                "[id, flags, reference?]",
                format!("array of {} elements", elements.len()),
            ));
        };

        let id = field_id(id_node, source, &field_context)?;
        let flags = interpret_flags(flags_node, source, &field_context)?;

        let type_name = match flags.scalar {
            Some(scalar) => scalar,
            None => {
                let Some(&reference) = elements.get(2) else {
                    return Err(ExtractError::mismatch(field_context, "type reference", "nothing"));
                };
                let target = reference_path(reference, source, bound, &field_context)?;
                let relative = resolve_relative_path(&owner.segments, &target.segments);
                result.references.push(FieldReference {
                    field: name.to_string(),
                    owner: owner.clone(),
                    target,
                });
                relative.join(".")
            }
        };

        match oneof_of.get(name) {
            Some(oneof) => {
                if let Some(variants) = result.fields.oneofs.get_mut(oneof) {
                    variants.push(OneofVariant {
                        id,
                        name: name.to_string(),
                        type_name,
                    });
                }
            }
            None => {
                result.fields.properties.insert(
                    name.to_string(),
                    Property {
                        id,
                        kind: flags.kind,
                        type_name,
                        packed: flags.packed,
                        default: None,
                    },
                );
            }
        }
    }

    Ok(result)
}

/// Read the optional `__oneofs__` entry, pre-create its oneof slots and
/// return the field name to oneof name lookup.
fn collect_oneofs(
    entries: &[Node],
    source: &[u8],
    fields: &mut FieldSet,
    context: &str,
) -> ExtractResult<HashMap<String, String>> {
    let mut oneof_of = HashMap::new();

    let oneofs_value = entries.iter().find_map(|&entry| match Entry::of(entry) {
        Entry::Pair { key: Key::Identifier(key), value } if get_node_text(key, source) == ONEOFS_KEY => {
            Some(value)
        }
        _ => None,
    });
    let Some(value) = oneofs_value else {
        return Ok(oneof_of);
    };

    let context = format!("{}, {}", context, ONEOFS_KEY);
    let Expr::Object(groups) = Expr::of(value) else {
        return Err(ExtractError::mismatch(context, "object literal", Expr::of(value).shape()));
    };

    for group in groups {
        let (oneof, members) = match Entry::of(group) {
            Entry::Pair { key: Key::Identifier(key), value } => (get_node_text(key, source), value),
            _ => return Err(ExtractError::mismatch(context, "identifier: [names]", group.kind())),
        };
        let Expr::Array(members) = Expr::of(members) else {
            return Err(ExtractError::mismatch(context, "array of field names", Expr::of(members).shape()));
        };

        fields.oneofs.insert(oneof.to_string(), Vec::new());
        for member in members {
            let Expr::String(literal) = Expr::of(member) else {
                return Err(ExtractError::mismatch(context, "string literal", Expr::of(member).shape()));
            };
            let field = string_literal_value(get_node_text(literal, source));
            oneof_of.insert(field.to_string(), oneof.to_string());
        }
    }

    Ok(oneof_of)
}

fn field_id(node: Node, source: &[u8], context: &str) -> ExtractResult<u32> {
    match Expr::of(node) {
        Expr::Number(number) => {
            let text = get_node_text(number, source);
            integer_literal(text)
                .ok_or_else(|| ExtractError::mismatch(context, "non-negative integer field id", text))
        }
        other => Err(ExtractError::mismatch(context, "numeric field id", other.shape())),
    }
}

// ============ Flags ============

/// Interpret `r.TYPES.X` or a `|` chain of `r.TYPES.X` / `r.FLAGS.Y` accesses
pub fn interpret_flags(node: Node, source: &[u8], context: &str) -> ExtractResult<FieldFlags> {
    let mut leaves = Vec::new();
    collect_flag_leaves(node, context, &mut leaves)?;

    let mut flags = FieldFlags::default();
    for leaf in leaves {
        apply_flag(&mut flags, leaf, source, context)?;
    }
    Ok(flags)
}

fn collect_flag_leaves<'t>(node: Node<'t>, context: &str, leaves: &mut Vec<Node<'t>>) -> ExtractResult<()> {
    match Expr::of(node) {
        Expr::Member { .. } => {
            leaves.push(node);
            Ok(())
        }
        Expr::Binary { operator: "|", left, right } => {
            collect_flag_leaves(left, context, leaves)?;
            collect_flag_leaves(right, context, leaves)
        }
        Expr::Binary { operator, .. } => Err(ExtractError::mismatch(context, "`|` between flags", operator)),
        other => Err(ExtractError::mismatch(context, "qualified type or flag constant", other.shape())),
    }
}

fn apply_flag(flags: &mut FieldFlags, leaf: Node, source: &[u8], context: &str) -> ExtractResult<()> {
    let Expr::Member { object, property } = Expr::of(leaf) else {
        return Err(ExtractError::mismatch(context, "qualified constant", Expr::of(leaf).shape()));
    };
    let constant = identifier_name(property, source)
        .ok_or_else(|| ExtractError::mismatch(context, "constant name", property.kind()))?;
    let qualifier = match Expr::of(object) {
        Expr::Member { property: qualifier, .. } => identifier_name(qualifier, source)
            .ok_or_else(|| ExtractError::mismatch(context, "qualifier name", qualifier.kind()))?,
        other => return Err(ExtractError::mismatch(context, "TYPES or FLAGS qualifier", other.shape())),
    };

    match qualifier {
        TYPES_QUALIFIER => {
            if !REFERENCE_TYPES.contains(&constant) {
                flags.scalar = Some(constant.to_lowercase());
            }
        }
        FLAGS_QUALIFIER => match constant {
            "PACKED" => flags.packed = true,
            "REPEATED" => flags.kind = FieldKind::Repeated,
            "REQUIRED" => flags.kind = FieldKind::Required,
            other => return Err(ExtractError::mismatch(context, "PACKED, REPEATED or REQUIRED", other)),
        },
        other => return Err(ExtractError::mismatch(context, "TYPES or FLAGS qualifier", other)),
    }
    Ok(())
}

// ============ References ============

/// Path a reference element points at: a local exported earlier in the same
/// function, or a qualified access to a mangled export.
fn reference_path(
    node: Node,
    source: &[u8],
    bound: &HashMap<String, DemangledPath>,
    context: &str,
) -> ExtractResult<DemangledPath> {
    match Expr::of(node) {
        Expr::Identifier(local) => {
            let name = get_node_text(local, source);
            bound
                .get(name)
                .cloned()
                .ok_or_else(|| ExtractError::unresolved(context, name))
        }
        Expr::Member { property, .. } => identifier_name(property, source)
            .map(demangle)
            .ok_or_else(|| ExtractError::mismatch(context, "mangled export name", property.kind())),
        other => Err(ExtractError::mismatch(context, "identifier or member reference", other.shape())),
    }
}

/// Shortest usable reference from a field declared in `from` to `to`.
///
/// Drops the leading segments both paths share. Falls back to the full path
/// when nothing is shared or when `to` is not deeper than `from`.
pub fn resolve_relative_path(from: &[String], to: &[String]) -> Vec<String> {
    if from.len() >= to.len() {
        return to.to_vec();
    }
    let common = from.iter().zip(to).take_while(|(a, b)| a == b).count();
    if common == 0 {
        to.to_vec()
    } else {
        to[common..].to_vec()
    }
}

/// Reference from `from` to `to` against the finished tree.
///
/// Starts from [`resolve_relative_path`] and keeps one more leading segment
/// while the first emitted segment is also defined in a scope between the kept
/// prefix and `from`, since lookup would find that definition first.
pub fn resolve_in_scope(root: &SchemaRoot, from: &[String], to: &[String]) -> Vec<String> {
    let mut start = to.len() - resolve_relative_path(from, to).len();
    while start > 0 && is_shadowed(root, from, start, &to[start]) {
        start -= 1;
    }
    to[start..].to_vec()
}

/// Whether a scope `from[..depth]` with `depth > start` defines `name`
fn is_shadowed(root: &SchemaRoot, from: &[String], start: usize, name: &str) -> bool {
    (start + 1..=from.len()).any(|depth| {
        root.message(&from[..depth]).is_some_and(|scope| {
            scope.nested.messages.contains_key(name) || scope.nested.enums.contains_key(name)
        })
    })
}

// ============ Defaults ============

/// Interpret the entries of an `internalDefaults` object literal into
/// `(field, literal text)` pairs.
pub fn interpret_defaults(entries: &[Node], source: &[u8], context: &str) -> ExtractResult<Vec<(String, String)>> {
    let mut defaults = Vec::with_capacity(entries.len());

    for &entry in entries {
        let (field, value) = match Entry::of(entry) {
            Entry::Pair { key: Key::Identifier(key), value } => (get_node_text(key, source), value),
            _ => return Err(ExtractError::mismatch(context, "identifier: default", entry.kind())),
        };
        let text = match Expr::of(value) {
            Expr::Number(number) => {
                let raw = get_node_text(number, source);
                parse_number(raw)
                    .map(format_number)
                    .ok_or_else(|| ExtractError::mismatch(context, "numeric literal", raw))?
            }
            Expr::Member { property, .. } => identifier_name(property, source)
                .ok_or_else(|| ExtractError::mismatch(context, "constant name", property.kind()))?
                .to_string(),
            other => {
                return Err(ExtractError::mismatch(
                    format!("{}, default `{}`", context, field),
                    "numeric literal or qualified constant",
                    other.shape(),
                ));
            }
        };
        defaults.push((field.to_string(), text));
    }

    Ok(defaults)
}

// ============ Enum Literals ============

/// Interpret `{ NAME: 0, OTHER: 1 }` into enum values, in source order
pub fn interpret_enum_literal(entries: &[Node], source: &[u8], context: &str) -> ExtractResult<Vec<EnumValue>> {
    entries
        .iter()
        .map(|&entry| {
            let Entry::Pair { key: Key::Identifier(key), value } = Entry::of(entry) else {
                return Err(ExtractError::mismatch(context, "identifier: number", entry.kind()));
            };
            let name = get_node_text(key, source);
            let Expr::Number(number) = Expr::of(value) else {
                return Err(ExtractError::mismatch(
                    format!("{}, enum value `{}`", context, name),
                    "numeric literal",
                    Expr::of(value).shape(),
                ));
            };
            let text = get_node_text(number, source);
            let id = integer_literal(text)
                .ok_or_else(|| ExtractError::mismatch(context, "integer enum value", text))?;
            Ok(EnumValue {
                name: name.to_string(),
                id,
            })
        })
        .collect()
}
