//! Schema tree construction from spec function bodies.
//!
//! A spec function looks roughly like
//!
//! ```text
//! 12345: (e, t, n) => {
//!     "use strict";
//!     Object.defineProperty(t, "__esModule", { value: !0 }), t.OuterSpec = t.Outer$Kind = void 0;
//!     var r = n(1);
//!     const a = r.defineEnum({ FIRST: 0, SECOND: 1 });
//!     t.Outer$Kind = a;
//!     const o = {};
//!     t.OuterSpec = o, o.internalSpec = { kind: [1, r.TYPES.ENUM, a] };
//! }
//! ```
//!
//! Statements run strictly in source order against one shared tree; locals and
//! deferred defaults live in a [`SpecContext`] that is dropped with the function.

use std::collections::HashMap;
use std::ops::AddAssign;

use serde::Serialize;
use tracing::{debug, info, warn};
use tree_sitter::Node;

use crate::extract::ast::{identifier_name, Expr, Stmt};
use crate::extract::common::{get_node_text, line_of, named_children};
use crate::extract::demangle::{demangle, DemangledPath, TargetKind};
use crate::extract::error::{ExtractError, ExtractResult};
use crate::extract::interpret::{
    interpret_defaults, interpret_enum_literal, interpret_field_set, resolve_in_scope, FieldReference,
};
use crate::extract::locator::SpecFunction;
use crate::extract::policy::{classify_group, GroupKind};
use crate::extract::schema::{EnumValue, FieldSet, Message, SchemaRoot};

const INTERNAL_SPEC: &str = "internalSpec";
const INTERNAL_DEFAULTS: &str = "internalDefaults";

// ============ Metrics ============

/// Counts of definitions created while building
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub spec_functions: usize,
    pub messages: usize,
    pub enums: usize,
    pub properties: usize,
}

impl AddAssign for ExtractStats {
    fn add_assign(&mut self, other: Self) {
        self.spec_functions += other.spec_functions;
        self.messages += other.messages;
        self.enums += other.enums;
        self.properties += other.properties;
    }
}

// ============ Per-Function State ============

/// What a `const` local holds
#[derive(Debug, Clone, PartialEq)]
pub enum LocalBinding {
    /// `{}` or `(0, r.default)(...)`: only ever used as an export handle
    Inert,
    /// Enum values from `r.defineEnum({ A: 0, ... })`
    Enum(Vec<EnumValue>),
}

#[derive(Debug, Clone)]
struct PendingDefault {
    path: DemangledPath,
    field: String,
    value: String,
}

/// State scoped to a single spec function
#[derive(Debug)]
pub struct SpecContext {
    key: String,
    locals: HashMap<String, LocalBinding>,
    bound: HashMap<String, DemangledPath>,
    defaults: Vec<PendingDefault>,
    stats: ExtractStats,
}

impl SpecContext {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            locals: HashMap::new(),
            bound: HashMap::new(),
            defaults: Vec::new(),
            stats: ExtractStats {
                spec_functions: 1,
                ..ExtractStats::default()
            },
        }
    }

    /// Error context naming this function and what is being processed
    fn at(&self, what: &str) -> String {
        format!("function {}, {}", self.key, what)
    }

    pub fn declare_local(&mut self, name: impl Into<String>, binding: LocalBinding) {
        self.locals.insert(name.into(), binding);
    }

    pub fn queue_default(&mut self, path: DemangledPath, field: impl Into<String>, value: impl Into<String>) {
        self.defaults.push(PendingDefault {
            path,
            field: field.into(),
            value: value.into(),
        });
    }

    /// Path a local was last exported as
    pub fn bound_path(&self, local: &str) -> Option<&DemangledPath> {
        self.bound.get(local)
    }
}

// ============ Builder ============

#[derive(Debug)]
struct RecordedReference {
    context: String,
    reference: FieldReference,
}

/// Owns the schema tree for a whole run
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    root: SchemaRoot,
    references: Vec<RecordedReference>,
    stats: ExtractStats,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &SchemaRoot {
        &self.root
    }

    pub fn stats(&self) -> ExtractStats {
        self.stats
    }

    /// Create the path if absent: intermediate messages, then an empty
    /// message or enum for the last segment.
    pub fn declare_path(&mut self, ctx: &mut SpecContext, path: &DemangledPath) -> ExtractResult<()> {
        let Some((last, parents)) = path.segments.split_last() else {
            return Ok(());
        };

        let stats = &mut ctx.stats;
        let mut scope = &mut self.root;
        for (depth, segment) in parents.iter().enumerate() {
            if scope.enums.contains_key(segment) {
                return Err(ExtractError::NameCollision {
                    scope: parents[..depth].join("."),
                    name: segment.clone(),
                });
            }
            scope = &mut scope
                .messages
                .entry(segment.clone())
                .or_insert_with(|| {
                    stats.messages += 1;
                    Message::default()
                })
                .nested;
        }

        let collides = match path.kind {
            TargetKind::Enum => scope.messages.contains_key(last),
            TargetKind::Message => scope.enums.contains_key(last),
        };
        if collides {
            return Err(ExtractError::NameCollision {
                scope: parents.join("."),
                name: last.clone(),
            });
        }

        match path.kind {
            TargetKind::Enum => {
                scope.enums.entry(last.clone()).or_insert_with(|| {
                    stats.enums += 1;
                    Vec::new()
                });
            }
            TargetKind::Message => {
                scope.messages.entry(last.clone()).or_insert_with(|| {
                    stats.messages += 1;
                    Message::default()
                });
            }
        }
        Ok(())
    }

    /// Record that `local` is exported as `path`, attaching its enum values
    /// right away when it holds a literal enum.
    pub fn bind_path_to_local(&mut self, ctx: &mut SpecContext, path: DemangledPath, local: &str) -> ExtractResult<()> {
        let binding = ctx
            .locals
            .get(local)
            .cloned()
            .ok_or_else(|| ExtractError::unresolved(ctx.at(&format!("export `{}`", path)), local))?;

        if let LocalBinding::Enum(values) = binding {
            self.attach_enum(ctx, &path, values)?;
        }

        debug!(function = %ctx.key, local, path = %path, "bound local");
        ctx.bound.insert(local.to_string(), path);
        Ok(())
    }

    fn attach_enum(&mut self, ctx: &mut SpecContext, path: &DemangledPath, values: Vec<EnumValue>) -> ExtractResult<()> {
        let Some((last, parents)) = path.segments.split_last() else {
            return Ok(());
        };
        let scope = self
            .root
            .scope_mut(&path.segments)
            .ok_or_else(|| ExtractError::missing(ctx.at(&format!("enum `{}`", path)), "message", parents.join(".")))?;

        if scope.messages.contains_key(last) {
            return Err(ExtractError::NameCollision {
                scope: parents.join("."),
                name: last.clone(),
            });
        }
        if scope.enums.insert(last.clone(), values).is_none() {
            ctx.stats.enums += 1;
        }
        Ok(())
    }

    /// Replace the fields of the message at `path`
    pub fn attach_field_set(&mut self, ctx: &mut SpecContext, path: &DemangledPath, fields: FieldSet) -> ExtractResult<()> {
        let message = self
            .root
            .message_mut(&path.segments)
            .ok_or_else(|| ExtractError::missing(ctx.at(INTERNAL_SPEC), "message", path.to_string()))?;

        ctx.stats.properties += fields.properties.len();
        message.properties = fields.properties;
        message.oneofs = fields.oneofs;
        Ok(())
    }

    /// Apply the defaults queued by one spec function
    fn apply_defaults(&mut self, ctx: &mut SpecContext) -> ExtractResult<()> {
        for pending in std::mem::take(&mut ctx.defaults) {
            let context = ctx.at(INTERNAL_DEFAULTS);
            let message = self
                .root
                .message_mut(&pending.path.segments)
                .ok_or_else(|| ExtractError::missing(context.clone(), "message", pending.path.to_string()))?;
            let property = message
                .properties
                .get_mut(&pending.field)
                .ok_or_else(|| ExtractError::missing(context, "field", pending.field.clone()))?;
            property.default = Some(pending.value);
        }
        Ok(())
    }

    /// Check every recorded type reference against the finished tree, write
    /// its final type text and hand the tree over.
    pub fn finish(mut self) -> ExtractResult<(SchemaRoot, ExtractStats)> {
        for recorded in &self.references {
            let reference = &recorded.reference;
            let target = &reference.target;
            if !self.root.contains(&target.segments) {
                return Err(ExtractError::unresolved(
                    format!("{}, field `{}`", recorded.context, reference.field),
                    target.to_string(),
                ));
            }

            let type_name = resolve_in_scope(&self.root, &reference.owner.segments, &target.segments).join(".");
            let message = self
                .root
                .message_mut(&reference.owner.segments)
                .ok_or_else(|| ExtractError::missing(recorded.context.clone(), "message", reference.owner.to_string()))?;
            if let Some(property) = message.properties.get_mut(&reference.field) {
                property.type_name = type_name;
            } else if let Some(variant) = message
                .oneofs
                .values_mut()
                .flatten()
                .find(|variant| variant.name == reference.field)
            {
                variant.type_name = type_name;
            }
        }
        Ok((self.root, self.stats))
    }

    // ============ Statement Dispatch ============

    /// Run every statement of one spec function, then its deferred defaults
    pub fn process(&mut self, spec: &SpecFunction, source: &[u8]) -> ExtractResult<ExtractStats> {
        info!(function = %spec.key, "parsing spec function");
        let mut ctx = SpecContext::new(spec.key);

        for statement in named_children(spec.body) {
            match Stmt::of(statement) {
                Stmt::Var(_) => continue,
                Stmt::Expression(expression) => self.process_expression(&mut ctx, expression, source)?,
                Stmt::Const(declaration) => self.process_declaration(&mut ctx, declaration, source)?,
                Stmt::Let(declaration) => {
                    return Err(ExtractError::mismatch(
                        ctx.at(&format!("line {}", line_of(declaration))),
                        "const declaration",
                        "let declaration",
                    ));
                }
                Stmt::Other(node) => {
                    warn!(function = %ctx.key, line = line_of(node), "ignoring {} statement", node.kind());
                }
            }
        }

        self.apply_defaults(&mut ctx)?;

        let stats = ctx.stats;
        info!(
            function = %ctx.key,
            messages = stats.messages,
            enums = stats.enums,
            properties = stats.properties,
            "parsing metrics"
        );
        self.stats += stats;
        Ok(stats)
    }

    fn process_expression(&mut self, ctx: &mut SpecContext, node: Node, source: &[u8]) -> ExtractResult<()> {
        match Expr::of(node) {
            Expr::Assignment { left, right } => match Expr::of(right) {
                Expr::Identifier(local) => self.bind_assignment(ctx, left, local, source),
                Expr::Object(_) => self.process_group_assignment(ctx, node, source),
                _ => self.reserve_chain(ctx, node, source),
            },
            Expr::Sequence(members) => self.process_group(ctx, &members, source),
            other => {
                warn!(function = %ctx.key, line = line_of(node), "ignoring {} statement", other.shape());
                Ok(())
            }
        }
    }

    fn process_group(&mut self, ctx: &mut SpecContext, members: &[Node], source: &[u8]) -> ExtractResult<()> {
        let expressions: Vec<Expr> = members.iter().map(|&member| Expr::of(member)).collect();

        match classify_group(&expressions) {
            GroupKind::Reservation => {
                for (&member, expression) in members.iter().zip(&expressions) {
                    match expression {
                        Expr::Assignment { .. } => self.reserve_chain(ctx, member, source)?,
                        Expr::Call { callee, .. } => {
                            debug!(function = %ctx.key, callee = get_node_text(*callee, source), "reservation group call");
                        }
                        _ => {}
                    }
                }
            }
            GroupKind::Assignment => {
                for &member in members {
                    self.process_group_assignment(ctx, member, source)?;
                }
            }
        }
        Ok(())
    }

    /// `t.a = t.b = ... = void 0`: every member target is reserved
    fn reserve_chain(&mut self, ctx: &mut SpecContext, node: Node, source: &[u8]) -> ExtractResult<()> {
        let mut current = node;
        while let Expr::Assignment { left, right } = Expr::of(current) {
            let name = export_name(left, source, &ctx.at("reservation"))?;
            self.declare_path(ctx, &demangle(name))?;
            current = right;
        }
        Ok(())
    }

    /// `t.aSpec = o`
    fn bind_assignment(&mut self, ctx: &mut SpecContext, left: Node, local: Node, source: &[u8]) -> ExtractResult<()> {
        let name = export_name(left, source, &ctx.at("export"))?;
        let local = get_node_text(local, source);
        self.bind_path_to_local(ctx, demangle(name), local)
    }

    fn process_group_assignment(&mut self, ctx: &mut SpecContext, member: Node, source: &[u8]) -> ExtractResult<()> {
        let line = line_of(member);
        let Expr::Assignment { left, right } = Expr::of(member) else {
            warn!(function = %ctx.key, line, "ignoring {} in assignment group", Expr::of(member).shape());
            return Ok(());
        };
        let Expr::Member { object, property } = Expr::of(left) else {
            warn!(function = %ctx.key, line, "ignoring assignment to {}", Expr::of(left).shape());
            return Ok(());
        };

        let entries = match Expr::of(right) {
            Expr::Identifier(local) => return self.bind_assignment(ctx, left, local, source),
            Expr::Object(entries) => entries,
            other => {
                warn!(function = %ctx.key, line, "ignoring assignment of {}", other.shape());
                return Ok(());
            }
        };

        let Some(target) = self.spec_target(ctx, object, source)? else {
            return Ok(());
        };
        let Some(property) = identifier_name(property, source) else {
            warn!(function = %ctx.key, line, "ignoring computed property {}", property.kind());
            return Ok(());
        };

        match property {
            INTERNAL_SPEC => {
                let context = ctx.at(&format!("{} of `{}`", INTERNAL_SPEC, target));
                let interpreted = interpret_field_set(&entries, source, &target, &ctx.bound, &context)?;
                self.references.extend(interpreted.references.into_iter().map(|reference| RecordedReference {
                    context: context.clone(),
                    reference,
                }));
                self.attach_field_set(ctx, &target, interpreted.fields)
            }
            INTERNAL_DEFAULTS => {
                let context = ctx.at(&format!("{} of `{}`", INTERNAL_DEFAULTS, target));
                for (field, value) in interpret_defaults(&entries, source, &context)? {
                    ctx.queue_default(target.clone(), field, value);
                }
                Ok(())
            }
            other => Err(ExtractError::mismatch(
                ctx.at(&format!("line {}", line)),
                "internalSpec or internalDefaults",
                other,
            )),
        }
    }

    /// Path whose `internalSpec`/`internalDefaults` is being assigned: an
    /// exported local, or a qualified access to a mangled export.
    fn spec_target(&self, ctx: &SpecContext, object: Node, source: &[u8]) -> ExtractResult<Option<DemangledPath>> {
        match Expr::of(object) {
            Expr::Identifier(local) => {
                let local = get_node_text(local, source);
                ctx.bound_path(local)
                    .cloned()
                    .map(Some)
                    .ok_or_else(|| ExtractError::unresolved(ctx.at("spec assignment"), local))
            }
            Expr::Member { property, .. } => Ok(identifier_name(property, source).map(demangle)),
            other => {
                warn!(function = %ctx.key, line = line_of(object), "ignoring spec assignment on {}", other.shape());
                Ok(None)
            }
        }
    }

    /// `const a = ...;`
    fn process_declaration(&mut self, ctx: &mut SpecContext, declaration: Node, source: &[u8]) -> ExtractResult<()> {
        let context = ctx.at(&format!("declaration at line {}", line_of(declaration)));
        let declarators: Vec<Node> = named_children(declaration)
            .into_iter()
            .filter(|child| child.kind() == "variable_declarator")
            .collect();
        let [declarator] = declarators.as_slice() else {
            return Err(ExtractError::mismatch(
                context,
                "a single declarator",
                format!("{} declarators", declarators.len()),
            ));
        };

        let name_node = declarator
            .child_by_field_name("name")
            .ok_or_else(|| ExtractError::mismatch(context.clone(), "binding name", "nothing"))?;
        let Some(name) = identifier_name(name_node, source) else {
            return Err(ExtractError::mismatch(context, "identifier binding", name_node.kind()));
        };
        let Some(value) = declarator.child_by_field_name("value") else {
            return Err(ExtractError::mismatch(context, "initializer", "nothing"));
        };

        match Expr::of(value) {
            Expr::Object(entries) if entries.is_empty() => {
                ctx.declare_local(name, LocalBinding::Inert);
                Ok(())
            }
            Expr::Call { callee, arguments } => {
                if matches!(Expr::of(callee), Expr::Sequence(_)) {
                    ctx.declare_local(name, LocalBinding::Inert);
                    return Ok(());
                }
                let [argument] = arguments.as_slice() else {
                    return Err(ExtractError::mismatch(
                        context,
                        "a single call argument",
                        format!("{} arguments", arguments.len()),
                    ));
                };
                match Expr::of(*argument) {
                    Expr::Object(entries) => {
                        let values = interpret_enum_literal(&entries, source, &context)?;
                        ctx.declare_local(name, LocalBinding::Enum(values));
                    }
                    other => {
                        warn!(function = %ctx.key, local = name, "ignoring declaration from {}", other.shape());
                    }
                }
                Ok(())
            }
            other => Err(ExtractError::mismatch(context, "empty object or call", other.shape())),
        }
    }
}

/// Mangled export name on the left of an assignment: `t.<name>`
fn export_name<'a>(left: Node, source: &'a [u8], context: &str) -> ExtractResult<&'a str> {
    match Expr::of(left) {
        Expr::Member { property, .. } => identifier_name(property, source)
            .ok_or_else(|| ExtractError::mismatch(context, "export name", property.kind())),
        other => Err(ExtractError::mismatch(context, "member access", other.shape())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(segments: &[&str]) -> DemangledPath {
        DemangledPath::new(segments.iter().copied(), TargetKind::Message)
    }

    fn enumeration(segments: &[&str]) -> DemangledPath {
        DemangledPath::new(segments.iter().copied(), TargetKind::Enum)
    }

    #[test]
    fn test_declare_path_is_idempotent() {
        let mut builder = SchemaBuilder::new();
        let mut ctx = SpecContext::new("1");
        builder.declare_path(&mut ctx, &message(&["Outer", "Inner"])).unwrap();
        builder.declare_path(&mut ctx, &message(&["Outer", "Inner"])).unwrap();
        builder.declare_path(&mut ctx, &message(&["Outer"])).unwrap();

        assert_eq!(builder.root().messages.len(), 1);
        assert_eq!(builder.root().messages["Outer"].nested.messages.len(), 1);
        assert_eq!(ctx.stats.messages, 2);
    }

    #[test]
    fn test_declare_enum_creates_parents() {
        let mut builder = SchemaBuilder::new();
        let mut ctx = SpecContext::new("1");
        builder.declare_path(&mut ctx, &enumeration(&["Outer", "Kind"])).unwrap();

        let outer = &builder.root().messages["Outer"];
        assert!(outer.nested.enums["Kind"].is_empty());
        assert_eq!((ctx.stats.messages, ctx.stats.enums), (1, 1));
    }

    #[test]
    fn test_message_enum_collision_is_fatal() {
        let mut builder = SchemaBuilder::new();
        let mut ctx = SpecContext::new("1");
        builder.declare_path(&mut ctx, &enumeration(&["Status"])).unwrap();
        let err = builder.declare_path(&mut ctx, &message(&["Status"])).unwrap_err();
        assert!(matches!(err, ExtractError::NameCollision { ref name, .. } if name == "Status"));
    }

    #[test]
    fn test_bind_enum_local_attaches_values() {
        let mut builder = SchemaBuilder::new();
        let mut ctx = SpecContext::new("1");
        builder.declare_path(&mut ctx, &message(&["Outer"])).unwrap();
        ctx.declare_local(
            "a",
            LocalBinding::Enum(vec![EnumValue {
                name: "FIRST".into(),
                id: 0,
            }]),
        );

        builder.bind_path_to_local(&mut ctx, enumeration(&["Outer", "Kind"]), "a").unwrap();
        assert_eq!(builder.root().messages["Outer"].nested.enums["Kind"].len(), 1);
        assert_eq!(ctx.bound_path("a"), Some(&enumeration(&["Outer", "Kind"])));
    }

    #[test]
    fn test_bind_enum_under_undeclared_parent_fails() {
        let mut builder = SchemaBuilder::new();
        let mut ctx = SpecContext::new("1");
        ctx.declare_local("a", LocalBinding::Enum(Vec::new()));
        let err = builder
            .bind_path_to_local(&mut ctx, enumeration(&["Missing", "Kind"]), "a")
            .unwrap_err();
        assert!(matches!(err, ExtractError::MissingDeclaration { what: "message", .. }));
    }

    #[test]
    fn test_bind_unknown_local_fails() {
        let mut builder = SchemaBuilder::new();
        let mut ctx = SpecContext::new("1");
        let err = builder.bind_path_to_local(&mut ctx, message(&["Outer"]), "o").unwrap_err();
        assert!(matches!(err, ExtractError::UnresolvedReference { ref name, .. } if name == "o"));
    }

    #[test]
    fn test_inert_local_binds_without_declaring() {
        let mut builder = SchemaBuilder::new();
        let mut ctx = SpecContext::new("1");
        ctx.declare_local("o", LocalBinding::Inert);
        builder.bind_path_to_local(&mut ctx, message(&["Outer"]), "o").unwrap();
        assert!(builder.root().is_empty());
        assert_eq!(ctx.bound_path("o"), Some(&message(&["Outer"])));
    }

    #[test]
    fn test_attach_field_set_requires_message() {
        let mut builder = SchemaBuilder::new();
        let mut ctx = SpecContext::new("1");
        let err = builder
            .attach_field_set(&mut ctx, &message(&["Outer"]), FieldSet::default())
            .unwrap_err();
        assert!(matches!(err, ExtractError::MissingDeclaration { .. }));
    }

    #[test]
    fn test_queued_default_needs_field() {
        let mut builder = SchemaBuilder::new();
        let mut ctx = SpecContext::new("1");
        builder.declare_path(&mut ctx, &message(&["Outer"])).unwrap();
        ctx.queue_default(message(&["Outer"]), "count", "5");
        let err = builder.apply_defaults(&mut ctx).unwrap_err();
        assert!(matches!(err, ExtractError::MissingDeclaration { what: "field", .. }));
    }

    #[test]
    fn test_stats_accumulate() {
        let mut total = ExtractStats::default();
        total += ExtractStats {
            spec_functions: 1,
            messages: 2,
            enums: 1,
            properties: 4,
        };
        total += ExtractStats {
            spec_functions: 1,
            messages: 1,
            enums: 0,
            properties: 2,
        };
        assert_eq!(total.messages, 3);
        assert_eq!(total.properties, 6);
        assert_eq!(total.spec_functions, 2);
    }
}
