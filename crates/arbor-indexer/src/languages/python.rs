//! Python symbol extraction
//!
//! Walks a tree-sitter Python AST and emits symbol nodes, class attribute
//! sightings, and statement-level entities. FQNs for class-scoped entities
//! are derived from a prebuilt class-context table queried by byte-range
//! enclosure, innermost span winning.

use std::path::Path;

use tree_sitter::{Node as TsNode, Tree};

use arbor_core::model::{
    Node, NodeKind, Param, Scope, SourceLocation, TypeSource, Visibility,
};

use crate::extract::{Extraction, RawAttribute};
use crate::parser::{node_line, node_text};

/// Byte spans of every class in a file, mapped to the class FQN.
pub struct ClassContexts {
    spans: Vec<(usize, usize, String)>,
}

impl ClassContexts {
    /// Innermost class enclosing `[start, end)`; ties broken by the smaller
    /// span.
    pub fn innermost(&self, start: usize, end: usize) -> Option<&str> {
        self.spans
            .iter()
            .filter(|(s, e, _)| *s <= start && end <= *e)
            .min_by_key(|(s, e, _)| e - s)
            .map(|(_, _, fqn)| fqn.as_str())
    }
}

/// Build the class-context table for a parsed file.
pub fn class_contexts(tree: &Tree, module: &str, source: &[u8]) -> ClassContexts {
    let mut spans = Vec::new();
    collect_class_spans(tree.root_node(), module, module, source, &mut spans);
    ClassContexts { spans }
}

fn collect_class_spans(
    node: TsNode,
    parent_fqn: &str,
    module: &str,
    source: &[u8],
    spans: &mut Vec<(usize, usize, String)>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let class = match child.kind() {
            "class_definition" => Some(child),
            "decorated_definition" => child
                .child_by_field_name("definition")
                .filter(|d| d.kind() == "class_definition"),
            _ => None,
        };
        if let Some(class) = class {
            if let Some(name_node) = class.child_by_field_name("name") {
                let fqn = format!("{parent_fqn}.{}", node_text(name_node, source));
                spans.push((class.start_byte(), class.end_byte(), fqn.clone()));
                collect_class_spans(class, &fqn, module, source, spans);
                continue;
            }
        }
        // A class under a function scopes to the module, not the class the
        // function happens to live in.
        let next_parent = if child.kind() == "function_definition" {
            module
        } else {
            parent_fqn
        };
        collect_class_spans(child, next_parent, module, source, spans);
    }
}

/// Extract all symbols from one Python file.
pub fn extract(module: &str, file: &Path, source: &[u8], tree: &Tree) -> Extraction {
    let contexts = class_contexts(tree, module, source);
    let mut ext = Extraction::default();
    let walker = Walker {
        module,
        file,
        source,
        contexts: &contexts,
    };
    walker.walk_block(tree.root_node(), None, &mut ext);
    ext
}

struct Walker<'a> {
    module: &'a str,
    file: &'a Path,
    source: &'a [u8],
    contexts: &'a ClassContexts,
}

/// Enclosing class, when walking a class body.
#[derive(Clone, Copy)]
struct ClassCtx<'a> {
    fqn: &'a str,
}

/// What a function definition hangs off of.
#[derive(Clone, Copy)]
enum FnOwner<'a> {
    Module,
    Class(ClassCtx<'a>),
    Function(&'a str),
}

impl<'a> Walker<'a> {
    fn walk_block(&self, block: TsNode, class: Option<ClassCtx>, ext: &mut Extraction) {
        let owner = match class {
            Some(c) => FnOwner::Class(c),
            None => FnOwner::Module,
        };
        let mut cursor = block.walk();
        for child in block.children(&mut cursor) {
            match child.kind() {
                "function_definition" => self.emit_function(child, &[], owner, ext),
                "class_definition" => self.emit_class(child, &[], class, ext),
                "decorated_definition" => {
                    let decorators = self.decorators(child);
                    if let Some(def) = child.child_by_field_name("definition") {
                        match def.kind() {
                            "function_definition" => {
                                self.emit_function(def, &decorators, owner, ext)
                            }
                            "class_definition" => self.emit_class(def, &decorators, class, ext),
                            _ => {}
                        }
                    }
                }
                "expression_statement" => {
                    if let Some(assign) = child.named_child(0).filter(|n| n.kind() == "assignment")
                    {
                        self.emit_assignment(assign, class, ext);
                    }
                }
                "if_statement" | "try_statement" | "with_statement" | "for_statement"
                | "while_statement" | "block" | "else_clause" | "elif_clause"
                | "except_clause" | "finally_clause" => {
                    self.walk_block(child, class, ext);
                }
                _ => {}
            }
        }
    }

    /// Names of decorators on a `decorated_definition`, call parens stripped.
    fn decorators(&self, node: TsNode) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "decorator" {
                let text = node_text(child, self.source)
                    .trim_start_matches('@')
                    .trim();
                let name = text.split('(').next().unwrap_or(text).trim();
                if !name.is_empty() {
                    out.push(name.to_string());
                }
            }
        }
        out
    }

    fn emit_class(
        &self,
        node: TsNode,
        decorators: &[String],
        parent: Option<ClassCtx>,
        ext: &mut Extraction,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let fqn = match parent {
            Some(class) => format!("{}.{name}", class.fqn),
            None => format!("{}.{name}", self.module),
        };

        let bases = self.base_classes(node);
        let kind = classify_class(decorators, &bases);

        let interfaces: Vec<String> = bases
            .iter()
            .filter(|b| is_protocol_base(b))
            .cloned()
            .collect();
        let superclass = bases
            .iter()
            .find(|b| !is_protocol_base(b) && !is_enum_base(b))
            .cloned();

        let mut class_node = Node::new(
            fqn.clone(),
            kind,
            name.clone(),
            self.file,
            node_line(node),
            if parent.is_some() {
                Scope::Class
            } else {
                Scope::Module
            },
        );
        class_node.byte_range = Some((node.start_byte(), node.end_byte()));
        class_node.decorators = decorators.to_vec();
        class_node.superclass = superclass;
        class_node.interfaces = interfaces;
        class_node.visibility = Visibility::from_python_name(&name);
        ext.nodes.push(class_node);

        if let Some(body) = node.child_by_field_name("body") {
            self.walk_block(body, Some(ClassCtx { fqn: &fqn }), ext);
        }
    }

    fn base_classes(&self, class: TsNode) -> Vec<String> {
        let mut bases = Vec::new();
        if let Some(superclasses) = class.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for child in superclasses.named_children(&mut cursor) {
                match child.kind() {
                    "identifier" | "attribute" => {
                        bases.push(node_text(child, self.source).to_string());
                    }
                    // Generic bases like `Repository[User]`.
                    "subscript" => {
                        if let Some(value) = child.child_by_field_name("value") {
                            bases.push(node_text(value, self.source).to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
        bases
    }

    fn emit_function(
        &self,
        node: TsNode,
        decorators: &[String],
        owner: FnOwner,
        ext: &mut Extraction,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let (fqn, scope) = match owner {
            FnOwner::Module => (format!("{}.{name}", self.module), Scope::Module),
            FnOwner::Class(c) => (format!("{}.{name}", c.fqn), Scope::Class),
            FnOwner::Function(outer) => (format!("{outer}.{name}"), Scope::Function),
        };
        let in_class = matches!(owner, FnOwner::Class(_));
        let kind = classify_function(&name, decorators, in_class);

        let mut func = Node::new(fqn.clone(), kind, name.clone(), self.file, node_line(node), scope);
        func.byte_range = Some((node.start_byte(), node.end_byte()));
        func.decorators = decorators.to_vec();
        func.params = self.params(node);
        func.return_type = node
            .child_by_field_name("return_type")
            .map(|rt| node_text(rt, self.source).to_string());
        func.visibility = Visibility::from_python_name(&name);
        ext.nodes.push(func);

        if let FnOwner::Class(c) = owner {
            ext.methods.push((c.fqn.to_string(), fqn.clone()));
        }

        if let Some(body) = node.child_by_field_name("body") {
            if let FnOwner::Class(c) = owner {
                self.collect_self_assignments(body, c, &name, node, ext);
            }
            self.emit_statements(body, &fqn, ext);
            // Nested definitions keep their own scope.
            self.walk_nested_defs(body, &fqn, ext);
        }
    }

    /// Function parameters, including annotations and defaults.
    fn params(&self, func: TsNode) -> Vec<Param> {
        let mut out = Vec::new();
        let Some(params) = func.child_by_field_name("parameters") else {
            return out;
        };
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            match child.kind() {
                "identifier" => out.push(Param::new(node_text(child, self.source))),
                "typed_parameter" => {
                    let name = child
                        .named_child(0)
                        .map(|n| node_text(n, self.source))
                        .unwrap_or_default();
                    let mut p = Param::new(name);
                    p.annotation = child
                        .child_by_field_name("type")
                        .map(|t| node_text(t, self.source).to_string());
                    out.push(p);
                }
                "default_parameter" | "typed_default_parameter" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| node_text(n, self.source))
                        .unwrap_or_default();
                    let mut p = Param::new(name);
                    p.annotation = child
                        .child_by_field_name("type")
                        .map(|t| node_text(t, self.source).to_string());
                    p.default = child
                        .child_by_field_name("value")
                        .map(|v| node_text(v, self.source).to_string());
                    out.push(p);
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => {
                    out.push(Param::new(node_text(child, self.source)));
                }
                _ => {}
            }
        }
        out
    }

    /// `self.x = ...` sightings inside a method body.
    fn collect_self_assignments(
        &self,
        body: TsNode,
        class: ClassCtx,
        method_name: &str,
        func: TsNode,
        ext: &mut Extraction,
    ) {
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                // Assignments inside nested defs belong to those scopes.
                if matches!(child.kind(), "function_definition" | "class_definition") {
                    continue;
                }
                if child.kind() == "assignment" {
                    self.emit_self_assignment(child, class, method_name, func, ext);
                }
                stack.push(child);
            }
        }
    }

    fn emit_self_assignment(
        &self,
        assign: TsNode,
        class: ClassCtx,
        method_name: &str,
        func: TsNode,
        ext: &mut Extraction,
    ) {
        let Some(left) = assign.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "attribute" {
            return;
        }
        let receiver_is_self = left
            .child_by_field_name("object")
            .map(|o| node_text(o, self.source) == "self")
            .unwrap_or(false);
        if !receiver_is_self {
            return;
        }
        let Some(attr_node) = left.child_by_field_name("attribute") else {
            return;
        };
        let attr_name = node_text(attr_node, self.source).to_string();

        let (raw_type, source, confidence) = self.rhs_type_hint(assign, func);

        let field_fqn = format!("{}.{attr_name}", class.fqn);
        let mut field = Node::new(
            field_fqn,
            NodeKind::ClassField,
            attr_name.clone(),
            self.file,
            node_line(assign),
            Scope::Class,
        );
        field.byte_range = Some((assign.start_byte(), assign.end_byte()));
        field.visibility = Visibility::from_python_name(&attr_name);
        ext.nodes.push(field);

        ext.raw_attributes.push(RawAttribute {
            class_fqn: class.fqn.to_string(),
            name: attr_name,
            raw_type,
            source,
            confidence,
            assigned_in: Some(method_name.to_string()),
            location: SourceLocation::new(self.file, assign.start_byte(), assign.end_byte()),
        });
    }

    /// Best local type hint for an assignment's right-hand side: annotation,
    /// literal, constructor call, or an annotated parameter being stored.
    fn rhs_type_hint(
        &self,
        assign: TsNode,
        func: TsNode,
    ) -> (Option<String>, TypeSource, f32) {
        if let Some(ty) = assign.child_by_field_name("type") {
            return (
                Some(node_text(ty, self.source).to_string()),
                TypeSource::Annotation,
                0.95,
            );
        }
        let Some(right) = assign.child_by_field_name("right") else {
            return (None, TypeSource::Assignment, 0.0);
        };
        if let Some(lit) = literal_type(right.kind()) {
            return (Some(lit.to_string()), TypeSource::Assignment, 0.85);
        }
        if right.kind() == "call" {
            if let Some(f) = right.child_by_field_name("function") {
                let callee = node_text(f, self.source);
                if callee
                    .chars()
                    .next()
                    .map(char::is_uppercase)
                    .unwrap_or(false)
                {
                    return (Some(callee.to_string()), TypeSource::Assignment, 0.85);
                }
            }
        }
        if right.kind() == "identifier" {
            let var = node_text(right, self.source);
            if let Some(annotation) = self.param_annotation(func, var) {
                return (Some(annotation), TypeSource::Parameter, 0.70);
            }
        }
        (None, TypeSource::Assignment, 0.0)
    }

    fn param_annotation(&self, func: TsNode, param_name: &str) -> Option<String> {
        let params = func.child_by_field_name("parameters")?;
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            let (name, annotation) = match child.kind() {
                "typed_parameter" => (
                    child.named_child(0).map(|n| node_text(n, self.source)),
                    child.child_by_field_name("type"),
                ),
                "typed_default_parameter" => (
                    child
                        .child_by_field_name("name")
                        .map(|n| node_text(n, self.source)),
                    child.child_by_field_name("type"),
                ),
                _ => (None, None),
            };
            if name == Some(param_name) {
                return annotation.map(|t| node_text(t, self.source).to_string());
            }
        }
        None
    }

    /// Module- or class-level assignment: ALL_CAPS literal becomes a
    /// Constant, anything else a ModuleVariable or ClassField.
    fn emit_assignment(&self, assign: TsNode, class: Option<ClassCtx>, ext: &mut Extraction) {
        let Some(left) = assign.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = node_text(left, self.source).to_string();

        // The context table decides the owning class for I6-style FQNs.
        let owner = self
            .contexts
            .innermost(assign.start_byte(), assign.end_byte())
            .map(str::to_string);
        debug_assert_eq!(owner.as_deref(), class.map(|c| c.fqn));

        let fqn = match &owner {
            Some(class_fqn) => format!("{class_fqn}.{name}"),
            None => format!("{}.{name}", self.module),
        };

        let right = assign.child_by_field_name("right");
        let annotation = assign
            .child_by_field_name("type")
            .map(|t| node_text(t, self.source).to_string());
        let rhs_literal = right.and_then(|r| literal_type(r.kind()));

        let kind = if is_screaming_case(&name) && rhs_literal.is_some() {
            NodeKind::Constant
        } else if owner.is_some() {
            NodeKind::ClassField
        } else {
            NodeKind::ModuleVariable
        };

        let mut node = Node::new(
            fqn,
            kind,
            name.clone(),
            self.file,
            node_line(assign),
            if owner.is_some() {
                Scope::Class
            } else {
                Scope::Module
            },
        );
        node.byte_range = Some((assign.start_byte(), assign.end_byte()));
        node.visibility = Visibility::from_python_name(&name);
        ext.nodes.push(node);

        if let Some(class_fqn) = owner {
            let (raw_type, source, confidence) = match (&annotation, rhs_literal) {
                (Some(a), _) => (Some(a.clone()), TypeSource::Annotation, 0.95),
                (None, Some(lit)) => (Some(lit.to_string()), TypeSource::Assignment, 0.85),
                (None, None) => (None, TypeSource::Assignment, 0.0),
            };
            ext.raw_attributes.push(RawAttribute {
                class_fqn,
                name,
                raw_type,
                source,
                confidence,
                assigned_in: None,
                location: SourceLocation::new(
                    self.file,
                    assign.start_byte(),
                    assign.end_byte(),
                ),
            });
        }
    }

    /// Statement-level entities inside a function body.
    fn emit_statements(&self, body: TsNode, func_fqn: &str, ext: &mut Extraction) {
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if matches!(child.kind(), "function_definition" | "class_definition") {
                    continue;
                }
                let kind = match child.kind() {
                    "break_statement" => Some((NodeKind::BreakStmt, "break")),
                    "continue_statement" => Some((NodeKind::ContinueStmt, "continue")),
                    "return_statement" => Some((NodeKind::ReturnStmt, "return")),
                    "assert_statement" => Some((NodeKind::AssertStmt, "assert")),
                    "yield" => Some((NodeKind::YieldStmt, "yield")),
                    _ => None,
                };
                if let Some((kind, word)) = kind {
                    let line = node_line(child);
                    let mut stmt = Node::new(
                        format!("{func_fqn}.{}:{line}", kind.name()),
                        kind,
                        word,
                        self.file,
                        line,
                        Scope::Function,
                    );
                    stmt.byte_range = Some((child.start_byte(), child.end_byte()));
                    ext.nodes.push(stmt);
                }
                stack.push(child);
            }
        }
    }

    /// Nested `def`s and classes inside a function body.
    fn walk_nested_defs(&self, body: TsNode, outer_fqn: &str, ext: &mut Extraction) {
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "function_definition" => {
                        self.emit_function(child, &[], FnOwner::Function(outer_fqn), ext);
                    }
                    // A class inside a function scopes to the module, matching
                    // the class-context table.
                    "class_definition" => self.emit_class(child, &[], None, ext),
                    _ => stack.push(child),
                }
            }
        }
    }
}

fn classify_function(name: &str, decorators: &[String], in_class: bool) -> NodeKind {
    if !in_class {
        return NodeKind::Function;
    }
    if name == "__init__" {
        return NodeKind::Constructor;
    }
    if decorators
        .iter()
        .any(|d| d == "property" || d == "cached_property" || d.ends_with(".cached_property"))
    {
        return NodeKind::Property;
    }
    if name.starts_with("__") && name.ends_with("__") {
        return NodeKind::SpecialMethod;
    }
    NodeKind::Method
}

fn classify_class(decorators: &[String], bases: &[String]) -> NodeKind {
    if decorators
        .iter()
        .any(|d| d == "dataclass" || d == "dataclasses.dataclass")
    {
        return NodeKind::Dataclass;
    }
    if bases.iter().any(|b| is_protocol_base(b)) {
        return NodeKind::Interface;
    }
    if bases.iter().any(|b| is_enum_base(b)) {
        return NodeKind::Enum;
    }
    NodeKind::Class
}

fn is_protocol_base(base: &str) -> bool {
    base == "Protocol" || base.ends_with(".Protocol")
}

fn is_enum_base(base: &str) -> bool {
    matches!(
        base.rsplit('.').next().unwrap_or(base),
        "Enum" | "IntEnum" | "StrEnum" | "Flag" | "IntFlag"
    )
}

/// Python builtin type for a literal AST kind.
pub fn literal_type(kind: &str) -> Option<&'static str> {
    match kind {
        "string" | "concatenated_string" => Some("str"),
        "integer" => Some("int"),
        "float" => Some("float"),
        "true" | "false" => Some("bool"),
        "none" => Some("None"),
        "list" | "list_comprehension" => Some("list"),
        "dictionary" | "dictionary_comprehension" => Some("dict"),
        "set" | "set_comprehension" => Some("set"),
        "tuple" => Some("tuple"),
        _ => None,
    }
}

fn is_screaming_case(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
        && !name.chars().any(|c| c.is_ascii_lowercase())
}
