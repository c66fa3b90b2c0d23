//! Type store and best-effort expression inference
//!
//! The inferencer walks Python expression trees and produces `Type` values
//! with advisory confidence. It never fails: anything it cannot prove is
//! `Type::Any`, and a bounded recursion guard turns runaway chains into
//! `Any` with the limit flagged so call sites can record the reason.

use std::collections::HashMap;

use dashmap::DashMap;
use tree_sitter::Node as TsNode;

use arbor_core::attributes::AttributeRegistry;
use arbor_core::graph::{CallGraph, CodeGraph};
use arbor_core::model::{NodeKind, Type, TypeSource};
use arbor_core::modules::ModuleRegistry;

use crate::languages::python::literal_type;
use crate::parser::node_text;

/// Default bound on inference recursion.
pub const MAX_INFER_DEPTH: usize = 1000;

/// A variable binding inside one function scope.
#[derive(Debug, Clone)]
pub struct StoredType {
    pub ty: Type,
    pub source: TypeSource,
    pub line: u32,
    pub column: u32,
}

/// Per-scope environment of variable name → inferred type.
///
/// Assignment-strength entries dominate parameter-strength entries, which
/// dominate heuristics; within a strength class the latest sighting wins.
#[derive(Debug, Default, Clone)]
pub struct TypeStore {
    vars: HashMap<String, StoredType>,
}

fn source_rank(source: TypeSource) -> u8 {
    match source {
        TypeSource::Annotation | TypeSource::Assignment => 2,
        TypeSource::Parameter | TypeSource::SelfType => 1,
        _ => 0,
    }
}

impl TypeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, stored: StoredType) {
        let name = name.into();
        match self.vars.get(&name) {
            Some(existing) if source_rank(existing.source) > source_rank(stored.source) => {}
            _ => {
                self.vars.insert(name, stored);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&StoredType> {
        self.vars.get(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Read-only index views the inferencer resolves names against.
#[derive(Clone, Copy)]
pub struct InferEnv<'a> {
    pub functions: &'a CallGraph,
    pub code: &'a CodeGraph,
    pub attributes: &'a AttributeRegistry,
    pub modules: &'a ModuleRegistry,
}

impl<'a> InferEnv<'a> {
    /// Resolve a written type/class name to a class FQN: exact, then
    /// same-module, then unique short name across the project.
    pub fn resolve_class(&self, name: &str, module: &str) -> Option<String> {
        resolve_type_name(self.code, name, module)
    }

    /// Resolve a return annotation to a type FQN or builtin name.
    pub fn resolve_return_type(&self, annotation: &str, module: &str) -> Option<String> {
        let inner = normalize_annotation(annotation);
        if inner.is_empty() {
            return None;
        }
        if is_builtin_type(&inner) {
            return Some(inner);
        }
        self.resolve_class(&inner, module)
    }
}

fn is_classlike(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Class | NodeKind::Dataclass | NodeKind::Interface | NodeKind::Enum
    )
}

/// Shared class-name resolution, also used when the pipeline finalizes the
/// attribute registry.
pub fn resolve_type_name(code: &CodeGraph, name: &str, module: &str) -> Option<String> {
    if let Some(node) = code.node(name) {
        if is_classlike(node.kind) {
            return Some(name.to_string());
        }
    }
    let candidate = format!("{module}.{name}");
    if let Some(node) = code.node(&candidate) {
        if is_classlike(node.kind) {
            return Some(candidate);
        }
    }
    let mut hits: Vec<&str> = code
        .nodes()
        .filter(|n| is_classlike(n.kind) && n.name == name)
        .map(|n| n.fqn.as_str())
        .collect();
    hits.sort_unstable();
    match hits.len() {
        0 => None,
        1 => Some(hits[0].to_string()),
        _ => hits
            .iter()
            .find(|fqn| fqn.starts_with(&format!("{module}.")))
            .or(hits.first())
            .map(|s| s.to_string()),
    }
}

pub fn is_builtin_type(name: &str) -> bool {
    matches!(
        name,
        "str" | "int" | "float" | "bool" | "bytes" | "list" | "dict" | "set" | "tuple" | "None"
    )
}

/// `Optional[User]` → `User`, quoted forward refs unwrapped, generics
/// collapsed to their head.
fn normalize_annotation(annotation: &str) -> String {
    let mut s = annotation.trim().trim_matches('"').trim_matches('\'').trim();
    if let Some(inner) = s
        .strip_prefix("Optional[")
        .and_then(|rest| rest.strip_suffix(']'))
    {
        s = inner.trim();
    }
    match s.split_once('[') {
        Some((head, _)) => head.trim().to_string(),
        None => s.to_string(),
    }
}

/// Result of one inference walk.
#[derive(Debug, Clone)]
pub struct InferResult {
    pub ty: Type,
    pub source: Option<TypeSource>,
    /// The recursion guard fired somewhere below.
    pub limit_hit: bool,
}

impl InferResult {
    fn any() -> Self {
        InferResult {
            ty: Type::Any,
            source: None,
            limit_hit: false,
        }
    }

    fn of(ty: Type, source: TypeSource) -> Self {
        InferResult {
            ty,
            source: Some(source),
            limit_hit: false,
        }
    }

    fn limit() -> Self {
        InferResult {
            ty: Type::Any,
            source: None,
            limit_hit: true,
        }
    }
}

/// Everything the inference of one expression needs besides the AST.
pub struct InferCtx<'a> {
    pub store: &'a TypeStore,
    pub source: &'a [u8],
    pub module: &'a str,
    pub self_type: Option<&'a str>,
}

/// Bidirectional type inferencer with a chain cache shared across calls.
pub struct Inferencer<'a> {
    env: InferEnv<'a>,
    chain_cache: DashMap<(String, String), Type>,
    max_depth: usize,
}

impl<'a> Inferencer<'a> {
    pub fn new(env: InferEnv<'a>) -> Self {
        Self::with_depth(env, MAX_INFER_DEPTH)
    }

    pub fn with_depth(env: InferEnv<'a>, max_depth: usize) -> Self {
        Inferencer {
            env,
            chain_cache: DashMap::new(),
            max_depth,
        }
    }

    pub fn env(&self) -> InferEnv<'a> {
        self.env
    }

    /// Infer the type of an expression node.
    pub fn infer(&self, node: TsNode, ctx: &InferCtx) -> InferResult {
        self.infer_at(node, ctx, 0)
    }

    fn infer_at(&self, node: TsNode, ctx: &InferCtx, depth: usize) -> InferResult {
        if depth >= self.max_depth {
            return InferResult::limit();
        }

        if let Some(lit) = literal_type(node.kind()) {
            return InferResult::of(Type::concrete(lit, 1.0), TypeSource::Literal);
        }

        match node.kind() {
            "identifier" => {
                let name = node_text(node, ctx.source);
                if name == "self" {
                    return match ctx.self_type {
                        Some(class) => {
                            InferResult::of(Type::concrete(class, 1.0), TypeSource::SelfType)
                        }
                        None => InferResult::any(),
                    };
                }
                match ctx.store.get(name) {
                    Some(stored) => InferResult::of(stored.ty.clone(), stored.source),
                    None => InferResult::any(),
                }
            }
            "attribute" => self.infer_attribute(node, ctx, depth),
            "call" => self.infer_call(node, ctx, depth),
            "parenthesized_expression" => match node.named_child(0) {
                Some(inner) => self.infer_at(inner, ctx, depth + 1),
                None => InferResult::any(),
            },
            "await" => match node.named_child(0) {
                Some(inner) => self.infer_at(inner, ctx, depth + 1),
                None => InferResult::any(),
            },
            "conditional_expression" => self.infer_conditional(node, ctx, depth),
            "not_operator" | "comparison_operator" => {
                InferResult::of(Type::concrete("bool", 0.9), TypeSource::Literal)
            }
            _ => InferResult::any(),
        }
    }

    /// `e.a` — infer `e`, then look `a` up in that class's attribute table.
    fn infer_attribute(&self, node: TsNode, ctx: &InferCtx, depth: usize) -> InferResult {
        let (Some(object), Some(attr)) = (
            node.child_by_field_name("object"),
            node.child_by_field_name("attribute"),
        ) else {
            return InferResult::any();
        };
        let attr_name = node_text(attr, ctx.source);

        let receiver = self.infer_at(object, ctx, depth + 1);
        if receiver.limit_hit {
            return receiver;
        }
        let Some(class_fqn) = receiver.ty.fqn().map(str::to_string) else {
            return InferResult::any();
        };

        let key = (class_fqn.clone(), attr_name.to_string());
        if let Some(cached) = self.chain_cache.get(&key) {
            return InferResult::of(cached.clone(), TypeSource::Chain);
        }

        let attr_ty = self
            .env
            .attributes
            .attribute(&class_fqn, attr_name)
            .and_then(|a| a.ty.clone());
        match attr_ty {
            Some(ty) => {
                self.chain_cache.insert(key, ty.clone());
                InferResult::of(ty, TypeSource::Chain)
            }
            None => InferResult::any(),
        }
    }

    /// `f(...)` — instantiation yields the class, a known function yields its
    /// annotated return type.
    fn infer_call(&self, node: TsNode, ctx: &InferCtx, depth: usize) -> InferResult {
        let Some(callee) = node.child_by_field_name("function") else {
            return InferResult::any();
        };
        match callee.kind() {
            "identifier" => {
                let name = node_text(callee, ctx.source);
                if let Some(class_fqn) = self.env.resolve_class(name, ctx.module) {
                    return InferResult::of(
                        Type::concrete(class_fqn, 0.9),
                        TypeSource::Return,
                    );
                }
                let func = self
                    .env
                    .functions
                    .function(&format!("{}.{name}", ctx.module))
                    .or_else(|| {
                        let hits = self.env.functions.functions_named(name);
                        match hits.len() {
                            1 => Some(hits[0]),
                            _ => None,
                        }
                    });
                match func.and_then(|f| f.return_type.as_deref()) {
                    Some(annotation) => self.return_annotation_result(annotation, ctx),
                    None => InferResult::any(),
                }
            }
            "attribute" => {
                let (Some(object), Some(attr)) = (
                    callee.child_by_field_name("object"),
                    callee.child_by_field_name("attribute"),
                ) else {
                    return InferResult::any();
                };
                let method = node_text(attr, ctx.source);
                let receiver = self.infer_at(object, ctx, depth + 1);
                if receiver.limit_hit {
                    return receiver;
                }
                if let Some(class_fqn) = receiver.ty.fqn() {
                    let method_fqn = format!("{class_fqn}.{method}");
                    if let Some(annotation) = self
                        .env
                        .functions
                        .function(&method_fqn)
                        .and_then(|f| f.return_type.as_deref())
                    {
                        let mut result = self.return_annotation_result(annotation, ctx);
                        if let Type::Concrete(c) = &mut result.ty {
                            c.confidence = c.confidence.min(receiver.ty.confidence());
                        }
                        return result;
                    }
                    return InferResult::any();
                }
                // `mod.func()` on a project module.
                let object_text = node_text(object, ctx.source);
                if let Some(resolution) = self.env.modules.resolve_import(object_text) {
                    if let Some(module_fqn) = resolution.fqn.filter(|_| resolution.resolved) {
                        if let Some(annotation) = self
                            .env
                            .functions
                            .function(&format!("{module_fqn}.{method}"))
                            .and_then(|f| f.return_type.as_deref())
                        {
                            return self.return_annotation_result(annotation, ctx);
                        }
                    }
                }
                InferResult::any()
            }
            _ => InferResult::any(),
        }
    }

    fn return_annotation_result(&self, annotation: &str, ctx: &InferCtx) -> InferResult {
        match self.env.resolve_return_type(annotation, ctx.module) {
            Some(fqn) => InferResult::of(Type::concrete(fqn, 0.9), TypeSource::Return),
            None => InferResult::any(),
        }
    }

    /// `a if c else b` — a union when the branches disagree.
    fn infer_conditional(&self, node: TsNode, ctx: &InferCtx, depth: usize) -> InferResult {
        let branches: Vec<TsNode> = (0..node.named_child_count())
            .filter_map(|i| node.named_child(i))
            .collect();
        // conditional_expression children are [consequence, condition, alternative]
        let (first, second) = match branches.as_slice() {
            [a, _, b] => (*a, *b),
            _ => return InferResult::any(),
        };
        let left = self.infer_at(first, ctx, depth + 1);
        let right = self.infer_at(second, ctx, depth + 1);
        if left.limit_hit || right.limit_hit {
            return InferResult::limit();
        }
        match (left.ty, right.ty) {
            (Type::Concrete(a), Type::Concrete(b)) if a.fqn == b.fqn => {
                let confidence = a.confidence.min(b.confidence);
                InferResult::of(
                    Type::concrete(a.fqn, confidence),
                    left.source.unwrap_or(TypeSource::Chain),
                )
            }
            (Type::Concrete(a), Type::Concrete(b)) => {
                InferResult::of(Type::Union(vec![a, b]), TypeSource::Chain)
            }
            (Type::Concrete(a), Type::Any) | (Type::Any, Type::Concrete(a)) => {
                let mut c = a;
                c.confidence *= 0.5;
                InferResult::of(Type::Concrete(c), TypeSource::Chain)
            }
            _ => InferResult::any(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(fqn: &str, confidence: f32, source: TypeSource) -> StoredType {
        StoredType {
            ty: Type::concrete(fqn, confidence),
            source,
            line: 1,
            column: 1,
        }
    }

    #[test]
    fn assignment_dominates_parameter() {
        let mut store = TypeStore::new();
        store.insert("x", stored("a.Strong", 0.85, TypeSource::Assignment));
        store.insert("x", stored("a.Weak", 0.95, TypeSource::Parameter));
        assert_eq!(store.get("x").unwrap().ty.fqn(), Some("a.Strong"));

        let mut store = TypeStore::new();
        store.insert("y", stored("a.Param", 0.95, TypeSource::Parameter));
        store.insert("y", stored("a.Assigned", 0.85, TypeSource::Assignment));
        assert_eq!(store.get("y").unwrap().ty.fqn(), Some("a.Assigned"));
    }

    #[test]
    fn later_assignment_wins_within_a_rank() {
        let mut store = TypeStore::new();
        store.insert("x", stored("a.First", 0.85, TypeSource::Assignment));
        store.insert("x", stored("a.Second", 0.85, TypeSource::Assignment));
        assert_eq!(store.get("x").unwrap().ty.fqn(), Some("a.Second"));
    }

    #[test]
    fn annotation_normalization() {
        assert_eq!(normalize_annotation("User"), "User");
        assert_eq!(normalize_annotation("Optional[User]"), "User");
        assert_eq!(normalize_annotation("\"User\""), "User");
        assert_eq!(normalize_annotation("list[int]"), "list");
        assert_eq!(normalize_annotation("  dict[str, int] "), "dict");
    }

    #[test]
    fn builtin_type_names() {
        for name in ["str", "int", "float", "bool", "list", "dict", "None"] {
            assert!(is_builtin_type(name), "{name}");
        }
        assert!(!is_builtin_type("User"));
        assert!(!is_builtin_type(""));
    }
}
