//! Call-graph construction
//!
//! Walks every Python function body with a fresh type store, records a
//! CallSite for each call expression, and resolves targets through the
//! inferencer and the module registry. Resolution never fails hard: an
//! unresolvable target produces an unresolved site with a reason.

use std::collections::HashMap;

use tree_sitter::Node as TsNode;

use arbor_core::model::{Argument, CallSite, Node, NodeKind, Scope, Type, TypeSource};

use crate::infer::{InferCtx, InferEnv, Inferencer, StoredType, TypeStore};
use crate::languages::FileKind;
use crate::parser::{node_column, node_line, node_text};
use crate::pipeline::ParsedFile;

/// Resolve every call site in the given files against the populated
/// function table. `progress` is reported in [0, 1] across files.
pub fn build_call_sites(
    files: &[ParsedFile],
    env: InferEnv<'_>,
    mut progress: impl FnMut(f32),
) -> Vec<CallSite> {
    let inferencer = Inferencer::new(env);
    let mut sites = Vec::new();

    // Deterministic order regardless of walk order; the inference cache
    // makes ordering semantically irrelevant.
    let mut ordered: Vec<&ParsedFile> = files
        .iter()
        .filter(|f| f.kind == FileKind::Python)
        .collect();
    ordered.sort_by(|a, b| a.module.cmp(&b.module));

    let total = ordered.len().max(1);
    for (i, file) in ordered.iter().enumerate() {
        let Some(tree) = &file.tree else { continue };
        let by_start: HashMap<usize, &Node> = env
            .functions
            .functions()
            .filter(|n| n.file == file.path)
            .filter_map(|n| n.byte_range.map(|(start, _)| (start, n)))
            .collect();

        let mut defs = Vec::new();
        collect_function_defs(tree.root_node(), &mut defs);
        for def in defs {
            if let Some(func) = by_start.get(&def.start_byte()).copied() {
                let builder = FunctionWalk {
                    inferencer: &inferencer,
                    func,
                    module: &file.module,
                    source: &file.source,
                };
                builder.run(def, &mut sites);
            }
        }
        progress((i + 1) as f32 / total as f32);
    }
    sites
}

fn collect_function_defs<'t>(node: TsNode<'t>, out: &mut Vec<TsNode<'t>>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "function_definition" {
            out.push(child);
        }
        collect_function_defs(child, out);
    }
}

struct FunctionWalk<'a> {
    inferencer: &'a Inferencer<'a>,
    func: &'a Node,
    module: &'a str,
    source: &'a [u8],
}

impl<'a> FunctionWalk<'a> {
    fn run(&self, def: TsNode, sites: &mut Vec<CallSite>) {
        let mut store = TypeStore::new();
        self.seed_store(&mut store);
        if let Some(body) = def.child_by_field_name("body") {
            self.visit(body, &mut store, sites);
        }
    }

    fn self_class(&self) -> Option<&str> {
        if self.func.scope == Scope::Class {
            self.func.fqn.rsplit_once('.').map(|(class, _)| class)
        } else {
            None
        }
    }

    /// Seed the store with `self` and the declared parameters. Untyped
    /// parameters are stored as `Any` so receivers can be told apart from
    /// names that were never bound locally.
    fn seed_store(&self, store: &mut TypeStore) {
        if let Some(class) = self.self_class() {
            store.insert(
                "self",
                StoredType {
                    ty: Type::concrete(class, 1.0),
                    source: TypeSource::SelfType,
                    line: self.func.line,
                    column: 0,
                },
            );
        }
        for param in &self.func.params {
            if param.name == "self" || param.name.starts_with('*') {
                continue;
            }
            let resolved = param.annotation.as_deref().and_then(|a| {
                self.inferencer
                    .env()
                    .resolve_return_type(a, self.module)
                    .map(|fqn| (fqn, 0.95))
            });
            let resolved = resolved.or_else(|| {
                param
                    .default
                    .as_deref()
                    .and_then(default_literal_type)
                    .map(|t| (t.to_string(), 0.70))
            });
            let ty = match resolved {
                Some((fqn, confidence)) => Type::concrete(fqn, confidence),
                None => Type::Any,
            };
            store.insert(
                param.name.clone(),
                StoredType {
                    ty,
                    source: TypeSource::Parameter,
                    line: self.func.line,
                    column: 0,
                },
            );
        }
    }

    /// In-order body walk: calls are recorded with the store as of their
    /// position, assignments update the store afterwards. Nested defs keep
    /// their own scopes and are skipped here.
    fn visit(&self, node: TsNode, store: &mut TypeStore, sites: &mut Vec<CallSite>) {
        match node.kind() {
            "function_definition" | "class_definition" => {}
            "assignment" => {
                if let Some(right) = node.child_by_field_name("right") {
                    self.visit(right, store, sites);
                }
                self.apply_assignment(node, store);
            }
            "call" => {
                // Calls inside the callee expression (inline instantiation)
                // and in arguments are sites of their own.
                if let Some(callee) = node.child_by_field_name("function") {
                    self.visit_children_only(callee, store, sites);
                }
                if let Some(args) = node.child_by_field_name("arguments") {
                    self.visit(args, store, sites);
                }
                sites.push(self.record_call(node, store));
            }
            _ => self.visit_children_only(node, store, sites),
        }
    }

    fn visit_children_only(&self, node: TsNode, store: &mut TypeStore, sites: &mut Vec<CallSite>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, store, sites);
        }
    }

    fn apply_assignment(&self, assign: TsNode, store: &mut TypeStore) {
        let Some(left) = assign.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = node_text(left, self.source).to_string();
        let line = node_line(assign);
        let column = node_column(assign);

        if let Some(annotation) = assign.child_by_field_name("type") {
            let text = node_text(annotation, self.source);
            if let Some(fqn) = self
                .inferencer
                .env()
                .resolve_return_type(text, self.module)
            {
                store.insert(
                    name,
                    StoredType {
                        ty: Type::concrete(fqn, 0.95),
                        source: TypeSource::Annotation,
                        line,
                        column,
                    },
                );
            }
            return;
        }

        let Some(right) = assign.child_by_field_name("right") else {
            return;
        };
        let ctx = self.ctx(store);
        let inferred = self.inferencer.infer(right, &ctx);
        // Re-binding to something unknowable still marks the name as local.
        let ty = match inferred.ty.fqn() {
            Some(fqn) => Type::concrete(fqn, inferred.ty.confidence().min(0.85)),
            None => Type::Any,
        };
        store.insert(
            name,
            StoredType {
                ty,
                source: TypeSource::Assignment,
                line,
                column,
            },
        );
    }

    fn ctx<'s>(&'s self, store: &'s TypeStore) -> InferCtx<'s> {
        InferCtx {
            store,
            source: self.source,
            module: self.module,
            self_type: self.self_class(),
        }
    }

    fn record_call(&self, call: TsNode, store: &TypeStore) -> CallSite {
        let line = node_line(call);
        let column = node_column(call);
        let arguments = self.arguments(call);

        let Some(callee) = call.child_by_field_name("function") else {
            return CallSite::unresolved(
                &self.func.fqn,
                node_text(call, self.source),
                &self.func.file,
                line,
                column,
                "unsupported callee expression",
            );
        };

        let (target_name, outcome) = match callee.kind() {
            "identifier" => {
                let name = node_text(callee, self.source).to_string();
                let outcome = self.resolve_bare(&name, arguments.len());
                (name, outcome)
            }
            "attribute" => {
                let method = callee
                    .child_by_field_name("attribute")
                    .map(|a| node_text(a, self.source).to_string())
                    .unwrap_or_default();
                let outcome = self.resolve_attribute(callee, &method, arguments.len(), store);
                (method, outcome)
            }
            _ => (
                node_text(callee, self.source).to_string(),
                Outcome::fail("unsupported callee expression"),
            ),
        };

        let mut site = CallSite {
            caller: self.func.fqn.clone(),
            target_name,
            target_fqn: String::new(),
            file: self.func.file.clone(),
            line,
            column,
            resolved: false,
            failure_reason: None,
            arguments,
            inferred_type: None,
            type_confidence: None,
            type_source: None,
        };
        if let Some((ty, confidence, source)) = outcome.inferred {
            site.inferred_type = Some(ty);
            site.type_confidence = Some(confidence);
            site.type_source = Some(source);
        }
        match outcome.target {
            Ok(fqn) => {
                site.resolved = true;
                site.target_fqn = fqn;
                site.failure_reason = outcome.note;
            }
            Err(reason) => {
                site.failure_reason = Some(reason);
            }
        }
        site
    }

    fn arguments(&self, call: TsNode) -> Vec<Argument> {
        let Some(args) = call.child_by_field_name("arguments") else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut cursor = args.walk();
        for (position, child) in args.named_children(&mut cursor).enumerate() {
            out.push(Argument {
                position,
                value: node_text(child, self.source).to_string(),
            });
        }
        out
    }

    /// `name(...)` — a constructor when `name` is a known class, otherwise a
    /// function looked up same-module first, then project-wide.
    fn resolve_bare(&self, name: &str, argc: usize) -> Outcome {
        let env = self.inferencer.env();

        if let Some(class_fqn) = env.resolve_class(name, self.module) {
            let instance = Some((class_fqn.clone(), 0.9, TypeSource::Return));
            let ctor = format!("{class_fqn}.__init__");
            if env.functions.contains(&ctor) {
                return Outcome {
                    target: Ok(ctor),
                    note: None,
                    inferred: instance,
                };
            }
            return Outcome {
                target: Err(format!("class '{class_fqn}' defines no constructor")),
                note: None,
                inferred: instance,
            };
        }

        let same_module = format!("{}.{name}", self.module);
        if let Some(node) = env.functions.function(&same_module) {
            if node.kind == NodeKind::Function {
                return Outcome::ok(same_module);
            }
        }

        let candidates: Vec<&Node> = env
            .functions
            .functions_named(name)
            .into_iter()
            .filter(|n| n.kind == NodeKind::Function)
            .collect();
        match candidates.len() {
            0 => Outcome::fail(format!("function '{name}' not found in project")),
            1 => Outcome::ok(candidates[0].fqn.clone()),
            _ => self.tie_break(candidates, argc),
        }
    }

    /// `recv.m(...)` — self calls, typed receivers, static class calls, and
    /// module-function calls, with a unique-name fallback.
    fn resolve_attribute(
        &self,
        callee: TsNode,
        method: &str,
        argc: usize,
        store: &TypeStore,
    ) -> Outcome {
        let env = self.inferencer.env();
        let Some(object) = callee.child_by_field_name("object") else {
            return Outcome::fail("unsupported callee expression");
        };
        let object_text = node_text(object, self.source);

        // self.m()
        if object_text == "self" {
            let Some(class) = self.self_class() else {
                return Outcome::fail("'self' outside a method");
            };
            let fqn = format!("{class}.{method}");
            let inferred = Some((class.to_string(), 1.0, TypeSource::SelfType));
            if env.functions.contains(&fqn) {
                return Outcome {
                    target: Ok(fqn),
                    note: None,
                    inferred,
                };
            }
            return Outcome {
                target: Err(format!("method '{method}' not found on {class}")),
                note: None,
                inferred,
            };
        }

        // Typed receiver: variables, chains, inline instantiations.
        let ctx = self.ctx(store);
        let receiver = self.inferencer.infer(object, &ctx);
        if receiver.limit_hit {
            return Outcome::fail("recursion limit exceeded");
        }
        if let Some(class_fqn) = receiver.ty.fqn() {
            let fqn = format!("{class_fqn}.{method}");
            let inferred = Some((
                class_fqn.to_string(),
                receiver.ty.confidence(),
                receiver.source.unwrap_or(TypeSource::Chain),
            ));
            if env.functions.contains(&fqn) {
                return Outcome {
                    target: Ok(fqn),
                    note: None,
                    inferred,
                };
            }
            return Outcome {
                target: Err(format!("method '{method}' not found on {class_fqn}")),
                note: None,
                inferred,
            };
        }

        // Static call on a class name.
        if object.kind() == "identifier"
            && object_text.chars().next().map(char::is_uppercase).unwrap_or(false)
        {
            if let Some(class_fqn) = env.resolve_class(object_text, self.module) {
                let fqn = format!("{class_fqn}.{method}");
                if env.functions.contains(&fqn) {
                    return Outcome::ok(fqn);
                }
                return Outcome::fail(format!("method '{method}' not found on {class_fqn}"));
            }
        }

        // Module-function call. Names never bound in this scope that look
        // like module paths are treated as imports.
        let is_local = object.kind() == "identifier" && store.get(object_text).is_some();
        if !is_local && looks_like_module_path(object_text) {
            let resolution = env.modules.resolve_import(object_text);
            match resolution {
                Some(resolution) if resolution.resolved => {
                    if let Some(module_fqn) = resolution.fqn {
                        let fqn = format!("{module_fqn}.{method}");
                        if env.functions.contains(&fqn) {
                            return Outcome::ok(fqn);
                        }
                        return Outcome::fail(format!(
                            "function '{method}' not found in module {module_fqn}"
                        ));
                    }
                }
                _ => {
                    return Outcome::fail(format!("module '{object_text}' not in project"));
                }
            }
        }

        // Unknown receiver: fall back to a project-wide method name match.
        let candidates: Vec<&Node> = env
            .functions
            .functions_named(method)
            .into_iter()
            .filter(|n| n.kind.is_callable() && n.scope == Scope::Class)
            .collect();
        match candidates.len() {
            0 => Outcome::fail("receiver type unknown"),
            1 => Outcome::ok(candidates[0].fqn.clone()),
            _ => self.tie_break(candidates, argc),
        }
    }

    /// Tie-break among short-name candidates: same module first, then a
    /// parameter count matching the call, then the lexicographically first
    /// FQN. The alternatives are noted on the resolved site.
    fn tie_break(&self, candidates: Vec<&Node>, argc: usize) -> Outcome {
        let module_prefix = format!("{}.", self.module);
        let winner = candidates
            .iter()
            .find(|n| n.fqn.starts_with(&module_prefix))
            .or_else(|| {
                candidates
                    .iter()
                    .find(|n| param_count_matches(n, argc))
            })
            .or(candidates.first())
            .copied();

        match winner {
            Some(winner) => {
                let alternatives: Vec<&str> = candidates
                    .iter()
                    .filter(|n| n.fqn != winner.fqn)
                    .map(|n| n.fqn.as_str())
                    .collect();
                Outcome {
                    target: Ok(winner.fqn.clone()),
                    note: Some(format!("alternatives: {}", alternatives.join(", "))),
                    inferred: None,
                }
            }
            None => Outcome::fail("receiver type unknown"),
        }
    }
}

/// Methods carry `self` as their first parameter.
fn param_count_matches(node: &Node, argc: usize) -> bool {
    let declared = node.params.len();
    if node.scope == Scope::Class {
        declared == argc + 1
    } else {
        declared == argc
    }
}

fn looks_like_module_path(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
}

/// Builtin type of a parameter default, judged from its text.
fn default_literal_type(default: &str) -> Option<&'static str> {
    let d = default.trim();
    if d.starts_with('"') || d.starts_with('\'') {
        Some("str")
    } else if d == "True" || d == "False" {
        Some("bool")
    } else if d == "None" {
        Some("None")
    } else if d.starts_with('[') {
        Some("list")
    } else if d.starts_with('{') {
        Some("dict")
    } else if d.starts_with('(') {
        Some("tuple")
    } else if d.chars().all(|c| c.is_ascii_digit() || c == '_') && !d.is_empty() {
        Some("int")
    } else if d.parse::<f64>().is_ok() {
        Some("float")
    } else {
        None
    }
}

/// Outcome of resolving one callee expression.
struct Outcome {
    target: Result<String, String>,
    note: Option<String>,
    inferred: Option<(String, f32, TypeSource)>,
}

impl Outcome {
    fn ok(fqn: String) -> Self {
        Outcome {
            target: Ok(fqn),
            note: None,
            inferred: None,
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Outcome {
            target: Err(reason.into()),
            note: None,
            inferred: None,
        }
    }
}
