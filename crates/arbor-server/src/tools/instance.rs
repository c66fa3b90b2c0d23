//! Instance-expression tools
//!
//! `resolve_instance_call` and `get_instance_type` canonicalize user queries
//! like `service.get_user()` by actually parsing the expression with the
//! Python grammar and running the inferencer against the index, seeded from
//! the caller-provided context.

use std::path::Path;

use serde_json::{Value, json};

use arbor_core::index::Index;
use arbor_core::model::{Type, TypeSource};
use arbor_indexer::infer::{
    InferCtx, InferEnv, Inferencer, StoredType, TypeStore, is_builtin_type, resolve_type_name,
};
use arbor_indexer::languages::FileKind;
use arbor_indexer::parser::parse_source;

use super::{Tool, ToolError, ToolOutcome, require_str, u64_arg};
use crate::query::{QueryPattern, QueryResolver};
use crate::tools::symbols::suggestions_for;

pub(super) fn catalog() -> Vec<Tool> {
    vec![
        Tool {
            name: "resolve_instance_call",
            description: "Canonicalize a call expression (self.x(), var.m(), Class().m()) into a fully-qualified method name.",
            input_schema: instance_schema,
            handler: resolve_instance_call,
        },
        Tool {
            name: "get_instance_type",
            description: "Infer the type of an expression using the index and the provided context.",
            input_schema: instance_schema,
            handler: get_instance_type,
        },
    ]
}

fn instance_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "expression": { "type": "string" },
            "file_path": { "type": "string" },
            "line": { "type": "integer" },
            "column": { "type": "integer" },
            "context": {
                "type": "object",
                "properties": {
                    "self_type": { "type": "string" },
                    "variables": { "type": "object" },
                },
            },
        },
        "required": ["expression", "file_path", "line", "column"],
    })
}

struct InstanceArgs {
    expression: String,
    line: u64,
    column: u64,
    module: String,
    self_type: Option<String>,
    store: TypeStore,
}

fn parse_args(index: &Index, params: &Value) -> Result<InstanceArgs, ToolError> {
    let expression = require_str(params, "expression")?.to_string();
    let file_path = require_str(params, "file_path")?;
    let line = u64_arg(params, "line")
        .ok_or_else(|| ToolError::invalid("Missing required parameter: line"))?;
    let column = u64_arg(params, "column")
        .ok_or_else(|| ToolError::invalid("Missing required parameter: column"))?;

    let module = index
        .modules
        .fqn_for(Path::new(file_path))
        .cloned()
        .unwrap_or_default();

    let context = params.get("context").cloned().unwrap_or(Value::Null);
    let self_type = context
        .get("self_type")
        .and_then(Value::as_str)
        .map(|s| resolve_written_type(index, s, &module));

    let mut store = TypeStore::new();
    if let Some(vars) = context.get("variables").and_then(Value::as_object) {
        for (name, ty) in vars {
            if let Some(written) = ty.as_str() {
                let fqn = resolve_written_type(index, written, &module);
                store.insert(
                    name.clone(),
                    StoredType {
                        ty: Type::concrete(fqn, 1.0),
                        source: TypeSource::Assignment,
                        line: line as u32,
                        column: column as u32,
                    },
                );
            }
        }
    }

    Ok(InstanceArgs {
        expression,
        line,
        column,
        module,
        self_type,
        store,
    })
}

fn resolve_written_type(index: &Index, written: &str, module: &str) -> String {
    if is_builtin_type(written) {
        return written.to_string();
    }
    resolve_type_name(&index.code_graph, written, module).unwrap_or_else(|| written.to_string())
}

fn env(index: &Index) -> InferEnv<'_> {
    InferEnv {
        functions: &index.call_graph,
        code: &index.code_graph,
        attributes: &index.attributes,
        modules: &index.modules,
    }
}

/// Infer the receiver type of the expression's call, via a real parse.
fn infer_receiver(index: &Index, args: &InstanceArgs) -> Option<(String, f32, TypeSource)> {
    let tree = parse_source(FileKind::Python, args.expression.as_bytes())?;
    let root = tree.root_node();
    let stmt = root.named_child(0)?;
    let expr = if stmt.kind() == "expression_statement" {
        stmt.named_child(0)?
    } else {
        stmt
    };
    let callee = match expr.kind() {
        "call" => expr.child_by_field_name("function")?,
        _ => expr,
    };
    if callee.kind() != "attribute" {
        return None;
    }
    let object = callee.child_by_field_name("object")?;

    let inferencer = Inferencer::new(env(index));
    let ctx = InferCtx {
        store: &args.store,
        source: args.expression.as_bytes(),
        module: &args.module,
        self_type: args.self_type.as_deref(),
    };
    let result = inferencer.infer(object, &ctx);
    let fqn = result.ty.fqn()?.to_string();
    let confidence = result.ty.confidence();
    Some((fqn, confidence, result.source.unwrap_or(TypeSource::Chain)))
}

fn resolve_instance_call(index: &Index, params: &Value) -> ToolOutcome {
    let args = parse_args(index, params)?;
    let detected = QueryResolver::new().detect(&args.expression);

    // Direct FQNs skip inference entirely.
    if detected.pattern == QueryPattern::DirectFqn {
        let fqn = args.expression.trim();
        if index.call_graph.contains(fqn) {
            return Ok(json!({
                "success": true,
                "pattern": detected.pattern.name(),
                "canonical_fqn": fqn,
                "resolved_type": detected.receiver,
                "method": detected.member,
                "confidence": detected.confidence,
            }));
        }
        return Err(ToolError::domain(
            format!("Symbol '{fqn}' not found"),
            suggestions_for(index, fqn).first().cloned(),
        ));
    }

    let Some(method) = detected.member.clone() else {
        return Err(ToolError::domain(
            format!("Could not parse expression '{}'", args.expression),
            Some("Expected forms like self.m(), var.m(), Class.m(), Class().m()".to_string()),
        ));
    };

    // Self calls need the caller to say what `self` is.
    if detected.pattern == QueryPattern::SelfCall && args.self_type.is_none() {
        return Err(ToolError::domain(
            "self type not provided",
            Some("Pass context.self_type for self.* expressions".to_string()),
        ));
    }

    let receiver = infer_receiver(index, &args)
        .or_else(|| {
            // Static calls on a class name have no inferable receiver value.
            let written = detected.receiver.as_deref()?;
            if written.chars().next().map(char::is_uppercase).unwrap_or(false) {
                let fqn = env(index).resolve_class(written, &args.module)?;
                return Some((fqn, detected.confidence, TypeSource::Annotation));
            }
            None
        });

    let Some((class_fqn, type_confidence, type_source)) = receiver else {
        let receiver_name = detected.receiver.unwrap_or_default();
        return Err(ToolError::domain(
            "receiver type unknown",
            Some(format!(
                "Provide context.variables[\"{receiver_name}\"] with the receiver's type"
            )),
        ));
    };

    let canonical = format!("{class_fqn}.{method}");
    if !index.call_graph.contains(&canonical) {
        return Err(ToolError::domain(
            format!("method '{method}' not found on {class_fqn}"),
            suggestions_for(index, &canonical).first().cloned(),
        ));
    }

    let confidence = detected.confidence.min(type_confidence);
    Ok(json!({
        "success": true,
        "pattern": detected.pattern.name(),
        "resolved_type": class_fqn,
        "method": method,
        "canonical_fqn": canonical,
        "confidence": confidence,
        "type_source": type_source.as_str(),
        "location": { "line": args.line, "column": args.column },
    }))
}

fn get_instance_type(index: &Index, params: &Value) -> ToolOutcome {
    let args = parse_args(index, params)?;

    let Some(tree) = parse_source(FileKind::Python, args.expression.as_bytes()) else {
        return Err(ToolError::domain(
            format!("Could not parse expression '{}'", args.expression),
            None,
        ));
    };
    let expr = tree
        .root_node()
        .named_child(0)
        .and_then(|stmt| {
            if stmt.kind() == "expression_statement" {
                stmt.named_child(0)
            } else {
                Some(stmt)
            }
        });
    let Some(expr) = expr else {
        return Err(ToolError::domain(
            format!("Could not parse expression '{}'", args.expression),
            None,
        ));
    };

    let inferencer = Inferencer::new(env(index));
    let ctx = InferCtx {
        store: &args.store,
        source: args.expression.as_bytes(),
        module: &args.module,
        self_type: args.self_type.as_deref(),
    };
    let result = inferencer.infer(expr, &ctx);

    match result.ty.fqn() {
        Some(fqn) => Ok(json!({
            "expression": args.expression,
            "type": fqn,
            "confidence": result.ty.confidence(),
            "type_source": result.source.map(|s| s.as_str()),
        })),
        None => {
            let reason = if result.limit_hit {
                "recursion limit exceeded"
            } else {
                "type could not be inferred"
            };
            Err(ToolError::domain(
                reason,
                Some(format!(
                    "Provide context.variables for the names in '{}'",
                    args.expression
                )),
            ))
        }
    }
}
