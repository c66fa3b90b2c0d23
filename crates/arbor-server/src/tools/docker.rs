//! Dockerfile and Compose tools
//!
//! All semantic fields were computed at extraction time and live in node
//! metadata; these handlers only filter and traverse.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde_json::{Value, json};

use arbor_core::index::Index;
use arbor_core::model::{Node, NodeKind};

use super::{
    Tool, ToolError, ToolOutcome, bool_arg, pagination, paginated_body, require_str, str_arg,
    u64_arg,
};

pub(super) fn catalog() -> Vec<Tool> {
    vec![
        Tool {
            name: "find_dockerfile_instructions",
            description: "Find Dockerfile instructions by type, image, user, port, or digest pinning.",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "instruction_type": { "type": "string" },
                        "base_image": { "type": "string" },
                        "user": { "type": "string" },
                        "port": { "type": "string" },
                        "has_digest": { "type": "boolean" },
                        "file_path": { "type": "string" },
                        "limit": { "type": "integer" },
                        "cursor": { "type": "string" },
                    },
                })
            },
            handler: find_dockerfile_instructions,
        },
        Tool {
            name: "find_compose_services",
            description: "Find Compose services by name, port, privilege, volumes, or network mode.",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "service_name": { "type": "string" },
                        "exposes_port": { "type": "string" },
                        "has_privileged": { "type": "boolean" },
                        "has_volume": { "type": "boolean" },
                        "network_mode": { "type": "string" },
                        "limit": { "type": "integer" },
                        "cursor": { "type": "string" },
                    },
                })
            },
            handler: find_compose_services,
        },
        Tool {
            name: "get_dockerfile_details",
            description: "All instructions of one Dockerfile, with stage structure.",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": { "file_path": { "type": "string" } },
                    "required": ["file_path"],
                })
            },
            handler: get_dockerfile_details,
        },
        Tool {
            name: "get_docker_dependencies",
            description: "Transitive dependencies of a Compose service or Dockerfile stage.",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "type": { "type": "string", "enum": ["compose", "dockerfile"] },
                        "name": { "type": "string" },
                        "direction": { "type": "string", "enum": ["upstream", "downstream", "both"] },
                        "max_depth": { "type": "integer" },
                        "file_path": { "type": "string" },
                    },
                    "required": ["type", "name"],
                })
            },
            handler: get_docker_dependencies,
        },
    ]
}

fn meta<'a>(node: &'a Node, key: &str) -> Option<&'a str> {
    node.metadata.get(key).map(String::as_str)
}

fn file_matches(node: &Node, wanted: &str) -> bool {
    node.file == Path::new(wanted) || node.file.ends_with(wanted)
}

/// Nodes of one kind in (file, line) order.
fn sorted_nodes(index: &Index, kind: NodeKind) -> Vec<&Node> {
    let mut nodes = index.code_graph.nodes_of_kind(kind);
    nodes.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
    nodes
}

fn instruction_row(node: &Node) -> Value {
    let mut row = serde_json::Map::new();
    row.insert("instruction".into(), node.name.clone().into());
    row.insert("file".into(), node.file.to_string_lossy().into_owned().into());
    row.insert("line".into(), node.line.into());
    let mut keys: Vec<&String> = node.metadata.keys().collect();
    keys.sort();
    for key in keys {
        row.insert(key.clone(), node.metadata[key].clone().into());
    }
    Value::Object(row)
}

fn service_row(node: &Node) -> Value {
    let mut row = serde_json::Map::new();
    row.insert("service".into(), node.name.clone().into());
    row.insert("file".into(), node.file.to_string_lossy().into_owned().into());
    row.insert("line".into(), node.line.into());
    let mut keys: Vec<&String> = node.metadata.keys().collect();
    keys.sort();
    for key in keys {
        if *key != "service" {
            row.insert(key.clone(), node.metadata[key].clone().into());
        }
    }
    Value::Object(row)
}

/// `port` may arrive as a string or a number.
fn port_arg(params: &Value, key: &str) -> Option<String> {
    str_arg(params, key)
        .map(str::to_string)
        .or_else(|| u64_arg(params, key).map(|n| n.to_string()))
}

fn find_dockerfile_instructions(index: &Index, params: &Value) -> ToolOutcome {
    let instruction_type = str_arg(params, "instruction_type").map(str::to_uppercase);
    let base_image = str_arg(params, "base_image");
    let user = str_arg(params, "user");
    let port = port_arg(params, "port");
    let has_digest = bool_arg(params, "has_digest");
    let file_path = str_arg(params, "file_path");

    let rows: Vec<Value> = sorted_nodes(index, NodeKind::DockerInstruction)
        .into_iter()
        .filter(|n| {
            instruction_type
                .as_deref()
                .map(|t| n.name == t)
                .unwrap_or(true)
        })
        .filter(|n| base_image.map(|img| meta(n, "image") == Some(img)).unwrap_or(true))
        .filter(|n| user.map(|u| meta(n, "user") == Some(u)).unwrap_or(true))
        .filter(|n| {
            port.as_deref()
                .map(|p| {
                    meta(n, "ports")
                        .map(|ports| {
                            ports
                                .split(',')
                                .any(|spec| spec.split('/').next() == Some(p))
                        })
                        .unwrap_or(false)
                })
                .unwrap_or(true)
        })
        .filter(|n| {
            has_digest
                .map(|want| meta(n, "has_digest") == Some(if want { "true" } else { "false" }))
                .unwrap_or(true)
        })
        .filter(|n| file_path.map(|f| file_matches(n, f)).unwrap_or(true))
        .map(instruction_row)
        .collect();

    let (offset, limit) = pagination(params);
    Ok(paginated_body("matches", &rows, offset, limit, ""))
}

fn find_compose_services(index: &Index, params: &Value) -> ToolOutcome {
    let service_name = str_arg(params, "service_name");
    let exposes_port = port_arg(params, "exposes_port");
    let has_privileged = bool_arg(params, "has_privileged");
    let has_volume = bool_arg(params, "has_volume");
    let network_mode = str_arg(params, "network_mode");

    let rows: Vec<Value> = sorted_nodes(index, NodeKind::ComposeService)
        .into_iter()
        .filter(|n| service_name.map(|s| n.name == s).unwrap_or(true))
        .filter(|n| {
            exposes_port
                .as_deref()
                .map(|p| {
                    meta(n, "ports")
                        .map(|ports| {
                            ports
                                .split(',')
                                .any(|spec| spec.split(':').any(|part| part == p))
                        })
                        .unwrap_or(false)
                })
                .unwrap_or(true)
        })
        .filter(|n| {
            has_privileged
                .map(|want| (meta(n, "privileged") == Some("true")) == want)
                .unwrap_or(true)
        })
        .filter(|n| {
            has_volume
                .map(|want| meta(n, "volumes").is_some() == want)
                .unwrap_or(true)
        })
        .filter(|n| {
            network_mode
                .map(|m| meta(n, "network_mode") == Some(m))
                .unwrap_or(true)
        })
        .map(service_row)
        .collect();

    let (offset, limit) = pagination(params);
    Ok(paginated_body("matches", &rows, offset, limit, ""))
}

fn get_dockerfile_details(index: &Index, params: &Value) -> ToolOutcome {
    let file_path = require_str(params, "file_path")?;
    let instructions: Vec<&Node> = sorted_nodes(index, NodeKind::DockerInstruction)
        .into_iter()
        .filter(|n| file_matches(n, file_path))
        .collect();
    if instructions.is_empty() {
        return Err(ToolError::domain(
            format!("Dockerfile not found: {file_path}"),
            Some("Use find_dockerfile_instructions to list indexed files".to_string()),
        ));
    }

    let stages: Vec<Value> = instructions
        .iter()
        .filter(|n| n.name == "FROM")
        .map(|n| {
            json!({
                "index": meta(n, "stage_index").and_then(|s| s.parse::<u32>().ok()).unwrap_or(0),
                "name": meta(n, "stage_name"),
                "image": meta(n, "image"),
                "tag": meta(n, "tag"),
            })
        })
        .collect();

    Ok(json!({
        "file_path": file_path,
        "multi_stage": stages.len() >= 2,
        "stage_count": stages.len(),
        "stages": stages,
        "instructions": instructions.iter().map(|n| instruction_row(n)).collect::<Vec<_>>(),
    }))
}

/// Bounded BFS over a string adjacency map.
fn bfs(adjacency: &HashMap<String, Vec<String>>, start: &str, max_depth: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut frontier = vec![start.to_string()];
    for _ in 0..max_depth {
        let mut next = Vec::new();
        for node in &frontier {
            for dep in adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]) {
                if seen.insert(dep.clone()) {
                    next.push(dep.clone());
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    seen.remove(start);
    let mut out: Vec<String> = seen.into_iter().collect();
    out.sort();
    out
}

fn invert(adjacency: &HashMap<String, Vec<String>>) -> HashMap<String, Vec<String>> {
    let mut reversed: HashMap<String, Vec<String>> = HashMap::new();
    for (from, tos) in adjacency {
        for to in tos {
            reversed.entry(to.clone()).or_default().push(from.clone());
        }
    }
    reversed
}

fn get_docker_dependencies(index: &Index, params: &Value) -> ToolOutcome {
    let kind = require_str(params, "type")?;
    let name = require_str(params, "name")?;
    let direction = str_arg(params, "direction").unwrap_or("both");
    if !matches!(direction, "upstream" | "downstream" | "both") {
        return Err(ToolError::invalid(
            "direction must be one of: upstream, downstream, both",
        ));
    }
    let max_depth = u64_arg(params, "max_depth").unwrap_or(10) as usize;
    let file_path = str_arg(params, "file_path");

    let (adjacency, known): (HashMap<String, Vec<String>>, HashSet<String>) = match kind {
        "compose" => {
            let services: Vec<&Node> = sorted_nodes(index, NodeKind::ComposeService)
                .into_iter()
                .filter(|n| file_path.map(|f| file_matches(n, f)).unwrap_or(true))
                .collect();
            let mut adjacency = HashMap::new();
            let mut known = HashSet::new();
            for service in services {
                known.insert(service.name.clone());
                let deps: Vec<String> = meta(service, "depends_on")
                    .map(|d| d.split(',').map(str::to_string).collect())
                    .unwrap_or_default();
                adjacency.insert(service.name.clone(), deps);
            }
            (adjacency, known)
        }
        "dockerfile" => {
            let instructions: Vec<&Node> = sorted_nodes(index, NodeKind::DockerInstruction)
                .into_iter()
                .filter(|n| file_path.map(|f| file_matches(n, f)).unwrap_or(true))
                .collect();
            // Stage → stages it copies from, within one file.
            let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
            let mut known = HashSet::new();
            let mut current_stage: Option<String> = None;
            for node in instructions {
                if node.name == "FROM" {
                    let stage = meta(node, "stage_name")
                        .map(str::to_string)
                        .or_else(|| meta(node, "stage_index").map(str::to_string))
                        .unwrap_or_default();
                    known.insert(stage.clone());
                    adjacency.entry(stage.clone()).or_default();
                    current_stage = Some(stage);
                } else if node.name == "COPY" {
                    if let (Some(stage), Some(from)) = (&current_stage, meta(node, "copy_from")) {
                        adjacency
                            .entry(stage.clone())
                            .or_default()
                            .push(from.to_string());
                    }
                }
            }
            (adjacency, known)
        }
        _ => {
            return Err(ToolError::invalid(
                "type must be one of: compose, dockerfile",
            ));
        }
    };

    if !known.contains(name) {
        return Err(ToolError::domain(
            format!("{kind} target '{name}' not found"),
            Some("Check find_compose_services / get_dockerfile_details".to_string()),
        ));
    }

    let mut body = json!({
        "type": kind,
        "name": name,
        "direction": direction,
        "max_depth": max_depth,
    });
    if direction == "upstream" || direction == "both" {
        body["upstream"] = json!(bfs(&adjacency, name, max_depth));
    }
    if direction == "downstream" || direction == "both" {
        body["downstream"] = json!(bfs(&invert(&adjacency), name, max_depth));
    }
    Ok(body)
}
