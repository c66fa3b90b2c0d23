//! Docker Compose service extraction
//!
//! Compose files are deserialized with serde_yaml; each service becomes a
//! node whose metadata carries the fields the Compose tools filter on,
//! including the security findings, so serving never re-parses YAML.

use std::path::Path;

use serde_yaml::Value;

use arbor_core::model::{Node, NodeKind, Scope};

use crate::extract::Extraction;

const DANGEROUS_CAPS: &[&str] = &["SYS_ADMIN", "NET_ADMIN"];

/// Extract every service from one Compose file. A file that fails to parse
/// contributes nothing; the caller logs and moves on.
pub fn extract(file: &Path, source: &[u8]) -> Extraction {
    let mut ext = Extraction::default();
    let doc: Value = match serde_yaml::from_slice(source) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!("skipping unparseable compose file {}: {e}", file.display());
            return ext;
        }
    };
    let Some(services) = doc.get("services").and_then(Value::as_mapping) else {
        return ext;
    };

    let text = String::from_utf8_lossy(source);
    for (key, service) in services {
        let Some(name) = key.as_str() else { continue };
        let mut node = Node::new(
            format!("{}:{name}", file.display()),
            NodeKind::ComposeService,
            name,
            file,
            service_line(&text, name),
            Scope::Module,
        );
        fill_service_metadata(name, service, &mut node);
        ext.nodes.push(node);
    }
    ext
}

/// Best-effort 1-indexed line of `  name:` under the services block.
fn service_line(text: &str, name: &str) -> u32 {
    let needle = format!("{name}:");
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        if indent > 0 && trimmed.starts_with(&needle) {
            return idx as u32 + 1;
        }
    }
    1
}

fn fill_service_metadata(name: &str, service: &Value, node: &mut Node) {
    node.metadata.insert("service".into(), name.to_string());

    if let Some(image) = service.get("image").and_then(Value::as_str) {
        node.metadata.insert("image".into(), image.to_string());
    }
    if let Some(build) = service.get("build") {
        let context = build
            .as_str()
            .map(str::to_string)
            .or_else(|| {
                build
                    .get("context")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
        if let Some(context) = context {
            node.metadata.insert("build".into(), context);
        }
    }

    let ports = string_list(service.get("ports"));
    if !ports.is_empty() {
        node.metadata.insert("ports".into(), ports.join(","));
    }
    let depends_on = depends_on_list(service.get("depends_on"));
    if !depends_on.is_empty() {
        node.metadata.insert("depends_on".into(), depends_on.join(","));
    }
    let volumes = volume_list(service.get("volumes"));
    if !volumes.is_empty() {
        node.metadata.insert("volumes".into(), volumes.join(","));
    }
    let cap_add = string_list(service.get("cap_add"));
    if !cap_add.is_empty() {
        node.metadata.insert("cap_add".into(), cap_add.join(","));
    }

    let privileged = service
        .get("privileged")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    node.metadata
        .insert("privileged".into(), privileged.to_string());

    let network_mode = service
        .get("network_mode")
        .and_then(Value::as_str)
        .unwrap_or("");
    if !network_mode.is_empty() {
        node.metadata
            .insert("network_mode".into(), network_mode.to_string());
    }

    // Security findings, highest severity wins the risk_level.
    let mut issues: Vec<(&str, String)> = Vec::new();
    if privileged {
        issues.push(("CRITICAL", "Privileged container".into()));
    }
    if volumes.iter().any(|v| v.contains("/var/run/docker.sock")) {
        issues.push(("CRITICAL", "Docker socket mounted".into()));
    }
    if network_mode == "host" {
        issues.push(("HIGH", "Host network mode".into()));
    }
    for cap in &cap_add {
        if DANGEROUS_CAPS.contains(&cap.as_str()) {
            issues.push(("HIGH", format!("Dangerous capability: {cap}")));
        }
    }
    if !issues.is_empty() {
        let risk = if issues.iter().any(|(sev, _)| *sev == "CRITICAL") {
            "CRITICAL"
        } else {
            "HIGH"
        };
        let joined: Vec<&str> = issues.iter().map(|(_, msg)| msg.as_str()).collect();
        node.metadata
            .insert("security_issues".into(), joined.join("; "));
        node.metadata.insert("risk_level".into(), risk.into());
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// `depends_on` accepts both the list form and the condition-map form.
fn depends_on_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(_)) | Some(Value::String(_)) => string_list(value),
        Some(Value::Mapping(map)) => map
            .keys()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Volumes appear as strings (`host:container`) or long-form maps.
fn volume_list(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Sequence(seq)) = value else {
        return Vec::new();
    };
    seq.iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Mapping(_) => {
                let source = v.get("source").and_then(Value::as_str).unwrap_or("");
                let target = v.get("target").and_then(Value::as_str).unwrap_or("");
                if source.is_empty() && target.is_empty() {
                    None
                } else {
                    Some(format!("{source}:{target}"))
                }
            }
            _ => None,
        })
        .collect()
}
