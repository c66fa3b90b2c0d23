//! Dockerfile instruction extraction
//!
//! Dockerfiles are line-oriented; instructions are parsed directly with
//! continuation handling rather than through a grammar. Each instruction
//! becomes a node whose metadata carries the semantic fields the Docker
//! tools filter on, including security annotations computed here so serving
//! never re-parses.

use std::path::Path;

use arbor_core::model::{Node, NodeKind, Scope};

use crate::extract::Extraction;

/// Extract every instruction from one Dockerfile.
pub fn extract(file: &Path, source: &[u8]) -> Extraction {
    let text = String::from_utf8_lossy(source);
    let mut ext = Extraction::default();
    let mut stage_index: i64 = -1;

    for (line_no, raw) in logical_lines(&text) {
        let Some((keyword, args)) = split_instruction(&raw) else {
            continue;
        };

        let mut node = Node::new(
            format!("{}:{line_no}:{keyword}", file.display()),
            NodeKind::DockerInstruction,
            keyword.clone(),
            file,
            line_no,
            Scope::Module,
        );
        node.metadata.insert("arguments".into(), args.clone());

        match keyword.as_str() {
            "FROM" => {
                stage_index += 1;
                parse_from(&args, stage_index as u32, &mut node);
            }
            "USER" => parse_user(&args, &mut node),
            "EXPOSE" => parse_expose(&args, &mut node),
            "COPY" | "ADD" => parse_copy(&args, &mut node),
            _ => {}
        }

        ext.nodes.push(node);
    }

    // A file with two or more FROMs is a multi-stage build.
    if stage_index >= 1 {
        for node in &mut ext.nodes {
            if node.name == "FROM" {
                node.metadata.insert("multi_stage".into(), "true".into());
            }
        }
    }

    ext
}

/// Yield `(1-indexed line, instruction text)` pairs with backslash
/// continuations folded in and comments skipped.
fn logical_lines(text: &str) -> Vec<(u32, String)> {
    let mut out = Vec::new();
    let mut pending: Option<(u32, String)> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx as u32 + 1;
        let trimmed = line.trim();
        let continues = trimmed.ends_with('\\');
        let content = trimmed.strip_suffix('\\').unwrap_or(trimmed).trim();

        if let Some((_, buf)) = pending.as_mut() {
            buf.push(' ');
            buf.push_str(content);
            if !continues {
                if let Some(done) = pending.take() {
                    out.push(done);
                }
            }
            continue;
        }
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        if continues {
            pending = Some((line_no, content.to_string()));
        } else {
            out.push((line_no, content.to_string()));
        }
    }
    if let Some((start, buf)) = pending {
        out.push((start, buf));
    }
    out
}

/// Split `KEYWORD rest` — keyword normalized to uppercase.
fn split_instruction(line: &str) -> Option<(String, String)> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let keyword = parts.next()?.trim();
    if keyword.is_empty() || !keyword.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let args = parts.next().unwrap_or("").trim().to_string();
    Some((keyword.to_ascii_uppercase(), args))
}

/// `FROM image[:tag][@digest] [AS stage]`
fn parse_from(args: &str, stage_index: u32, node: &mut Node) {
    let mut tokens = args.split_whitespace();
    let Some(reference) = tokens.next() else {
        return;
    };

    let mut stage_name = None;
    let rest: Vec<&str> = tokens.collect();
    if rest.len() == 2 && rest[0].eq_ignore_ascii_case("as") {
        stage_name = Some(rest[1].to_string());
    }

    let (image_and_tag, digest) = match reference.split_once('@') {
        Some((left, digest)) => (left, Some(digest.to_string())),
        None => (reference, None),
    };
    let (image, tag) = match image_and_tag.rsplit_once(':') {
        // A colon after a slash is a registry port, not a tag.
        Some((image, tag)) if !tag.contains('/') => (image.to_string(), tag.to_string()),
        _ => (image_and_tag.to_string(), "latest".to_string()),
    };

    node.metadata.insert("image".into(), image);
    node.metadata.insert("tag".into(), tag);
    node.metadata
        .insert("stage_index".into(), stage_index.to_string());
    node.metadata
        .insert("has_digest".into(), digest.is_some().to_string());
    if let Some(digest) = digest {
        node.metadata.insert("digest".into(), digest);
    } else {
        node.metadata.insert(
            "security_issue".into(),
            "No digest pinning (CWE-1188)".into(),
        );
        node.metadata.insert("risk_level".into(), "MEDIUM".into());
    }
    if let Some(stage) = stage_name {
        node.metadata.insert("stage_name".into(), stage);
    }
}

/// `USER user[:group]`
fn parse_user(args: &str, node: &mut Node) {
    let spec = args.split_whitespace().next().unwrap_or("");
    let (user, group) = match spec.split_once(':') {
        Some((u, g)) => (u.to_string(), Some(g.to_string())),
        None => (spec.to_string(), None),
    };
    if user == "root" {
        node.metadata
            .insert("security_issue".into(), "Container runs as root".into());
        node.metadata.insert("risk_level".into(), "HIGH".into());
    }
    node.metadata.insert("user".into(), user);
    if let Some(group) = group {
        node.metadata.insert("group".into(), group);
    }
}

/// `EXPOSE port[/proto] ...` — protocol defaults to tcp.
fn parse_expose(args: &str, node: &mut Node) {
    let mut ports = Vec::new();
    for spec in args.split_whitespace() {
        let (port, proto) = match spec.split_once('/') {
            Some((p, proto)) => (p, proto),
            None => (spec, "tcp"),
        };
        ports.push(format!("{port}/{proto}"));
    }
    if let Some(first) = ports.first() {
        if let Some((port, proto)) = first.split_once('/') {
            node.metadata.insert("port".into(), port.to_string());
            node.metadata.insert("protocol".into(), proto.to_string());
        }
    }
    node.metadata.insert("ports".into(), ports.join(","));
}

/// `COPY [--from=S] [--chown=U:G] SRC... DST`
fn parse_copy(args: &str, node: &mut Node) {
    let mut sources = Vec::new();
    let mut dst = None;
    for token in args.split_whitespace() {
        if let Some(stage) = token.strip_prefix("--from=") {
            node.metadata.insert("copy_from".into(), stage.to_string());
        } else if let Some(owner) = token.strip_prefix("--chown=") {
            node.metadata.insert("chown".into(), owner.to_string());
        } else if token.starts_with("--") {
            // --chmod, --link: recorded only in raw arguments.
        } else {
            if let Some(prev) = dst.take() {
                sources.push(prev);
            }
            dst = Some(token.to_string());
        }
    }
    if !sources.is_empty() {
        node.metadata.insert("src".into(), sources.join(","));
    }
    if let Some(dst) = dst {
        node.metadata.insert("dst".into(), dst);
    }
}
