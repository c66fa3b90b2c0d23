//! The indexing pipeline
//!
//! One-shot batch: walk the tree, parse, build the module registry, extract
//! symbols and attributes, then resolve call sites. Progress is reported
//! through the status tracker; per-file parse failures are logged and
//! skipped, never fatal.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use tree_sitter::Tree;

use arbor_core::attributes::AttributeRegistry;
use arbor_core::graph::{CallGraph, CodeGraph};
use arbor_core::index::Index;
use arbor_core::model::{ClassAttribute, Type};
use arbor_core::modules::{ModuleRegistry, module_fqn_for_path};
use arbor_core::status::{Phase, StatusTracker};

use crate::callgraph::build_call_sites;
use crate::error::IndexError;
use crate::extract::RawAttribute;
use crate::infer::{InferEnv, is_builtin_type, resolve_type_name};
use crate::languages::{FileKind, compose, docker, java, python};
use crate::parser::parse_source;

/// Indexer settings. The root is the only required piece; everything else
/// follows gitignore semantics via the walker.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub root: PathBuf,
}

impl IndexerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        IndexerConfig { root: root.into() }
    }
}

/// A source file after the parse pass.
pub struct ParsedFile {
    pub path: PathBuf,
    pub kind: FileKind,
    pub module: String,
    pub source: Vec<u8>,
    pub tree: Option<Tree>,
}

/// Build the full index for a project root.
pub fn build_index(config: &IndexerConfig, status: &StatusTracker) -> Result<Index, IndexError> {
    let started = Instant::now();
    status.start_indexing();
    match build_inner(config, status, started) {
        Ok(index) => {
            status.complete_indexing();
            Ok(index)
        }
        Err(e) => {
            status.fail_indexing(e.to_string());
            Err(e)
        }
    }
}

fn build_inner(
    config: &IndexerConfig,
    status: &StatusTracker,
    started: Instant,
) -> Result<Index, IndexError> {
    let root = &config.root;
    if !root.is_dir() {
        return Err(IndexError::MissingRoot(root.clone()));
    }

    // ── Pass 1a: walk and parse ─────────────────────────────
    status.set_phase(Phase::Parsing);
    let mut candidates: Vec<(PathBuf, FileKind)> = Vec::new();
    for entry in ignore::WalkBuilder::new(root).build() {
        let entry = entry?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if let Some(kind) = FileKind::from_path(entry.path()) {
            candidates.push((entry.into_path(), kind));
        }
    }
    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    tracing::info!("discovered {} indexable files", candidates.len());

    let mut files: Vec<ParsedFile> = Vec::with_capacity(candidates.len());
    let total = candidates.len().max(1);
    for (i, (path, kind)) in candidates.into_iter().enumerate() {
        let source = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!("skipping unreadable {}: {e}", path.display());
                continue;
            }
        };
        let tree = if kind.is_source() {
            let parsed = parse_source(kind, &source);
            if parsed.is_none() {
                tracing::debug!("parse failed for {}, skipping symbols", path.display());
            }
            parsed
        } else {
            None
        };
        let module = module_fqn_for_path(root, &path).unwrap_or_default();
        files.push(ParsedFile {
            path,
            kind,
            module,
            source,
            tree,
        });
        status.update_progress((i + 1) as f32 / total as f32);
    }

    // ── Pass 1b: module registry ────────────────────────────
    status.set_phase(Phase::ModuleRegistry);
    let mut modules = ModuleRegistry::new();
    for file in files.iter().filter(|f| f.kind.is_source()) {
        if !file.module.is_empty() {
            modules.insert(&file.module, &file.path);
        }
    }
    status.update_progress(1.0);
    tracing::info!("registered {} modules", modules.len());

    // ── Pass 2: symbols and attributes ──────────────────────
    status.set_phase(Phase::CallGraph);
    let mut call_graph = CallGraph::new();
    let mut code_graph = CodeGraph::new();
    let mut raw_attributes: Vec<(String, RawAttribute)> = Vec::new();
    let mut methods: Vec<(String, PathBuf, String)> = Vec::new();

    let total = files.len().max(1);
    for (i, file) in files.iter().enumerate() {
        let extraction = match (file.kind, &file.tree) {
            (FileKind::Python, Some(tree)) => {
                python::extract(&file.module, &file.path, &file.source, tree)
            }
            (FileKind::Java, Some(tree)) => {
                java::extract(&file.module, &file.path, &file.source, tree)
            }
            (FileKind::Dockerfile, _) => docker::extract(&file.path, &file.source),
            (FileKind::Compose, _) => compose::extract(&file.path, &file.source),
            _ => continue,
        };
        for node in extraction.nodes {
            if node.kind.is_callable() {
                call_graph.add_function(node);
            } else {
                code_graph.add_node(node);
            }
        }
        for raw in extraction.raw_attributes {
            raw_attributes.push((file.module.clone(), raw));
        }
        for (class_fqn, method_fqn) in extraction.methods {
            methods.push((class_fqn, file.path.clone(), method_fqn));
        }
        status.update_progress(0.4 * (i + 1) as f32 / total as f32);
    }

    let mut attributes = AttributeRegistry::new();
    for (class_fqn, file, method_fqn) in &methods {
        attributes.register_method(class_fqn, file, method_fqn);
    }
    for (module, raw) in raw_attributes {
        let ty = raw.raw_type.as_deref().map(|written| {
            let fqn = if is_builtin_type(written) {
                written.to_string()
            } else {
                resolve_type_name(&code_graph, written, &module)
                    .unwrap_or_else(|| written.to_string())
            };
            Type::concrete(fqn, raw.confidence)
        });
        let mut attribute = ClassAttribute::new(&raw.name, ty);
        attribute.assigned_in = raw.assigned_in.clone();
        attribute.location = Some(raw.location.clone());
        let file = raw.location.file.clone();
        attributes.register_attribute(&raw.class_fqn, &file, attribute);
    }

    // ── Pass 3: call sites ──────────────────────────────────
    let sites = build_call_sites(
        &files,
        InferEnv {
            functions: &call_graph,
            code: &code_graph,
            attributes: &attributes,
            modules: &modules,
        },
        |p| status.update_progress(0.4 + 0.6 * p),
    );
    let site_count = sites.len();
    for site in sites {
        call_graph.add_call_site(site);
    }

    tracing::info!(
        "indexed {} functions, {} symbols, {} call sites in {:?}",
        call_graph.function_count(),
        code_graph.len(),
        site_count,
        started.elapsed(),
    );

    Ok(Index {
        call_graph,
        modules,
        attributes,
        code_graph,
        indexed_at: Utc::now(),
        build_duration: started.elapsed(),
    })
}
