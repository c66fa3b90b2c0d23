//! Module registry tools

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde_json::{Value, json};

use arbor_core::index::Index;

use super::{ToolError, ToolOutcome, pagination, paginated_body, require_str};

pub(super) fn get_index_info(index: &Index, _params: &Value) -> ToolOutcome {
    Ok(serde_json::to_value(index.info()).unwrap_or_default())
}

/// Closest module FQN by fuzzy match, for not-found suggestions.
fn closest_module(index: &Index, query: &str) -> Option<String> {
    let matcher = SkimMatcherV2::default();
    index
        .modules
        .module_fqns()
        .into_iter()
        .filter_map(|fqn| matcher.fuzzy_match(fqn, query).map(|score| (score, fqn)))
        .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(a.1)))
        .map(|(_, fqn)| fqn.clone())
}

pub(super) fn resolve_import(index: &Index, params: &Value) -> ToolOutcome {
    let import = require_str(params, "import")?;
    match index.modules.resolve_import(import) {
        Some(resolution) => Ok(serde_json::to_value(&resolution).unwrap_or_default()),
        None => Err(ToolError::domain(
            format!("Import not found: {import}"),
            closest_module(index, import).map(|m| format!("Did you mean '{m}'?")),
        )),
    }
}

pub(super) fn find_module(index: &Index, params: &Value) -> ToolOutcome {
    let query = require_str(params, "module")?;
    let registry = &index.modules;

    let mut matches: Vec<(String, String)> = Vec::new();
    if let Some(file) = registry.file_for(query) {
        matches.push((query.to_string(), file.to_string_lossy().into_owned()));
    } else {
        let short_hits = registry.short_name_matches(query);
        if !short_hits.is_empty() {
            for file in short_hits {
                if let Some(fqn) = registry.fqn_for(file) {
                    matches.push((fqn.clone(), file.to_string_lossy().into_owned()));
                }
            }
        } else {
            for fqn in registry.module_fqns() {
                if fqn.contains(query) {
                    if let Some(file) = registry.file_for(fqn) {
                        matches.push((fqn.clone(), file.to_string_lossy().into_owned()));
                    }
                }
            }
        }
    }

    if matches.is_empty() {
        return Err(ToolError::domain(
            format!("Module '{query}' not found"),
            closest_module(index, query).map(|m| format!("Did you mean '{m}'?")),
        ));
    }
    let rows: Vec<Value> = matches
        .into_iter()
        .map(|(fqn, file)| json!({ "fqn": fqn, "file": file }))
        .collect();
    Ok(json!({ "matches": rows }))
}

pub(super) fn list_modules(index: &Index, params: &Value) -> ToolOutcome {
    let rows: Vec<Value> = index
        .modules
        .module_fqns()
        .into_iter()
        .map(|fqn| {
            json!({
                "fqn": fqn,
                "file": index
                    .modules
                    .file_for(fqn)
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            })
        })
        .collect();
    let (offset, limit) = pagination(params);
    Ok(paginated_body("modules", &rows, offset, limit, ""))
}
