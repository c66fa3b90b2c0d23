//! Module registry: three-way index of module FQN, file path, and short name

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How an import string matched the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    ShortName,
    Ambiguous,
    Partial,
}

/// Outcome of `resolve_import`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResolution {
    pub import: String,
    pub resolved: bool,
    pub match_type: MatchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fqn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub alternatives: Vec<String>,
}

/// Maps fully-qualified module names to files and back, plus a short-name
/// index used for ambiguity detection.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ModuleRegistry {
    by_fqn: HashMap<String, PathBuf>,
    by_file: HashMap<PathBuf, String>,
    short_names: HashMap<String, Vec<PathBuf>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Short-name lists stay deduplicated and keep
    /// insertion order.
    pub fn insert(&mut self, fqn: impl Into<String>, file: impl Into<PathBuf>) {
        let fqn = fqn.into();
        let file = file.into();
        let short = fqn.rsplit('.').next().unwrap_or(&fqn).to_string();
        let files = self.short_names.entry(short).or_default();
        if !files.iter().any(|f| f == &file) {
            files.push(file.clone());
        }
        self.by_file.insert(file.clone(), fqn.clone());
        self.by_fqn.insert(fqn, file);
    }

    pub fn file_for(&self, fqn: &str) -> Option<&PathBuf> {
        self.by_fqn.get(fqn)
    }

    pub fn fqn_for(&self, file: &Path) -> Option<&String> {
        self.by_file.get(file)
    }

    pub fn short_name_matches(&self, short: &str) -> &[PathBuf] {
        self.short_names
            .get(short)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_fqn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fqn.is_empty()
    }

    /// All module FQNs, sorted.
    pub fn module_fqns(&self) -> Vec<&String> {
        let mut fqns: Vec<&String> = self.by_fqn.keys().collect();
        fqns.sort();
        fqns
    }

    /// Resolve an import path against the registry.
    ///
    /// Precedence: exact FQN, then unique short-name match, then ambiguous
    /// short name (unresolved, with alternatives), then substring match
    /// against FQNs (unresolved, with alternatives). `None` means nothing
    /// matched at all; the caller owns the not-found error shape.
    pub fn resolve_import(&self, import: &str) -> Option<ImportResolution> {
        if let Some(file) = self.by_fqn.get(import) {
            return Some(ImportResolution {
                import: import.to_string(),
                resolved: true,
                match_type: MatchType::Exact,
                fqn: Some(import.to_string()),
                file: Some(file.clone()),
                alternatives: Vec::new(),
            });
        }

        let leaf = import.rsplit('.').next().unwrap_or(import);
        let short_hits = self.short_name_matches(leaf);
        match short_hits.len() {
            0 => {}
            1 => {
                let file = &short_hits[0];
                return Some(ImportResolution {
                    import: import.to_string(),
                    resolved: true,
                    match_type: MatchType::ShortName,
                    fqn: self.by_file.get(file).cloned(),
                    file: Some(file.clone()),
                    alternatives: Vec::new(),
                });
            }
            _ => {
                let alternatives = short_hits
                    .iter()
                    .filter_map(|f| self.by_file.get(f).cloned())
                    .collect();
                return Some(ImportResolution {
                    import: import.to_string(),
                    resolved: false,
                    match_type: MatchType::Ambiguous,
                    fqn: None,
                    file: None,
                    alternatives,
                });
            }
        }

        let mut partial: Vec<String> = self
            .by_fqn
            .keys()
            .filter(|fqn| fqn.contains(import))
            .cloned()
            .collect();
        partial.sort();
        if !partial.is_empty() {
            return Some(ImportResolution {
                import: import.to_string(),
                resolved: false,
                match_type: MatchType::Partial,
                fqn: None,
                file: None,
                alternatives: partial,
            });
        }

        None
    }
}

/// Compute a file's module FQN relative to the project root.
///
/// Strips the root prefix and the source extension, converts separators to
/// dots, and drops an `__init__` leaf so a package maps to its directory.
pub fn module_fqn_for_path(root: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(root).ok()?;
    let rel = rel.with_extension("");
    let mut segments: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if segments.last().map(String::as_str) == Some("__init__") {
        segments.pop();
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModuleRegistry {
        let mut reg = ModuleRegistry::new();
        reg.insert("myapp.auth", "/p/myapp/auth.py");
        reg.insert("myapp.views", "/p/myapp/views.py");
        reg.insert("lib.auth", "/p/lib/auth.py");
        reg.insert("core.settings", "/p/core/settings.py");
        reg
    }

    #[test]
    fn exact_match_wins() {
        let reg = registry();
        let res = reg.resolve_import("myapp.auth").unwrap();
        assert!(res.resolved);
        assert_eq!(res.match_type, MatchType::Exact);
        assert_eq!(res.fqn.as_deref(), Some("myapp.auth"));
    }

    #[test]
    fn unique_short_name_resolves() {
        let reg = registry();
        let res = reg.resolve_import("settings").unwrap();
        assert!(res.resolved);
        assert_eq!(res.match_type, MatchType::ShortName);
        assert_eq!(res.fqn.as_deref(), Some("core.settings"));
    }

    #[test]
    fn ambiguous_short_name_reports_alternatives() {
        let reg = registry();
        let res = reg.resolve_import("auth").unwrap();
        assert!(!res.resolved);
        assert_eq!(res.match_type, MatchType::Ambiguous);
        assert_eq!(res.alternatives.len(), 2);
    }

    #[test]
    fn substring_falls_back_to_partial() {
        let reg = registry();
        let res = reg.resolve_import("myapp.vi").unwrap();
        assert!(!res.resolved);
        assert_eq!(res.match_type, MatchType::Partial);
        assert_eq!(res.alternatives, vec!["myapp.views".to_string()]);
    }

    #[test]
    fn miss_returns_none() {
        let reg = registry();
        assert!(reg.resolve_import("zzz").is_none());
    }

    #[test]
    fn short_name_lists_dedupe() {
        let mut reg = ModuleRegistry::new();
        reg.insert("a.util", "/p/a/util.py");
        reg.insert("a.util", "/p/a/util.py");
        assert_eq!(reg.short_name_matches("util").len(), 1);
    }

    #[test]
    fn init_leaf_is_dropped() {
        let root = Path::new("/p");
        let fqn = module_fqn_for_path(root, Path::new("/p/myapp/__init__.py"));
        assert_eq!(fqn.as_deref(), Some("myapp"));
        let fqn = module_fqn_for_path(root, Path::new("/p/myapp/auth.py"));
        assert_eq!(fqn.as_deref(), Some("myapp.auth"));
    }
}
