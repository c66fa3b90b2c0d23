//! Per-language extractors

pub mod compose;
pub mod docker;
pub mod java;
pub mod python;

use std::path::Path;

/// File types the indexer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Python,
    Java,
    Dockerfile,
    Compose,
}

impl FileKind {
    /// Classify a path, or `None` for files the indexer ignores.
    pub fn from_path(path: &Path) -> Option<FileKind> {
        let file_name = path.file_name()?.to_string_lossy();
        if file_name == "Dockerfile" || file_name.starts_with("Dockerfile.") {
            return Some(FileKind::Dockerfile);
        }
        if is_compose_file(&file_name) {
            return Some(FileKind::Compose);
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") | Some("pyi") => Some(FileKind::Python),
            Some("java") => Some(FileKind::Java),
            _ => None,
        }
    }

    /// Kinds that contribute modules to the registry.
    pub fn is_source(&self) -> bool {
        matches!(self, FileKind::Python | FileKind::Java)
    }
}

fn is_compose_file(file_name: &str) -> bool {
    let stem = file_name
        .trim_end_matches(".yml")
        .trim_end_matches(".yaml");
    if stem.len() == file_name.len() {
        return false;
    }
    stem == "docker-compose" || stem == "compose" || stem.starts_with("docker-compose.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn classification() {
        let cases = [
            ("app/main.py", Some(FileKind::Python)),
            ("app/stubs.pyi", Some(FileKind::Python)),
            ("src/Main.java", Some(FileKind::Java)),
            ("Dockerfile", Some(FileKind::Dockerfile)),
            ("Dockerfile.prod", Some(FileKind::Dockerfile)),
            ("docker-compose.yml", Some(FileKind::Compose)),
            ("docker-compose.override.yaml", Some(FileKind::Compose)),
            ("compose.yaml", Some(FileKind::Compose)),
            ("config.yml", None),
            ("README.md", None),
        ];
        for (path, expected) in cases {
            assert_eq!(FileKind::from_path(&PathBuf::from(path)), expected, "{path}");
        }
    }
}
