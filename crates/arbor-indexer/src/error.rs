//! Indexing error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("project root {0} does not exist or is not a directory")]
    MissingRoot(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file walk failed: {0}")]
    Walk(#[from] ignore::Error),
}
