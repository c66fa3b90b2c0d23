//! Arbor Indexer — parsing, symbol extraction, type inference, call graph

pub mod callgraph;
pub mod error;
pub mod extract;
pub mod infer;
pub mod languages;
pub mod parser;
pub mod pipeline;

#[cfg(test)]
pub mod tests;

pub use error::IndexError;
pub use infer::{InferCtx, InferEnv, InferResult, Inferencer, StoredType, TypeStore};
pub use languages::FileKind;
pub use pipeline::{IndexerConfig, ParsedFile, build_index};
