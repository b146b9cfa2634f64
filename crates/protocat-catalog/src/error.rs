use std::path::PathBuf;

use thiserror::Error;

/// Failure while mapping a structural location path onto the schema tree.
///
/// `position` is the offset into the path of the integer that could not be
/// used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("path {path:?}: tag at position {position} is not followed by an index")]
    MissingIndex { path: Vec<i32>, position: usize },

    #[error("path {path:?}: index {index} at position {position} is out of range (len {len})")]
    IndexOutOfRange {
        path: Vec<i32>,
        position: usize,
        index: i32,
        len: usize,
    },

    #[error("path {path:?}: unsupported segment {segment:?} at position {position}")]
    Unsupported {
        path: Vec<i32>,
        position: usize,
        segment: Vec<i32>,
    },
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read schema snapshot `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode binary descriptor set: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("failed to parse descriptor set JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to resolve source location in `{file}`: {source}")]
    Resolve {
        file: String,
        #[source]
        source: ResolveError,
    },
}
