//! Error types
//!
//! File-level errors (`DeclError`) stop a whole declaration file from loading.
//! Record-level errors (`InstantiateError`) only affect one record; the rest
//! of the file still loads.

use std::path::PathBuf;

/// Error reading or writing a declaration file
#[derive(Debug, thiserror::Error)]
pub enum DeclError {
    /// File I/O error
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Content looked compressed but could not be decompressed
    #[error("decompression failed for {path:?}: {message}")]
    Decompress { path: PathBuf, message: String },
    /// RON syntax error
    #[error("syntax error in {path:?}: {message}")]
    Syntax { path: PathBuf, message: String },
    /// Serialization error when writing declarations back out
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Error instantiating a single record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstantiateError {
    #[error("record has an empty name")]
    EmptyName,
    #[error("record '{0}' names itself as parent")]
    SelfParent(String),
    #[error("record '{name}' is already declared as {existing}, cannot redeclare as {kind}")]
    KindConflict {
        name: String,
        existing: String,
        kind: String,
    },
    #[error("record '{record}' copies from unknown parent '{parent}'")]
    UnknownParent { record: String, parent: String },
    #[error("record '{record}' ({kind}) cannot copy from '{parent}' ({parent_kind})")]
    ParentKindMismatch {
        record: String,
        kind: String,
        parent: String,
        parent_kind: String,
    },
    #[error("record '{record}' field '{field}' references unknown record '{target}'")]
    UnresolvedReference {
        record: String,
        field: String,
        target: String,
    },
}

impl InstantiateError {
    /// True when the failure may go away once another record is loaded
    pub fn is_forward_reference(&self) -> bool {
        matches!(
            self,
            InstantiateError::UnknownParent { .. } | InstantiateError::UnresolvedReference { .. }
        )
    }

    /// Name of the record that was missing, for forward references
    pub fn missing_target(&self) -> Option<&str> {
        match self {
            InstantiateError::UnknownParent { parent, .. } => Some(parent.as_str()),
            InstantiateError::UnresolvedReference { target, .. } => Some(target.as_str()),
            _ => None,
        }
    }
}

/// Error loading or saving loader configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("serialization error: {0}")]
    Serialization(String),
}
