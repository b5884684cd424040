//! Declaration files on disk

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::record::DeclSource;
use crate::error::DeclError;

/// What sits at a declaration path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileKind {
    /// A regular file with a supported extension
    Valid,
    /// Nothing exists at the path
    Missing,
    /// Something exists but cannot be loaded (directory, wrong extension)
    Unsupported,
}

impl FileKind {
    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Valid => "valid",
            FileKind::Missing => "missing",
            FileKind::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Case-insensitive extension match
pub fn has_supported_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// One file of declarations
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclarationFile {
    path: PathBuf,
}

impl DeclarationFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directories, for manifests and messages
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn classify(&self, extensions: &[String]) -> FileKind {
        match std::fs::metadata(&self.path) {
            Err(_) => FileKind::Missing,
            Ok(meta) if !meta.is_file() => FileKind::Unsupported,
            Ok(_) if has_supported_extension(&self.path, extensions) => FileKind::Valid,
            Ok(_) => FileKind::Unsupported,
        }
    }

    /// Read and parse the file (supports both compressed and uncompressed RON)
    pub fn read(&self) -> Result<DeclSource, DeclError> {
        let data = std::fs::read(&self.path).map_err(|source| DeclError::Io {
            path: self.path.clone(),
            source,
        })?;
        DeclSource::from_bytes(&data, &self.path)
    }
}

impl From<PathBuf> for DeclarationFile {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for DeclarationFile {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}
