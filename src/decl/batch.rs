//! File Batches
//!
//! An ordered list of declaration files loaded together. Batches come from
//! explicit paths, from a directory scan, or from a manifest that pins the
//! load order.

use std::path::{Path, PathBuf};

use super::file::{has_supported_extension, DeclarationFile};
use crate::config::LoaderConfig;

/// Ordered collection of declaration files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileBatch {
    files: Vec<DeclarationFile>,
}

impl FileBatch {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    pub fn push(&mut self, file: impl Into<DeclarationFile>) {
        self.files.push(file.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeclarationFile> {
        self.files.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path())
    }

    /// Append every file of `other`, keeping order
    pub fn extend(&mut self, other: FileBatch) {
        self.files.extend(other.files);
    }

    /// Every supported file in `dir`, sorted by path for consistent ordering
    pub fn discover(dir: &Path, extensions: &[String]) -> std::io::Result<Self> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && has_supported_extension(p, extensions))
            .collect();

        entries.sort();

        Ok(entries.into_iter().collect())
    }

    /// Load order from a manifest in `dir`
    ///
    /// The manifest lists one file name per line (relative to `dir`). Blank
    /// lines and lines starting with `#` are ignored. Returns `Ok(None)` when
    /// there is no manifest.
    pub fn from_manifest(dir: &Path, manifest_name: &str) -> std::io::Result<Option<Self>> {
        let manifest_path = dir.join(manifest_name);
        let manifest = match std::fs::read_to_string(&manifest_path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let batch = manifest
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| dir.join(line))
            .collect();

        Ok(Some(batch))
    }

    /// Manifest order when the directory has one, otherwise discovery order
    pub fn load_dir(dir: &Path, config: &LoaderConfig) -> std::io::Result<Self> {
        match Self::from_manifest(dir, &config.manifest)? {
            Some(batch) => {
                log::debug!("Using manifest order for {:?} ({} files)", dir, batch.len());
                Ok(batch)
            }
            None => Self::discover(dir, &config.extensions),
        }
    }

    /// Write the batch's file names to a manifest in `dir`
    pub fn write_manifest(&self, dir: &Path, manifest_name: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;

        let mut manifest = String::new();
        for file in &self.files {
            manifest.push_str(&file.file_name());
            manifest.push('\n');
        }

        std::fs::write(dir.join(manifest_name), manifest)
    }
}

impl FromIterator<PathBuf> for FileBatch {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().map(DeclarationFile::new).collect(),
        }
    }
}

impl FromIterator<DeclarationFile> for FileBatch {
    fn from_iter<I: IntoIterator<Item = DeclarationFile>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FileBatch {
    type Item = DeclarationFile;
    type IntoIter = std::vec::IntoIter<DeclarationFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}
