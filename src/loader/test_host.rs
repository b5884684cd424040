//! In-memory host for loader tests

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::decl::{DeclarationFile, FileKind, RecordDecl};
use crate::diagnostics::DiagnosticSink;
use crate::host::{instantiate_all, ExecMode, ExecOutcome, RecordHost};
use crate::registry::Registry;

#[derive(Debug, Default)]
pub struct MemoryHost {
    pub registry: Registry,
    files: HashMap<PathBuf, Vec<RecordDecl>>,
    unsupported: HashSet<PathBuf>,
    /// Paths in execution order
    pub executed: Vec<PathBuf>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    pub fn with_file(mut self, path: &str, decls: Vec<RecordDecl>) -> Self {
        self.files.insert(PathBuf::from(path), decls);
        self
    }

    pub fn with_unsupported(mut self, path: &str) -> Self {
        self.unsupported.insert(PathBuf::from(path));
        self
    }
}

impl RecordHost for MemoryHost {
    fn classify(&self, file: &DeclarationFile) -> FileKind {
        if self.unsupported.contains(file.path()) {
            FileKind::Unsupported
        } else if self.files.contains_key(file.path()) {
            FileKind::Valid
        } else {
            FileKind::Missing
        }
    }

    fn exec(
        &mut self,
        file: &DeclarationFile,
        only: Option<&[usize]>,
        mode: ExecMode,
        sink: &mut dyn DiagnosticSink,
    ) -> ExecOutcome {
        self.executed.push(file.path().to_path_buf());
        let decls = self.files.get(file.path()).cloned().unwrap_or_default();
        instantiate_all(&mut self.registry, file.path(), &decls, only, mode, sink)
    }
}
