//! Record host
//!
//! The loader only sequences files. Reading a file and turning its
//! declarations into records is the host's job, behind `RecordHost`.

use std::path::Path;

use serde::Serialize;

use crate::decl::{DeclarationFile, FileKind, RecordDecl};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::registry::Registry;

/// How the host treats forward references while executing a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Count them quietly; the file will probably be retried
    Counting,
    /// Report them on the diagnostic channel like any other error
    Reporting,
}

/// A record that could not be created because another record was missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedRecord {
    /// Position of the declaration in its file
    pub declaration: usize,
    pub record: String,
    pub missing: String,
}

/// Result of executing one file once
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecOutcome {
    /// Records created or redeclared
    pub instantiated: usize,
    /// Records that failed on a forward reference
    pub unresolved: Vec<UnresolvedRecord>,
    /// File errors and permanent record errors
    pub errors: usize,
}

impl ExecOutcome {
    /// Failures that a later pass might fix
    pub fn forward_failures(&self) -> usize {
        self.unresolved.len()
    }

    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty() && self.errors == 0
    }

    /// Fold another outcome for the same file into this one
    pub fn merge(&mut self, other: ExecOutcome) {
        self.instantiated += other.instantiated;
        self.unresolved.extend(other.unresolved);
        self.errors += other.errors;
    }

    /// Fold in the outcome of re-running this file's unresolved declarations
    ///
    /// Only those declarations ran again, so their new result replaces the
    /// unresolved list while earlier errors stand.
    pub fn merge_retry(&mut self, retry: ExecOutcome) {
        self.instantiated += retry.instantiated;
        self.unresolved = retry.unresolved;
        self.errors += retry.errors;
    }

    /// Declaration indices worth running again
    pub fn retry_declarations(&self) -> Vec<usize> {
        self.unresolved.iter().map(|u| u.declaration).collect()
    }
}

/// Executes declaration files
pub trait RecordHost {
    /// Whether the file can be loaded at all
    fn classify(&self, file: &DeclarationFile) -> FileKind;

    /// Execute the declarations in the file
    ///
    /// `only` restricts execution to the declarations at those indices, so a
    /// retry never re-runs records that already loaded. A failing record never
    /// stops the rest of the file from loading.
    fn exec(
        &mut self,
        file: &DeclarationFile,
        only: Option<&[usize]>,
        mode: ExecMode,
        sink: &mut dyn DiagnosticSink,
    ) -> ExecOutcome;
}

/// Filesystem host backed by a `Registry`
#[derive(Debug)]
pub struct FsHost {
    registry: Registry,
    extensions: Vec<String>,
}

impl FsHost {
    pub fn new(extensions: Vec<String>) -> Self {
        Self::with_registry(Registry::new(), extensions)
    }

    /// Load into an existing registry (records from earlier batches resolve)
    pub fn with_registry(registry: Registry, extensions: Vec<String>) -> Self {
        Self {
            registry,
            extensions,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl RecordHost for FsHost {
    fn classify(&self, file: &DeclarationFile) -> FileKind {
        file.classify(&self.extensions)
    }

    fn exec(
        &mut self,
        file: &DeclarationFile,
        only: Option<&[usize]>,
        mode: ExecMode,
        sink: &mut dyn DiagnosticSink,
    ) -> ExecOutcome {
        let source = match file.read() {
            Ok(source) => source,
            Err(e) => {
                sink.emit(Diagnostic::error(file.path(), e.to_string()));
                return ExecOutcome {
                    errors: 1,
                    ..Default::default()
                };
            }
        };

        instantiate_all(&mut self.registry, file.path(), &source.records, only, mode, sink)
    }
}

/// Instantiate a file's declarations in order into `registry`
///
/// With `only`, declarations at other indices are left alone.
pub fn instantiate_all(
    registry: &mut Registry,
    path: &Path,
    decls: &[RecordDecl],
    only: Option<&[usize]>,
    mode: ExecMode,
    sink: &mut dyn DiagnosticSink,
) -> ExecOutcome {
    let mut outcome = ExecOutcome::default();

    let selected = decls
        .iter()
        .enumerate()
        .filter(|(index, _)| only.map_or(true, |only| only.contains(index)));

    for (index, decl) in selected {
        match registry.instantiate(decl, Some(path)) {
            Ok(_) => outcome.instantiated += 1,
            Err(e) if e.is_forward_reference() => {
                if mode == ExecMode::Reporting {
                    sink.emit(Diagnostic::error(path, e.to_string()).for_record(index, &decl.name));
                } else {
                    log::debug!("{:?}: deferring '{}': {}", path, decl.name, e);
                }
                outcome.unresolved.push(UnresolvedRecord {
                    declaration: index,
                    record: decl.name.clone(),
                    missing: e.missing_target().unwrap_or_default().to_string(),
                });
            }
            Err(e) => {
                sink.emit(Diagnostic::error(path, e.to_string()).for_record(index, &decl.name));
                outcome.errors += 1;
            }
        }
    }

    outcome
}
