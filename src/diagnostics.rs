//! Diagnostic channel
//!
//! Human-readable reports of records and files that failed to load. The
//! loader itself never errors; everything an operator needs to see about a
//! bad batch goes through a `DiagnosticSink`.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// File being loaded when the problem was found
    pub path: PathBuf,
    /// Record the problem belongs to, if it is record-level
    pub record: Option<String>,
    /// Position of the record's declaration in its file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(path: &Path, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.to_path_buf(),
            record: None,
            declaration: None,
            message: message.into(),
        }
    }

    pub fn warning(path: &Path, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(path, message)
        }
    }

    /// Builder: attach the record name and its declaration index
    pub fn for_record(mut self, declaration: usize, record: impl Into<String>) -> Self {
        self.record = Some(record.into());
        self.declaration = Some(declaration);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {}", level, self.path.display())?;
        if let Some(record) = &self.record {
            write!(f, " [{}]", record)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Receives diagnostics as they are produced
pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => log::warn!("{}", diagnostic),
            Severity::Error => log::error!("{}", diagnostic),
        }
    }
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Drops diagnostics identical to one already delivered
///
/// Record diagnostics carry their declaration index, so two records that fail
/// the same way are both delivered.
pub struct DedupSink<'a> {
    inner: &'a mut dyn DiagnosticSink,
    seen: HashSet<Diagnostic>,
}

impl<'a> DedupSink<'a> {
    pub fn new(inner: &'a mut dyn DiagnosticSink) -> Self {
        Self {
            inner,
            seen: HashSet::new(),
        }
    }
}

impl DiagnosticSink for DedupSink<'_> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        if self.seen.insert(diagnostic.clone()) {
            self.inner.emit(diagnostic);
        }
    }
}
