//! Batch Loader
//!
//! Loads a batch of declaration files whose records reference each other in
//! any file order.
//!
//! Two strategies:
//! - **Retry**: execute files in order; files that hit forward references are
//!   retried while each pass reduces the number of failures. When a pass stops
//!   improving, the remaining files get one final pass in reporting mode.
//! - **Two-phase**: parse everything, then instantiate in dependency order.
//!
//! Neither strategy returns an error. Problems go to the diagnostic sink, and
//! the returned `BatchReport` lists the files that did not fully load.

mod retry;
mod two_phase;

#[cfg(test)]
pub(crate) mod test_host;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

pub use retry::{load_batch, load_with_retry, RetryLoader};
pub use two_phase::load_two_phase;

use crate::config::{LoadStrategy, LoaderConfig};
use crate::decl::{FileBatch, FileKind};
use crate::diagnostics::DiagnosticSink;
use crate::host::{ExecOutcome, FsHost, UnresolvedRecord};

/// One pass over (part of) a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// 1-based pass number
    pub pass: usize,
    /// Files executed (skipped files not included)
    pub files: usize,
    /// Forward-reference failures across the pass
    pub failures: usize,
    /// Files queued for the next pass
    pub retry: Vec<PathBuf>,
    /// Final pass run in reporting mode after loading stalled
    pub forced: bool,
}

/// A path that was not executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub kind: FileKind,
}

/// A file that did not fully load, as of its last execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub unresolved: Vec<UnresolvedRecord>,
    pub errors: usize,
}

/// Outcome of loading a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub passes: Vec<PassReport>,
    pub skipped: Vec<SkippedFile>,
    /// Successful instantiations over all passes (redeclarations included)
    pub instantiated: usize,
    /// Files with unresolved records or errors, sorted by path
    pub failed: Vec<FailedFile>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Whether loading stalled and ended with a reporting pass
    pub fn forced_pass(&self) -> bool {
        self.passes.iter().any(|p| p.forced)
    }

    /// Unresolved records over all failed files
    pub fn unresolved_count(&self) -> usize {
        self.failed.iter().map(|f| f.unresolved.len()).sum()
    }

    pub(crate) fn set_failed_from(&mut self, latest: BTreeMap<PathBuf, ExecOutcome>) {
        self.failed = latest
            .into_iter()
            .filter(|(_, outcome)| !outcome.is_clean())
            .map(|(path, outcome)| FailedFile {
                path,
                unresolved: outcome.unresolved,
                errors: outcome.errors,
            })
            .collect();
    }
}

/// Load a batch with the strategy and options from `config`
pub fn load_with_config<'a>(
    host: &'a mut FsHost,
    files: FileBatch,
    config: &LoaderConfig,
    sink: &'a mut dyn DiagnosticSink,
) -> BatchReport {
    match config.strategy {
        LoadStrategy::TwoPhase => {
            let extensions = host.extensions().to_vec();
            load_two_phase(host.registry_mut(), files, &extensions, sink)
        }
        LoadStrategy::Retry => {
            let loader = RetryLoader::new(host, sink).with_max_passes(config.max_passes);
            if config.recurse {
                loader.load_with_retry(files, None)
            } else {
                loader.load_once(files)
            }
        }
    }
}
