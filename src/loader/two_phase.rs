//! Two-phase loading
//!
//! Phase 1 parses every file of the batch. Phase 2 orders the declarations
//! so that parents and referenced records come first, then instantiates them
//! once each in reporting mode. No retries are needed for references that can
//! be resolved at all.
//!
//! Declarations caught in a reference cycle are attempted last, in batch
//! order; they only succeed if the registry already holds what they need.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use super::{BatchReport, PassReport, SkippedFile};
use crate::decl::{FileBatch, FileKind, RecordDecl};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::host::{instantiate_all, ExecMode, ExecOutcome};
use crate::registry::Registry;

/// Position of a declaration: file in the batch, then index in the file
struct Entry {
    file: usize,
    declaration: usize,
}

pub fn load_two_phase(
    registry: &mut Registry,
    files: FileBatch,
    extensions: &[String],
    sink: &mut dyn DiagnosticSink,
) -> BatchReport {
    let mut report = BatchReport::default();
    if files.is_empty() {
        return report;
    }

    let mut latest: BTreeMap<PathBuf, ExecOutcome> = BTreeMap::new();
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut sources: Vec<Vec<RecordDecl>> = Vec::new();
    let mut entries: Vec<Entry> = Vec::new();

    // Phase 1: parse
    for file in files {
        let kind = file.classify(extensions);
        if kind != FileKind::Valid {
            if kind == FileKind::Unsupported {
                sink.emit(Diagnostic::warning(file.path(), "skipped: not a declaration file"));
            } else {
                log::debug!("Skipping missing file {:?}", file.path());
            }
            report.skipped.push(SkippedFile {
                path: file.path().to_path_buf(),
                kind,
            });
            continue;
        }

        let path = file.path().to_path_buf();
        match file.read() {
            Ok(source) => {
                let index = paths.len();
                latest.entry(path.clone()).or_default();
                paths.push(path);
                entries.extend((0..source.records.len()).map(|declaration| Entry {
                    file: index,
                    declaration,
                }));
                sources.push(source.records);
            }
            Err(e) => {
                sink.emit(Diagnostic::error(&path, e.to_string()));
                latest.entry(path).or_default().errors += 1;
            }
        }
    }

    // Phase 2: instantiate in dependency order
    let decls: Vec<&RecordDecl> = entries
        .iter()
        .map(|e| &sources[e.file][e.declaration])
        .collect();
    let mut failures = 0;
    for index in dependency_order(&decls) {
        let entry = &entries[index];
        let path = &paths[entry.file];
        let outcome = instantiate_all(
            registry,
            path,
            &sources[entry.file],
            Some(std::slice::from_ref(&entry.declaration)),
            ExecMode::Reporting,
            sink,
        );
        failures += outcome.forward_failures();
        report.instantiated += outcome.instantiated;
        latest.entry(path.clone()).or_default().merge(outcome);
    }

    log::info!(
        "Resolved {} declaration(s) from {} file(s), {} unresolved",
        entries.len(),
        paths.len(),
        failures
    );

    report.passes.push(PassReport {
        pass: 1,
        files: paths.len(),
        failures,
        retry: Vec::new(),
        forced: false,
    });
    report.set_failed_from(latest);
    report
}

/// Topological order over parent and `Ref` edges (Kahn's algorithm)
///
/// Ties go to the earlier declaration. Redeclarations of a name stay in batch
/// order. Declarations left in cycles are appended in batch order.
fn dependency_order(decls: &[&RecordDecl]) -> Vec<usize> {
    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, decl) in decls.iter().enumerate() {
        by_name.entry(decl.name.as_str()).or_default().push(i);
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); decls.len()];
    let mut pending = vec![0usize; decls.len()];

    for (i, decl) in decls.iter().enumerate() {
        let mut deps: Vec<usize> = Vec::new();

        // Previous declaration of the same name
        if let Some(&prev) = by_name[decl.name.as_str()].iter().filter(|&&j| j < i).last() {
            deps.push(prev);
        }

        for name in decl.dependencies() {
            if let Some(indices) = by_name.get(name) {
                deps.extend(indices.iter().copied().filter(|&j| j != i));
            }
        }

        deps.sort_unstable();
        deps.dedup();
        pending[i] = deps.len();
        for j in deps {
            dependents[j].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..decls.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(decls.len());

    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &k in &dependents[i] {
            pending[k] -= 1;
            if pending[k] == 0 {
                ready.insert(k);
            }
        }
    }

    if order.len() < decls.len() {
        let stuck: Vec<usize> = (0..decls.len()).filter(|&i| pending[i] > 0).collect();
        log::warn!(
            "{} declaration(s) depend on a reference cycle: {}",
            stuck.len(),
            stuck
                .iter()
                .map(|&i| decls[i].name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        order.extend(stuck);
    }

    order
}
