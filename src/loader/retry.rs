//! Retry loading
//!
//! Execute the batch in order. Files with forward references go into the
//! next pass, where only their unresolved declarations run again. A pass
//! must leave fewer failures than the one before it;
//! otherwise the leftovers are executed once more in reporting mode so their
//! errors reach the diagnostic channel, and loading stops.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{BatchReport, PassReport, SkippedFile};
use crate::decl::{FileBatch, FileKind};
use crate::diagnostics::{DedupSink, Diagnostic, DiagnosticSink};
use crate::host::{ExecMode, ExecOutcome, RecordHost};

/// Load a batch
///
/// Without `recurse` every file is executed once in reporting mode.
pub fn load_batch<'a, H: RecordHost + ?Sized>(
    host: &'a mut H,
    files: FileBatch,
    recurse: bool,
    sink: &'a mut dyn DiagnosticSink,
) -> BatchReport {
    let loader = RetryLoader::new(host, sink);
    if recurse {
        loader.load_with_retry(files, None)
    } else {
        loader.load_once(files)
    }
}

/// Load a batch, retrying while the failure count keeps dropping
///
/// `previous_failures` is the failure count of an earlier pass; `None` means
/// there was none, so the first pass always counts as progress.
pub fn load_with_retry<'a, H: RecordHost + ?Sized>(
    host: &'a mut H,
    files: FileBatch,
    previous_failures: Option<usize>,
    sink: &'a mut dyn DiagnosticSink,
) -> BatchReport {
    RetryLoader::new(host, sink).load_with_retry(files, previous_failures)
}

/// Retry loader with options
pub struct RetryLoader<'a, H: RecordHost + ?Sized> {
    host: &'a mut H,
    sink: DedupSink<'a>,
    max_passes: Option<usize>,
    report: BatchReport,
    /// Last outcome of every executed file
    latest: BTreeMap<PathBuf, ExecOutcome>,
}

impl<'a, H: RecordHost + ?Sized> RetryLoader<'a, H> {
    pub fn new(host: &'a mut H, sink: &'a mut dyn DiagnosticSink) -> Self {
        Self {
            host,
            sink: DedupSink::new(sink),
            max_passes: None,
            report: BatchReport::default(),
            latest: BTreeMap::new(),
        }
    }

    /// Stop retrying after this many counting passes
    pub fn with_max_passes(mut self, max_passes: Option<usize>) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Single pass, every failure reported
    pub fn load_once(mut self, files: FileBatch) -> BatchReport {
        if !files.is_empty() {
            self.run_pass(files, ExecMode::Reporting, false);
        }
        self.finish()
    }

    pub fn load_with_retry(mut self, files: FileBatch, previous_failures: Option<usize>) -> BatchReport {
        let mut batch = files;
        let mut previous = previous_failures;
        let mut retrying = false;

        while !batch.is_empty() {
            let (next, failures) = self.run_pass(batch, ExecMode::Counting, retrying);
            if next.is_empty() {
                break;
            }

            let improved = previous.map_or(true, |p| failures < p);
            let capped = self
                .max_passes
                .map_or(false, |max| self.report.passes.len() >= max);

            if improved && !capped {
                log::debug!(
                    "Retrying {} file(s) with {} unresolved record(s)",
                    next.len(),
                    failures
                );
                previous = Some(failures);
                batch = next;
                retrying = true;
                continue;
            }

            if capped && improved {
                log::warn!("Pass limit reached with {} unresolved record(s)", failures);
            } else {
                log::warn!(
                    "Loading stalled at {} unresolved record(s) in {} file(s)",
                    failures,
                    next.len()
                );
            }
            self.run_pass(next, ExecMode::Reporting, true);
            break;
        }

        self.finish()
    }

    /// Execute every file once; returns the files to retry and their failure total
    ///
    /// On a retry pass each file only re-runs the declarations that were
    /// unresolved after its previous execution.
    fn run_pass(&mut self, files: FileBatch, mode: ExecMode, retrying: bool) -> (FileBatch, usize) {
        let number = self.report.passes.len() + 1;
        let mut next = FileBatch::new();
        let mut failures = 0;
        let mut executed = 0;

        for file in files {
            match self.host.classify(&file) {
                FileKind::Valid => {}
                kind => {
                    if kind == FileKind::Missing {
                        log::debug!("Skipping missing file {:?}", file.path());
                    } else {
                        self.sink.emit(Diagnostic::warning(file.path(), "skipped: not a declaration file"));
                    }
                    self.report.skipped.push(SkippedFile {
                        path: file.path().to_path_buf(),
                        kind,
                    });
                    continue;
                }
            }

            let only = if retrying {
                self.latest.get(file.path()).map(ExecOutcome::retry_declarations)
            } else {
                None
            };
            let outcome = self.host.exec(&file, only.as_deref(), mode, &mut self.sink);
            executed += 1;
            self.report.instantiated += outcome.instantiated;

            let count = outcome.forward_failures();
            if retrying {
                self.latest
                    .entry(file.path().to_path_buf())
                    .or_default()
                    .merge_retry(outcome);
            } else {
                self.latest.insert(file.path().to_path_buf(), outcome);
            }
            if count > 0 {
                failures += count;
                next.push(file);
            }
        }

        let forced = mode == ExecMode::Reporting;
        if forced {
            // Nothing runs after a reporting pass
            next = FileBatch::new();
        }
        log::info!(
            "Pass {}{}: {} file(s), {} unresolved record(s)",
            number,
            if forced { " (final)" } else { "" },
            executed,
            failures
        );

        self.report.passes.push(PassReport {
            pass: number,
            files: executed,
            failures,
            retry: next.paths().map(|p| p.to_path_buf()).collect(),
            forced,
        });

        (next, failures)
    }

    fn finish(mut self) -> BatchReport {
        self.report.set_failed_from(self.latest);
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{DeclarationFile, RecordDecl, Value};
    use crate::diagnostics::Severity;
    use crate::loader::test_host::MemoryHost;
    use crate::registry::Registry;
    use std::path::Path;

    fn weapon() -> RecordDecl {
        RecordDecl::new("Projectile", "Weapon1").with_field("explosion", Value::Ref("Explosion1".into()))
    }

    fn explosion() -> RecordDecl {
        RecordDecl::new("Explosion", "Explosion1")
    }

    fn batch(names: &[&str]) -> FileBatch {
        names.iter().map(|n| PathBuf::from(*n)).collect()
    }

    #[test]
    fn test_weapons_before_explosions_takes_two_passes() {
        let mut host = MemoryHost::new()
            .with_file("weapons.decl", vec![weapon()])
            .with_file("explosions.decl", vec![explosion()]);
        let mut diags: Vec<Diagnostic> = Vec::new();

        let report = load_batch(&mut host, batch(&["weapons.decl", "explosions.decl"]), true, &mut diags);

        assert!(report.is_success());
        assert_eq!(report.pass_count(), 2);
        assert_eq!(report.passes[0].failures, 1);
        assert_eq!(report.passes[0].retry, vec![PathBuf::from("weapons.decl")]);
        assert_eq!(report.passes[1].files, 1);
        assert_eq!(report.passes[1].failures, 0);
        assert!(!report.forced_pass());
        assert!(host.registry.contains("Weapon1"));
        assert!(diags.is_empty());
        assert_eq!(
            host.executed,
            vec![
                PathBuf::from("weapons.decl"),
                PathBuf::from("explosions.decl"),
                PathBuf::from("weapons.decl"),
            ]
        );
    }

    #[test]
    fn test_acyclic_chain_converges_within_file_count() {
        // D -> C -> B -> A, files in worst-case order
        let mut host = MemoryHost::new()
            .with_file("d", vec![RecordDecl::new("K", "D").with_parent("C")])
            .with_file("c", vec![RecordDecl::new("K", "C").with_parent("B")])
            .with_file("b", vec![RecordDecl::new("K", "B").with_field("x", Value::Ref("A".into()))])
            .with_file("a", vec![RecordDecl::new("K", "A")]);
        let mut diags: Vec<Diagnostic> = Vec::new();

        let report = load_batch(&mut host, batch(&["d", "c", "b", "a"]), true, &mut diags);

        assert!(report.is_success());
        assert!(report.pass_count() <= 4);
        assert_eq!(host.registry.len(), 4);
        assert_eq!(host.registry.get("D").unwrap().parent.as_deref(), Some("C"));
    }

    #[test]
    fn test_missing_dependency_terminates_with_one_forced_pass() {
        let mut host = MemoryHost::new()
            .with_file("weapons.decl", vec![weapon(), RecordDecl::new("Projectile", "Weapon2")]);
        let mut diags: Vec<Diagnostic> = Vec::new();

        let report = load_batch(&mut host, batch(&["weapons.decl"]), true, &mut diags);

        assert!(!report.is_success());
        assert!(report.forced_pass());
        let forced: Vec<_> = report.passes.iter().filter(|p| p.forced).collect();
        assert_eq!(forced.len(), 1);
        assert_eq!(forced[0].files, 1);
        assert_eq!(report.passes.last().map(|p| p.forced), Some(true));

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path, PathBuf::from("weapons.decl"));
        assert_eq!(report.failed[0].unresolved[0].missing, "Explosion1");

        // Partial load: the other record made it
        assert!(host.registry.contains("Weapon2"));
        // Reported once, during the forced pass
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].record.as_deref(), Some("Weapon1"));
    }

    #[test]
    fn test_never_two_non_improving_passes_in_a_row() {
        let mut host = MemoryHost::new()
            .with_file("x", vec![RecordDecl::new("K", "X").with_parent("Nowhere")])
            .with_file("y", vec![RecordDecl::new("K", "Y").with_parent("Z")])
            .with_file("z", vec![RecordDecl::new("K", "Z")])
            .with_file("w", vec![RecordDecl::new("K", "W").with_parent("Y")]);
        let mut diags: Vec<Diagnostic> = Vec::new();

        let report = load_batch(&mut host, batch(&["x", "w", "y", "z"]), true, &mut diags);

        // 3, 2, 1 then a stalled 1
        let counting: Vec<usize> = report
            .passes
            .iter()
            .filter(|p| !p.forced)
            .map(|p| p.failures)
            .collect();
        assert_eq!(counting, vec![3, 2, 1, 1]);
        for i in 1..counting.len() - 1 {
            assert!(counting[i] < counting[i - 1]);
        }
        assert_eq!(report.passes.iter().filter(|p| p.forced).count(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(host.registry.len(), 3);
    }

    #[test]
    fn test_missing_file_is_skipped_without_affecting_counts() {
        let files = || batch(&["weapons.decl", "ghost.decl", "explosions.decl"]);
        let make_host = || {
            MemoryHost::new()
                .with_file("weapons.decl", vec![weapon()])
                .with_file("explosions.decl", vec![explosion()])
        };

        let mut host = make_host();
        let mut diags: Vec<Diagnostic> = Vec::new();
        let report = load_batch(&mut host, files(), true, &mut diags);

        assert!(report.is_success());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].kind, FileKind::Missing);
        assert_eq!(report.passes[0].failures, 1);
        assert_eq!(report.passes[0].files, 2);
        assert!(diags.is_empty());

        let mut baseline = make_host();
        let without_ghost = load_batch(
            &mut baseline,
            batch(&["weapons.decl", "explosions.decl"]),
            true,
            &mut Vec::<Diagnostic>::new(),
        );
        assert_eq!(report.passes, without_ghost.passes);
    }

    #[test]
    fn test_order_independence() {
        let load = |order: &[&str]| {
            let mut host = MemoryHost::new()
                .with_file("a", vec![RecordDecl::new("Explosion", "A1"), RecordDecl::new("Explosion", "A2")])
                .with_file(
                    "b",
                    vec![RecordDecl::new("Projectile", "B1")
                        .with_field("hit", Value::List(vec![Value::Ref("A1".into()), Value::Ref("A2".into())]))],
                );
            let report = load_batch(&mut host, batch(order), true, &mut Vec::<Diagnostic>::new());
            assert!(report.is_success());
            let mut names: Vec<String> = host.registry.names().map(String::from).collect();
            names.sort();
            names
        };

        assert_eq!(load(&["b", "a"]), load(&["a", "b"]));
    }

    #[test]
    fn test_no_recurse_is_single_reporting_pass() {
        let mut host = MemoryHost::new()
            .with_file("weapons.decl", vec![weapon()])
            .with_file("explosions.decl", vec![explosion()]);
        let mut diags: Vec<Diagnostic> = Vec::new();

        let report = load_batch(&mut host, batch(&["weapons.decl", "explosions.decl"]), false, &mut diags);

        assert_eq!(report.pass_count(), 1);
        assert!(!report.is_success());
        assert!(!host.registry.contains("Weapon1"));
        assert!(host.registry.contains("Explosion1"));
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn test_empty_batch_has_no_effect() {
        let mut host = MemoryHost::new();
        let report = load_batch(&mut host, FileBatch::new(), true, &mut Vec::<Diagnostic>::new());
        assert_eq!(report.pass_count(), 0);
        assert!(report.is_success());

        let report = load_batch(&mut host, FileBatch::new(), false, &mut Vec::<Diagnostic>::new());
        assert_eq!(report.pass_count(), 0);
    }

    #[test]
    fn test_previous_failures_bound_first_pass() {
        // A caller resuming with a known failure count gets no free retry
        let mut host = MemoryHost::new().with_file("weapons.decl", vec![weapon()]);
        let report = load_with_retry(&mut host, batch(&["weapons.decl"]), Some(1), &mut Vec::<Diagnostic>::new());

        assert_eq!(report.pass_count(), 2);
        assert!(report.passes[1].forced);
    }

    #[test]
    fn test_max_passes_forces_early_report() {
        let mut host = MemoryHost::new()
            .with_file("c", vec![RecordDecl::new("K", "C").with_parent("B")])
            .with_file("b", vec![RecordDecl::new("K", "B").with_parent("A")])
            .with_file("a", vec![RecordDecl::new("K", "A")]);
        let mut diags: Vec<Diagnostic> = Vec::new();

        let report = RetryLoader::new(&mut host, &mut diags)
            .with_max_passes(Some(1))
            .load_with_retry(batch(&["c", "b", "a"]), None);

        assert_eq!(report.pass_count(), 2);
        assert!(report.passes[1].forced);
        // The forced pass still loads what it can
        assert!(host.registry.contains("B"));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path, PathBuf::from("c"));
    }

    #[test]
    fn test_repeated_permanent_errors_reported_once() {
        let mut host = MemoryHost::new()
            .with_file("mixed", vec![weapon(), RecordDecl::new("Sound", "")])
            .with_file("explosions", vec![]);
        let mut diags: Vec<Diagnostic> = Vec::new();

        let report = load_batch(&mut host, batch(&["mixed", "explosions"]), true, &mut diags);

        // Three executions of "mixed", one empty-name diagnostic, one unresolved
        assert_eq!(report.pass_count(), 3);
        assert_eq!(diags.iter().filter(|d| d.message.contains("empty name")).count(), 1);
        assert_eq!(diags.len(), 2);
        assert_eq!(report.failed[0].errors, 1);
    }

    #[test]
    fn test_existing_registry_resolves_references() {
        let mut registry = Registry::new();
        registry.instantiate(&explosion(), Some(Path::new("earlier.decl"))).unwrap();
        let mut host = MemoryHost::with_registry(registry).with_file("weapons.decl", vec![weapon()]);

        let report = load_batch(&mut host, batch(&["weapons.decl"]), true, &mut Vec::<Diagnostic>::new());
        assert_eq!(report.pass_count(), 1);
        assert!(report.is_success());
    }

    #[test]
    fn test_unsupported_file_skipped() {
        let mut host = MemoryHost::new().with_unsupported("notes.txt");
        let mut diags: Vec<Diagnostic> = Vec::new();
        let report = load_batch(
            &mut host,
            std::iter::once(DeclarationFile::new("notes.txt")).collect(),
            true,
            &mut diags,
        );
        assert_eq!(report.skipped[0].kind, FileKind::Unsupported);
        assert_eq!(report.pass_count(), 1);
        assert_eq!(report.passes[0].files, 0);
        assert!(report.is_success());

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
        assert_eq!(diags[0].path, PathBuf::from("notes.txt"));
    }

    #[test]
    fn test_retry_keeps_later_redeclaration() {
        let shot = |volume| RecordDecl::new("Sound", "Shot").with_field("volume", Value::Int(volume));
        let load = |order: &[&str]| {
            let mut host = MemoryHost::new()
                .with_file("a", vec![shot(1), weapon()])
                .with_file("b", vec![shot(2)])
                .with_file("c", vec![explosion()]);
            let report = load_batch(&mut host, batch(order), true, &mut Vec::<Diagnostic>::new());
            assert!(report.is_success());
            host.registry.get("Shot").and_then(|r| r.get("volume")).cloned()
        };

        // "b" comes after "a" in both orders, so its declaration wins
        assert_eq!(load(&["a", "b", "c"]), Some(Value::Int(2)));
        assert_eq!(load(&["c", "a", "b"]), Some(Value::Int(2)));
    }

    #[test]
    fn test_retry_pass_reruns_only_unresolved_declarations() {
        let mut host = MemoryHost::new()
            .with_file("weapons.decl", vec![RecordDecl::new("Projectile", "Base"), weapon()])
            .with_file("explosions.decl", vec![explosion()]);

        let report = load_batch(
            &mut host,
            batch(&["weapons.decl", "explosions.decl"]),
            true,
            &mut Vec::<Diagnostic>::new(),
        );

        assert_eq!(report.pass_count(), 2);
        // Base once, Explosion1 once, Weapon1 on the retry
        assert_eq!(report.instantiated, 3);
        assert!(report.is_success());
    }

    #[test]
    fn test_identical_errors_from_distinct_records_all_reported() {
        let mut host = MemoryHost::new()
            .with_file("sounds.decl", vec![RecordDecl::new("Sound", ""), RecordDecl::new("Sound", "")]);
        let mut diags: Vec<Diagnostic> = Vec::new();

        let report = load_batch(&mut host, batch(&["sounds.decl"]), false, &mut diags);

        assert_eq!(report.failed[0].errors, 2);
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn test_forced_pass_queues_nothing() {
        let mut host = MemoryHost::new().with_file("weapons.decl", vec![weapon()]);

        let report = load_batch(&mut host, batch(&["weapons.decl"]), true, &mut Vec::<Diagnostic>::new());

        let last = report.passes.last().unwrap();
        assert!(last.forced);
        assert_eq!(last.failures, 1);
        assert!(last.retry.is_empty());
    }
}
