//! bonnie-blocks: datablock loading for BONNIE-32 content
//!
//! Datablocks (sound profiles, particle emitters, explosions, projectiles...)
//! are declared in RON files and reference each other by name. Files in a
//! batch can come in any order: a projectile may reference an explosion that
//! is declared in a file loaded later.
//!
//! ```text
//! FileBatch ──► loader (retry or two-phase) ──► RecordHost ──► Registry
//!                   │                              │
//!                   └── BatchReport                └── DiagnosticSink
//! ```

pub mod config;
pub mod decl;
pub mod diagnostics;
pub mod error;
pub mod host;
pub mod loader;
pub mod registry;

pub use config::{LoadStrategy, LoaderConfig};
pub use decl::{DeclSource, DeclarationFile, FileBatch, FileKind, RecordDecl, Value};
pub use diagnostics::{Diagnostic, DiagnosticSink, LogSink, Severity};
pub use error::{ConfigError, DeclError, InstantiateError};
pub use host::{ExecMode, ExecOutcome, FsHost, RecordHost, UnresolvedRecord};
pub use loader::{
    load_batch, load_two_phase, load_with_config, load_with_retry, BatchReport, FailedFile,
    PassReport, RetryLoader, SkippedFile,
};
pub use registry::{Record, Registry};
