//! Declaration files
//!
//! ## File Structure
//!
//! ```text
//! assets/samples/datablocks/
//! ├── manifest.txt      # optional load order, one file name per line
//! └── *.ron             # (records: [ (kind, name, parent, fields) ])
//! ```
//!
//! Files may be plain or brotli-compressed RON; the format is sniffed from
//! the first byte.

mod batch;
mod file;
mod record;

pub use batch::FileBatch;
pub use file::{has_supported_extension, DeclarationFile, FileKind};
pub use record::{DeclSource, RecordDecl, Value};
