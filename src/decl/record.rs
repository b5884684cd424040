//! Record Declarations
//!
//! The parsed contents of a declaration file: a list of named records, each
//! with a kind, an optional parent to copy fields from, and a field map whose
//! values may reference other records by name.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DeclError;

/// A field value
///
/// `Ref` names another record. It is resolved when the record is
/// instantiated, so the target may live in a file loaded later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ref(String),
    List(Vec<Value>),
}

impl Value {
    /// Append every record name this value references (depth-first)
    pub fn collect_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Value::Ref(name) => out.push(name),
            Value::List(items) => {
                for item in items {
                    item.collect_refs(out);
                }
            }
            _ => {}
        }
    }

    /// First referenced record for which `missing` returns true
    pub fn find_ref(&self, missing: &impl Fn(&str) -> bool) -> Option<&str> {
        match self {
            Value::Ref(name) if missing(name.as_str()) => Some(name.as_str()),
            Value::List(items) => items.iter().find_map(|item| item.find_ref(missing)),
            _ => None,
        }
    }
}

/// A single record declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDecl {
    /// Record kind (e.g. "Explosion", "ParticleEmitter")
    pub kind: String,

    /// Unique record name, used by references
    pub name: String,

    /// Record to copy fields from before applying this record's own fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl RecordDecl {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            parent: None,
            fields: BTreeMap::new(),
        }
    }

    /// Builder: copy fields from `parent`
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Builder: set a field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Names of every record this declaration needs, parent first, no duplicates
    ///
    /// References to the record's own name are left out.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut deps: Vec<&str> = Vec::new();
        if let Some(parent) = &self.parent {
            deps.push(parent);
        }
        let mut refs = Vec::new();
        for value in self.fields.values() {
            value.collect_refs(&mut refs);
        }
        for name in refs {
            if name != self.name && !deps.contains(&name) {
                deps.push(name);
            }
        }
        deps
    }
}

/// Contents of one declaration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclSource {
    #[serde(default)]
    pub records: Vec<RecordDecl>,
}

impl DeclSource {
    /// Parse plain RON text. Empty text declares nothing.
    pub fn parse(text: &str, path: &Path) -> Result<Self, DeclError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        ron::from_str(text).map_err(|e| DeclError::Syntax {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Parse file bytes (supports both compressed and uncompressed RON)
    pub fn from_bytes(data: &[u8], path: &Path) -> Result<Self, DeclError> {
        if is_plain_text(data) {
            return Self::parse(&String::from_utf8_lossy(data), path);
        }

        let mut decompressed = Vec::new();
        brotli::BrotliDecompress(&mut Cursor::new(data), &mut decompressed).map_err(|e| {
            DeclError::Decompress {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;
        Self::parse(&String::from_utf8_lossy(&decompressed), path)
    }

    /// Serialize to pretty RON
    pub fn to_ron_string(&self) -> Result<String, DeclError> {
        let config = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .indentor("  ".to_string());
        ron::ser::to_string_pretty(self, config).map_err(|e| DeclError::Serialization(e.to_string()))
    }

    /// Serialize to bytes (compressed RON)
    pub fn to_compressed_bytes(&self) -> Result<Vec<u8>, DeclError> {
        let ron_data = self.to_ron_string()?;

        let mut compressed = Vec::new();
        brotli::BrotliCompress(
            &mut Cursor::new(ron_data.as_bytes()),
            &mut compressed,
            &brotli::enc::BrotliEncoderParams {
                quality: 6,
                lgwin: 22,
                ..Default::default()
            },
        )
        .map_err(|e| DeclError::Serialization(format!("compression failed: {}", e)))?;

        Ok(compressed)
    }

    /// Write to disk, compressed or as plain RON
    pub fn save(&self, path: &Path, compress: bool) -> Result<(), DeclError> {
        let data = if compress {
            self.to_compressed_bytes()?
        } else {
            self.to_ron_string()?.into_bytes()
        };
        std::fs::write(path, data).map_err(|source| DeclError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// RON text starts with a struct/list, a comment, an attribute or whitespace.
/// Anything else is taken to be a brotli stream.
fn is_plain_text(data: &[u8]) -> bool {
    match data.first() {
        None => true,
        Some(&b) => matches!(b, b'(' | b'[' | b'/' | b'#') || b.is_ascii_whitespace(),
    }
}
