//! Record Registry
//!
//! Symbol table of instantiated records. Declarations are resolved against it
//! by name: a parent or `Ref` that is not here yet is a forward reference, and
//! the declaration fails without touching the table.
//!
//! Records are never removed while a batch loads, so a file's count of
//! forward references can only go down as other files load.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::decl::{DeclSource, RecordDecl, Value};
use crate::error::InstantiateError;

/// An instantiated record
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub kind: String,
    pub name: String,
    pub parent: Option<String>,
    /// Parent's fields overlaid with this record's own
    pub fields: BTreeMap<String, Value>,
    /// File the record was last declared in
    pub source: Option<PathBuf>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Declaration that recreates this record
    pub fn to_decl(&self) -> RecordDecl {
        RecordDecl {
            kind: self.kind.clone(),
            name: self.name.clone(),
            parent: self.parent.clone(),
            fields: self.fields.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    records: HashMap<String, Record>,
    /// Names in first-instantiation order
    order: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Record> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over names in instantiation order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// Iterate over records in instantiation order
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.order.iter().filter_map(|name| self.records.get(name))
    }

    /// Check a declaration against the current table without instantiating it
    pub fn check(&self, decl: &RecordDecl) -> Result<(), InstantiateError> {
        if decl.name.trim().is_empty() {
            return Err(InstantiateError::EmptyName);
        }

        if decl.parent.as_deref() == Some(decl.name.as_str()) {
            return Err(InstantiateError::SelfParent(decl.name.clone()));
        }

        if let Some(existing) = self.records.get(&decl.name) {
            if existing.kind != decl.kind {
                return Err(InstantiateError::KindConflict {
                    name: decl.name.clone(),
                    existing: existing.kind.clone(),
                    kind: decl.kind.clone(),
                });
            }
        }

        if let Some(parent_name) = &decl.parent {
            let parent = self
                .records
                .get(parent_name)
                .ok_or_else(|| InstantiateError::UnknownParent {
                    record: decl.name.clone(),
                    parent: parent_name.clone(),
                })?;
            if parent.kind != decl.kind {
                return Err(InstantiateError::ParentKindMismatch {
                    record: decl.name.clone(),
                    kind: decl.kind.clone(),
                    parent: parent_name.clone(),
                    parent_kind: parent.kind.clone(),
                });
            }
        }

        // A record may reference itself
        let missing = |name: &str| name != decl.name && !self.records.contains_key(name);
        for (field, value) in &decl.fields {
            if let Some(target) = value.find_ref(&missing) {
                return Err(InstantiateError::UnresolvedReference {
                    record: decl.name.clone(),
                    field: field.clone(),
                    target: target.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Create (or redeclare in place) the record described by `decl`
    pub fn instantiate(
        &mut self,
        decl: &RecordDecl,
        source: Option<&Path>,
    ) -> Result<&Record, InstantiateError> {
        self.check(decl)?;

        let mut fields = decl
            .parent
            .as_ref()
            .and_then(|parent| self.records.get(parent))
            .map(|parent| parent.fields.clone())
            .unwrap_or_default();
        for (key, value) in &decl.fields {
            fields.insert(key.clone(), value.clone());
        }

        let record = Record {
            kind: decl.kind.clone(),
            name: decl.name.clone(),
            parent: decl.parent.clone(),
            fields,
            source: source.map(Path::to_path_buf),
        };

        if !self.records.contains_key(&decl.name) {
            self.order.push(decl.name.clone());
        }
        self.records.insert(decl.name.clone(), record);

        // Inserted just above
        Ok(&self.records[&decl.name])
    }

    /// All records as one declaration source, in instantiation order
    pub fn export(&self) -> DeclSource {
        DeclSource {
            records: self.iter().map(Record::to_decl).collect(),
        }
    }
}
