//! Container I/O boundary
//!
//! The engine never parses or serializes the binary container itself; it
//! works against [`ContainerStore`]. Production wires in a real container
//! library behind this trait. [`MemoryStore`] backs tests and tooling.

use crate::{ContainerError, Result, TaggedDocument};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// How a document is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Boundary to the binary container library
pub trait ContainerStore {
    /// Open a document, decrypting with `password` when required
    fn open(
        &self,
        path: &Path,
        password: Option<&str>,
        mode: OpenMode,
    ) -> Result<TaggedDocument>;

    /// Persist a document to `path`
    fn save(&self, doc: &TaggedDocument, path: &Path) -> Result<()>;

    /// Remove a previously written output (temp-file cleanup)
    fn remove(&self, path: &Path) -> Result<()>;
}

/// In-memory store keyed by path
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<PathBuf, StoredDoc>>,
    unwritable: Mutex<Vec<PathBuf>>,
}

struct StoredDoc {
    doc: TaggedDocument,
    password: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document at `path`
    pub fn insert(&self, path: impl Into<PathBuf>, doc: TaggedDocument) {
        self.insert_protected(path, doc, None);
    }

    /// Seed a password-protected document at `path`
    pub fn insert_protected(
        &self,
        path: impl Into<PathBuf>,
        mut doc: TaggedDocument,
        password: Option<&str>,
    ) {
        doc.info.encrypted = password.is_some();
        self.docs.lock().expect("store poisoned").insert(
            path.into(),
            StoredDoc {
                doc,
                password: password.map(String::from),
            },
        );
    }

    /// Make `save` fail for `path`
    pub fn mark_unwritable(&self, path: impl Into<PathBuf>) {
        self.unwritable
            .lock()
            .expect("store poisoned")
            .push(path.into());
    }

    /// Read back a previously saved document
    pub fn get(&self, path: &Path) -> Option<TaggedDocument> {
        self.docs
            .lock()
            .expect("store poisoned")
            .get(path)
            .map(|s| s.doc.clone())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.docs.lock().expect("store poisoned").contains_key(path)
    }
}

impl ContainerStore for MemoryStore {
    fn open(
        &self,
        path: &Path,
        password: Option<&str>,
        _mode: OpenMode,
    ) -> Result<TaggedDocument> {
        let docs = self.docs.lock().expect("store poisoned");
        let stored = docs
            .get(path)
            .ok_or_else(|| ContainerError::NotFound(path.to_path_buf()))?;
        if let Some(expected) = &stored.password {
            match password {
                Some(given) if given == expected => {}
                _ => return Err(ContainerError::Encrypted),
            }
        }
        Ok(stored.doc.clone())
    }

    fn save(&self, doc: &TaggedDocument, path: &Path) -> Result<()> {
        if self
            .unwritable
            .lock()
            .expect("store poisoned")
            .iter()
            .any(|p| p == path)
        {
            return Err(ContainerError::Unwritable(path.display().to_string()));
        }
        self.docs.lock().expect("store poisoned").insert(
            path.to_path_buf(),
            StoredDoc {
                doc: doc.clone(),
                password: None,
            },
        );
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.docs.lock().expect("store poisoned").remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .open(Path::new("missing.bin"), None, OpenMode::ReadOnly)
            .unwrap_err();
        assert!(matches!(err, ContainerError::NotFound(_)));
    }

    #[test]
    fn test_password_roundtrip() {
        let store = MemoryStore::new();
        store.insert_protected("locked.bin", TaggedDocument::new(), Some("hunter2"));

        let err = store
            .open(Path::new("locked.bin"), None, OpenMode::ReadOnly)
            .unwrap_err();
        assert!(matches!(err, ContainerError::Encrypted));

        let err = store
            .open(Path::new("locked.bin"), Some("wrong"), OpenMode::ReadOnly)
            .unwrap_err();
        assert!(matches!(err, ContainerError::Encrypted));

        let doc = store
            .open(Path::new("locked.bin"), Some("hunter2"), OpenMode::ReadOnly)
            .unwrap();
        assert!(doc.info.encrypted);
    }

    #[test]
    fn test_unwritable_path() {
        let store = MemoryStore::new();
        store.mark_unwritable("out.bin");
        let err = store
            .save(&TaggedDocument::new(), Path::new("out.bin"))
            .unwrap_err();
        assert!(matches!(err, ContainerError::Unwritable(_)));
    }
}
