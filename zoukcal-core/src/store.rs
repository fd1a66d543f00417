//! Content store: where event records are read from (and deleted once exhausted).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::error::{ZoukError, ZoukResult};

/// Identifies one source record, relative to the store root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SourceId(PathBuf);

impl SourceId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SourceId(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Name of the folder containing the record, if it is not at the store root.
    pub fn folder_name(&self) -> Option<&str> {
        self.0
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Backing store for event records.
pub trait ContentStore: Send + Sync {
    /// All records, in a stable order.
    fn list(&self) -> ZoukResult<Vec<SourceId>>;

    fn read(&self, id: &SourceId) -> ZoukResult<String>;

    fn delete(&self, id: &SourceId) -> ZoukResult<()>;

    /// Where `id` lives, as change notifications would report it.
    fn locate(&self, id: &SourceId) -> PathBuf;
}

/// Records stored as files with a given extension under a directory tree.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
    extension: String,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirStore {
            root: root.into(),
            extension: "md".to_string(),
        }
    }

    fn is_record(&self, path: &Path) -> bool {
        path.extension().is_some_and(|e| e == self.extension.as_str())
    }
}

/// Dotfiles and dot-directories are drafts or tool state, never records.
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().is_some_and(|n| n.starts_with('.'))
}

impl ContentStore for DirStore {
    fn list(&self) -> ZoukResult<Vec<SourceId>> {
        if !self.root.is_dir() {
            return Err(ZoukError::Config(format!(
                "Content directory {} does not exist",
                self.root.display()
            )));
        }

        let mut ids = Vec::new();
        for entry in WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() || !self.is_record(entry.path()) {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                ids.push(SourceId::new(rel));
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn read(&self, id: &SourceId) -> ZoukResult<String> {
        Ok(std::fs::read_to_string(self.locate(id))?)
    }

    fn delete(&self, id: &SourceId) -> ZoukResult<()> {
        std::fs::remove_file(self.locate(id))?;
        Ok(())
    }

    fn locate(&self, id: &SourceId) -> PathBuf {
        self.root.join(id.path())
    }
}

/// In-memory store, handy for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<SourceId, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, content: &str) {
        self.lock().insert(SourceId::new(path), content.to_string());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().contains_key(&SourceId::new(path))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<SourceId, String>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ContentStore for MemoryStore {
    fn list(&self) -> ZoukResult<Vec<SourceId>> {
        Ok(self.lock().keys().cloned().collect())
    }

    fn read(&self, id: &SourceId) -> ZoukResult<String> {
        self.lock().get(id).cloned().ok_or_else(|| {
            ZoukError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{id} not found"),
            ))
        })
    }

    fn delete(&self, id: &SourceId) -> ZoukResult<()> {
        self.lock().remove(id);
        Ok(())
    }

    fn locate(&self, id: &SourceId) -> PathBuf {
        id.path().to_path_buf()
    }
}
