// 📂 Data Sources - where the published dataset lives
//
// Everything above this layer only sees `list_entries` and `read_record`, so the
// registry and loader run unchanged against a directory tree, an in-memory
// fixture, or an imported SQLite snapshot.
//
// Paths are relative, slash-separated, with "" meaning the dataset root.

use crate::error::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

// ============================================================================
// ENTRY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryKind {
    Dir,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
}

impl Entry {
    pub fn dir(name: impl Into<String>) -> Self {
        Entry {
            name: name.into(),
            kind: EntryKind::Dir,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Entry {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

// ============================================================================
// DATA SOURCE CAPABILITY
// ============================================================================

/// Read-only access to the published dataset.
///
/// `Ok(None)` means the path does not exist; `Err` is reserved for genuine
/// storage failures.
pub trait DataSource: Send + Sync {
    /// List the entries of a directory, sorted by name
    fn list_entries(&self, path: &str) -> Result<Option<Vec<Entry>>>;

    /// Read a record (file) as text
    fn read_record(&self, path: &str) -> Result<Option<String>>;

    /// Whether a directory exists at `path`
    fn dir_exists(&self, path: &str) -> Result<bool> {
        Ok(self.list_entries(path)?.is_some())
    }
}

/// Join two dataset paths, treating "" as the root
pub fn join_path(base: &str, name: &str) -> String {
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, name),
    }
}

/// Split a dataset path into (parent, name)
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => ("", path),
    }
}

// ============================================================================
// FILESYSTEM SOURCE
// ============================================================================

/// Directory tree on local disk
#[derive(Debug, Clone)]
pub struct FsDataSource {
    root: PathBuf,
}

impl FsDataSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        FsDataSource {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let mut full = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            full.push(segment);
        }
        full
    }
}

impl DataSource for FsDataSource {
    fn list_entries(&self, path: &str) -> Result<Option<Vec<Entry>>> {
        let dir = self.resolve(path);
        if !dir.is_dir() {
            return Ok(None);
        }

        let read_dir = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for item in read_dir {
            let item = item?;
            let name = match item.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::warn!("Skipping non UTF-8 entry {:?} in {:?}", raw, dir);
                    continue;
                }
            };

            // Hidden files (.DS_Store, .gitkeep) are never part of the dataset
            if name.starts_with('.') {
                continue;
            }

            let kind = if item.file_type()?.is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File
            };
            entries.push(Entry { name, kind });
        }

        entries.sort();
        Ok(Some(entries))
    }

    fn read_record(&self, path: &str) -> Result<Option<String>> {
        let file = self.resolve(path);
        if file.is_dir() {
            return Ok(None);
        }

        match fs::read_to_string(&file) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// IN-MEMORY SOURCE
// ============================================================================

/// Path → record map; parent directories are implied by the record paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataSource {
    records: BTreeMap<String, String>,
    dirs: BTreeSet<String>,
}

impl MemoryDataSource {
    /// Empty source whose root directory exists
    pub fn new() -> Self {
        let mut source = MemoryDataSource::default();
        source.dirs.insert(String::new());
        source
    }

    /// Source without even a root directory (a missing deployment)
    pub fn absent() -> Self {
        MemoryDataSource::default()
    }

    pub fn with_record(mut self, path: &str, body: impl Into<String>) -> Self {
        self.insert(path, body);
        self
    }

    pub fn with_dir(mut self, path: &str) -> Self {
        self.insert_dir(path);
        self
    }

    pub fn insert(&mut self, path: &str, body: impl Into<String>) {
        let (parent, _) = split_path(path);
        self.insert_dir(parent);
        self.records.insert(path.to_string(), body.into());
    }

    pub fn insert_dir(&mut self, path: &str) {
        let mut current = path;
        loop {
            self.dirs.insert(current.to_string());
            if current.is_empty() {
                break;
            }
            current = split_path(current).0;
        }
    }
}

impl DataSource for MemoryDataSource {
    fn list_entries(&self, path: &str) -> Result<Option<Vec<Entry>>> {
        if !self.dirs.contains(path) {
            return Ok(None);
        }

        let mut entries: Vec<Entry> = self
            .dirs
            .iter()
            .filter(|d| !d.is_empty() && split_path(d).0 == path)
            .map(|d| Entry::dir(split_path(d).1))
            .chain(
                self.records
                    .keys()
                    .filter(|r| split_path(r).0 == path)
                    .map(|r| Entry::file(split_path(r).1)),
            )
            .collect();

        entries.sort();
        Ok(Some(entries))
    }

    fn read_record(&self, path: &str) -> Result<Option<String>> {
        Ok(self.records.get(path).cloned())
    }
}
