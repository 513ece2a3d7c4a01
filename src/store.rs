// 🗄️ SQLite Snapshot - the published dataset imported into one database file
//
// One row per directory or record, keyed by its dataset path. Record bodies
// carry a SHA-256 checksum so re-importing an unchanged dataset is a no-op
// and a partial change only rewrites what moved.

use crate::error::{BudgetError, Result};
use crate::source::{join_path, split_path, DataSource, Entry, EntryKind};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub fn setup_snapshot(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS entries (
            path TEXT PRIMARY KEY,
            parent TEXT NOT NULL,
            name TEXT NOT NULL,
            is_dir INTEGER NOT NULL,
            body TEXT,
            checksum TEXT,
            imported_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_parent ON entries(parent)",
        [],
    )?;

    Ok(())
}

/// SHA-256 of a record body, lowercase hex
pub fn compute_checksum(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// IMPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// New records
    pub inserted: usize,
    /// Records whose checksum changed
    pub updated: usize,
    pub unchanged: usize,
    /// Entries no longer present in the source
    pub removed: usize,
    pub directories: usize,
    pub imported_at: DateTime<Utc>,
}

impl ImportSummary {
    pub fn records(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

/// Copy every directory and record of `source` into the snapshot.
///
/// Runs in one SQLite transaction: a failure leaves the previous snapshot intact.
pub fn import_dataset(source: &dyn DataSource, conn: &Connection) -> Result<ImportSummary> {
    setup_snapshot(conn)?;

    if !source.dir_exists("")? {
        return Err(BudgetError::not_found("dataset root"));
    }

    let imported_at = Utc::now();
    let stamp = imported_at.to_rfc3339();
    let tx = conn.unchecked_transaction()?;

    let mut summary = ImportSummary {
        inserted: 0,
        updated: 0,
        unchanged: 0,
        removed: 0,
        directories: 0,
        imported_at,
    };
    let mut seen: HashSet<String> = HashSet::new();
    let mut pending = vec![String::new()];

    while let Some(dir) = pending.pop() {
        let Some(entries) = source.list_entries(&dir)? else {
            continue;
        };

        upsert_dir(&tx, &dir, &stamp)?;
        summary.directories += 1;
        seen.insert(dir.clone());

        for entry in entries {
            let path = join_path(&dir, &entry.name);
            match entry.kind {
                EntryKind::Dir => pending.push(path),
                EntryKind::File => {
                    let Some(body) = source.read_record(&path)? else {
                        continue;
                    };
                    let checksum = compute_checksum(&body);

                    let existing: Option<Option<String>> = tx
                        .query_row(
                            "SELECT checksum FROM entries WHERE path = ?1",
                            params![path],
                            |row| row.get(0),
                        )
                        .optional()?;

                    match existing {
                        Some(Some(ref old)) if *old == checksum => summary.unchanged += 1,
                        Some(_) => {
                            tx.execute(
                                "UPDATE entries SET is_dir = 0, body = ?2, checksum = ?3, imported_at = ?4
                                 WHERE path = ?1",
                                params![path, body, checksum, stamp],
                            )?;
                            summary.updated += 1;
                        }
                        None => {
                            tx.execute(
                                "INSERT INTO entries (path, parent, name, is_dir, body, checksum, imported_at)
                                 VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6)",
                                params![path, dir, entry.name, body, checksum, stamp],
                            )?;
                            summary.inserted += 1;
                        }
                    }
                    seen.insert(path);
                }
            }
        }
    }

    let stale: Vec<String> = {
        let mut stmt = tx.prepare("SELECT path FROM entries")?;
        let paths = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut stale = Vec::new();
        for path in paths {
            let path = path?;
            if !seen.contains(&path) {
                stale.push(path);
            }
        }
        stale
    };
    for path in &stale {
        tx.execute("DELETE FROM entries WHERE path = ?1", params![path])?;
    }
    summary.removed = stale.len();

    tx.commit()?;

    tracing::info!(
        "Imported snapshot: {} inserted, {} updated, {} unchanged, {} removed, {} directories",
        summary.inserted,
        summary.updated,
        summary.unchanged,
        summary.removed,
        summary.directories
    );

    Ok(summary)
}

fn upsert_dir(conn: &Connection, path: &str, stamp: &str) -> Result<()> {
    let (parent, name) = split_path(path);
    conn.execute(
        "INSERT INTO entries (path, parent, name, is_dir, body, checksum, imported_at)
         VALUES (?1, ?2, ?3, 1, NULL, NULL, ?4)
         ON CONFLICT(path) DO UPDATE SET is_dir = 1, body = NULL, checksum = NULL",
        params![path, parent, name, stamp],
    )?;
    Ok(())
}

// ============================================================================
// SNAPSHOT SOURCE
// ============================================================================

/// Serves the dataset out of an imported snapshot
pub struct SqliteDataSource {
    conn: Mutex<Connection>,
}

impl SqliteDataSource {
    /// Opens an existing snapshot read-only; never creates the file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(path.as_ref(), OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| BudgetError::Storage(format!("{}: {}", path.as_ref().display(), e)))?;
        tracing::debug!("Opened snapshot {:?}", path.as_ref());
        Self::from_connection(conn)
    }

    /// Wraps a connection that already holds an imported snapshot
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let tables: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'entries'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(BudgetError::Storage("no imported snapshot (missing entries table)".to_string()));
        }

        Ok(SqliteDataSource {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BudgetError::Storage("snapshot connection lock poisoned".to_string()))
    }
}

impl DataSource for SqliteDataSource {
    fn list_entries(&self, path: &str) -> Result<Option<Vec<Entry>>> {
        let conn = self.lock()?;

        let is_dir: Option<bool> = conn
            .query_row(
                "SELECT is_dir FROM entries WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?;
        if is_dir != Some(true) {
            return Ok(None);
        }

        let mut stmt = conn.prepare(
            "SELECT name, is_dir FROM entries WHERE parent = ?1 AND path != '' ORDER BY name",
        )?;
        let rows = stmt.query_map(params![path], |row| {
            let name: String = row.get(0)?;
            let is_dir: bool = row.get(1)?;
            Ok(if is_dir { Entry::dir(name) } else { Entry::file(name) })
        })?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        entries.sort();
        Ok(Some(entries))
    }

    fn read_record(&self, path: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let body: Option<Option<String>> = conn
            .query_row(
                "SELECT body FROM entries WHERE path = ?1 AND is_dir = 0",
                params![path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body.flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowConfig;
    use crate::fixtures;
    use crate::loader::BudgetLoader;
    use crate::source::{FsDataSource, MemoryDataSource};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_checksum_is_stable() {
        assert_eq!(compute_checksum("{}"), compute_checksum("{}"));
        assert_ne!(compute_checksum("{}"), compute_checksum("{ }"));
        assert_eq!(compute_checksum("").len(), 64);
    }

    #[test]
    fn test_import_twice_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let source = fixtures::ontario_source();

        let first = import_dataset(&source, &conn).unwrap();
        assert!(first.inserted > 0);
        assert_eq!(first.updated, 0);

        let second = import_dataset(&source, &conn).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.removed, 0);
        assert_eq!(second.unchanged, first.inserted);
        assert_eq!(second.directories, first.directories);
    }

    #[test]
    fn test_reimport_tracks_changes_and_removals() {
        let conn = Connection::open_in_memory().unwrap();
        import_dataset(&fixtures::ontario_source(), &conn).unwrap();

        let changed = MemoryDataSource::new()
            .with_record("provincial/ontario/2023/summary.json", r#"{ "revenue": [], "spending": [] }"#)
            .with_record("provincial/ontario/2025/summary.json", "{}");
        let summary = import_dataset(&changed, &conn).unwrap();

        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unchanged, 0);
        assert!(summary.removed > 0);

        let snapshot = SqliteDataSource::from_connection(conn).unwrap();
        assert!(!snapshot.dir_exists("municipal").unwrap());
        assert!(snapshot.read_record("provincial/ontario/2022/summary.json").unwrap().is_none());
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let conn = Connection::open_in_memory().unwrap();
        let err = import_dataset(&MemoryDataSource::absent(), &conn).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_snapshot_matches_source() {
        let conn = Connection::open_in_memory().unwrap();
        let source = fixtures::ontario_source();
        import_dataset(&source, &conn).unwrap();
        let snapshot = SqliteDataSource::from_connection(conn).unwrap();

        for path in ["", "provincial", "provincial/ontario", "provincial/ontario/2023", "federal"] {
            assert_eq!(
                snapshot.list_entries(path).unwrap(),
                source.list_entries(path).unwrap(),
                "listing of '{}'",
                path
            );
        }
        assert_eq!(
            snapshot.read_record("provincial/ontario/2023/summary.json").unwrap(),
            source.read_record("provincial/ontario/2023/summary.json").unwrap()
        );
        assert!(snapshot.list_entries("quebec").unwrap().is_none());
        assert!(snapshot.read_record("provincial").unwrap().is_none());
    }

    #[test]
    fn test_loader_over_snapshot_file() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("budget.db");

        {
            let conn = Connection::open(&db_path).unwrap();
            import_dataset(&fixtures::ontario_source(), &conn).unwrap();
        }

        let snapshot = SqliteDataSource::open(&db_path).unwrap();
        let loader = BudgetLoader::new(Arc::new(snapshot), FlowConfig::default());

        assert_eq!(loader.get_available_years_for_jurisdiction("ontario"), vec!["2023", "2022"]);
        let data = loader.get_jurisdiction_data("ontario", "2023").unwrap();
        assert_eq!(data.total_spending, 2000.0);
    }

    #[test]
    fn test_open_missing_file_does_not_create_it() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("budgte.db");

        let err = SqliteDataSource::open(&db_path).err().unwrap();
        assert!(matches!(err, BudgetError::Storage(_)));
        assert!(!db_path.exists());
    }

    #[test]
    fn test_open_rejects_database_without_snapshot() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("empty.db");
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute("CREATE TABLE unrelated (id INTEGER)", []).unwrap();
        }

        let err = SqliteDataSource::open(&db_path).err().unwrap();
        assert!(matches!(err, BudgetError::Storage(ref m) if m.contains("entries")));

        let err = SqliteDataSource::from_connection(Connection::open_in_memory().unwrap()).err().unwrap();
        assert!(matches!(err, BudgetError::Storage(_)));
    }

    #[test]
    fn test_import_from_directory_tree() {
        let dir = TempDir::new().unwrap();
        let year_dir = dir.path().join("provincial").join("alberta").join("2023");
        std::fs::create_dir_all(&year_dir).unwrap();
        std::fs::write(year_dir.join("summary.json"), fixtures::ONTARIO_2023_SUMMARY).unwrap();
        std::fs::write(dir.path().join(".DS_Store"), "junk").unwrap();

        let conn = Connection::open_in_memory().unwrap();
        let summary = import_dataset(&FsDataSource::new(dir.path()), &conn).unwrap();

        assert_eq!(summary.inserted, 1);
        // root, provincial, alberta, 2023
        assert_eq!(summary.directories, 4);
        assert_eq!(summary.records(), 1);
    }
}
