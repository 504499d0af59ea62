//! Blob storage for documents staged before submission

use super::schema::init_schema;
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

/// Content store keyed by opaque document references.
///
/// Input files are put here before a run; the reference returned by
/// [`put`](Self::put) is what travels through the pipeline as the job's
/// `document` field, so workers fetch content from the shared store rather
/// than from the submitting host.
pub struct DocumentStore {
    conn: Connection,
}

impl DocumentStore {
    /// Open or create a document store database
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open document store at {}", path.display()))?;

        init_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Store raw bytes under a display name, returning the document reference
    pub fn put(&self, content: &[u8], name: &str) -> Result<String> {
        let now = chrono::Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO documents (name, content, created_at) VALUES (?1, ?2, ?3)",
            (name, content, &now),
        )?;

        Ok(self.conn.last_insert_rowid().to_string())
    }

    /// Fetch the raw bytes for a document reference
    pub fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let content = self
            .conn
            .query_row(
                "SELECT content FROM documents WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(content)
    }

    /// Display name recorded for a document reference
    pub fn name_of(&self, id: &str) -> Result<Option<String>> {
        let name = self
            .conn
            .query_row("SELECT name FROM documents WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;

        Ok(name)
    }

    /// Number of stored documents
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> DocumentStore {
        DocumentStore::open(&dir.path().join("documents.db")).unwrap()
    }

    #[test]
    fn test_put_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let id = store.put(b"raw document bytes", "report.txt").unwrap();

        assert_eq!(store.get(&id).unwrap(), Some(b"raw document bytes".to_vec()));
        assert_eq!(store.name_of(&id).unwrap(), Some("report.txt".to_string()));
    }

    #[test]
    fn test_references_are_unique_per_put() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let first = store.put(b"same", "a.txt").unwrap();
        let second = store.put(b"same", "a.txt").unwrap();

        assert_ne!(first, second);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_missing_reference() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert_eq!(store.get("999").unwrap(), None);
        assert_eq!(store.name_of("999").unwrap(), None);
    }

    #[test]
    fn test_store_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store = open_store(&dir);
            store.put(b"persistent", "doc.txt").unwrap()
        };

        let store = open_store(&dir);
        assert_eq!(store.get(&id).unwrap(), Some(b"persistent".to_vec()));
    }
}
