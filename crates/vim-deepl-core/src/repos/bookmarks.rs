//! Reading bookmarks (highlights)
//!
//! Marks are addressed by `(path, lnum, col, kind)` and additionally carry a
//! content fingerprint so a renamed or moved file can be relinked.

use std::sync::Arc;

use rusqlite::{Row, params};
use serde::Serialize;

use crate::storage::{Database, Result, StorageError};

/// One highlight inside a book file
#[derive(Debug, Clone, Serialize)]
pub struct BookMark {
    pub id: i64,
    pub path: String,
    pub fingerprint: String,
    pub lnum: i64,
    pub col: i64,
    pub length: i64,
    pub term: String,
    pub kind: String,
}

fn row_to_mark(row: &Row) -> rusqlite::Result<BookMark> {
    Ok(BookMark {
        id: row.get(0)?,
        path: row.get(1)?,
        fingerprint: row.get(2)?,
        lnum: row.get(3)?,
        col: row.get(4)?,
        length: row.get(5)?,
        term: row.get(6)?,
        kind: row.get(7)?,
    })
}

const MARK_COLUMNS: &str = "id, path, fingerprint, lnum, col, length, term, kind";

/// Typed access to `book_marks`
#[derive(Clone)]
pub struct BookmarksRepo {
    db: Arc<Database>,
}

impl BookmarksRepo {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or refresh a mark; returns its row id.
    pub fn upsert_mark(
        &self,
        path: &str,
        fingerprint: &str,
        lnum: i64,
        col: i64,
        length: i64,
        term: &str,
        kind: &str,
        now_s: &str,
    ) -> Result<i64> {
        self.db.write_tx(|tx| {
            tx.execute(
                "INSERT INTO book_marks (path, fingerprint, lnum, col, length, term, kind, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(path, lnum, col, kind) DO UPDATE SET
                    fingerprint = excluded.fingerprint,
                    length      = excluded.length,
                    term        = excluded.term,
                    updated_at  = excluded.updated_at",
                params![path, fingerprint, lnum, col, length, term, kind, now_s],
            )
            .map_err(StorageError::from)?;

            tx.query_row(
                "SELECT id FROM book_marks WHERE path = ?1 AND lnum = ?2 AND col = ?3 AND kind = ?4",
                params![path, lnum, col, kind],
                |row| row.get(0),
            )
            .map_err(StorageError::from)
        })
    }

    pub fn list_by_path(&self, path: &str) -> Result<Vec<BookMark>> {
        let sql = format!(
            "SELECT {MARK_COLUMNS} FROM book_marks WHERE path = ?1 ORDER BY lnum, col"
        );
        self.db.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![path], row_to_mark)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(StorageError::from)?;
            Ok(rows)
        })
    }

    pub fn list_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<BookMark>> {
        let sql = format!(
            "SELECT {MARK_COLUMNS} FROM book_marks WHERE fingerprint = ?1 ORDER BY path, lnum, col"
        );
        self.db.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![fingerprint], row_to_mark)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(StorageError::from)?;
            Ok(rows)
        })
    }

    /// Point every mark with this fingerprint at a new path (rename self-heal).
    pub fn relink_path_for_fingerprint(
        &self,
        fingerprint: &str,
        new_path: &str,
        now_s: &str,
    ) -> Result<()> {
        self.db.write_tx(|tx| {
            tx.execute(
                "UPDATE book_marks SET path = ?1, updated_at = ?2 WHERE fingerprint = ?3",
                params![new_path, now_s, fingerprint],
            )
            .map_err(StorageError::from)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> (tempfile::TempDir, BookmarksRepo) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("t.db")).unwrap());
        (dir, BookmarksRepo::new(db))
    }

    const NOW: &str = "2025-01-01 12:00:00";

    #[test]
    fn upsert_same_position_updates_in_place() {
        let (_dir, repo) = repo();
        let a = repo
            .upsert_mark("/books/a.txt", "fp1", 3, 7, 5, "apple", "f2", NOW)
            .unwrap();
        let b = repo
            .upsert_mark("/books/a.txt", "fp2", 3, 7, 6, "apples", "f2", NOW)
            .unwrap();
        assert_eq!(a, b);

        let marks = repo.list_by_path("/books/a.txt").unwrap();
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].term, "apples");
        assert_eq!(marks[0].fingerprint, "fp2");
    }

    #[test]
    fn relink_moves_all_marks_for_fingerprint() {
        let (_dir, repo) = repo();
        repo.upsert_mark("/books/a.txt", "fp1", 1, 1, 3, "one", "f2", NOW)
            .unwrap();
        repo.upsert_mark("/books/a.txt", "fp1", 2, 1, 3, "two", "mw", NOW)
            .unwrap();

        repo.relink_path_for_fingerprint("fp1", "/books/b.txt", NOW).unwrap();
        assert!(repo.list_by_path("/books/a.txt").unwrap().is_empty());
        assert_eq!(repo.list_by_path("/books/b.txt").unwrap().len(), 2);
        assert_eq!(repo.list_by_fingerprint("fp1").unwrap().len(), 2);
    }
}
