//! Bookmarks service: reading highlights addressed by path and fingerprint
//!
//! Marks are stored under the canonical path plus a SHA-256 of the file
//! contents. Lookups try the path first; when a file was renamed or moved the
//! fingerprint finds the marks and the stored paths are rewritten so future
//! lookups take the fast path again.

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::repos::{BookMark, BookmarksRepo};

use super::now_str;

/// Acknowledgement returned by `upsert_mark`
#[derive(Debug, Clone, Serialize)]
pub struct MarkAck {
    pub id: i64,
    pub path: String,
    pub fingerprint: String,
}

/// One mark as the editor consumes it
#[derive(Debug, Clone, Serialize)]
pub struct MarkItem {
    pub id: i64,
    pub lnum: i64,
    pub col: i64,
    pub length: i64,
    pub term: String,
    pub kind: String,
}

/// All marks of one file
#[derive(Debug, Clone, Serialize)]
pub struct MarkList {
    pub path: String,
    pub fingerprint: String,
    pub marks: Vec<MarkItem>,
}

fn to_item(m: &BookMark) -> MarkItem {
    MarkItem {
        id: m.id,
        lnum: m.lnum,
        col: m.col,
        length: m.length,
        term: m.term.clone(),
        kind: m.kind.clone(),
    }
}

fn canon_path(path: &str) -> Result<String> {
    let canon = std::fs::canonicalize(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AppError::NotFound("File not found".to_string()),
        _ => AppError::Io(e),
    })?;
    Ok(canon.to_string_lossy().into_owned())
}

/// Streaming SHA-256 of a file's contents.
fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AppError::NotFound("File not found".to_string()),
        _ => AppError::Io(e),
    })?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

pub struct BookmarksService {
    repo: BookmarksRepo,
}

impl BookmarksService {
    pub fn new(repo: BookmarksRepo) -> Self {
        Self { repo }
    }

    pub fn upsert_mark(
        &self,
        path: &str,
        lnum: i64,
        col: i64,
        length: i64,
        term: &str,
        kind: &str,
    ) -> Result<MarkAck> {
        let canon = canon_path(path)?;
        let fingerprint = sha256_file(Path::new(&canon))?;
        let id = self.repo.upsert_mark(
            &canon,
            &fingerprint,
            lnum,
            col,
            length,
            term,
            kind,
            &now_str(),
        )?;
        Ok(MarkAck {
            id,
            path: canon,
            fingerprint,
        })
    }

    pub fn list_marks_for_path(&self, path: &str) -> Result<MarkList> {
        let canon = canon_path(path)?;

        // Fast path: by path, no hashing.
        let marks = self.repo.list_by_path(&canon)?;
        if !marks.is_empty() {
            let fingerprint = marks[0].fingerprint.clone();
            return Ok(MarkList {
                path: canon,
                fingerprint,
                marks: marks.iter().map(to_item).collect(),
            });
        }

        // Renamed/moved file: match by content hash, then self-heal the paths.
        let fingerprint = sha256_file(Path::new(&canon))?;
        let marks = self.repo.list_by_fingerprint(&fingerprint)?;
        if !marks.is_empty() {
            self.repo
                .relink_path_for_fingerprint(&fingerprint, &canon, &now_str())?;
        }

        Ok(MarkList {
            path: canon,
            fingerprint,
            marks: marks.iter().map(to_item).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use std::sync::Arc;

    fn setup() -> (tempfile::TempDir, BookmarksService) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("t.db")).unwrap());
        (dir, BookmarksService::new(BookmarksRepo::new(db)))
    }

    #[test]
    fn mark_then_list_roundtrip() {
        let (dir, svc) = setup();
        let book = dir.path().join("book.txt");
        std::fs::write(&book, "some book text\n").unwrap();

        let ack = svc
            .upsert_mark(book.to_str().unwrap(), 1, 6, 4, "book", "f2")
            .unwrap();
        assert!(!ack.fingerprint.is_empty());

        let list = svc.list_marks_for_path(book.to_str().unwrap()).unwrap();
        assert_eq!(list.fingerprint, ack.fingerprint);
        assert_eq!(list.marks.len(), 1);
        assert_eq!(list.marks[0].term, "book");
    }

    #[test]
    fn rename_relinks_by_fingerprint() {
        let (dir, svc) = setup();
        let old = dir.path().join("old.txt");
        std::fs::write(&old, "identical contents\n").unwrap();
        svc.upsert_mark(old.to_str().unwrap(), 2, 1, 9, "identical", "mw")
            .unwrap();

        let new = dir.path().join("new.txt");
        std::fs::rename(&old, &new).unwrap();

        let list = svc.list_marks_for_path(new.to_str().unwrap()).unwrap();
        assert_eq!(list.marks.len(), 1);

        // Paths were rewritten, so the fast path now works directly.
        let again = svc.list_marks_for_path(new.to_str().unwrap()).unwrap();
        assert_eq!(again.marks.len(), 1);
    }

    #[test]
    fn missing_file_is_not_found() {
        let (dir, svc) = setup();
        let missing = dir.path().join("missing.txt");
        let err = svc
            .upsert_mark(missing.to_str().unwrap(), 1, 1, 1, "x", "f2")
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
