//! Translation caches: base entries, context entries, accumulated variants
//!
//! Base cache is keyed by `(term, src_lang, dst_lang)`; context cache adds
//! `ctx_hash`. Both upserts also feed `entry_translations`, which accumulates
//! every distinct meaning ever seen for a term.

use std::sync::Arc;

use rusqlite::{OptionalExtension, Row, Transaction, params};
use serde::Serialize;

use crate::storage::{Database, Result, StorageError};

/// Maximum context rows kept per `(term, src_lang, dst_lang)`
const MAX_CTX: i64 = 3;

/// Base cache row
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub id: i64,
    pub term: String,
    pub translation: String,
    pub src_lang: String,
    pub dst_lang: String,
    pub detected_raw: Option<String>,
    pub created_at: String,
    pub last_used: Option<String>,
    pub count: i64,
    pub hard: i64,
    pub ignore: bool,
}

/// Context cache row
#[derive(Debug, Clone, Serialize)]
pub struct CtxEntry {
    pub id: i64,
    pub term: String,
    pub translation: String,
    pub src_lang: String,
    pub dst_lang: String,
    pub ctx_hash: String,
    pub ctx_text: String,
    pub created_at: String,
    pub last_used: Option<String>,
    pub count: i64,
}

/// One accumulated translation variant
#[derive(Debug, Clone, Serialize)]
pub struct TranslationVariant {
    pub translation: String,
    pub count: i64,
    pub last_used: Option<String>,
    pub created_at: String,
}

/// Collapse whitespace runs, trim, and strip trailing punctuation.
pub fn normalize_translation(s: &str) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || ".,;:!?".contains(c))
        .to_string()
}

/// A variant that is just the term echoed back ("ought" -> "ought") is noise.
pub fn should_store_variant(term: &str, translation: &str) -> bool {
    let t = term.trim().to_lowercase();
    let tr = translation.trim().to_lowercase();
    !t.is_empty() && !tr.is_empty() && tr != t
}

/// Keep a context string only if it looks like a sentence (it carries
/// whitespace or punctuation). Sentence-like contexts replace the provider's
/// detected language in `entries.detected_raw`.
pub fn sentence_context(context: Option<&str>) -> Option<String> {
    let ctx = context?.split_whitespace().collect::<Vec<_>>().join(" ");
    if ctx.contains(' ') || ctx.chars().any(|c| ".!?,;:".contains(c)) {
        Some(ctx)
    } else {
        None
    }
}

fn row_to_entry(row: &Row) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get("id")?,
        term: row.get("term")?,
        translation: row.get("translation")?,
        src_lang: row.get("src_lang")?,
        dst_lang: row.get("dst_lang")?,
        detected_raw: row.get("detected_raw")?,
        created_at: row.get("created_at")?,
        last_used: row.get("last_used")?,
        count: row.get("count")?,
        hard: row.get("hard")?,
        ignore: row.get::<_, i64>("ignore")? != 0,
    })
}

fn row_to_ctx_entry(row: &Row) -> rusqlite::Result<CtxEntry> {
    Ok(CtxEntry {
        id: row.get("id")?,
        term: row.get("term")?,
        translation: row.get("translation")?,
        src_lang: row.get("src_lang")?,
        dst_lang: row.get("dst_lang")?,
        ctx_hash: row.get("ctx_hash")?,
        ctx_text: row.get::<_, Option<String>>("ctx_text")?.unwrap_or_default(),
        created_at: row.get("created_at")?,
        last_used: row.get("last_used")?,
        count: row.get("count")?,
    })
}

/// Upsert one variant row inside an open transaction.
fn upsert_variant_tx(
    tx: &Transaction,
    term: &str,
    translation: &str,
    src_lang: &str,
    dst_lang: &str,
    now_s: &str,
) -> Result<()> {
    let tr_norm = normalize_translation(translation);
    if !should_store_variant(term, &tr_norm) {
        return Ok(());
    }
    tx.execute(
        "INSERT INTO entry_translations (
            term, translation, src_lang, dst_lang, created_at, last_used, count
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
         ON CONFLICT(term, src_lang, dst_lang, translation) DO UPDATE SET
            last_used = excluded.last_used,
            count     = entry_translations.count + 1",
        params![term, tr_norm, src_lang, dst_lang, now_s, now_s],
    )
    .map_err(StorageError::from)?;
    Ok(())
}

/// Typed access to `entries`, `entries_ctx` and `entry_translations`
#[derive(Clone)]
pub struct TranslationRepo {
    db: Arc<Database>,
}

impl TranslationRepo {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // -------------------------
    // Base cache: entries
    // -------------------------

    /// Best cached base entry for `(term, dst_lang)`.
    ///
    /// Term matching is case-insensitive and trimmed; language codes compare
    /// as `upper(trim(..))`. With a `src_hint` that src_lang is preferred,
    /// otherwise the most recently used row wins.
    pub fn get_base_entry_any_src(
        &self,
        term: &str,
        dst_lang: &str,
        src_hint: Option<&str>,
    ) -> Result<Option<Entry>> {
        self.db.read(|conn| {
            if let Some(hint) = src_hint.filter(|h| !h.trim().is_empty()) {
                let row = conn
                    .query_row(
                        "SELECT * FROM entries
                         WHERE trim(term) = trim(?1) COLLATE NOCASE
                           AND upper(trim(dst_lang)) = upper(trim(?2))
                           AND upper(trim(src_lang)) = upper(trim(?3))
                         ORDER BY COALESCE(last_used, created_at) DESC, created_at DESC
                         LIMIT 1",
                        params![term, dst_lang, hint],
                        row_to_entry,
                    )
                    .optional()
                    .map_err(StorageError::from)?;
                if row.is_some() {
                    return Ok(row);
                }
            }

            conn.query_row(
                "SELECT * FROM entries
                 WHERE trim(term) = trim(?1) COLLATE NOCASE
                   AND upper(trim(dst_lang)) = upper(trim(?2))
                 ORDER BY COALESCE(last_used, created_at) DESC, created_at DESC
                 LIMIT 1",
                params![term, dst_lang],
                row_to_entry,
            )
            .optional()
            .map_err(StorageError::from)
        })
    }

    /// Record a base-cache hit: bump `count`, stamp `last_used`, and keep the
    /// variant stats for the entry's current translation in sync.
    pub fn touch_base_usage(&self, entry_id: i64, now_s: &str) -> Result<()> {
        self.db.write_tx(|tx| {
            tx.execute(
                "UPDATE entries SET last_used = ?1, count = count + 1 WHERE id = ?2",
                params![now_s, entry_id],
            )
            .map_err(StorageError::from)?;

            let row = tx
                .query_row(
                    "SELECT term, translation, src_lang, dst_lang FROM entries WHERE id = ?1",
                    params![entry_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()
                .map_err(StorageError::from)?;

            if let Some((term, translation, src, dst)) = row {
                upsert_variant_tx(tx, &term, &translation, &src, &dst, now_s)?;
            }
            Ok(())
        })
    }

    /// Atomic insert/update of a base entry plus its translation variant.
    ///
    /// When a sentence-like `context` is supplied it replaces `detected_raw`.
    pub fn upsert_base_entry(
        &self,
        term: &str,
        translation: &str,
        src_lang: &str,
        dst_lang: &str,
        detected_raw: &str,
        now_s: &str,
        context: Option<&str>,
    ) -> Result<()> {
        let detected_to_store = sentence_context(context).unwrap_or_else(|| detected_raw.to_string());

        self.db.write_tx(|tx| {
            tx.execute(
                "INSERT INTO entries (
                    term, translation, src_lang, dst_lang, detected_raw,
                    created_at, last_used, count, hard, ignore
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, 0, 0)
                 ON CONFLICT(term, src_lang, dst_lang) DO UPDATE SET
                    last_used = excluded.last_used,
                    count     = entries.count + 1",
                params![
                    term,
                    translation,
                    src_lang,
                    dst_lang,
                    detected_to_store,
                    now_s,
                    now_s
                ],
            )
            .map_err(StorageError::from)?;

            upsert_variant_tx(tx, term, translation, src_lang, dst_lang, now_s)
        })
    }

    /// Accumulated variants for a term, most recently used first.
    pub fn list_entry_translations(
        &self,
        term: &str,
        src_lang: &str,
        dst_lang: &str,
        limit: i64,
    ) -> Result<Vec<TranslationVariant>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT translation, count, last_used, created_at
                 FROM entry_translations
                 WHERE trim(term) = trim(?1) COLLATE NOCASE
                   AND upper(trim(src_lang)) = upper(trim(?2))
                   AND upper(trim(dst_lang)) = upper(trim(?3))
                 ORDER BY COALESCE(last_used, created_at) DESC, count DESC
                 LIMIT ?4",
            )?;
            let rows = stmt
                .query_map(params![term, src_lang, dst_lang, limit], |row| {
                    Ok(TranslationVariant {
                        translation: row.get(0)?,
                        count: row.get(1)?,
                        last_used: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(StorageError::from)?;
            Ok(rows)
        })
    }

    // -------------------------
    // Context cache: entries_ctx
    // -------------------------

    /// Cached context entry for `(term, src_lang, dst_lang, ctx_hash)`, with
    /// a fallback to any src_lang when the hinted one has no row.
    pub fn get_ctx_entry(
        &self,
        term: &str,
        src_lang: Option<&str>,
        dst_lang: &str,
        ctx_hash: &str,
    ) -> Result<Option<CtxEntry>> {
        let term_n = term.trim().to_string();
        let dst_n = dst_lang.trim().to_string();
        let src_n = src_lang.map(str::trim).unwrap_or("").to_string();

        self.db.read(|conn| {
            if !src_n.is_empty() {
                let row = conn
                    .query_row(
                        "SELECT * FROM entries_ctx
                         WHERE trim(term) = trim(?1) COLLATE NOCASE
                           AND upper(trim(src_lang)) = upper(trim(?2))
                           AND upper(trim(dst_lang)) = upper(trim(?3))
                           AND ctx_hash = ?4
                         LIMIT 1",
                        params![term_n, src_n, dst_n, ctx_hash],
                        row_to_ctx_entry,
                    )
                    .optional()
                    .map_err(StorageError::from)?;
                if row.is_some() {
                    return Ok(row);
                }
            }

            conn.query_row(
                "SELECT * FROM entries_ctx
                 WHERE trim(term) = trim(?1) COLLATE NOCASE
                   AND upper(trim(dst_lang)) = upper(trim(?2))
                   AND ctx_hash = ?3
                 ORDER BY created_at DESC
                 LIMIT 1",
                params![term_n, dst_n, ctx_hash],
                row_to_ctx_entry,
            )
            .optional()
            .map_err(StorageError::from)
        })
    }

    pub fn touch_ctx_usage(
        &self,
        term: &str,
        src_lang: &str,
        dst_lang: &str,
        ctx_hash: &str,
        now_s: &str,
    ) -> Result<()> {
        self.db.write_tx(|tx| {
            tx.execute(
                "UPDATE entries_ctx
                 SET last_used = ?1, count = count + 1
                 WHERE term = ?2 AND src_lang = ?3 AND dst_lang = ?4 AND ctx_hash = ?5",
                params![now_s, term, src_lang, dst_lang, ctx_hash],
            )
            .map_err(StorageError::from)?;
            Ok(())
        })
    }

    /// Distinct historical context translations, most recently used first.
    pub fn list_ctx_translations(
        &self,
        term: &str,
        src_lang: &str,
        dst_lang: &str,
        limit: i64,
    ) -> Result<Vec<String>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT translation, MAX(COALESCE(last_used, created_at)) AS lu
                 FROM entries_ctx
                 WHERE term = ?1 AND src_lang = ?2 AND dst_lang = ?3
                 GROUP BY translation
                 ORDER BY lu DESC
                 LIMIT ?4",
            )?;
            let rows = stmt
                .query_map(params![term, src_lang, dst_lang, limit], |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(StorageError::from)?;
            Ok(rows.into_iter().filter(|t| !t.is_empty()).collect())
        })
    }

    /// Most recent non-empty context sentences for a term.
    pub fn list_ctx_texts(
        &self,
        term: &str,
        src_lang: &str,
        dst_lang: &str,
        limit: i64,
    ) -> Result<Vec<String>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT ctx_text
                 FROM entries_ctx
                 WHERE term = ?1 AND src_lang = ?2 AND dst_lang = ?3
                   AND COALESCE(TRIM(ctx_text), '') != ''
                 ORDER BY COALESCE(last_used, created_at) DESC, id DESC
                 LIMIT ?4",
            )?;
            let rows = stmt
                .query_map(params![term, src_lang, dst_lang, limit], |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(StorageError::from)?;
            Ok(rows)
        })
    }

    /// Insert/update a context row, feed the variant table, then evict the
    /// oldest-by-usage context rows beyond [`MAX_CTX`]. The row carrying the
    /// current `ctx_hash` is never a victim.
    pub fn upsert_ctx_entry(
        &self,
        term: &str,
        translation: &str,
        src_lang: &str,
        dst_lang: &str,
        ctx_hash: &str,
        now_s: &str,
        ctx_text: &str,
    ) -> Result<()> {
        let ctx_text = ctx_text.split_whitespace().collect::<Vec<_>>().join(" ");

        self.db.write_tx(|tx| {
            tx.execute(
                "INSERT INTO entries_ctx (
                    term, translation, src_lang, dst_lang, ctx_hash, ctx_text,
                    created_at, last_used, count
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)
                 ON CONFLICT(term, src_lang, dst_lang, ctx_hash) DO UPDATE SET
                    translation = excluded.translation,
                    last_used   = excluded.last_used,
                    count       = entries_ctx.count + 1,
                    ctx_text    = CASE
                                    WHEN excluded.ctx_text IS NOT NULL AND excluded.ctx_text != ''
                                    THEN excluded.ctx_text
                                    ELSE entries_ctx.ctx_text
                                  END",
                params![term, translation, src_lang, dst_lang, ctx_hash, ctx_text, now_s, now_s],
            )
            .map_err(StorageError::from)?;

            upsert_variant_tx(tx, term, translation, src_lang, dst_lang, now_s)?;

            tx.execute(
                "DELETE FROM entries_ctx
                 WHERE id IN (
                    SELECT id FROM entries_ctx
                    WHERE term = ?1 AND src_lang = ?2 AND dst_lang = ?3 AND ctx_hash != ?4
                    ORDER BY COALESCE(last_used, created_at) ASC, id ASC
                    LIMIT (
                        SELECT CASE WHEN COUNT(*) > ?5 THEN COUNT(*) - ?6 ELSE 0 END
                        FROM entries_ctx
                        WHERE term = ?7 AND src_lang = ?8 AND dst_lang = ?9
                    )
                 )",
                params![
                    term, src_lang, dst_lang, ctx_hash, MAX_CTX, MAX_CTX, term, src_lang, dst_lang
                ],
            )
            .map_err(StorageError::from)?;
            Ok(())
        })
    }

    // -------------------------
    // User marks on entries
    // -------------------------

    /// `ignore = 1` for `(term, src_lang)`; returns affected rows.
    pub fn set_ignore(&self, term: &str, src_lang: &str) -> Result<usize> {
        self.db.write_tx(|tx| {
            tx.execute(
                "UPDATE entries SET ignore = 1 WHERE term = ?1 AND src_lang = ?2",
                params![term, src_lang],
            )
            .map_err(StorageError::from)
        })
    }

    /// `ignore = 1` by entry id; also suspends the entry's training card.
    pub fn set_ignore_by_entry_id(&self, entry_id: i64) -> Result<usize> {
        self.db.write_tx(|tx| {
            let changed = tx
                .execute("UPDATE entries SET ignore = 1 WHERE id = ?1", params![entry_id])
                .map_err(StorageError::from)?;
            tx.execute(
                "UPDATE training_cards SET suspended = 1 WHERE entry_id = ?1",
                params![entry_id],
            )
            .map_err(StorageError::from)?;
            Ok(changed)
        })
    }

    /// `hard = hard + 1`; returns the new value, or None when the word is unknown.
    pub fn inc_hard_and_get(&self, term: &str, src_lang: &str) -> Result<Option<i64>> {
        self.db.write_tx(|tx| {
            let changed = tx
                .execute(
                    "UPDATE entries SET hard = hard + 1 WHERE term = ?1 AND src_lang = ?2",
                    params![term, src_lang],
                )
                .map_err(StorageError::from)?;
            if changed == 0 {
                return Ok(None);
            }
            tx.query_row(
                "SELECT hard FROM entries WHERE term = ?1 AND src_lang = ?2",
                params![term, src_lang],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)
        })
    }
}
