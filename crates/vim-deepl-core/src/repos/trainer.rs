//! Trainer tables: SM-2 cards and the immutable review log
//!
//! Pool queries normalize legacy millisecond `due_at` values to seconds at
//! query time; writes always store seconds and clamp absurdly overdue cards
//! one day forward so they cannot wedge the due pool.

use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use rusqlite::{OptionalExtension, Row, Transaction, params, params_from_iter};
use serde::Serialize;

use crate::storage::{Database, Result, StorageError};

/// Legacy rows may hold milliseconds; anything above this is divided by 1000.
const MS_THRESHOLD: i64 = 100_000_000_000;

/// SM-2 card state
#[derive(Debug, Clone, Serialize)]
pub struct TrainingCard {
    pub id: i64,
    pub entry_id: Option<i64>,
    pub src_lang: Option<String>,
    pub reps: i64,
    pub lapses: i64,
    pub ef: f64,
    pub interval_days: i64,
    pub due_at: Option<i64>,
    pub last_review_at: Option<i64>,
    pub last_grade: Option<i64>,
    pub correct_streak: i64,
    pub wrong_streak: i64,
    pub suspended: bool,
}

/// Card/entry join row produced by the candidate pool queries
#[derive(Debug, Clone)]
pub struct CardCandidate {
    pub card_id: Option<i64>,
    pub entry_id: i64,
    pub term: String,
    pub translation: String,
    pub src_lang: String,
    pub dst_lang: String,
    pub detected_raw: Option<String>,
    pub context_raw: String,
    pub due_at: Option<i64>,
    pub lapses: i64,
    pub wrong_streak: i64,
}

/// Entries row used by the legacy fallback pool
#[derive(Debug, Clone)]
pub struct TrainingEntry {
    pub id: i64,
    pub card_id: Option<i64>,
    pub term: String,
    pub translation: String,
    pub src_lang: String,
    pub dst_lang: String,
    pub detected_raw: Option<String>,
    pub created_at: String,
    pub last_used: Option<String>,
    pub count: i64,
    pub hard: i64,
}

/// New SM-2 state written back after grading
#[derive(Debug, Clone)]
pub struct SrsUpdate {
    pub reps: i64,
    pub lapses: i64,
    pub ef: f64,
    pub interval_days: i64,
    pub due_at: i64,
    pub last_review_at: i64,
    pub last_grade: i64,
    pub correct_streak: i64,
    pub wrong_streak: i64,
}

/// Deck mastery snapshot for progress display
#[derive(Debug, Clone, Serialize)]
pub struct DeckStats {
    pub total: i64,
    pub mastered: i64,
    pub mastery_threshold: i64,
    pub mastery_percent: i64,
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

fn normalize_ts(ts: i64) -> i64 {
    if ts > MS_THRESHOLD { ts / 1000 } else { ts }
}

/// Correlated subquery: the best context sentence stored for an entry.
const CONTEXT_RAW_SELECT: &str = "COALESCE(
      (
        SELECT x.ctx_text
        FROM entries_ctx x
        WHERE x.term = e.term
          AND x.src_lang = e.src_lang
          AND x.dst_lang = e.dst_lang
          AND x.ctx_text IS NOT NULL
          AND x.ctx_text != ''
        ORDER BY
          COALESCE(x.last_used, x.created_at) DESC,
          x.count DESC,
          x.id DESC
        LIMIT 1
      ),
    '')";

fn row_to_candidate(row: &Row) -> rusqlite::Result<CardCandidate> {
    Ok(CardCandidate {
        card_id: row.get("card_id")?,
        entry_id: row.get("entry_id")?,
        term: row.get("term")?,
        translation: row.get("translation")?,
        src_lang: row.get("src_lang")?,
        dst_lang: row.get("dst_lang")?,
        detected_raw: row.get("detected_raw")?,
        context_raw: row.get::<_, Option<String>>("context_raw")?.unwrap_or_default(),
        due_at: row.get("due_at")?,
        lapses: row.get("lapses")?,
        wrong_streak: row.get("wrong_streak")?,
    })
}

fn row_to_card(row: &Row) -> rusqlite::Result<TrainingCard> {
    Ok(TrainingCard {
        id: row.get("id")?,
        entry_id: row.get("entry_id")?,
        src_lang: row.get("src_lang")?,
        reps: row.get("reps")?,
        lapses: row.get("lapses")?,
        ef: row.get("ef")?,
        interval_days: row.get("interval_days")?,
        due_at: row.get::<_, Option<i64>>("due_at")?.map(normalize_ts),
        last_review_at: row.get::<_, Option<i64>>("last_review_at")?.map(normalize_ts),
        last_grade: row.get("last_grade")?,
        correct_streak: row.get("correct_streak")?,
        wrong_streak: row.get("wrong_streak")?,
        suspended: row.get::<_, i64>("suspended")? != 0,
    })
}

/// Typed access to `training_cards` and `training_reviews`
#[derive(Clone)]
pub struct TrainerRepo {
    db: Arc<Database>,
}

impl TrainerRepo {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// All non-ignored entries in the language set, with their card id (if
    /// any). Feeds the legacy fallback pool.
    pub fn list_entries_for_training(&self, src_langs: &[String]) -> Result<Vec<TrainingEntry>> {
        if src_langs.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT e.id, c.id AS card_id, e.term, e.translation, e.src_lang, e.dst_lang,
                    e.detected_raw, e.created_at, e.last_used, e.count, e.hard
             FROM entries e
             LEFT JOIN training_cards c ON c.entry_id = e.id
             WHERE e.ignore = 0
               AND e.src_lang IN ({})",
            placeholders(src_langs.len())
        );
        self.db.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(src_langs.iter()), |row| {
                    Ok(TrainingEntry {
                        id: row.get(0)?,
                        card_id: row.get(1)?,
                        term: row.get(2)?,
                        translation: row.get(3)?,
                        src_lang: row.get(4)?,
                        dst_lang: row.get(5)?,
                        detected_raw: row.get(6)?,
                        created_at: row.get(7)?,
                        last_used: row.get(8)?,
                        count: row.get(9)?,
                        hard: row.get(10)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(StorageError::from)?;
            Ok(rows)
        })
    }

    /// Bump `count` and stamp `last_used`. Only graded reviews call this.
    pub fn touch_usage(&self, entry_id: i64, now_s: &str) -> Result<()> {
        self.db.write_tx(|tx| {
            tx.execute(
                "UPDATE entries SET last_used = ?1, count = count + 1 WHERE id = ?2",
                params![now_s, entry_id],
            )
            .map_err(StorageError::from)?;
            Ok(())
        })
    }

    pub fn get_card(&self, card_id: i64) -> Result<Option<TrainingCard>> {
        self.db.read(|conn| {
            conn.query_row(
                "SELECT id, entry_id, src_lang, reps, lapses, ef, interval_days, due_at,
                        last_review_at, last_grade, correct_streak, wrong_streak, suspended
                 FROM training_cards
                 WHERE id = ?1",
                params![card_id],
                row_to_card,
            )
            .optional()
            .map_err(StorageError::from)
        })
    }

    /// Due pool: non-suspended, entry not ignored, normalized `due_at <= now`.
    /// Order: most overdue first, then most-lapsed, then longest wrong streak.
    pub fn list_due(
        &self,
        src_langs: &[String],
        now_ts: i64,
        limit: i64,
        exclude_card_ids: &[i64],
    ) -> Result<Vec<CardCandidate>> {
        self.pool_query(src_langs, exclude_card_ids, limit, PoolKind::Due { now_ts })
    }

    /// Hard pool: every selectable card ranked by difficulty signals.
    pub fn list_hard(
        &self,
        src_langs: &[String],
        limit: i64,
        exclude_card_ids: &[i64],
    ) -> Result<Vec<CardCandidate>> {
        self.pool_query(src_langs, exclude_card_ids, limit, PoolKind::Hard)
    }

    /// New pool: entries without any training card yet, in random order.
    pub fn list_new(&self, src_langs: &[String], limit: i64) -> Result<Vec<CardCandidate>> {
        if src_langs.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT
                NULL AS card_id,
                e.id AS entry_id,
                e.term, e.translation, e.src_lang, e.dst_lang,
                e.detected_raw AS detected_raw,
                {CONTEXT_RAW_SELECT} AS context_raw,
                NULL AS due_at,
                0 AS lapses,
                0 AS wrong_streak
             FROM entries e
             LEFT JOIN training_cards c ON c.entry_id = e.id
             WHERE e.ignore = 0
               AND e.src_lang IN ({})
               AND c.id IS NULL
             ORDER BY RANDOM()
             LIMIT ?",
            placeholders(src_langs.len())
        );

        let mut args: Vec<SqlValue> = src_langs.iter().map(|s| SqlValue::from(s.clone())).collect();
        args.push(SqlValue::from(limit));

        self.db.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), row_to_candidate)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(StorageError::from)?;
            Ok(rows)
        })
    }

    fn pool_query(
        &self,
        src_langs: &[String],
        exclude_card_ids: &[i64],
        limit: i64,
        kind: PoolKind,
    ) -> Result<Vec<CardCandidate>> {
        if src_langs.is_empty() {
            return Ok(Vec::new());
        }

        let exclude_sql = if exclude_card_ids.is_empty() {
            String::new()
        } else {
            format!(" AND c.id NOT IN ({}) ", placeholders(exclude_card_ids.len()))
        };

        let due_norm = format!(
            "CASE
               WHEN CAST(c.due_at AS INTEGER) > {MS_THRESHOLD}
               THEN CAST(CAST(c.due_at AS INTEGER) / 1000 AS INTEGER)
               ELSE CAST(c.due_at AS INTEGER)
             END"
        );

        let (due_filter, order_by) = match kind {
            PoolKind::Due { .. } => (
                format!(" AND c.due_at IS NOT NULL AND ({due_norm}) <= ? "),
                "due_at ASC, c.lapses DESC, c.wrong_streak DESC",
            ),
            PoolKind::Hard => (
                String::new(),
                "c.lapses DESC, c.wrong_streak DESC, due_at ASC, \
                 COALESCE(CAST(c.last_review_at AS INTEGER), 0) ASC",
            ),
        };

        let sql = format!(
            "SELECT
                c.id AS card_id,
                c.entry_id AS entry_id,
                {due_norm} AS due_at,
                c.lapses,
                c.wrong_streak,
                e.term, e.translation, e.src_lang, e.dst_lang,
                e.detected_raw AS detected_raw,
                {CONTEXT_RAW_SELECT} AS context_raw
             FROM training_cards c
             JOIN entries e ON e.id = c.entry_id
             WHERE c.suspended = 0
               AND e.ignore = 0
               {exclude_sql}
               {due_filter}
               AND e.src_lang IN ({langs})
             ORDER BY {order_by}
             LIMIT ?",
            langs = placeholders(src_langs.len()),
        );

        let mut args: Vec<SqlValue> = Vec::new();
        args.extend(exclude_card_ids.iter().map(|id| SqlValue::from(*id)));
        if let PoolKind::Due { now_ts } = kind {
            args.push(SqlValue::from(now_ts));
        }
        args.extend(src_langs.iter().map(|s| SqlValue::from(s.clone())));
        args.push(SqlValue::from(limit));

        self.db.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), row_to_candidate)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(StorageError::from)?;
            Ok(rows)
        })
    }

    /// Return the card id for an entry, creating a due-now card if none exists.
    pub fn ensure_card_for_entry(&self, entry_id: i64, now_ts: i64) -> Result<i64> {
        self.db.write_tx(|tx| Self::ensure_card_tx(tx, entry_id, now_ts))
    }

    fn ensure_card_tx(tx: &Transaction, entry_id: i64, now_ts: i64) -> Result<i64> {
        if let Some(id) = tx
            .query_row(
                "SELECT id FROM training_cards WHERE entry_id = ?1",
                params![entry_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(StorageError::from)?
        {
            return Ok(id);
        }

        let src_lang: Option<String> = tx
            .query_row(
                "SELECT src_lang FROM entries WHERE id = ?1",
                params![entry_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?;

        tx.execute(
            "INSERT INTO training_cards (entry_id, src_lang, due_at) VALUES (?1, ?2, ?3)",
            params![entry_id, src_lang, now_ts],
        )
        .map_err(StorageError::from)?;
        Ok(tx.last_insert_rowid())
    }

    /// Apply a graded review in one transaction: update the SM-2 state,
    /// append the immutable review row, and bump the owning entry's usage.
    pub fn apply_review(
        &self,
        card_id: i64,
        update: &SrsUpdate,
        entry_id: Option<i64>,
        now_s: &str,
        day: &str,
    ) -> Result<()> {
        let now_ts = chrono::Utc::now().timestamp();
        self.db.write_tx(|tx| {
            let mut due_at = normalize_ts(update.due_at);
            let last_review_at = normalize_ts(update.last_review_at);

            // An absurdly overdue card would be selected forever; push it forward.
            if due_at != 0 && due_at < now_ts - 86_400 * 365 {
                due_at = now_ts + 86_400;
            }

            tx.execute(
                "UPDATE training_cards
                 SET reps = ?1, lapses = ?2, ef = ?3, interval_days = ?4, due_at = ?5,
                     last_review_at = ?6, last_grade = ?7, correct_streak = ?8, wrong_streak = ?9
                 WHERE id = ?10",
                params![
                    update.reps,
                    update.lapses,
                    update.ef,
                    update.interval_days,
                    due_at,
                    last_review_at,
                    update.last_grade,
                    update.correct_streak,
                    update.wrong_streak,
                    card_id
                ],
            )
            .map_err(StorageError::from)?;

            tx.execute(
                "INSERT INTO training_reviews (card_id, ts, grade, day) VALUES (?1, ?2, ?3, ?4)",
                params![card_id, last_review_at, update.last_grade, day],
            )
            .map_err(StorageError::from)?;

            if let Some(entry_id) = entry_id {
                tx.execute(
                    "UPDATE entries SET last_used = ?1, count = count + 1 WHERE id = ?2",
                    params![now_s, entry_id],
                )
                .map_err(StorageError::from)?;
            }
            Ok(())
        })
    }

    pub fn count_reviews_for_day(&self, day: &str) -> Result<i64> {
        self.db.read(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM training_reviews WHERE day = ?1",
                params![day],
                |row| row.get(0),
            )
            .map_err(StorageError::from)
        })
    }

    /// Distinct days that have at least one review, newest first.
    pub fn list_active_days_desc(&self, limit: i64) -> Result<Vec<String>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT day
                 FROM training_reviews
                 WHERE day IS NOT NULL
                 GROUP BY day
                 HAVING COUNT(*) > 0
                 ORDER BY day DESC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![limit], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(StorageError::from)?;
            Ok(rows)
        })
    }

    /// Mastery snapshot over non-suspended cards.
    pub fn deck_stats(&self, src_filter: Option<&str>, mastery_count: i64) -> Result<DeckStats> {
        self.db.read_tx(|tx| {
            let (total, mastered) = match src_filter {
                Some(src) => {
                    let total: i64 = tx
                        .query_row(
                            "SELECT COUNT(*) FROM training_cards WHERE suspended = 0 AND src_lang = ?1",
                            params![src],
                            |row| row.get(0),
                        )
                        .map_err(StorageError::from)?;
                    let mastered: i64 = tx
                        .query_row(
                            "SELECT COUNT(*) FROM training_cards
                             WHERE suspended = 0 AND src_lang = ?1 AND correct_streak >= ?2",
                            params![src, mastery_count],
                            |row| row.get(0),
                        )
                        .map_err(StorageError::from)?;
                    (total, mastered)
                }
                None => {
                    let total: i64 = tx
                        .query_row(
                            "SELECT COUNT(*) FROM training_cards WHERE suspended = 0",
                            [],
                            |row| row.get(0),
                        )
                        .map_err(StorageError::from)?;
                    let mastered: i64 = tx
                        .query_row(
                            "SELECT COUNT(*) FROM training_cards
                             WHERE suspended = 0 AND correct_streak >= ?1",
                            params![mastery_count],
                            |row| row.get(0),
                        )
                        .map_err(StorageError::from)?;
                    (total, mastered)
                }
            };

            let percent = if total > 0 {
                ((mastered as f64) * 100.0 / (total as f64)).round() as i64
            } else {
                0
            };

            Ok(DeckStats {
                total,
                mastered,
                mastery_threshold: mastery_count,
                mastery_percent: percent,
            })
        })
    }
}

#[derive(Clone, Copy)]
enum PoolKind {
    Due { now_ts: i64 },
    Hard,
}
