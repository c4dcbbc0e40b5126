//! Database Migrations
//!
//! Versioned schema, keyed by `PRAGMA user_version`. Each migration runs at
//! most once; the DDL itself stays idempotent (`IF NOT EXISTS`) so databases
//! created by older builds that predate user_version tracking migrate cleanly.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Translation caches: base entries, variants, context entries, MW definitions",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Trainer: SM-2 cards and immutable review log",
        up: MIGRATION_V2_UP,
    },
    Migration {
        version: 3,
        description: "Reading bookmarks addressed by path and file fingerprint",
        up: MIGRATION_V3_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Translation caches
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    term         TEXT NOT NULL,
    translation  TEXT NOT NULL,
    src_lang     TEXT NOT NULL,
    dst_lang     TEXT NOT NULL,
    detected_raw TEXT,
    created_at   TEXT NOT NULL,
    last_used    TEXT,
    count        INTEGER NOT NULL DEFAULT 0,
    hard         INTEGER NOT NULL DEFAULT 0,
    ignore       INTEGER NOT NULL DEFAULT 0,
    UNIQUE(term, src_lang, dst_lang)
);

CREATE INDEX IF NOT EXISTS idx_entries_src_ignore ON entries(src_lang, ignore);

-- Accumulated translation variants (multiple meanings per term)
CREATE TABLE IF NOT EXISTS entry_translations (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    term         TEXT NOT NULL,
    translation  TEXT NOT NULL,
    src_lang     TEXT NOT NULL,
    dst_lang     TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    last_used    TEXT,
    count        INTEGER NOT NULL DEFAULT 0,
    UNIQUE(term, src_lang, dst_lang, translation)
);

CREATE INDEX IF NOT EXISTS idx_entry_translations_lookup
    ON entry_translations(term, src_lang, dst_lang);

-- Context cache: at most three rows per (term, src_lang, dst_lang)
CREATE TABLE IF NOT EXISTS entries_ctx (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    term         TEXT NOT NULL,
    translation  TEXT NOT NULL,
    src_lang     TEXT NOT NULL,
    dst_lang     TEXT NOT NULL,
    ctx_hash     TEXT NOT NULL,
    ctx_text     TEXT,
    created_at   TEXT NOT NULL,
    last_used    TEXT,
    count        INTEGER NOT NULL DEFAULT 0,
    UNIQUE(term, src_lang, dst_lang, ctx_hash)
);

CREATE INDEX IF NOT EXISTS idx_entries_ctx_lookup
    ON entries_ctx(term, src_lang, dst_lang, ctx_hash);

-- Merriam-Webster definitions (per term, per src_lang; POS buckets are JSON lists)
CREATE TABLE IF NOT EXISTS mw_definitions (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    term       TEXT NOT NULL,
    src_lang   TEXT NOT NULL,
    defs_noun  TEXT,
    defs_verb  TEXT,
    defs_adj   TEXT,
    defs_adv   TEXT,
    defs_other TEXT,
    raw_json   TEXT,
    audio_main TEXT,
    audio_ids  TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(term, src_lang)
);

CREATE INDEX IF NOT EXISTS idx_mw_def_term_src ON mw_definitions(term, src_lang);
"#;

/// V2: Trainer state
const MIGRATION_V2_UP: &str = r#"
-- SM-2 card state; at most one card per entry. Timestamps are unix seconds.
CREATE TABLE IF NOT EXISTS training_cards (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id       INTEGER NOT NULL UNIQUE REFERENCES entries(id),
    src_lang       TEXT,
    reps           INTEGER NOT NULL DEFAULT 0,
    lapses         INTEGER NOT NULL DEFAULT 0,
    ef             REAL NOT NULL DEFAULT 2.5,
    interval_days  INTEGER NOT NULL DEFAULT 0,
    due_at         INTEGER,
    last_review_at INTEGER,
    last_grade     INTEGER,
    correct_streak INTEGER NOT NULL DEFAULT 0,
    wrong_streak   INTEGER NOT NULL DEFAULT 0,
    suspended      INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_training_cards_due ON training_cards(due_at);

-- Immutable review log, one row per graded review
CREATE TABLE IF NOT EXISTS training_reviews (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    card_id INTEGER NOT NULL,
    ts      INTEGER NOT NULL,
    grade   INTEGER NOT NULL,
    day     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_training_reviews_day ON training_reviews(day);
"#;

/// V3: Reading bookmarks
const MIGRATION_V3_UP: &str = r#"
CREATE TABLE IF NOT EXISTS book_marks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    path        TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    lnum        INTEGER NOT NULL,
    col         INTEGER NOT NULL,
    length      INTEGER NOT NULL,
    term        TEXT NOT NULL,
    kind        TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE(path, lnum, col, kind)
);

CREATE INDEX IF NOT EXISTS idx_book_marks_fingerprint ON book_marks(fingerprint);
"#;

/// Get current schema version from the database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

/// Apply pending migrations; returns the number applied
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );
            conn.execute_batch(migration.up)?;
            conn.pragma_update(None, "user_version", migration.version)?;
            applied += 1;
        }
    }

    Ok(applied)
}
