//! Merriam-Webster definition cache
//!
//! One row per `(term, src_lang)`. Part-of-speech buckets and the audio id
//! list are stored as JSON-encoded text columns; `raw_json` keeps the
//! provider response verbatim for forensics and audio backfill.

use std::sync::Arc;

use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::storage::{Database, Result, StorageError};

/// Definitions grouped by part of speech, plus pronunciation audio ids
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionSet {
    pub noun: Vec<String>,
    pub verb: Vec<String>,
    pub adjective: Vec<String>,
    pub adverb: Vec<String>,
    pub other: Vec<String>,
    pub raw_json: Option<String>,
    pub audio_main: Option<String>,
    pub audio_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

fn decode_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn encode_list(list: &[String]) -> Option<String> {
    if list.is_empty() {
        None
    } else {
        serde_json::to_string(list).ok()
    }
}

/// Typed access to `mw_definitions`
#[derive(Clone)]
pub struct DefinitionsRepo {
    db: Arc<Database>,
}

impl DefinitionsRepo {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn get(&self, term: &str, src_lang: &str) -> Result<Option<DefinitionSet>> {
        self.db.read(|conn| {
            conn.query_row(
                "SELECT defs_noun, defs_verb, defs_adj, defs_adv, defs_other,
                        raw_json, audio_main, audio_ids, created_at
                 FROM mw_definitions
                 WHERE term = ?1 AND src_lang = ?2
                 LIMIT 1",
                params![term, src_lang],
                |row| {
                    Ok(DefinitionSet {
                        noun: decode_list(row.get(0)?),
                        verb: decode_list(row.get(1)?),
                        adjective: decode_list(row.get(2)?),
                        adverb: decode_list(row.get(3)?),
                        other: decode_list(row.get(4)?),
                        raw_json: row.get(5)?,
                        audio_main: row.get(6)?,
                        audio_ids: decode_list(row.get(7)?),
                        created_at: row.get(8)?,
                    })
                },
            )
            .optional()
            .map_err(StorageError::from)
        })
    }

    /// Insert or refresh a definition set. `created_at` is written once on
    /// first insert and left untouched on conflict.
    pub fn upsert(&self, term: &str, src_lang: &str, defs: &DefinitionSet, now_s: &str) -> Result<()> {
        self.db.write_tx(|tx| {
            tx.execute(
                "INSERT INTO mw_definitions (
                    term, src_lang,
                    defs_noun, defs_verb, defs_adj, defs_adv, defs_other,
                    raw_json, audio_main, audio_ids, created_at
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(term, src_lang) DO UPDATE SET
                    defs_noun  = excluded.defs_noun,
                    defs_verb  = excluded.defs_verb,
                    defs_adj   = excluded.defs_adj,
                    defs_adv   = excluded.defs_adv,
                    defs_other = excluded.defs_other,
                    raw_json   = excluded.raw_json,
                    audio_main = excluded.audio_main,
                    audio_ids  = excluded.audio_ids",
                params![
                    term,
                    src_lang,
                    encode_list(&defs.noun),
                    encode_list(&defs.verb),
                    encode_list(&defs.adjective),
                    encode_list(&defs.adverb),
                    encode_list(&defs.other),
                    defs.raw_json,
                    defs.audio_main,
                    serde_json::to_string(&defs.audio_ids).ok(),
                    now_s
                ],
            )
            .map_err(StorageError::from)?;
            Ok(())
        })
    }
}
