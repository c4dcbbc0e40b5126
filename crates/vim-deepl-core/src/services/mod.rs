//! Services - business logic over the repositories
//!
//! [`Services`] is the composition root: built once at process start, it owns
//! the database handle, the repositories, the provider objects and the audio
//! worker, and hands out the service values everything else calls into.

pub mod bookmarks;
pub mod definitions;
pub mod trainer;
pub mod translation;

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::audio::{AudioCache, AudioWorker, Prefetcher};
use crate::config::Config;
use crate::error::Result;
use crate::providers::{DeepL, DictionaryProvider, MerriamWebster, Translator};
use crate::repos::{BookmarksRepo, DefinitionsRepo, TrainerRepo, TranslationRepo};
use crate::storage::Database;

pub use bookmarks::{BookmarksService, MarkAck, MarkItem, MarkList};
pub use definitions::DefinitionsService;
pub use trainer::{IgnoreAck, MarkHardAck, Progress, TrainerItem, TrainerService};
pub use translation::{SelectionResult, TranslationService, WordResult};

/// Textual timestamp format used for `created_at`/`last_used` columns.
pub(crate) const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn now_str() -> String {
    Utc::now().format(TS_FORMAT).to_string()
}

pub(crate) fn today_str(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Parse a stored textual timestamp, falling back to the epoch for anything
/// unreadable (legacy rows carried a few divergent formats).
pub(crate) fn parse_dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .unwrap_or(NaiveDateTime::UNIX_EPOCH)
}

/// Composition root
pub struct Services {
    pub translation: TranslationService,
    pub definitions: DefinitionsService,
    pub trainer: TrainerService,
    pub bookmarks: BookmarksService,
    pub audio_cache: Arc<AudioCache>,
    pub audio_worker: AudioWorker,
}

impl Services {
    /// Wire everything with the production providers.
    pub fn new(cfg: &Config) -> Result<Self> {
        let translator: Arc<dyn Translator> =
            Arc::new(DeepL::new(cfg.deepl_api_key.clone(), cfg.http_timeout));
        let dictionary: Arc<dyn DictionaryProvider> =
            Arc::new(MerriamWebster::new(cfg.mw_api_key.clone(), cfg.http_timeout));
        Self::with_providers(cfg, translator, dictionary)
    }

    /// Wire with injected providers; tests swap in fixed-response fakes.
    pub fn with_providers(
        cfg: &Config,
        translator: Arc<dyn Translator>,
        dictionary: Arc<dyn DictionaryProvider>,
    ) -> Result<Self> {
        let db = Arc::new(Database::open(&cfg.db_path)?);

        let translation_repo = TranslationRepo::new(db.clone());
        let definitions_repo = DefinitionsRepo::new(db.clone());
        let trainer_repo = TrainerRepo::new(db.clone());
        let bookmarks_repo = BookmarksRepo::new(db);

        let audio_cache = Arc::new(AudioCache::new(cfg.audio_cache_dir(), cfg.http_timeout));
        let prefetcher = Prefetcher::new(audio_cache.clone());
        let audio_worker = AudioWorker::spawn();

        let definitions =
            DefinitionsService::new(definitions_repo.clone(), dictionary, prefetcher);
        let translation =
            TranslationService::new(translation_repo.clone(), definitions.clone(), translator);
        let trainer = TrainerService::new(
            trainer_repo,
            translation_repo,
            definitions_repo,
            cfg.trainer.clone(),
        );
        let bookmarks = BookmarksService::new(bookmarks_repo);

        Ok(Self {
            translation,
            definitions,
            trainer,
            bookmarks,
            audio_cache,
            audio_worker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_dt_falls_back_to_epoch() {
        assert_eq!(parse_dt("garbage"), NaiveDateTime::UNIX_EPOCH);
        let dt = parse_dt("2025-01-01 12:00:00");
        assert_eq!(dt.format(TS_FORMAT).to_string(), "2025-01-01 12:00:00");
    }
}
