//! Dictionary-metadata service: lazy lookup/insert of MW definition sets
//!
//! Runs only for English terms. Old cache rows that predate audio extraction
//! are backfilled from their stored `raw_json` without touching the provider.
//! Every read schedules a non-blocking prefetch of the main audio clip.

use std::sync::Arc;

use tracing::warn;

use crate::audio::Prefetcher;
use crate::error::{AppError, Result};
use crate::providers::{DictionaryProvider, mw_parse};
use crate::repos::{DefinitionSet, DefinitionsRepo};

use super::now_str;

#[derive(Clone)]
pub struct DefinitionsService {
    repo: DefinitionsRepo,
    provider: Arc<dyn DictionaryProvider>,
    prefetcher: Prefetcher,
}

impl DefinitionsService {
    pub fn new(
        repo: DefinitionsRepo,
        provider: Arc<dyn DictionaryProvider>,
        prefetcher: Prefetcher,
    ) -> Self {
        Self {
            repo,
            provider,
            prefetcher,
        }
    }

    /// Cached definitions for a term, fetching from the provider on first
    /// sight. Provider failures are logged and reported as "no metadata";
    /// the translation flow stays usable without it.
    pub async fn ensure_definitions(
        &self,
        term: &str,
        src_lang: &str,
    ) -> Result<Option<DefinitionSet>> {
        let src_u = src_lang.trim().to_uppercase();
        if src_u != "EN" {
            return Ok(None);
        }

        if let Some(mut cached) = self.repo.get(term, &src_u)? {
            if cached.audio_ids.is_empty() {
                if let Some(backfilled) = self.backfill_audio(term, &src_u, &cached)? {
                    cached = backfilled;
                }
            }
            self.prefetcher.spawn(cached.audio_main.as_deref());
            return Ok(Some(cached));
        }

        let data = match self.provider.lookup(term).await {
            Ok(data) => data,
            Err(AppError::Provider(msg)) => {
                warn!(term, src_lang = %src_u, "MW fetch failed: {msg}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let Some(defs) = mw_parse::parse_definition_set(&data, term) else {
            warn!(term, "MW response had an unusable shape");
            return Ok(None);
        };

        self.repo.upsert(term, &src_u, &defs, &now_str())?;
        self.prefetcher.spawn(defs.audio_main.as_deref());
        Ok(self.repo.get(term, &src_u)?)
    }

    /// Re-derive `audio_main`/`audio_ids` from the stored payload. Only
    /// attempted when the payload parses as a list of entry objects.
    fn backfill_audio(
        &self,
        term: &str,
        src_u: &str,
        cached: &DefinitionSet,
    ) -> Result<Option<DefinitionSet>> {
        let Some(raw) = cached.raw_json.as_deref().filter(|r| !r.is_empty()) else {
            return Ok(None);
        };
        let Ok(parsed) = serde_json::from_str::<serde_json::Value>(raw) else {
            return Ok(None);
        };
        let Some(entries) = parsed.as_array() else {
            return Ok(None);
        };
        if entries.is_empty() || !entries[0].is_object() {
            return Ok(None);
        }

        let (audio_main, audio_ids) = mw_parse::extract_audio(entries, term);
        if audio_main.is_none() && audio_ids.is_empty() {
            return Ok(None);
        }

        let mut patched = cached.clone();
        patched.audio_main = audio_main;
        patched.audio_ids = audio_ids;
        self.repo.upsert(term, src_u, &patched, &now_str())?;
        Ok(self.repo.get(term, src_u)?)
    }
}
