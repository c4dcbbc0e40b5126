//! Translation service: cache lookup, provider call, normalization, write-back
//!
//! Two paths: context mode (the selection came with its sentence) goes through
//! `entries_ctx` keyed by a hash of the normalized sentence; base mode uses
//! the plain `(term, src, dst)` cache. Provider errors come back inside the
//! result payload with every cache field zeroed; nothing is written.

use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::providers::Translator;
use crate::repos::{DefinitionSet, Entry, TranslationRepo};

use super::definitions::DefinitionsService;
use super::now_str;

/// Word translation result; the field set is stable regardless of outcome.
#[derive(Debug, Clone, Serialize)]
pub struct WordResult {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub source: String,
    pub text: String,
    pub target_lang: String,
    pub detected_source_lang: String,
    pub from_cache: bool,
    pub timestamp: String,
    pub last_used: String,
    pub count: i64,
    pub error: Option<String>,
    pub mw_definitions: Option<DefinitionSet>,
    pub context_used: bool,
    pub cache_source: Option<&'static str>,
    pub context_raw: Option<String>,
    pub ctx_translations: Vec<String>,
}

/// Selection translation result (no caching)
#[derive(Debug, Clone, Serialize)]
pub struct SelectionResult {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub source: String,
    pub text: String,
    pub target_lang: String,
    pub detected_source_lang: String,
    pub error: Option<String>,
}

/// Hex SHA-256 over the whitespace-normalized sentence.
pub fn ctx_hash(ctx_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ctx_text.trim().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Map the provider's detected language onto the two languages this cache
/// distinguishes: `EN*` and `DA*` pass through, anything else falls back to
/// the user's hint, then to EN.
pub fn normalize_src_lang(detected: &str, src_hint: &str) -> String {
    let code = detected.to_uppercase();
    let hint = src_hint.to_uppercase();

    if code.starts_with("EN") {
        return "EN".to_string();
    }
    if code.starts_with("DA") {
        return "DA".to_string();
    }
    if hint == "EN" || hint == "DA" {
        return hint;
    }
    "EN".to_string()
}

fn is_latin_word(term: &str) -> bool {
    let mut chars = term.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphabetic() || c == '\'' || c == '-')
}

/// Source language used for the MW lookup: explicit hint, then the detected
/// language, then a latin-word heuristic.
fn mw_src_lang(term: &str, src_hint: &str, detected: &str) -> String {
    if !src_hint.is_empty() {
        return src_hint.to_uppercase();
    }
    if !detected.is_empty() {
        return detected.to_uppercase();
    }
    if is_latin_word(term) {
        return "EN".to_string();
    }
    String::new()
}

fn normalize_ctx(context: Option<&str>) -> String {
    context
        .unwrap_or("")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone)]
pub struct TranslationService {
    repo: TranslationRepo,
    definitions: DefinitionsService,
    translator: Arc<dyn Translator>,
}

impl TranslationService {
    pub fn new(
        repo: TranslationRepo,
        definitions: DefinitionsService,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            repo,
            definitions,
            translator,
        }
    }

    /// Translate a single word with caching. `target_lang` defaults to RU.
    pub async fn translate_word(
        &self,
        word: &str,
        target_lang: Option<&str>,
        src_hint: &str,
        context: Option<&str>,
    ) -> Result<WordResult> {
        let target_lang = target_lang
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("RU")
            .to_uppercase();
        let now_s = now_str();
        let ctx_text = normalize_ctx(context);

        if !ctx_text.is_empty() {
            self.translate_word_ctx(word, &target_lang, src_hint, &ctx_text, &now_s)
                .await
        } else {
            self.translate_word_base(word, &target_lang, src_hint, &now_s)
                .await
        }
    }

    async fn translate_word_ctx(
        &self,
        word: &str,
        target_lang: &str,
        src_hint: &str,
        ctx_text: &str,
        now_s: &str,
    ) -> Result<WordResult> {
        let src_expected = {
            let hint = src_hint.to_uppercase();
            if hint.is_empty() { "EN".to_string() } else { hint }
        };
        let src_for_mw = mw_src_lang(word, src_hint, &src_expected);
        let h = ctx_hash(ctx_text);

        if let Some(cached) = self.repo.get_ctx_entry(word, Some(&src_expected), target_lang, &h)? {
            self.repo
                .touch_ctx_usage(word, &cached.src_lang, target_lang, &h, now_s)?;

            // Keep the base cache browsable even for words only ever seen in context.
            if self.repo.get_base_entry_any_src(word, target_lang, None)?.is_none() {
                self.repo.upsert_base_entry(
                    word,
                    &cached.translation,
                    &cached.src_lang,
                    target_lang,
                    "",
                    now_s,
                    Some(ctx_text),
                )?;
            }

            let mw_defs = self.definitions.ensure_definitions(word, &src_for_mw).await?;
            let alts = self
                .repo
                .list_ctx_translations(word, &cached.src_lang, target_lang, 10)?;

            let context_raw = if cached.ctx_text.is_empty() {
                ctx_text.to_string()
            } else {
                cached.ctx_text.clone()
            };

            return Ok(WordResult {
                kind: "word",
                source: word.to_string(),
                text: cached.translation,
                target_lang: target_lang.to_string(),
                detected_source_lang: cached.src_lang,
                from_cache: true,
                timestamp: cached.created_at,
                last_used: now_s.to_string(),
                count: cached.count + 1,
                error: None,
                mw_definitions: mw_defs,
                context_used: true,
                cache_source: Some("context"),
                context_raw: Some(context_raw),
                ctx_translations: alts,
            });
        }

        let translated = match self
            .translator
            .translate(word, target_lang, Some(ctx_text))
            .await
        {
            Ok(t) => t,
            Err(AppError::Provider(msg)) => {
                return Ok(Self::error_result(word, target_lang, now_s, msg, true, Some(ctx_text)));
            }
            Err(e) => return Err(e),
        };

        let src = normalize_src_lang(&translated.detected_source_lang, src_hint);

        // Base entry first (context words stay searchable in the base cache),
        // then the context row itself.
        self.repo.upsert_base_entry(
            word,
            &translated.text,
            &src,
            target_lang,
            &translated.detected_source_lang,
            now_s,
            Some(ctx_text),
        )?;
        self.repo
            .upsert_ctx_entry(word, &translated.text, &src, target_lang, &h, now_s, ctx_text)?;

        let alts = self.repo.list_ctx_translations(word, &src, target_lang, 10)?;
        let mw_defs = self.definitions.ensure_definitions(word, &src).await?;

        Ok(WordResult {
            kind: "word",
            source: word.to_string(),
            text: translated.text,
            target_lang: target_lang.to_string(),
            detected_source_lang: src,
            from_cache: false,
            timestamp: now_s.to_string(),
            last_used: now_s.to_string(),
            count: 1,
            error: None,
            mw_definitions: mw_defs,
            context_used: true,
            cache_source: None,
            context_raw: Some(ctx_text.to_string()),
            ctx_translations: alts,
        })
    }

    async fn translate_word_base(
        &self,
        word: &str,
        target_lang: &str,
        src_hint: &str,
        now_s: &str,
    ) -> Result<WordResult> {
        let hint = if src_hint.trim().is_empty() { None } else { Some(src_hint) };

        if let Some(row) = self.repo.get_base_entry_any_src(word, target_lang, hint)? {
            self.repo.touch_base_usage(row.id, now_s)?;

            let src_for_mw = mw_src_lang(word, src_hint, &row.src_lang);
            let mw_defs = self.definitions.ensure_definitions(word, &src_for_mw).await?;
            let alts = self
                .repo
                .list_ctx_translations(word, &row.src_lang, target_lang, 10)?;

            return Ok(WordResult {
                kind: "word",
                source: word.to_string(),
                text: row.translation,
                target_lang: target_lang.to_string(),
                detected_source_lang: row.src_lang,
                from_cache: true,
                timestamp: row.created_at,
                last_used: now_s.to_string(),
                count: row.count + 1,
                error: None,
                mw_definitions: mw_defs,
                context_used: false,
                cache_source: Some("base"),
                context_raw: None,
                ctx_translations: alts,
            });
        }

        let translated = match self.translator.translate(word, target_lang, None).await {
            Ok(t) => t,
            Err(AppError::Provider(msg)) => {
                return Ok(Self::error_result(word, target_lang, now_s, msg, false, None));
            }
            Err(e) => return Err(e),
        };

        let src = normalize_src_lang(&translated.detected_source_lang, src_hint);
        self.repo.upsert_base_entry(
            word,
            &translated.text,
            &src,
            target_lang,
            &translated.detected_source_lang,
            now_s,
            None,
        )?;

        let mw_defs = self.definitions.ensure_definitions(word, &src).await?;

        Ok(WordResult {
            kind: "word",
            source: word.to_string(),
            text: translated.text,
            target_lang: target_lang.to_string(),
            detected_source_lang: src,
            from_cache: false,
            timestamp: now_s.to_string(),
            last_used: now_s.to_string(),
            count: 1,
            error: None,
            mw_definitions: mw_defs,
            context_used: false,
            cache_source: None,
            context_raw: None,
            ctx_translations: Vec::new(),
        })
    }

    fn error_result(
        word: &str,
        target_lang: &str,
        now_s: &str,
        error: String,
        context_used: bool,
        ctx_text: Option<&str>,
    ) -> WordResult {
        WordResult {
            kind: "word",
            source: word.to_string(),
            text: String::new(),
            target_lang: target_lang.to_string(),
            detected_source_lang: String::new(),
            from_cache: false,
            timestamp: now_s.to_string(),
            last_used: now_s.to_string(),
            count: 0,
            error: Some(error),
            mw_definitions: None,
            context_used,
            cache_source: None,
            context_raw: ctx_text.map(|c| c.to_string()),
            ctx_translations: Vec::new(),
        }
    }

    /// Translate an arbitrary fragment. Pure provider passthrough, no cache.
    pub async fn translate_selection(
        &self,
        text: &str,
        target_lang: Option<&str>,
        src_hint: &str,
    ) -> Result<SelectionResult> {
        let target_lang = target_lang
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("RU")
            .to_uppercase();
        let one_line = normalize_ctx(Some(text));

        let translated = match self.translator.translate(&one_line, &target_lang, None).await {
            Ok(t) => t,
            Err(AppError::Provider(msg)) => {
                return Ok(SelectionResult {
                    kind: "selection",
                    source: one_line,
                    text: String::new(),
                    target_lang,
                    detected_source_lang: String::new(),
                    error: Some(msg),
                });
            }
            Err(e) => return Err(e),
        };

        let src = normalize_src_lang(&translated.detected_source_lang, src_hint);
        Ok(SelectionResult {
            kind: "selection",
            source: one_line,
            text: translated.text,
            target_lang,
            detected_source_lang: src,
            error: None,
        })
    }

    // -------------------------
    // Base cache passthroughs for the /entries endpoints
    // -------------------------

    /// Cached entry lookup; touches usage like the legacy endpoint did.
    pub fn get_entry(&self, term: &str, dst_lang: &str) -> Result<Entry> {
        let row = self
            .repo
            .get_base_entry_any_src(term, &dst_lang.to_uppercase(), None)?
            .ok_or_else(|| AppError::NotFound("Not found".to_string()))?;
        let now_s = now_str();
        self.repo.touch_base_usage(row.id, &now_s)?;
        Ok(Entry {
            count: row.count + 1,
            last_used: Some(now_s),
            ..row
        })
    }

    /// Manual entry upsert (editor-side import path).
    pub fn put_entry(
        &self,
        term: &str,
        translation: &str,
        src_lang: &str,
        dst_lang: &str,
        detected_raw: Option<&str>,
    ) -> Result<()> {
        let src = src_lang.to_uppercase();
        let detected = detected_raw.unwrap_or(&src).to_string();
        self.repo.upsert_base_entry(
            term,
            translation,
            &src,
            &dst_lang.to_uppercase(),
            &detected,
            &now_str(),
            None,
        )?;
        Ok(())
    }

    /// Mark an entry as used (bumps `count`, stamps `last_used`).
    pub fn mark_used(&self, term: &str, dst_lang: &str) -> Result<()> {
        let row = self
            .repo
            .get_base_entry_any_src(term, &dst_lang.to_uppercase(), None)?
            .ok_or_else(|| AppError::NotFound("Not found".to_string()))?;
        self.repo.touch_base_usage(row.id, &now_str())?;
        Ok(())
    }

    /// Marks used by the trainer endpoints.
    pub fn mark_hard(&self, word: &str, src_lang: &str) -> Result<Option<i64>> {
        Ok(self.repo.inc_hard_and_get(word, src_lang)?)
    }

    pub fn mark_ignore(&self, word: &str, src_lang: &str) -> Result<usize> {
        Ok(self.repo.set_ignore(word, src_lang)?)
    }

    pub fn mark_ignore_by_entry_id(&self, entry_id: i64) -> Result<usize> {
        Ok(self.repo.set_ignore_by_entry_id(entry_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctx_hash_is_stable_sha256() {
        let h = ctx_hash("I ate an apple today.");
        assert_eq!(h.len(), 64);
        assert_eq!(h, ctx_hash("I ate an apple today."));
        assert_ne!(h, ctx_hash("Something else."));
    }

    #[test]
    fn normalize_src_lang_rules() {
        assert_eq!(normalize_src_lang("EN-GB", ""), "EN");
        assert_eq!(normalize_src_lang("DA", "EN"), "DA");
        assert_eq!(normalize_src_lang("NL", "DA"), "DA");
        assert_eq!(normalize_src_lang("SV", ""), "EN");
        assert_eq!(normalize_src_lang("", "en"), "EN");
    }

    #[test]
    fn mw_src_lang_priority() {
        assert_eq!(mw_src_lang("apple", "da", "EN"), "DA");
        assert_eq!(mw_src_lang("apple", "", "EN"), "EN");
        assert_eq!(mw_src_lang("apple", "", ""), "EN");
        assert_eq!(mw_src_lang("яблоко", "", ""), "");
    }

    #[test]
    fn latin_word_heuristic() {
        assert!(is_latin_word("don't"));
        assert!(is_latin_word("well-known"));
        assert!(!is_latin_word("'tis"));
        assert!(!is_latin_word("яблоко"));
    }
}
