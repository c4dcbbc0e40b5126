//! Upstream providers behind capability interfaces
//!
//! Services only see the [`Translator`] and [`DictionaryProvider`] traits, so
//! tests swap the real HTTP clients for fixed-response fakes.

pub mod deepl;
pub mod merriam;
pub mod mw_parse;

use async_trait::async_trait;

use crate::error::Result;

pub use deepl::DeepL;
pub use merriam::MerriamWebster;

/// One translation from the upstream provider
#[derive(Debug, Clone)]
pub struct Translation {
    pub text: String,
    pub detected_source_lang: String,
}

/// Sentence/word translation capability (DeepL in production)
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target_lang`, optionally disambiguated by the
    /// surrounding sentence.
    async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        context: Option<&str>,
    ) -> Result<Translation>;
}

/// Dictionary metadata capability (Merriam-Webster sd3 in production)
#[async_trait]
pub trait DictionaryProvider: Send + Sync {
    /// Raw provider response for a term: either an array of entry objects or
    /// an array of suggestion strings.
    async fn lookup(&self, term: &str) -> Result<serde_json::Value>;
}
