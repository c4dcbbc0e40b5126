//! Shared test harness: fixed-response provider fakes and config builders

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use vim_deepl_core::{
    AppError, Config, DictionaryProvider, TrainerConfig, Translation, Translator,
};

/// Config pointing at a temp dir; the new-card pool is disabled so trainer
/// tests are deterministic.
pub fn test_config(dir: &Path) -> Config {
    Config {
        data_dir: dir.to_path_buf(),
        db_path: dir.join("vocab.db"),
        log_path: dir.join("vim-deepl.log"),
        log_level: "INFO".to_string(),
        deepl_api_key: None,
        mw_api_key: None,
        http_timeout: Duration::from_secs(1),
        http_host: "127.0.0.1".to_string(),
        http_port: 0,
        trainer: TrainerConfig {
            srs_new_ratio: 0.0,
            ..TrainerConfig::default()
        },
    }
}

/// Translator fake with a per-term response table and a call counter.
pub struct FakeTranslator {
    pub detected: String,
    pub responses: Mutex<HashMap<String, String>>,
    pub calls: AtomicUsize,
    pub fail_with: Option<String>,
}

impl FakeTranslator {
    pub fn new(detected: &str) -> Self {
        Self {
            detected: detected.to_string(),
            responses: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            fail_with: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new("EN")
        }
    }

    pub fn with_response(self, term: &str, translation: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(term.to_string(), translation.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(
        &self,
        text: &str,
        _target_lang: &str,
        _context: Option<&str>,
    ) -> Result<Translation, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = &self.fail_with {
            return Err(AppError::Provider(msg.clone()));
        }
        let translated = self
            .responses
            .lock()
            .unwrap()
            .get(text)
            .cloned()
            .unwrap_or_else(|| format!("{text}-translated"));
        Ok(Translation {
            text: translated,
            detected_source_lang: self.detected.clone(),
        })
    }
}

/// Dictionary fake returning one canned MW entry list for every term.
pub struct FakeDictionary {
    pub value: serde_json::Value,
    pub calls: AtomicUsize,
}

impl FakeDictionary {
    /// A minimal but realistic sd3 entry for `term`.
    pub fn for_term(term: &str) -> Self {
        Self {
            value: json!([{
                "meta": { "id": term, "stems": [term] },
                "hwi": {
                    "hw": term,
                    "prs": [{ "mw": term, "sound": { "audio": format!("{term}001") } }]
                },
                "fl": "noun",
                "shortdef": [format!("definition of {term}")]
            }]),
            calls: AtomicUsize::new(0),
        }
    }

    /// Suggestions-mode response (unknown word).
    pub fn suggestions(words: &[&str]) -> Self {
        Self {
            value: json!(words),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DictionaryProvider for FakeDictionary {
    async fn lookup(&self, _term: &str) -> Result<serde_json::Value, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.value.clone())
    }
}
