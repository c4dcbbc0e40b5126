//! Translation cache journeys: base cache, context cache, eviction, errors

use std::sync::Arc;

use vim_deepl_core::Services;
use vim_deepl_e2e_tests::{FakeDictionary, FakeTranslator, test_config};

fn build_services(
    translator: Arc<FakeTranslator>,
    dictionary: Arc<FakeDictionary>,
) -> (tempfile::TempDir, Services) {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let services = Services::with_providers(&cfg, translator, dictionary).unwrap();
    (dir, services)
}

#[tokio::test]
async fn first_lookup_misses_then_hits_base_cache() {
    let translator = Arc::new(FakeTranslator::new("EN").with_response("apple", "яблоко"));
    let dictionary = Arc::new(FakeDictionary::for_term("apple"));
    let (_dir, services) = build_services(translator.clone(), dictionary.clone());

    let first = services
        .translation
        .translate_word("apple", Some("RU"), "EN", None)
        .await
        .unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.cache_source, None);
    assert_eq!(first.text, "яблоко");
    assert_eq!(first.detected_source_lang, "EN");
    assert_eq!(first.count, 1);
    let defs = first.mw_definitions.expect("EN words carry definitions");
    assert_eq!(defs.noun, vec!["definition of apple"]);
    assert_eq!(defs.audio_main.as_deref(), Some("apple001"));

    let second = services
        .translation
        .translate_word("apple", Some("RU"), "EN", None)
        .await
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(second.cache_source, Some("base"));
    assert_eq!(second.count, 2);
    assert_eq!(second.text, "яблоко");

    // One provider call total; the hit was served from SQLite. Dictionary
    // metadata was fetched once and cached too.
    assert_eq!(translator.call_count(), 1);
    assert_eq!(dictionary.call_count(), 1);
}

#[tokio::test]
async fn context_lookup_hits_context_cache() {
    let translator = Arc::new(FakeTranslator::new("EN").with_response("apple", "яблоко"));
    let dictionary = Arc::new(FakeDictionary::for_term("apple"));
    let (_dir, services) = build_services(translator.clone(), dictionary);

    let ctx = "I ate an apple today.";
    let first = services
        .translation
        .translate_word("apple", Some("RU"), "EN", Some(ctx))
        .await
        .unwrap();
    assert!(!first.from_cache);
    assert!(first.context_used);
    assert_eq!(first.context_raw.as_deref(), Some(ctx));

    let second = services
        .translation
        .translate_word("apple", Some("RU"), "EN", Some(ctx))
        .await
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(second.cache_source, Some("context"));
    assert_eq!(second.context_raw.as_deref(), Some(ctx));
    assert!(second.ctx_translations.contains(&"яблоко".to_string()));
    assert_eq!(translator.call_count(), 1);
}

#[tokio::test]
async fn context_miss_also_populates_base_cache() {
    let translator = Arc::new(FakeTranslator::new("EN").with_response("apple", "яблоко"));
    let dictionary = Arc::new(FakeDictionary::for_term("apple"));
    let (_dir, services) = build_services(translator.clone(), dictionary);

    services
        .translation
        .translate_word("apple", Some("RU"), "EN", Some("An apple a day."))
        .await
        .unwrap();

    // Context words stay browsable through the plain base cache.
    let base = services
        .translation
        .translate_word("apple", Some("RU"), "EN", None)
        .await
        .unwrap();
    assert!(base.from_cache);
    assert_eq!(base.cache_source, Some("base"));
    assert_eq!(translator.call_count(), 1);
}

#[tokio::test]
async fn fourth_context_evicts_oldest() {
    let translator = Arc::new(FakeTranslator::new("EN").with_response("apple", "яблоко"));
    let dictionary = Arc::new(FakeDictionary::for_term("apple"));
    let (_dir, services) = build_services(translator.clone(), dictionary);

    let contexts = [
        "First sentence with apple.",
        "Second sentence with apple.",
        "Third sentence with apple.",
        "Fourth sentence with apple.",
    ];
    for ctx in contexts {
        services
            .translation
            .translate_word("apple", Some("RU"), "EN", Some(ctx))
            .await
            .unwrap();
    }

    // The newest context is a cache hit...
    let newest = services
        .translation
        .translate_word("apple", Some("RU"), "EN", Some(contexts[3]))
        .await
        .unwrap();
    assert!(newest.from_cache);

    // ...the oldest was evicted (at most three rows are retained), so asking
    // for it again goes back to the provider.
    let calls_before = translator.call_count();
    let oldest = services
        .translation
        .translate_word("apple", Some("RU"), "EN", Some(contexts[0]))
        .await
        .unwrap();
    assert!(!oldest.from_cache);
    assert_eq!(translator.call_count(), calls_before + 1);
}

#[tokio::test]
async fn provider_error_returns_payload_and_writes_nothing() {
    let translator = Arc::new(FakeTranslator::failing("DeepL request error: boom"));
    let dictionary = Arc::new(FakeDictionary::for_term("apple"));
    let (_dir, services) = build_services(translator, dictionary);

    let result = services
        .translation
        .translate_word("apple", Some("RU"), "EN", None)
        .await
        .unwrap();
    assert_eq!(result.error.as_deref(), Some("DeepL request error: boom"));
    assert!(result.text.is_empty());
    assert!(!result.from_cache);
    assert_eq!(result.count, 0);
    assert_eq!(result.cache_source, None);

    // The failed lookup must not have cached anything.
    let err = services.translation.get_entry("apple", "RU").unwrap_err();
    assert!(matches!(err, vim_deepl_core::AppError::NotFound(_)));
}

#[tokio::test]
async fn selection_is_a_cacheless_passthrough() {
    let translator = Arc::new(FakeTranslator::new("DA"));
    let dictionary = Arc::new(FakeDictionary::suggestions(&[]));
    let (_dir, services) = build_services(translator.clone(), dictionary);

    let result = services
        .translation
        .translate_selection("Jeg har en\n  hund", None, "DA")
        .await
        .unwrap();
    assert_eq!(result.kind, "selection");
    assert_eq!(result.source, "Jeg har en hund");
    assert_eq!(result.target_lang, "RU");
    assert_eq!(result.detected_source_lang, "DA");
    assert!(result.error.is_none());

    // Same selection again still calls the provider: nothing was cached.
    services
        .translation
        .translate_selection("Jeg har en hund", None, "DA")
        .await
        .unwrap();
    assert_eq!(translator.call_count(), 2);
}
