//! Trainer journey: pick, grade, progress, marks

use std::sync::Arc;

use vim_deepl_core::{AppError, Services};
use vim_deepl_e2e_tests::{FakeDictionary, FakeTranslator, test_config};

fn build_services() -> (tempfile::TempDir, Services) {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let services = Services::with_providers(
        &cfg,
        Arc::new(FakeTranslator::new("EN")),
        Arc::new(FakeDictionary::for_term("apple")),
    )
    .unwrap();
    (dir, services)
}

#[tokio::test]
async fn pick_review_next_journey() {
    let (_dir, services) = build_services();

    services
        .translation
        .put_entry("apple", "яблоко", "EN", "RU", None)
        .unwrap();

    // Fresh deck, new-card pool disabled: the fallback serves the entry and
    // lazily creates its card.
    let first = services.trainer.pick_training_word(Some("EN"), &[]).unwrap();
    assert_eq!(first.mode, Some("fallback"));
    assert_eq!(first.term, "apple");
    let card_id = first.card_id.expect("fallback ensures a card");
    let stats = first.stats.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(first.today_done, 0);

    // Grade it; the card schedules one day out and the review is on record.
    services.trainer.review_training_card(card_id, 5).unwrap();

    let next = services.trainer.pick_training_word(Some("EN"), &[]).unwrap();
    assert_eq!(next.card_id, Some(card_id));
    // Not due anymore, so the hard pool serves it.
    assert_eq!(next.mode, Some("srs_hard"));
    assert_eq!(next.reps, 1);
    assert_eq!(next.last_grade, Some(5));
    assert_eq!(next.interval_days, 1);
    assert_eq!(next.today_done, 1);
    assert_eq!(next.streak_days, 1);

    // Grading bumped the entry's usage exactly once.
    let entry = services.translation.get_entry("apple", "RU").unwrap();
    assert_eq!(entry.count, 3); // put(1) + review(1) + this get(1)
}

#[tokio::test]
async fn graded_review_is_the_only_usage_bump() {
    let (_dir, services) = build_services();
    services
        .translation
        .put_entry("apple", "яблоко", "EN", "RU", None)
        .unwrap();

    // Browsing the trainer repeatedly must not touch usage counters.
    for _ in 0..5 {
        let item = services.trainer.pick_training_word(Some("EN"), &[]).unwrap();
        assert!(item.error.is_none());
    }

    let entry = services.translation.get_entry("apple", "RU").unwrap();
    // put_entry wrote count=1; get_entry bumps by one. No trainer influence.
    assert_eq!(entry.count, 2);
}

#[tokio::test]
async fn due_card_wins_over_everything() {
    let (_dir, services) = build_services();
    services
        .translation
        .put_entry("due-word", "перевод", "EN", "RU", None)
        .unwrap();
    services
        .translation
        .put_entry("later-word", "перевод", "EN", "RU", None)
        .unwrap();

    // Create cards for both by picking twice with exclusions, then grade one
    // with a failing grade so it comes back due immediately tomorrow...
    let a = services.trainer.pick_training_word(Some("EN"), &[]).unwrap();
    let a_card = a.card_id.unwrap();
    let b = services
        .trainer
        .pick_training_word(Some("EN"), &[a_card])
        .unwrap();
    let b_card = b.card_id.unwrap();
    assert_ne!(a_card, b_card);

    // Grade only b; a's card keeps its due-now timestamp and must win.
    services.trainer.review_training_card(b_card, 5).unwrap();

    let next = services.trainer.pick_training_word(Some("EN"), &[]).unwrap();
    assert_eq!(next.mode, Some("srs_due"));
    assert_eq!(next.card_id, Some(a_card));
}

#[tokio::test]
async fn review_validation_and_suspension() {
    let (_dir, services) = build_services();
    services
        .translation
        .put_entry("apple", "яблоко", "EN", "RU", None)
        .unwrap();
    let item = services.trainer.pick_training_word(Some("EN"), &[]).unwrap();
    let card_id = item.card_id.unwrap();
    let entry_id = item.entry_id.unwrap();

    assert!(matches!(
        services.trainer.review_training_card(card_id, 9),
        Err(AppError::Args(_))
    ));

    // Ignoring the entry suspends its card; grading is then rejected.
    services
        .trainer
        .mark_ignore(None, Some(entry_id), "EN")
        .unwrap();
    assert!(matches!(
        services.trainer.review_training_card(card_id, 4),
        Err(AppError::Args(_))
    ));

    // And the deck is empty for the trainer.
    let item = services.trainer.pick_training_word(Some("EN"), &[]).unwrap();
    assert!(item.error.is_some());
}

#[tokio::test]
async fn mark_hard_raises_priority_counter() {
    let (_dir, services) = build_services();
    services
        .translation
        .put_entry("tricky", "хитрый", "EN", "RU", None)
        .unwrap();

    let ack = services.trainer.mark_hard("tricky", "EN").unwrap();
    assert_eq!(ack.hard, 1);
    let ack = services.trainer.mark_hard("tricky", "EN").unwrap();
    assert_eq!(ack.hard, 2);
}

#[tokio::test]
async fn trainer_item_carries_cached_metadata() {
    let (_dir, services) = build_services();

    // Translate once so definitions and a context land in the caches.
    services
        .translation
        .translate_word("apple", Some("RU"), "EN", Some("An apple fell down."))
        .await
        .unwrap();

    let item = services.trainer.pick_training_word(Some("EN"), &[]).unwrap();
    assert_eq!(item.term, "apple");
    assert_eq!(item.context_raw.as_deref(), Some("An apple fell down."));
    let defs = item.mw_definitions.expect("cached definitions attach");
    assert_eq!(defs.audio_main.as_deref(), Some("apple001"));
    assert_eq!(item.ctx_list, vec!["An apple fell down."]);
    let grammar = item.grammar.expect("grammar derives from raw_json");
    assert_eq!(grammar.word, "apple");
}
