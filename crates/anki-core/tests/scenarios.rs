//! End-to-end coverage of `spec.md` §8's concrete scenarios and quantified
//! invariants, exercised against a real (migrated) SQLite pool the way
//! the teacher's own `#[sqlx::test]` suite does, rather than mocking the
//! database.

use anki_core::model::CardState;
use anki_core::repository;
use anki_core::schema::{AddNoteRequest, CreateDeckRequest, ExportFormat, ImportFormat, ImportRequest};
use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::SqlitePool;

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

/// Scenario 1: creating a deck returns id 1 and shows up in `list_decks`
/// with no parent.
#[sqlx::test]
async fn scenario_1_create_deck(pool: SqlitePool) {
    let deck = repository::deck::create_deck(
        &pool,
        CreateDeckRequest {
            name: "Spanish::Basics".to_string(),
            parent_id: None,
        },
        now(),
    )
    .await
    .unwrap();
    assert_eq!(deck.id, 1);

    let decks = repository::deck::list_decks(&pool).await.unwrap();
    assert_eq!(decks.len(), 1);
    assert_eq!(decks[0].name, "Spanish::Basics");
    assert_eq!(decks[0].parent_id, None);
}

/// Scenario 2: a basic note mints exactly one `forward` card in state
/// `new`, due on epoch day 0.
#[sqlx::test]
async fn scenario_2_add_note_generates_one_forward_card(pool: SqlitePool) {
    let deck = repository::deck::create_deck(
        &pool,
        CreateDeckRequest {
            name: "Spanish::Basics".to_string(),
            parent_id: None,
        },
        now(),
    )
    .await
    .unwrap();

    let note = repository::note::add_note(
        &pool,
        AddNoteRequest {
            deck_id: deck.id,
            model: "basic".to_string(),
            fields: [("front", "¿Hola?"), ("back", "Hello")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            tags: vec!["greeting".to_string()],
        },
        now(),
    )
    .await
    .unwrap();
    assert_eq!(note.id, 1);

    let cards = repository::note::generate_cards(&pool, note.id, now()).await.unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].template, "forward");
    assert_eq!(cards[0].state, CardState::New);
    assert_eq!(cards[0].due, 0);
}

/// Sibling burial law: after answering one card of a note with
/// `burySiblings=true`, every other card of that note is buried or
/// suspended.
#[sqlx::test]
async fn sibling_burial_law(pool: SqlitePool) {
    let deck = repository::deck::create_deck(
        &pool,
        CreateDeckRequest {
            name: "Spanish".to_string(),
            parent_id: None,
        },
        now(),
    )
    .await
    .unwrap();
    let note = repository::note::add_note(
        &pool,
        AddNoteRequest {
            deck_id: deck.id,
            model: "basic_reverse".to_string(),
            fields: [("front", "cat"), ("back", "gato")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            tags: vec![],
        },
        now(),
    )
    .await
    .unwrap();
    let cards = repository::note::generate_cards(&pool, note.id, now()).await.unwrap();
    assert_eq!(cards.len(), 2);

    let mut rng = StdRng::seed_from_u64(7);
    repository::review::answer_card(&pool, cards[0].id, 3, now(), &mut rng)
        .await
        .unwrap();

    let sibling = repository::card::get_card(&pool, cards[1].id).await.unwrap();
    assert!(matches!(sibling.state, CardState::Buried | CardState::Suspended));
}

/// Leech law: a review-state card that fails and crosses `leechThreshold`
/// under `leechAction=suspend` ends the transaction suspended.
#[sqlx::test]
async fn leech_law_suspends_the_card(pool: SqlitePool) {
    let deck = repository::deck::create_deck(
        &pool,
        CreateDeckRequest {
            name: "Leeches".to_string(),
            parent_id: None,
        },
        now(),
    )
    .await
    .unwrap();
    repository::deck::config_set(
        &pool,
        deck.id,
        anki_core::config::DeckConfigPatch {
            leech_threshold: Some(8),
            ..Default::default()
        },
        now(),
    )
    .await
    .unwrap();

    let note = repository::note::add_note(
        &pool,
        AddNoteRequest {
            deck_id: deck.id,
            model: "basic".to_string(),
            fields: [("front", "q"), ("back", "a")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            tags: vec![],
        },
        now(),
    )
    .await
    .unwrap();
    let cards = repository::note::generate_cards(&pool, note.id, now()).await.unwrap();
    let card_id = cards[0].id;

    sqlx::query("UPDATE cards SET state = 3, ivl = 10, ease = 2.5, lapses = 7 WHERE id = ?")
        .bind(card_id)
        .execute(&pool)
        .await
        .unwrap();

    let mut rng = StdRng::seed_from_u64(1);
    let resp = repository::review::answer_card(&pool, card_id, 1, now(), &mut rng)
        .await
        .unwrap();
    assert_eq!(resp.card.state, CardState::Suspended);
    assert_eq!(resp.card.lapses, 8);
}

/// Queue priority law: a `learning` card is returned ahead of a `new`
/// card when both are due.
#[sqlx::test]
async fn queue_priority_law_learning_before_new(pool: SqlitePool) {
    let deck = repository::deck::create_deck(
        &pool,
        CreateDeckRequest {
            name: "Queue".to_string(),
            parent_id: None,
        },
        now(),
    )
    .await
    .unwrap();
    let mk_note = |front: &str| AddNoteRequest {
        deck_id: deck.id,
        model: "basic".to_string(),
        fields: [("front", front), ("back", "x")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        tags: vec![],
    };

    let note_new = repository::note::add_note(&pool, mk_note("new-card"), now()).await.unwrap();
    repository::note::generate_cards(&pool, note_new.id, now()).await.unwrap();

    let note_learning = repository::note::add_note(&pool, mk_note("learning-card"), now()).await.unwrap();
    let learning_cards = repository::note::generate_cards(&pool, note_learning.id, now()).await.unwrap();
    sqlx::query("UPDATE cards SET state = 1 WHERE id = ?")
        .bind(learning_cards[0].id)
        .execute(&pool)
        .await
        .unwrap();

    let resp = repository::review::get_next_card(&pool, Some(deck.id), true, now(), false).await.unwrap();
    let picked = resp.card.expect("a card should be due");
    assert_eq!(picked.card.id, learning_cards[0].id);
}

/// Scenario 5 + 6: importing a CSV row with no `deck` column creates the
/// deck, and a subsequent search finds the resulting card by deck/state/tag.
#[sqlx::test]
async fn scenario_5_and_6_import_then_search(pool: SqlitePool) {
    let result = anki_core::importer::import(
        &pool,
        ImportRequest {
            format: ImportFormat::Csv,
            data: "deck,model,front,back,tags\nA,basic,Q,A,t1\n".to_string(),
            deck_default: "Inbox".to_string(),
            model_default: None,
            dry_run: false,
            dedupe: true,
        },
        now(),
    )
    .await
    .unwrap();
    assert_eq!(result.inserted_notes, 1);
    assert_eq!(result.inserted_cards, 1);
    assert!(result.errors.is_empty());

    let decks = repository::deck::list_decks(&pool).await.unwrap();
    assert_eq!(decks.len(), 1);
    assert_eq!(decks[0].name, "A");

    let cards = anki_core::search::search_cards(&pool, "deck:A is:new tag:t1", None)
        .await
        .unwrap();
    assert_eq!(cards.len(), 1);
    let note = repository::card::owning_note(&pool, &cards[0]).await.unwrap();
    assert_eq!(note.deck_id, decks[0].id);
    assert_eq!(cards[0].state, CardState::New);
}

/// Import round-trip: export-then-import over the Markdown path
/// reproduces the original note set under `dedupe=false`.
#[sqlx::test]
async fn import_round_trip_over_markdown(pool: SqlitePool) {
    let deck = repository::deck::create_deck(
        &pool,
        CreateDeckRequest {
            name: "Roundtrip".to_string(),
            parent_id: None,
        },
        now(),
    )
    .await
    .unwrap();
    let note = repository::note::add_note(
        &pool,
        AddNoteRequest {
            deck_id: deck.id,
            model: "basic".to_string(),
            fields: [("front", "2+2"), ("back", "4")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            tags: vec!["math".to_string()],
        },
        now(),
    )
    .await
    .unwrap();
    repository::note::generate_cards(&pool, note.id, now()).await.unwrap();

    let exported = anki_core::exporter::export(&pool, ExportFormat::Markdown, Some(deck.id), now())
        .await
        .unwrap();

    let fresh_deck_count_before = repository::deck::list_decks(&pool).await.unwrap().len();
    let result = anki_core::importer::import(
        &pool,
        ImportRequest {
            format: ImportFormat::Markdown,
            data: exported,
            deck_default: "Inbox".to_string(),
            model_default: None,
            dry_run: false,
            dedupe: false,
        },
        now(),
    )
    .await
    .unwrap();
    assert_eq!(result.inserted_notes, 1);
    // No new deck should have been minted: the exported Markdown carries
    // its own `### Deck: Roundtrip` header, which already exists.
    assert_eq!(
        repository::deck::list_decks(&pool).await.unwrap().len(),
        fresh_deck_count_before
    );
}

/// Export-then-import across two decks must not drop the first note: the
/// Markdown separator has to appear between every pair of notes, not just
/// within a deck section.
#[sqlx::test]
async fn import_round_trip_over_markdown_across_decks(pool: SqlitePool) {
    let spanish = repository::deck::create_deck(
        &pool,
        CreateDeckRequest {
            name: "Spanish".to_string(),
            parent_id: None,
        },
        now(),
    )
    .await
    .unwrap();
    let french = repository::deck::create_deck(
        &pool,
        CreateDeckRequest {
            name: "French".to_string(),
            parent_id: None,
        },
        now(),
    )
    .await
    .unwrap();
    for (deck_id, front, back) in [(spanish.id, "hola", "hello"), (french.id, "bonjour", "hello")] {
        let note = repository::note::add_note(
            &pool,
            AddNoteRequest {
                deck_id,
                model: "basic".to_string(),
                fields: [("front", front), ("back", back)]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                tags: vec![],
            },
            now(),
        )
        .await
        .unwrap();
        repository::note::generate_cards(&pool, note.id, now()).await.unwrap();
    }

    let exported = anki_core::exporter::export(&pool, ExportFormat::Markdown, None, now()).await.unwrap();

    let result = anki_core::importer::import(
        &pool,
        ImportRequest {
            format: ImportFormat::Markdown,
            data: exported,
            deck_default: "Inbox".to_string(),
            model_default: None,
            dry_run: true,
            dedupe: false,
        },
        now(),
    )
    .await
    .unwrap();
    assert_eq!(result.inserted_notes, 2);
}

/// A deck name must be unique; creating a second deck with the same name
/// is rejected rather than silently accepted.
#[sqlx::test]
async fn create_deck_rejects_duplicate_name(pool: SqlitePool) {
    repository::deck::create_deck(
        &pool,
        CreateDeckRequest {
            name: "Spanish".to_string(),
            parent_id: None,
        },
        now(),
    )
    .await
    .unwrap();
    let err = repository::deck::create_deck(
        &pool,
        CreateDeckRequest {
            name: "Spanish".to_string(),
            parent_id: None,
        },
        now(),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        anki_core::Error::Library(anki_core::LibraryError::ValidationError { .. })
    ));
}

/// A cloze note with two distinct indices mints two cards, and the
/// question for the first hides only its own answer.
#[sqlx::test]
async fn scenario_7_cloze_note_end_to_end(pool: SqlitePool) {
    let deck = repository::deck::create_deck(
        &pool,
        CreateDeckRequest {
            name: "Bio".to_string(),
            parent_id: None,
        },
        now(),
    )
    .await
    .unwrap();
    let note = repository::note::add_note(
        &pool,
        AddNoteRequest {
            deck_id: deck.id,
            model: "cloze".to_string(),
            fields: [("text", "La {{c1::furosemida}} es un {{c2::diurético}}.")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            tags: vec![],
        },
        now(),
    )
    .await
    .unwrap();
    let cards = repository::note::generate_cards(&pool, note.id, now()).await.unwrap();
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].template, "cloze-1");
    assert_eq!(cards[1].template, "cloze-2");

    let rendered = repository::card::render(&pool, cards[0].id).await.unwrap();
    assert_eq!(rendered.question, "La [...] es un diurético.");
}

/// Config validation: an empty `learningStepsMins` patch is rejected, not
/// silently applied.
#[sqlx::test]
async fn config_set_rejects_invalid_patch(pool: SqlitePool) {
    let deck = repository::deck::create_deck(
        &pool,
        CreateDeckRequest {
            name: "Config".to_string(),
            parent_id: None,
        },
        now(),
    )
    .await
    .unwrap();
    let err = repository::deck::config_set(
        &pool,
        deck.id,
        anki_core::config::DeckConfigPatch {
            learning_steps_mins: Some(vec![]),
            ..Default::default()
        },
        now(),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        anki_core::Error::Library(anki_core::LibraryError::ValidationError { .. })
    ));
}

/// Deleting a deck that still owns notes is refused.
#[sqlx::test]
async fn delete_deck_refuses_when_notes_remain(pool: SqlitePool) {
    let deck = repository::deck::create_deck(
        &pool,
        CreateDeckRequest {
            name: "Occupied".to_string(),
            parent_id: None,
        },
        now(),
    )
    .await
    .unwrap();
    repository::note::add_note(
        &pool,
        AddNoteRequest {
            deck_id: deck.id,
            model: "basic".to_string(),
            fields: [("front", "q"), ("back", "a")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            tags: vec![],
        },
        now(),
    )
    .await
    .unwrap();

    let err = repository::deck::delete_deck(&pool, deck.id).await.unwrap_err();
    assert!(matches!(
        err,
        anki_core::Error::Library(anki_core::LibraryError::InvalidState(_))
    ));
}
