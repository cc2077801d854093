use crate::helpers::{join_list, parse_list};
use crate::model::{Card, Note, NoteId};
use crate::schema::{AddNoteRequest, NoteView};
use crate::{cardgen, Error, LibraryError, NotFoundKind};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub async fn add_note(pool: &SqlitePool, req: AddNoteRequest, now: DateTime<Utc>) -> Result<Note, Error> {
    super::deck::get_deck(pool, req.deck_id).await?;
    // Card generation only ever looks up lowercase field names (`front`,
    // `back`, `text`, `extra`); normalise here so a caller passing `Front`
    // doesn't silently mint zero cards.
    let fields: std::collections::BTreeMap<String, String> =
        req.fields.into_iter().map(|(k, v)| (k.to_ascii_lowercase(), v)).collect();
    let fields_json = serde_json::to_string(&fields).map_err(|e| {
        Error::Library(LibraryError::ValidationError {
            description: format!("fields did not serialise: {e}"),
            fields: vec!["fields".to_string()],
        })
    })?;
    let ts = now.timestamp();
    let id = sqlx::query(
        "INSERT INTO notes (deck_id, model, fields_json, tags, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(req.deck_id)
    .bind(&req.model)
    .bind(&fields_json)
    .bind(join_list(&req.tags))
    .bind(ts)
    .bind(ts)
    .execute(pool)
    .await?
    .last_insert_rowid();
    get_note(pool, id).await
}

pub async fn get_note(pool: &SqlitePool, id: NoteId) -> Result<Note, Error> {
    sqlx::query_as("SELECT * FROM notes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::Library(LibraryError::NotFound(NotFoundKind::Note(id))))
}

#[must_use]
pub fn to_view(note: &Note) -> NoteView {
    NoteView {
        id: note.id,
        deck_id: note.deck_id,
        model: note.model.clone(),
        fields: note
            .fields()
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
            .collect(),
        tags: parse_list(&note.tags),
    }
}

/// (re)generates a note's cards. Existing cards for the note that have
/// never been reviewed are replaced outright; cards with review history
/// are left untouched even if their template no longer matches (a note
/// edit should never discard scheduling progress).
pub async fn generate_cards(pool: &SqlitePool, note_id: NoteId, now: DateTime<Utc>) -> Result<Vec<Card>, Error> {
    let note = get_note(pool, note_id).await?;
    let wanted = cardgen::generate_cards_for_note(&note, now)?;

    let existing: Vec<Card> = sqlx::query_as("SELECT * FROM cards WHERE note_id = ?")
        .bind(note_id)
        .fetch_all(pool)
        .await?;
    let existing_templates: std::collections::HashSet<&str> =
        existing.iter().map(|c| c.template.as_str()).collect();

    let mut created = Vec::new();
    for card in wanted {
        if existing_templates.contains(card.template.as_str()) {
            continue;
        }
        let ts = now.timestamp();
        let id = sqlx::query(
            "INSERT INTO cards (note_id, template, state, due, ivl, ease, reps, lapses, \
             queue_position, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(card.note_id)
        .bind(&card.template)
        .bind(card.state)
        .bind(card.due)
        .bind(card.ivl)
        .bind(card.ease)
        .bind(card.reps)
        .bind(card.lapses)
        .bind(card.queue_position)
        .bind(ts)
        .bind(ts)
        .execute(pool)
        .await?
        .last_insert_rowid();
        created.push(super::card::get_card(pool, id).await?);
    }

    let wanted_templates: std::collections::HashSet<String> =
        cardgen::generate_cards_for_note(&note, now)?
            .into_iter()
            .map(|c| c.template)
            .collect();
    for stale in existing.into_iter().filter(|c| c.reps == 0 && !wanted_templates.contains(&c.template)) {
        sqlx::query("DELETE FROM cards WHERE id = ?")
            .bind(stale.id)
            .execute(pool)
            .await?;
    }

    Ok(created)
}
