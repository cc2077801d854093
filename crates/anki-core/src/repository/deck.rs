use crate::config::DeckConfig;
use crate::model::{Deck, DeckId};
use crate::schema::{CreateDeckRequest, DeckConfigPatch, DeckView};
use crate::{Error, LibraryError, NotFoundKind};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub async fn create_deck(
    pool: &SqlitePool,
    req: CreateDeckRequest,
    now: DateTime<Utc>,
) -> Result<Deck, Error> {
    if let Some(parent_id) = req.parent_id {
        get_deck(pool, parent_id).await?;
    }
    let exists: Option<DeckId> = sqlx::query_scalar("SELECT id FROM decks WHERE name = ?")
        .bind(&req.name)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Err(Error::Library(LibraryError::ValidationError {
            description: format!("a deck named `{}` already exists", req.name),
            fields: vec!["name".to_string()],
        }));
    }
    let ts = now.timestamp();
    let config = DeckConfig::default().to_json();
    let id = sqlx::query(
        "INSERT INTO decks (name, parent_id, config_json, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&req.name)
    .bind(req.parent_id)
    .bind(&config)
    .bind(ts)
    .bind(ts)
    .execute(pool)
    .await?
    .last_insert_rowid();
    get_deck(pool, id).await
}

pub async fn get_deck(pool: &SqlitePool, id: DeckId) -> Result<Deck, Error> {
    sqlx::query_as("SELECT * FROM decks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::Library(LibraryError::NotFound(NotFoundKind::Deck(id))))
}

pub async fn list_decks(pool: &SqlitePool) -> Result<Vec<DeckView>, Error> {
    let decks: Vec<Deck> = sqlx::query_as("SELECT * FROM decks ORDER BY name ASC")
        .fetch_all(pool)
        .await?;
    Ok(decks.into_iter().map(to_view).collect())
}

fn to_view(deck: Deck) -> DeckView {
    DeckView {
        id: deck.id,
        name: deck.name,
        parent_id: deck.parent_id,
        config: DeckConfig::from_json(&deck.config_json),
    }
}

pub async fn config_get(pool: &SqlitePool, id: DeckId) -> Result<DeckConfig, Error> {
    let deck = get_deck(pool, id).await?;
    Ok(DeckConfig::from_json(&deck.config_json))
}

pub async fn config_set(
    pool: &SqlitePool,
    id: DeckId,
    patch: DeckConfigPatch,
    now: DateTime<Utc>,
) -> Result<DeckConfig, Error> {
    let deck = get_deck(pool, id).await?;
    let stored = DeckConfig::from_json(&deck.config_json);
    let merged = DeckConfig::merge(&stored, &patch)?;
    sqlx::query("UPDATE decks SET config_json = ?, updated_at = ? WHERE id = ?")
        .bind(merged.to_json())
        .bind(now.timestamp())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(merged)
}

pub async fn config_reset(pool: &SqlitePool, id: DeckId, now: DateTime<Utc>) -> Result<DeckConfig, Error> {
    get_deck(pool, id).await?;
    let defaults = DeckConfig::default();
    sqlx::query("UPDATE decks SET config_json = ?, updated_at = ? WHERE id = ?")
        .bind(defaults.to_json())
        .bind(now.timestamp())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(defaults)
}

/// Refuses to delete a deck that still owns child decks or notes, the way
/// the teacher refuses to delete a tag that's still referenced by a note
/// (`examples/shivangp76-spares/spares/src/api/tag.rs` FK guard pattern).
///
/// # Errors
///
/// Returns `LibraryError::InvalidState` if the deck has children or notes.
pub async fn delete_deck(pool: &SqlitePool, id: DeckId) -> Result<(), Error> {
    get_deck(pool, id).await?;
    let child_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM decks WHERE parent_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if child_count > 0 {
        return Err(Error::Library(LibraryError::InvalidState(format!(
            "deck {id} still has {child_count} child deck(s)"
        ))));
    }
    let note_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes WHERE deck_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if note_count > 0 {
        return Err(Error::Library(LibraryError::InvalidState(format!(
            "deck {id} still has {note_count} note(s)"
        ))));
    }
    sqlx::query("DELETE FROM decks WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
