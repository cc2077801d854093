//! Export codecs (`spec.md` §4.7): JSON and the same line-oriented
//! Markdown dialect the importer reads, so a round trip through
//! `export` then `import` reproduces the original notes. The JSON form
//! wraps notes in an envelope carrying each note's generated cards and
//! the media referenced by them.

use crate::model::DeckId;
use crate::schema::{CardView, ExportFormat};
use crate::Error;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

#[derive(serde::Serialize)]
struct ExportedNote {
    deck: String,
    model: String,
    fields: std::collections::BTreeMap<String, String>,
    tags: Vec<String>,
    cards: Vec<CardView>,
}

#[derive(serde::Serialize)]
struct ExportEnvelope {
    version: u32,
    exported_at: DateTime<Utc>,
    deck: Option<String>,
    notes: Vec<ExportedNote>,
    media: Vec<String>,
}

const EXPORT_VERSION: u32 = 1;

/// # Errors
///
/// Returns `Error::Sqlx` if the note/deck/card query fails.
pub async fn export(
    pool: &SqlitePool,
    format: ExportFormat,
    deck_id: Option<DeckId>,
    now: DateTime<Utc>,
) -> Result<String, Error> {
    let notes = load_notes(pool, deck_id).await?;
    Ok(match format {
        ExportFormat::Json => {
            let deck_name = match deck_id {
                Some(id) => sqlx::query_scalar("SELECT name FROM decks WHERE id = ?")
                    .bind(id)
                    .fetch_optional(pool)
                    .await?,
                None => None,
            };
            let media: Vec<String> = sqlx::query_scalar("SELECT hash FROM media").fetch_all(pool).await?;
            let envelope = ExportEnvelope {
                version: EXPORT_VERSION,
                exported_at: now,
                deck: deck_name,
                notes,
                media,
            };
            serde_json::to_string_pretty(&envelope).expect("ExportEnvelope always serialises")
        }
        ExportFormat::Markdown => to_markdown(&notes),
    })
}

async fn load_notes(pool: &SqlitePool, deck_id: Option<DeckId>) -> Result<Vec<ExportedNote>, Error> {
    let deck_ids = match deck_id {
        Some(root) => crate::queue::deck_subtree_ids(pool, root).await?,
        None => sqlx::query_scalar("SELECT id FROM decks").fetch_all(pool).await?,
    };
    let deck_names: std::collections::HashMap<DeckId, String> = {
        let mut builder: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new("SELECT id, name FROM decks WHERE id IN (");
        let mut sep = builder.separated(", ");
        for id in &deck_ids {
            sep.push_bind(*id);
        }
        builder.push(")");
        let rows: Vec<(DeckId, String)> = builder.build_query_as().fetch_all(pool).await?;
        rows.into_iter().collect()
    };

    let mut builder: sqlx::QueryBuilder<sqlx::Sqlite> =
        sqlx::QueryBuilder::new("SELECT * FROM notes WHERE deck_id IN (");
    let mut sep = builder.separated(", ");
    for id in &deck_ids {
        sep.push_bind(*id);
    }
    builder.push(") ORDER BY id ASC");

    let notes: Vec<crate::model::Note> = builder.build_query_as().fetch_all(pool).await?;

    let mut out = Vec::with_capacity(notes.len());
    for note in notes {
        let cards: Vec<crate::model::Card> = sqlx::query_as("SELECT * FROM cards WHERE note_id = ? ORDER BY id ASC")
            .bind(note.id)
            .fetch_all(pool)
            .await?;
        out.push(ExportedNote {
            deck: deck_names.get(&note.deck_id).cloned().unwrap_or_default(),
            model: note.model.clone(),
            fields: note
                .fields()
                .into_iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                .collect(),
            tags: note.tag_list(),
            cards: cards.into_iter().map(|c| crate::repository::card::to_view(&c, note.deck_id)).collect(),
        });
    }
    Ok(out)
}

fn to_markdown(notes: &[ExportedNote]) -> String {
    let mut out = String::new();
    let mut current_deck: Option<&str> = None;
    let mut first = true;
    for note in notes {
        let deck_changed = current_deck != Some(note.deck.as_str());
        if !first {
            out.push_str("---\n");
        }
        if deck_changed {
            out.push_str("### Deck: ");
            out.push_str(&note.deck);
            out.push('\n');
            current_deck = Some(note.deck.as_str());
        }
        first = false;
        if !note.tags.is_empty() {
            out.push_str("Tags: ");
            out.push_str(&note.tags.join(" "));
            out.push('\n');
        }
        if note.model == "cloze" {
            out.push_str("Cloze: ");
            out.push_str(note.fields.get("text").map_or("", String::as_str));
            out.push('\n');
        } else {
            out.push_str("Model: ");
            out.push_str(&note.model);
            out.push('\n');
            out.push_str("Q: ");
            out.push_str(note.fields.get("front").map_or("", String::as_str));
            out.push('\n');
            out.push_str("A: ");
            out.push_str(note.fields.get("back").map_or("", String::as_str));
            out.push('\n');
            if let Some(extra) = note.fields.get("extra") {
                out.push_str("Extra: ");
                out.push_str(extra);
                out.push('\n');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(deck: &str, model: &str, front: &str, back: &str) -> ExportedNote {
        let mut fields = std::collections::BTreeMap::new();
        fields.insert("front".to_string(), front.to_string());
        fields.insert("back".to_string(), back.to_string());
        ExportedNote {
            deck: deck.to_string(),
            model: model.to_string(),
            fields,
            tags: vec!["greeting".to_string()],
            cards: vec![],
        }
    }

    #[test]
    fn markdown_groups_by_deck_with_separators() {
        let notes = vec![
            note("Spanish", "basic", "hola", "hello"),
            note("Spanish", "basic", "adios", "bye"),
        ];
        let md = to_markdown(&notes);
        assert_eq!(md.matches("### Deck: Spanish").count(), 1);
        assert_eq!(md.matches("---").count(), 1);
    }

    #[test]
    fn markdown_new_deck_starts_new_section() {
        let notes = vec![note("Spanish", "basic", "hola", "hello"), note("French", "basic", "bonjour", "hello")];
        let md = to_markdown(&notes);
        assert_eq!(md.matches("### Deck:").count(), 2);
    }

    #[test]
    fn markdown_separates_notes_across_deck_boundary() {
        let notes = vec![note("Spanish", "basic", "hola", "hello"), note("French", "basic", "bonjour", "hello")];
        let md = to_markdown(&notes);
        assert_eq!(md.matches("\n---\n").count(), 1);
    }
}
