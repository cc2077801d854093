//! Import codecs (`spec.md` §4.7): CSV/TSV, JSON, and a line-oriented
//! Markdown dialect are each parsed into a common `ParsedNote` list, then
//! validated and applied in one pass. `dry_run` stops before the apply
//! step; `dedupe` skips notes whose `front`+`back` already exist in the
//! target deck. Rows with no `deck` column land in `deck_default`
//! (`Inbox` unless overridden), auto-created with default config if
//! absent.

use crate::helpers::parse_list;
use crate::model::DeckId;
use crate::repository;
use crate::schema::{ImportFormat, ImportRequest, ImportResult, ImportRowError};
use crate::{Error, LibraryError};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
struct ParsedNote {
    row: usize,
    deck: Option<String>,
    model: String,
    fields: BTreeMap<String, String>,
    tags: Vec<String>,
}

/// # Errors
///
/// Returns `LibraryError::ValidationError` if the payload can't be parsed
/// at all (malformed JSON, a CSV/TSV with no header row).
pub async fn import(pool: &SqlitePool, req: ImportRequest, now: DateTime<Utc>) -> Result<ImportResult, Error> {
    let parsed = match req.format {
        ImportFormat::Csv => parse_delimited(&req.data, b',', req.model_default.as_deref())?,
        ImportFormat::Tsv => parse_delimited(&req.data, b'\t', req.model_default.as_deref())?,
        ImportFormat::Json => parse_json(&req.data)?,
        ImportFormat::Markdown => parse_markdown(&req.data),
    };

    let mut result = ImportResult {
        dry_run: req.dry_run,
        ..Default::default()
    };
    let mut existing_keys: Option<std::collections::HashSet<(DeckId, String, String)>> = None;
    if req.dedupe {
        existing_keys = Some(load_existing_keys(pool).await?);
    }

    for note in parsed {
        let deck_id = match resolve_deck(pool, note.deck.as_deref(), &req.deck_default, now).await {
            Ok(id) => id,
            Err(e) => {
                result.errors.push(ImportRowError {
                    row: note.row,
                    message: e.to_string(),
                    data: None,
                });
                continue;
            }
        };
        let front = note.fields.get("front").cloned().unwrap_or_default();
        let back = note.fields.get("back").cloned().unwrap_or_default();
        if let Some(keys) = existing_keys.as_ref() {
            if keys.contains(&(deck_id, front.clone(), back.clone())) {
                continue;
            }
        }
        if req.dry_run {
            result.inserted_notes += 1;
            continue;
        }
        let add_req = crate::schema::AddNoteRequest {
            deck_id,
            model: note.model.clone(),
            fields: note.fields.clone(),
            tags: note.tags.clone(),
        };
        match repository::note::add_note(pool, add_req, now).await {
            Ok(created) => match repository::note::generate_cards(pool, created.id, now).await {
                Ok(cards) => {
                    result.inserted_notes += 1;
                    result.inserted_cards += u32::try_from(cards.len()).unwrap_or(u32::MAX);
                    if let Some(keys) = existing_keys.as_mut() {
                        keys.insert((deck_id, front, back));
                    }
                }
                Err(e) => result.errors.push(ImportRowError {
                    row: note.row,
                    message: e.to_string(),
                    data: None,
                }),
            },
            Err(e) => result.errors.push(ImportRowError {
                row: note.row,
                message: e.to_string(),
                data: None,
            }),
        }
    }

    Ok(result)
}

async fn load_existing_keys(
    pool: &SqlitePool,
) -> Result<std::collections::HashSet<(DeckId, String, String)>, Error> {
    let rows: Vec<(DeckId, String)> = sqlx::query_as("SELECT deck_id, fields_json FROM notes")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(deck_id, fields_json)| {
            let fields: BTreeMap<String, String> = serde_json::from_str(&fields_json).unwrap_or_default();
            (
                deck_id,
                fields.get("front").cloned().unwrap_or_default(),
                fields.get("back").cloned().unwrap_or_default(),
            )
        })
        .collect())
}

async fn resolve_deck(
    pool: &SqlitePool,
    name: Option<&str>,
    deck_default: &str,
    now: DateTime<Utc>,
) -> Result<DeckId, Error> {
    let name = name.unwrap_or(deck_default);
    let existing: Option<DeckId> = sqlx::query_scalar("SELECT id FROM decks WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }
    let created = repository::deck::create_deck(
        pool,
        crate::schema::CreateDeckRequest {
            name: name.to_string(),
            parent_id: None,
        },
        now,
    )
    .await?;
    Ok(created.id)
}

fn parse_delimited(data: &str, delimiter: u8, model_default: Option<&str>) -> Result<Vec<ParsedNote>, Error> {
    let model_default = model_default.unwrap_or("basic");
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(data.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| {
            Error::Library(LibraryError::ValidationError {
                description: format!("could not read header row: {e}"),
                fields: vec![],
            })
        })?
        .iter()
        .map(str::to_owned)
        .collect();
    if headers.is_empty() {
        return Err(Error::Library(LibraryError::ValidationError {
            description: "CSV/TSV data has no header row".to_string(),
            fields: vec![],
        }));
    }

    let mut notes = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let row = i + 2; // 1-indexed, plus the header row
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                log::warn!("skipping malformed row {row}: {e}");
                continue;
            }
        };
        let mut fields = BTreeMap::new();
        let mut deck = None;
        let mut model = model_default.to_string();
        let mut tags = Vec::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            match header.to_ascii_lowercase().as_str() {
                "deck" => deck = (!value.is_empty()).then(|| value.to_string()),
                "model" => {
                    if !value.is_empty() {
                        model = value.to_string();
                    }
                }
                "tags" => tags = parse_list(value),
                other => {
                    fields.insert(other.to_string(), value.to_string());
                }
            }
        }
        notes.push(ParsedNote {
            row,
            deck,
            model,
            fields,
            tags,
        });
    }
    Ok(notes)
}

#[derive(serde::Deserialize)]
struct JsonNote {
    deck: Option<String>,
    model: String,
    fields: BTreeMap<String, String>,
    #[serde(default)]
    tags: Vec<String>,
}

fn parse_json(data: &str) -> Result<Vec<ParsedNote>, Error> {
    let raw: Vec<JsonNote> = serde_json::from_str(data).map_err(|e| {
        Error::Library(LibraryError::ValidationError {
            description: format!("invalid JSON import payload: {e}"),
            fields: vec![],
        })
    })?;
    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(i, n)| ParsedNote {
            row: i + 1,
            deck: n.deck,
            model: n.model,
            fields: n.fields,
            tags: n.tags,
        })
        .collect())
}

/// The custom Markdown dialect (`spec.md` §4.7): `### Deck: <name>`
/// sections, each note separated by `---`, with `Tags:`/`Model:` metadata
/// lines and `Q:`/`A:`/`Cloze:`/`Extra:` field lines. A line matching none
/// of these prefixes is a continuation of whichever field line came last,
/// appended on its own line (`spec.md` §4.7).
fn parse_markdown(data: &str) -> Vec<ParsedNote> {
    let mut notes = Vec::new();
    let mut current_deck: Option<String> = None;
    let mut row = 0usize;

    for block in data.split("\n---\n") {
        let mut deck = current_deck.clone();
        let mut model = "basic".to_string();
        let mut tags = Vec::new();
        let mut fields = BTreeMap::new();
        let mut last_field: Option<&'static str> = None;

        for line in block.lines() {
            row += 1;
            let line = line.trim();
            if let Some(name) = line.strip_prefix("### Deck:") {
                current_deck = Some(name.trim().to_string());
                deck = current_deck.clone();
                last_field = None;
            } else if let Some(value) = line.strip_prefix("Tags:") {
                tags = parse_list(value.trim());
                last_field = None;
            } else if let Some(value) = line.strip_prefix("Model:") {
                model = value.trim().to_ascii_lowercase().replace(' ', "_");
                last_field = None;
            } else if let Some(value) = line.strip_prefix("Q:") {
                fields.insert("front".to_string(), value.trim().to_string());
                last_field = Some("front");
            } else if let Some(value) = line.strip_prefix("A:") {
                fields.insert("back".to_string(), value.trim().to_string());
                last_field = Some("back");
            } else if let Some(value) = line.strip_prefix("Cloze:") {
                model = "cloze".to_string();
                fields.insert("text".to_string(), value.trim().to_string());
                last_field = Some("text");
            } else if let Some(value) = line.strip_prefix("Extra:") {
                fields.insert("extra".to_string(), value.trim().to_string());
                last_field = Some("extra");
            } else if let Some(key) = last_field {
                if !line.is_empty() {
                    let entry = fields.entry(key.to_string()).or_default();
                    entry.push('\n');
                    entry.push_str(line);
                }
            }
        }

        if !fields.is_empty() {
            notes.push(ParsedNote {
                row,
                deck,
                model,
                fields,
                tags,
            });
        }
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_header_maps_to_fields_and_special_columns() {
        let data = "front,back,tags,deck\n2+2,4,math easy,Arithmetic\n";
        let notes = parse_delimited(data, b',', None).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].deck.as_deref(), Some("Arithmetic"));
        assert_eq!(notes[0].tags, vec!["math".to_string(), "easy".to_string()]);
        assert_eq!(notes[0].fields.get("front").unwrap(), "2+2");
    }

    #[test]
    fn csv_without_header_is_rejected() {
        let err = parse_delimited("", b',', None).unwrap_err();
        assert!(matches!(err, Error::Library(LibraryError::ValidationError { .. })));
    }

    #[test]
    fn json_import_reads_model_and_fields() {
        let data = r#"[{"deck":"Spanish","model":"basic","fields":{"front":"hola","back":"hello"},"tags":["greeting"]}]"#;
        let notes = parse_json(data).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].model, "basic");
        assert_eq!(notes[0].tags, vec!["greeting".to_string()]);
    }

    #[test]
    fn markdown_parses_deck_and_qa_pairs() {
        let data = "### Deck: Spanish\nTags: greeting\nQ: Hola\nA: Hello\n---\nQ: Adios\nA: Bye\n";
        let notes = parse_markdown(data);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].deck.as_deref(), Some("Spanish"));
        assert_eq!(notes[1].deck.as_deref(), Some("Spanish"));
        assert_eq!(notes[1].fields.get("front").unwrap(), "Adios");
    }

    #[test]
    fn markdown_continuation_lines_append_to_last_field() {
        let data = "### Deck: Bio\nQ: What is\nmitochondria?\nA: The powerhouse\nof the cell\n";
        let notes = parse_markdown(data);
        assert_eq!(notes[0].fields.get("front").unwrap(), "What is\nmitochondria?");
        assert_eq!(notes[0].fields.get("back").unwrap(), "The powerhouse\nof the cell");
    }

    #[test]
    fn markdown_cloze_line_switches_model() {
        let data = "### Deck: Bio\nCloze: The {{c1::mitochondria}} is key\n";
        let notes = parse_markdown(data);
        assert_eq!(notes[0].model, "cloze");
        assert_eq!(notes[0].fields.get("text").unwrap(), "The {{c1::mitochondria}} is key");
    }
}
