//! Card generation from note models (`spec.md` §4.6): turns a `Note` into
//! one or more `Card`s depending on its model, and renders a card's
//! question/answer text at review time. Grounded on the shape of the
//! teacher's cloze scanner (`parsers/clozes.rs`) but scoped to exactly the
//! `{{cN::...}}` marker syntax this spec defines — no image occlusion, no
//! alternate delimiter dialects.

use crate::model::{Card, Note, NoteModel};
use crate::{Error, LibraryError};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Cloze notes keep their source text in `front` if present, else `text`.
fn cloze_source(note: &Note) -> String {
    note.field("front").or_else(|| note.field("text")).unwrap_or_default()
}

/// Builds the cards a note should own right after creation, or after its
/// fields change (cloze notes can gain or lose cards when markers change).
///
/// # Errors
///
/// Returns `LibraryError::ValidationError` if the note's `model` isn't a
/// known `NoteModel`, if a `basic`/`basic_reverse` note is missing
/// `front`/`back`, or if a cloze note's text has no `{{cN::...}}` markers.
pub fn generate_cards_for_note(note: &Note, now: DateTime<Utc>) -> Result<Vec<Card>, Error> {
    let model = NoteModel::from_str(&note.model).map_err(|_| {
        Error::Library(LibraryError::ValidationError {
            description: format!("unknown note model `{}`", note.model),
            fields: vec!["model".to_string()],
        })
    })?;

    match model {
        NoteModel::Basic => {
            require_fields(note, &["front", "back"])?;
            Ok(vec![Card::new(note.id, "forward", now)])
        }
        NoteModel::BasicReverse => {
            require_fields(note, &["front", "back"])?;
            Ok(vec![
                Card::new(note.id, "forward", now),
                Card::new(note.id, "reverse", now),
            ])
        }
        NoteModel::Cloze => {
            let indices = cloze_indices(&cloze_source(note));
            Ok(indices
                .into_iter()
                .map(|n| Card::new(note.id, format!("cloze-{n}"), now))
                .collect())
        }
        NoteModel::Custom => {
            require_fields(note, &["front"])?;
            Ok(vec![Card::new(note.id, "forward", now)])
        }
    }
}

fn require_fields(note: &Note, required: &[&str]) -> Result<(), Error> {
    let missing: Vec<String> = required
        .iter()
        .filter(|f| note.field(f).is_none_or(|v| v.is_empty()))
        .map(|f| (*f).to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Library(LibraryError::ValidationError {
            description: format!("note model `{}` requires {}", note.model, required.join(", ")),
            fields: missing,
        }))
    }
}

/// Every distinct `N` appearing in a `{{cN::...}}` marker, in ascending
/// order. A malformed marker (no digits, or unterminated `}}`) is ignored.
/// Zero matches is valid: the note is accepted but mints no cards.
pub fn cloze_indices(text: &str) -> Vec<u32> {
    let mut found = BTreeSet::new();
    let mut rest = text;
    loop {
        let Some(start) = rest.find("{{c") else { break };
        let after_marker = &rest[start + 3..];
        let Some(colon_at) = after_marker.find("::") else { break };
        let Some(end_at) = after_marker.find("}}") else { break };
        if colon_at < end_at {
            let digits = &after_marker[..colon_at];
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(n) = digits.parse::<u32>() {
                    found.insert(n);
                }
            }
        }
        rest = &after_marker[end_at + 2..];
    }
    found.into_iter().collect()
}

/// Renders a card's question and answer text from its owning note's
/// fields. `forward`/`reverse` read `front`/`back`; `cloze-N` hides the
/// active index's span and reveals all other indices.
#[must_use]
pub fn render(note: &Note, card: &Card) -> (String, String) {
    match card.template.as_str() {
        "forward" => (
            note.field("front").unwrap_or_default(),
            note.field("back").unwrap_or_default(),
        ),
        "reverse" => (
            note.field("back").unwrap_or_default(),
            note.field("front").unwrap_or_default(),
        ),
        template if template.starts_with("cloze-") => {
            let n: u32 = template["cloze-".len()..].parse().unwrap_or(0);
            let text = cloze_source(note);
            (render_cloze(&text, n, false), render_cloze(&text, n, true))
        }
        _ => (
            note.field("front").unwrap_or_default(),
            note.field("back").unwrap_or_default(),
        ),
    }
}

/// Replaces every `{{cN::answer}}` marker: the active index `n` becomes
/// `[...]` on the question side; every index (active or not) reveals its
/// `answer` on the answer side.
fn render_cloze(text: &str, active: u32, revealing: bool) -> String {
    let mut out = String::new();
    let mut rest = text;
    loop {
        let Some(start) = rest.find("{{c") else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..start]);
        let after_marker = &rest[start + 3..];
        let Some(colon_at) = after_marker.find("::") else {
            out.push_str(&rest[start..]);
            break;
        };
        let digits = &after_marker[..colon_at];
        let Some(end_at) = after_marker.find("}}") else {
            out.push_str(&rest[start..]);
            break;
        };
        let n: Option<u32> = digits.parse().ok();
        let body = &after_marker[colon_at + 2..end_at];
        let (answer, hint) = match body.split_once("::") {
            Some((a, h)) => (a, Some(h)),
            None => (body, None),
        };
        if n == Some(active) && !revealing {
            out.push('[');
            out.push_str(hint.unwrap_or("..."));
            out.push(']');
        } else {
            out.push_str(answer);
        }
        rest = &after_marker[end_at + 2..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn note_with(model: &str, fields: &[(&str, &str)]) -> Note {
        let mut map = BTreeMap::new();
        for (k, v) in fields {
            map.insert((*k).to_string(), (*v).to_string());
        }
        Note {
            id: 1,
            deck_id: 1,
            model: model.to_string(),
            fields_json: serde_json::to_string(&map).unwrap(),
            tags: String::new(),
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn basic_note_yields_one_forward_card() {
        let note = note_with("basic", &[("front", "2+2"), ("back", "4")]);
        let cards = generate_cards_for_note(&note, now()).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].template, "forward");
    }

    #[test]
    fn basic_note_missing_back_is_rejected() {
        let note = note_with("basic", &[("front", "2+2")]);
        let err = generate_cards_for_note(&note, now()).unwrap_err();
        assert!(matches!(err, Error::Library(LibraryError::ValidationError { .. })));
    }

    #[test]
    fn basic_reverse_yields_two_cards() {
        let note = note_with("basic_reverse", &[("front", "cat"), ("back", "gato")]);
        let cards = generate_cards_for_note(&note, now()).unwrap();
        assert_eq!(cards.len(), 2);
    }

    #[test]
    fn cloze_note_yields_one_card_per_distinct_index() {
        let note = note_with(
            "cloze",
            &[("text", "La {{c1::mitochondria}} es el {{c2::powerhouse}} de la {{c1::cell}}")],
        );
        let cards = generate_cards_for_note(&note, now()).unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].template, "cloze-1");
        assert_eq!(cards[1].template, "cloze-2");
    }

    #[test]
    fn cloze_note_without_markers_mints_zero_cards() {
        let note = note_with("cloze", &[("text", "no markers here")]);
        let cards = generate_cards_for_note(&note, now()).unwrap();
        assert!(cards.is_empty());
    }

    #[test]
    fn scenario_7_cloze_question_renders_remaining_clozes() {
        let note = note_with("cloze", &[("text", "La {{c1::furosemida}} es un {{c2::diurético}}.")]);
        let card = Card::new(1, "cloze-1", now());
        let (question, _) = render(&note, &card);
        assert_eq!(question, "La [...] es un diurético.");
    }

    #[test]
    fn render_cloze_hides_active_and_reveals_others() {
        let note = note_with("cloze", &[("text", "{{c1::Paris}} is the capital of {{c2::France}}")]);
        let card = Card::new(1, "cloze-1", now());
        let (question, answer) = render(&note, &card);
        assert_eq!(question, "[...] is the capital of France");
        assert_eq!(answer, "Paris is the capital of France");
    }

    #[test]
    fn render_cloze_uses_hint_when_present() {
        let note = note_with("cloze", &[("text", "{{c1::Paris::city}} is in France")]);
        let card = Card::new(1, "cloze-1", now());
        let (question, _answer) = render(&note, &card);
        assert_eq!(question, "[city] is in France");
    }

    #[test]
    fn render_basic_reads_front_back() {
        let note = note_with("basic", &[("front", "2+2"), ("back", "4")]);
        let card = Card::new(1, "forward", now());
        assert_eq!(render(&note, &card), ("2+2".to_string(), "4".to_string()));
    }
}
