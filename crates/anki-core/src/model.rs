//! These types must stay in sync with the migrations in `migrations/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

pub type DeckId = i64;
pub type NoteId = i64;
pub type CardId = i64;
pub type ReviewLogId = i64;
pub type MediaId = i64;
/// 1-4, validated at the scheduler/tool boundary, not by the type itself.
pub type RatingId = u8;

pub const EPOCH_DAY_NEW: i64 = 0;

/// A card's position in the state machine (`spec.md` §4.2). Stored as an
/// integer so ordering in `ORDER BY state, due` stays index-friendly.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, schemars::JsonSchema, sqlx::Type, strum::Display,
    strum::EnumString,
)]
#[repr(i64)]
#[strum(serialize_all = "snake_case")]
pub enum CardState {
    New = 0,
    Learning = 1,
    Relearning = 2,
    Review = 3,
    Suspended = 4,
    Buried = 5,
}

impl CardState {
    /// Ordering used by the queue builder: learning < relearning < new < review.
    pub fn queue_priority(self) -> u8 {
        match self {
            CardState::Learning => 0,
            CardState::Relearning => 1,
            CardState::New => 2,
            CardState::Review => 3,
            CardState::Suspended | CardState::Buried => u8::MAX,
        }
    }
}

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum NoteModel {
    Basic,
    BasicReverse,
    Cloze,
    Custom,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, schemars::JsonSchema, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LeechAction {
    Suspend,
    Tag,
}

#[derive(Clone, Debug, Deserialize, FromRow, Serialize)]
pub struct Deck {
    pub id: DeckId,
    pub name: String,
    pub parent_id: Option<DeckId>,
    /// `DeckConfig`, serialised. See `crate::config`.
    pub config_json: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, FromRow, Serialize)]
pub struct Note {
    pub id: NoteId,
    pub deck_id: DeckId,
    pub model: String,
    /// Ordered `field name -> field text` map, serialised as JSON.
    pub fields_json: String,
    /// Whitespace-joined.
    pub tags: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn fields(&self) -> Map<String, Value> {
        serde_json::from_str(&self.fields_json).unwrap_or_default()
    }

    pub fn field(&self, key: &str) -> Option<String> {
        self.fields()
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    pub fn tag_list(&self) -> Vec<String> {
        crate::helpers::parse_list(&self.tags)
    }
}

#[derive(Clone, Debug, Default, Deserialize, FromRow, Serialize)]
pub struct Card {
    pub id: CardId,
    pub note_id: NoteId,
    pub template: String,
    pub state: CardState,
    pub due: i64,
    pub ivl: i64,
    pub ease: f64,
    pub reps: i64,
    pub lapses: i64,
    pub queue_position: Option<i64>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl Default for CardState {
    fn default() -> Self {
        CardState::New
    }
}

impl Card {
    pub fn new(note_id: NoteId, template: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            note_id,
            template: template.into(),
            state: CardState::New,
            due: EPOCH_DAY_NEW,
            ivl: 0,
            ease: 2.5,
            reps: 0,
            lapses: 0,
            queue_position: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Append-only; one row per review, written in the same transaction as the
/// card-state mutation it describes.
#[derive(Clone, Debug, Deserialize, FromRow, Serialize)]
pub struct ReviewLog {
    pub id: ReviewLogId,
    pub card_id: CardId,
    pub ts: i64,
    pub rating: i64,
    pub ivl_before: i64,
    pub ivl_after: i64,
    pub ease_before: f64,
    pub ease_after: f64,
    pub state_before: CardState,
    pub state_after: CardState,
}

#[derive(Clone, Debug, Deserialize, FromRow, Serialize)]
pub struct Media {
    pub id: MediaId,
    pub hash: String,
    pub path: String,
    pub mime: String,
    pub size: i64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}
