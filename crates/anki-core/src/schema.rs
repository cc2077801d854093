//! Request/response DTOs for the tool surface (`spec.md` §6), kept separate
//! from the storage types in `model` the way the teacher separates
//! `schema.rs` wire types from its own row types. These also double as the
//! MCP tool input/output schemas (`schemars::JsonSchema`), since the tool
//! surface and this library's public API are the same surface.

use crate::model::{CardId, CardState, DeckId, NoteId, RatingId};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct CreateDeckRequest {
    pub name: String,
    pub parent_id: Option<DeckId>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct DeckView {
    pub id: DeckId,
    pub name: String,
    pub parent_id: Option<DeckId>,
    pub config: crate::config::DeckConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct AddNoteRequest {
    pub deck_id: DeckId,
    pub model: String,
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct NoteView {
    pub id: NoteId,
    pub deck_id: DeckId,
    pub model: String,
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct CardView {
    pub id: CardId,
    pub note_id: NoteId,
    pub deck_id: DeckId,
    pub template: String,
    pub state: CardState,
    pub due: i64,
    pub ivl: i64,
    pub ease: f64,
    pub reps: i64,
    pub lapses: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct RenderedCard {
    #[serde(flatten)]
    pub card: CardView,
    pub question: String,
    pub answer: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct NextCardResponse {
    pub card: Option<RenderedCard>,
    pub counts: QueueCounts,
}

/// `spec.md` §4.3: `new_remaining` is new cards due; `reviews_remaining`
/// folds review, learning, and relearning together. Daily limits are
/// advisory on these counts, not enforced by clamping them.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct QueueCounts {
    pub new_remaining: u32,
    pub reviews_remaining: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct GetNextCardRequest {
    #[serde(default)]
    pub deck_id: Option<DeckId>,
    #[serde(default = "default_true")]
    pub include_subdecks: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct AnswerCardRequest {
    pub card_id: CardId,
    pub rating: RatingId,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct AnswerCardResponse {
    pub card: CardView,
    pub counts: QueueCounts,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct CardInfoRequest {
    pub card_id: CardId,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct NoteIdRequest {
    pub note_id: NoteId,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct DeckIdRequest {
    pub deck_id: DeckId,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct ConfigSetRequest {
    pub deck_id: DeckId,
    pub patch: crate::config::DeckConfigPatch,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct SearchResponse {
    pub cards: Vec<CardView>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct ImportRequest {
    pub format: ImportFormat,
    pub data: String,
    /// Deck name rows without their own `deck` column land in. Auto-created
    /// with default config if it doesn't exist yet. Defaults to `Inbox`
    /// (`spec.md` §4.7).
    #[serde(default = "default_deck_default")]
    pub deck_default: String,
    /// Only consulted by CSV/TSV, whose rows don't carry a model of their
    /// own. Defaults to `basic`.
    #[serde(default)]
    pub model_default: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_true")]
    pub dedupe: bool,
}

fn default_deck_default() -> String {
    "Inbox".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, JsonSchema, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ImportFormat {
    Csv,
    Tsv,
    Json,
    Markdown,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct ImportResult {
    pub inserted_notes: u32,
    pub inserted_cards: u32,
    pub errors: Vec<ImportRowError>,
    pub dry_run: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct ImportRowError {
    pub row: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, JsonSchema, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Markdown,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct ExportRequest {
    pub format: ExportFormat,
    #[serde(default)]
    pub deck_id: Option<DeckId>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct ExportResponse {
    pub data: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct BulkCardRequest {
    pub card_ids: Vec<CardId>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct BulkCardResult {
    pub updated: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct StatsRequest {
    #[serde(default)]
    pub deck_id: Option<DeckId>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct StatsResponse {
    pub total_cards: u32,
    pub by_state: BTreeMap<String, u32>,
    pub reviews_today: u32,
    pub average_ease: Option<f64>,
    pub average_interval_days: Option<f64>,
    pub leech_count: u32,
}
