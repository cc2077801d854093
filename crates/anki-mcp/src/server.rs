//! Tool surface (`spec.md` §6): one `#[tool]` per operation, all namespaced
//! under `anki.`. Mutating tools check `readonly` before touching the
//! database, mirroring the teacher's own per-request guard pattern but
//! collapsed to a single flag since this server has no per-user auth.

use anki_core::schema::{
    AddNoteRequest, AnswerCardRequest, AnswerCardResponse, BulkCardRequest, BulkCardResult, CardInfoRequest,
    CardView, ConfigSetRequest, CreateDeckRequest, DeckIdRequest, DeckView, ExportRequest, ExportResponse,
    GetNextCardRequest, ImportRequest, ImportResult, NextCardResponse, NoteIdRequest, RenderedCard, SearchRequest,
    SearchResponse, StatsRequest, StatsResponse,
};
use anki_core::{repository, Error as CoreError, LibraryError};
use chrono::Utc;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use sqlx::SqlitePool;
use std::path::PathBuf;

#[derive(Clone)]
pub struct AnkiServer {
    pool: SqlitePool,
    #[allow(dead_code)]
    media_dir: PathBuf,
    readonly: bool,
    tool_router: ToolRouter<AnkiServer>,
}

/// Maps a library error to an MCP tool error, keeping the library's own
/// message (`spec.md` §9: tool errors surface the same text a CLI caller
/// would see, not a generic wrapper).
fn to_mcp_error(err: CoreError) -> McpError {
    McpError::internal_error(err.to_string(), None)
}

fn to_json_result<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string(value).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

#[tool_router]
impl AnkiServer {
    pub fn new(pool: SqlitePool, media_dir: PathBuf, readonly: bool) -> Self {
        Self {
            pool,
            media_dir,
            readonly,
            tool_router: Self::tool_router(),
        }
    }

    /// Refuses a mutating call while the server runs in `--readonly` mode.
    fn guard_mutating(&self, op: &str) -> Result<(), McpError> {
        if self.readonly {
            return Err(to_mcp_error(CoreError::Library(LibraryError::ReadonlyRefused(
                op.to_string(),
            ))));
        }
        Ok(())
    }

    #[tool(name = "anki.create_deck", description = "Create a deck, optionally nested under a parent deck.")]
    async fn create_deck(
        &self,
        Parameters(req): Parameters<CreateDeckRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.guard_mutating("create_deck")?;
        let deck = repository::deck::create_deck(&self.pool, req, Utc::now())
            .await
            .map_err(to_mcp_error)?;
        let view = DeckView {
            id: deck.id,
            name: deck.name,
            parent_id: deck.parent_id,
            config: anki_core::config::DeckConfig::from_json(&deck.config_json),
        };
        to_json_result(&view)
    }

    #[tool(name = "anki.list_decks", description = "List every deck with its resolved configuration.")]
    async fn list_decks(&self) -> Result<CallToolResult, McpError> {
        let decks = repository::deck::list_decks(&self.pool).await.map_err(to_mcp_error)?;
        to_json_result(&decks)
    }

    #[tool(name = "anki.delete_deck", description = "Delete an empty deck. Refuses if it still owns child decks or notes.")]
    async fn delete_deck(
        &self,
        Parameters(req): Parameters<DeckIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.guard_mutating("delete_deck")?;
        repository::deck::delete_deck(&self.pool, req.deck_id).await.map_err(to_mcp_error)?;
        to_json_result(&serde_json::json!({ "deleted": req.deck_id }))
    }

    #[tool(name = "anki.config_get", description = "Read a deck's effective configuration.")]
    async fn config_get(
        &self,
        Parameters(req): Parameters<DeckIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        let config = repository::deck::config_get(&self.pool, req.deck_id).await.map_err(to_mcp_error)?;
        to_json_result(&config)
    }

    #[tool(name = "anki.config_set", description = "Merge a sparse patch into a deck's configuration (defaults ⊕ stored ⊕ patch).")]
    async fn config_set(
        &self,
        Parameters(req): Parameters<ConfigSetRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.guard_mutating("config_set")?;
        let config = repository::deck::config_set(&self.pool, req.deck_id, req.patch, Utc::now())
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&config)
    }

    #[tool(name = "anki.config_reset", description = "Reset a deck's configuration back to defaults.")]
    async fn config_reset(
        &self,
        Parameters(req): Parameters<DeckIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.guard_mutating("config_reset")?;
        let config = repository::deck::config_reset(&self.pool, req.deck_id, Utc::now())
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&config)
    }

    #[tool(name = "anki.add_note", description = "Add a note to a deck. Does not mint cards; call generate_cards_for_note next.")]
    async fn add_note(
        &self,
        Parameters(req): Parameters<AddNoteRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.guard_mutating("add_note")?;
        let note = repository::note::add_note(&self.pool, req, Utc::now()).await.map_err(to_mcp_error)?;
        to_json_result(&repository::note::to_view(&note))
    }

    #[tool(name = "anki.generate_cards_for_note", description = "(Re)generate a note's cards from its model and current field values.")]
    async fn generate_cards_for_note(
        &self,
        Parameters(req): Parameters<NoteIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.guard_mutating("generate_cards_for_note")?;
        let cards = repository::note::generate_cards(&self.pool, req.note_id, Utc::now())
            .await
            .map_err(to_mcp_error)?;
        let note = repository::note::get_note(&self.pool, req.note_id).await.map_err(to_mcp_error)?;
        let views: Vec<CardView> = cards.iter().map(|c| repository::card::to_view(c, note.deck_id)).collect();
        to_json_result(&views)
    }

    #[tool(name = "anki.get_next_card", description = "Fetch the highest-priority due card in scope, or none if the queue is exhausted for today.")]
    async fn get_next_card(
        &self,
        Parameters(req): Parameters<GetNextCardRequest>,
    ) -> Result<CallToolResult, McpError> {
        let resp: NextCardResponse = repository::review::get_next_card(
            &self.pool,
            req.deck_id,
            req.include_subdecks,
            Utc::now(),
            self.readonly,
        )
        .await
        .map_err(to_mcp_error)?;
        to_json_result(&resp)
    }

    #[tool(name = "anki.answer_card", description = "Submit a rating (1=again, 2=hard, 3=good, 4=easy) for a card and advance its schedule.")]
    async fn answer_card(
        &self,
        Parameters(req): Parameters<AnswerCardRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.guard_mutating("answer_card")?;
        let mut rng = rand::thread_rng();
        let resp: AnswerCardResponse =
            repository::review::answer_card(&self.pool, req.card_id, req.rating, Utc::now(), &mut rng)
                .await
                .map_err(to_mcp_error)?;
        to_json_result(&resp)
    }

    #[tool(name = "anki.card_info", description = "Fetch a card's scheduling state plus its rendered question/answer text.")]
    async fn card_info(
        &self,
        Parameters(req): Parameters<CardInfoRequest>,
    ) -> Result<CallToolResult, McpError> {
        let rendered: RenderedCard = repository::card::render(&self.pool, req.card_id).await.map_err(to_mcp_error)?;
        to_json_result(&rendered)
    }

    #[tool(name = "anki.search_cards", description = "Run an Anki-style search query (deck:, tag:, is:, rated:, prop:, note:, bare text) and list matching cards.")]
    async fn search_cards(
        &self,
        Parameters(req): Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let cards = anki_core::search::search_cards(&self.pool, &req.query, req.limit)
            .await
            .map_err(to_mcp_error)?;
        let mut views = Vec::with_capacity(cards.len());
        for card in &cards {
            let note = repository::card::owning_note(&self.pool, card).await.map_err(to_mcp_error)?;
            views.push(repository::card::to_view(card, note.deck_id));
        }
        to_json_result(&SearchResponse { cards: views })
    }

    #[tool(name = "anki.import", description = "Import notes from CSV, TSV, JSON, or the Markdown dialect. Dry-run support, deduped by front+back.")]
    async fn import(
        &self,
        Parameters(req): Parameters<ImportRequest>,
    ) -> Result<CallToolResult, McpError> {
        if !req.dry_run {
            self.guard_mutating("import")?;
        }
        let result: ImportResult = anki_core::importer::import(&self.pool, req, Utc::now()).await.map_err(to_mcp_error)?;
        to_json_result(&result)
    }

    #[tool(name = "anki.export", description = "Export a deck's notes (with their cards) as JSON or the Markdown dialect.")]
    async fn export(
        &self,
        Parameters(req): Parameters<ExportRequest>,
    ) -> Result<CallToolResult, McpError> {
        let data = anki_core::exporter::export(&self.pool, req.format, req.deck_id, Utc::now())
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&ExportResponse { data })
    }

    #[tool(name = "anki.suspend_cards", description = "Suspend cards, removing them from the review queue until unsuspended.")]
    async fn suspend_cards(
        &self,
        Parameters(req): Parameters<BulkCardRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.guard_mutating("suspend_cards")?;
        let result: BulkCardResult = repository::admin::suspend(&self.pool, &req.card_ids, Utc::now())
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&result)
    }

    #[tool(name = "anki.unsuspend_cards", description = "Unsuspend cards, returning them to their pre-suspend state.")]
    async fn unsuspend_cards(
        &self,
        Parameters(req): Parameters<BulkCardRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.guard_mutating("unsuspend_cards")?;
        let result: BulkCardResult = repository::admin::unsuspend(&self.pool, &req.card_ids, Utc::now())
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&result)
    }

    #[tool(name = "anki.bury_cards", description = "Bury cards until the next daily rollover.")]
    async fn bury_cards(
        &self,
        Parameters(req): Parameters<BulkCardRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.guard_mutating("bury_cards")?;
        let result: BulkCardResult = repository::admin::bury(&self.pool, &req.card_ids, Utc::now())
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&result)
    }

    #[tool(name = "anki.unbury_cards", description = "Unbury cards immediately instead of waiting for the daily rollover.")]
    async fn unbury_cards(
        &self,
        Parameters(req): Parameters<BulkCardRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.guard_mutating("unbury_cards")?;
        let result: BulkCardResult = repository::admin::unbury(&self.pool, &req.card_ids, Utc::now())
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&result)
    }

    #[tool(name = "anki.reset_cards", description = "Reset cards back to their pristine new state, discarding scheduling progress.")]
    async fn reset_cards(
        &self,
        Parameters(req): Parameters<BulkCardRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.guard_mutating("reset_cards")?;
        let result: BulkCardResult = repository::admin::reset(&self.pool, &req.card_ids, Utc::now())
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&result)
    }

    #[tool(name = "anki.delete_cards", description = "Delete cards outright, along with their review history.")]
    async fn delete_cards(
        &self,
        Parameters(req): Parameters<BulkCardRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.guard_mutating("delete_cards")?;
        let result: BulkCardResult = repository::admin::delete(&self.pool, &req.card_ids).await.map_err(to_mcp_error)?;
        to_json_result(&result)
    }

    #[tool(name = "anki.stats", description = "Aggregate review statistics for a deck (or the whole collection).")]
    async fn stats(
        &self,
        Parameters(req): Parameters<StatsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let resp: StatsResponse = repository::stats::stats(&self.pool, req.deck_id).await.map_err(to_mcp_error)?;
        to_json_result(&resp)
    }
}

#[tool_handler]
impl ServerHandler for AnkiServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Local-first spaced-repetition flashcard engine. Tools are namespaced under `anki.`. \
                 Mutating tools are refused in readonly mode."
                    .to_string(),
            ),
        }
    }
}
