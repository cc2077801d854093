//! `mcp-anki`: an MCP tool-calling server over the `anki-core` flashcard
//! engine. CLI surface and bootstrap sequence grounded on the teacher's
//! `spares_server/src/main.rs` (database-exists check, connect, migrate),
//! adapted from an axum HTTP server to an MCP stdio server.

mod server;

use anki_core::config::{default_db_path, default_media_dir};
use clap::Parser;
use miette::IntoDiagnostic;
use std::path::PathBuf;

/// Local-first spaced-repetition flashcard engine, exposed as MCP tools.
#[derive(Debug, Parser)]
#[command(name = "mcp-anki", version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database file. Created (with migrations run) if
    /// it doesn't exist, unless `--readonly` is set.
    #[arg(long, env = "MCP_ANKI_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Directory media files are read from/written to.
    #[arg(long, env = "MCP_ANKI_MEDIA_DIR")]
    media_dir: Option<PathBuf>,

    /// Refuse every mutating tool call; read-only tools still work.
    #[arg(long, default_value_t = false)]
    readonly: bool,

    /// Log level passed through to `env_logger` (error, warn, info, debug, trace).
    #[arg(long, default_value = "info", env = "MCP_ANKI_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .target(env_logger::Target::Stderr)
        .init();

    let db_path = args.db_path.unwrap_or_else(default_db_path);
    let media_dir = args.media_dir.unwrap_or_else(default_media_dir);
    std::fs::create_dir_all(&media_dir).into_diagnostic()?;

    log::info!(
        "opening database at {} (readonly={})",
        db_path.display(),
        args.readonly
    );
    let pool = anki_core::db::open(&db_path, args.readonly).await?;

    let service = server::AnkiServer::new(pool, media_dir, args.readonly)
        .serve(rmcp::transport::io::stdio())
        .await
        .into_diagnostic()?;
    service.waiting().await.into_diagnostic()?;
    Ok(())
}
