//! The review queue (`spec.md` §4.3): resolves a deck's scope (itself, its
//! descendants if `include_subdecks`, or every deck if none is given),
//! selects eligible cards under the deck's daily limits, and orders them
//! `learning < relearning < new < review`, `due ASC, queue_position ASC
//! NULLS LAST, id ASC`. Grounded on the teacher's own "due queue" ordering
//! in `api/card.rs`, simplified to this spec's single-deck scheduler.

use crate::config::DeckConfig;
use crate::helpers::today;
use crate::model::{Card, CardState, Deck, DeckId};
use crate::schema::QueueCounts;
use crate::Error;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Every deck id in `root`'s subtree, `root` included.
pub async fn deck_subtree_ids(pool: &SqlitePool, root: DeckId) -> Result<Vec<DeckId>, Error> {
    let mut seen = vec![root];
    let mut frontier = vec![root];
    while !frontier.is_empty() {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id FROM decks WHERE parent_id IN (");
        let mut sep = builder.separated(", ");
        for id in &frontier {
            sep.push_bind(*id);
        }
        builder.push(")");
        let children: Vec<DeckId> = builder.build_query_scalar().fetch_all(pool).await?;
        frontier = children.into_iter().filter(|id| !seen.contains(id)).collect();
        seen.extend(&frontier);
    }
    Ok(seen)
}

/// Resolves `(deck_id, include_subdecks)` to the set of deck ids in scope.
/// `deck_id = None` means every deck.
async fn resolve_scope(
    pool: &SqlitePool,
    deck_id: Option<DeckId>,
    include_subdecks: bool,
) -> Result<Vec<DeckId>, Error> {
    match deck_id {
        None => sqlx::query_scalar("SELECT id FROM decks").fetch_all(pool).await.map_err(Error::from),
        Some(root) if include_subdecks => deck_subtree_ids(pool, root).await,
        Some(root) => Ok(vec![root]),
    }
}

fn push_id_list(builder: &mut QueryBuilder<Sqlite>, ids: &[DeckId]) {
    builder.push("(");
    let mut sep = builder.separated(", ");
    for id in ids {
        sep.push_bind(*id);
    }
    builder.push(")");
}

struct TodaysCounts {
    new_seen: i64,
    reviews_seen: i64,
}

async fn todays_counts(pool: &SqlitePool, deck_ids: &[DeckId]) -> Result<TodaysCounts, Error> {
    let today_start = crate::helpers::start_of_day_utc(today(Utc::now())).timestamp();
    let mut new_builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT COUNT(*) FROM reviews r JOIN cards c ON c.id = r.card_id \
         JOIN notes n ON n.id = c.note_id WHERE r.ts >= ",
    );
    new_builder.push_bind(today_start);
    new_builder.push(" AND r.state_before = ");
    new_builder.push_bind(CardState::New);
    new_builder.push(" AND n.deck_id IN ");
    push_id_list(&mut new_builder, deck_ids);
    let new_seen: i64 = new_builder.build_query_scalar().fetch_one(pool).await?;

    let mut review_builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT COUNT(*) FROM reviews r JOIN cards c ON c.id = r.card_id \
         JOIN notes n ON n.id = c.note_id WHERE r.ts >= ",
    );
    review_builder.push_bind(today_start);
    review_builder.push(" AND r.state_before != ");
    review_builder.push_bind(CardState::New);
    review_builder.push(" AND n.deck_id IN ");
    push_id_list(&mut review_builder, deck_ids);
    let reviews_seen: i64 = review_builder.build_query_scalar().fetch_one(pool).await?;

    Ok(TodaysCounts {
        new_seen,
        reviews_seen,
    })
}

/// `new_remaining = |{state=new ∧ due≤today}|`, `reviews_remaining =
/// |{state∈{review,learning,relearning} ∧ due≤today}|`, excluding
/// `suspended`/`buried` (`spec.md` §4.3).
pub async fn queue_counts(
    pool: &SqlitePool,
    deck_id: Option<DeckId>,
    include_subdecks: bool,
) -> Result<QueueCounts, Error> {
    let deck_ids = resolve_scope(pool, deck_id, include_subdecks).await?;
    let today_day = today(Utc::now());

    let mut new_builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT COUNT(*) FROM cards c JOIN notes n ON n.id = c.note_id WHERE c.due <= ",
    );
    new_builder.push_bind(today_day);
    new_builder.push(" AND c.state = ");
    new_builder.push_bind(CardState::New);
    new_builder.push(" AND n.deck_id IN ");
    push_id_list(&mut new_builder, &deck_ids);
    let new_remaining: i64 = new_builder.build_query_scalar().fetch_one(pool).await?;

    let mut review_builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT COUNT(*) FROM cards c JOIN notes n ON n.id = c.note_id WHERE c.due <= ",
    );
    review_builder.push_bind(today_day);
    review_builder.push(" AND c.state IN (");
    review_builder.push_bind(CardState::Review);
    review_builder.push(", ");
    review_builder.push_bind(CardState::Learning);
    review_builder.push(", ");
    review_builder.push_bind(CardState::Relearning);
    review_builder.push(") AND n.deck_id IN ");
    push_id_list(&mut review_builder, &deck_ids);
    let reviews_remaining: i64 = review_builder.build_query_scalar().fetch_one(pool).await?;

    Ok(QueueCounts {
        new_remaining: u32::try_from(new_remaining).unwrap_or(u32::MAX),
        reviews_remaining: u32::try_from(reviews_remaining).unwrap_or(u32::MAX),
    })
}

/// Picks the single highest-priority eligible card in scope, respecting
/// `config`'s daily limits. Returns `None` when the queue is exhausted for
/// today. Ordering: state priority, then `due ASC`, `queue_position ASC`
/// (`NULL` last), `id ASC` (`spec.md` §4.3, §9).
pub async fn next_card(
    pool: &SqlitePool,
    deck_id: Option<DeckId>,
    include_subdecks: bool,
    config: &DeckConfig,
) -> Result<Option<Card>, Error> {
    let deck_ids = resolve_scope(pool, deck_id, include_subdecks).await?;
    let today_day = today(Utc::now());
    let counts = todays_counts(pool, &deck_ids).await?;

    let new_exhausted = counts.new_seen >= i64::from(config.new_per_day);
    let reviews_exhausted = counts.reviews_seen >= i64::from(config.reviews_per_day);

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT c.* FROM cards c JOIN notes n ON n.id = c.note_id WHERE c.due <= ",
    );
    builder.push_bind(today_day);
    builder.push(" AND n.deck_id IN ");
    push_id_list(&mut builder, &deck_ids);

    builder.push(" AND (c.state IN (");
    builder.push_bind(CardState::Learning);
    builder.push(", ");
    builder.push_bind(CardState::Relearning);
    builder.push(")");
    if !new_exhausted {
        builder.push(" OR c.state = ");
        builder.push_bind(CardState::New);
    }
    if !reviews_exhausted {
        builder.push(" OR c.state = ");
        builder.push_bind(CardState::Review);
    }
    builder.push(")");

    let candidates: Vec<Card> = builder.build_query_as().fetch_all(pool).await?;
    Ok(candidates.into_iter().min_by_key(|c| {
        (
            c.state.queue_priority(),
            c.due,
            c.queue_position.unwrap_or(i64::MAX),
            c.id,
        )
    }))
}

/// The deck config that governs daily limits for a scope. A scope with no
/// single deck (`deck_id = None`) has no owning config, so defaults apply.
pub async fn deck_config(pool: &SqlitePool, deck_id: Option<DeckId>) -> Result<DeckConfig, Error> {
    let Some(deck_id) = deck_id else {
        return Ok(DeckConfig::default());
    };
    let deck: Deck = sqlx::query_as("SELECT * FROM decks WHERE id = ?")
        .bind(deck_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::Library(crate::LibraryError::NotFound(crate::NotFoundKind::Deck(deck_id))))?;
    Ok(DeckConfig::from_json(&deck.config_json))
}
