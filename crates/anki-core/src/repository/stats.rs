//! `stats` (`spec.md` supplemented features), grounded on the teacher's
//! `api/statistics.rs` aggregate-query style.

use crate::helpers::{mean, start_of_day_utc, today};
use crate::model::{CardState, DeckId};
use crate::schema::StatsResponse;
use crate::Error;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeMap;

pub async fn stats(pool: &SqlitePool, deck_id: Option<DeckId>) -> Result<StatsResponse, Error> {
    let deck_ids = match deck_id {
        Some(root) => crate::queue::deck_subtree_ids(pool, root).await?,
        None => sqlx::query_scalar("SELECT id FROM decks").fetch_all(pool).await?,
    };

    let mut by_state = BTreeMap::new();
    let mut total_cards = 0u32;
    for state in [
        CardState::New,
        CardState::Learning,
        CardState::Relearning,
        CardState::Review,
        CardState::Suspended,
        CardState::Buried,
    ] {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) FROM cards c JOIN notes n ON n.id = c.note_id WHERE c.state = ",
        );
        builder.push_bind(state);
        builder.push(" AND n.deck_id IN (");
        let mut sep = builder.separated(", ");
        for id in &deck_ids {
            sep.push_bind(*id);
        }
        builder.push(")");
        let count: i64 = builder.build_query_scalar().fetch_one(pool).await?;
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        total_cards += count;
        by_state.insert(state.to_string(), count);
    }

    let today_start = start_of_day_utc(today(Utc::now())).timestamp();
    let mut reviews_builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT COUNT(*) FROM reviews r JOIN cards c ON c.id = r.card_id \
         JOIN notes n ON n.id = c.note_id WHERE r.ts >= ",
    );
    reviews_builder.push_bind(today_start);
    reviews_builder.push(" AND n.deck_id IN (");
    let mut sep = reviews_builder.separated(", ");
    for id in &deck_ids {
        sep.push_bind(*id);
    }
    reviews_builder.push(")");
    let reviews_today: i64 = reviews_builder.build_query_scalar().fetch_one(pool).await?;

    let mut ease_builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT c.ease, c.ivl FROM cards c JOIN notes n ON n.id = c.note_id \
         WHERE c.state = ",
    );
    ease_builder.push_bind(CardState::Review);
    ease_builder.push(" AND n.deck_id IN (");
    let mut sep = ease_builder.separated(", ");
    for id in &deck_ids {
        sep.push_bind(*id);
    }
    ease_builder.push(")");
    let rows: Vec<(f64, i64)> = ease_builder.build_query_as().fetch_all(pool).await?;
    let eases: Vec<f64> = rows.iter().map(|(e, _)| *e).collect();
    #[allow(clippy::cast_precision_loss)]
    let ivls: Vec<f64> = rows.iter().map(|(_, i)| *i as f64).collect();

    let leech_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notes WHERE (' ' || tags || ' ') LIKE '% leech %'",
    )
    .fetch_one(pool)
    .await?;

    Ok(StatsResponse {
        total_cards,
        by_state,
        reviews_today: u32::try_from(reviews_today).unwrap_or(u32::MAX),
        average_ease: mean(&eases),
        average_interval_days: mean(&ivls),
        leech_count: u32::try_from(leech_count).unwrap_or(u32::MAX),
    })
}
