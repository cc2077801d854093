//! Answering a card (`spec.md` §4.1/§4.2) and fetching the next card to
//! review (`spec.md` §4.3), including the daily bury-rollover housekeeping
//! folded into `get_next_card` (grounded on the teacher's
//! `SparesInternalConfig::last_unburied` lazy-bookkeeping pattern).

use crate::helpers::today;
use crate::model::{CardId, DeckId, RatingId};
use crate::schema::{AnswerCardResponse, NextCardResponse, RenderedCard};
use crate::{cardgen, queue, scheduler, Error};
use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::SqlitePool;

/// Unburies every buried card once per calendar day, the first time
/// `get_next_card` runs that day. `meta` holds a single `last_unburied_day`
/// row so this stays idempotent within the day.
async fn unbury_all_if_new_day(pool: &SqlitePool, now: DateTime<Utc>) -> Result<(), Error> {
    let today_day = today(now);
    let last: Option<String> = sqlx::query_scalar("SELECT value FROM meta WHERE key = 'last_unburied_day'")
        .fetch_optional(pool)
        .await?;
    let last_day: i64 = last.and_then(|v| v.parse().ok()).unwrap_or(i64::MIN);
    if last_day >= today_day {
        return Ok(());
    }
    let ts = now.timestamp();
    sqlx::query(
        "UPDATE cards SET state = CASE WHEN reps = 0 THEN 0 ELSE 3 END, updated_at = ? \
         WHERE state = 5",
    )
    .bind(ts)
    .execute(pool)
    .await?;
    sqlx::query(
        "INSERT INTO meta (key, value) VALUES ('last_unburied_day', ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(today_day.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// # Errors
///
/// Bubbles up `Error::Sqlx`/`Error::Library` from deck lookup or card
/// rendering. The daily unbury-rollover write is skipped when `readonly` is
/// set, so this stays safe to call from a read-only server (`spec.md` §5).
pub async fn get_next_card(
    pool: &SqlitePool,
    deck_id: Option<DeckId>,
    include_subdecks: bool,
    now: DateTime<Utc>,
    readonly: bool,
) -> Result<NextCardResponse, Error> {
    if !readonly {
        unbury_all_if_new_day(pool, now).await?;
    }
    let config = queue::deck_config(pool, deck_id).await?;
    let picked = queue::next_card(pool, deck_id, include_subdecks, &config).await?;
    let counts = queue::queue_counts(pool, deck_id, include_subdecks).await?;
    let card = match picked {
        None => None,
        Some(card) => {
            let note = super::card::owning_note(pool, &card).await?;
            let (question, answer) = cardgen::render(&note, &card);
            Some(RenderedCard {
                card: super::card::to_view(&card, note.deck_id),
                question,
                answer,
            })
        }
    };
    Ok(NextCardResponse { card, counts })
}

/// Runs `scheduler::schedule`, persists the card's new state, appends a
/// review log row, and buries sibling cards when the owning deck's
/// `bury_siblings` is set, all in one transaction.
///
/// # Errors
///
/// Returns `Error::Library(LibraryError::InvalidState)` if `rating` is out
/// of range or the card isn't in a schedulable state.
pub async fn answer_card(
    pool: &SqlitePool,
    card_id: CardId,
    rating: RatingId,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Result<AnswerCardResponse, Error> {
    let card = super::card::get_card(pool, card_id).await?;
    let note = super::card::owning_note(pool, &card).await?;
    let config = queue::deck_config(pool, Some(note.deck_id)).await?;

    let outcome = scheduler::schedule(&card, rating, now, &config, rng)?;

    let mut tx = pool.begin().await?;
    let ts = now.timestamp();
    sqlx::query(
        "UPDATE cards SET state = ?, due = ?, ivl = ?, ease = ?, reps = ?, lapses = ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(outcome.card.state)
    .bind(outcome.card.due)
    .bind(outcome.card.ivl)
    .bind(outcome.card.ease)
    .bind(outcome.card.reps)
    .bind(outcome.card.lapses)
    .bind(ts)
    .bind(card_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO reviews (card_id, ts, rating, ivl_before, ivl_after, ease_before, \
         ease_after, state_before, state_after) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(card_id)
    .bind(ts)
    .bind(i64::from(rating))
    .bind(outcome.ivl_before)
    .bind(outcome.card.ivl)
    .bind(outcome.ease_before)
    .bind(outcome.card.ease)
    .bind(outcome.state_before)
    .bind(outcome.card.state)
    .execute(&mut *tx)
    .await?;

    if outcome.leech_tag_requested {
        let mut tags = note.tag_list();
        if !tags.iter().any(|t| t == "leech") {
            tags.push("leech".to_string());
            sqlx::query("UPDATE notes SET tags = ?, updated_at = ? WHERE id = ?")
                .bind(crate::helpers::join_list(&tags))
                .bind(ts)
                .bind(note.id)
                .execute(&mut *tx)
                .await?;
        }
    }

    if config.bury_siblings {
        sqlx::query(
            "UPDATE cards SET state = 5, updated_at = ? \
             WHERE note_id = ? AND id != ? AND state NOT IN (4, 5)",
        )
        .bind(ts)
        .bind(card.note_id)
        .bind(card_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let updated = super::card::get_card(pool, card_id).await?;
    let counts = queue::queue_counts(pool, Some(note.deck_id), false).await?;
    Ok(AnswerCardResponse {
        card: super::card::to_view(&updated, note.deck_id),
        counts,
    })
}
