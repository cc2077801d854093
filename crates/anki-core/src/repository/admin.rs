//! Bulk card-state management (`spec.md` §4.2, §6): suspend, unsuspend,
//! bury, unbury, reset, delete. Each is a fold over `scheduler::admin`'s
//! pure transitions the way `answer_card` folds over `scheduler::schedule`.

use crate::model::{Card, CardId};
use crate::scheduler::admin;
use crate::schema::BulkCardResult;
use crate::Error;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

async fn apply_transition(
    pool: &SqlitePool,
    card_ids: &[CardId],
    now: DateTime<Utc>,
    transition: impl Fn(&Card, DateTime<Utc>) -> Card,
) -> Result<BulkCardResult, Error> {
    let mut updated = 0;
    for &id in card_ids {
        let card = super::card::get_card(pool, id).await?;
        let next = transition(&card, now);
        sqlx::query(
            "UPDATE cards SET state = ?, due = ?, ivl = ?, ease = ?, reps = ?, lapses = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(next.state)
        .bind(next.due)
        .bind(next.ivl)
        .bind(next.ease)
        .bind(next.reps)
        .bind(next.lapses)
        .bind(now.timestamp())
        .bind(id)
        .execute(pool)
        .await?;
        updated += 1;
    }
    Ok(BulkCardResult { updated })
}

pub async fn suspend(pool: &SqlitePool, card_ids: &[CardId], now: DateTime<Utc>) -> Result<BulkCardResult, Error> {
    apply_transition(pool, card_ids, now, admin::suspend).await
}

pub async fn unsuspend(pool: &SqlitePool, card_ids: &[CardId], now: DateTime<Utc>) -> Result<BulkCardResult, Error> {
    apply_transition(pool, card_ids, now, admin::unsuspend).await
}

pub async fn bury(pool: &SqlitePool, card_ids: &[CardId], now: DateTime<Utc>) -> Result<BulkCardResult, Error> {
    apply_transition(pool, card_ids, now, admin::bury).await
}

pub async fn unbury(pool: &SqlitePool, card_ids: &[CardId], now: DateTime<Utc>) -> Result<BulkCardResult, Error> {
    apply_transition(pool, card_ids, now, admin::unbury).await
}

pub async fn reset(pool: &SqlitePool, card_ids: &[CardId], now: DateTime<Utc>) -> Result<BulkCardResult, Error> {
    apply_transition(pool, card_ids, now, admin::reset).await
}

/// Deletes cards outright, along with their review log (`spec.md` §4.2:
/// delete is the one admin operation with no scheduler counterpart).
pub async fn delete(pool: &SqlitePool, card_ids: &[CardId]) -> Result<BulkCardResult, Error> {
    let mut updated = 0;
    for &id in card_ids {
        super::card::get_card(pool, id).await?;
        sqlx::query("DELETE FROM reviews WHERE card_id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        sqlx::query("DELETE FROM cards WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        updated += 1;
    }
    Ok(BulkCardResult { updated })
}
