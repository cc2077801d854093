//! Compiles a predicate list into one SQL query and executes it, mirroring
//! the teacher's `search/evaluator.rs` approach of pushing the grammar down
//! into `sqlx::QueryBuilder` rather than filtering rows in process.

use super::{parser, Cmp, IsValue, Predicate};
use crate::helpers::today;
use crate::model::{Card, CardState};
use crate::Error;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

pub const DEFAULT_LIMIT: i64 = 100;

/// Runs a search string against the database and returns matching cards,
/// ordered `due ASC, id ASC` and bounded by `limit` (defaults to
/// [`DEFAULT_LIMIT`] when `None`).
pub async fn search_cards(
    pool: &SqlitePool,
    query: &str,
    limit: Option<i64>,
) -> Result<Vec<Card>, Error> {
    let predicates = parser::parse(query);
    let today_day = today(Utc::now());
    let now_ts = Utc::now().timestamp();
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT c.* FROM cards c \
         JOIN notes n ON n.id = c.note_id \
         JOIN decks d ON d.id = n.deck_id WHERE 1=1",
    );

    for predicate in &predicates {
        match predicate {
            Predicate::Deck(name) => {
                builder.push(" AND d.name LIKE ");
                builder.push_bind(format!("%{name}%"));
            }
            Predicate::Tag(tag) => {
                builder.push(" AND (' ' || n.tags || ' ') LIKE ");
                builder.push_bind(format!("% {tag} %"));
            }
            Predicate::Note(text) => {
                builder.push(" AND instr(n.fields_json, ");
                builder.push_bind(text.clone());
                builder.push(") > 0");
            }
            Predicate::Is(is) => match is {
                IsValue::Due => {
                    builder.push(" AND c.due <= ");
                    builder.push_bind(today_day);
                    builder.push(" AND c.state IN (");
                    builder.push_bind(CardState::Review);
                    builder.push(", ");
                    builder.push_bind(CardState::Learning);
                    builder.push(", ");
                    builder.push_bind(CardState::Relearning);
                    builder.push(")");
                }
                IsValue::Learning => {
                    builder.push(" AND c.state IN (");
                    builder.push_bind(CardState::Learning);
                    builder.push(", ");
                    builder.push_bind(CardState::Relearning);
                    builder.push(")");
                }
                IsValue::State(state) => {
                    builder.push(" AND c.state = ");
                    builder.push_bind(*state);
                }
            },
            Predicate::RatedWithinDays(days) => {
                let since_ts = now_ts - days * 86400;
                builder.push(" AND EXISTS (SELECT 1 FROM reviews r WHERE r.card_id = c.id AND r.ts >= ");
                builder.push_bind(since_ts);
                builder.push(")");
            }
            Predicate::RatedBetweenDaysAgo { a, b } => {
                let since_ts = now_ts - b * 86400;
                let until_ts = now_ts - a * 86400;
                builder.push(
                    " AND EXISTS (SELECT 1 FROM reviews r WHERE r.card_id = c.id AND r.ts >= ",
                );
                builder.push_bind(since_ts);
                builder.push(" AND r.ts <= ");
                builder.push_bind(until_ts);
                builder.push(")");
            }
            Predicate::PropIvl(cmp, amount) => {
                builder.push(" AND c.ivl ");
                builder.push(cmp_op(*cmp));
                builder.push(" ");
                builder.push_bind(*amount);
            }
            Predicate::PropEase(cmp, amount) => {
                builder.push(" AND c.ease ");
                builder.push(cmp_op(*cmp));
                builder.push(" ");
                builder.push_bind(*amount);
            }
            Predicate::Bare(text) => {
                builder.push(" AND instr(n.fields_json, ");
                builder.push_bind(text.clone());
                builder.push(") > 0");
            }
        }
    }

    builder.push(" ORDER BY c.due ASC, c.id ASC LIMIT ");
    builder.push_bind(limit.unwrap_or(DEFAULT_LIMIT));

    let cards = builder.build_query_as::<Card>().fetch_all(pool).await?;
    Ok(cards)
}

fn cmp_op(cmp: Cmp) -> &'static str {
    match cmp {
        Cmp::GreaterThan => ">",
        Cmp::LessThan => "<",
    }
}
