//! The Anki-style search query engine (`spec.md` §4.4): a tokenising lexer,
//! a parser that compiles tokens to a predicate list, and an evaluator that
//! compiles the predicate list to a relational query. Terms are always
//! ANDed — there is no disjunction or negation in this grammar, and none
//! should be added silently (`spec.md` §9).

pub mod evaluator;
pub mod lexer;
pub mod parser;

pub use evaluator::search_cards;

use crate::model::CardState;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cmp {
    GreaterThan,
    LessThan,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IsValue {
    /// `due ≤ today AND state ∈ {review,learning,relearning}`.
    Due,
    /// `state ∈ {learning, relearning}`.
    Learning,
    /// `state = v` for any other named state.
    State(CardState),
}

/// A single compiled search term. Unknown `key:value` terms never reach
/// this type — the parser drops them (`spec.md` §4.4, documented silent
/// behaviour).
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    /// Deck name `LIKE %v%`, not a hierarchy-scope expansion.
    Deck(String),
    Tag(String),
    Is(IsValue),
    /// "a review exists with `ts ≥ now − d·86400`".
    RatedWithinDays(i64),
    /// "a review exists with `ts ∈ [now − b·86400, now − a·86400]`", `a ≤ b`.
    RatedBetweenDaysAgo { a: i64, b: i64 },
    PropIvl(Cmp, i64),
    PropEase(Cmp, f64),
    /// Same field-text substring search as `Bare`, spelled `note:` in the
    /// query string (`spec.md` §4.4 lists them as two distinct keys with
    /// the same predicate).
    Note(String),
    Bare(String),
}
