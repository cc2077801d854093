//! Parses lexer tokens into `Predicate`s (`spec.md` §4.4). A term with an
//! unrecognised `key:` is silently dropped rather than rejected — the
//! grammar has no error path for unknown keys, matching the teacher's own
//! "best effort" parser tolerance for forward-compatible query strings.

use super::lexer::{tokenize, Token};
use super::{Cmp, IsValue, Predicate};
use crate::model::CardState;
use std::str::FromStr;

pub fn parse(query: &str) -> Vec<Predicate> {
    tokenize(query)
        .into_iter()
        .filter_map(|token| parse_term(&token))
        .collect()
}

fn parse_term(token: &Token) -> Option<Predicate> {
    let text = token.text.as_str();
    let Some((key, value)) = text.split_once(':') else {
        return Some(Predicate::Bare(text.to_string()));
    };
    if value.is_empty() {
        return Some(Predicate::Bare(text.to_string()));
    }
    match key {
        "deck" => Some(Predicate::Deck(value.to_string())),
        "tag" => Some(Predicate::Tag(value.to_string())),
        "note" => Some(Predicate::Note(value.to_string())),
        "is" => parse_is(value),
        "rated" => parse_rated(value),
        "prop" => parse_prop(value),
        _ => None,
    }
}

fn parse_is(value: &str) -> Option<Predicate> {
    let is = match value {
        "due" => IsValue::Due,
        "learning" => IsValue::Learning,
        other => IsValue::State(CardState::from_str(other).ok()?),
    };
    Some(Predicate::Is(is))
}

/// `rated:N` → "within the last N days"; `rated:a..b` → "between a and b
/// days ago inclusive" (`spec.md` §9 fixes the source's reversed bounds:
/// `a` must be `<= b`).
fn parse_rated(value: &str) -> Option<Predicate> {
    if let Some((a, b)) = value.split_once("..") {
        let a: i64 = a.parse().ok()?;
        let b: i64 = b.parse().ok()?;
        if a > b {
            return None;
        }
        return Some(Predicate::RatedBetweenDaysAgo { a, b });
    }
    Some(Predicate::RatedWithinDays(value.parse().ok()?))
}

/// `prop:ivl>N`, `prop:ivl<N`, `prop:ease>N`, `prop:ease<N`.
fn parse_prop(value: &str) -> Option<Predicate> {
    let (field, cmp, amount) = if let Some(rest) = value.strip_prefix("ivl>") {
        ("ivl", Cmp::GreaterThan, rest)
    } else if let Some(rest) = value.strip_prefix("ivl<") {
        ("ivl", Cmp::LessThan, rest)
    } else if let Some(rest) = value.strip_prefix("ease>") {
        ("ease", Cmp::GreaterThan, rest)
    } else if let Some(rest) = value.strip_prefix("ease<") {
        ("ease", Cmp::LessThan, rest)
    } else {
        return None;
    };
    match field {
        "ivl" => Some(Predicate::PropIvl(cmp, amount.parse().ok()?)),
        "ease" => Some(Predicate::PropEase(cmp, amount.parse().ok()?)),
        _ => unreachable!(),
    }
}
