//! SM-2-derived scheduler (`spec.md` §4.1). `schedule` is a pure function:
//! given a card's current state, a rating, the wall clock, and the owning
//! deck's configuration, it computes the card's next state. The caller
//! persists the result and appends to the review log atomically
//! (`crate::repository::review::answer_card`).

use crate::config::{DeckConfig, LeechAction};
use crate::model::{Card, CardState, RatingId};
use crate::{Error, LibraryError};
use chrono::{DateTime, Utc};
use rand::Rng;

/// The result of scheduling one review: the card's new fields plus the
/// before-state needed to write the review log, and an advisory flag for
/// the leech "tag" policy (applying a tag is the caller's responsibility;
/// see `spec.md` §9).
#[derive(Clone, Debug)]
pub struct ScheduleOutcome {
    pub state_before: CardState,
    pub ivl_before: i64,
    pub ease_before: f64,
    pub card: Card,
    pub leech_tag_requested: bool,
}

fn fuzz(rng: &mut impl Rng, fuzz_percent: f64) -> f64 {
    if fuzz_percent <= 0.0 {
        return 1.0;
    }
    rng.gen_range((1.0 - fuzz_percent)..=(1.0 + fuzz_percent))
}

/// # Errors
///
/// Returns `LibraryError::InvalidState` if `card.state` is not one of the
/// six states the scheduler knows how to transition from, and bubbles up
/// any other programmer error the same way.
pub fn schedule(
    card: &Card,
    rating: RatingId,
    now: DateTime<Utc>,
    config: &DeckConfig,
    rng: &mut impl Rng,
) -> Result<ScheduleOutcome, Error> {
    if !(1..=4).contains(&rating) {
        return Err(Error::Library(LibraryError::InvalidState(format!(
            "rating must be 1-4, received {rating}"
        ))));
    }
    let today = crate::helpers::today(now);
    let mut next = card.clone();
    let state_before = card.state;
    let ivl_before = card.ivl;
    let ease_before = card.ease;
    let mut leech_tag_requested = false;

    match card.state {
        CardState::New => {
            next.reps += 1;
            match rating {
                1..=3 => {
                    next.state = CardState::Learning;
                    next.ivl = 0;
                    next.due = today;
                }
                4 => {
                    next.state = CardState::Review;
                    next.ivl = (config.graduating_interval_days as f64 * config.easy_bonus).ceil() as i64;
                    next.due = today + next.ivl;
                    next.ease = 2.65;
                }
                _ => unreachable!("rating validated above"),
            }
        }
        CardState::Learning | CardState::Relearning => match rating {
            1 => {
                next.ivl = 0;
                next.due = today;
            }
            2 | 3 => {
                next.state = CardState::Review;
                next.ivl = config.graduating_interval_days;
                next.due = today + next.ivl;
            }
            4 => {
                next.state = CardState::Review;
                next.ivl = (config.graduating_interval_days as f64 * config.easy_bonus).ceil() as i64;
                next.due = today + next.ivl;
                next.ease += 0.15;
            }
            _ => unreachable!("rating validated above"),
        },
        CardState::Review => {
            next.reps += 1;
            match rating {
                1 => {
                    next.lapses += 1;
                    next.state = CardState::Relearning;
                    next.ease = f64::max(config.min_ease, card.ease - 0.2);
                    next.ivl = 0;
                    next.due = today;
                    if next.lapses >= i64::from(config.leech_threshold) {
                        match config.leech_action {
                            LeechAction::Suspend => next.state = CardState::Suspended,
                            LeechAction::Tag => leech_tag_requested = true,
                        }
                    }
                }
                2 => {
                    next.ease = f64::max(config.min_ease, card.ease - 0.15);
                    let f = fuzz(rng, config.fuzz_percent);
                    next.ivl = i64::max(1, (card.ivl as f64 * config.hard_interval * f).ceil() as i64);
                    next.due = today + next.ivl;
                }
                3 => {
                    let f = fuzz(rng, config.fuzz_percent);
                    next.ivl = i64::max(1, (card.ivl as f64 * card.ease * f).ceil() as i64);
                    next.due = today + next.ivl;
                }
                4 => {
                    next.ease += 0.15;
                    let f = fuzz(rng, config.fuzz_percent);
                    next.ivl = i64::max(
                        1,
                        (card.ivl as f64 * next.ease * config.easy_bonus * f).ceil() as i64,
                    );
                    next.due = today + next.ivl;
                }
                _ => unreachable!("rating validated above"),
            }
        }
        CardState::Suspended | CardState::Buried => {
            return Err(Error::Library(LibraryError::InvalidState(format!(
                "cannot schedule a card in state `{}`",
                card.state
            ))));
        }
    }

    next.updated_at = now;
    Ok(ScheduleOutcome {
        state_before,
        ivl_before,
        ease_before,
        card: next,
        leech_tag_requested,
    })
}

/// Admin transitions outside the scheduler (`spec.md` §4.2).
pub mod admin {
    use super::{Card, CardState, DateTime, Utc};

    pub fn suspend(card: &Card, now: DateTime<Utc>) -> Card {
        let mut c = card.clone();
        c.state = CardState::Suspended;
        c.updated_at = now;
        c
    }

    pub fn unsuspend(card: &Card, now: DateTime<Utc>) -> Card {
        let mut c = card.clone();
        c.state = if card.reps == 0 {
            CardState::New
        } else {
            CardState::Review
        };
        c.updated_at = now;
        c
    }

    pub fn bury(card: &Card, now: DateTime<Utc>) -> Card {
        let mut c = card.clone();
        c.state = CardState::Buried;
        c.updated_at = now;
        c
    }

    pub fn unbury(card: &Card, now: DateTime<Utc>) -> Card {
        let mut c = card.clone();
        c.state = if card.reps == 0 {
            CardState::New
        } else {
            CardState::Review
        };
        c.updated_at = now;
        c
    }

    pub fn reset(card: &Card, now: DateTime<Utc>) -> Card {
        let mut c = card.clone();
        c.state = CardState::New;
        c.due = 0;
        c.ivl = 0;
        c.ease = 2.5;
        c.reps = 0;
        c.lapses = 0;
        c.updated_at = now;
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CardState;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn no_fuzz_config() -> DeckConfig {
        DeckConfig {
            fuzz_percent: 0.0,
            ..DeckConfig::default()
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn scenario_3_new_card_easy_graduates() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let card = Card::new(1, "forward", now);
        let config = no_fuzz_config();
        let outcome = schedule(&card, 4, now, &config, &mut rng()).unwrap();
        assert_eq!(outcome.card.state, CardState::Review);
        assert_eq!(outcome.card.ivl, 2);
        assert!((outcome.card.ease - 2.65).abs() < f64::EPSILON);
        let today = crate::helpers::today(now);
        assert_eq!(outcome.card.due, today + 2);
    }

    #[test]
    fn scenario_4_review_lapse_hits_leech_threshold() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut card = Card::new(1, "forward", now);
        card.state = CardState::Review;
        card.ivl = 10;
        card.ease = 2.5;
        card.lapses = 7;
        let config = DeckConfig {
            leech_threshold: 8,
            ..no_fuzz_config()
        };
        let outcome = schedule(&card, 1, now, &config, &mut rng()).unwrap();
        assert_eq!(outcome.card.lapses, 8);
        assert_eq!(outcome.card.state, CardState::Suspended);
        assert!((outcome.card.ease - 2.3).abs() < f64::EPSILON);
        assert_eq!(outcome.card.ivl, 0);
    }

    #[test]
    fn good_rating_strictly_increases_interval_without_fuzz() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut card = Card::new(1, "forward", now);
        card.state = CardState::Review;
        card.ivl = 5;
        card.ease = 2.5;
        let config = no_fuzz_config();
        let outcome = schedule(&card, 3, now, &config, &mut rng()).unwrap();
        assert!(outcome.card.ivl > 5);
    }

    #[test]
    fn scheduling_a_suspended_card_is_invalid_state() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut card = Card::new(1, "forward", now);
        card.state = CardState::Suspended;
        let err = schedule(&card, 3, now, &no_fuzz_config(), &mut rng()).unwrap_err();
        assert!(matches!(
            err,
            Error::Library(LibraryError::InvalidState(_))
        ));
    }

    #[test]
    fn leech_tag_action_requests_tag_without_suspending() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut card = Card::new(1, "forward", now);
        card.state = CardState::Review;
        card.ivl = 10;
        card.ease = 2.5;
        card.lapses = 7;
        let config = DeckConfig {
            leech_threshold: 8,
            leech_action: LeechAction::Tag,
            ..no_fuzz_config()
        };
        let outcome = schedule(&card, 1, now, &config, &mut rng()).unwrap();
        assert_eq!(outcome.card.state, CardState::Relearning);
        assert!(outcome.leech_tag_requested);
    }

    #[test]
    fn learning_good_rating_graduates_preserving_ease() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut card = Card::new(1, "forward", now);
        card.state = CardState::Learning;
        card.ease = 2.5;
        let config = no_fuzz_config();
        let outcome = schedule(&card, 3, now, &config, &mut rng()).unwrap();
        assert_eq!(outcome.card.state, CardState::Review);
        assert_eq!(outcome.card.ivl, config.graduating_interval_days);
        assert!((outcome.card.ease - 2.5).abs() < f64::EPSILON);
    }
}
