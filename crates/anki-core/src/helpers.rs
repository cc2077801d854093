use chrono::{DateTime, NaiveDate, TimeZone, Utc};

/// Epoch-day: integer count of UTC days since 1970-01-01. `due` is always
/// expressed in this unit so "today" is a stable, timezone-free key.
pub fn epoch_day(at: DateTime<Utc>) -> i64 {
    at.date_naive().signed_duration_since(epoch()).num_days()
}

pub fn epoch_day_to_date(day: i64) -> NaiveDate {
    epoch() + chrono::Duration::days(day)
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

pub fn today(at: DateTime<Utc>) -> i64 {
    epoch_day(at)
}

/// Whitespace-delimited list, used for both note tags and CSV `tags` columns.
pub fn parse_list(data: &str) -> Vec<String> {
    data.split_whitespace()
        .map(str::to_owned)
        .filter(|x| !x.is_empty())
        .collect()
}

pub fn join_list(items: &[String]) -> String {
    items.join(" ")
}

#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn start_of_day_utc(day: i64) -> DateTime<Utc> {
    Utc.from_utc_datetime(&epoch_day_to_date(day).and_hms_opt(0, 0, 0).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn epoch_day_of_unix_epoch_is_zero() {
        let at = Utc.with_ymd_and_hms(1970, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(epoch_day(at), 0);
    }

    #[test]
    fn epoch_day_round_trips() {
        let at = Utc.with_ymd_and_hms(2026, 7, 28, 3, 0, 0).unwrap();
        let day = epoch_day(at);
        assert_eq!(epoch_day_to_date(day), at.date_naive());
    }

    #[test]
    fn parse_list_trims_and_drops_empty() {
        assert_eq!(
            parse_list("greeting   spanish"),
            vec!["greeting".to_string(), "spanish".to_string()]
        );
        assert_eq!(parse_list(""), Vec::<String>::new());
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
    }
}
