use chrono::NaiveDate;

/// This is the standard way of converting a date to a string in wordwatch.
/// Doubles as the day file name inside the record directory.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses a day file name back into a date. Files that don't follow the
/// `date_to_record_name` format return None and are skipped by callers.
pub fn record_name_to_date(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(name, "%Y-%m-%d").ok()
}

/// Inclusive sequence of days between two dates. Used when a query has to
/// visit one day file per date.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{date_to_record_name, days_between, record_name_to_date};

    #[test]
    fn record_name_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(date_to_record_name(date), "2024-03-07");
        assert_eq!(record_name_to_date("2024-03-07"), Some(date));
        assert_eq!(record_name_to_date("daemon.log"), None);
    }

    #[test]
    fn days_between_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let days = days_between(start, end).collect::<Vec<_>>();
        assert_eq!(days.len(), 4);
        assert_eq!(days[0], start);
        assert_eq!(days[3], end);
    }
}
