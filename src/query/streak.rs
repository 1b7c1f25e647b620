//! Streak counting over goal-completed dates.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Streaks {
    /// Consecutive completed days ending today, or ending yesterday while
    /// today is still in progress.
    pub current: u32,
    pub longest: u32,
}

/// Computes streaks from completed dates. Duplicates are fine; dates later
/// than `today` are ignored.
pub fn compute_streaks(dates: impl IntoIterator<Item = NaiveDate>, today: NaiveDate) -> Streaks {
    let completed: BTreeSet<NaiveDate> = dates.into_iter().filter(|d| *d <= today).collect();

    Streaks {
        current: current_streak(&completed, today),
        longest: longest_streak(&completed),
    }
}

fn current_streak(completed: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    // An unfinished today does not break the streak, so the walk may start
    // from yesterday instead.
    let mut day = if completed.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut length = 0;
    while completed.contains(&day) {
        length += 1;
        day -= Duration::days(1);
    }
    length
}

fn longest_streak(completed: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for &date in completed {
        run = match previous {
            Some(p) if date - p == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(date);
    }
    longest
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::compute_streaks;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn empty_input_has_no_streaks() {
        let streaks = compute_streaks(vec![], date(10));
        assert_eq!(streaks.current, 0);
        assert_eq!(streaks.longest, 0);
    }

    #[test]
    fn current_counts_back_from_today() {
        let streaks = compute_streaks(vec![date(8), date(9), date(10)], date(10));
        assert_eq!(streaks.current, 3);
        assert_eq!(streaks.longest, 3);
    }

    #[test]
    fn incomplete_today_falls_back_to_yesterday() {
        let streaks = compute_streaks(vec![date(7), date(8), date(9)], date(10));
        assert_eq!(streaks.current, 3);
    }

    #[test]
    fn gap_before_yesterday_resets_current() {
        let streaks = compute_streaks(vec![date(5), date(6), date(10)], date(10));
        assert_eq!(streaks.current, 1);
        assert_eq!(streaks.longest, 2);
    }

    #[test]
    fn two_day_gap_means_no_current_streak() {
        let streaks = compute_streaks(vec![date(5), date(6), date(7)], date(10));
        assert_eq!(streaks.current, 0);
        assert_eq!(streaks.longest, 3);
    }

    #[test]
    fn duplicates_and_future_dates_are_ignored() {
        let streaks = compute_streaks(vec![date(9), date(9), date(10), date(25)], date(10));
        assert_eq!(streaks.current, 2);
        assert_eq!(streaks.longest, 2);
    }
}
