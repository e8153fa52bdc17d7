//! Upcoming-birthday rules.
//!
//! A birthday is "upcoming" when its next anniversary, ignoring the birth
//! year, falls within `today..=today + window`. People born on 29 February
//! celebrate on 28 February in common years.

use chrono::{Datelike, NaiveDate};

/// Default look-ahead used by the upcoming birthdays listing.
pub const UPCOMING_WINDOW_DAYS: i64 = 7;

/// The anniversary of `birthday` in `year`.
fn anniversary_in(birthday: NaiveDate, year: i32) -> Option<NaiveDate> {
    birthday
        .with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
}

/// The first anniversary of `birthday` on or after `today`.
pub fn next_occurrence(birthday: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    let this_year = anniversary_in(birthday, today.year())?;
    if this_year >= today {
        Some(this_year)
    } else {
        anniversary_in(birthday, today.year() + 1)
    }
}

/// Days from `today` until the next anniversary (0 when it is today).
pub fn days_until(birthday: NaiveDate, today: NaiveDate) -> Option<i64> {
    next_occurrence(birthday, today).map(|next| (next - today).num_days())
}

/// Whether the next anniversary lies within `window_days` of `today`.
pub fn is_upcoming(birthday: NaiveDate, today: NaiveDate, window_days: i64) -> bool {
    days_until(birthday, today).is_some_and(|days| days <= window_days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn birth_year_is_ignored() {
        assert!(is_upcoming(d(1990, 3, 12), d(2024, 3, 10), 7));
    }

    #[test]
    fn today_counts() {
        assert_eq!(days_until(d(1985, 6, 1), d(2024, 6, 1)), Some(0));
        assert!(is_upcoming(d(1985, 6, 1), d(2024, 6, 1), 7));
    }

    #[test]
    fn window_is_inclusive() {
        assert!(is_upcoming(d(2000, 1, 8), d(2024, 1, 1), 7));
        assert!(!is_upcoming(d(2000, 1, 9), d(2024, 1, 1), 7));
    }

    #[test]
    fn passed_birthday_rolls_to_next_year() {
        assert_eq!(
            next_occurrence(d(1970, 1, 2), d(2024, 12, 28)),
            Some(d(2025, 1, 2))
        );
        assert!(is_upcoming(d(1970, 1, 2), d(2024, 12, 28), 7));
        assert!(!is_upcoming(d(1970, 12, 27), d(2024, 12, 28), 7));
    }

    #[test]
    fn leap_day_in_common_year() {
        assert_eq!(
            next_occurrence(d(2000, 2, 29), d(2023, 2, 20)),
            Some(d(2023, 2, 28))
        );
        assert_eq!(
            next_occurrence(d(2000, 2, 29), d(2024, 2, 20)),
            Some(d(2024, 2, 29))
        );
    }
}
