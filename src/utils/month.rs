//! Report month tags.

use chrono::{Datelike, Local, NaiveDate};

/// Format a year and month as `YYYYMM`.
pub fn month_tag(year: i32, month: u32) -> String {
    format!("{:04}{:02}", year, month)
}

/// Tag of the calendar month before the one containing `today`.
pub fn previous_month_tag(today: NaiveDate) -> String {
    if today.month() == 1 {
        month_tag(today.year() - 1, 12)
    } else {
        month_tag(today.year(), today.month() - 1)
    }
}

/// Previous month tag based on the local clock.
pub fn previous_month_tag_now() -> String {
    previous_month_tag(Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_previous_month_mid_year() {
        assert_eq!(previous_month_tag(date(2024, 7, 15)), "202406");
    }

    #[test]
    fn test_previous_month_wraps_year() {
        assert_eq!(previous_month_tag(date(2024, 1, 1)), "202312");
        assert_eq!(previous_month_tag(date(2024, 1, 31)), "202312");
    }

    #[test]
    fn test_previous_month_first_and_last_day() {
        assert_eq!(previous_month_tag(date(2024, 3, 1)), "202402");
        assert_eq!(previous_month_tag(date(2024, 12, 31)), "202411");
    }

    #[test]
    fn test_month_tag_pads() {
        assert_eq!(month_tag(2025, 3), "202503");
        assert_eq!(month_tag(987, 11), "098711");
    }
}
