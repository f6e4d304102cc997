//! Calendar helpers for puzzle dates.
//!
//! Two string forms circulate: the log key `M/D/YYYY` (no padding) used to
//! index the puzzle log, and the URL segment `YYYY/MM/DD` (padded) used in
//! puzzle page paths.

use std::sync::LazyLock;

use anyhow::Result;
use chrono::{DateTime, Datelike, Days, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use regex::Regex;

use crate::error::TrackerError;

/// First published mini puzzle. Nothing before this date exists on the site.
pub const FLOOR_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2014, 8, 21) {
    Some(d) => d,
    None => panic!("floor date"),
};

static URL_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})/(\d{2})/(\d{2})").expect("url date regex"));

/// When the site rolls over to the next day's puzzle.
#[derive(Debug, Clone, Copy)]
pub struct ReleaseSchedule {
    pub tz: Tz,
    /// Hour (reference tz) at which the next puzzle appears, Sunday..Friday.
    pub weekday_hour: u32,
    /// Hour at which Sunday's puzzle appears on Saturday.
    pub saturday_hour: u32,
}

impl Default for ReleaseSchedule {
    fn default() -> Self {
        Self {
            tz: chrono_tz::America::New_York,
            weekday_hour: 22,
            saturday_hour: 18,
        }
    }
}

/// The calendar date the site currently treats as "today's puzzle".
pub fn published_puzzle_date(now: DateTime<Utc>, schedule: &ReleaseSchedule) -> NaiveDate {
    let local = now.with_timezone(&schedule.tz);
    let release_hour = if local.weekday() == Weekday::Sat {
        schedule.saturday_hour
    } else {
        schedule.weekday_hour
    };
    let date = local.date_naive();
    if local.hour() >= release_hour {
        date.succ_opt().unwrap_or(date)
    } else {
        date
    }
}

pub fn published_puzzle_date_now(schedule: &ReleaseSchedule) -> NaiveDate {
    published_puzzle_date(Utc::now(), schedule)
}

/// `6/1/2024`
pub fn log_key(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.month(), date.day(), date.year())
}

/// `2024/06/01`
pub fn url_segment(date: NaiveDate) -> String {
    format!("{:04}/{:02}/{:02}", date.year(), date.month(), date.day())
}

/// Parse `M/D/YYYY`. Zero padding is tolerated on input.
pub fn parse_log_key(s: &str) -> Result<NaiveDate> {
    let invalid = || TrackerError::InvalidDate(s.to_string());
    let mut parts = s.trim().split('/');
    let (Some(m), Some(d), Some(y), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid().into());
    };
    let digits = |p: &str, max: usize| {
        !p.is_empty() && p.len() <= max && p.bytes().all(|b| b.is_ascii_digit())
    };
    if y.len() != 4 || !digits(y, 4) || !digits(m, 2) || !digits(d, 2) {
        return Err(invalid().into());
    }
    let month: u32 = m.parse().map_err(|_| invalid())?;
    let day: u32 = d.parse().map_err(|_| invalid())?;
    let year: i32 = y.parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| invalid().into())
}

/// Parse `YYYY/MM/DD`. Padding is required.
pub fn parse_url_segment(s: &str) -> Result<NaiveDate> {
    let invalid = || TrackerError::InvalidDate(s.to_string());
    let caps = URL_DATE_RE.captures(s).ok_or_else(invalid)?;
    if caps.get(0).map(|m| m.as_str().len()) != Some(s.len()) {
        return Err(invalid().into());
    }
    ymd_from_captures(&caps).ok_or_else(|| invalid().into())
}

pub fn log_key_to_url_segment(key: &str) -> Result<String> {
    Ok(url_segment(parse_log_key(key)?))
}

pub fn url_segment_to_log_key(segment: &str) -> Result<String> {
    Ok(log_key(parse_url_segment(segment)?))
}

/// Canonical form of a log key, e.g. `06/01/2024` -> `6/1/2024`.
pub fn normalize_log_key(key: &str) -> Result<String> {
    Ok(log_key(parse_log_key(key)?))
}

fn ymd_from_captures(caps: &regex::Captures<'_>) -> Option<NaiveDate> {
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let day: u32 = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Date carried in a puzzle page URL, if any.
pub fn date_from_url(url: &str) -> Option<NaiveDate> {
    URL_DATE_RE.captures(url).and_then(|c| ymd_from_captures(&c))
}

pub fn puzzle_url(base: &str, date: NaiveDate) -> String {
    format!("{}/{}", base.trim_end_matches('/'), url_segment(date))
}

/// Swap the date segment of `url` for `date`. URLs without a date are returned untouched.
pub fn replace_url_date(url: &str, date: NaiveDate) -> String {
    URL_DATE_RE.replace(url, url_segment(date).as_str()).into_owned()
}

/// Puzzles before the floor do not exist; send those URLs to the home page instead.
pub fn safe_url(url: &str, floor: NaiveDate, home: &str) -> String {
    match date_from_url(url) {
        Some(d) if d < floor => home.to_string(),
        _ => url.to_string(),
    }
}

pub fn prev_day(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}

pub fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

pub fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

/// Number of calendar days in `[from, to]`; zero when `to < from`.
pub fn days_inclusive(from: NaiveDate, to: NaiveDate) -> u64 {
    let span = (to - from).num_days();
    if span < 0 {
        0
    } else {
        span as u64 + 1
    }
}

pub fn is_saturday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sat
}

/// Every `(year, month)` from `from`'s month through `to`'s month.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> Vec<(i32, u32)> {
    let mut out = Vec::new();
    let (mut y, mut m) = (from.year(), from.month());
    while (y, m) <= (to.year(), to.month()) {
        out.push((y, m));
        if m == 12 {
            y += 1;
            m = 1;
        } else {
            m += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn utc(y: i32, m: u32, day: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, day, h, min, 0).unwrap()
    }

    #[test]
    fn published_date_before_release_is_local_date() {
        // Tue 2024-06-04 15:00 EDT
        let got = published_puzzle_date(utc(2024, 6, 4, 19, 0), &ReleaseSchedule::default());
        assert_eq!(got, d(2024, 6, 4));
    }

    #[test]
    fn published_date_rolls_over_at_release_hour() {
        // Tue 2024-06-04 22:30 EDT == Wed 02:30 UTC
        let got = published_puzzle_date(utc(2024, 6, 5, 2, 30), &ReleaseSchedule::default());
        assert_eq!(got, d(2024, 6, 5));
        // Tue 21:59 EDT stays on Tuesday
        let got = published_puzzle_date(utc(2024, 6, 5, 1, 59), &ReleaseSchedule::default());
        assert_eq!(got, d(2024, 6, 4));
    }

    #[test]
    fn saturday_releases_sunday_puzzle_early() {
        // Sat 2024-06-08 18:30 EDT
        let sched = ReleaseSchedule::default();
        assert_eq!(published_puzzle_date(utc(2024, 6, 8, 22, 30), &sched), d(2024, 6, 9));
        // Sat 17:00 EDT
        assert_eq!(published_puzzle_date(utc(2024, 6, 8, 21, 0), &sched), d(2024, 6, 8));
    }

    #[test]
    fn reference_timezone_not_utc() {
        // 2024-01-10 03:00 UTC is still Jan 9 in New York (EST, 22:00) -> released
        let got = published_puzzle_date(utc(2024, 1, 10, 3, 0), &ReleaseSchedule::default());
        assert_eq!(got, d(2024, 1, 10));
        // 2024-01-10 02:00 UTC is Jan 9 21:00 EST -> not yet
        let got = published_puzzle_date(utc(2024, 1, 10, 2, 0), &ReleaseSchedule::default());
        assert_eq!(got, d(2024, 1, 9));
    }

    #[test]
    fn key_and_segment_forms() {
        assert_eq!(log_key(d(2024, 6, 1)), "6/1/2024");
        assert_eq!(url_segment(d(2024, 6, 1)), "2024/06/01");
        assert_eq!(log_key_to_url_segment("6/1/2024").unwrap(), "2024/06/01");
        assert_eq!(url_segment_to_log_key("2024/06/01").unwrap(), "6/1/2024");
        assert_eq!(normalize_log_key("06/01/2024").unwrap(), "6/1/2024");
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(parse_log_key("2024-06-01").is_err());
        assert!(parse_log_key("6/1/24").is_err());
        assert!(parse_log_key("2/30/2024").is_err());
        assert!(parse_log_key("6/1/2024/1").is_err());
        assert!(parse_log_key("+6/1/2024").is_err());
        assert!(parse_log_key("6/+1/2024").is_err());
        assert!(parse_log_key("6/1/+024").is_err());
        assert!(parse_url_segment("2024/6/1").is_err());
        assert!(parse_url_segment("x2024/06/01").is_err());
    }

    #[test]
    fn url_date_extraction_and_replacement() {
        let url = "https://www.nytimes.com/crosswords/game/mini/2024/06/03";
        assert_eq!(date_from_url(url), Some(d(2024, 6, 3)));
        assert_eq!(date_from_url("https://www.nytimes.com/crosswords/game/mini"), None);
        assert_eq!(
            replace_url_date(url, d(2023, 12, 31)),
            "https://www.nytimes.com/crosswords/game/mini/2023/12/31"
        );
        assert_eq!(
            puzzle_url("https://www.nytimes.com/crosswords/game/mini/", d(2024, 1, 2)),
            "https://www.nytimes.com/crosswords/game/mini/2024/01/02"
        );
    }

    #[test]
    fn safe_url_clamps_before_floor() {
        let home = "https://www.nytimes.com/crosswords";
        let early = "https://www.nytimes.com/crosswords/game/mini/2014/08/20";
        let launch = "https://www.nytimes.com/crosswords/game/mini/2014/08/21";
        assert_eq!(safe_url(early, FLOOR_DATE, home), home);
        assert_eq!(safe_url(launch, FLOOR_DATE, home), launch);
    }

    #[test]
    fn month_ranges_cross_year_boundary() {
        let months = months_between(d(2014, 11, 5), d(2015, 2, 1));
        assert_eq!(months, vec![(2014, 11), (2014, 12), (2015, 1), (2015, 2)]);
        assert_eq!(days_inclusive(d(2024, 6, 1), d(2024, 6, 3)), 3);
        assert_eq!(days_inclusive(d(2024, 6, 3), d(2024, 6, 1)), 0);
    }
}
