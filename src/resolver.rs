use chrono::NaiveDate;

use crate::dates::log_key;
use crate::puzzle::PuzzleLog;

/// Walk backward from `from` (inclusive) to `floor` and return the first date
/// with no solved entry. A fully solved range yields `from` itself.
pub fn find_latest_unsolved(log: &PuzzleLog, from: NaiveDate, floor: NaiveDate) -> String {
    let solved = log.solved_dates();
    let mut day = from;
    while day >= floor {
        let key = log_key(day);
        if !solved.contains(key.as_str()) {
            return key;
        }
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    log_key(from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::FLOOR_DATE;
    use crate::puzzle::PuzzleRecord;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn solved_range(from: NaiveDate, to: NaiveDate) -> PuzzleLog {
        let mut log = PuzzleLog::new();
        let mut day = from;
        while day <= to {
            log.upsert(log_key(day), Some("0:30".into()));
            day = day.succ_opt().unwrap();
        }
        log
    }

    #[test]
    fn start_date_is_inclusive() {
        let log = PuzzleLog::from_records(vec![PuzzleRecord::new("6/1/2024", Some("0:45".into()))]);
        assert_eq!(find_latest_unsolved(&log, d(2024, 6, 3), FLOOR_DATE), "6/3/2024");
        assert_eq!(find_latest_unsolved(&log, d(2024, 6, 2), FLOOR_DATE), "6/2/2024");
    }

    #[test]
    fn skips_solved_run() {
        let log = solved_range(d(2024, 5, 20), d(2024, 6, 3));
        assert_eq!(find_latest_unsolved(&log, d(2024, 6, 3), FLOOR_DATE), "5/19/2024");
    }

    #[test]
    fn placeholders_count_as_unsolved() {
        let mut log = solved_range(d(2024, 5, 20), d(2024, 6, 3));
        log.upsert("5/30/2024", Some("null".into()));
        log.upsert("5/25/2024", None);
        assert_eq!(find_latest_unsolved(&log, d(2024, 6, 3), FLOOR_DATE), "5/30/2024");
    }

    #[test]
    fn fully_solved_range_returns_start() {
        let floor = d(2024, 5, 1);
        let log = solved_range(floor, d(2024, 6, 3));
        assert_eq!(find_latest_unsolved(&log, d(2024, 6, 3), floor), "6/3/2024");
    }

    #[test]
    fn start_before_floor_returns_start() {
        let log = PuzzleLog::new();
        assert_eq!(find_latest_unsolved(&log, d(2014, 8, 1), FLOOR_DATE), "8/1/2014");
    }

    #[test]
    fn floor_day_itself_is_checked() {
        let floor = d(2024, 5, 1);
        let log = solved_range(d(2024, 5, 2), d(2024, 6, 3));
        assert_eq!(find_latest_unsolved(&log, d(2024, 6, 3), floor), "5/1/2024");
    }
}
