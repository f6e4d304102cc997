use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::parse_log_key;
use crate::stats::time_to_seconds;

/// One day's entry in the log. `time` is `m:ss`; `None` marks an unsolved placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleRecord {
    pub date: String,
    pub time: Option<String>,
}

impl PuzzleRecord {
    pub fn new(date: impl Into<String>, time: Option<String>) -> Self {
        Self { date: date.into(), time }
    }

    /// Empty, whitespace and the literal `null` all count as unsolved.
    pub fn is_solved(&self) -> bool {
        self.time.as_deref().is_some_and(is_solved_time)
    }

    pub fn calendar_date(&self) -> Option<NaiveDate> {
        parse_log_key(&self.date).ok()
    }

    pub fn seconds(&self) -> Option<u32> {
        self.time.as_deref().and_then(time_to_seconds)
    }
}

pub fn is_solved_time(time: &str) -> bool {
    let t = time.trim();
    !t.is_empty() && !t.eq_ignore_ascii_case("null")
}

/// Insertion-ordered list of records, at most one per date string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PuzzleLog {
    records: Vec<PuzzleRecord>,
}

impl PuzzleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collapse duplicates: first position of a date, last time seen for it.
    pub fn from_records(records: Vec<PuzzleRecord>) -> Self {
        let mut index: HashMap<String, usize> = HashMap::with_capacity(records.len());
        let mut out: Vec<PuzzleRecord> = Vec::with_capacity(records.len());
        for r in records {
            match index.get(&r.date) {
                Some(&i) => out[i].time = r.time,
                None => {
                    index.insert(r.date.clone(), out.len());
                    out.push(r);
                }
            }
        }
        Self { records: out }
    }

    pub fn records(&self) -> &[PuzzleRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<PuzzleRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, date: &str) -> Option<&PuzzleRecord> {
        self.records.iter().find(|r| r.date == date)
    }

    /// Replace the time of an existing record for `date`, else append.
    pub fn upsert(&mut self, date: impl Into<String>, time: Option<String>) {
        let date = date.into();
        match self.records.iter_mut().find(|r| r.date == date) {
            Some(existing) => existing.time = time,
            None => self.records.push(PuzzleRecord { date, time }),
        }
    }

    /// Append a record only when the date is absent. Returns whether it was added.
    pub fn insert_missing(&mut self, date: impl Into<String>, time: Option<String>) -> bool {
        let date = date.into();
        if self.get(&date).is_some() {
            return false;
        }
        self.records.push(PuzzleRecord { date, time });
        true
    }

    pub fn is_solved(&self, date: &str) -> bool {
        self.get(date).is_some_and(PuzzleRecord::is_solved)
    }

    pub fn solved_dates(&self) -> HashSet<&str> {
        self.records
            .iter()
            .filter(|r| r.is_solved())
            .map(|r| r.date.as_str())
            .collect()
    }

    pub fn solved_count(&self) -> usize {
        self.records.iter().filter(|r| r.seconds().is_some()).count()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Newest date first, then fastest time; unsolved entries sink within a date.
    pub fn sorted_newest_first(&self) -> Vec<PuzzleRecord> {
        let mut out = self.records.clone();
        out.sort_by(|a, b| {
            b.calendar_date()
                .cmp(&a.calendar_date())
                .then_with(|| cmp_times(a.seconds(), b.seconds()))
        });
        out
    }

    /// Solved records only, fastest first.
    pub fn sorted_fastest_first(&self) -> Vec<PuzzleRecord> {
        let mut out: Vec<PuzzleRecord> = self
            .records
            .iter()
            .filter(|r| r.seconds().is_some())
            .cloned()
            .collect();
        out.sort_by(|a, b| cmp_times(a.seconds(), b.seconds()));
        out
    }
}

fn cmp_times(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => x.cmp(&y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_is_idempotent() {
        let mut log = PuzzleLog::new();
        log.upsert("6/1/2024", Some("0:45".into()));
        log.upsert("6/1/2024", Some("0:45".into()));
        assert_eq!(log.len(), 1);
        assert_eq!(log.get("6/1/2024").unwrap().time.as_deref(), Some("0:45"));
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut log = PuzzleLog::new();
        log.upsert("6/1/2024", None);
        log.upsert("6/2/2024", Some("1:00".into()));
        log.upsert("6/1/2024", Some("0:30".into()));
        assert_eq!(log.records()[0].date, "6/1/2024");
        assert_eq!(log.records()[0].time.as_deref(), Some("0:30"));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn from_records_keeps_first_position_and_last_time() {
        let log = PuzzleLog::from_records(vec![
            PuzzleRecord::new("6/1/2024", None),
            PuzzleRecord::new("6/2/2024", Some("1:00".into())),
            PuzzleRecord::new("6/1/2024", Some("0:45".into())),
            PuzzleRecord::new("6/3/2024", None),
            PuzzleRecord::new("6/1/2024", Some("0:40".into())),
        ]);
        let dates: Vec<&str> = log.records().iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, ["6/1/2024", "6/2/2024", "6/3/2024"]);
        assert_eq!(log.get("6/1/2024").unwrap().time.as_deref(), Some("0:40"));

        let many: Vec<PuzzleRecord> = (0..5000)
            .map(|i| PuzzleRecord::new(format!("d{}", i % 2500), Some(format!("0:{:02}", i % 60))))
            .collect();
        let log = PuzzleLog::from_records(many);
        assert_eq!(log.len(), 2500);
        assert_eq!(log.get("d0").unwrap().time.as_deref(), Some("0:40"));
    }

    #[test]
    fn placeholder_does_not_overwrite() {
        let mut log = PuzzleLog::new();
        log.upsert("6/1/2024", Some("0:45".into()));
        assert!(!log.insert_missing("6/1/2024", None));
        assert!(log.insert_missing("6/2/2024", None));
        assert!(log.is_solved("6/1/2024"));
        assert!(!log.is_solved("6/2/2024"));
    }

    #[test]
    fn null_and_blank_times_are_unsolved() {
        for t in ["", "   ", "null", " NULL "] {
            assert!(!PuzzleRecord::new("6/1/2024", Some(t.to_string())).is_solved(), "{t:?}");
        }
        assert!(!PuzzleRecord::new("6/1/2024", None).is_solved());
        assert!(PuzzleRecord::new("6/1/2024", Some("0:07".into())).is_solved());
    }

    #[test]
    fn newest_first_then_fastest() {
        let log = PuzzleLog::from_records(vec![
            PuzzleRecord::new("5/31/2024", Some("0:20".into())),
            PuzzleRecord::new("6/1/2024", None),
            PuzzleRecord::new("12/1/2023", Some("2:00".into())),
        ]);
        let dates: Vec<_> = log.sorted_newest_first().into_iter().map(|r| r.date).collect();
        assert_eq!(dates, vec!["6/1/2024", "5/31/2024", "12/1/2023"]);

        let fastest: Vec<_> = log.sorted_fastest_first().into_iter().map(|r| r.date).collect();
        assert_eq!(fastest, vec!["5/31/2024", "12/1/2023"]);
    }

    #[test]
    fn serializes_as_plain_array() {
        let log = PuzzleLog::from_records(vec![PuzzleRecord::new("6/1/2024", None)]);
        let json = serde_json::to_string(&log).unwrap();
        assert_eq!(json, r#"[{"date":"6/1/2024","time":null}]"#);
    }
}
