//! Derived statistics over the puzzle log.
//!
//! Everything here is pure: callers pass the log and the published date, and
//! get numbers back. Rendering is left to whoever prints them.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::dates::{days_before, days_inclusive, is_saturday, log_key, prev_day, FLOOR_DATE};
use crate::puzzle::{PuzzleLog, PuzzleRecord};

pub const HISTOGRAM_BINS: usize = 10;

/// `"1:05"` -> 65. Anything that is not exactly `m:ss`, or does not fit in
/// a `u32` of seconds, yields `None`.
pub fn time_to_seconds(time: &str) -> Option<u32> {
    let (m, s) = time.split_once(':')?;
    if s.contains(':') {
        return None;
    }
    let minutes = parse_digits(m)?;
    let seconds = parse_digits(s)?;
    minutes.checked_mul(60)?.checked_add(seconds)
}

/// Unsigned decimal; signs and other characters are rejected.
pub fn parse_digits(s: &str) -> Option<u32> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

pub fn format_seconds(total: u32) -> String {
    format!("{}:{:02}", total / 60, total % 60)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PuzzleStats {
    pub count: usize,
    pub completed_percentage: f64,
    pub min_time: Option<u32>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub median: Option<f64>,
    pub mode: Option<u32>,
    pub p25: Option<u32>,
    pub p75: Option<u32>,
    pub p90: Option<u32>,
}

impl PuzzleStats {
    pub fn compute(records: &[PuzzleRecord], total_possible: u64) -> Self {
        let mut times: Vec<u32> = records.iter().filter_map(PuzzleRecord::seconds).collect();
        let completed_percentage = if total_possible == 0 {
            0.0
        } else {
            times.len() as f64 / total_possible as f64 * 100.0
        };
        if times.is_empty() {
            return Self {
                count: 0,
                completed_percentage,
                min_time: None,
                mean: None,
                std_dev: None,
                median: None,
                mode: None,
                p25: None,
                p75: None,
                p90: None,
            };
        }
        times.sort_unstable();

        let n = times.len() as f64;
        let mean = times.iter().map(|&t| t as f64).sum::<f64>() / n;
        let variance = times.iter().map(|&t| (t as f64 - mean).powi(2)).sum::<f64>() / n;
        let mid = times.len() / 2;
        let median = if times.len() % 2 == 0 {
            (times[mid - 1] as f64 + times[mid] as f64) / 2.0
        } else {
            times[mid] as f64
        };

        Self {
            count: times.len(),
            completed_percentage,
            min_time: times.first().copied(),
            mean: Some(mean),
            std_dev: Some(variance.sqrt()),
            median: Some(median),
            mode: mode_of(&times),
            p25: percentile(&times, 25.0),
            p75: percentile(&times, 75.0),
            p90: percentile(&times, 90.0),
        }
    }
}

impl fmt::Display for PuzzleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (Some(min), Some(mean), Some(sd), Some(median), Some(mode)) =
            (self.min_time, self.mean, self.std_dev, self.median, self.mode)
        else {
            return writeln!(f, "  No valid puzzle times available.");
        };
        writeln!(f, "  Count: {}", self.count)?;
        writeln!(f, "  Completed: {:.1}%", self.completed_percentage)?;
        writeln!(f, "  Fastest Time: {} s", min)?;
        writeln!(f, "  Average/Mean: {:.1} s", mean)?;
        writeln!(f, "  Standard Deviation: {:.1} s", sd)?;
        writeln!(f, "  Median: {:.0} s", median)?;
        writeln!(f, "  Mode: {} s", mode)?;
        if let (Some(p25), Some(p75), Some(p90)) = (self.p25, self.p75, self.p90) {
            writeln!(f, "  p25/p75/p90: {} / {} / {} s", p25, p75, p90)?;
        }
        Ok(())
    }
}

/// Most frequent value; ties go to the smallest time.
fn mode_of(sorted: &[u32]) -> Option<u32> {
    let mut freq: BTreeMap<u32, usize> = BTreeMap::new();
    for &t in sorted {
        *freq.entry(t).or_default() += 1;
    }
    let mut best: Option<(u32, usize)> = None;
    for (t, c) in freq {
        if best.map_or(true, |(_, bc)| c > bc) {
            best = Some((t, c));
        }
    }
    best.map(|(t, _)| t)
}

/// Nearest-rank percentile over an ascending slice.
pub fn percentile(sorted: &[u32], p: f64) -> Option<u32> {
    if sorted.is_empty() {
        return None;
    }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    let idx = rank.clamp(1, sorted.len()) - 1;
    Some(sorted[idx])
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub labels: Vec<String>,
    pub counts: Vec<usize>,
}

/// Equal-width bins between the fastest and slowest time.
pub fn histogram(times: &[u32], bins: usize) -> Option<Histogram> {
    let min = *times.iter().min()? as f64;
    let max = *times.iter().max()? as f64;
    if bins == 0 {
        return None;
    }
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &t in times {
        let idx = if width == 0.0 {
            0
        } else {
            (((t as f64 - min) / width).floor() as usize).min(bins - 1)
        };
        counts[idx] += 1;
    }
    let labels = (0..bins)
        .map(|i| {
            let lo = (min + i as f64 * width).round();
            let hi = (min + (i + 1) as f64 * width).round();
            format!("{}-{}", lo, hi)
        })
        .collect();
    Some(Histogram { labels, counts })
}

/// Least-squares line over the series index.
pub fn trend_line(series: &[f64]) -> Vec<f64> {
    let n = series.len();
    if n < 2 {
        return series.to_vec();
    }
    let mean_x = (n - 1) as f64 / 2.0;
    let mean_y = series.iter().sum::<f64>() / n as f64;
    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in series.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    let slope = num / den;
    let intercept = mean_y - slope * mean_x;
    (0..n).map(|i| intercept + slope * i as f64).collect()
}

/// Solved records in date order, as `(date, seconds)`.
pub fn time_series(records: &[PuzzleRecord]) -> Vec<(String, u32)> {
    let mut dated: Vec<(NaiveDate, &PuzzleRecord, u32)> = records
        .iter()
        .filter_map(|r| Some((r.calendar_date()?, r, r.seconds()?)))
        .collect();
    dated.sort_by_key(|(d, _, _)| *d);
    dated.into_iter().map(|(_, r, s)| (r.date.clone(), s)).collect()
}

pub fn total_possible_puzzles(today: NaiveDate) -> u64 {
    days_inclusive(FLOOR_DATE, today)
}

/// Records dated on or after `today - days`.
pub fn filter_by_days(records: &[PuzzleRecord], days: u64, today: NaiveDate) -> Vec<PuzzleRecord> {
    let start = days_before(today, days);
    records
        .iter()
        .filter(|r| r.calendar_date().is_some_and(|d| d >= start))
        .cloned()
        .collect()
}

pub fn filter_saturdays(records: &[PuzzleRecord], saturdays: bool) -> Vec<PuzzleRecord> {
    records
        .iter()
        .filter(|r| r.calendar_date().is_some_and(|d| is_saturday(d) == saturdays))
        .cloned()
        .collect()
}

/// Saturdays (or non-Saturdays) among the last `days` days, today included.
pub fn count_weekday_kind_in_range(days: u64, saturdays: bool, today: NaiveDate) -> u64 {
    if days == 0 {
        return 0;
    }
    let mut day = days_before(today, days - 1);
    let mut count = 0;
    while day <= today {
        if is_saturday(day) == saturdays {
            count += 1;
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    count
}

/// Consecutive solved days ending at `today`.
pub fn current_streak(log: &PuzzleLog, today: NaiveDate) -> u32 {
    let done: HashSet<NaiveDate> = log
        .records()
        .iter()
        .filter(|r| r.seconds().is_some())
        .filter_map(PuzzleRecord::calendar_date)
        .collect();
    let mut streak = 0;
    let mut day = today;
    while done.contains(&day) {
        streak += 1;
        let prev = prev_day(day);
        if prev == day {
            break;
        }
        day = prev;
    }
    streak
}

pub fn latest_solved(log: &PuzzleLog) -> Option<String> {
    log.records()
        .iter()
        .filter(|r| r.seconds().is_some())
        .filter_map(|r| r.calendar_date())
        .max()
        .map(log_key)
}

/// Per-window statistics split by Saturday, plus chart-ready series.
#[derive(Debug, Clone, Serialize)]
pub struct WindowReport {
    pub label: String,
    pub all: PuzzleStats,
    pub saturday: PuzzleStats,
    pub non_saturday: PuzzleStats,
    pub histogram: Option<Histogram>,
    pub trend: Vec<f64>,
}

impl WindowReport {
    /// `days = None` covers the whole history since the floor date.
    pub fn build(log: &PuzzleLog, days: Option<u64>, today: NaiveDate) -> Self {
        let (records, span, label) = match days {
            Some(n) => (
                filter_by_days(log.records(), n, today),
                n,
                format!("Last {} days", n),
            ),
            None => (
                log.records().to_vec(),
                total_possible_puzzles(today),
                "All time".to_string(),
            ),
        };
        let sat = filter_saturdays(&records, true);
        let non_sat = filter_saturdays(&records, false);

        let series = time_series(&records);
        let mut times: Vec<u32> = series.iter().map(|(_, s)| *s).collect();
        let trend = trend_line(&times.iter().map(|&t| t as f64).collect::<Vec<_>>());
        times.sort_unstable();

        Self {
            label,
            all: PuzzleStats::compute(&records, span),
            saturday: PuzzleStats::compute(&sat, count_weekday_kind_in_range(span, true, today)),
            non_saturday: PuzzleStats::compute(
                &non_sat,
                count_weekday_kind_in_range(span, false, today),
            ),
            histogram: histogram(&times, HISTOGRAM_BINS),
            trend,
        }
    }
}

impl fmt::Display for WindowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.label)?;
        writeln!(f, "Non-Saturday Puzzles")?;
        write!(f, "{}", self.non_saturday)?;
        writeln!(f, "Saturday Puzzles")?;
        write!(f, "{}", self.saturday)?;
        writeln!(f, "All Puzzles")?;
        write!(f, "{}", self.all)?;
        if let Some(h) = &self.histogram {
            writeln!(f, "Histogram (sec)")?;
            for (label, count) in h.labels.iter().zip(&h.counts) {
                writeln!(f, "  {:>9}: {}", label, count)?;
            }
        }
        Ok(())
    }
}

/// One-line overview: solved share, streak, bests and average.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub solved: usize,
    pub solved_pct: f64,
    pub streak: u32,
    pub latest: Option<String>,
    pub best: Option<u32>,
    pub best_saturday: Option<u32>,
    pub average: Option<f64>,
}

impl Summary {
    pub fn build(log: &PuzzleLog, today: NaiveDate) -> Self {
        let total = total_possible_puzzles(today);
        let overall = PuzzleStats::compute(log.records(), total);
        let saturday = PuzzleStats::compute(&filter_saturdays(log.records(), true), total);
        Self {
            solved: overall.count,
            solved_pct: overall.completed_percentage,
            streak: current_streak(log, today),
            latest: latest_solved(log),
            best: overall.min_time,
            best_saturday: saturday.min_time,
            average: overall.mean,
        }
    }
}

fn or_na<T: fmt::Display>(v: Option<T>, suffix: &str) -> String {
    v.map(|x| format!("{}{}", x, suffix)).unwrap_or_else(|| "N/A".to_string())
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let streak = match (self.streak, &self.latest) {
            (0, Some(latest)) => format!("Latest: {}", latest),
            (0, None) => "Latest: N/A".to_string(),
            (1, _) => "Streak: 1 day".to_string(),
            (n, _) => format!("Streak: {} days", n),
        };
        write!(
            f,
            "Solved: {} ({:.1}%)  |  {}  |  Best: {}  |  Best Sat: {}  |  Avg: {}",
            self.solved,
            self.solved_pct,
            streak,
            or_na(self.best, " s"),
            or_na(self.best_saturday, " s"),
            or_na(self.average.map(|a| format!("{:.1}", a)), " s"),
        )
    }
}

/// `Processed: n / total (p%)` counting every record, solved or not.
pub fn progress_line(log: &PuzzleLog, today: NaiveDate) -> String {
    let total = total_possible_puzzles(today);
    let pct = if total == 0 {
        0.0
    } else {
        log.len() as f64 / total as f64 * 100.0
    };
    format!("Processed: {} / {} ({:.1}%)", log.len(), total, pct)
}
