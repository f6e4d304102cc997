use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;

use super::parse::{parse_month_listing, parse_solve_time, ArchiveSelectors, ListingDay};
use super::source::ArchiveSource;
use crate::dates::{log_key, months_between, FLOOR_DATE};
use crate::logging::{self, v_str, Domain, ProfileScope};
use crate::puzzle::PuzzleRecord;
use crate::service::StoreHandle;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub months_requested: usize,
    pub months_failed: usize,
    pub days_listed: usize,
    pub placeholders_added: usize,
    pub solved_listed: usize,
    pub times_recorded: usize,
    pub time_failures: usize,
}

/// Populates the log from the remote archive: every listed day becomes a
/// placeholder, every day marked solved gets its time from the puzzle page.
pub struct ArchiveScraper {
    store: StoreHandle,
    source: Arc<dyn ArchiveSource>,
    selectors: ArchiveSelectors,
    floor: NaiveDate,
    today: NaiveDate,
}

impl ArchiveScraper {
    pub fn new(store: StoreHandle, source: Arc<dyn ArchiveSource>, selectors: ArchiveSelectors, today: NaiveDate) -> Self {
        Self {
            store,
            source,
            selectors,
            floor: FLOOR_DATE,
            today,
        }
    }

    pub fn with_floor(mut self, floor: NaiveDate) -> Self {
        self.floor = floor;
        self
    }

    /// Network failures skip one month or one puzzle; only the state service
    /// going away ends the run early.
    pub async fn run(&self) -> Result<ArchiveReport> {
        let _scope = ProfileScope::new("archive_scrape");
        let months = months_between(self.floor, self.today);
        let mut report = ArchiveReport {
            months_requested: months.len(),
            ..ArchiveReport::default()
        };

        // All month listings in flight at once; completion order is irrelevant.
        let listings = join_all(months.iter().map(|&(year, month)| async move {
            (year, month, self.fetch_listing(year, month).await)
        }))
        .await;

        let mut days: Vec<ListingDay> = Vec::new();
        for (year, month, listing) in listings {
            match listing {
                Ok(found) => days.extend(found),
                Err(e) => {
                    report.months_failed += 1;
                    logging::log_fetch_failure("month", &self.source.month_url(year, month), &e);
                }
            }
        }
        days.retain(|d| d.date >= self.floor && d.date <= self.today);
        report.days_listed = days.len();

        let placeholders = days
            .iter()
            .map(|d| PuzzleRecord::new(log_key(d.date), None))
            .collect();
        report.placeholders_added = self.store.insert_missing(placeholders).await?;

        let log = self.store.log().await?;
        let pending: Vec<NaiveDate> = days
            .iter()
            .filter(|d| d.solved)
            .map(|d| d.date)
            .collect();
        report.solved_listed = pending.len();

        // One puzzle page at a time.
        for date in pending {
            let key = log_key(date);
            if log.is_solved(&key) {
                continue;
            }
            match self.fetch_time(date).await {
                Ok(Some(time)) => {
                    self.store.upsert(key.clone(), Some(time.clone())).await?;
                    logging::log_solve_recorded(&key, Some(&time), "archive");
                    report.times_recorded += 1;
                }
                Ok(None) => {
                    report.time_failures += 1;
                    logging::warn(
                        Domain::Archive,
                        "time_not_found",
                        &[("date", v_str(&key)), ("url", v_str(&self.source.puzzle_url(date)))],
                    );
                }
                Err(e) => {
                    report.time_failures += 1;
                    logging::log_fetch_failure("puzzle", &self.source.puzzle_url(date), &e);
                }
            }
        }

        logging::info(
            Domain::Archive,
            "archive_scrape_done",
            &[
                ("months", Value::from(report.months_requested)),
                ("months_failed", Value::from(report.months_failed)),
                ("placeholders", Value::from(report.placeholders_added)),
                ("times", Value::from(report.times_recorded)),
                ("time_failures", Value::from(report.time_failures)),
            ],
        );
        Ok(report)
    }

    async fn fetch_listing(&self, year: i32, month: u32) -> Result<Vec<ListingDay>> {
        let html = self.source.fetch_month(year, month).await?;
        parse_month_listing(&html, year, month, &self.selectors)
    }

    async fn fetch_time(&self, date: NaiveDate) -> Result<Option<String>> {
        let html = self.source.fetch_puzzle(date).await?;
        parse_solve_time(&html, &self.selectors)
    }
}
