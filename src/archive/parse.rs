use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use chrono::{Datelike, NaiveDate};
use scraper::{ElementRef, Html, Selector};

use crate::dates::date_from_url;
use crate::nav::signal::normalize_solve_time;

/// CSS selectors for the remote archive markup. The markup is not ours and
/// changes without notice, so every selector can be overridden from config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSelectors {
    /// One calendar cell per day of the month.
    pub day: String,
    /// Present inside a cell when that puzzle is solved.
    pub solved: String,
    /// Day-of-month text inside a cell, used when the cell has no dated link.
    pub day_number: String,
    /// Candidate elements holding the solve time on a puzzle page.
    pub time: String,
}

impl Default for ArchiveSelectors {
    fn default() -> Self {
        Self {
            day: ".archive_calendar-item".to_string(),
            solved: ".archive_calendar-icon--solved".to_string(),
            day_number: ".archive_calendar-date".to_string(),
            time: "span.xwd__bold".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingDay {
    pub date: NaiveDate,
    pub solved: bool,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector `{}`: {:?}", css, e))
}

/// Days listed on one month's archive page, in date order.
///
/// A cell's date comes from a `/YYYY/MM/DD` link inside it, else from its
/// day-number text. Cells dated outside the requested month are dropped.
pub fn parse_month_listing(html: &str, year: i32, month: u32, sel: &ArchiveSelectors) -> Result<Vec<ListingDay>> {
    let day_sel = selector(&sel.day)?;
    let solved_sel = selector(&sel.solved)?;
    let number_sel = selector(&sel.day_number)?;
    let link_sel = selector("a[href]")?;

    let doc = Html::parse_document(html);
    let mut days = BTreeMap::new();
    for cell in doc.select(&day_sel) {
        let Some(date) = cell_date(cell, year, month, &link_sel, &number_sel) else {
            continue;
        };
        if date.year() != year || date.month() != month {
            continue;
        }
        let solved = cell.select(&solved_sel).next().is_some();
        let entry = days.entry(date).or_insert(false);
        *entry |= solved;
    }
    Ok(days
        .into_iter()
        .map(|(date, solved)| ListingDay { date, solved })
        .collect())
}

fn cell_date(cell: ElementRef<'_>, year: i32, month: u32, link_sel: &Selector, number_sel: &Selector) -> Option<NaiveDate> {
    let own_href = cell.value().attr("href");
    let linked = own_href
        .into_iter()
        .chain(cell.select(link_sel).filter_map(|a| a.value().attr("href")))
        .find_map(date_from_url);
    if linked.is_some() {
        return linked;
    }
    let text: String = cell
        .select(number_sel)
        .next()
        .map(|el| el.text().collect())
        .unwrap_or_default();
    let day: u32 = text.trim().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// First element matching the time selector whose text reads as a solve
/// time, normalised to `m:ss`.
pub fn parse_solve_time(html: &str, sel: &ArchiveSelectors) -> Result<Option<String>> {
    let time_sel = selector(&sel.time)?;
    let doc = Html::parse_document(html);
    Ok(doc
        .select(&time_sel)
        .map(|el| el.text().collect::<String>())
        .find_map(|t| normalize_solve_time(&t)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    const LISTING: &str = r#"
        <ul>
          <li class="archive_calendar-item">
            <a href="/crosswords/game/mini/2024/06/01">
              <span class="archive_calendar-date">1</span>
              <i class="archive_calendar-icon--solved"></i>
            </a>
          </li>
          <li class="archive_calendar-item">
            <a href="/crosswords/game/mini/2024/06/02"><span class="archive_calendar-date">2</span></a>
          </li>
          <li class="archive_calendar-item">
            <span class="archive_calendar-date">3</span>
            <i class="archive_calendar-icon--solved"></i>
          </li>
          <li class="archive_calendar-item"><span class="archive_calendar-date"></span></li>
          <li class="archive_calendar-item">
            <a href="/crosswords/game/mini/2024/05/31"><span>31</span></a>
          </li>
        </ul>"#;

    #[test]
    fn listing_reads_links_and_day_numbers() {
        let days = parse_month_listing(LISTING, 2024, 6, &ArchiveSelectors::default()).unwrap();
        assert_eq!(
            days,
            vec![
                ListingDay { date: d(2024, 6, 1), solved: true },
                ListingDay { date: d(2024, 6, 2), solved: false },
                ListingDay { date: d(2024, 6, 3), solved: true },
            ]
        );
    }

    #[test]
    fn custom_selectors_apply() {
        let html = r#"<div class="cal"><div class="d"><b>7</b><em class="done"></em></div></div>"#;
        let sel = ArchiveSelectors {
            day: "div.d".into(),
            solved: "em.done".into(),
            day_number: "b".into(),
            time: "strong".into(),
        };
        let days = parse_month_listing(html, 2015, 2, &sel).unwrap();
        assert_eq!(days, vec![ListingDay { date: d(2015, 2, 7), solved: true }]);
    }

    #[test]
    fn bad_selector_is_an_error() {
        let sel = ArchiveSelectors { day: "[[".into(), ..ArchiveSelectors::default() };
        assert!(parse_month_listing(LISTING, 2024, 6, &sel).is_err());
    }

    #[test]
    fn solve_time_skips_non_time_spans() {
        let html = r#"
            <div class="mini__congrats-modal--message">
              <span class="xwd__bold">Congratulations!</span>
              You solved it in <span class="xwd__bold">1 minute 4 seconds</span>
            </div>"#;
        let time = parse_solve_time(html, &ArchiveSelectors::default()).unwrap();
        assert_eq!(time.as_deref(), Some("1:04"));
        assert_eq!(parse_solve_time("<p>none</p>", &ArchiveSelectors::default()).unwrap(), None);
    }
}
