use anyhow::Result;
use chrono::NaiveDate;
use serde_json::Value;
use tokio::time::Duration;

use super::signal::{normalize_solve_time, solved_timer_value, wait_for_signal};
use super::{ButtonAction, Command, LoopState, NavButton, NavConfig, NavigationMode, PuzzlePage};
use crate::dates::{
    date_from_url, log_key, next_day, parse_log_key, prev_day, published_puzzle_date_now,
    puzzle_url, replace_url_date, safe_url, FLOOR_DATE,
};
use crate::error::TrackerError;
use crate::logging::{self, v_str, Domain};
use crate::messages::{record_solve, Message, Reply};
use crate::resolver::find_latest_unsolved;
use crate::service::StoreHandle;

/// Runs one step of the loop per page event and reports what the host should do.
pub struct Navigator {
    store: StoreHandle,
    cfg: NavConfig,
    floor: NaiveDate,
    today: Option<NaiveDate>,
}

impl Navigator {
    pub fn new(store: StoreHandle, cfg: NavConfig) -> Self {
        Self {
            store,
            cfg,
            floor: FLOOR_DATE,
            today: None,
        }
    }

    /// Pin the published date instead of reading the clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_floor(mut self, floor: NaiveDate) -> Self {
        self.floor = floor;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| published_puzzle_date_now(&self.cfg.release))
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Resume whatever state the persisted mode and flag describe.
    pub async fn on_page_load(&self, page: &dyn PuzzlePage) -> Result<Vec<Command>> {
        let settings = self.store.settings().await?;
        let state = settings.state();
        logging::debug(
            Domain::Nav,
            "page_load",
            &[("url", v_str(&page.url())), ("state", v_str(&format!("{:?}", state)))],
        );
        let res = match state {
            LoopState::AutoBack => self.auto_back(page).await,
            LoopState::ActiveAutoNavLoop => self.walk_from_page(page, None).await,
            LoopState::Scrape => self.scrape(page).await,
            LoopState::BulkArchiveScrape => Ok(vec![Command::RemoveButton, Command::RunArchiveScrape]),
        };
        absorb_structural(&page.url(), res)
    }

    pub async fn on_message(&self, page: &dyn PuzzlePage, msg: Message) -> Result<(Reply, Vec<Command>)> {
        match msg {
            Message::UpdateMode { mode } => {
                self.store.set_mode(mode).await?;
                Ok((Reply::Ack, self.on_page_load(page).await?))
            }
            Message::ShowNavButton => {
                let cmds = if self.store.settings().await?.state() == LoopState::AutoBack {
                    absorb_structural(&page.url(), self.auto_back(page).await)?
                } else {
                    Vec::new()
                };
                Ok((Reply::Ack, cmds))
            }
            Message::NavigateCrossword => {
                let res = self.nearest_unsolved_from(page, self.today(), true, None).await;
                Ok((Reply::Ack, absorb_structural(&page.url(), res)?))
            }
            Message::RecordSolve { date, time } => {
                Ok((record_solve(&self.store, date, time).await?, Vec::new()))
            }
        }
    }

    pub async fn on_button_click(&self, page: &dyn PuzzlePage, action: &ButtonAction) -> Result<Vec<Command>> {
        match action {
            ButtonAction::GoBack { url } => Ok(vec![Command::Navigate { url: url.clone() }]),
            ButtonAction::StartAutoNav => {
                self.store.set_auto_nav(true).await?;
                absorb_structural(&page.url(), self.walk_from_page(page, None).await)
            }
        }
    }

    /// The congratulations modal appeared: record its time and move on.
    pub async fn on_solve_observed(&self, page: &dyn PuzzlePage) -> Result<Vec<Command>> {
        let Some(text) = page.congrats_text().await else {
            logging::warn(Domain::Nav, "solve_modal_missing", &[("url", v_str(&page.url()))]);
            return Ok(Vec::new());
        };
        let Some(time) = normalize_solve_time(&text) else {
            logging::warn(Domain::Nav, "unreadable_solve_time", &[("text", v_str(&text))]);
            return Ok(Vec::new());
        };
        absorb_structural(&page.url(), self.walk_from_page(page, Some(time)).await)
    }

    async fn auto_back(&self, page: &dyn PuzzlePage) -> Result<Vec<Command>> {
        let page_date = self.page_date(page)?;
        let log = self.store.log().await?;
        let current = log_key(page_date);
        let target = find_latest_unsolved(&log, page_date, self.floor);
        let button = if target != current {
            NavButton {
                label: format!("Go to Latest Unsolved ({})", target),
                action: ButtonAction::StartAutoNav,
            }
        } else {
            let back = self.url_for(page, prev_day(page_date));
            NavButton {
                label: "Go Back a Puzzle".to_string(),
                action: ButtonAction::GoBack {
                    url: safe_url(&back, self.floor, &self.cfg.home_url),
                },
            }
        };
        Ok(vec![
            Command::RemoveButton,
            Command::ShowButton { button },
            Command::WatchForSolve,
        ])
    }

    async fn scrape(&self, page: &dyn PuzzlePage) -> Result<Vec<Command>> {
        let page_date = self.page_date(page)?;
        let time = self.wait_for_timer(page, self.cfg.scrape_wait_ms).await;
        let reply = record_solve(&self.store, log_key(page_date), time).await?;
        if !matches!(reply, Reply::RecordSolve { next: true }) {
            return Ok(Vec::new());
        }

        let next = next_day(page_date);
        if next > self.today() {
            logging::info(Domain::Nav, "scrape_caught_up", &[("date", v_str(&log_key(page_date)))]);
            self.store.set_mode(NavigationMode::AutoBack).await?;
            return self.auto_back(page).await;
        }
        Ok(self.redirect(&page.url(), puzzle_url(&self.cfg.puzzle_base, next), "scrape_forward"))
    }

    async fn walk_from_page(&self, page: &dyn PuzzlePage, known_time: Option<String>) -> Result<Vec<Command>> {
        let page_date = self.page_date(page)?;
        let is_base = date_from_url(&page.url()).is_none();
        self.nearest_unsolved_from(page, page_date, is_base, known_time).await
    }

    /// One step of the backward walk: record this page if solved, then head
    /// for the latest unsolved date before it. An unsolved page ends the walk.
    async fn nearest_unsolved_from(
        &self,
        page: &dyn PuzzlePage,
        start: NaiveDate,
        is_base: bool,
        known_time: Option<String>,
    ) -> Result<Vec<Command>> {
        let url = page.url();
        let page_date = if is_base {
            start
        } else {
            date_from_url(&url).unwrap_or(start)
        };
        let current = log_key(page_date);

        let time = match known_time {
            Some(t) => Some(t),
            None => self.wait_for_timer(page, self.cfg.autonav_wait_ms).await,
        };
        let log = match &time {
            Some(t) => self.store.upsert(current.clone(), Some(t.clone())).await?,
            None => self.store.log().await?,
        };

        let search = prev_day(page_date);
        let next = find_latest_unsolved(&log, search, self.floor);
        if !is_base && next == current {
            return Ok(self.redirect(&url, replace_url_date(&url, search), "no_progress"));
        }

        if time.is_none() {
            logging::info(Domain::Nav, "auto_nav_stopped", &[("date", v_str(&current))]);
            self.store.set_auto_nav(false).await?;
            return self.auto_back(page).await;
        }

        let next_date = parse_log_key(&next)?;
        let target = if is_base {
            puzzle_url(&self.cfg.puzzle_base, next_date)
        } else {
            replace_url_date(&url, next_date)
        };
        Ok(self.redirect(&url, target, "next_unsolved"))
    }

    /// Date of the puzzle on `page`. The bare puzzle base URL shows today's puzzle.
    fn page_date(&self, page: &dyn PuzzlePage) -> Result<NaiveDate> {
        let url = page.url();
        if let Some(d) = date_from_url(&url) {
            return Ok(d);
        }
        if url.trim_end_matches('/') == self.cfg.puzzle_base.trim_end_matches('/') {
            return Ok(self.today());
        }
        Err(TrackerError::NoDateInUrl(url).into())
    }

    fn url_for(&self, page: &dyn PuzzlePage, date: NaiveDate) -> String {
        let url = page.url();
        if date_from_url(&url).is_some() {
            replace_url_date(&url, date)
        } else {
            puzzle_url(&self.cfg.puzzle_base, date)
        }
    }

    async fn wait_for_timer(&self, page: &dyn PuzzlePage, max_wait_ms: u64) -> Option<String> {
        wait_for_signal(
            move || async move { page.timer_text().await.and_then(|t| solved_timer_value(&t)) },
            Duration::from_millis(self.cfg.poll_ms),
            Duration::from_millis(max_wait_ms),
        )
        .await
    }

    fn redirect(&self, from: &str, target: String, reason: &str) -> Vec<Command> {
        let target = safe_url(&target, self.floor, &self.cfg.home_url);
        logging::log_redirect(from, &target, reason);
        vec![Command::RemoveButton, Command::Navigate { url: target }]
    }
}

/// Structural problems (no date in the URL, malformed keys) end this page's
/// action quietly; everything else propagates.
fn absorb_structural(url: &str, res: Result<Vec<Command>>) -> Result<Vec<Command>> {
    match res {
        Err(err) if err.downcast_ref::<TrackerError>().is_some_and(TrackerError::is_structural) => {
            logging::warn(
                Domain::Nav,
                "page_skipped",
                &[("url", v_str(url)), ("error", Value::String(err.to_string()))],
            );
            Ok(Vec::new())
        }
        other => other,
    }
}
