//! Host runtime: owns the state service and applies the commands the
//! navigator emits that the host itself is responsible for.

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::archive::{ArchiveReport, ArchiveScraper, ArchiveSource, HttpArchive};
use crate::config::Config;
use crate::dates::published_puzzle_date_now;
use crate::logging::{self, v_str, Domain};
use crate::messages::Message;
use crate::nav::{ButtonAction, Command, NavigationMode, Navigator, PuzzlePage};
use crate::service::{self, StoreChange, StoreHandle};
use crate::stats::progress_line;
use crate::storage::StateStore;

/// An event delivered by the page host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Load,
    Click(ButtonAction),
    Solve,
    Message(Message),
}

pub struct App {
    cfg: Config,
    store: StoreHandle,
    navigator: Navigator,
    today: Option<NaiveDate>,
}

impl App {
    /// Open (creating if needed) the store at `cfg.db_path` and start its service.
    pub fn open(cfg: Config) -> Result<Self> {
        let mut store = StateStore::new(&cfg.db_path)?;
        store.init()?;
        logging::debug(Domain::System, "store_opened", &[("path", v_str(&cfg.db_path))]);
        Ok(Self::with_store(cfg, store))
    }

    pub fn with_store(cfg: Config, store: StateStore) -> Self {
        let store = service::spawn(store);
        let navigator = Navigator::new(store.clone(), cfg.nav_config());
        Self {
            cfg,
            store,
            navigator,
            today: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.navigator = self.navigator.with_today(today);
        self.today = Some(today);
        self
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| published_puzzle_date_now(&self.cfg.release))
    }

    /// Feed one page event to the navigator, then run the archive scrape if
    /// it asked for one. Returns the commands left for the page to apply.
    pub async fn handle(&self, page: &dyn PuzzlePage, event: PageEvent) -> Result<Vec<Command>> {
        let commands = match event {
            PageEvent::Load => self.navigator.on_page_load(page).await?,
            PageEvent::Click(action) => self.navigator.on_button_click(page, &action).await?,
            PageEvent::Solve => self.navigator.on_solve_observed(page).await?,
            PageEvent::Message(msg) => self.navigator.on_message(page, msg).await?.1,
        };
        if commands.contains(&Command::RunArchiveScrape) {
            self.run_archive().await?;
        }
        Ok(commands
            .into_iter()
            .filter(|c| *c != Command::RunArchiveScrape)
            .collect())
    }

    pub async fn run_archive(&self) -> Result<ArchiveReport> {
        let source: Arc<dyn ArchiveSource> = Arc::new(HttpArchive::new(&self.cfg)?);
        self.run_archive_from(source).await
    }

    /// Scrape `source` with live progress, then drop back to AutoBack.
    pub async fn run_archive_from(&self, source: Arc<dyn ArchiveSource>) -> Result<ArchiveReport> {
        let today = self.today();
        let progress = spawn_progress_printer(self.store.clone(), today);
        let scraper = ArchiveScraper::new(self.store.clone(), source, self.cfg.selectors.clone(), today);
        let res = scraper.run().await;
        progress.abort();

        // The mode resets even after a failed run so the next page load is not
        // sent straight back into the scrape.
        self.store.set_mode(NavigationMode::AutoBack).await?;
        res
    }

    /// Print the progress line whenever the stored record count changes.
    /// `max_updates = None` runs until interrupted.
    pub async fn watch(&self, interval: Duration, max_updates: Option<usize>) -> Result<()> {
        let mut last = None;
        let mut printed = 0;
        loop {
            let log = self.store.log().await?;
            if last != Some(log.len()) {
                last = Some(log.len());
                println!("{}", progress_line(&log, self.today()));
                printed += 1;
                if max_updates.is_some_and(|max| printed >= max) {
                    return Ok(());
                }
            }
            sleep(interval).await;
        }
    }
}

fn spawn_progress_printer(store: StoreHandle, today: NaiveDate) -> JoinHandle<()> {
    let mut changes = store.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(StoreChange::Puzzles { .. }) => match store.log().await {
                    Ok(log) => eprintln!("{}", progress_line(&log, today)),
                    Err(_) => return,
                },
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    logging::debug(Domain::Store, "progress_lagged", &[("skipped", Value::from(skipped))]);
                }
                Err(RecvError::Closed) => return,
            }
        }
    })
}
