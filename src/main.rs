use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tokio::time::Duration;

use minimachine::app::{App, PageEvent};
use minimachine::config::Config;
use minimachine::csv_io;
use minimachine::dates::{log_key, parse_log_key, published_puzzle_date, FLOOR_DATE};
use minimachine::logging::{self, v_str, Domain};
use minimachine::messages::Message;
use minimachine::nav::{ButtonAction, NavigationMode, StaticPage};
use minimachine::resolver::find_latest_unsolved;
use minimachine::stats::{Summary, WindowReport};

/// minimachine - mini crossword solve tracker
#[derive(Parser)]
#[command(name = "minimachine")]
#[command(about = "Track mini crossword solves and walk back to unsolved puzzles", long_about = None)]
struct Cli {
    /// Treat this date (M/D/YYYY) as the published puzzle date
    #[arg(long, global = true)]
    today: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the date of the currently published puzzle
    PublishedDate {
        /// Instant to evaluate (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<String>,
    },
    /// Latest unsolved date on or before a date
    Resolve {
        /// Start date (M/D/YYYY), defaults to the published date
        #[arg(long)]
        from: Option<String>,
    },
    /// Show or set the navigation mode
    Mode { mode: Option<ModeArg> },
    /// Run one navigation step against a page and print the resulting commands
    Page {
        #[arg(long)]
        url: String,
        /// Timer text shown on the page
        #[arg(long)]
        timer: Option<String>,
        /// Solve time text from the congratulations modal
        #[arg(long)]
        congrats: Option<String>,
        /// Saved page markup to read the timer and modal from
        #[arg(long)]
        html: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "load")]
        event: EventArg,
        /// Target for the go-back event
        #[arg(long)]
        target: Option<String>,
    },
    /// Populate the log from the remote archive
    Archive,
    /// Merge a Date,Time CSV file into the log
    Import { file: PathBuf },
    /// Write the log as CSV (stdout when no file is given)
    Export { file: Option<PathBuf> },
    /// List puzzles, newest first
    List {
        /// Sort by solve time instead
        #[arg(long)]
        fastest: bool,
    },
    /// Windowed statistics
    Stats {
        /// Window in days; repeat for several. Defaults to 7, 30, 365 and all time
        #[arg(long)]
        days: Vec<u64>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// One-line overview
    Summary,
    /// Print progress whenever the record count changes
    Watch {
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Stop after this many updates
        #[arg(long)]
        updates: Option<usize>,
    },
    /// Delete every record
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    AutoBack,
    Scrape,
    Bulk,
}

impl From<ModeArg> for NavigationMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::AutoBack => NavigationMode::AutoBack,
            ModeArg::Scrape => NavigationMode::Scrape,
            ModeArg::Bulk => NavigationMode::BulkArchiveScrape,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum EventArg {
    Load,
    StartAutoNav,
    GoBack,
    Solve,
    ShowButton,
    NavigateCrossword,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::from_env();

    let mut app = App::open(cfg)?;
    if let Some(today) = &cli.today {
        app = app.with_today(parse_log_key(today)?);
    }
    logging::debug(Domain::System, "command_start", &[("today", v_str(&app.today().to_string()))]);

    match cli.command {
        Commands::PublishedDate { at } => {
            let date = match at {
                Some(s) => {
                    let now = DateTime::parse_from_rfc3339(&s)
                        .with_context(|| format!("bad instant `{}`", s))?
                        .with_timezone(&Utc);
                    published_puzzle_date(now, &app.config().release)
                }
                None => app.today(),
            };
            println!("{}", log_key(date));
        }
        Commands::Resolve { from } => {
            let from: NaiveDate = match from {
                Some(s) => parse_log_key(&s)?,
                None => app.today(),
            };
            let log = app.store().log().await?;
            println!("{}", find_latest_unsolved(&log, from, FLOOR_DATE));
        }
        Commands::Mode { mode } => {
            if let Some(m) = mode {
                app.store().set_mode(m.into()).await?;
            }
            let settings = app.store().settings().await?;
            println!(
                "mode={} auto_nav_active={}",
                u8::from(settings.mode),
                settings.auto_nav_active
            );
        }
        Commands::Page { url, timer, congrats, html, event, target } => {
            let mut page = match html {
                Some(path) => {
                    let markup = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    StaticPage::from_html(url, &markup)
                }
                None => StaticPage::new(url),
            };
            if let Some(t) = timer {
                page = page.with_timer(t);
            }
            if let Some(c) = congrats {
                page = page.with_congrats(c);
            }
            let event = match event {
                EventArg::Load => PageEvent::Load,
                EventArg::StartAutoNav => PageEvent::Click(ButtonAction::StartAutoNav),
                EventArg::GoBack => PageEvent::Click(ButtonAction::GoBack {
                    url: target.context("--target is required for go-back")?,
                }),
                EventArg::Solve => {
                    if page.congrats.is_none() {
                        anyhow::bail!("--congrats or --html with a modal is required for solve");
                    }
                    PageEvent::Solve
                }
                EventArg::ShowButton => PageEvent::Message(Message::ShowNavButton),
                EventArg::NavigateCrossword => PageEvent::Message(Message::NavigateCrossword),
            };
            for cmd in app.handle(&page, event).await? {
                println!("{}", serde_json::to_string(&cmd)?);
            }
        }
        Commands::Archive => {
            app.store().set_mode(NavigationMode::BulkArchiveScrape).await?;
            let report = app.run_archive().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Import { file } => {
            let report = csv_io::import_file(app.store(), &file).await?;
            println!("imported {} rows, rejected {}", report.rows, report.rejected);
        }
        Commands::Export { file } => {
            let log = app.store().log().await?;
            match file {
                Some(path) => csv_io::write_csv(&log, &path)?,
                None => print!("{}", csv_io::export_csv(&log)),
            }
        }
        Commands::List { fastest } => {
            let log = app.store().log().await?;
            let records = if fastest {
                log.sorted_fastest_first()
            } else {
                log.sorted_newest_first()
            };
            for r in records {
                println!("{:<12} {}", r.date, r.time.as_deref().unwrap_or("-"));
            }
        }
        Commands::Stats { days, json } => {
            let log = app.store().log().await?;
            let windows: Vec<Option<u64>> = if days.is_empty() {
                vec![Some(7), Some(30), Some(365), None]
            } else {
                days.into_iter().map(Some).collect()
            };
            let reports: Vec<WindowReport> = windows
                .into_iter()
                .map(|w| WindowReport::build(&log, w, app.today()))
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for r in &reports {
                    println!("{}", r);
                }
            }
        }
        Commands::Summary => {
            let log = app.store().log().await?;
            println!("{}", Summary::build(&log, app.today()));
        }
        Commands::Watch { interval_ms, updates } => {
            app.watch(Duration::from_millis(interval_ms), updates).await?;
        }
        Commands::Clear => {
            let before = app.store().log().await?.len();
            app.store().clear().await?;
            logging::info(Domain::Store, "cleared", &[("records", Value::from(before))]);
        }
    }
    Ok(())
}
