//! Page-driven navigation state loop.
//!
//! ```text
//! page load / message / click / solve
//!              │
//!              ▼
//!   ┌────────────────────┐   request/reply   ┌───────────────┐
//!   │     Navigator      │◄─────────────────►│ state service │
//!   └────────────────────┘                   └───────────────┘
//!              │
//!              ▼
//!   Vec<Command>  (navigate, show button, watch for solve, run archive scrape)
//! ```
//!
//! Every step of the loop ends in a full page navigation, so nothing survives
//! in memory between steps: the mode and the auto-nav flag are re-read from
//! the state service on every page load.

use serde::{Deserialize, Serialize};

use crate::dates::ReleaseSchedule;
use crate::error::TrackerError;

pub mod navigator;
pub mod page;
pub mod signal;

pub use navigator::Navigator;
pub use page::{PuzzlePage, StaticPage};

/// Persisted process-wide mode. Stored as its integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum NavigationMode {
    AutoBack,
    Scrape,
    BulkArchiveScrape,
}

impl From<NavigationMode> for u8 {
    fn from(mode: NavigationMode) -> u8 {
        match mode {
            NavigationMode::AutoBack => 0,
            NavigationMode::Scrape => 1,
            NavigationMode::BulkArchiveScrape => 2,
        }
    }
}

impl TryFrom<u8> for NavigationMode {
    type Error = TrackerError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(NavigationMode::AutoBack),
            1 => Ok(NavigationMode::Scrape),
            2 => Ok(NavigationMode::BulkArchiveScrape),
            other => Err(TrackerError::UnknownMode(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavSettings {
    pub mode: NavigationMode,
    pub auto_nav_active: bool,
}

/// What a page load resumes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AutoBack,
    Scrape,
    BulkArchiveScrape,
    ActiveAutoNavLoop,
}

impl NavSettings {
    pub fn state(&self) -> LoopState {
        match self.mode {
            NavigationMode::AutoBack if self.auto_nav_active => LoopState::ActiveAutoNavLoop,
            NavigationMode::AutoBack => LoopState::AutoBack,
            NavigationMode::Scrape => LoopState::Scrape,
            NavigationMode::BulkArchiveScrape => LoopState::BulkArchiveScrape,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NavConfig {
    pub puzzle_base: String,
    pub home_url: String,
    pub release: ReleaseSchedule,
    pub poll_ms: u64,
    pub scrape_wait_ms: u64,
    pub autonav_wait_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ButtonAction {
    /// Begin the resumable backward walk from the current page.
    StartAutoNav,
    /// Plain one-day-back link.
    GoBack { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavButton {
    pub label: String,
    pub action: ButtonAction,
}

/// Side effects the host applies to the page after each step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Navigate { url: String },
    ShowButton { button: NavButton },
    RemoveButton,
    /// Keep observing the page for the congratulations modal.
    WatchForSolve,
    RunArchiveScrape,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_integer_mapping() {
        for (m, n) in [
            (NavigationMode::AutoBack, 0u8),
            (NavigationMode::Scrape, 1),
            (NavigationMode::BulkArchiveScrape, 2),
        ] {
            assert_eq!(u8::from(m), n);
            assert_eq!(NavigationMode::try_from(n).unwrap(), m);
        }
        assert!(NavigationMode::try_from(3).is_err());
        assert_eq!(serde_json::to_string(&NavigationMode::Scrape).unwrap(), "1");
    }

    #[test]
    fn flag_only_matters_in_auto_back() {
        let s = |mode, auto_nav_active| NavSettings { mode, auto_nav_active }.state();
        assert_eq!(s(NavigationMode::AutoBack, false), LoopState::AutoBack);
        assert_eq!(s(NavigationMode::AutoBack, true), LoopState::ActiveAutoNavLoop);
        assert_eq!(s(NavigationMode::Scrape, true), LoopState::Scrape);
        assert_eq!(s(NavigationMode::BulkArchiveScrape, false), LoopState::BulkArchiveScrape);
    }

    #[test]
    fn commands_serialize_tagged() {
        let json = serde_json::to_string(&Command::Navigate { url: "u".into() }).unwrap();
        assert_eq!(json, r#"{"command":"navigate","url":"u"}"#);
    }
}
