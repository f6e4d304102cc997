use std::env;
use std::str::FromStr;

use crate::archive::parse::ArchiveSelectors;
use crate::archive::retry::RetryConfig;
use crate::dates::ReleaseSchedule;
use crate::nav::NavConfig;

pub const DEFAULT_PUZZLE_BASE: &str = "https://www.nytimes.com/crosswords/game/mini";
pub const DEFAULT_ARCHIVE_URL: &str = "https://www.nytimes.com/crosswords/archive/mini/{year}/{month}";
pub const DEFAULT_HOME_URL: &str = "https://www.nytimes.com/crosswords";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub puzzle_base: String,
    /// Listing URL with `{year}` and `{month}` (zero padded) placeholders.
    pub archive_url: String,
    pub home_url: String,
    /// Site session cookie, sent with archive requests when present.
    pub cookie: Option<String>,
    pub http_timeout_secs: u64,
    pub poll_ms: u64,
    pub scrape_wait_ms: u64,
    pub autonav_wait_ms: u64,
    pub release: ReleaseSchedule,
    pub retries: u32,
    pub selectors: ArchiveSelectors,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "./minimachine.sqlite".to_string(),
            puzzle_base: DEFAULT_PUZZLE_BASE.to_string(),
            archive_url: DEFAULT_ARCHIVE_URL.to_string(),
            home_url: DEFAULT_HOME_URL.to_string(),
            cookie: None,
            http_timeout_secs: 15,
            poll_ms: 100,
            scrape_wait_ms: 1500,
            autonav_wait_ms: 2000,
            release: ReleaseSchedule::default(),
            retries: 2,
            selectors: ArchiveSelectors::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        let sel = ArchiveSelectors::default();
        Self {
            db_path: env_or("MINI_DB_PATH", d.db_path),
            puzzle_base: env_or("MINI_PUZZLE_BASE", d.puzzle_base),
            archive_url: env_or("MINI_ARCHIVE_URL", d.archive_url),
            home_url: env_or("MINI_HOME_URL", d.home_url),
            cookie: env::var("MINI_COOKIE").ok().filter(|c| !c.trim().is_empty()),
            http_timeout_secs: env_parse("MINI_HTTP_TIMEOUT_SECS", d.http_timeout_secs),
            poll_ms: env_parse("MINI_POLL_MS", d.poll_ms),
            scrape_wait_ms: env_parse("MINI_SCRAPE_WAIT_MS", d.scrape_wait_ms),
            autonav_wait_ms: env_parse("MINI_AUTONAV_WAIT_MS", d.autonav_wait_ms),
            release: ReleaseSchedule {
                weekday_hour: env_parse("MINI_RELEASE_HOUR", d.release.weekday_hour),
                saturday_hour: env_parse("MINI_SATURDAY_RELEASE_HOUR", d.release.saturday_hour),
                ..d.release
            },
            retries: env_parse("MINI_RETRIES", d.retries),
            selectors: ArchiveSelectors {
                day: env_or("MINI_SEL_DAY", sel.day),
                solved: env_or("MINI_SEL_SOLVED", sel.solved),
                day_number: env_or("MINI_SEL_DAY_NUMBER", sel.day_number),
                time: env_or("MINI_SEL_TIME", sel.time),
            },
        }
    }

    pub fn nav_config(&self) -> NavConfig {
        NavConfig {
            puzzle_base: self.puzzle_base.clone(),
            home_url: self.home_url.clone(),
            release: self.release,
            poll_ms: self.poll_ms,
            scrape_wait_ms: self.scrape_wait_ms,
            autonav_wait_ms: self.autonav_wait_ms,
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retries,
            ..RetryConfig::default()
        }
    }

    /// Listing URL for one archive month.
    pub fn archive_month_url(&self, year: i32, month: u32) -> String {
        self.archive_url
            .replace("{year}", &year.to_string())
            .replace("{month}", &format!("{:02}", month))
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

/// Parsed value of `key`; unset or unparseable falls back to `default`.
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_url_template() {
        let cfg = Config::default();
        assert_eq!(
            cfg.archive_month_url(2014, 8),
            "https://www.nytimes.com/crosswords/archive/mini/2014/08"
        );
    }

    #[test]
    fn nav_config_carries_waits() {
        let cfg = Config::default();
        let nav = cfg.nav_config();
        assert_eq!(nav.scrape_wait_ms, 1500);
        assert_eq!(nav.autonav_wait_ms, 2000);
        assert_eq!(nav.poll_ms, 100);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        assert_eq!(env_parse("MINI_TEST_UNSET_RETRIES", 7u32), 7);
        env::set_var("MINI_TEST_BAD_POLL_MS", "soon");
        assert_eq!(env_parse("MINI_TEST_BAD_POLL_MS", 100u64), 100);
        env::set_var("MINI_TEST_GOOD_POLL_MS", " 250 ");
        assert_eq!(env_parse("MINI_TEST_GOOD_POLL_MS", 100u64), 250);
    }
}
