use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::Client;
use tokio::time::Duration;
use url::Url;

use super::retry::{retry_async, RetryConfig};
use crate::config::Config;
use crate::dates::puzzle_url;
use crate::error::TrackerError;

/// Where archive markup comes from.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Listing page for one month.
    async fn fetch_month(&self, year: i32, month: u32) -> Result<String>;

    /// Puzzle page for one date.
    async fn fetch_puzzle(&self, date: NaiveDate) -> Result<String>;

    /// URL reported in logs for a month listing.
    fn month_url(&self, year: i32, month: u32) -> String;

    fn puzzle_url(&self, date: NaiveDate) -> String;
}

pub struct HttpArchive {
    client: Client,
    cfg: Config,
    retry: RetryConfig,
}

impl HttpArchive {
    pub fn new(cfg: &Config) -> Result<Self> {
        Url::parse(&cfg.archive_month_url(2014, 8))
            .with_context(|| format!("archive url template `{}`", cfg.archive_url))?;
        Url::parse(&cfg.puzzle_base).with_context(|| format!("puzzle base `{}`", cfg.puzzle_base))?;

        let mut headers = HeaderMap::new();
        if let Some(cookie) = &cfg.cookie {
            let mut value = HeaderValue::from_str(cookie).context("cookie is not a valid header value")?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            cfg: cfg.clone(),
            retry: cfg.retry_config(),
        })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        retry_async(&self.retry, url, || async move {
            let resp = self.client.get(url).send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(TrackerError::HttpStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                }
                .into());
            }
            Ok(resp.text().await?)
        })
        .await
    }
}

#[async_trait]
impl ArchiveSource for HttpArchive {
    async fn fetch_month(&self, year: i32, month: u32) -> Result<String> {
        self.get_text(&self.month_url(year, month)).await
    }

    async fn fetch_puzzle(&self, date: NaiveDate) -> Result<String> {
        self.get_text(&ArchiveSource::puzzle_url(self, date)).await
    }

    fn month_url(&self, year: i32, month: u32) -> String {
        self.cfg.archive_month_url(year, month)
    }

    fn puzzle_url(&self, date: NaiveDate) -> String {
        puzzle_url(&self.cfg.puzzle_base, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_follow_config() {
        let cfg = Config::default();
        let src = HttpArchive::new(&cfg).unwrap();
        assert_eq!(src.month_url(2024, 6), cfg.archive_month_url(2024, 6));
        let d = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(
            ArchiveSource::puzzle_url(&src, d),
            "https://www.nytimes.com/crosswords/game/mini/2024/06/01"
        );
    }

    #[test]
    fn rejects_unparseable_base() {
        let cfg = Config {
            puzzle_base: "not a url".into(),
            ..Config::default()
        };
        assert!(HttpArchive::new(&cfg).is_err());
    }

    #[test]
    fn rejects_cookie_with_newline() {
        let cfg = Config {
            cookie: Some("a=b\nc".into()),
            ..Config::default()
        };
        assert!(HttpArchive::new(&cfg).is_err());
    }
}
