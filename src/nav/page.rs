use async_trait::async_trait;
use scraper::{Html, Selector};

/// Timer inside the play/pause button of a puzzle page.
pub const TIMER_SELECTOR: &str = r#"button[aria-label="Timer Play Button"] .timer-count"#;
/// Bold spans of the congratulations modal; the second one carries the time.
pub const CONGRATS_SELECTOR: &str = "div.mini__congrats-modal--message span.xwd__bold";

/// The browser page the loop is running against.
#[async_trait]
pub trait PuzzlePage: Send + Sync {
    fn url(&self) -> String;

    /// Current solve timer text, if the timer element is present.
    async fn timer_text(&self) -> Option<String>;

    /// Time shown in the congratulations modal, once it has appeared.
    async fn congrats_text(&self) -> Option<String>;
}

/// A page whose probes return fixed values.
#[derive(Debug, Clone, Default)]
pub struct StaticPage {
    pub url: String,
    pub timer: Option<String>,
    pub congrats: Option<String>,
}

impl StaticPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_timer(mut self, timer: impl Into<String>) -> Self {
        self.timer = Some(timer.into());
        self
    }

    pub fn with_congrats(mut self, text: impl Into<String>) -> Self {
        self.congrats = Some(text.into());
        self
    }

    /// Snapshot a saved page: read the timer and the modal out of its markup.
    pub fn from_html(url: impl Into<String>, html: &str) -> Self {
        let doc = Html::parse_document(html);
        let text_of = |sel: &Selector, nth: usize| {
            doc.select(sel)
                .nth(nth)
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
        };
        let timer = Selector::parse(TIMER_SELECTOR).ok().and_then(|s| text_of(&s, 0));
        let congrats = Selector::parse(CONGRATS_SELECTOR).ok().and_then(|s| text_of(&s, 1));
        Self {
            url: url.into(),
            timer,
            congrats,
        }
    }
}

#[async_trait]
impl PuzzlePage for StaticPage {
    fn url(&self) -> String {
        self.url.clone()
    }

    async fn timer_text(&self) -> Option<String> {
        self.timer.clone()
    }

    async fn congrats_text(&self) -> Option<String> {
        self.congrats.clone()
    }
}
