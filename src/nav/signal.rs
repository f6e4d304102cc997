use std::future::Future;
use std::sync::LazyLock;

use regex::Regex;
use tokio::time::{sleep, Duration, Instant};

use crate::stats::{format_seconds, time_to_seconds};

/// Poll `probe` every `poll` until it yields a value or `max_wait` elapses.
/// Running out of time resolves to `None`; it is not an error.
pub async fn wait_for_signal<T, F, Fut>(mut probe: F, poll: Duration, max_wait: Duration) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + max_wait;
    loop {
        if let Some(v) = probe().await {
            return Some(v);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep(poll.min(deadline - now)).await;
    }
}

/// Timer text that indicates a finished puzzle. A reset timer reads `0:00`.
pub fn solved_timer_value(text: &str) -> Option<String> {
    let t = text.trim();
    if t.is_empty() || t == "0:00" {
        None
    } else {
        Some(t.to_string())
    }
}

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("number regex"));

/// Bring a displayed solve time to `m:ss`.
///
/// Accepts `1:05`, `45 seconds`, `1 minute 5 seconds` and `2 minutes`.
pub fn normalize_solve_time(text: &str) -> Option<String> {
    let t = text.trim();
    if let Some(secs) = time_to_seconds(t) {
        return Some(format_seconds(secs));
    }
    let lower = t.to_ascii_lowercase();
    let nums: Vec<u32> = NUMBER_RE
        .find_iter(&lower)
        .map(|m| m.as_str().parse().ok())
        .collect::<Option<_>>()?;
    let total = if lower.contains("minute") {
        let minutes = *nums.first()?;
        let seconds = if lower.contains("second") { nums.get(1).copied().unwrap_or(0) } else { 0 };
        minutes.checked_mul(60)?.checked_add(seconds)?
    } else if lower.contains("second") {
        *nums.first()?
    } else {
        return None;
    };
    Some(format_seconds(total))
}
