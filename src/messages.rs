//! Messages exchanged between the control surface, the page loop and the
//! state owner. One variant per action, each carrying only its own fields.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::nav::NavigationMode;
use crate::puzzle::PuzzleRecord;
use crate::service::StoreHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    UpdateMode { mode: NavigationMode },
    ShowNavButton,
    NavigateCrossword,
    RecordSolve { date: String, time: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "camelCase")]
pub enum Reply {
    Ack,
    /// `next` tells a scraping page whether to advance.
    RecordSolve { next: bool },
}

/// Record a scraped solve. A missing time only creates a placeholder, so a
/// timer that failed to render never erases a known time.
pub async fn record_solve(store: &StoreHandle, date: String, time: Option<String>) -> Result<Reply> {
    match time {
        Some(t) => {
            store.upsert(date, Some(t)).await?;
        }
        None => {
            store
                .insert_missing(vec![PuzzleRecord::new(date, None)])
                .await?;
        }
    }
    Ok(Reply::RecordSolve { next: true })
}
