use thiserror::Error;

/// Failure taxonomy shared by the tracker.
///
/// Structural variants abort the current page action only. Network variants
/// skip one unit of archive work. Timeouts are never errors; they surface as
/// `None` from the signal waits.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("no puzzle date found in url: {0}")]
    NoDateInUrl(String),

    #[error("invalid date string: {0}")]
    InvalidDate(String),

    #[error("unknown navigation mode: {0}")]
    UnknownMode(u8),

    #[error("csv line {line}: {reason}")]
    Csv { line: usize, reason: String },

    #[error("http {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("state service is closed")]
    StoreClosed,
}

impl TrackerError {
    /// Structural errors mean the page or input did not have the expected shape.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TrackerError::NoDateInUrl(_)
                | TrackerError::InvalidDate(_)
                | TrackerError::UnknownMode(_)
                | TrackerError::Csv { .. }
        )
    }
}
