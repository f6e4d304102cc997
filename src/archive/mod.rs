//! Bulk import from the remote puzzle archive.
//!
//! Month listings are fetched concurrently and parsed for solved markers.
//! Per-puzzle pages, needed only for the exact solve time, are fetched one
//! after another to keep load on the remote site bounded.

pub mod bulk;
pub mod parse;
pub mod retry;
pub mod source;

pub use bulk::{ArchiveReport, ArchiveScraper};
pub use parse::{ArchiveSelectors, ListingDay};
pub use source::{ArchiveSource, HttpArchive};
