//! Fetching plan pages from Google Sheets.

mod client;
mod throttle;

use async_trait::async_trait;

pub use client::{DEFAULT_API_BASE, FetchError, SheetsClient};
pub use throttle::RequestThrottle;

use crate::plan::RawPage;

/// Anything that can produce the raw cells and merges of a plan page.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Fetches one page (sheet tab) of a table, header row already removed.
    async fn fetch_page(&self, table_id: &str, page: &str) -> Result<RawPage, FetchError>;
}
