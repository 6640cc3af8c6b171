//! Google Sheets API v4 client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::{RequestThrottle, SheetSource};
use crate::plan::{GridMerge, RawPage};

/// Default Sheets API endpoint.
pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Only the fields the parser needs.
const RESPONSE_FIELDS: &str = "properties.title,sheets(merges,data.rowData.values.formattedValue)";

/// Columns making up a plan page.
const PAGE_COLUMNS: &str = "A:E";

/// Cells per row the parser reads.
const ROW_WIDTH: usize = 5;

/// Back-off used when a 429 carries no `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Errors that can occur while fetching a page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by Sheets API, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Page {page:?} not found in table {table_id}")]
    PageNotFound { table_id: String, page: String },
}

#[derive(Debug, Default, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    properties: SpreadsheetProperties,
    #[serde(default)]
    sheets: Vec<SheetResponse>,
}

#[derive(Debug, Default, Deserialize)]
struct SpreadsheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct SheetResponse {
    #[serde(default)]
    merges: Vec<MergeResponse>,
    #[serde(default)]
    data: Vec<GridDataResponse>,
}

/// Zero-valued indexes are omitted from the JSON, hence the defaults.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergeResponse {
    #[serde(default)]
    start_row_index: usize,
    #[serde(default)]
    end_row_index: usize,
    #[serde(default)]
    start_column_index: usize,
    #[serde(default)]
    end_column_index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridDataResponse {
    #[serde(default)]
    row_data: Vec<RowDataResponse>,
}

#[derive(Debug, Deserialize)]
struct RowDataResponse {
    #[serde(default)]
    values: Vec<CellResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellResponse {
    #[serde(default)]
    formatted_value: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Fetches plan pages with an API key.
pub struct SheetsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    throttle: RequestThrottle,
}

impl SheetsClient {
    /// Creates a client that waits at least `min_interval` between requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, min_interval: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_owned(),
            throttle: RequestThrottle::new(min_interval),
        })
    }

    /// Points the client at another endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn request(&self, table_id: &str, page: &str) -> Result<SpreadsheetResponse, FetchError> {
        self.throttle.acquire().await;

        let range = format!("'{}'!{PAGE_COLUMNS}", page.replace('\'', "''"));
        debug!("Fetching {} from table {}", range, table_id);

        let response = self
            .http
            .get(format!("{}/{}", self.base_url, table_id))
            .query(&[
                ("includeGridData", "true"),
                ("ranges", range.as_str()),
                ("fields", RESPONSE_FIELDS),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            self.throttle.back_off(Duration::from_secs(retry_after)).await;
            return Err(FetchError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = api_error_message(&body);

            if status == StatusCode::BAD_REQUEST && message.contains("Unable to parse range") {
                return Err(FetchError::PageNotFound {
                    table_id: table_id.to_owned(),
                    page: page.to_owned(),
                });
            }

            return Err(FetchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl SheetSource for SheetsClient {
    async fn fetch_page(&self, table_id: &str, page: &str) -> Result<RawPage, FetchError> {
        let response = self.request(table_id, page).await?;
        let raw = into_raw_page(response, table_id, page)?;

        info!(
            "Fetched page {:?} of {:?}: {} rows, {} merges",
            page,
            raw.table_name,
            raw.rows.len(),
            raw.merges.len()
        );
        Ok(raw)
    }
}

impl std::fmt::Debug for SheetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsClient")
            .field("base_url", &self.base_url)
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}

/// Extracts `error.message` from an API error body, falling back to the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_owned())
}

/// Converts the API response into a parser page, dropping the header row.
fn into_raw_page(response: SpreadsheetResponse, table_id: &str, page: &str) -> Result<RawPage, FetchError> {
    let Some(sheet) = response.sheets.into_iter().next() else {
        return Err(FetchError::PageNotFound {
            table_id: table_id.to_owned(),
            page: page.to_owned(),
        });
    };

    let rows = sheet
        .data
        .into_iter()
        .next()
        .map(|grid| grid.row_data)
        .unwrap_or_default()
        .into_iter()
        .skip(1)
        .map(|row| {
            row.values
                .into_iter()
                .take(ROW_WIDTH)
                .map(|cell| cell.formatted_value)
                .collect()
        })
        .collect();

    // Shift merges up past the header and drop those lying inside it.
    let merges = sheet
        .merges
        .into_iter()
        .filter_map(|m| {
            let start_row = m.start_row_index.saturating_sub(1);
            let end_row = m.end_row_index.saturating_sub(1);
            (start_row < end_row).then_some(GridMerge::new(
                start_row,
                end_row,
                m.start_column_index,
                m.end_column_index,
            ))
        })
        .collect();

    Ok(RawPage {
        table_name: response.properties.title,
        merges,
        rows,
    })
}
