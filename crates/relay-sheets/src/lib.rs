//! # Google Sheets Row Store
//!
//! [`RowStore`] implementation that keeps the symptom log in the first
//! worksheet of a Google spreadsheet via the Sheets v4 REST API.
//!
//! - Appends one row per entry (`date`, `time`, `body`, `urgency`)
//! - Reads the whole range back and keeps the tail for summaries
//! - The first row is treated as a header and never returned
//!
//! Obtaining the OAuth access token is left to the deployment. Google tokens
//! expire after about an hour, so long-running servers should use
//! [`AccessToken::File`] and have a timer rewrite the file.
//!
//! ## Example
//!
//! ```rust,ignore
//! use relay_core::RowStore;
//! use relay_sheets::SheetsRowStore;
//!
//! let store = SheetsRowStore::new("1AbC...", "ya29.token");
//! let last_three = store.recent(3).await?;
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use relay_core::{RowStore, StoreError, SymptomEntry};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

const STORE: &str = "google-sheets";
pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";
pub const DEFAULT_RANGE: &str = "Sheet1!A:D";

/// Source of the bearer token sent with every request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessToken {
    /// Fixed token, valid until it expires.
    Static(String),
    /// File re-read before every request, e.g. kept fresh by
    /// `gcloud auth print-access-token` on a timer.
    File(PathBuf),
}

impl AccessToken {
    async fn resolve(&self) -> Result<String, StoreError> {
        match self {
            AccessToken::Static(token) => Ok(token.clone()),
            AccessToken::File(path) => {
                let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
                    StoreError::Auth(format!("cannot read token file {}: {}", path.display(), e))
                })?;
                let token = contents.trim();
                if token.is_empty() {
                    return Err(StoreError::Auth(format!(
                        "token file {} is empty",
                        path.display()
                    )));
                }
                Ok(token.to_string())
            }
        }
    }
}

impl From<String> for AccessToken {
    fn from(token: String) -> Self {
        AccessToken::Static(token)
    }
}

impl From<&str> for AccessToken {
    fn from(token: &str) -> Self {
        AccessToken::Static(token.to_string())
    }
}

/// Google Sheets client bound to one spreadsheet range.
#[derive(Clone, Debug)]
pub struct SheetsRowStore {
    /// Spreadsheet ID, the long token in the sheet's URL.
    pub spreadsheet_id: String,
    /// OAuth2 bearer token with the spreadsheets scope.
    pub access_token: AccessToken,
    /// A1 range holding the log, e.g. `Sheet1!A:D`.
    pub range: String,
    /// API base URL; override for testing/mocking.
    pub base_url: String,
    http: reqwest::Client,
}

impl SheetsRowStore {
    pub fn new(spreadsheet_id: impl Into<String>, access_token: impl Into<AccessToken>) -> Self {
        Self::with_base_url(
            spreadsheet_id,
            access_token,
            DEFAULT_RANGE.to_string(),
            DEFAULT_BASE_URL.to_string(),
        )
    }

    pub fn with_base_url(
        spreadsheet_id: impl Into<String>,
        access_token: impl Into<AccessToken>,
        range: String,
        base_url: String,
    ) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            access_token: access_token.into(),
            range,
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// `{base}/v4/spreadsheets/{id}/values/{range}` with the last path segment
    /// optionally suffixed (`:append`).
    fn values_url(&self, suffix: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StoreError::Api(format!("invalid base url {}: {}", self.base_url, e)))?;
        let last = format!("{}{}", self.range, suffix);
        url.path_segments_mut()
            .map_err(|_| {
                StoreError::Api(format!("base url cannot hold a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                last.as_str(),
            ]);
        Ok(url)
    }

    fn append_url(&self) -> Result<Url, StoreError> {
        let mut url = self.values_url(":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        Ok(url)
    }

    async fn check(res: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        error!(store = STORE, %status, "sheets request failed");
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                StoreError::Auth(format!("HTTP {}: {}", status, body))
            }
            _ => StoreError::Api(format!("HTTP {}: {}", status, body)),
        })
    }
}

#[derive(Debug, Serialize)]
struct AppendRequest {
    values: Vec<Vec<serde_json::Value>>,
}

impl AppendRequest {
    fn single(entry: &SymptomEntry) -> Self {
        let urgency = entry
            .urgency
            .map(|u| serde_json::Value::from(u.get()))
            .unwrap_or_else(|| serde_json::Value::from(""));
        Self {
            values: vec![vec![
                entry.date_string().into(),
                entry.time_string().into(),
                entry.body.clone().into(),
                urgency,
            ]],
        }
    }
}

/// Response of `GET .../values/{range}`. `values` is omitted for an empty sheet.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

fn cell_text(cell: &serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Skip the header row, decode the rest, keep the last `n` readable rows.
fn tail_entries(values: &[Vec<serde_json::Value>], n: usize) -> Vec<SymptomEntry> {
    let entries: Vec<SymptomEntry> = values
        .iter()
        .skip(1)
        .filter_map(|row| {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            SymptomEntry::from_row(&cells)
        })
        .collect();
    let skip = entries.len().saturating_sub(n);
    entries.into_iter().skip(skip).collect()
}

#[async_trait]
impl RowStore for SheetsRowStore {
    async fn append(&self, entry: &SymptomEntry) -> Result<(), StoreError> {
        let url = self.append_url()?;
        let token = self.access_token.resolve().await?;
        debug!(store = STORE, "appending symptom row");
        let res = self
            .http
            .post(url)
            .bearer_auth(&token)
            .json(&AppendRequest::single(entry))
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;
        Self::check(res).await?;
        Ok(())
    }

    async fn recent(&self, n: usize) -> Result<Vec<SymptomEntry>, StoreError> {
        let url = self.values_url("")?;
        let token = self.access_token.resolve().await?;
        let res = self
            .http
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;
        let range: ValueRange = Self::check(res)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        Ok(tail_entries(&range.values, n))
    }

    fn share_url(&self) -> String {
        format!("https://docs.google.com/spreadsheets/d/{}", self.spreadsheet_id)
    }
}
